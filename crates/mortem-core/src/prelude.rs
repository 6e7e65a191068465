//! Common module for library exports

pub use crate::error::{MortemError, Result};
pub use crate::memory::{MemoryRead, ReadStop};
pub use crate::options::LoadOptions;
pub use crate::snapshot::{load_core, load_core_from_path, ProcessSnapshot};
pub use crate::target::Target;
pub use crate::types::address::{Address, AddressRange};
pub use crate::types::process::{Architecture, Platform, ProcessId, ThreadId};
pub use crate::types::{MemoryRegion, StopReason, ThreadStop};
