//! # Types
//!
//! Plain value types shared by every part of the snapshot model.
//!
//! These carry no behaviour tied to the minidump format, so the same types
//! describe a live target and a post-mortem one.

pub mod address;
pub mod process;
pub mod region;
pub mod stack;
pub mod stop;

// Re-export all public types
pub use address::{Address, AddressRange};
pub use process::{Architecture, Platform, ProcessId, ThreadId};
pub use region::{MemoryRegion, Permissions};
pub use stack::{FrameStatus, StackFrame};
pub use stop::{StopReason, ThreadStop};
