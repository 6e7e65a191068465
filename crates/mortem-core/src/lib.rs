//! # mortem-core
//!
//! Post-mortem process snapshots reconstructed from minidumps.
//!
//! A minidump is a crash dump container: a stream directory pointing at
//! thread lists, register contexts, captured memory, module lists and
//! platform extras. This crate turns one into a [`ProcessSnapshot`] that
//! answers the same questions a live process would, through the [`Target`]
//! trait:
//! - Threads and their registers, including unwound outer frames
//! - The memory map, with captured bytes readable by address
//! - Loaded modules with deterministic identities
//! - Why each thread stopped
//!
//! ## Example
//!
//! ```rust,no_run
//! use mortem_core::{load_core_from_path, Address, LoadOptions, Target};
//!
//! let snapshot = load_core_from_path("crash.dmp", &LoadOptions::from_env()?)?;
//! if let Some(thread) = snapshot.crashed_thread() {
//!     println!("{}", snapshot.stop_reason(thread)?.description);
//!     let pc = snapshot.register(thread, 0, "pc")?;
//!     let module = snapshot.module_for_address(Address::new(pc.as_u64()));
//!     println!("crashed in {:?}", module.map(|module| module.basename()));
//! }
//! # Ok::<(), mortem_core::MortemError>(())
//! ```
//!
//! ## Snapshots are frozen
//!
//! Nothing can run a dead process. Resuming, stepping and writes fail with
//! [`MortemError::SnapshotImmutable`]; the snapshot is never modified after
//! [`load_core`] returns.

pub mod diagnostics;
pub mod dump;
pub mod error;
pub mod exception;
pub mod memory;
pub mod modules;
pub mod options;
pub mod prelude;
pub mod registers;
pub mod snapshot;
pub mod target;
pub mod types;
pub mod unwind;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use error::{MortemError, Result};
pub use memory::{MemoryRead, ReadStop};
pub use modules::{Module, ModuleList};
pub use options::LoadOptions;
pub use registers::{RegisterBank, RegisterValue};
pub use snapshot::{load_core, load_core_from_path, ProcessSnapshot, Thread};
pub use target::Target;
// Re-export commonly used types
pub use types::{Address, AddressRange, Architecture, MemoryRegion, Permissions, Platform, ProcessId, StopReason, ThreadId};
