//! # Target Trait
//!
//! The query interface shared by every kind of target.
//!
//! Unwinders, symbolizers and expression evaluators only talk to a
//! [`Target`]. A post-mortem [`ProcessSnapshot`](crate::ProcessSnapshot)
//! answers the same questions a live process would, so those services work
//! unchanged on a crash dump.
//!
//! ## Queries and mutators
//!
//! The trait has two halves:
//!
//! - **Queries** (`register`, `memory_region`, `read_memory`, ...) read the
//!   target's state.
//! - **Mutators** (`resume`, `step`, `write_memory`, ...) change it. A
//!   snapshot is frozen, so its mutators fail with
//!   [`SnapshotImmutable`](crate::MortemError::SnapshotImmutable) and leave
//!   it untouched.

use crate::error::Result;
use crate::memory::MemoryRead;
use crate::modules::Module;
use crate::registers::RegisterValue;
use crate::types::{Address, Architecture, MemoryRegion, Platform, ProcessId, StackFrame, ThreadId, ThreadStop};

/// Read-mostly view of a process
///
/// Threads are addressed by index (0-based, in the order the target lists
/// them), frames by depth (0 = innermost).
///
/// ## Example
///
/// ```rust,no_run
/// use mortem_core::{load_core_from_path, LoadOptions, Target};
///
/// let snapshot = load_core_from_path("crash.dmp", &LoadOptions::default())?;
/// for thread in 0..snapshot.thread_count() {
///     let pc = snapshot.register(thread, 0, "pc")?;
///     println!("thread {thread}: pc = {pc}");
/// }
/// # Ok::<(), mortem_core::MortemError>(())
/// ```
pub trait Target
{
    /// Id of the process, if the target knows it
    fn process_id(&self) -> Option<ProcessId>;

    /// CPU architecture of the process
    fn architecture(&self) -> Architecture;

    /// Operating system the process ran on
    fn platform(&self) -> Platform;

    /// Number of threads
    fn thread_count(&self) -> usize;

    /// Id of the thread at `thread`
    ///
    /// ## Errors
    ///
    /// `ThreadNotFound` if the index is out of range.
    fn thread_id(&self, thread: usize) -> Result<ThreadId>;

    /// Read a register of a thread in a given frame
    ///
    /// Frame 0 exposes every register of the thread context. Outer frames
    /// only know what unwinding recovered (`pc`, `sp` and `fp`).
    ///
    /// ## Errors
    ///
    /// - `ThreadNotFound`: no thread at `thread`
    /// - `FrameUnavailable`: the unwinder produced fewer frames
    /// - `UnknownRegister`: `name` is not part of the register layout
    /// - `RegisterUnavailable`: the register exists but is not known in `frame`
    fn register(&self, thread: usize, frame: usize, name: &str) -> Result<RegisterValue>;

    /// Unwound frames of a thread, innermost first
    fn frames(&self, thread: usize) -> Result<&[StackFrame]>;

    /// Region containing `address`
    ///
    /// Addresses outside every mapped region get an unmapped region spanning
    /// the whole gap, so this never fails.
    fn memory_region(&self, address: Address) -> MemoryRegion;

    /// All mapped regions in ascending order
    fn memory_regions(&self) -> &[MemoryRegion];

    /// Read `len` bytes starting at `address`
    ///
    /// Short reads are reported through the [`MemoryRead`] variants, never as
    /// an error.
    fn read_memory(&self, address: Address, len: usize) -> MemoryRead;

    /// Loaded modules in ascending address order
    fn modules(&self) -> &[Module];

    /// Module whose image contains `address`
    fn module_for_address(&self, address: Address) -> Option<&Module>;

    /// Why a thread is stopped
    fn stop_reason(&self, thread: usize) -> Result<&ThreadStop>;

    /// Whether the target is stopped
    ///
    /// Only a stopped target can be inspected consistently.
    fn is_stopped(&self) -> bool;

    /// Continue every thread
    fn resume(&mut self) -> Result<()>;

    /// Execute a single instruction on one thread
    fn step(&mut self, thread: usize) -> Result<()>;

    /// Stop every thread
    fn suspend(&mut self) -> Result<()>;

    /// Write bytes into the target's memory, returning how many were written
    fn write_memory(&mut self, address: Address, data: &[u8]) -> Result<usize>;

    /// Change a register of a thread in frame 0
    fn write_register(&mut self, thread: usize, name: &str, value: u64) -> Result<()>;
}
