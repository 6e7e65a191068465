//! # Error Types
//!
//! Error handling for loading and querying post-mortem snapshots.
//!
//! We use `thiserror` to generate the `Error` trait implementations and the
//! messages shown to users.

use thiserror::Error;

use crate::types::AddressRange;

/// Main error type for snapshot operations
///
/// Everything that can make [`load_core`](crate::load_core) fail, plus the
/// errors returned by queries against an already loaded snapshot.
///
/// ## Error Categories
///
/// 1. **Load errors**: Format, CorruptMemoryMap, UnsupportedArchitecture, Io
/// 2. **Query errors**: ThreadNotFound, UnknownRegister, FrameUnavailable, RegisterUnavailable
/// 3. **Mutation errors**: SnapshotImmutable
/// 4. **Caller errors**: InvalidArgument
///
/// Load errors are fatal to the load call; no partial snapshot is returned.
/// A dump that is valid but lacks optional streams is not an error at all (see
/// [`Diagnostic`](crate::Diagnostic)).
#[derive(Error, Debug)]
pub enum MortemError
{
    /// The buffer is not a minidump, or one of its records is malformed
    ///
    /// This happens when:
    /// - The leading signature is not `MDMP`
    /// - The header or stream directory is truncated
    /// - A directory entry or record location points outside the buffer
    /// - The system info stream is missing or short
    #[error("Invalid minidump: {0}")]
    Format(String),

    /// Two memory records describe overlapping address ranges
    ///
    /// Both conflicting ranges are reported so the dump writer can be fixed.
    /// Byte-identical duplicates of one range are not an error.
    #[error("Corrupt memory map: {first} overlaps {second}")]
    CorruptMemoryMap
    {
        /// The range that sorts first
        first: AddressRange,
        /// The range that overlaps it
        second: AddressRange,
    },

    /// The system info stream names a processor we have no register layout for
    ///
    /// The value is the raw `processor_architecture` field.
    #[error("Unsupported architecture: processor tag 0x{0:04x}")]
    UnsupportedArchitecture(u16),

    /// An operation tried to run or modify a post-mortem snapshot
    ///
    /// Snapshots have no execution engine behind them, so resuming, stepping
    /// and writing memory or registers always fail and leave the snapshot
    /// untouched.
    #[error("Cannot {operation}: the target is a post-mortem snapshot")]
    SnapshotImmutable
    {
        /// The rejected operation (e.g. "resume")
        operation: &'static str,
    },

    /// No thread exists at the given index
    #[error("No thread at index {0}")]
    ThreadNotFound(usize),

    /// The register name is not part of the thread's register layout
    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    /// The unwinder did not produce the requested frame
    #[error("Frame {frame} is not available for thread {thread}")]
    FrameUnavailable
    {
        /// Thread index
        thread: usize,
        /// Frame index (0 = innermost)
        frame: usize,
    },

    /// The register's value cannot be recovered
    ///
    /// This happens when:
    /// - An outer frame is asked for anything but `pc`, `sp` or `fp`
    /// - The thread record carried no usable context (frame 0)
    #[error("Register {name} is not recoverable in frame {frame}")]
    RegisterUnavailable
    {
        /// Register name as requested
        name: String,
        /// Frame index
        frame: usize,
    },

    /// The dump holds no bytes for the requested address range
    ///
    /// Returned by the fixed-width reads the unwinder uses. Arbitrary reads go
    /// through [`MemoryRead`](crate::memory::MemoryRead) instead and report
    /// partial results as data.
    #[error("Memory at {address} (+{len} bytes) was not captured")]
    MemoryUnavailable
    {
        /// First address requested
        address: crate::types::Address,
        /// Number of bytes requested
        len: usize,
    },

    /// Invalid argument passed to a snapshot function
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error (reading a dump or an on-disk image)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<scroll::Error> for MortemError
{
    fn from(err: scroll::Error) -> Self
    {
        MortemError::Format(err.to_string())
    }
}

/// Convenience type alias for `Result<T, MortemError>`
///
/// ```rust
/// use mortem_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, MortemError>;
