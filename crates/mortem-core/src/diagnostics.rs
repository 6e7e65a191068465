//! Non-fatal findings recorded while a dump is loaded.
//!
//! A dump that is recognized but incomplete still loads: missing streams turn
//! into empty collections and odd records are skipped. Each such decision is
//! kept here so front ends can tell the user why a thread has no stack or a
//! module has no image.

use std::fmt;
use std::path::PathBuf;

use tracing::warn;

use crate::types::{Address, AddressRange, ThreadId};

/// One non-fatal finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic
{
    /// An optional stream is absent
    MissingStream(&'static str),
    /// A stream type appeared more than once; the later copy was ignored
    DuplicateStream
    {
        /// Stream type name
        name: &'static str,
        /// Offset of the ignored copy
        offset: u32,
    },
    /// Two memory records described the same range with the same bytes
    DuplicateMemoryRange(AddressRange),
    /// A thread's stack descriptor overlaps other captured memory and was not added
    OverlappingStack
    {
        /// Owning thread
        thread: ThreadId,
        /// Stack range from the thread record
        range: AddressRange,
    },
    /// A module path was listed again at a higher base and dropped
    DuplicateModule
    {
        /// Module path
        path: String,
        /// Base of the dropped entry
        base: Address,
    },
    /// A thread record has no context, or one too short for its layout
    UnusableContext
    {
        /// Owning thread
        thread: ThreadId,
        /// What was wrong with the context
        reason: String,
    },
    /// The exception stream names a thread that is not in the thread list
    UnknownExceptionThread(ThreadId),
    /// A file with the module's name was found but its identity differs
    ImageMismatch
    {
        /// Module path from the dump
        module: String,
        /// Candidate file
        path: PathBuf,
    },
    /// A candidate image could not be read or parsed
    ImageUnreadable
    {
        /// Candidate file
        path: PathBuf,
        /// Error text
        reason: String,
    },
}

impl fmt::Display for Diagnostic
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Diagnostic::MissingStream(name) => write!(f, "{name} stream not present"),
            Diagnostic::DuplicateStream { name, offset } => {
                write!(f, "duplicate {name} stream at 0x{offset:x} ignored")
            }
            Diagnostic::DuplicateMemoryRange(range) => write!(f, "memory range {range} captured twice"),
            Diagnostic::OverlappingStack { thread, range } => {
                write!(f, "stack {range} of thread {thread} overlaps captured memory")
            }
            Diagnostic::DuplicateModule { path, base } => {
                write!(f, "module {path} listed again at {base}")
            }
            Diagnostic::UnusableContext { thread, reason } => {
                write!(f, "thread {thread} has no usable register context: {reason}")
            }
            Diagnostic::UnknownExceptionThread(thread) => {
                write!(f, "exception targets thread {thread}, which is not in the thread list")
            }
            Diagnostic::ImageMismatch { module, path } => {
                write!(f, "{} does not match the identity of {module}", path.display())
            }
            Diagnostic::ImageUnreadable { path, reason } => write!(f, "cannot read {}: {reason}", path.display()),
        }
    }
}

/// Ordered list of findings for one load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics
{
    /// Record a finding and log it
    pub fn push(&mut self, diagnostic: Diagnostic)
    {
        warn!(%diagnostic, "Degraded minidump load");
        self.0.push(diagnostic);
    }

    /// All findings in the order they were recorded
    pub fn as_slice(&self) -> &[Diagnostic]
    {
        &self.0
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool
    {
        self.0.is_empty()
    }

    /// Whether a finding equal to `diagnostic` was recorded
    pub fn contains(&self, diagnostic: &Diagnostic) -> bool
    {
        self.0.contains(diagnostic)
    }
}
