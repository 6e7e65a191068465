//! Thread stop reasons.

use std::fmt;

use super::Address;

/// Why a thread in the snapshot is not executing
///
/// Decided once when the dump is loaded. A snapshot cannot run, so the value
/// never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason
{
    /// No exception targets this thread (non-crash snapshot, or another
    /// thread crashed)
    None,
    /// The thread received a POSIX signal (Linux, Android and other
    /// signal-based platforms)
    ///
    /// The value is the signal number, e.g. 11 for `SIGSEGV`.
    Signal(i32),
    /// The thread raised a platform exception (Windows NTSTATUS code or Mach
    /// exception type)
    Exception(u32),
}

impl StopReason
{
    /// Short name of the stop kind, as shown by front ends
    pub const fn kind(self) -> &'static str
    {
        match self {
            StopReason::None => "none",
            StopReason::Signal(_) => "signal",
            StopReason::Exception(_) => "exception",
        }
    }
}

/// Stop reason of one thread together with its description
///
/// ## Example
///
/// ```rust
/// use mortem_core::types::{StopReason, ThreadStop};
///
/// let stop = ThreadStop::none();
/// assert_eq!(stop.reason, StopReason::None);
/// assert!(stop.description.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadStop
{
    /// Stop kind and code
    pub reason: StopReason,
    /// Human-readable description, empty for [`StopReason::None`]
    pub description: String,
    /// Faulting address when the exception carries one
    pub fault_address: Option<Address>,
}

impl ThreadStop
{
    /// A thread that is simply stopped because the process was dumped
    pub fn none() -> Self
    {
        Self {
            reason: StopReason::None,
            description: String::new(),
            fault_address: None,
        }
    }

    /// `true` if an exception or signal targets this thread
    pub fn is_crash(&self) -> bool
    {
        self.reason != StopReason::None
    }
}

impl fmt::Display for ThreadStop
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        if self.description.is_empty() {
            write!(f, "{}", self.reason.kind())
        } else {
            write!(f, "{}: {}", self.reason.kind(), self.description)
        }
    }
}
