//! Stack frame types.

use super::Address;

/// How a frame's registers were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// Frame 0: registers come straight from the captured thread context.
    Context,
    /// Recovered by following the saved frame-pointer chain.
    FramePointer,
    /// Recovered from the link register of the inner frame (ARM leaf calls).
    LinkRegister,
}

/// One physical frame produced by the frame-pointer walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame
{
    /// Index within the trace (0 = innermost).
    pub index: usize,
    /// Program counter.
    pub pc: Address,
    /// Stack pointer.
    pub sp: Address,
    /// Frame pointer.
    pub fp: Address,
    /// Reliability indicator.
    pub status: FrameStatus,
}
