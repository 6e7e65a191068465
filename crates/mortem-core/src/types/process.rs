//! Process, thread, CPU and operating system identifiers.

use std::fmt;

/// Process identifier recorded in the dump
///
/// The value is read verbatim from the dump (misc info or `/proc` status
/// stream). It is never resolved against processes running on the host: a
/// snapshot whose PID matches a live process is still a separate entity.
///
/// ## Example
///
/// ```rust
/// use mortem_core::types::ProcessId;
///
/// let pid = ProcessId::from(29917);
/// assert_eq!(u32::from(pid), 29917);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier recorded in the dump
///
/// Minidump thread records carry a 32-bit id (a TID on Linux, a Mach thread
/// port name on macOS, a thread id on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(pub u32);

impl ThreadId
{
    /// Raw numeric id
    pub fn raw(&self) -> u32
    {
        self.0
    }
}

impl From<u32> for ThreadId
{
    fn from(value: u32) -> Self
    {
        Self(value)
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// CPU architecture of the dumped process
///
/// Taken from the `processor_architecture` field of the system info stream.
/// Only the three architectures with a register layout can be loaded; any
/// other tag fails the load with `UnsupportedArchitecture`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture
{
    /// 64-bit x86 (`PROCESSOR_ARCHITECTURE_AMD64`)
    X86_64,
    /// 32-bit ARM
    Arm,
    /// 64-bit ARM (both the current and the legacy Breakpad tag)
    Arm64,
}

impl Architecture
{
    /// Size of a pointer in the dumped process, in bytes
    pub const fn pointer_size_bytes(self) -> u8
    {
        match self {
            Architecture::Arm => 4,
            Architecture::X86_64 | Architecture::Arm64 => 8,
        }
    }
}

impl fmt::Display for Architecture
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Arm => write!(f, "arm"),
            Architecture::Arm64 => write!(f, "arm64"),
        }
    }
}

/// Operating system the dump was written on
///
/// Decides how exception codes are named and a few ABI details (which ARM
/// register is the frame pointer, which x86-64 registers carry arguments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform
{
    /// Windows (`VER_PLATFORM_WIN32_NT`)
    Windows,
    /// macOS
    MacOs,
    /// iOS
    Ios,
    /// Linux
    Linux,
    /// Android
    Android,
    /// Solaris
    Solaris,
    /// Fuchsia
    Fuchsia,
    /// Any other platform id
    Unknown(u32),
}

impl Platform
{
    /// `true` for the Apple platforms
    pub const fn is_apple(self) -> bool
    {
        matches!(self, Platform::MacOs | Platform::Ios)
    }
}

impl fmt::Display for Platform
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Platform::Windows => write!(f, "windows"),
            Platform::MacOs => write!(f, "macos"),
            Platform::Ios => write!(f, "ios"),
            Platform::Linux => write!(f, "linux"),
            Platform::Android => write!(f, "android"),
            Platform::Solaris => write!(f, "solaris"),
            Platform::Fuchsia => write!(f, "fuchsia"),
            Platform::Unknown(id) => write!(f, "unknown (0x{id:x})"),
        }
    }
}
