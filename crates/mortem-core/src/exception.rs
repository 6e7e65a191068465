//! # Exception / Stop-Reason Resolver
//!
//! Maps the exception record of a dump to the stop reason of the faulting
//! thread. How the record's fields are read depends on the platform that
//! wrote the dump:
//!
//! | Platform | `exception_code` | `exception_flags` | Stop reason |
//! |----------|------------------|-------------------|-------------|
//! | Linux, Android, other POSIX | signal number | signal code | [`StopReason::Signal`] |
//! | macOS, iOS | Mach exception type | Mach code | [`StopReason::Exception`] |
//! | Windows | NTSTATUS | flags | [`StopReason::Exception`] |
//!
//! The Breakpad "dump requested" code marks a dump taken on purpose from a
//! healthy process and resolves to [`StopReason::None`].

use crate::dump::format::{RawException, DUMP_REQUESTED};
use crate::types::{Address, Platform, StopReason, ThreadStop};

/// POSIX signal name for a Linux signal number
///
/// ```rust
/// use mortem_core::exception::signal_name;
///
/// assert_eq!(signal_name(11), Some("SIGSEGV"));
/// assert_eq!(signal_name(64), None);
/// ```
pub fn signal_name(signal: u32) -> Option<&'static str>
{
    let name = match signal {
        1 => "SIGHUP",
        2 => "SIGINT",
        3 => "SIGQUIT",
        4 => "SIGILL",
        5 => "SIGTRAP",
        6 => "SIGABRT",
        7 => "SIGBUS",
        8 => "SIGFPE",
        9 => "SIGKILL",
        10 => "SIGUSR1",
        11 => "SIGSEGV",
        12 => "SIGUSR2",
        13 => "SIGPIPE",
        14 => "SIGALRM",
        15 => "SIGTERM",
        16 => "SIGSTKFLT",
        17 => "SIGCHLD",
        18 => "SIGCONT",
        19 => "SIGSTOP",
        20 => "SIGTSTP",
        21 => "SIGTTIN",
        22 => "SIGTTOU",
        23 => "SIGURG",
        24 => "SIGXCPU",
        25 => "SIGXFSZ",
        26 => "SIGVTALRM",
        27 => "SIGPROF",
        28 => "SIGWINCH",
        29 => "SIGIO",
        30 => "SIGPWR",
        31 => "SIGSYS",
        _ => return None,
    };
    Some(name)
}

/// Signals raised by a faulting instruction; their record carries the
/// faulting address
fn is_fault_signal(signal: u32) -> bool
{
    matches!(signal, 4 | 7 | 8 | 11)
}

/// Name of a Mach exception type
pub fn mach_exception_name(exception: u32) -> Option<&'static str>
{
    let name = match exception {
        1 => "EXC_BAD_ACCESS",
        2 => "EXC_BAD_INSTRUCTION",
        3 => "EXC_ARITHMETIC",
        4 => "EXC_EMULATION",
        5 => "EXC_SOFTWARE",
        6 => "EXC_BREAKPOINT",
        7 => "EXC_SYSCALL",
        8 => "EXC_MACH_SYSCALL",
        9 => "EXC_RPC_ALERT",
        10 => "EXC_CRASH",
        11 => "EXC_RESOURCE",
        12 => "EXC_GUARD",
        13 => "EXC_CORPSE_NOTIFY",
        _ => return None,
    };
    Some(name)
}

/// Name of a Windows exception code
pub fn windows_exception_name(code: u32) -> Option<&'static str>
{
    let name = match code {
        0x4000_0015 => "STATUS_FATAL_APP_EXIT",
        0x8000_0003 => "EXCEPTION_BREAKPOINT",
        0x8000_0004 => "EXCEPTION_SINGLE_STEP",
        0x8000_0001 => "EXCEPTION_GUARD_PAGE",
        0x8000_0002 => "EXCEPTION_DATATYPE_MISALIGNMENT",
        0xc000_0005 => "EXCEPTION_ACCESS_VIOLATION",
        0xc000_0006 => "EXCEPTION_IN_PAGE_ERROR",
        0xc000_0008 => "EXCEPTION_INVALID_HANDLE",
        0xc000_001d => "EXCEPTION_ILLEGAL_INSTRUCTION",
        0xc000_0025 => "EXCEPTION_NONCONTINUABLE_EXCEPTION",
        0xc000_0026 => "EXCEPTION_INVALID_DISPOSITION",
        0xc000_008c => "EXCEPTION_ARRAY_BOUNDS_EXCEEDED",
        0xc000_008d => "EXCEPTION_FLT_DENORMAL_OPERAND",
        0xc000_008e => "EXCEPTION_FLT_DIVIDE_BY_ZERO",
        0xc000_008f => "EXCEPTION_FLT_INEXACT_RESULT",
        0xc000_0090 => "EXCEPTION_FLT_INVALID_OPERATION",
        0xc000_0091 => "EXCEPTION_FLT_OVERFLOW",
        0xc000_0092 => "EXCEPTION_FLT_STACK_CHECK",
        0xc000_0093 => "EXCEPTION_FLT_UNDERFLOW",
        0xc000_0094 => "EXCEPTION_INT_DIVIDE_BY_ZERO",
        0xc000_0095 => "EXCEPTION_INT_OVERFLOW",
        0xc000_0096 => "EXCEPTION_PRIV_INSTRUCTION",
        0xc000_00fd => "EXCEPTION_STACK_OVERFLOW",
        0xc000_0374 => "STATUS_HEAP_CORRUPTION",
        0xc000_0409 => "STATUS_STACK_BUFFER_OVERRUN",
        0xc000_0417 => "STATUS_INVALID_CRUNTIME_PARAMETER",
        0xe06d_7363 => "EXCEPTION_CXX",
        _ => return None,
    };
    Some(name)
}

const EXCEPTION_ACCESS_VIOLATION: u32 = 0xc000_0005;
const EXCEPTION_IN_PAGE_ERROR: u32 = 0xc000_0006;

/// Stop reason of the thread an exception record belongs to
pub fn resolve_stop(platform: Platform, exception: &RawException) -> ThreadStop
{
    let code = exception.exception_code;
    if code == DUMP_REQUESTED {
        return ThreadStop::none();
    }

    match platform {
        Platform::Windows => windows_stop(exception),
        Platform::MacOs | Platform::Ios => {
            let name = mach_exception_name(code).map_or_else(|| format!("exception {code:#x}"), str::to_string);
            let address = Address::new(exception.exception_address);
            ThreadStop {
                reason: StopReason::Exception(code),
                description: format!(
                    "{name} (code={:#x}, address={address})",
                    exception.exception_flags
                ),
                fault_address: Some(address),
            }
        }
        _ => {
            let name = signal_name(code).map_or_else(|| format!("signal {code}"), |name| format!("signal {name}"));
            let fault_address = is_fault_signal(code).then(|| Address::new(exception.exception_address));
            let description = match fault_address {
                Some(address) => format!("{name}: fault address {address}"),
                None => name,
            };
            ThreadStop {
                reason: StopReason::Signal(code as i32),
                description,
                fault_address,
            }
        }
    }
}

fn windows_stop(exception: &RawException) -> ThreadStop
{
    let code = exception.exception_code;
    let name = windows_exception_name(code).map_or_else(|| format!("exception {code:#010x}"), str::to_string);
    let parameters = exception.number_parameters as usize;

    // Access violations carry the access kind and the inaccessible address.
    if matches!(code, EXCEPTION_ACCESS_VIOLATION | EXCEPTION_IN_PAGE_ERROR) && parameters >= 2 {
        let kind = match exception.exception_information[0] {
            0 => "read",
            1 => "write",
            8 => "execute",
            _ => "access",
        };
        let address = Address::new(exception.exception_information[1]);
        return ThreadStop {
            reason: StopReason::Exception(code),
            description: format!("{name}: {kind} of {address}"),
            fault_address: Some(address),
        };
    }

    let address = Address::new(exception.exception_address);
    ThreadStop {
        reason: StopReason::Exception(code),
        description: format!("{name} at {address}"),
        fault_address: Some(address),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::dump::format::EXCEPTION_MAXIMUM_PARAMETERS;

    fn record(code: u32, flags: u32, address: u64) -> RawException
    {
        RawException {
            exception_code: code,
            exception_flags: flags,
            exception_record: 0,
            exception_address: address,
            number_parameters: 0,
            alignment: 0,
            exception_information: [0; EXCEPTION_MAXIMUM_PARAMETERS],
        }
    }

    #[test]
    fn test_linux_segv()
    {
        let stop = resolve_stop(Platform::Linux, &record(11, 1, 0xdead));
        assert_eq!(stop.reason, StopReason::Signal(11));
        assert!(stop.description.contains("SIGSEGV"));
        assert!(stop.description.contains("0x000000000000dead"));
        assert_eq!(stop.fault_address, Some(Address::new(0xdead)));
    }

    #[test]
    fn test_non_fault_signal_has_no_address()
    {
        let stop = resolve_stop(Platform::Android, &record(6, 0, 0x1234));
        assert_eq!(stop.description, "signal SIGABRT");
        assert_eq!(stop.fault_address, None);
    }

    #[test]
    fn test_dump_requested_is_not_a_crash()
    {
        let stop = resolve_stop(Platform::Linux, &record(DUMP_REQUESTED, 0, 0));
        assert_eq!(stop, ThreadStop::none());
    }

    #[test]
    fn test_mach_exception()
    {
        let stop = resolve_stop(Platform::MacOs, &record(1, 0xd, 0x10));
        assert_eq!(stop.reason, StopReason::Exception(1));
        assert!(stop.description.starts_with("EXC_BAD_ACCESS"));
    }

    #[test]
    fn test_windows_access_violation()
    {
        let mut exception = record(EXCEPTION_ACCESS_VIOLATION, 0, 0x7ff6_0000_1000);
        exception.number_parameters = 2;
        exception.exception_information[0] = 1;
        exception.exception_information[1] = 0x40;

        let stop = resolve_stop(Platform::Windows, &exception);
        assert_eq!(stop.reason, StopReason::Exception(EXCEPTION_ACCESS_VIOLATION));
        assert_eq!(
            stop.description,
            "EXCEPTION_ACCESS_VIOLATION: write of 0x0000000000000040"
        );
        assert_eq!(stop.fault_address, Some(Address::new(0x40)));
    }
}
