//! Tests for thread stop reasons

mod common;

use common::{linux_x86_64_dump, x86_64_context, DumpBuilder};
use mortem_core::dump::format::{platform, processor, DUMP_REQUESTED};
use mortem_core::{load_core, Address, Diagnostic, LoadOptions, MortemError, StopReason, Target, ThreadId};

#[test]
fn test_no_exception_means_no_stop_reason()
{
    let snapshot = load_core(&linux_x86_64_dump().build(), &LoadOptions::default()).unwrap();
    let stop = snapshot.stop_reason(0).unwrap();
    assert_eq!(stop.reason, StopReason::None);
    assert!(stop.description.is_empty());
    assert_eq!(snapshot.crashed_thread(), None);
}

#[test]
fn test_linux_signal()
{
    let bytes = linux_x86_64_dump()
        .exception(16001, 11, 0, 0xdead_beef, &[], None)
        .build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();

    let stop = snapshot.stop_reason(0).unwrap();
    assert_eq!(stop.reason, StopReason::Signal(11));
    assert_eq!(stop.reason.kind(), "signal");
    assert!(stop.description.contains("SIGSEGV"), "{}", stop.description);
    assert_eq!(stop.fault_address, Some(Address::new(0xdead_beef)));
    assert_eq!(snapshot.crashed_thread(), Some(0));
}

#[test]
fn test_signal_without_fault_address()
{
    let bytes = linux_x86_64_dump().exception(16001, 6, 0, 0x1234, &[], None).build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();

    let stop = snapshot.stop_reason(0).unwrap();
    assert_eq!(stop.reason, StopReason::Signal(6));
    assert!(stop.description.contains("SIGABRT"));
    assert_eq!(stop.fault_address, None);
}

#[test]
fn test_requested_dump_is_not_a_crash()
{
    let bytes = linux_x86_64_dump()
        .exception(16001, DUMP_REQUESTED, 0, 0, &[], None)
        .build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();
    assert_eq!(snapshot.stop_reason(0).unwrap().reason, StopReason::None);
    assert_eq!(snapshot.crashed_thread(), None);
}

#[test]
fn test_only_the_faulting_thread_stops()
{
    let context = x86_64_context(&[("rip", 0x1000)]);
    let bytes = DumpBuilder::new()
        .system_info(processor::AMD64, platform::WIN32_NT)
        .thread(10, &context, None)
        .thread(20, &context, None)
        .exception(20, 0xc000_0005, 0, 0x7ff6_0000_1000, &[1, 0x40], None)
        .build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();

    assert_eq!(snapshot.stop_reason(0).unwrap().reason, StopReason::None);
    let stop = snapshot.stop_reason(1).unwrap();
    assert_eq!(stop.reason, StopReason::Exception(0xc000_0005));
    assert_eq!(stop.description, "EXCEPTION_ACCESS_VIOLATION: write of 0x0000000000000040");
    assert_eq!(stop.fault_address, Some(Address::new(0x40)));
    assert_eq!(snapshot.crashed_thread(), Some(1));
}

#[test]
fn test_mach_exception()
{
    let context = x86_64_context(&[("rip", 0x1000)]);
    let bytes = DumpBuilder::new()
        .system_info(processor::AMD64, platform::MACOS)
        .thread(3, &context, None)
        .exception(3, 1, 0xd, 0x10, &[], None)
        .build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();

    let stop = snapshot.stop_reason(0).unwrap();
    assert_eq!(stop.reason, StopReason::Exception(1));
    assert_eq!(stop.reason.kind(), "exception");
    assert!(stop.description.starts_with("EXC_BAD_ACCESS"));
}

#[test]
fn test_exception_context_overrides_thread_context()
{
    let bytes = linux_x86_64_dump()
        .exception(16001, 11, 0, 0, &[], Some(x86_64_context(&[("rip", 0x40_0999)]).as_slice()))
        .build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();
    assert_eq!(snapshot.register(0, 0, "rip").unwrap().as_u64(), 0x40_0999);
}

#[test]
fn test_exception_for_unknown_thread()
{
    let bytes = linux_x86_64_dump().exception(99, 11, 0, 0, &[], None).build();
    let snapshot = load_core(&bytes, &LoadOptions::default()).unwrap();

    assert!(snapshot
        .diagnostics()
        .contains(&Diagnostic::UnknownExceptionThread(ThreadId(99))));
    assert_eq!(snapshot.stop_reason(0).unwrap().reason, StopReason::None);
}

#[test]
fn test_execution_control_is_rejected()
{
    let mut snapshot = load_core(&linux_x86_64_dump().build(), &LoadOptions::default()).unwrap();
    let pc = snapshot.register(0, 0, "pc").unwrap();

    assert!(matches!(
        snapshot.resume(),
        Err(MortemError::SnapshotImmutable { operation: "resume" })
    ));
    assert!(matches!(snapshot.step(0), Err(MortemError::SnapshotImmutable { .. })));
    assert!(matches!(
        snapshot.write_memory(Address::new(0x7ffd_0000_0000), &[0]),
        Err(MortemError::SnapshotImmutable { .. })
    ));
    assert!(snapshot.suspend().is_ok());

    assert!(snapshot.is_stopped());
    assert_eq!(snapshot.register(0, 0, "pc").unwrap(), pc);
    assert_eq!(snapshot.stop_reason(0).unwrap().reason, StopReason::None);
    assert_eq!(
        snapshot.read_memory(Address::new(0x7ffd_0000_0000), 4).bytes(),
        &0u32.to_le_bytes()
    );
}
