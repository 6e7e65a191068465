//! Tests for platform-agnostic types

use mortem_core::types::{StackFrame, ThreadStop};
use mortem_core::{
    Address, AddressRange, Architecture, MemoryRegion, Permissions, Platform, ProcessId, StopReason, ThreadId,
};

#[test]
fn test_process_id_conversions()
{
    let pid = ProcessId::from(12345);
    assert_eq!(pid.0, 12345);
    let value: u32 = pid.into();
    assert_eq!(value, 12345);
    assert_ne!(pid, ProcessId::from(54321));
}

#[test]
fn test_thread_id_display()
{
    let tid = ThreadId::from(0x1f);
    assert_eq!(tid.raw(), 0x1f);
    assert_eq!(tid.to_string(), "31");
}

#[test]
fn test_address_arithmetic()
{
    let base = Address::new(0x1000);
    assert_eq!(base + 0x10, Address::new(0x1010));
    assert_eq!(base - 0x10, Address::new(0xff0));
    assert_eq!(base.checked_sub(0x2000), None);
    assert_eq!(Address::MAX.checked_add(1), None);
    assert_eq!(Address::MAX.saturating_add(5), Address::MAX);
    assert_eq!(Address::new(0x1010).offset_from(base), Some(0x10));
    assert_eq!(base.offset_from(Address::new(0x1010)), None);
    assert_eq!(format!("{base:x}"), "1000");
    assert_eq!(base.to_string(), "0x0000000000001000");
}

#[test]
fn test_address_range()
{
    let range = AddressRange::from_len(Address::new(0x1000), 0x100).unwrap();
    assert_eq!(range.len(), 0x100);
    assert!(range.contains(Address::new(0x1000)));
    assert!(range.contains(Address::new(0x10ff)));
    assert!(!range.contains(Address::new(0x1100)));
    assert!(range.overlaps(&AddressRange::new(Address::new(0x10ff), Address::new(0x2000))));
    assert!(!range.overlaps(&AddressRange::new(Address::new(0x1100), Address::new(0x2000))));
    assert!(AddressRange::from_len(Address::MAX, 1).is_none());
    assert!(AddressRange::new(Address::new(5), Address::new(5)).is_empty());
}

#[test]
fn test_memory_region_mapped()
{
    let region = MemoryRegion::mapped(
        Address::new(0x1000),
        Address::new(0x3000),
        Permissions::READ | Permissions::EXECUTE,
        Some("/usr/lib/libc.so.6".to_string()),
    );

    assert!(region.mapped);
    assert_eq!(region.size(), 0x2000);
    assert!(region.contains(Address::new(0x2fff)));
    assert!(region.is_readable());
    assert!(region.is_executable());
    assert!(!region.is_writable());
    assert_eq!(
        region.to_string(),
        "0x0000000000001000-0x0000000000003000 r-x /usr/lib/libc.so.6"
    );
}

#[test]
fn test_memory_region_unmapped()
{
    let region = MemoryRegion::unmapped(Address::ZERO, Address::new(0x1000));
    assert!(!region.mapped);
    assert_eq!(region.permissions, Permissions::empty());
    assert_eq!(region.name, None);
    assert_eq!(region.to_string(), "0x0000000000000000-0x0000000000001000 ---");
}

#[test]
fn test_permissions_display()
{
    assert_eq!(Permissions::all().to_string(), "rwx");
    assert_eq!(Permissions::WRITE.to_string(), "-w-");
    assert_eq!(Permissions::empty().to_string(), "---");
}

#[test]
fn test_architecture_pointer_size()
{
    assert_eq!(Architecture::Arm.pointer_size_bytes(), 4);
    assert_eq!(Architecture::Arm64.pointer_size_bytes(), 8);
    assert_eq!(Architecture::X86_64.pointer_size_bytes(), 8);
    assert_eq!(Architecture::X86_64.to_string(), "x86_64");
    assert_eq!(Architecture::Arm.to_string(), "arm");
    assert_eq!(Architecture::Arm64.to_string(), "arm64");
}

#[test]
fn test_platform_display()
{
    assert_eq!(Platform::Linux.to_string(), "linux");
    assert_eq!(Platform::Unknown(0x9999).to_string(), "unknown (0x9999)");
    assert!(Platform::Ios.is_apple());
    assert!(!Platform::Android.is_apple());
}

#[test]
fn test_thread_stop_display()
{
    let none = ThreadStop::none();
    assert!(!none.is_crash());
    assert_eq!(none.to_string(), "none");

    let stop = ThreadStop {
        reason: StopReason::Signal(11),
        description: "signal SIGSEGV: fault address 0x0000000000000000".to_string(),
        fault_address: Some(Address::ZERO),
    };
    assert!(stop.is_crash());
    assert_eq!(stop.to_string(), "signal: signal SIGSEGV: fault address 0x0000000000000000");
}

#[test]
fn test_stack_frame_is_copy()
{
    let frame = StackFrame {
        index: 0,
        pc: Address::new(0x1000),
        sp: Address::new(0x7000),
        fp: Address::ZERO,
        status: mortem_core::types::FrameStatus::Context,
    };
    let copy = frame;
    assert_eq!(frame, copy);
}
