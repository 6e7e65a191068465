//! ARM64 register layouts.
//!
//! Two context structures exist in the wild and both are still produced.
//!
//! ## `CONTEXT_ARM64` (912 bytes, Windows and current Breakpad/Crashpad)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | `context_flags` (u32) |
//! | 4 | `cpsr` |
//! | 8..264 | `x0`-`x30`, `sp` |
//! | 264 | `pc` |
//! | 272..784 | `v0`-`v31` |
//! | 784 | `fpsr` |
//! | 788 | `fpcr` |
//! | 792..912 | `bcr`, `bvr`, `wcr`, `wvr` debug registers |
//!
//! ## `CONTEXT_ARM64_OLD` (796 bytes, packed, older Breakpad)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | `context_flags` (u64) |
//! | 8..264 | `x0`-`x30`, `sp` |
//! | 264 | `pc` |
//! | 272 | `cpsr` (u32) |
//! | 276 | `fpsr` |
//! | 280 | `fpcr` |
//! | 284..796 | `v0`-`v31` |

use once_cell::sync::Lazy;
use scroll::{Pread, LE};

use super::{ContextKind, RegisterClass, RegisterLayout};

/// Size of `CONTEXT_ARM64`
pub const CONTEXT_SIZE: usize = 912;

/// Size of `CONTEXT_ARM64_OLD`
pub const OLD_CONTEXT_SIZE: usize = 796;

/// `context_flags` bit set by writers of `CONTEXT_ARM64`
pub const CONTEXT_ARM64: u32 = 0x0040_0000;

/// `context_flags` bit set by writers of `CONTEXT_ARM64_OLD`
pub const CONTEXT_ARM64_OLD: u32 = 0x8000_0000;

/// Current layout
pub static STANDARD: Lazy<RegisterLayout> = Lazy::new(|| {
    layout(
        ContextKind::Arm64,
        Offsets {
            size: CONTEXT_SIZE,
            cpsr: 4,
            vector: 272,
            fpsr: 784,
            fpcr: 788,
            debug: true,
        },
    )
});

/// Breakpad's packed layout
pub static BREAKPAD: Lazy<RegisterLayout> = Lazy::new(|| {
    layout(
        ContextKind::Arm64Old,
        Offsets {
            size: OLD_CONTEXT_SIZE,
            cpsr: 272,
            vector: 284,
            fpsr: 276,
            fpcr: 280,
            debug: false,
        },
    )
});

/// Tell the two layouts apart by their context flags
///
/// Writers that set neither flag are classified by blob size.
pub fn layout_for(context: &[u8]) -> &'static RegisterLayout
{
    let flags: u32 = context.pread_with(0, LE).unwrap_or(0);
    if flags & CONTEXT_ARM64 != 0 {
        &*STANDARD
    } else if flags & CONTEXT_ARM64_OLD != 0 || context.len() < CONTEXT_SIZE {
        &*BREAKPAD
    } else {
        &*STANDARD
    }
}

const GENERAL: usize = 8;
const PC: usize = 264;

struct Offsets
{
    size: usize,
    cpsr: usize,
    vector: usize,
    fpsr: usize,
    fpcr: usize,
    debug: bool,
}

fn layout(kind: ContextKind, offsets: Offsets) -> RegisterLayout
{
    let mut table = RegisterLayout::builder(kind, offsets.size);

    for index in 0..32 {
        table.register(format!("x{index}"), GENERAL + 8 * index, 8, RegisterClass::General);
    }
    table.register("pc", PC, 8, RegisterClass::General);
    table.register("cpsr", offsets.cpsr, 4, RegisterClass::Status);
    table.register("fpsr", offsets.fpsr, 4, RegisterClass::Status);
    table.register("fpcr", offsets.fpcr, 4, RegisterClass::Status);
    for index in 0..32 {
        table.register(format!("v{index}"), offsets.vector + 16 * index, 16, RegisterClass::Vector);
    }

    if offsets.debug {
        for index in 0..8 {
            table.register(format!("bcr{index}"), 792 + 4 * index, 4, RegisterClass::Debug);
            table.register(format!("bvr{index}"), 824 + 8 * index, 8, RegisterClass::Debug);
        }
        for index in 0..2 {
            table.register(format!("wcr{index}"), 888 + 4 * index, 4, RegisterClass::Debug);
            table.register(format!("wvr{index}"), 896 + 8 * index, 8, RegisterClass::Debug);
        }
    }

    for index in 0..32 {
        table.alias(format!("w{index}"), GENERAL + 8 * index, 4, RegisterClass::General);
    }
    for index in 0..32 {
        let offset = offsets.vector + 16 * index;
        table.alias(format!("q{index}"), offset, 16, RegisterClass::Vector);
        table.alias(format!("d{index}"), offset, 8, RegisterClass::FloatingPoint);
        table.alias(format!("s{index}"), offset, 4, RegisterClass::FloatingPoint);
        table.alias(format!("h{index}"), offset, 2, RegisterClass::FloatingPoint);
        table.alias(format!("b{index}"), offset, 1, RegisterClass::FloatingPoint);
    }

    table.alias_of("fp", "x29");
    table.alias_of("lr", "x30");
    table.alias_of("sp", "x31");
    table.alias_of("psr", "cpsr");
    table.alias_of("flags", "cpsr");
    for index in 0..8 {
        table.alias_of(&format!("arg{}", index + 1), &format!("x{index}"));
    }

    table.build()
}
