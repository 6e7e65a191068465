//! 32-bit ARM register layout.
//!
//! ## Context layout (`CONTEXT_ARM`, 368 bytes)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 0 | `context_flags` |
//! | 4..68 | `r0`-`r15` |
//! | 68 | `cpsr` |
//! | 72 | `fpscr` (u64) |
//! | 80..336 | `d0`-`d31` |
//! | 336..368 | `extra` |
//!
//! The VFP bank is stored as 32 doubles; the single-precision `s` registers
//! and the quad `q` registers are views over the same bytes. Apple uses `r7`
//! as the frame pointer, everyone else `r11`.

use once_cell::sync::Lazy;

use super::{ContextKind, RegisterClass, RegisterLayout};

/// Size of `CONTEXT_ARM`
pub const CONTEXT_SIZE: usize = 368;

/// Layout for non-Apple platforms (`fp` is `r11`)
pub static STANDARD: Lazy<RegisterLayout> = Lazy::new(|| layout("r11"));

/// Layout for iOS and macOS (`fp` is `r7`)
pub static APPLE: Lazy<RegisterLayout> = Lazy::new(|| layout("r7"));

const VFP: usize = 80;

fn layout(frame_pointer: &str) -> RegisterLayout
{
    let mut table = RegisterLayout::builder(ContextKind::Arm, CONTEXT_SIZE);

    for index in 0..16 {
        table.register(format!("r{index}"), 4 + 4 * index, 4, RegisterClass::General);
    }
    table.register("cpsr", 68, 4, RegisterClass::Status);
    table.register("fpscr", 72, 8, RegisterClass::Status);
    for index in 0..32 {
        table.register(format!("d{index}"), VFP + 8 * index, 8, RegisterClass::FloatingPoint);
    }
    for index in 0..32 {
        table.alias(format!("s{index}"), VFP + 4 * index, 4, RegisterClass::FloatingPoint);
    }
    for index in 0..16 {
        table.alias(format!("q{index}"), VFP + 16 * index, 16, RegisterClass::Vector);
    }

    table.alias_of("sp", "r13");
    table.alias_of("lr", "r14");
    table.alias_of("pc", "r15");
    table.alias_of("fp", frame_pointer);
    table.alias_of("flags", "cpsr");
    for index in 0..4 {
        table.alias_of(&format!("arg{}", index + 1), &format!("r{index}"));
    }

    table.build()
}
