//! x86-64 register layout.
//!
//! ## Context layout (`CONTEXT_AMD64`, 1232 bytes)
//!
//! | Offset | Field |
//! |--------|-------|
//! | 48 | `context_flags` |
//! | 52 | `mxcsr` |
//! | 56..68 | `cs`, `ds`, `es`, `fs`, `gs`, `ss` (u16 each) |
//! | 68 | `eflags` (u32) |
//! | 72..120 | `dr0`-`dr3`, `dr6`, `dr7` |
//! | 120..248 | `rax`, `rcx`, `rdx`, `rbx`, `rsp`, `rbp`, `rsi`, `rdi`, `r8`-`r15` |
//! | 248 | `rip` |
//! | 256..768 | `XMM_SAVE_AREA32` (x87 state, `st0`-`st7`, `xmm0`-`xmm15`) |
//!
//! The argument aliases follow the calling convention of the platform:
//! System V (`rdi, rsi, rdx, rcx, r8, r9`) everywhere except Windows
//! (`rcx, rdx, r8, r9`).

use once_cell::sync::Lazy;

use super::{ContextKind, RegisterClass, RegisterLayout};

/// Size of `CONTEXT_AMD64`
pub const CONTEXT_SIZE: usize = 1232;

/// Layout with System V argument aliases
pub static SYSTEM_V: Lazy<RegisterLayout> = Lazy::new(|| layout(&["rdi", "rsi", "rdx", "rcx", "r8", "r9"]));

/// Layout with Windows x64 argument aliases
pub static WINDOWS: Lazy<RegisterLayout> = Lazy::new(|| layout(&["rcx", "rdx", "r8", "r9"]));

const GENERAL: [(&str, usize); 17] = [
    ("rax", 120),
    ("rbx", 144),
    ("rcx", 128),
    ("rdx", 136),
    ("rdi", 176),
    ("rsi", 168),
    ("rbp", 160),
    ("rsp", 152),
    ("r8", 184),
    ("r9", 192),
    ("r10", 200),
    ("r11", 208),
    ("r12", 216),
    ("r13", 224),
    ("r14", 232),
    ("r15", 240),
    ("rip", 248),
];

const SEGMENTS: [(&str, usize); 6] = [("cs", 56), ("ds", 58), ("es", 60), ("fs", 62), ("gs", 64), ("ss", 66)];

const DEBUG: [(&str, usize); 6] = [
    ("dr0", 72),
    ("dr1", 80),
    ("dr2", 88),
    ("dr3", 96),
    ("dr6", 104),
    ("dr7", 112),
];

const FLOAT_SAVE: usize = 256;

fn layout(arguments: &[&str]) -> RegisterLayout
{
    let mut table = RegisterLayout::builder(ContextKind::X86_64, CONTEXT_SIZE);

    for (name, offset) in GENERAL {
        table.register(name, offset, 8, RegisterClass::General);
    }
    table.register("rflags", 68, 4, RegisterClass::Status);
    for (name, offset) in SEGMENTS {
        table.register(name, offset, 2, RegisterClass::Segment);
    }

    // x87 and SSE state from XMM_SAVE_AREA32
    table.register("fctrl", FLOAT_SAVE, 2, RegisterClass::FloatingPoint);
    table.register("fstat", FLOAT_SAVE + 2, 2, RegisterClass::FloatingPoint);
    table.register("ftag", FLOAT_SAVE + 4, 1, RegisterClass::FloatingPoint);
    table.register("fop", FLOAT_SAVE + 6, 2, RegisterClass::FloatingPoint);
    table.register("fioff", FLOAT_SAVE + 8, 4, RegisterClass::FloatingPoint);
    table.register("fiseg", FLOAT_SAVE + 12, 2, RegisterClass::FloatingPoint);
    table.register("fooff", FLOAT_SAVE + 16, 4, RegisterClass::FloatingPoint);
    table.register("foseg", FLOAT_SAVE + 20, 2, RegisterClass::FloatingPoint);
    table.register("mxcsr", 52, 4, RegisterClass::Status);
    table.register("mxcsrmask", FLOAT_SAVE + 28, 4, RegisterClass::Status);
    for index in 0..8 {
        table.register(format!("st{index}"), FLOAT_SAVE + 32 + 16 * index, 10, RegisterClass::FloatingPoint);
    }
    for index in 0..16 {
        table.register(format!("xmm{index}"), FLOAT_SAVE + 160 + 16 * index, 16, RegisterClass::Vector);
    }

    for (name, offset) in DEBUG {
        table.register(name, offset, 8, RegisterClass::Debug);
    }

    // Legacy sub-registers. The 16-bit `sp` is left out: the name is the
    // generic stack pointer alias below.
    for (wide, dword, word, low, high) in [
        ("rax", "eax", "ax", "al", Some("ah")),
        ("rbx", "ebx", "bx", "bl", Some("bh")),
        ("rcx", "ecx", "cx", "cl", Some("ch")),
        ("rdx", "edx", "dx", "dl", Some("dh")),
        ("rdi", "edi", "di", "dil", None),
        ("rsi", "esi", "si", "sil", None),
        ("rbp", "ebp", "bp", "bpl", None),
        ("rsp", "esp", "", "spl", None),
    ] {
        let offset = offset_of(wide);
        table.alias(dword, offset, 4, RegisterClass::General);
        if !word.is_empty() {
            table.alias(word, offset, 2, RegisterClass::General);
        }
        table.alias(low, offset, 1, RegisterClass::General);
        if let Some(high) = high {
            table.alias(high, offset + 1, 1, RegisterClass::General);
        }
    }
    for index in 8..16 {
        let offset = offset_of(&format!("r{index}"));
        table.alias(format!("r{index}d"), offset, 4, RegisterClass::General);
        table.alias(format!("r{index}w"), offset, 2, RegisterClass::General);
        table.alias(format!("r{index}l"), offset, 1, RegisterClass::General);
    }

    table.alias_of("pc", "rip");
    table.alias_of("sp", "rsp");
    table.alias_of("fp", "rbp");
    table.alias_of("flags", "rflags");
    table.alias_of("eflags", "rflags");
    for (index, register) in arguments.iter().enumerate() {
        table.alias_of(&format!("arg{}", index + 1), register);
    }

    table.build()
}

fn offset_of(name: &str) -> usize
{
    GENERAL
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map_or(0, |(_, offset)| *offset)
}
