//! # Frame-Pointer Unwinding
//!
//! Recovers the outer frames of a thread from its captured stack.
//!
//! Frame 0 is the thread context itself. Each further frame follows the
//! saved frame-pointer chain through captured memory:
//!
//! ```text
//! [fp]            saved fp of the caller
//! [fp + word]     return address
//! fp + 2 * word   stack pointer of the caller
//! ```
//!
//! 32-bit ARM outside Apple platforms follows GCC, whose `push {fp, lr}`
//! prologue leaves `fp` pointing at the saved return address instead:
//!
//! ```text
//! [fp - 4]        saved fp of the caller
//! [fp]            return address
//! fp + 4          stack pointer of the caller
//! ```
//!
//! On ARM and ARM64 a leaf function may not have pushed a frame record yet,
//! so when the chain cannot be followed from frame 0 the link register is
//! used as the caller's pc.
//!
//! The walk stops at a zero pc, when the stack pointer stops growing, when a
//! read leaves captured memory, or at the frame limit.

use tracing::trace;

use crate::error::Result;
use crate::registers::RegisterBank;
use crate::types::{Address, Architecture, FrameStatus, Platform, StackFrame};

/// Minimal memory accessor required for stack unwinding.
pub trait MemoryAccess
{
    fn read_u64(&self, address: Address) -> Result<u64>;

    fn read_u32(&self, address: Address) -> Result<u32>;
}

/// Frame-pointer stack walker over captured memory.
pub struct FrameWalker<'a, M>
{
    architecture: Architecture,
    record: FrameRecord,
    memory: &'a M,
}

/// Where a frame record keeps the caller's fp and return address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameRecord
{
    /// `[fp]` saved fp, `[fp + word]` return address
    Standard,
    /// `[fp - word]` saved fp, `[fp]` return address
    Gcc,
}

#[derive(Debug, Clone, Copy)]
struct Cursor
{
    pc: u64,
    sp: u64,
    fp: u64,
}

impl<'a, M: MemoryAccess> FrameWalker<'a, M>
{
    pub fn new(architecture: Architecture, platform: Platform, memory: &'a M) -> Self
    {
        let record = if architecture == Architecture::Arm && !platform.is_apple() {
            FrameRecord::Gcc
        } else {
            FrameRecord::Standard
        };
        Self {
            architecture,
            record,
            memory,
        }
    }

    /// Walk the stack of one thread, innermost frame first
    ///
    /// Always returns at least frame 0 when `max_frames` is non-zero.
    pub fn walk(&self, registers: &RegisterBank, max_frames: usize) -> Vec<StackFrame>
    {
        let mut frames = Vec::new();
        let mut cursor = Cursor {
            pc: registers.pc(),
            sp: registers.sp(),
            fp: registers.fp(),
        };
        let mut status = FrameStatus::Context;

        while frames.len() < max_frames {
            frames.push(StackFrame {
                index: frames.len(),
                pc: Address::new(cursor.pc),
                sp: Address::new(cursor.sp),
                fp: Address::new(cursor.fp),
                status,
            });

            let step = self.frame_pointer_step(cursor).or_else(|| {
                if status == FrameStatus::Context {
                    self.link_register_step(cursor, registers)
                } else {
                    None
                }
            });
            let Some((next, next_status)) = step else {
                break;
            };
            if next.pc == 0 {
                break;
            }

            cursor = next;
            status = next_status;
        }

        trace!(frames = frames.len(), "Walked frame-pointer chain");
        frames
    }

    fn word_size(&self) -> u64
    {
        u64::from(self.architecture.pointer_size_bytes())
    }

    fn read_word(&self, address: u64) -> Option<u64>
    {
        let address = Address::new(address);
        match self.word_size() {
            4 => self.memory.read_u32(address).ok().map(u64::from),
            _ => self.memory.read_u64(address).ok(),
        }
    }

    fn frame_pointer_step(&self, cursor: Cursor) -> Option<(Cursor, FrameStatus)>
    {
        if cursor.fp == 0 {
            return None;
        }

        let word = self.word_size();
        let (saved_fp, return_address, sp) = match self.record {
            FrameRecord::Standard => (
                self.read_word(cursor.fp)?,
                self.read_word(cursor.fp.checked_add(word)?)?,
                cursor.fp.checked_add(2 * word)?,
            ),
            FrameRecord::Gcc => (
                self.read_word(cursor.fp.checked_sub(word)?)?,
                self.read_word(cursor.fp)?,
                cursor.fp.checked_add(word)?,
            ),
        };

        // The caller's frame lives above ours; anything else is a loop or garbage.
        if sp <= cursor.sp {
            return None;
        }

        Some((
            Cursor {
                pc: return_address,
                sp,
                fp: saved_fp,
            },
            FrameStatus::FramePointer,
        ))
    }

    fn link_register_step(&self, cursor: Cursor, registers: &RegisterBank) -> Option<(Cursor, FrameStatus)>
    {
        if !matches!(self.architecture, Architecture::Arm | Architecture::Arm64) {
            return None;
        }

        let lr = registers.lr()?;
        if lr == 0 || lr == cursor.pc {
            return None;
        }

        Some((Cursor { pc: lr, ..cursor }, FrameStatus::LinkRegister))
    }
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::dump::format::processor;
    use crate::error::MortemError;
    use crate::registers::{arm, arm64, x86_64};
    use crate::types::Platform;

    #[derive(Default)]
    struct FakeMemory
    {
        words: HashMap<u64, u64>,
    }

    impl MemoryAccess for FakeMemory
    {
        fn read_u64(&self, address: Address) -> Result<u64>
        {
            self.words
                .get(&address.value())
                .copied()
                .ok_or(MortemError::MemoryUnavailable { address, len: 8 })
        }

        fn read_u32(&self, address: Address) -> Result<u32>
        {
            self.read_u64(address).map(|value| value as u32)
        }
    }

    fn x86_64_bank(pc: u64, sp: u64, fp: u64) -> RegisterBank
    {
        let mut context = vec![0u8; x86_64::CONTEXT_SIZE];
        context[248..256].copy_from_slice(&pc.to_le_bytes());
        context[152..160].copy_from_slice(&sp.to_le_bytes());
        context[160..168].copy_from_slice(&fp.to_le_bytes());
        RegisterBank::new(processor::AMD64, Platform::Linux, &context).unwrap()
    }

    #[test]
    fn test_follows_frame_pointer_chain()
    {
        let mut memory = FakeMemory::default();
        memory.words.insert(0x7000, 0x7100);
        memory.words.insert(0x7008, 0x40_2000);
        memory.words.insert(0x7100, 0);
        memory.words.insert(0x7108, 0x40_3000);

        let bank = x86_64_bank(0x40_1000, 0x6ff0, 0x7000);
        let frames = FrameWalker::new(Architecture::X86_64, Platform::Linux, &memory).walk(&bank, 16);

        let pcs: Vec<u64> = frames.iter().map(|frame| frame.pc.value()).collect();
        assert_eq!(pcs, vec![0x40_1000, 0x40_2000, 0x40_3000]);
        assert_eq!(frames[0].status, FrameStatus::Context);
        assert_eq!(frames[1].status, FrameStatus::FramePointer);
        assert_eq!(frames[1].sp, Address::new(0x7010));
        assert_eq!(frames[2].fp, Address::ZERO);
    }

    #[test]
    fn test_stops_without_progress()
    {
        let mut memory = FakeMemory::default();
        memory.words.insert(0x7000, 0x7000);
        memory.words.insert(0x7008, 0x40_2000);

        let bank = x86_64_bank(0x40_1000, 0x6ff0, 0x7000);
        let frames = FrameWalker::new(Architecture::X86_64, Platform::Linux, &memory).walk(&bank, 16);
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_respects_frame_limit()
    {
        let memory = FakeMemory::default();
        let bank = x86_64_bank(0x40_1000, 0x6ff0, 0);
        assert_eq!(FrameWalker::new(Architecture::X86_64, Platform::Linux, &memory).walk(&bank, 1).len(), 1);
        assert!(FrameWalker::new(Architecture::X86_64, Platform::Linux, &memory).walk(&bank, 0).is_empty());
    }

    #[test]
    fn test_link_register_fallback_on_arm64()
    {
        let mut context = vec![0u8; arm64::CONTEXT_SIZE];
        context[..4].copy_from_slice(&arm64::CONTEXT_ARM64.to_le_bytes());
        context[8 + 8 * 30..8 + 8 * 31].copy_from_slice(&0x1_0000_2000u64.to_le_bytes());
        context[8 + 8 * 31..8 + 8 * 32].copy_from_slice(&0x16f0_0000u64.to_le_bytes());
        context[264..272].copy_from_slice(&0x1_0000_1000u64.to_le_bytes());
        let bank = RegisterBank::new(processor::ARM64, Platform::MacOs, &context).unwrap();

        let frames = FrameWalker::new(Architecture::Arm64, Platform::MacOs, &FakeMemory::default()).walk(&bank, 16);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].pc, Address::new(0x1_0000_2000));
        assert_eq!(frames[1].status, FrameStatus::LinkRegister);
    }

    fn arm_bank(platform: Platform, pc: u32, sp: u32, fp_register: usize, fp: u32) -> RegisterBank
    {
        let mut context = vec![0u8; arm::CONTEXT_SIZE];
        context[4 + 4 * fp_register..8 + 4 * fp_register].copy_from_slice(&fp.to_le_bytes());
        context[4 + 4 * 13..4 + 4 * 14].copy_from_slice(&sp.to_le_bytes());
        context[4 + 4 * 15..4 + 4 * 16].copy_from_slice(&pc.to_le_bytes());
        RegisterBank::new(processor::ARM, platform, &context).unwrap()
    }

    #[test]
    fn test_gcc_arm_frame_record()
    {
        let mut memory = FakeMemory::default();
        // push {fp, lr}; add fp, sp, #4
        memory.words.insert(0x7ffc, 0x8100);
        memory.words.insert(0x8000, 0x1_2000);
        memory.words.insert(0x80fc, 0);
        memory.words.insert(0x8100, 0x1_3000);

        let bank = arm_bank(Platform::Android, 0x1_1000, 0x7ff0, 11, 0x8000);
        let frames = FrameWalker::new(Architecture::Arm, Platform::Android, &memory).walk(&bank, 16);

        let pcs: Vec<u64> = frames.iter().map(|frame| frame.pc.value()).collect();
        assert_eq!(pcs, vec![0x1_1000, 0x1_2000, 0x1_3000]);
        assert_eq!(frames[1].sp, Address::new(0x8004));
        assert_eq!(frames[1].fp, Address::new(0x8100));
        assert_eq!(frames[2].sp, Address::new(0x8104));
    }

    #[test]
    fn test_apple_arm_frame_record()
    {
        let mut memory = FakeMemory::default();
        memory.words.insert(0x8000, 0);
        memory.words.insert(0x8004, 0x1_2000);

        let bank = arm_bank(Platform::Ios, 0x1_1000, 0x7ff0, 7, 0x8000);
        let frames = FrameWalker::new(Architecture::Arm, Platform::Ios, &memory).walk(&bank, 16);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].pc, Address::new(0x1_2000));
        assert_eq!(frames[1].sp, Address::new(0x8008));
    }
}
