//! # Thread & Register Model
//!
//! Decodes the raw `CONTEXT` blob of each thread into named registers.
//!
//! ## Design
//!
//! Every supported context layout is a static table mapping register names to
//! an `(offset, width)` slice of the blob. A [`RegisterBank`] keeps the blob
//! itself plus a reference to its table, so reading a register is a slice and
//! nothing else:
//!
//! - aliases (`pc`, `sp`, `fp`, `lr`, `flags`, `argN`) point at the same bytes
//!   as the architectural register they stand for
//! - sub-registers (`w0`, `eax`, `al`, `s1`, `d0`, `h0`, `b0`...) are narrower
//!   slices inside their parent
//!
//! Both therefore always agree with the parent register byte for byte.
//!
//! ## Supported layouts
//!
//! | Layout | Context size | Selected by |
//! |--------|--------------|-------------|
//! | x86-64 (`CONTEXT_AMD64`) | 1232 | processor tag 9 |
//! | ARM (`CONTEXT_ARM`) | 368 | processor tag 5 |
//! | ARM64, Breakpad (`CONTEXT_ARM64_OLD`) | 796 | tag 0x8003, or tag 12 with the old context flag |
//! | ARM64 (`CONTEXT_ARM64`) | 912 | processor tag 12 |

pub mod arm;
pub mod arm64;
pub mod x86_64;

use std::collections::HashMap;
use std::fmt;

use smallvec::SmallVec;

use crate::dump::format::processor;
use crate::error::{MortemError, Result};
use crate::types::{Architecture, Platform};

/// Which context structure a blob follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind
{
    /// `CONTEXT_AMD64`
    X86_64,
    /// `CONTEXT_ARM`
    Arm,
    /// Breakpad's packed `CONTEXT_ARM64_OLD`
    Arm64Old,
    /// `CONTEXT_ARM64`
    Arm64,
}

impl ContextKind
{
    /// Architecture the layout belongs to
    pub const fn architecture(self) -> Architecture
    {
        match self {
            ContextKind::X86_64 => Architecture::X86_64,
            ContextKind::Arm => Architecture::Arm,
            ContextKind::Arm64Old | ContextKind::Arm64 => Architecture::Arm64,
        }
    }
}

/// Broad grouping of registers, for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass
{
    /// General-purpose integer registers (including pc/sp)
    General,
    /// Flags and control/status words
    Status,
    /// x86 segment selectors
    Segment,
    /// Scalar floating-point registers (x87, VFP `s`/`d`)
    FloatingPoint,
    /// SIMD registers (`xmm`, `q`, `v`)
    Vector,
    /// Hardware debug registers
    Debug,
}

/// One named slice of a context blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo
{
    /// Register name (lowercase)
    pub name: String,
    /// Byte offset within the context
    pub offset: usize,
    /// Width in bytes
    pub width: usize,
    /// Display group
    pub class: RegisterClass,
    /// `false` for aliases and sub-registers of another entry
    pub primary: bool,
}

/// Name table of one context layout
#[derive(Debug)]
pub struct RegisterLayout
{
    kind: ContextKind,
    context_size: usize,
    registers: Vec<RegisterInfo>,
    by_name: HashMap<String, usize>,
}

impl RegisterLayout
{
    /// Pick the layout for a thread context
    ///
    /// ARM64 dumps come in two layouts; the context flags tell them apart.
    ///
    /// ## Errors
    ///
    /// [`MortemError::UnsupportedArchitecture`] for processor tags without a
    /// layout (including 32-bit x86).
    pub fn select(processor_tag: u16, platform: Platform, context: &[u8]) -> Result<&'static RegisterLayout>
    {
        let layout: &'static RegisterLayout = match processor_tag {
            processor::AMD64 if platform == Platform::Windows => &*x86_64::WINDOWS,
            processor::AMD64 => &*x86_64::SYSTEM_V,
            processor::ARM if platform.is_apple() => &*arm::APPLE,
            processor::ARM => &*arm::STANDARD,
            processor::ARM64_OLD => &*arm64::BREAKPAD,
            processor::ARM64 => arm64::layout_for(context),
            other => return Err(MortemError::UnsupportedArchitecture(other)),
        };
        Ok(layout)
    }

    /// Start a table for `kind`, whose context is `context_size` bytes
    pub(crate) fn builder(kind: ContextKind, context_size: usize) -> LayoutBuilder
    {
        LayoutBuilder {
            layout: RegisterLayout {
                kind,
                context_size,
                registers: Vec::new(),
                by_name: HashMap::new(),
            },
        }
    }

    /// Context structure this table describes
    pub fn kind(&self) -> ContextKind
    {
        self.kind
    }

    /// Minimum size of a context blob
    pub fn context_size(&self) -> usize
    {
        self.context_size
    }

    /// Find a register by name (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<&RegisterInfo>
    {
        let index = match self.by_name.get(name) {
            Some(index) => *index,
            None => *self.by_name.get(&name.to_ascii_lowercase())?,
        };
        self.registers.get(index)
    }

    /// Every entry, in table order
    pub fn registers(&self) -> &[RegisterInfo]
    {
        &self.registers
    }
}

/// Accumulates the entries of a [`RegisterLayout`]
pub(crate) struct LayoutBuilder
{
    layout: RegisterLayout,
}

impl LayoutBuilder
{
    /// Add an architectural register
    pub(crate) fn register(&mut self, name: impl Into<String>, offset: usize, width: usize, class: RegisterClass)
    {
        self.push(name.into(), offset, width, class, true);
    }

    /// Add a name for a slice that another entry already covers
    pub(crate) fn alias(&mut self, name: impl Into<String>, offset: usize, width: usize, class: RegisterClass)
    {
        self.push(name.into(), offset, width, class, false);
    }

    /// Add a name for the full extent of an existing entry
    pub(crate) fn alias_of(&mut self, name: &str, target: &str)
    {
        if let Some(info) = self.layout.lookup(target).cloned() {
            self.alias(name, info.offset, info.width, info.class);
        }
    }

    pub(crate) fn build(self) -> RegisterLayout
    {
        self.layout
    }

    fn push(&mut self, name: String, offset: usize, width: usize, class: RegisterClass, primary: bool)
    {
        debug_assert!(offset + width <= self.layout.context_size, "{name} lies outside the context");
        let index = self.layout.registers.len();
        self.layout.by_name.entry(name.clone()).or_insert(index);
        self.layout.registers.push(RegisterInfo {
            name,
            offset,
            width,
            class,
            primary,
        });
    }
}

/// Raw value of one register, little-endian
///
/// ## Example
///
/// ```rust
/// use mortem_core::registers::RegisterValue;
///
/// let value = RegisterValue::from_bytes(&0x1122_3344u32.to_le_bytes());
/// assert_eq!(value.as_u64(), 0x1122_3344);
/// assert_eq!(value.to_string(), "0x11223344");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegisterValue
{
    bytes: SmallVec<[u8; 16]>,
}

impl RegisterValue
{
    /// Wrap raw little-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Self
    {
        Self {
            bytes: SmallVec::from_slice(bytes),
        }
    }

    /// Value of a 64-bit register, e.g. one recovered by unwinding
    pub fn from_u64(value: u64) -> Self
    {
        Self::from_bytes(&value.to_le_bytes())
    }

    /// Raw bytes in memory order
    pub fn bytes(&self) -> &[u8]
    {
        &self.bytes
    }

    /// Width in bytes
    pub fn width(&self) -> usize
    {
        self.bytes.len()
    }

    /// The low 64 bits, zero-extended
    pub fn as_u64(&self) -> u64
    {
        let mut word = [0u8; 8];
        let len = self.bytes.len().min(8);
        word[..len].copy_from_slice(&self.bytes[..len]);
        u64::from_le_bytes(word)
    }

    /// The low 128 bits, zero-extended
    pub fn as_u128(&self) -> u128
    {
        let mut word = [0u8; 16];
        let len = self.bytes.len().min(16);
        word[..len].copy_from_slice(&self.bytes[..len]);
        u128::from_le_bytes(word)
    }
}

impl fmt::Display for RegisterValue
{
    /// Hex, most significant byte first, padded to the register width.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x")?;
        for byte in self.bytes.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Registers of one thread, decoded lazily from its context blob
#[derive(Debug, Clone)]
pub struct RegisterBank
{
    layout: &'static RegisterLayout,
    context: Box<[u8]>,
}

impl RegisterBank
{
    /// Copy a context blob and attach its layout
    ///
    /// ## Errors
    ///
    /// - [`MortemError::UnsupportedArchitecture`] if no layout fits
    /// - [`MortemError::Format`] if the blob is shorter than the layout
    pub fn new(processor_tag: u16, platform: Platform, context: &[u8]) -> Result<Self>
    {
        let layout = RegisterLayout::select(processor_tag, platform, context)?;
        if context.len() < layout.context_size {
            return Err(MortemError::Format(format!(
                "{:?} context of {} bytes is shorter than the expected {}",
                layout.kind,
                context.len(),
                layout.context_size
            )));
        }
        Ok(Self {
            layout,
            context: context.into(),
        })
    }

    /// Layout in use
    pub fn layout(&self) -> &'static RegisterLayout
    {
        self.layout
    }

    /// Architecture of the context
    pub fn architecture(&self) -> Architecture
    {
        self.layout.kind.architecture()
    }

    /// Read a register, alias or sub-register by name
    pub fn read(&self, name: &str) -> Result<RegisterValue>
    {
        let info = self
            .layout
            .lookup(name)
            .ok_or_else(|| MortemError::UnknownRegister(name.to_string()))?;
        self.read_info(info)
    }

    /// Read the slice an entry describes
    pub fn read_info(&self, info: &RegisterInfo) -> Result<RegisterValue>
    {
        self.context
            .get(info.offset..info.offset + info.width)
            .map(RegisterValue::from_bytes)
            .ok_or_else(|| MortemError::UnknownRegister(info.name.clone()))
    }

    /// Program counter
    pub fn pc(&self) -> u64
    {
        self.generic("pc")
    }

    /// Stack pointer
    pub fn sp(&self) -> u64
    {
        self.generic("sp")
    }

    /// Frame pointer
    pub fn fp(&self) -> u64
    {
        self.generic("fp")
    }

    /// Link register, on architectures that have one
    pub fn lr(&self) -> Option<u64>
    {
        self.read("lr").ok().map(|value| value.as_u64())
    }

    /// Architectural registers (no aliases), in table order
    pub fn primary(&self) -> impl Iterator<Item = (&'static RegisterInfo, RegisterValue)> + '_
    {
        self.layout
            .registers
            .iter()
            .filter(|info| info.primary)
            .filter_map(|info| self.read_info(info).ok().map(|value| (info, value)))
    }

    fn generic(&self, name: &str) -> u64
    {
        self.read(name).map_or(0, |value| value.as_u64())
    }
}
