//! Address and address-range types.

use std::fmt;
use std::ops::{Add, Sub};

/// An address in the dumped process
///
/// Addresses always come from the dump, never from the host, so every target
/// is treated as a 64-bit address space even when the dumped process was
/// 32-bit (ARM). The implicit ceiling of that space is `u64::MAX`.
///
/// ## Example
///
/// ```rust
/// use mortem_core::types::Address;
///
/// let base = Address::new(0x400000);
/// assert_eq!((base + 0x10).value(), 0x400010);
/// assert_eq!(base.to_string(), "0x0000000000400000");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address
{
    /// The null address
    pub const ZERO: Self = Address(0);

    /// The highest representable address
    pub const MAX: Self = Address(u64::MAX);

    /// Create an address (usable in const contexts)
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw `u64` value
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Add an offset, returning `None` on overflow
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract an offset, returning `None` on underflow
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Add an offset, clamping at [`Address::MAX`]
    pub fn saturating_add(self, offset: u64) -> Self
    {
        Address(self.0.saturating_add(offset))
    }

    /// Distance from `other` up to `self`, or `None` if `other` is higher
    pub fn offset_from(self, other: Address) -> Option<u64>
    {
        self.0.checked_sub(other.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(rhs))
    }
}

/// Half-open address range `[start, end)`
///
/// Used for memory records, regions and module extents. A range whose `end`
/// is `u64::MAX` is treated as reaching the top of the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddressRange
{
    /// First address in the range
    pub start: Address,
    /// One past the last address
    pub end: Address,
}

impl AddressRange
{
    /// Create a range from its bounds
    pub const fn new(start: Address, end: Address) -> Self
    {
        Self { start, end }
    }

    /// Create a range from a start address and a length
    ///
    /// Returns `None` if `start + len` overflows.
    pub fn from_len(start: Address, len: u64) -> Option<Self>
    {
        start.checked_add(len).map(|end| Self { start, end })
    }

    /// Number of bytes covered
    pub fn len(&self) -> u64
    {
        self.end.value().saturating_sub(self.start.value())
    }

    /// `true` when the range covers no bytes
    pub fn is_empty(&self) -> bool
    {
        self.end <= self.start
    }

    /// `true` if `address` lies inside the range
    pub fn contains(&self, address: Address) -> bool
    {
        self.start <= address && address < self.end
    }

    /// `true` if the two ranges share at least one byte
    pub fn overlaps(&self, other: &AddressRange) -> bool
    {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for AddressRange
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
