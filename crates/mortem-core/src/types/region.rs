//! Memory region types.

use std::fmt;

use bitflags::bitflags;

use super::{Address, AddressRange};

bitflags! {
    /// Access permissions of a memory region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u8
    {
        /// Readable
        const READ = 0b001;
        /// Writable
        const WRITE = 0b010;
        /// Executable
        const EXECUTE = 0b100;
    }
}

impl fmt::Display for Permissions
{
    /// Formats as the familiar `rwx` triple, with `-` for missing bits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let flag = |bit: Permissions, c: char| if self.contains(bit) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Permissions::READ, 'r'),
            flag(Permissions::WRITE, 'w'),
            flag(Permissions::EXECUTE, 'x')
        )
    }
}

/// One entry of the reconstructed address space
///
/// Regions handed out by a snapshot are sorted by `start` and never overlap.
/// A query that falls between regions gets an unmapped region spanning the
/// gap, with no permissions and no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion
{
    /// First address of the region
    pub start: Address,
    /// One past the last address
    pub end: Address,
    /// Access permissions (empty for unmapped gaps)
    pub permissions: Permissions,
    /// Whether the process had anything mapped here
    pub mapped: bool,
    /// Backing file or pseudo-path (`[stack]`, `/usr/lib/libc.so.6`, ...)
    pub name: Option<String>,
}

impl MemoryRegion
{
    /// Create a mapped region
    pub fn mapped(start: Address, end: Address, permissions: Permissions, name: Option<String>) -> Self
    {
        Self {
            start,
            end,
            permissions,
            mapped: true,
            name,
        }
    }

    /// Create an unmapped gap region
    pub fn unmapped(start: Address, end: Address) -> Self
    {
        Self {
            start,
            end,
            permissions: Permissions::empty(),
            mapped: false,
            name: None,
        }
    }

    /// The region's extent
    pub fn range(&self) -> AddressRange
    {
        AddressRange::new(self.start, self.end)
    }

    /// Size in bytes
    pub fn size(&self) -> u64
    {
        self.range().len()
    }

    /// Check if the region contains an address
    pub fn contains(&self, address: Address) -> bool
    {
        self.range().contains(address)
    }

    /// Check if the region is readable
    pub fn is_readable(&self) -> bool
    {
        self.permissions.contains(Permissions::READ)
    }

    /// Check if the region is writable
    pub fn is_writable(&self) -> bool
    {
        self.permissions.contains(Permissions::WRITE)
    }

    /// Check if the region is executable
    pub fn is_executable(&self) -> bool
    {
        self.permissions.contains(Permissions::EXECUTE)
    }
}

impl fmt::Display for MemoryRegion
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        let perms = if self.mapped {
            self.permissions.to_string()
        } else {
            "---".to_string()
        };
        write!(f, "{}-{} {perms}", self.start, self.end)?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}
