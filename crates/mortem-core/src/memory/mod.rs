//! # Memory Map Builder
//!
//! Reconstructs the address space of the dumped process.
//!
//! ## Region sources
//!
//! Region boundaries and permissions come from the most precise stream the
//! dump carries, in this order:
//!
//! 1. `LinuxMaps`: a copy of `/proc/<pid>/maps` (exact permissions and paths)
//! 2. `MemoryInfoList`: Windows-style region records (`PAGE_*` protections)
//! 3. The captured memory ranges themselves
//!
//! With one of the first two sources, captured bytes that fall outside every
//! listed region are still added as mapped, readable regions. With neither,
//! every captured range becomes a readable region and is marked executable
//! where it intersects the code of a loaded module.
//!
//! ## Lookup
//!
//! Regions are kept in a sorted `Vec` and found with a binary search. An
//! address between regions gets an unmapped region covering the whole gap,
//! from the end of the previous region (or 0) up to the start of the next
//! one (or the top of the 64-bit address space).

mod captured;

pub use captured::CapturedMemory;
use tracing::debug;

use crate::dump::format::{memory_state, page_protection, RawMemoryInfo};
use crate::dump::linux::MapsEntry;
use crate::error::{MortemError, Result};
use crate::modules::ModuleList;
use crate::types::{Address, AddressRange, MemoryRegion, Permissions};

/// Which stream the region boundaries came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSource
{
    /// `/proc/<pid>/maps` copy
    LinuxMaps,
    /// `MemoryInfoList` stream
    MemoryInfo,
    /// Captured memory ranges only
    Captured,
}

/// Inputs to [`MemoryMap::build`]
#[derive(Debug)]
pub struct RegionSources<'a>
{
    /// Parsed `LinuxMaps` stream, if present
    pub linux_maps: Option<Vec<MapsEntry>>,
    /// Parsed `MemoryInfoList` stream, if present
    pub memory_info: Option<Vec<RawMemoryInfo>>,
    /// Captured memory
    pub captured: &'a CapturedMemory,
    /// Loaded modules, for naming and the execute heuristic
    pub modules: &'a ModuleList,
}

/// Why a read stopped short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStop
{
    /// The next byte is in no mapped region
    Unmapped,
    /// The next byte is mapped but its contents were not saved in the dump
    NotCaptured,
}

/// Outcome of [`Target::read_memory`](crate::Target::read_memory)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRead
{
    /// Every requested byte was captured
    Full(Vec<u8>),
    /// A prefix of the request was captured
    Partial
    {
        /// The bytes that could be read
        bytes: Vec<u8>,
        /// Why reading stopped
        stop: ReadStop,
    },
    /// The first byte is mapped, but not captured in the dump
    NotCaptured,
    /// The first byte is not mapped at all
    Unmapped,
}

impl MemoryRead
{
    /// The bytes read, possibly empty
    pub fn bytes(&self) -> &[u8]
    {
        match self {
            MemoryRead::Full(bytes) | MemoryRead::Partial { bytes, .. } => bytes,
            MemoryRead::NotCaptured | MemoryRead::Unmapped => &[],
        }
    }

    /// `true` only for [`MemoryRead::Full`]
    pub fn is_full(&self) -> bool
    {
        matches!(self, MemoryRead::Full(_))
    }
}

/// Ordered, non-overlapping region table
#[derive(Debug, Clone)]
pub struct MemoryMap
{
    regions: Vec<MemoryRegion>,
    source: RegionSource,
}

impl MemoryMap
{
    /// Build the region table from the available sources
    ///
    /// ## Errors
    ///
    /// [`MortemError::CorruptMemoryMap`] if the supplemental regions overlap.
    pub fn build(sources: RegionSources<'_>) -> Result<Self>
    {
        let RegionSources {
            linux_maps,
            memory_info,
            captured,
            modules,
        } = sources;

        let (source, regions) = if let Some(maps) = linux_maps {
            (RegionSource::LinuxMaps, regions_from_maps(maps))
        } else if let Some(info) = memory_info {
            (RegionSource::MemoryInfo, regions_from_memory_info(&info))
        } else {
            (RegionSource::Captured, regions_from_captured(captured, modules))
        };

        let mut regions = sorted_without_overlap(regions)?;
        if source != RegionSource::Captured {
            let extra = uncovered_captured(captured, &regions, modules);
            if !extra.is_empty() {
                debug!(count = extra.len(), "Adding captured ranges missing from the region list");
                regions.extend(extra);
                regions.sort_by_key(|region| region.start);
            }
        }

        debug!(?source, regions = regions.len(), "Built memory map");
        Ok(Self { regions, source })
    }

    /// Region containing `address`, or the unmapped gap around it
    pub fn region_at(&self, address: Address) -> MemoryRegion
    {
        let index = self.regions.partition_point(|region| region.end <= address);
        if let Some(region) = self.regions.get(index).filter(|region| region.start <= address) {
            return region.clone();
        }

        let start = index
            .checked_sub(1)
            .map_or(Address::ZERO, |previous| self.regions[previous].end);
        let end = self.regions.get(index).map_or(Address::MAX, |next| next.start);
        MemoryRegion::unmapped(start, end)
    }

    /// All mapped regions in ascending order
    pub fn regions(&self) -> &[MemoryRegion]
    {
        &self.regions
    }

    /// Stream the boundaries came from
    pub fn source(&self) -> RegionSource
    {
        self.source
    }
}

fn regions_from_maps(maps: Vec<MapsEntry>) -> Vec<MemoryRegion>
{
    maps.into_iter()
        .filter(|entry| !entry.range.is_empty())
        .map(|entry| MemoryRegion::mapped(entry.range.start, entry.range.end, entry.permissions, entry.path))
        .collect()
}

fn regions_from_memory_info(info: &[RawMemoryInfo]) -> Vec<MemoryRegion>
{
    info.iter()
        .filter(|entry| entry.state != memory_state::MEM_FREE && entry.region_size != 0)
        .filter_map(|entry| {
            let range = AddressRange::from_len(Address::new(entry.base_address), entry.region_size)?;
            let permissions = if entry.state == memory_state::MEM_COMMIT {
                protection_to_permissions(entry.protection)
            } else {
                Permissions::empty()
            };
            Some(MemoryRegion::mapped(range.start, range.end, permissions, None))
        })
        .collect()
}

/// Translate a `PAGE_*` protection into permission bits
pub fn protection_to_permissions(protection: u32) -> Permissions
{
    use page_protection::*;

    if protection & PAGE_GUARD != 0 {
        return Permissions::empty();
    }
    match protection & ACCESS_MASK {
        PAGE_READONLY => Permissions::READ,
        PAGE_READWRITE | PAGE_WRITECOPY => Permissions::READ | Permissions::WRITE,
        PAGE_EXECUTE => Permissions::EXECUTE,
        PAGE_EXECUTE_READ => Permissions::READ | Permissions::EXECUTE,
        PAGE_EXECUTE_READWRITE | PAGE_EXECUTE_WRITECOPY => Permissions::all(),
        _ => Permissions::empty(),
    }
}

fn regions_from_captured(captured: &CapturedMemory, modules: &ModuleList) -> Vec<MemoryRegion>
{
    let executable = modules.executable_ranges();
    let mut regions = Vec::new();
    for range in captured.ranges() {
        for (piece, is_code) in split_at_code_boundaries(range, &executable) {
            let mut permissions = Permissions::READ;
            permissions.set(Permissions::EXECUTE, is_code);
            regions.push(MemoryRegion::mapped(piece.start, piece.end, permissions, module_name(modules, piece.start)));
        }
    }
    regions
}

/// Split `range` so that each piece is either entirely inside or entirely
/// outside the (sorted, non-overlapping) executable ranges
fn split_at_code_boundaries(range: AddressRange, executable: &[AddressRange]) -> Vec<(AddressRange, bool)>
{
    let mut pieces = Vec::new();
    let mut cursor = range.start;
    let first = executable.partition_point(|code| code.end <= range.start);
    for code in &executable[first..] {
        if code.start >= range.end || cursor >= range.end {
            break;
        }
        if code.start > cursor {
            pieces.push((AddressRange::new(cursor, code.start), false));
            cursor = code.start;
        }
        let end = code.end.min(range.end);
        if end > cursor {
            pieces.push((AddressRange::new(cursor, end), true));
            cursor = end;
        }
    }
    if cursor < range.end {
        pieces.push((AddressRange::new(cursor, range.end), false));
    }
    pieces
}

fn sorted_without_overlap(mut regions: Vec<MemoryRegion>) -> Result<Vec<MemoryRegion>>
{
    regions.sort_by_key(|region| (region.start, region.end));
    for pair in regions.windows(2) {
        if pair[0].end > pair[1].start {
            return Err(MortemError::CorruptMemoryMap {
                first: pair[0].range(),
                second: pair[1].range(),
            });
        }
    }
    Ok(regions)
}

/// Captured bytes that no supplemental region covers
fn uncovered_captured(captured: &CapturedMemory, regions: &[MemoryRegion], modules: &ModuleList) -> Vec<MemoryRegion>
{
    let mut extra = Vec::new();
    for range in captured.ranges() {
        let mut cursor = range.start;
        let first = regions.partition_point(|region| region.end <= range.start);
        for region in &regions[first..] {
            if region.start >= range.end {
                break;
            }
            if region.start > cursor {
                extra.push(AddressRange::new(cursor, region.start));
            }
            cursor = cursor.max(region.end);
            if cursor >= range.end {
                break;
            }
        }
        if cursor < range.end {
            extra.push(AddressRange::new(cursor, range.end));
        }
    }

    extra
        .into_iter()
        .map(|range| MemoryRegion::mapped(range.start, range.end, Permissions::READ, module_name(modules, range.start)))
        .collect()
}

fn module_name(modules: &ModuleList, address: Address) -> Option<String>
{
    modules.module_for_address(address).map(|module| module.path.clone())
}
