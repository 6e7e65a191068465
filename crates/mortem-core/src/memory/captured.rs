//! Bytes captured in the dump, indexed by address.

use tracing::debug;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dump::MemoryRecord;
use crate::error::{MortemError, Result};
use crate::types::{Address, AddressRange};
use crate::unwind::MemoryAccess;

#[derive(Debug, Clone, Copy)]
struct CapturedRange
{
    range: AddressRange,
    /// Offset of the first byte in `CapturedMemory::data`
    offset: usize,
}

/// Every memory range saved in the dump, with its bytes
///
/// The bytes are copied out of the dump buffer, so the snapshot never aliases
/// the caller's buffer. Ranges are sorted and non-overlapping.
#[derive(Debug, Clone, Default)]
pub struct CapturedMemory
{
    ranges: Vec<CapturedRange>,
    data: Vec<u8>,
}

impl CapturedMemory
{
    /// Index the memory records of a dump
    ///
    /// `dump` is the whole minidump buffer the record offsets point into.
    ///
    /// ## Errors
    ///
    /// [`MortemError::CorruptMemoryMap`] if two records overlap. Records that
    /// repeat the same range with the same bytes are dropped and reported as
    /// [`Diagnostic::DuplicateMemoryRange`].
    pub fn build(mut records: Vec<MemoryRecord>, dump: &[u8], diagnostics: &mut Diagnostics) -> Result<Self>
    {
        records.retain(|record| !record.range.is_empty());
        records.sort_by_key(|record| (record.range.start, record.range.end));

        let mut memory = CapturedMemory::default();
        let mut previous: Option<MemoryRecord> = None;
        for record in records {
            let bytes = record_bytes(dump, &record)?;
            if let Some(prev) = previous {
                if prev.range.overlaps(&record.range) {
                    if prev.range == record.range && record_bytes(dump, &prev)? == bytes {
                        diagnostics.push(Diagnostic::DuplicateMemoryRange(record.range));
                        continue;
                    }
                    return Err(MortemError::CorruptMemoryMap {
                        first: prev.range,
                        second: record.range,
                    });
                }
            }
            memory.push_range(record.range, bytes);
            previous = Some(record);
        }

        debug!(ranges = memory.ranges.len(), bytes = memory.data.len(), "Indexed captured memory");
        Ok(memory)
    }

    /// Add a range unless it overlaps memory already captured
    ///
    /// Thread stacks are usually listed in the memory list as well; this adds
    /// the ones that are not. Returns `false` if the range was not added
    /// because it overlaps an existing one.
    pub fn insert(&mut self, range: AddressRange, bytes: &[u8]) -> bool
    {
        if range.is_empty() {
            return true;
        }
        let index = self.ranges.partition_point(|captured| captured.range.end <= range.start);
        if self.ranges.get(index).is_some_and(|next| next.range.overlaps(&range)) {
            return false;
        }

        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        self.ranges.insert(index, CapturedRange { range, offset });
        true
    }

    /// Whether every byte of `range` is captured in one record
    pub fn covers(&self, range: AddressRange) -> bool
    {
        self.find(range.start).is_some_and(|captured| captured.range.end >= range.end)
    }

    /// Captured ranges in ascending order
    pub fn ranges(&self) -> impl Iterator<Item = AddressRange> + '_
    {
        self.ranges.iter().map(|captured| captured.range)
    }

    /// Number of captured ranges
    pub fn len(&self) -> usize
    {
        self.ranges.len()
    }

    /// Whether nothing was captured
    pub fn is_empty(&self) -> bool
    {
        self.ranges.is_empty()
    }

    /// Copy up to `len` contiguous captured bytes starting at `address`
    ///
    /// Adjacent records are read through as one. Stops at the first byte that
    /// is not captured; the returned address is where reading stopped.
    pub fn read_contiguous(&self, address: Address, len: usize) -> (Vec<u8>, Address)
    {
        let mut bytes = Vec::with_capacity(len.min(0x10000));
        let mut cursor = address;
        while bytes.len() < len {
            let Some(captured) = self.find(cursor) else {
                break;
            };
            let skip = cursor.offset_from(captured.range.start).unwrap_or(0) as usize;
            let available = captured.range.end.offset_from(cursor).unwrap_or(0) as usize;
            let take = available.min(len - bytes.len());
            let start = captured.offset + skip;
            bytes.extend_from_slice(&self.data[start..start + take]);
            match cursor.checked_add(take as u64) {
                Some(next) => cursor = next,
                None => break,
            }
        }
        (bytes, cursor)
    }

    fn push_range(&mut self, range: AddressRange, bytes: &[u8])
    {
        let offset = self.data.len();
        self.data.extend_from_slice(bytes);
        self.ranges.push(CapturedRange { range, offset });
    }

    fn find(&self, address: Address) -> Option<&CapturedRange>
    {
        let index = self.ranges.partition_point(|captured| captured.range.end <= address);
        self.ranges.get(index).filter(|captured| captured.range.contains(address))
    }

    fn read_exact(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let (bytes, _) = self.read_contiguous(address, len);
        if bytes.len() == len {
            Ok(bytes)
        } else {
            Err(MortemError::MemoryUnavailable { address, len })
        }
    }
}

impl MemoryAccess for CapturedMemory
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        let bytes = self.read_exact(address, 8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(word))
    }

    fn read_u32(&self, address: Address) -> Result<u32>
    {
        let bytes = self.read_exact(address, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes);
        Ok(u32::from_le_bytes(word))
    }
}

fn record_bytes<'a>(dump: &'a [u8], record: &MemoryRecord) -> Result<&'a [u8]>
{
    let len = usize::try_from(record.range.len())
        .map_err(|_| MortemError::Format(format!("memory range {} is too large", record.range)))?;
    record
        .data_offset
        .checked_add(len)
        .and_then(|end| dump.get(record.data_offset..end))
        .ok_or_else(|| MortemError::Format(format!("bytes of memory range {} lie outside the dump", record.range)))
}
