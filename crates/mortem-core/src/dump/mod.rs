//! # Stream Reader
//!
//! Locates the minidump directory inside a byte buffer and decodes the typed
//! streams the snapshot is built from.
//!
//! ## Layout
//!
//! A minidump starts with a fixed header (`MDMP` signature) that points at a
//! directory of `(stream type, size, offset)` entries. Every other record is
//! reached through an offset (an "RVA") relative to the start of the file.
//!
//! ```text
//! +--------+-----------+------------------------------------------+
//! | header | directory | streams, strings, contexts, memory bytes |
//! +--------+-----------+------------------------------------------+
//! ```
//!
//! ## Guarantees
//!
//! - Parsing never panics on hostile input: every offset is bounds-checked
//!   and reported as [`MortemError::Format`].
//! - Unknown stream types are kept in the directory but not interpreted.
//! - When a stream type appears twice the first entry wins; later ones are
//!   listed by [`Minidump::duplicate_streams`].

pub mod format;
pub mod linux;

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use scroll::ctx::{SizeWith, TryFromCtx};
use scroll::{Endian, Pread, LE};
use tracing::{debug, warn};

use self::format::{
    stream_type, RawDirectory, RawExceptionStream, RawHeader, RawLocation, RawMemory64ListHeader, RawMemoryDescriptor,
    RawMemoryDescriptor64, RawMemoryInfo, RawMemoryInfoListHeader, RawMiscInfo, RawModule, RawSystemInfo, RawThread,
    MINIDUMP_SIGNATURE, MINIDUMP_VERSION,
};
use crate::error::{MortemError, Result};
use crate::types::{Address, AddressRange};

/// One entry of the stream directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry
{
    /// Raw stream type
    pub stream_type: u32,
    /// Offset of the stream from the start of the dump
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
}

impl DirectoryEntry
{
    /// Printable stream type name
    pub fn name(&self) -> &'static str
    {
        stream_type::name(self.stream_type)
    }
}

/// A captured memory range and where its bytes live in the dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRecord
{
    /// Address range in the dumped process
    pub range: AddressRange,
    /// Offset of the first byte within the dump
    pub data_offset: usize,
}

/// Parsed view over a minidump buffer
///
/// Borrows the buffer; nothing is copied until the snapshot is assembled.
///
/// ## Example
///
/// ```rust
/// use mortem_core::dump::Minidump;
///
/// let err = Minidump::parse(b"not a minidump at all, definitely not").unwrap_err();
/// assert!(err.to_string().contains("signature"));
/// ```
#[derive(Debug)]
pub struct Minidump<'a>
{
    data: &'a [u8],
    header: RawHeader,
    directory: Vec<DirectoryEntry>,
    first_by_type: HashMap<u32, usize>,
    duplicates: Vec<DirectoryEntry>,
}

impl<'a> Minidump<'a>
{
    /// Validate the header and directory of `data`
    ///
    /// ## Errors
    ///
    /// [`MortemError::Format`] if the signature is wrong, the header or the
    /// directory is truncated, or a directory entry points outside the buffer.
    pub fn parse(data: &'a [u8]) -> Result<Self>
    {
        let header: RawHeader = data
            .pread_with(0, LE)
            .map_err(|_| MortemError::Format(format!("buffer of {} bytes is too small for a header", data.len())))?;

        if header.signature != MINIDUMP_SIGNATURE {
            return Err(MortemError::Format(format!(
                "bad signature 0x{:08x} (expected 0x{MINIDUMP_SIGNATURE:08x})",
                header.signature
            )));
        }
        if header.version & 0xffff != MINIDUMP_VERSION {
            warn!(version = header.version, "Unexpected minidump version, parsing anyway");
        }

        let entry_size = RawDirectory::size_with(&LE);
        let count = header.stream_count as usize;
        let directory_bytes = count
            .checked_mul(entry_size)
            .and_then(|len| slice(data, header.stream_directory_rva as usize, len).ok())
            .ok_or_else(|| {
                MortemError::Format(format!(
                    "stream directory of {count} entries at 0x{:x} is truncated",
                    header.stream_directory_rva
                ))
            })?;

        let mut directory = Vec::with_capacity(count);
        let mut first_by_type = HashMap::new();
        let mut duplicates = Vec::new();
        for index in 0..count {
            let raw: RawDirectory = directory_bytes.pread_with(index * entry_size, LE)?;
            let entry = DirectoryEntry {
                stream_type: raw.stream_type,
                offset: raw.location.rva,
                size: raw.location.data_size,
            };
            if slice(data, entry.offset as usize, entry.size as usize).is_err() {
                return Err(MortemError::Format(format!(
                    "{} stream (type 0x{:x}) at 0x{:x}+{} lies outside the {}-byte dump",
                    entry.name(),
                    entry.stream_type,
                    entry.offset,
                    entry.size,
                    data.len()
                )));
            }

            if first_by_type.contains_key(&entry.stream_type) {
                debug!(stream = entry.name(), offset = entry.offset, "Ignoring duplicate stream");
                duplicates.push(entry);
            } else {
                first_by_type.insert(entry.stream_type, index);
            }
            directory.push(entry);
        }

        debug!(streams = count, bytes = data.len(), "Parsed minidump directory");

        Ok(Self {
            data,
            header,
            directory,
            first_by_type,
            duplicates,
        })
    }

    /// The raw header
    pub fn header(&self) -> &RawHeader
    {
        &self.header
    }

    /// Time the dump was written, if the stamp is set
    pub fn time_date_stamp(&self) -> Option<DateTime<Utc>>
    {
        if self.header.time_date_stamp == 0 {
            return None;
        }
        DateTime::from_timestamp(i64::from(self.header.time_date_stamp), 0)
    }

    /// All directory entries in file order, including unknown and duplicate ones
    pub fn directory(&self) -> &[DirectoryEntry]
    {
        &self.directory
    }

    /// Entries that repeat an earlier stream type and were ignored
    pub fn duplicate_streams(&self) -> &[DirectoryEntry]
    {
        &self.duplicates
    }

    /// Whether a stream of the given type is present
    pub fn has_stream(&self, stream_type: u32) -> bool
    {
        self.first_by_type.contains_key(&stream_type)
    }

    /// Bytes of the first stream with the given type, or `None` if not present
    pub fn read_stream(&self, stream_type: u32) -> Option<&'a [u8]>
    {
        let entry = self.directory[*self.first_by_type.get(&stream_type)?];
        // Bounds were checked in `parse`.
        self.data.get(entry.offset as usize..(entry.offset as usize + entry.size as usize))
    }

    /// Bytes referenced by a location descriptor
    pub fn location(&self, location: RawLocation) -> Result<&'a [u8]>
    {
        slice(self.data, location.rva as usize, location.data_size as usize)
    }

    /// `len` bytes at `offset`, bounds-checked
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&'a [u8]>
    {
        slice(self.data, offset, len)
    }

    /// Decode a `MINIDUMP_STRING` (length-prefixed UTF-16LE)
    pub fn read_string(&self, rva: u32) -> Result<String>
    {
        let offset = rva as usize;
        let len: u32 = self.data.pread_with(offset, LE)?;
        let bytes = slice(self.data, offset + 4, len as usize)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let mut text = String::from_utf16_lossy(&units);
        while text.ends_with('\0') {
            text.pop();
        }
        Ok(text)
    }

    /// Thread records (empty when the stream is absent)
    pub fn threads(&self) -> Result<Vec<RawThread>>
    {
        self.read_list(stream_type::THREAD_LIST)
    }

    /// Module records (empty when the stream is absent)
    pub fn modules(&self) -> Result<Vec<RawModule>>
    {
        self.read_list(stream_type::MODULE_LIST)
    }

    /// Captured memory from both `MemoryList` and `Memory64List`
    ///
    /// Records are returned in file order. Their data is verified to lie
    /// within the dump; overlap checks belong to the memory map builder.
    pub fn memory_records(&self) -> Result<Vec<MemoryRecord>>
    {
        let mut records = Vec::new();

        for descriptor in self.read_list::<RawMemoryDescriptor>(stream_type::MEMORY_LIST)? {
            let range = range_of(descriptor.start_of_memory_range, u64::from(descriptor.memory.data_size))?;
            self.location(descriptor.memory)?;
            records.push(MemoryRecord {
                range,
                data_offset: descriptor.memory.rva as usize,
            });
        }

        if let Some(stream) = self.read_stream(stream_type::MEMORY64_LIST) {
            let header: RawMemory64ListHeader = stream.pread_with(0, LE)?;
            let entry_size = RawMemoryDescriptor64::size_with(&LE);
            let header_size = RawMemory64ListHeader::size_with(&LE);
            let mut data_offset = usize::try_from(header.base_rva)
                .map_err(|_| MortemError::Format(format!("Memory64List base 0x{:x} is too large", header.base_rva)))?;

            for index in 0..header.number_of_memory_ranges {
                let index = usize::try_from(index).map_err(|_| MortemError::Format("Memory64List too long".into()))?;
                let descriptor: RawMemoryDescriptor64 = stream.pread_with(header_size + index * entry_size, LE)?;
                let size = usize::try_from(descriptor.data_size)
                    .map_err(|_| MortemError::Format(format!("memory range of {} bytes", descriptor.data_size)))?;
                let range = range_of(descriptor.start_of_memory_range, descriptor.data_size)?;
                slice(self.data, data_offset, size)?;
                records.push(MemoryRecord { range, data_offset });
                data_offset += size;
            }
        }

        Ok(records)
    }

    /// Entries of the `MemoryInfoList` stream, if present
    pub fn memory_info(&self) -> Result<Option<Vec<RawMemoryInfo>>>
    {
        let Some(stream) = self.read_stream(stream_type::MEMORY_INFO_LIST) else {
            return Ok(None);
        };
        let header: RawMemoryInfoListHeader = stream.pread_with(0, LE)?;
        let entry_size = header.size_of_entry as usize;
        if entry_size < RawMemoryInfo::size_with(&LE) {
            return Err(MortemError::Format(format!(
                "MemoryInfoList entries of {entry_size} bytes are too small"
            )));
        }

        let mut entries = Vec::new();
        for index in 0..header.number_of_entries {
            let index = usize::try_from(index).map_err(|_| MortemError::Format("MemoryInfoList too long".into()))?;
            let offset = index
                .checked_mul(entry_size)
                .and_then(|offset| offset.checked_add(header.size_of_header as usize))
                .ok_or_else(|| MortemError::Format("MemoryInfoList too long".into()))?;
            let info: RawMemoryInfo = stream.pread_with(offset, LE)?;
            entries.push(info);
        }
        Ok(Some(entries))
    }

    /// The system info record, if present
    pub fn system_info(&self) -> Result<Option<RawSystemInfo>>
    {
        self.read_stream(stream_type::SYSTEM_INFO)
            .map(|stream| stream.pread_with(0, LE).map_err(MortemError::from))
            .transpose()
    }

    /// The leading misc info fields, if the stream is present and long enough
    pub fn misc_info(&self) -> Option<RawMiscInfo>
    {
        self.read_stream(stream_type::MISC_INFO)
            .and_then(|stream| stream.pread_with(0, LE).ok())
    }

    /// The exception stream, if present
    pub fn exception(&self) -> Result<Option<RawExceptionStream>>
    {
        self.read_stream(stream_type::EXCEPTION)
            .map(|stream| stream.pread_with(0, LE).map_err(MortemError::from))
            .transpose()
    }

    /// A Breakpad text stream (`/proc` files), decoded lossily as UTF-8
    pub fn text_stream(&self, stream_type: u32) -> Option<Cow<'a, str>>
    {
        self.read_stream(stream_type).map(String::from_utf8_lossy)
    }

    /// Decode a list stream: a `u32` count followed by fixed-size entries
    ///
    /// Some writers insert 4 bytes of padding after the count so the entries
    /// are 8-byte aligned; the stream size tells the two layouts apart.
    fn read_list<T>(&self, stream_type: u32) -> Result<Vec<T>>
    where
        T: TryFromCtx<'a, Endian, Error = scroll::Error> + SizeWith<Endian>,
    {
        let Some(stream) = self.read_stream(stream_type) else {
            return Ok(Vec::new());
        };

        let count = stream.pread_with::<u32>(0, LE)? as usize;
        let entry_size = T::size_with(&LE);
        let needed = count.checked_mul(entry_size).ok_or_else(|| {
            MortemError::Format(format!("{} claims {count} entries", stream_type::name(stream_type)))
        })?;
        let start = if stream.len() == needed + 8 { 8 } else { 4 };
        if stream.len() < start + needed {
            return Err(MortemError::Format(format!(
                "{} of {} bytes cannot hold {count} entries of {entry_size} bytes",
                stream_type::name(stream_type),
                stream.len()
            )));
        }

        (0..count)
            .map(|index| stream.pread_with(start + index * entry_size, LE).map_err(MortemError::from))
            .collect()
    }
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8]>
{
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            MortemError::Format(format!(
                "record at 0x{offset:x} (+{len} bytes) lies outside the {}-byte dump",
                data.len()
            ))
        })
}

fn range_of(start: u64, size: u64) -> Result<AddressRange>
{
    AddressRange::from_len(Address::new(start), size)
        .ok_or_else(|| MortemError::Format(format!("memory range 0x{start:x}+0x{size:x} wraps the address space")))
}
