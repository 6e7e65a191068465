//! # Module Resolver
//!
//! Turns the module list stream into an address-sorted list of [`Module`]s.
//!
//! Each module carries a deterministic identity (see [`identity`]) and, when
//! image search paths are configured, the on-disk file that matches it (see
//! [`image`]). Address lookups are a binary search over the sorted bases.

pub mod identity;
pub mod image;

use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use self::identity::{code_identifier, module_identity, CodeView};
use self::image::ImageInfo;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dump::format::{RawFixedFileInfo, RawModule, VS_FFI_SIGNATURE};
use crate::dump::Minidump;
use crate::error::Result;
use crate::types::{Address, AddressRange, Platform};

/// A loaded module (executable or shared library)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module
{
    /// Full path as recorded by the dump writer
    pub path: String,
    /// Load address
    pub base: Address,
    /// Size of the mapped image
    pub size: u64,
    /// Deterministic identity string
    pub identity: String,
    /// Code identifier (time stamp + size)
    pub code_id: String,
    /// Decoded CodeView record
    pub codeview: Option<CodeView>,
    /// PE checksum (0 when unknown)
    pub checksum: u32,
    /// Link time stamp (0 when unknown)
    pub time_date_stamp: u32,
    /// File version from `VS_FIXEDFILEINFO`, as `a.b.c.d`
    pub version: Option<String>,
    /// Matching on-disk image, if one was found
    pub image: Option<ImageInfo>,
}

impl Module
{
    /// File name without directories (`/` and `\` separators both apply)
    pub fn basename(&self) -> &str
    {
        basename(&self.path)
    }

    /// Address range covered by the module
    pub fn range(&self) -> AddressRange
    {
        AddressRange::new(self.base, self.base.saturating_add(self.size))
    }

    /// Check if the module contains an address
    pub fn contains(&self, address: Address) -> bool
    {
        self.range().contains(address)
    }

    /// Ranges of the module that hold code
    ///
    /// Taken from the on-disk image when one matched, otherwise the whole
    /// module is assumed to be code.
    pub fn executable_ranges(&self) -> Vec<AddressRange>
    {
        match &self.image {
            Some(image) if !image.executable.is_empty() => image.executable.clone(),
            _ => vec![self.range()],
        }
    }
}

impl fmt::Display for Module
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} {} {}", self.range(), self.identity, self.path)
    }
}

/// File name part of a path written on any platform
///
/// ```rust
/// use mortem_core::modules::basename;
///
/// assert_eq!(basename("/usr/lib/libc.so.6"), "libc.so.6");
/// assert_eq!(basename(r"C:\Windows\System32\ntdll.dll"), "ntdll.dll");
/// assert_eq!(basename("a.out"), "a.out");
/// ```
pub fn basename(path: &str) -> &str
{
    path.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(path)
}

/// Modules sorted by load address
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleList
{
    modules: Vec<Module>,
}

impl ModuleList
{
    /// Build the list from already-resolved modules
    pub fn new(mut modules: Vec<Module>) -> Self
    {
        modules.sort_by_key(|module| module.base);
        Self { modules }
    }

    /// Read the module list stream of `dump`
    ///
    /// Linux dumps can list one file several times (once per mapping); only
    /// the entry with the lowest base is kept.
    pub fn from_dump(
        dump: &Minidump<'_>,
        platform: Platform,
        search_paths: &[PathBuf],
        diagnostics: &mut Diagnostics,
    ) -> Result<Self>
    {
        let mut modules = Vec::new();
        for raw in dump.modules()? {
            modules.push(resolve(dump, &raw, search_paths, diagnostics)?);
        }

        modules.sort_by_key(|module| module.base);
        if matches!(platform, Platform::Linux | Platform::Android) {
            let mut seen = std::collections::HashSet::new();
            modules.retain(|module| {
                if seen.insert(module.path.clone()) {
                    return true;
                }
                diagnostics.push(Diagnostic::DuplicateModule {
                    path: module.path.clone(),
                    base: module.base,
                });
                false
            });
        }

        debug!(count = modules.len(), "Resolved modules");
        Ok(Self { modules })
    }

    /// Module containing `address`, if any
    pub fn module_for_address(&self, address: Address) -> Option<&Module>
    {
        let index = self.modules.partition_point(|module| module.base <= address);
        index
            .checked_sub(1)
            .map(|index| &self.modules[index])
            .filter(|module| module.contains(address))
    }

    /// Modules in ascending base order
    pub fn as_slice(&self) -> &[Module]
    {
        &self.modules
    }

    /// Number of modules
    pub fn len(&self) -> usize
    {
        self.modules.len()
    }

    /// Whether the dump listed no modules
    pub fn is_empty(&self) -> bool
    {
        self.modules.is_empty()
    }

    /// Code ranges of every module, sorted and merged
    pub fn executable_ranges(&self) -> Vec<AddressRange>
    {
        let mut ranges: Vec<AddressRange> = self.modules.iter().flat_map(Module::executable_ranges).collect();
        ranges.sort();

        let mut merged: Vec<AddressRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
                _ => merged.push(range),
            }
        }
        merged
    }
}

fn resolve(
    dump: &Minidump<'_>,
    raw: &RawModule,
    search_paths: &[PathBuf],
    diagnostics: &mut Diagnostics,
) -> Result<Module>
{
    let path = dump.read_string(raw.module_name_rva)?;
    let codeview = if raw.cv_record.data_size == 0 {
        None
    } else {
        CodeView::parse(dump.location(raw.cv_record)?)
    };

    let base = Address::new(raw.base_of_image);
    let size = u64::from(raw.size_of_image);
    let image = if search_paths.is_empty() {
        None
    } else {
        let expected = codeview.as_ref().map(CodeView::signature_bytes);
        image::locate(basename(&path), expected.as_deref(), base, size, search_paths, diagnostics)
    };

    Ok(Module {
        identity: module_identity(codeview.as_ref(), raw.time_date_stamp, raw.size_of_image),
        code_id: code_identifier(raw.time_date_stamp, raw.size_of_image),
        version: file_version(&raw.version_info),
        checksum: raw.checksum,
        time_date_stamp: raw.time_date_stamp,
        path,
        base,
        size,
        codeview,
        image,
    })
}

fn file_version(info: &RawFixedFileInfo) -> Option<String>
{
    if info.signature != VS_FFI_SIGNATURE {
        return None;
    }
    Some(format!(
        "{}.{}.{}.{}",
        info.file_version_hi >> 16,
        info.file_version_hi & 0xffff,
        info.file_version_lo >> 16,
        info.file_version_lo & 0xffff
    ))
}
