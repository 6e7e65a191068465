//! On-disk images matching the modules of a dump.
//!
//! When the caller configures image search paths, each module's file name is
//! looked up there. A candidate is only attached when its embedded identifier
//! (ELF build id, Mach-O UUID or PE debug GUID) agrees with the module's
//! CodeView record, so a rebuilt binary with the same name is never mistaken
//! for the one that crashed.

use std::fs;
use std::path::{Path, PathBuf};

use object::{BinaryFormat, Object, ObjectSection, ObjectSegment, SectionKind};
use tracing::{debug, trace};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::{MortemError, Result};
use crate::types::{Address, AddressRange};

/// An on-disk file matched to a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo
{
    /// Location of the file
    pub path: PathBuf,
    /// Build identifier found in the file, if any
    pub identifier: Option<Vec<u8>>,
    /// Runtime ranges of the file's code sections, relocated to the module base
    pub executable: Vec<AddressRange>,
}

impl ImageInfo
{
    /// Parse `path` as loaded at `base`
    ///
    /// The slide between the file's preferred addresses and the runtime
    /// addresses is derived from the lowest file-backed segment (or the PE
    /// image base), which is where the module's headers were mapped.
    pub fn parse(path: &Path, base: Address, size: u64) -> Result<Self>
    {
        let bytes = fs::read(path)?;
        let file = object::File::parse(&*bytes)
            .map_err(|err| MortemError::InvalidArgument(format!("failed to parse {}: {err}", path.display())))?;

        let header_vmaddr = if file.format() == BinaryFormat::Pe {
            file.relative_address_base()
        } else {
            file.segments()
                .filter(|segment| segment.file_range().1 > 0)
                .map(|segment| segment.address())
                .min()
                .unwrap_or(0)
        };
        let slide = base.value().wrapping_sub(header_vmaddr);
        let module_range = AddressRange::from_len(base, size).unwrap_or(AddressRange::new(base, Address::MAX));

        let mut executable: Vec<AddressRange> = file
            .sections()
            .filter(|section| section.kind() == SectionKind::Text && section.size() > 0)
            .filter_map(|section| {
                let start = Address::new(section.address().wrapping_add(slide));
                let range = AddressRange::from_len(start, section.size())?;
                // Clip to the module; sections outside it are not mapped code.
                let clipped = AddressRange::new(range.start.max(module_range.start), range.end.min(module_range.end));
                (!clipped.is_empty()).then_some(clipped)
            })
            .collect();
        executable.sort();
        executable.dedup();

        let identifier = image_identifier(&file);
        trace!(path = %path.display(), code_sections = executable.len(), "Parsed image");

        Ok(Self {
            path: path.to_path_buf(),
            identifier,
            executable,
        })
    }
}

/// Look for a file named `basename` in `search_paths` whose identifier matches
///
/// `expected` is the module's CodeView signature; `None` accepts the first
/// readable candidate.
pub fn locate(
    basename: &str,
    expected: Option<&[u8]>,
    base: Address,
    size: u64,
    search_paths: &[PathBuf],
    diagnostics: &mut Diagnostics,
) -> Option<ImageInfo>
{
    for directory in search_paths {
        let candidate = directory.join(basename);
        if !candidate.is_file() {
            continue;
        }

        let image = match ImageInfo::parse(&candidate, base, size) {
            Ok(image) => image,
            Err(err) => {
                diagnostics.push(Diagnostic::ImageUnreadable {
                    path: candidate,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let matches = match (expected, image.identifier.as_deref()) {
            (None, _) => true,
            (Some(expected), Some(found)) => identifiers_match(expected, found),
            (Some(_), None) => false,
        };
        if matches {
            debug!(module = basename, path = %candidate.display(), "Matched on-disk image");
            return Some(image);
        }
        diagnostics.push(Diagnostic::ImageMismatch {
            module: basename.to_string(),
            path: candidate,
        });
    }
    None
}

/// Compare a CodeView signature with an image identifier
///
/// Older Breakpad writers store only the first 16 bytes of an ELF build id
/// (as a GUID), so identifiers of 16 bytes or more match on that prefix.
pub fn identifiers_match(expected: &[u8], found: &[u8]) -> bool
{
    if expected.len() == found.len() {
        return expected == found;
    }
    expected.len() >= 16 && found.len() >= 16 && expected[..16] == found[..16]
}

fn image_identifier(file: &object::File<'_>) -> Option<Vec<u8>>
{
    if let Ok(Some(build_id)) = file.build_id() {
        return Some(build_id.to_vec());
    }
    if let Ok(Some(uuid)) = file.mach_uuid() {
        return Some(uuid.to_vec());
    }
    if let Ok(Some(pdb)) = file.pdb_info() {
        return Some(pdb.guid().to_vec());
    }
    None
}
