//! Module identities.
//!
//! Every module gets a stable identity string derived from the debug record
//! the dump writer embedded (the CodeView record). Reloading the same dump
//! always yields the same strings, so they can key symbol caches.
//!
//! ## Encoding
//!
//! The identity bytes are printed as uppercase hex, grouped like a GUID for
//! the first 16 bytes (`8-4-4-4-12` digits), with every further 4 bytes as an
//! extra group of 8 digits:
//!
//! ```text
//! E35C283B-C327-C287-62DB-788BF5A4078B-E2351448
//! ```
//!
//! | Record | Identity bytes |
//! |--------|----------------|
//! | `RSDS` | GUID as stored, then the age (LE) if non-zero |
//! | `BpEL` | build id |
//! | `NB10` | signature (LE), then age (LE) |
//! | none   | time stamp (LE), then image size (LE) |

use std::fmt::Write as _;

use scroll::{Pread, LE};

use crate::dump::format::codeview;

/// Decoded CodeView record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeView
{
    /// `RSDS`: PDB 7.0
    Pdb70
    {
        /// GUID bytes as stored in the record
        guid: [u8; 16],
        /// PDB age
        age: u32,
        /// PDB file name
        pdb_name: String,
    },
    /// `NB10`: PDB 2.0
    Pdb20
    {
        /// Time-stamp signature
        signature: u32,
        /// PDB age
        age: u32,
        /// PDB file name
        pdb_name: String,
    },
    /// `BpEL`: ELF build id written by Breakpad
    Elf
    {
        /// Raw build id
        build_id: Vec<u8>,
    },
}

impl CodeView
{
    /// Decode a CodeView record; `None` for empty or unknown records
    pub fn parse(bytes: &[u8]) -> Option<Self>
    {
        let signature: u32 = bytes.pread_with(0, LE).ok()?;
        match signature {
            codeview::PDB70 => {
                let guid: [u8; 16] = bytes.get(4..20)?.try_into().ok()?;
                let age = bytes.pread_with(20, LE).ok()?;
                Some(CodeView::Pdb70 {
                    guid,
                    age,
                    pdb_name: c_string(bytes.get(24..).unwrap_or_default()),
                })
            }
            codeview::PDB20 => {
                // The first field after the signature is an unused offset.
                let signature = bytes.pread_with(8, LE).ok()?;
                let age = bytes.pread_with(12, LE).ok()?;
                Some(CodeView::Pdb20 {
                    signature,
                    age,
                    pdb_name: c_string(bytes.get(16..).unwrap_or_default()),
                })
            }
            codeview::ELF => Some(CodeView::Elf {
                build_id: bytes[4..].to_vec(),
            }),
            _ => None,
        }
    }

    /// Bytes identifying the build, without the PDB age
    ///
    /// This is what an on-disk image is compared against.
    pub fn signature_bytes(&self) -> Vec<u8>
    {
        match self {
            CodeView::Pdb70 { guid, .. } => guid.to_vec(),
            CodeView::Pdb20 { signature, .. } => signature.to_le_bytes().to_vec(),
            CodeView::Elf { build_id } => build_id.clone(),
        }
    }

    /// Bytes the identity string is printed from
    pub fn identity_bytes(&self) -> Vec<u8>
    {
        match self {
            CodeView::Pdb70 { guid, age, .. } => {
                let mut bytes = guid.to_vec();
                if *age != 0 {
                    bytes.extend_from_slice(&age.to_le_bytes());
                }
                bytes
            }
            CodeView::Pdb20 { signature, age, .. } => {
                let mut bytes = signature.to_le_bytes().to_vec();
                bytes.extend_from_slice(&age.to_le_bytes());
                bytes
            }
            CodeView::Elf { build_id } => build_id.clone(),
        }
    }

    /// The debug file name, for PDB records
    pub fn debug_file(&self) -> Option<&str>
    {
        match self {
            CodeView::Pdb70 { pdb_name, .. } | CodeView::Pdb20 { pdb_name, .. } => Some(pdb_name),
            CodeView::Elf { .. } => None,
        }
    }
}

/// Identity string of a module
///
/// ```rust
/// use mortem_core::modules::identity::module_identity;
///
/// assert_eq!(module_identity(None, 0x5f2a_7b10, 0x3000), "107B2A5F-0030-0000");
/// ```
pub fn module_identity(codeview: Option<&CodeView>, time_date_stamp: u32, size_of_image: u32) -> String
{
    match codeview {
        Some(record) => format_identity(&record.identity_bytes()),
        None => {
            let mut bytes = time_date_stamp.to_le_bytes().to_vec();
            bytes.extend_from_slice(&size_of_image.to_le_bytes());
            format_identity(&bytes)
        }
    }
}

/// Group identity bytes as uppercase hex
pub fn format_identity(bytes: &[u8]) -> String
{
    const GUID_GROUPS: [usize; 5] = [4, 2, 2, 2, 6];

    let mut groups = Vec::new();
    let mut rest = bytes;
    for size in GUID_GROUPS.into_iter().chain(std::iter::repeat(4)) {
        if rest.is_empty() {
            break;
        }
        let (group, tail) = rest.split_at(size.min(rest.len()));
        groups.push(hex_upper(group));
        rest = tail;
    }
    groups.join("-")
}

/// Breakpad/Windows code identifier: time stamp then image size, in hex
///
/// ```rust
/// use mortem_core::modules::identity::code_identifier;
///
/// assert_eq!(code_identifier(0x5f2a_7b10, 0x3000), "5F2A7B103000");
/// ```
pub fn code_identifier(time_date_stamp: u32, size_of_image: u32) -> String
{
    format!("{time_date_stamp:08X}{size_of_image:X}")
}

fn hex_upper(bytes: &[u8]) -> String
{
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02X}");
        out
    })
}

fn c_string(bytes: &[u8]) -> String
{
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
