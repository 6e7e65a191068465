//! On-disk minidump records.
//!
//! Every structure here mirrors the little-endian layout written by Windows,
//! Breakpad and Crashpad. Fields are read one after another with `scroll`, so
//! there is no implicit padding: where the C layout has alignment gaps they
//! appear as explicit `alignment` fields.
//!
//! Names follow the `MINIDUMP_*` structures in `minidumpapiset.h` and
//! Breakpad's `minidump_format.h`.

use scroll::{Pread, SizeWith};

/// `MDMP` read as a little-endian `u32`
pub const MINIDUMP_SIGNATURE: u32 = 0x504d_444d;

/// Low 16 bits of the header `version` field
pub const MINIDUMP_VERSION: u32 = 0xa793;

/// Stream types the reader interprets
///
/// Any other value is kept in the directory untouched.
pub mod stream_type
{
    pub const THREAD_LIST: u32 = 3;
    pub const MODULE_LIST: u32 = 4;
    pub const MEMORY_LIST: u32 = 5;
    pub const EXCEPTION: u32 = 6;
    pub const SYSTEM_INFO: u32 = 7;
    pub const MEMORY64_LIST: u32 = 9;
    pub const MISC_INFO: u32 = 15;
    pub const MEMORY_INFO_LIST: u32 = 16;

    // Breakpad extensions
    pub const LINUX_CPU_INFO: u32 = 0x4767_0003;
    pub const LINUX_PROC_STATUS: u32 = 0x4767_0004;
    pub const LINUX_CMD_LINE: u32 = 0x4767_0006;
    pub const LINUX_ENVIRON: u32 = 0x4767_0007;
    pub const LINUX_AUXV: u32 = 0x4767_0008;
    pub const LINUX_MAPS: u32 = 0x4767_0009;
    pub const LINUX_DSO_DEBUG: u32 = 0x4767_000a;

    /// Printable name for logs and diagnostics
    pub fn name(stream_type: u32) -> &'static str
    {
        match stream_type {
            THREAD_LIST => "ThreadList",
            MODULE_LIST => "ModuleList",
            MEMORY_LIST => "MemoryList",
            EXCEPTION => "Exception",
            SYSTEM_INFO => "SystemInfo",
            MEMORY64_LIST => "Memory64List",
            MISC_INFO => "MiscInfo",
            MEMORY_INFO_LIST => "MemoryInfoList",
            LINUX_CPU_INFO => "LinuxCpuInfo",
            LINUX_PROC_STATUS => "LinuxProcStatus",
            LINUX_CMD_LINE => "LinuxCmdLine",
            LINUX_ENVIRON => "LinuxEnviron",
            LINUX_AUXV => "LinuxAuxv",
            LINUX_MAPS => "LinuxMaps",
            LINUX_DSO_DEBUG => "LinuxDsoDebug",
            _ => "Unknown",
        }
    }
}

/// `processor_architecture` values of the system info stream
pub mod processor
{
    pub const X86: u16 = 0;
    pub const ARM: u16 = 5;
    pub const AMD64: u16 = 9;
    pub const ARM64: u16 = 12;
    /// Breakpad's tag from before Windows defined one for ARM64
    pub const ARM64_OLD: u16 = 0x8003;
}

/// `platform_id` values of the system info stream
pub mod platform
{
    pub const WIN32_NT: u32 = 2;
    pub const MACOS: u32 = 0x8101;
    pub const IOS: u32 = 0x8102;
    pub const LINUX: u32 = 0x8201;
    pub const SOLARIS: u32 = 0x8202;
    pub const ANDROID: u32 = 0x8203;
    pub const FUCHSIA: u32 = 0x8206;
}

/// `MINIDUMP_MEMORY_INFO::state`
pub mod memory_state
{
    pub const MEM_COMMIT: u32 = 0x1000;
    pub const MEM_RESERVE: u32 = 0x2000;
    pub const MEM_FREE: u32 = 0x1_0000;
}

/// `MINIDUMP_MEMORY_INFO::protection` (`PAGE_*` constants)
pub mod page_protection
{
    pub const PAGE_NOACCESS: u32 = 0x01;
    pub const PAGE_READONLY: u32 = 0x02;
    pub const PAGE_READWRITE: u32 = 0x04;
    pub const PAGE_WRITECOPY: u32 = 0x08;
    pub const PAGE_EXECUTE: u32 = 0x10;
    pub const PAGE_EXECUTE_READ: u32 = 0x20;
    pub const PAGE_EXECUTE_READWRITE: u32 = 0x40;
    pub const PAGE_EXECUTE_WRITECOPY: u32 = 0x80;
    pub const PAGE_GUARD: u32 = 0x100;
    /// Bits that select the base protection (everything else is a modifier)
    pub const ACCESS_MASK: u32 = 0xff;
}

/// CodeView record signatures
pub mod codeview
{
    /// `RSDS`: PDB 7.0 (GUID + age + path)
    pub const PDB70: u32 = 0x5344_5352;
    /// `NB10`: PDB 2.0 (offset + signature + age + path)
    pub const PDB20: u32 = 0x3031_424e;
    /// `BpEL`: Breakpad ELF build id
    pub const ELF: u32 = 0x4270_454c;
}

/// `VS_FIXEDFILEINFO::signature`
pub const VS_FFI_SIGNATURE: u32 = 0xfeef_04bd;

/// `MINIDUMP_MISC_INFO::flags1` bit telling `process_id` is valid
pub const MINIDUMP_MISC1_PROCESS_ID: u32 = 0x0000_0001;

/// Breakpad's exception code for dumps requested without a crash
pub const DUMP_REQUESTED: u32 = 0xffff_ffff;

/// Number of parameters in an exception record
pub const EXCEPTION_MAXIMUM_PARAMETERS: usize = 15;

/// `MINIDUMP_HEADER`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawHeader
{
    pub signature: u32,
    pub version: u32,
    pub stream_count: u32,
    pub stream_directory_rva: u32,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub flags: u64,
}

/// `MINIDUMP_LOCATION_DESCRIPTOR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pread, SizeWith)]
pub struct RawLocation
{
    pub data_size: u32,
    pub rva: u32,
}

/// `MINIDUMP_DIRECTORY`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawDirectory
{
    pub stream_type: u32,
    pub location: RawLocation,
}

/// `MINIDUMP_MEMORY_DESCRIPTOR`
#[derive(Debug, Clone, Copy, Default, Pread, SizeWith)]
pub struct RawMemoryDescriptor
{
    pub start_of_memory_range: u64,
    pub memory: RawLocation,
}

/// `MINIDUMP_MEMORY_DESCRIPTOR64`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawMemoryDescriptor64
{
    pub start_of_memory_range: u64,
    pub data_size: u64,
}

/// Header of a `Memory64List` stream; the descriptors follow it
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawMemory64ListHeader
{
    pub number_of_memory_ranges: u64,
    pub base_rva: u64,
}

/// `MINIDUMP_THREAD`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawThread
{
    pub thread_id: u32,
    pub suspend_count: u32,
    pub priority_class: u32,
    pub priority: u32,
    pub teb: u64,
    pub stack: RawMemoryDescriptor,
    pub thread_context: RawLocation,
}

/// `VS_FIXEDFILEINFO`
#[derive(Debug, Clone, Copy, Default, Pread, SizeWith)]
pub struct RawFixedFileInfo
{
    pub signature: u32,
    pub struct_version: u32,
    pub file_version_hi: u32,
    pub file_version_lo: u32,
    pub product_version_hi: u32,
    pub product_version_lo: u32,
    pub file_flags_mask: u32,
    pub file_flags: u32,
    pub file_os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
    pub file_date_hi: u32,
    pub file_date_lo: u32,
}

/// `MINIDUMP_MODULE` (packed, 108 bytes)
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawModule
{
    pub base_of_image: u64,
    pub size_of_image: u32,
    pub checksum: u32,
    pub time_date_stamp: u32,
    pub module_name_rva: u32,
    pub version_info: RawFixedFileInfo,
    pub cv_record: RawLocation,
    pub misc_record: RawLocation,
    pub reserved0: u64,
    pub reserved1: u64,
}

/// `MINIDUMP_SYSTEM_INFO`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawSystemInfo
{
    pub processor_architecture: u16,
    pub processor_level: u16,
    pub processor_revision: u16,
    pub number_of_processors: u8,
    pub product_type: u8,
    pub major_version: u32,
    pub minor_version: u32,
    pub build_number: u32,
    pub platform_id: u32,
    pub csd_version_rva: u32,
    pub suite_mask: u16,
    pub reserved2: u16,
    pub cpu: [u8; 24],
}

/// Leading fields of `MINIDUMP_MISC_INFO`, shared by every later revision
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawMiscInfo
{
    pub size_of_info: u32,
    pub flags1: u32,
    pub process_id: u32,
}

/// `MINIDUMP_MEMORY_INFO_LIST`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawMemoryInfoListHeader
{
    pub size_of_header: u32,
    pub size_of_entry: u32,
    pub number_of_entries: u64,
}

/// `MINIDUMP_MEMORY_INFO`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawMemoryInfo
{
    pub base_address: u64,
    pub allocation_base: u64,
    pub allocation_protection: u32,
    pub alignment1: u32,
    pub region_size: u64,
    pub state: u32,
    pub protection: u32,
    pub memory_type: u32,
    pub alignment2: u32,
}

/// `MINIDUMP_EXCEPTION`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawException
{
    pub exception_code: u32,
    pub exception_flags: u32,
    pub exception_record: u64,
    pub exception_address: u64,
    pub number_parameters: u32,
    pub alignment: u32,
    pub exception_information: [u64; 15],
}

/// `MINIDUMP_EXCEPTION_STREAM`
#[derive(Debug, Clone, Copy, Pread, SizeWith)]
pub struct RawExceptionStream
{
    pub thread_id: u32,
    pub alignment: u32,
    pub exception_record: RawException,
    pub thread_context: RawLocation,
}
