//! Breakpad's Linux text streams.
//!
//! Breakpad copies a few `/proc/<pid>/*` files into the dump verbatim. Two of
//! them matter to the snapshot: `status` (for the process id) and `maps` (for
//! precise region permissions and backing files). Both are parsed with
//! `procfs-core`, the same parser the kernel files get on a live system.

use std::io::Cursor;

use procfs_core::process::{MMPermissions, MMapPath, MemoryMap, MemoryMaps, Status};
use procfs_core::FromRead;
use tracing::debug;

use crate::types::{Address, AddressRange, Permissions};

/// One line of `/proc/<pid>/maps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapsEntry
{
    /// Mapped range
    pub range: AddressRange,
    /// `r`, `w`, `x` bits
    pub permissions: Permissions,
    /// `p` (private) vs `s` (shared)
    pub private: bool,
    /// Offset into the backing file
    pub offset: u64,
    /// Backing file or pseudo-path; `None` for anonymous mappings
    pub path: Option<String>,
}

impl MapsEntry
{
    fn from_map(map: MemoryMap) -> Option<Self>
    {
        let (start, end) = map.address;
        if end < start {
            return None;
        }

        let mut permissions = Permissions::empty();
        permissions.set(Permissions::READ, map.perms.contains(MMPermissions::READ));
        permissions.set(Permissions::WRITE, map.perms.contains(MMPermissions::WRITE));
        permissions.set(Permissions::EXECUTE, map.perms.contains(MMPermissions::EXECUTE));

        Some(Self {
            range: AddressRange::new(Address::new(start), Address::new(end)),
            permissions,
            private: map.perms.contains(MMPermissions::PRIVATE),
            offset: map.offset,
            path: path_name(map.pathname),
        })
    }
}

fn path_name(path: MMapPath) -> Option<String>
{
    match path {
        MMapPath::Anonymous => None,
        MMapPath::Path(path) => Some(path.to_string_lossy().into_owned()),
        MMapPath::Heap => Some("[heap]".to_string()),
        MMapPath::Stack => Some("[stack]".to_string()),
        MMapPath::TStack(tid) => Some(format!("[stack:{tid}]")),
        MMapPath::Vdso => Some("[vdso]".to_string()),
        MMapPath::Vvar => Some("[vvar]".to_string()),
        MMapPath::Vsyscall => Some("[vsyscall]".to_string()),
        MMapPath::Other(name) => Some(format!("[{name}]")),
        other => Some(format!("{other:?}")),
    }
}

/// Extract the process id from a `/proc/<pid>/status` blob
///
/// `None` when the blob is not a complete status file.
pub fn parse_status_pid(status: &str) -> Option<u32>
{
    match Status::from_read(Cursor::new(status.as_bytes())) {
        Ok(status) => u32::try_from(status.pid).ok(),
        Err(error) => {
            debug!(%error, "Unreadable LinuxProcStatus stream");
            None
        }
    }
}

/// Parse a `/proc/<pid>/maps` blob
///
/// Each line is parsed on its own so a truncated or garbled line costs only
/// that mapping. Reversed ranges are dropped.
pub fn parse_maps(maps: &str) -> Vec<MapsEntry>
{
    maps.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match MemoryMaps::from_read(Cursor::new(line.as_bytes())) {
            Ok(parsed) => parsed.into_iter().next(),
            Err(error) => {
                debug!(%error, line, "Skipping LinuxMaps line");
                None
            }
        })
        .filter_map(MapsEntry::from_map)
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    const STATUS: &str = "Name:\tapp_process\n\
        Umask:\t0077\n\
        State:\tS (sleeping)\n\
        Tgid:\t29917\n\
        Ngid:\t0\n\
        Pid:\t29917\n\
        PPid:\t1\n\
        TracerPid:\t0\n\
        Uid:\t10060\t10060\t10060\t10060\n\
        Gid:\t10060\t10060\t10060\t10060\n\
        FDSize:\t128\n\
        Groups:\t3003 9997 \n\
        VmPeak:\t 2400000 kB\n\
        VmSize:\t 2300000 kB\n\
        VmLck:\t       0 kB\n\
        VmPin:\t       0 kB\n\
        VmHWM:\t   90000 kB\n\
        VmRSS:\t   85000 kB\n\
        VmData:\t  400000 kB\n\
        VmStk:\t    8192 kB\n\
        VmExe:\t      24 kB\n\
        VmLib:\t  150000 kB\n\
        VmPTE:\t    1000 kB\n\
        VmSwap:\t       0 kB\n\
        Threads:\t21\n\
        SigQ:\t0/21402\n\
        SigPnd:\t0000000000000000\n\
        ShdPnd:\t0000000000000000\n\
        SigBlk:\t0000000000001204\n\
        SigIgn:\t0000000000000001\n\
        SigCgt:\t00000006400084f8\n\
        CapInh:\t0000000000000000\n\
        CapPrm:\t0000000000000000\n\
        CapEff:\t0000000000000000\n\
        CapBnd:\t0000000000000000\n\
        CapAmb:\t0000000000000000\n\
        Seccomp:\t2\n\
        Cpus_allowed:\tff\n\
        Cpus_allowed_list:\t0-7\n\
        voluntary_ctxt_switches:\t120\n\
        nonvoluntary_ctxt_switches:\t13\n";

    #[test]
    fn test_status_pid()
    {
        assert_eq!(parse_status_pid(STATUS), Some(29917));
        assert_eq!(parse_status_pid("Name:\ta.out\n"), None);
        assert_eq!(parse_status_pid(""), None);
    }

    #[test]
    fn test_parse_maps_line_with_path()
    {
        let entries =
            parse_maps("400d9000-400db000 r-xp 00000000 b3:04 227        /system/bin/app_process\n");
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.range.start, Address::new(0x400d_9000));
        assert_eq!(entry.range.end, Address::new(0x400d_b000));
        assert_eq!(entry.permissions, Permissions::READ | Permissions::EXECUTE);
        assert!(entry.private);
        assert_eq!(entry.path.as_deref(), Some("/system/bin/app_process"));
    }

    #[test]
    fn test_parse_maps_anonymous_and_pseudo_paths()
    {
        let entries = parse_maps(
            "400dc000-400dd000 rw-p 00000000 00:00 0 \n\
             4010d000-4010e000 rw-s 00001000 00:04 12 [heap]\n\
             7ffd0000-7ffd1000 rw-p 00000000 00:00 0  [stack]\n",
        );
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, None);
        assert_eq!(entries[1].path.as_deref(), Some("[heap]"));
        assert!(!entries[1].private);
        assert_eq!(entries[1].offset, 0x1000);
        assert_eq!(entries[2].path.as_deref(), Some("[stack]"));
    }

    #[test]
    fn test_parse_maps_path_with_spaces()
    {
        let entries = parse_maps("1000-2000 r--p 00000000 08:01 42 /tmp/my lib.so (deleted)");
        assert_eq!(entries[0].path.as_deref(), Some("/tmp/my lib.so (deleted)"));
    }

    #[test]
    fn test_parse_maps_never_folds_inode_into_path()
    {
        let entries = parse_maps("400d9000-400db000  r-xp 00000000 b3:04 227 /system/bin/app_process\n");
        assert!(entries
            .iter()
            .all(|entry| entry.path.as_deref().is_none_or(|path| !path.starts_with("227"))));
    }

    #[test]
    fn test_parse_maps_skips_garbage()
    {
        let entries = parse_maps("not a maps line\n2000-1000 r--p 0 00:00 0 \n3000-4000 r--p 00000000 00:00 0 \n40");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].range.start, Address::new(0x3000));
    }
}
