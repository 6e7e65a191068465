//! In-memory minidump writer for the integration tests.
//!
//! Blobs (contexts, stacks, strings, memory) are appended right after the
//! header; stream bodies and the directory follow when [`DumpBuilder::build`]
//! runs, and the header is patched last.

#![allow(dead_code)]

use mortem_core::dump::format::{processor, stream_type, EXCEPTION_MAXIMUM_PARAMETERS, MINIDUMP_SIGNATURE};

pub const HEADER_SIZE: usize = 32;
pub const X86_64_CONTEXT_SIZE: usize = 1232;
pub const ARM64_CONTEXT_SIZE: usize = 912;
pub const ARM64_OLD_CONTEXT_SIZE: usize = 796;
pub const ARM_CONTEXT_SIZE: usize = 368;

#[derive(Debug, Clone, Copy)]
pub struct Location
{
    pub size: u32,
    pub rva: u32,
}

struct Thread
{
    id: u32,
    context: Location,
    stack: Option<(u64, Location)>,
}

struct Module
{
    base: u64,
    size: u32,
    timestamp: u32,
    name: Location,
    codeview: Option<Location>,
}

pub struct DumpBuilder
{
    data: Vec<u8>,
    streams: Vec<(u32, Vec<u8>)>,
    threads: Option<Vec<Thread>>,
    modules: Option<Vec<Module>>,
    memory: Option<Vec<(u64, Location)>>,
    memory64: Option<Vec<(u64, Vec<u8>)>>,
    timestamp: u32,
}

impl Default for DumpBuilder
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl DumpBuilder
{
    pub fn new() -> Self
    {
        Self {
            data: vec![0; HEADER_SIZE],
            streams: Vec::new(),
            threads: None,
            modules: None,
            memory: None,
            memory64: None,
            timestamp: 0,
        }
    }

    /// Append raw bytes and return where they landed
    pub fn blob(&mut self, bytes: &[u8]) -> Location
    {
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }
        let rva = self.data.len() as u32;
        self.data.extend_from_slice(bytes);
        Location {
            size: bytes.len() as u32,
            rva,
        }
    }

    pub fn timestamp(mut self, timestamp: u32) -> Self
    {
        self.timestamp = timestamp;
        self
    }

    pub fn stream(mut self, stream_type: u32, bytes: Vec<u8>) -> Self
    {
        self.streams.push((stream_type, bytes));
        self
    }

    pub fn system_info(self, processor_architecture: u16, platform_id: u32) -> Self
    {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&processor_architecture.to_le_bytes());
        bytes.extend_from_slice(&6u16.to_le_bytes()); // level
        bytes.extend_from_slice(&0u16.to_le_bytes()); // revision
        bytes.push(4); // processors
        bytes.push(1); // product type
        for value in [10u32, 0, 19041, platform_id, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&[0u8; 4]); // suite mask, reserved
        bytes.extend_from_slice(&[0u8; 24]); // cpu
        self.stream(stream_type::SYSTEM_INFO, bytes)
    }

    pub fn empty_thread_list(mut self) -> Self
    {
        self.threads.get_or_insert_with(Vec::new);
        self
    }

    pub fn thread(mut self, id: u32, context: &[u8], stack: Option<(u64, &[u8])>) -> Self
    {
        let context = self.blob(context);
        let stack = stack.map(|(start, bytes)| (start, self.blob(bytes)));
        self.threads.get_or_insert_with(Vec::new).push(Thread { id, context, stack });
        self
    }

    pub fn module(mut self, name: &str, base: u64, size: u32, timestamp: u32, codeview: Option<&[u8]>) -> Self
    {
        let name = self.string(name);
        let codeview = codeview.map(|record| self.blob(record));
        self.modules.get_or_insert_with(Vec::new).push(Module {
            base,
            size,
            timestamp,
            name,
            codeview,
        });
        self
    }

    pub fn memory(mut self, start: u64, bytes: &[u8]) -> Self
    {
        let location = self.blob(bytes);
        self.memory.get_or_insert_with(Vec::new).push((start, location));
        self
    }

    pub fn memory64(mut self, start: u64, bytes: &[u8]) -> Self
    {
        self.memory64.get_or_insert_with(Vec::new).push((start, bytes.to_vec()));
        self
    }

    pub fn misc_info(self, pid: u32) -> Self
    {
        let mut bytes = Vec::new();
        for value in [24u32, 1, pid, 0, 0, 0] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        self.stream(stream_type::MISC_INFO, bytes)
    }

    pub fn linux_maps(self, maps: &str) -> Self
    {
        self.stream(stream_type::LINUX_MAPS, maps.as_bytes().to_vec())
    }

    pub fn proc_status(self, status: &str) -> Self
    {
        self.stream(stream_type::LINUX_PROC_STATUS, status.as_bytes().to_vec())
    }

    /// `(base, size, state, protection)` entries
    pub fn memory_info(self, entries: &[(u64, u64, u32, u32)]) -> Self
    {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&48u32.to_le_bytes());
        bytes.extend_from_slice(&(entries.len() as u64).to_le_bytes());
        for &(base, size, state, protection) in entries {
            bytes.extend_from_slice(&base.to_le_bytes());
            bytes.extend_from_slice(&base.to_le_bytes()); // allocation base
            bytes.extend_from_slice(&protection.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
            bytes.extend_from_slice(&size.to_le_bytes());
            bytes.extend_from_slice(&state.to_le_bytes());
            bytes.extend_from_slice(&protection.to_le_bytes());
            bytes.extend_from_slice(&0x2_0000u32.to_le_bytes()); // MEM_PRIVATE
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }
        self.stream(stream_type::MEMORY_INFO_LIST, bytes)
    }

    pub fn exception(mut self, thread_id: u32, code: u32, flags: u32, address: u64, parameters: &[u64], context: Option<&[u8]>) -> Self
    {
        let context = context.map_or(Location { size: 0, rva: 0 }, |context| self.blob(context));
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&thread_id.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&code.to_le_bytes());
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes.extend_from_slice(&address.to_le_bytes());
        bytes.extend_from_slice(&(parameters.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        for index in 0..EXCEPTION_MAXIMUM_PARAMETERS {
            bytes.extend_from_slice(&parameters.get(index).copied().unwrap_or(0).to_le_bytes());
        }
        bytes.extend_from_slice(&context.size.to_le_bytes());
        bytes.extend_from_slice(&context.rva.to_le_bytes());
        self.stream(stream_type::EXCEPTION, bytes)
    }

    pub fn build(mut self) -> Vec<u8>
    {
        if let Some(threads) = self.threads.take() {
            let mut bytes = (threads.len() as u32).to_le_bytes().to_vec();
            for thread in threads {
                bytes.extend_from_slice(&thread.id.to_le_bytes());
                bytes.extend_from_slice(&[0u8; 12]); // suspend count, priority class, priority
                bytes.extend_from_slice(&0x7ff0_0000_0000u64.to_le_bytes()); // teb
                let (start, stack) = thread.stack.unwrap_or((0, Location { size: 0, rva: 0 }));
                bytes.extend_from_slice(&start.to_le_bytes());
                bytes.extend_from_slice(&stack.size.to_le_bytes());
                bytes.extend_from_slice(&stack.rva.to_le_bytes());
                bytes.extend_from_slice(&thread.context.size.to_le_bytes());
                bytes.extend_from_slice(&thread.context.rva.to_le_bytes());
            }
            self.streams.push((stream_type::THREAD_LIST, bytes));
        }

        if let Some(modules) = self.modules.take() {
            let mut bytes = (modules.len() as u32).to_le_bytes().to_vec();
            for module in modules {
                bytes.extend_from_slice(&module.base.to_le_bytes());
                bytes.extend_from_slice(&module.size.to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes()); // checksum
                bytes.extend_from_slice(&module.timestamp.to_le_bytes());
                bytes.extend_from_slice(&module.name.rva.to_le_bytes());
                bytes.extend_from_slice(&[0u8; 52]); // VS_FIXEDFILEINFO
                let codeview = module.codeview.unwrap_or(Location { size: 0, rva: 0 });
                bytes.extend_from_slice(&codeview.size.to_le_bytes());
                bytes.extend_from_slice(&codeview.rva.to_le_bytes());
                bytes.extend_from_slice(&[0u8; 8]); // misc record
                bytes.extend_from_slice(&[0u8; 16]); // reserved
            }
            self.streams.push((stream_type::MODULE_LIST, bytes));
        }

        if let Some(memory) = self.memory.take() {
            let mut bytes = (memory.len() as u32).to_le_bytes().to_vec();
            for (start, location) in memory {
                bytes.extend_from_slice(&start.to_le_bytes());
                bytes.extend_from_slice(&location.size.to_le_bytes());
                bytes.extend_from_slice(&location.rva.to_le_bytes());
            }
            self.streams.push((stream_type::MEMORY_LIST, bytes));
        }

        if let Some(memory64) = self.memory64.take() {
            let all: Vec<u8> = memory64.iter().flat_map(|(_, bytes)| bytes.iter().copied()).collect();
            let base = self.blob(&all);
            let mut bytes = Vec::new();
            bytes.extend_from_slice(&(memory64.len() as u64).to_le_bytes());
            bytes.extend_from_slice(&u64::from(base.rva).to_le_bytes());
            for (start, data) in &memory64 {
                bytes.extend_from_slice(&start.to_le_bytes());
                bytes.extend_from_slice(&(data.len() as u64).to_le_bytes());
            }
            self.streams.push((stream_type::MEMORY64_LIST, bytes));
        }

        let streams = std::mem::take(&mut self.streams);
        let mut directory = Vec::new();
        for (stream_type, bytes) in &streams {
            let location = self.blob(bytes);
            directory.push((*stream_type, location));
        }

        let directory_rva = self.blob(&[]).rva;
        for (stream_type, location) in &directory {
            self.data.extend_from_slice(&stream_type.to_le_bytes());
            self.data.extend_from_slice(&location.size.to_le_bytes());
            self.data.extend_from_slice(&location.rva.to_le_bytes());
        }

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(&MINIDUMP_SIGNATURE.to_le_bytes());
        header.extend_from_slice(&0xa793u32.to_le_bytes());
        header.extend_from_slice(&(directory.len() as u32).to_le_bytes());
        header.extend_from_slice(&directory_rva.to_le_bytes());
        header.extend_from_slice(&0u32.to_le_bytes()); // checksum
        header.extend_from_slice(&self.timestamp.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes()); // flags
        self.data[..HEADER_SIZE].copy_from_slice(&header);
        self.data
    }

    fn string(&mut self, text: &str) -> Location
    {
        let units: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut bytes = (units.len() as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(&units);
        bytes.extend_from_slice(&[0, 0]);
        self.blob(&bytes)
    }
}

/// x86-64 context with the given registers set
pub fn x86_64_context(registers: &[(&str, u64)]) -> Vec<u8>
{
    let mut context = vec![0u8; X86_64_CONTEXT_SIZE];
    context[48..52].copy_from_slice(&0x0010_001fu32.to_le_bytes()); // CONTEXT_AMD64 | full
    for &(name, value) in registers {
        let offset = match name {
            "rax" => 120,
            "rcx" => 128,
            "rdx" => 136,
            "rbx" => 144,
            "rsp" => 152,
            "rbp" => 160,
            "rsi" => 168,
            "rdi" => 176,
            "r8" => 184,
            "r9" => 192,
            "r12" => 216,
            "rip" => 248,
            other => panic!("no offset for {other}"),
        };
        context[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
    context
}

/// ARM64 (`CONTEXT_ARM64`) context with `x[i] = i * 0x0101_0101_0101_0101 + high bit pattern`
pub fn arm64_context(pc: u64, sp: u64, fp: u64) -> Vec<u8>
{
    let mut context = vec![0u8; ARM64_CONTEXT_SIZE];
    context[0..4].copy_from_slice(&0x0040_0007u32.to_le_bytes());
    for index in 0..29u64 {
        let value = 0x8000_0000_0000_0000 | (index << 32) | (0x1000 + index);
        let offset = 8 + 8 * index as usize;
        context[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
    }
    context[8 + 8 * 29..8 + 8 * 30].copy_from_slice(&fp.to_le_bytes());
    context[8 + 8 * 31..8 + 8 * 32].copy_from_slice(&sp.to_le_bytes());
    context[264..272].copy_from_slice(&pc.to_le_bytes());
    for index in 0..32usize {
        let offset = 272 + 16 * index;
        for byte in 0..16 {
            context[offset + byte] = (index * 16 + byte) as u8;
        }
    }
    context
}

/// A complete `/proc/<pid>/status` file as a Linux kernel writes it
pub fn proc_status_text(pid: u32) -> String
{
    format!(
        "Name:\ta.out\nUmask:\t0022\nState:\tR (running)\nTgid:\t{pid}\nNgid:\t0\nPid:\t{pid}\nPPid:\t1\n\
         TracerPid:\t0\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\t1000\t1000\t1000\nFDSize:\t64\n\
         Groups:\t1000 \nVmPeak:\t    2600 kB\nVmSize:\t    2600 kB\nVmLck:\t       0 kB\nVmPin:\t       0 kB\n\
         VmHWM:\t     900 kB\nVmRSS:\t     900 kB\nVmData:\t     180 kB\nVmStk:\t     132 kB\n\
         VmExe:\t       8 kB\nVmLib:\t    1500 kB\nVmPTE:\t      44 kB\nVmSwap:\t       0 kB\nThreads:\t1\n\
         SigQ:\t0/63432\nSigPnd:\t0000000000000000\nShdPnd:\t0000000000000000\nSigBlk:\t0000000000000000\n\
         SigIgn:\t0000000000000000\nSigCgt:\t0000000000000000\nCapInh:\t0000000000000000\n\
         CapPrm:\t0000000000000000\nCapEff:\t0000000000000000\nCapBnd:\t000001ffffffffff\n\
         CapAmb:\t0000000000000000\nNoNewPrivs:\t0\nSeccomp:\t0\nCpus_allowed:\tff\n\
         Cpus_allowed_list:\t0-7\nvoluntary_ctxt_switches:\t0\nnonvoluntary_ctxt_switches:\t1\n"
    )
}

/// Minimal Linux x86-64 dump with one thread and a module
pub fn linux_x86_64_dump() -> DumpBuilder
{
    let stack: Vec<u8> = (0..0x100u32).flat_map(|word| word.to_le_bytes()).collect();
    DumpBuilder::new()
        .system_info(processor::AMD64, 0x8201)
        .proc_status(&proc_status_text(16001))
        .thread(16001, &x86_64_context(&[("rip", 0x40_0500), ("rsp", 0x7ffd_0000_0100), ("rbp", 0)]), Some((0x7ffd_0000_0000, stack.as_slice())))
        .module("/tmp/test/linux-x86_64", 0x40_0000, 0x2000, 0, None)
}
