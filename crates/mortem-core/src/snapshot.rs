//! # Target Assembler
//!
//! Builds a frozen [`ProcessSnapshot`] from a minidump buffer and exposes it
//! through the [`Target`] trait.
//!
//! ## Load order
//!
//! 1. Parse the header and stream directory (fatal on failure)
//! 2. System info: architecture and platform (required)
//! 3. Modules, so memory regions can be named after them
//! 4. Captured memory, then every thread's stack on top of it
//! 5. Threads: register banks, exception stop reasons, unwound frames
//! 6. The memory map
//!
//! Missing optional streams leave the matching collection empty and add a
//! [`Diagnostic`]. The dump buffer is copied from, never borrowed, so the
//! snapshot outlives it and two loads of the same bytes share nothing.

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::dump::format::{platform, processor, stream_type, RawExceptionStream, RawThread, MINIDUMP_MISC1_PROCESS_ID};
use crate::dump::linux::{parse_maps, parse_status_pid};
use crate::dump::Minidump;
use crate::error::{MortemError, Result};
use crate::exception::resolve_stop;
use crate::memory::{CapturedMemory, MemoryMap, MemoryRead, ReadStop, RegionSources};
use crate::modules::{Module, ModuleList};
use crate::options::LoadOptions;
use crate::registers::{RegisterBank, RegisterValue};
use crate::target::Target;
use crate::types::{
    Address, AddressRange, Architecture, MemoryRegion, Platform, ProcessId, StackFrame, ThreadId, ThreadStop,
};
use crate::unwind::FrameWalker;

/// One thread of the dumped process
#[derive(Debug, Clone)]
pub struct Thread
{
    /// Thread id as recorded in the dump (never resolved against the host)
    pub id: ThreadId,
    /// Registers of frame 0; `None` when the record has no usable context
    pub registers: Option<RegisterBank>,
    /// Why the thread is stopped
    pub stop: ThreadStop,
    /// Captured stack range, if the dump saved one
    pub stack: Option<AddressRange>,
    /// Suspend count at dump time
    pub suspend_count: u32,
    /// Thread environment block (Windows) or thread pointer
    pub teb: u64,
    /// Frames recovered by the frame-pointer walker
    pub frames: Vec<StackFrame>,
}

impl Thread
{
    /// Registers of frame 0
    ///
    /// ## Errors
    ///
    /// [`MortemError::RegisterUnavailable`] naming `register` when the dump
    /// held no usable context for this thread.
    pub fn register_bank(&self, register: &str) -> Result<&RegisterBank>
    {
        self.registers.as_ref().ok_or_else(|| MortemError::RegisterUnavailable {
            name: register.to_string(),
            frame: 0,
        })
    }
}

/// A post-mortem process reconstructed from a minidump
///
/// Immutable once loaded; all mutating [`Target`] operations fail.
#[derive(Debug, Clone)]
pub struct ProcessSnapshot
{
    pid: Option<ProcessId>,
    architecture: Architecture,
    platform: Platform,
    timestamp: Option<DateTime<Utc>>,
    threads: Vec<Thread>,
    modules: ModuleList,
    memory_map: MemoryMap,
    memory: CapturedMemory,
    diagnostics: Diagnostics,
}

/// Load a snapshot from a minidump buffer
///
/// ## Errors
///
/// - [`MortemError::Format`]: not a minidump, a truncated or out-of-bounds
///   record, or no system info stream
/// - [`MortemError::UnsupportedArchitecture`]: no register layout for the CPU
/// - [`MortemError::CorruptMemoryMap`]: overlapping memory records or regions
///
/// ## Example
///
/// ```rust,no_run
/// use mortem_core::{load_core, LoadOptions, Target};
///
/// let bytes = std::fs::read("crash.dmp")?;
/// let snapshot = load_core(&bytes, &LoadOptions::default())?;
/// println!("{} threads", snapshot.thread_count());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[instrument(skip_all, fields(len = bytes.len()))]
pub fn load_core(bytes: &[u8], options: &LoadOptions) -> Result<ProcessSnapshot>
{
    let dump = Minidump::parse(bytes)?;
    let mut diagnostics = Diagnostics::default();
    for duplicate in dump.duplicate_streams() {
        diagnostics.push(Diagnostic::DuplicateStream {
            name: duplicate.name(),
            offset: duplicate.offset,
        });
    }

    let system_info = dump
        .system_info()?
        .ok_or_else(|| MortemError::Format("no SystemInfo stream".to_string()))?;
    let processor_tag = system_info.processor_architecture;
    let architecture = architecture_from_tag(processor_tag)?;
    let platform = platform_from_id(system_info.platform_id);
    debug!(%architecture, %platform, "Read system info");

    for required in [stream_type::THREAD_LIST, stream_type::MODULE_LIST] {
        if !dump.has_stream(required) {
            diagnostics.push(Diagnostic::MissingStream(stream_type::name(required)));
        }
    }
    if !dump.has_stream(stream_type::MEMORY_LIST) && !dump.has_stream(stream_type::MEMORY64_LIST) {
        diagnostics.push(Diagnostic::MissingStream(stream_type::name(stream_type::MEMORY_LIST)));
    }

    let pid = process_id(&dump);
    let modules = ModuleList::from_dump(&dump, platform, &options.image_search_paths, &mut diagnostics)?;
    let mut memory = CapturedMemory::build(dump.memory_records()?, bytes, &mut diagnostics)?;

    let raw_threads = dump.threads()?;
    for raw in &raw_threads {
        add_stack(&dump, raw, &mut memory, &mut diagnostics)?;
    }

    let exception = dump.exception()?;
    if let Some(exception) = &exception {
        let id = ThreadId::from(exception.thread_id);
        if !raw_threads.iter().any(|raw| raw.thread_id == exception.thread_id) {
            diagnostics.push(Diagnostic::UnknownExceptionThread(id));
        }
    }

    let walker = FrameWalker::new(architecture, platform, &memory);
    let mut threads = Vec::with_capacity(raw_threads.len());
    for raw in &raw_threads {
        let thread = build_thread(&dump, raw, exception.as_ref(), processor_tag, platform, &mut diagnostics)?;
        let frames = thread
            .registers
            .as_ref()
            .map(|registers| walker.walk(registers, options.max_frames))
            .unwrap_or_default();
        threads.push(Thread { frames, ..thread });
    }

    let memory_map = MemoryMap::build(RegionSources {
        linux_maps: dump.text_stream(stream_type::LINUX_MAPS).map(|maps| parse_maps(&maps)),
        memory_info: dump.memory_info()?,
        captured: &memory,
        modules: &modules,
    })?;

    info!(
        pid = ?pid.map(|pid| pid.0),
        threads = threads.len(),
        modules = modules.len(),
        regions = memory_map.regions().len(),
        diagnostics = diagnostics.as_slice().len(),
        "Loaded snapshot"
    );

    Ok(ProcessSnapshot {
        pid,
        architecture,
        platform,
        timestamp: dump.time_date_stamp(),
        threads,
        modules,
        memory_map,
        memory,
        diagnostics,
    })
}

/// Read a file and load it with [`load_core`]
///
/// ## Errors
///
/// [`MortemError::Io`] if the file cannot be read, otherwise as [`load_core`].
pub fn load_core_from_path(path: impl AsRef<Path>, options: &LoadOptions) -> Result<ProcessSnapshot>
{
    let path = path.as_ref();
    debug!(path = %path.display(), "Reading dump");
    let bytes = std::fs::read(path)?;
    load_core(&bytes, options)
}

fn architecture_from_tag(tag: u16) -> Result<Architecture>
{
    match tag {
        processor::AMD64 => Ok(Architecture::X86_64),
        processor::ARM => Ok(Architecture::Arm),
        processor::ARM64 | processor::ARM64_OLD => Ok(Architecture::Arm64),
        other => Err(MortemError::UnsupportedArchitecture(other)),
    }
}

fn platform_from_id(id: u32) -> Platform
{
    match id {
        platform::WIN32_NT => Platform::Windows,
        platform::MACOS => Platform::MacOs,
        platform::IOS => Platform::Ios,
        platform::LINUX => Platform::Linux,
        platform::ANDROID => Platform::Android,
        platform::SOLARIS => Platform::Solaris,
        platform::FUCHSIA => Platform::Fuchsia,
        other => Platform::Unknown(other),
    }
}

/// `MiscInfo` when it flags the pid as valid, else the `Pid:` line of `/proc/<pid>/status`
fn process_id(dump: &Minidump<'_>) -> Option<ProcessId>
{
    if let Some(misc) = dump.misc_info() {
        if misc.flags1 & MINIDUMP_MISC1_PROCESS_ID != 0 {
            return Some(ProcessId::from(misc.process_id));
        }
    }
    dump.text_stream(stream_type::LINUX_PROC_STATUS)
        .and_then(|status| parse_status_pid(&status))
        .map(ProcessId::from)
}

/// Make a thread's stack readable through captured memory
///
/// Stacks already covered by a memory record are skipped; a stack that only
/// partly overlaps other memory is reported and left out.
fn add_stack(
    dump: &Minidump<'_>,
    raw: &RawThread,
    memory: &mut CapturedMemory,
    diagnostics: &mut Diagnostics,
) -> Result<()>
{
    let Some(range) = stack_range(raw) else {
        return Ok(());
    };
    if memory.covers(range) {
        return Ok(());
    }

    let bytes = dump.location(raw.stack.memory)?;
    if !memory.insert(range, bytes) {
        diagnostics.push(Diagnostic::OverlappingStack {
            thread: ThreadId::from(raw.thread_id),
            range,
        });
    }
    Ok(())
}

fn stack_range(raw: &RawThread) -> Option<AddressRange>
{
    let size = u64::from(raw.stack.memory.data_size);
    if size == 0 {
        return None;
    }
    AddressRange::from_len(Address::new(raw.stack.start_of_memory_range), size)
}

fn build_thread(
    dump: &Minidump<'_>,
    raw: &RawThread,
    exception: Option<&RawExceptionStream>,
    processor_tag: u16,
    platform: Platform,
    diagnostics: &mut Diagnostics,
) -> Result<Thread>
{
    let id = ThreadId::from(raw.thread_id);
    let exception = exception.filter(|exception| exception.thread_id == raw.thread_id);

    // The exception stream's context is the state at the fault; the thread
    // list may hold the state of the exception handler instead.
    let location = match exception {
        Some(exception) if exception.thread_context.data_size != 0 => exception.thread_context,
        _ => raw.thread_context,
    };
    // A thread without registers is still a thread; only its frames are lost.
    let registers = if location.data_size == 0 {
        diagnostics.push(Diagnostic::UnusableContext {
            thread: id,
            reason: "no context recorded".to_string(),
        });
        None
    } else {
        match RegisterBank::new(processor_tag, platform, dump.location(location)?) {
            Ok(registers) => Some(registers),
            Err(MortemError::Format(reason)) => {
                diagnostics.push(Diagnostic::UnusableContext { thread: id, reason });
                None
            }
            Err(error) => return Err(error),
        }
    };

    let stop = exception.map_or_else(ThreadStop::none, |exception| {
        resolve_stop(platform, &exception.exception_record)
    });

    Ok(Thread {
        id,
        registers,
        stop,
        stack: stack_range(raw),
        suspend_count: raw.suspend_count,
        teb: raw.teb,
        frames: Vec::new(),
    })
}

impl ProcessSnapshot
{
    /// Threads in dump order
    pub fn threads(&self) -> &[Thread]
    {
        &self.threads
    }

    /// Thread at `index`
    pub fn thread(&self, index: usize) -> Result<&Thread>
    {
        self.threads.get(index).ok_or(MortemError::ThreadNotFound(index))
    }

    /// Module list
    pub fn module_list(&self) -> &ModuleList
    {
        &self.modules
    }

    /// Reconstructed address space
    pub fn memory_map(&self) -> &MemoryMap
    {
        &self.memory_map
    }

    /// Bytes captured in the dump
    pub fn captured_memory(&self) -> &CapturedMemory
    {
        &self.memory
    }

    /// Time the dump was written, if recorded
    pub fn timestamp(&self) -> Option<DateTime<Utc>>
    {
        self.timestamp
    }

    /// Non-fatal findings of the load
    pub fn diagnostics(&self) -> &Diagnostics
    {
        &self.diagnostics
    }

    /// Index of the thread an exception targets, if any
    pub fn crashed_thread(&self) -> Option<usize>
    {
        self.threads.iter().position(|thread| thread.stop.is_crash())
    }

    fn immutable(operation: &'static str) -> MortemError
    {
        MortemError::SnapshotImmutable { operation }
    }
}

impl Target for ProcessSnapshot
{
    fn process_id(&self) -> Option<ProcessId>
    {
        self.pid
    }

    fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    fn platform(&self) -> Platform
    {
        self.platform
    }

    fn thread_count(&self) -> usize
    {
        self.threads.len()
    }

    fn thread_id(&self, thread: usize) -> Result<ThreadId>
    {
        self.thread(thread).map(|thread| thread.id)
    }

    fn register(&self, thread: usize, frame: usize, name: &str) -> Result<RegisterValue>
    {
        let thread_index = thread;
        let thread = self.thread(thread_index)?;
        if frame == 0 {
            return thread.register_bank(name)?.read(name);
        }

        let unwound = thread.frames.get(frame).ok_or(MortemError::FrameUnavailable {
            thread: thread_index,
            frame,
        })?;
        let layout = thread.register_bank(name)?.layout();
        let info = layout
            .lookup(name)
            .ok_or_else(|| MortemError::UnknownRegister(name.to_string()))?;

        // Outer frames only know pc, sp and fp, under any of their names.
        let recovered = [("pc", unwound.pc), ("sp", unwound.sp), ("fp", unwound.fp)]
            .into_iter()
            .find(|(generic, _)| {
                layout
                    .lookup(generic)
                    .is_some_and(|known| known.offset == info.offset && known.width == info.width)
            });
        match recovered {
            Some((_, value)) => {
                let bytes = value.value().to_le_bytes();
                Ok(RegisterValue::from_bytes(&bytes[..info.width.min(bytes.len())]))
            }
            None => Err(MortemError::RegisterUnavailable {
                name: name.to_string(),
                frame,
            }),
        }
    }

    fn frames(&self, thread: usize) -> Result<&[StackFrame]>
    {
        self.thread(thread).map(|thread| thread.frames.as_slice())
    }

    fn memory_region(&self, address: Address) -> MemoryRegion
    {
        self.memory_map.region_at(address)
    }

    fn memory_regions(&self) -> &[MemoryRegion]
    {
        self.memory_map.regions()
    }

    fn read_memory(&self, address: Address, len: usize) -> MemoryRead
    {
        if len == 0 {
            return MemoryRead::Full(Vec::new());
        }

        let (bytes, stopped_at) = self.memory.read_contiguous(address, len);
        if bytes.len() == len {
            return MemoryRead::Full(bytes);
        }

        let stop = if self.memory_map.region_at(stopped_at).mapped {
            ReadStop::NotCaptured
        } else {
            ReadStop::Unmapped
        };
        match (bytes.is_empty(), stop) {
            (true, ReadStop::NotCaptured) => MemoryRead::NotCaptured,
            (true, ReadStop::Unmapped) => MemoryRead::Unmapped,
            (false, stop) => MemoryRead::Partial { bytes, stop },
        }
    }

    fn modules(&self) -> &[Module]
    {
        self.modules.as_slice()
    }

    fn module_for_address(&self, address: Address) -> Option<&Module>
    {
        self.modules.module_for_address(address)
    }

    fn stop_reason(&self, thread: usize) -> Result<&ThreadStop>
    {
        self.thread(thread).map(|thread| &thread.stop)
    }

    fn is_stopped(&self) -> bool
    {
        true
    }

    fn resume(&mut self) -> Result<()>
    {
        Err(Self::immutable("resume"))
    }

    fn step(&mut self, _thread: usize) -> Result<()>
    {
        Err(Self::immutable("step"))
    }

    /// Always succeeds: a snapshot never runs.
    fn suspend(&mut self) -> Result<()>
    {
        Ok(())
    }

    fn write_memory(&mut self, _address: Address, _data: &[u8]) -> Result<usize>
    {
        Err(Self::immutable("write memory"))
    }

    fn write_register(&mut self, _thread: usize, _name: &str, _value: u64) -> Result<()>
    {
        Err(Self::immutable("write registers"))
    }
}
