use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use mortem_core::registers::RegisterClass;
use mortem_core::{
    load_core_from_path, Address, LoadOptions, MemoryRead, MortemError, ProcessSnapshot, ReadStop,
    Result as MortemResult, Target,
};
use mortem_utils::{info, logging, LogConfig, LogLevel};

/// Inspect minidumps as read-only debugger targets.
#[derive(Parser, Debug)]
#[command(name = "mortem")]
#[command(version)]
#[command(about = "Inspect minidumps as read-only debugger targets", long_about = None)]
struct Cli
{
    /// Minidump file to load
    dump: PathBuf,
    /// Directory searched for on-disk module images (repeatable)
    #[arg(long = "image-path", global = true)]
    image_paths: Vec<PathBuf>,
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Show process information (pid, architecture, crash reason)
    Info,
    /// List all threads with their stop reasons
    Threads,
    /// Display registers of a thread
    Registers
    {
        /// Thread index
        #[arg(short, long, default_value_t = 0)]
        thread: usize,
        /// Frame index (0 = innermost)
        #[arg(short, long, default_value_t = 0)]
        frame: usize,
        /// Register names (default: general-purpose registers)
        names: Vec<String>,
    },
    /// List loaded modules
    Modules,
    /// List memory regions
    Regions,
    /// Show the region containing an address
    Region
    {
        /// Address (hex format: 0x1000 or decimal)
        address: String,
    },
    /// Read memory from the snapshot
    Memory
    {
        /// Memory address to read from (hex format: 0x1000 or decimal)
        address: String,
        /// Number of bytes to read (default: 64)
        #[arg(short, long, default_value_t = 64)]
        length: usize,
    },
    /// Show the unwound frames of a thread
    Backtrace
    {
        /// Thread index (default: the crashed thread, else 0)
        #[arg(short, long)]
        thread: Option<usize>,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match logging::init(&LogConfig::from_env().with_level(cli.log_level)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(cli: Cli) -> MortemResult<()>
{
    let mut options = LoadOptions::from_env()?;
    options.image_search_paths.extend(cli.image_paths);

    info!(dump = %cli.dump.display(), "Loading dump");
    let snapshot = load_core_from_path(&cli.dump, &options)?;

    match cli.command {
        Commands::Info => print_info(&snapshot),
        Commands::Threads => print_threads(&snapshot),
        Commands::Registers { thread, frame, names } => print_registers(&snapshot, thread, frame, &names)?,
        Commands::Modules => {
            for module in snapshot.modules() {
                let version = module.version.as_deref().unwrap_or("-");
                let image = module
                    .image
                    .as_ref()
                    .map_or_else(String::new, |image| format!(" [{}]", image.path.display()));
                println!("{module} {version}{image}");
            }
        }
        Commands::Regions => {
            for region in snapshot.memory_regions() {
                println!("{region}");
            }
        }
        Commands::Region { address } => {
            let address = parse_address(&address)?;
            println!("{}", snapshot.memory_region(address));
        }
        Commands::Memory { address, length } => {
            let address = parse_address(&address)?;
            print_memory(&snapshot, address, length);
        }
        Commands::Backtrace { thread } => {
            let thread = thread.or_else(|| snapshot.crashed_thread()).unwrap_or(0);
            print_backtrace(&snapshot, thread)?;
        }
    }
    Ok(())
}

/// Parse `0x`-prefixed hex or plain decimal
fn parse_address(text: &str) -> MortemResult<Address>
{
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.replace('_', "").parse(),
    };
    parsed
        .map(Address::new)
        .map_err(|_| MortemError::InvalidArgument(format!("invalid address: {text}")))
}

fn print_info(snapshot: &ProcessSnapshot)
{
    println!("Snapshot Information:");
    match snapshot.process_id() {
        Some(pid) => println!("  Process ID: {pid}"),
        None => println!("  Process ID: unknown"),
    }
    println!("  Architecture: {}", snapshot.architecture());
    println!("  Platform: {}", snapshot.platform());
    if let Some(timestamp) = snapshot.timestamp() {
        println!("  Dumped At: {}", timestamp.to_rfc3339());
    }
    println!("  Threads: {}", snapshot.thread_count());
    println!("  Modules: {}", snapshot.modules().len());
    println!("  Memory Regions: {}", snapshot.memory_regions().len());
    if let Some(thread) = snapshot.crashed_thread() {
        if let Ok(stop) = snapshot.stop_reason(thread) {
            println!("  Crashed Thread: {thread}");
            println!("  Stop Reason: {} ({})", stop.reason.kind(), stop.description);
        }
    }

    let diagnostics = snapshot.diagnostics();
    if !diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in diagnostics.as_slice() {
            println!("  {diagnostic}");
        }
    }
}

fn print_threads(snapshot: &ProcessSnapshot)
{
    for (index, thread) in snapshot.threads().iter().enumerate() {
        let stop = if thread.stop.is_crash() {
            format!(" stop: {}", thread.stop.description)
        } else {
            String::new()
        };
        let Some(registers) = &thread.registers else {
            println!("{index:>3} tid {} pc ? (no context){stop}", thread.id);
            continue;
        };
        let pc = registers.pc();
        let module = snapshot
            .module_for_address(Address::new(pc))
            .map_or("?", |module| module.basename());
        println!("{index:>3} tid {} pc 0x{pc:x} ({module}){stop}", thread.id);
    }
}

fn print_registers(snapshot: &ProcessSnapshot, thread: usize, frame: usize, names: &[String]) -> MortemResult<()>
{
    let names: Vec<String> = if !names.is_empty() {
        names.to_vec()
    } else if frame == 0 {
        snapshot
            .thread(thread)?
            .register_bank("pc")?
            .primary()
            .filter(|(register, _)| matches!(register.class, RegisterClass::General | RegisterClass::Status))
            .map(|(register, _)| register.name.clone())
            .collect()
    } else {
        vec!["pc".to_string(), "sp".to_string(), "fp".to_string()]
    };

    for name in names {
        let value = snapshot.register(thread, frame, &name)?;
        println!("{name:>8} = {value}");
    }
    Ok(())
}

fn print_memory(snapshot: &ProcessSnapshot, address: Address, length: usize)
{
    let read = snapshot.read_memory(address, length);
    for (index, chunk) in read.bytes().chunks(16).enumerate() {
        let line_address = address.saturating_add(16 * index as u64);
        let hex: Vec<String> = chunk.iter().map(|byte| format!("{byte:02x}")).collect();
        let ascii: String = chunk
            .iter()
            .map(|&byte| if byte.is_ascii_graphic() || byte == b' ' { byte as char } else { '.' })
            .collect();
        println!("{line_address}: {:<47}  {ascii}", hex.join(" "));
    }

    match read {
        MemoryRead::Full(_) => {}
        MemoryRead::Partial { bytes, stop } => {
            let reason = match stop {
                ReadStop::Unmapped => "unmapped",
                ReadStop::NotCaptured => "not captured",
            };
            println!("(read {} of {length} bytes; the rest is {reason})", bytes.len());
        }
        MemoryRead::NotCaptured => println!("{address} is mapped but was not captured in the dump"),
        MemoryRead::Unmapped => println!("{address} is not mapped"),
    }
}

fn print_backtrace(snapshot: &ProcessSnapshot, thread: usize) -> MortemResult<()>
{
    println!("thread {thread} (tid {}):", snapshot.thread_id(thread)?);
    for frame in snapshot.frames(thread)? {
        let location = snapshot.module_for_address(frame.pc).map_or_else(
            || "?".to_string(),
            |module| {
                let offset = frame.pc.offset_from(module.base).unwrap_or(0);
                format!("{}+0x{offset:x}", module.basename())
            },
        );
        println!(
            "  #{:<3} {} sp={} {location} ({:?})",
            frame.index, frame.pc, frame.sp, frame.status
        );
    }
    Ok(())
}
