//! DRAM simulator CLI.
//!
//! Drives a memory system from one of three traffic sources: a trace
//! file, a streaming generator, or (the default) a full-speed random
//! generator. After the requested number of cycles the per-channel
//! statistics are printed.

use clap::Parser;
use std::cell::Cell;
use std::process;
use std::rc::Rc;

use dram_emulator::config::Config;
use dram_emulator::sim::{RandomTraffic, StreamTraffic, TraceTraffic, TrafficGen};
use dram_emulator::system::MemorySystem;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cycle-accurate DRAM simulator")]
struct Args {
    /// Device configuration file (TOML)
    config: String,

    #[arg(short, long, default_value_t = 100_000)]
    cycles: u64,

    /// Address stream generator: random or stream
    #[arg(short, long, default_value = "random")]
    stream: String,

    /// Trace file; overrides --stream
    #[arg(short, long)]
    trace: Option<String>,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() {
    let args = Args::parse();
    let config = Config::load(&args.config).unwrap_or_else(|e| {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    });

    println!("Device Configuration");
    println!("--------------------");
    println!("  Protocol:        {:?}", config.protocol);
    println!("  Channels:        {}", config.channels);
    println!(
        "  Ranks:           {} ({} MB/channel)",
        config.ranks, config.channel_size
    );
    println!(
        "  Banks:           {} ({} groups x {})",
        config.banks, config.bankgroups, config.banks_per_group
    );
    println!("  Rows x Columns:  {} x {}", config.rows, config.columns);
    println!("  Bus width:       {}", config.bus_width);
    println!("  Burst length:    {}", config.bl);
    println!("  tCK:             {} ns", config.tck);
    println!("--------------------");

    let reads_done = Rc::new(Cell::new(0u64));
    let writes_done = Rc::new(Cell::new(0u64));
    let read_cb = {
        let reads_done = Rc::clone(&reads_done);
        Box::new(move |_addr: u64| reads_done.set(reads_done.get() + 1))
    };
    let write_cb = {
        let writes_done = Rc::clone(&writes_done);
        Box::new(move |_addr: u64| writes_done.set(writes_done.get() + 1))
    };

    let mut mem = MemorySystem::new(config, read_cb, write_cb);

    let mut traffic: Box<dyn TrafficGen> = if let Some(trace) = args.trace {
        println!("[*] Trace mode: {}", trace);
        Box::new(TraceTraffic::new(&trace).unwrap_or_else(|e| {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }))
    } else if args.stream == "stream" || args.stream == "s" {
        println!("[*] Stream mode");
        Box::new(StreamTraffic::new(args.seed))
    } else {
        println!("[*] Random mode");
        Box::new(RandomTraffic::new(args.seed))
    };

    for _ in 0..args.cycles {
        traffic.tick(&mut mem);
    }

    println!(
        "[*] {} cycles simulated: {} reads, {} writes completed",
        args.cycles,
        reads_done.get(),
        writes_done.get()
    );
    mem.print_stats();
}
