//! Traffic generators.
//!
//! Each generator owns the memory system's front end for the duration
//! of the run: every `tick` advances the memory clock once and offers
//! at most a handful of transactions, respecting backpressure.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::common::Transaction;
use crate::system::MemorySystem;

pub trait TrafficGen {
    /// Advances the memory system one cycle and injects traffic.
    fn tick(&mut self, mem: &mut MemorySystem);
}

/// Deterministic xorshift; good enough to scatter addresses across the
/// device and keeps runs reproducible without an RNG dependency.
fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Full-speed random requests; exercises protocol parallelism and is
/// immune to mapping and scheduling choices. Roughly one write per
/// three requests.
pub struct RandomTraffic {
    state: u64,
    last_addr: u64,
    last_write: bool,
    get_next: bool,
}

impl RandomTraffic {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
            last_addr: 0,
            last_write: false,
            get_next: true,
        }
    }
}

impl TrafficGen for RandomTraffic {
    fn tick(&mut self, mem: &mut MemorySystem) {
        mem.clock_tick();
        if self.get_next {
            self.last_addr = xorshift(&mut self.state);
            self.last_write = xorshift(&mut self.state) % 3 == 0;
        }
        self.get_next = mem.will_accept_transaction(self.last_addr, self.last_write);
        if self.get_next {
            mem.add_transaction(self.last_addr, self.last_write);
        }
    }
}

/// Stream-add: reads two arrays, writes their sum to a third. A cheap
/// approximation that still produces plenty of row-buffer hits.
pub struct StreamTraffic {
    state: u64,
    addr_a: u64,
    addr_b: u64,
    addr_c: u64,
    offset: u64,
    stride: u64,
    array_size: u64,
    inserted_a: bool,
    inserted_b: bool,
    inserted_c: bool,
    first: bool,
}

impl StreamTraffic {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1),
            addr_a: 0,
            addr_b: 0,
            addr_c: 0,
            offset: 0,
            stride: 64,
            array_size: 2 << 20,
            inserted_a: false,
            inserted_b: false,
            inserted_c: false,
            first: true,
        }
    }
}

impl TrafficGen for StreamTraffic {
    fn tick(&mut self, mem: &mut MemorySystem) {
        mem.clock_tick();
        if self.offset >= self.array_size || self.first {
            self.addr_a = xorshift(&mut self.state);
            self.addr_b = xorshift(&mut self.state);
            self.addr_c = xorshift(&mut self.state);
            self.offset = 0;
            self.first = false;
        }

        if !self.inserted_a && mem.will_accept_transaction(self.addr_a + self.offset, false) {
            mem.add_transaction(self.addr_a + self.offset, false);
            self.inserted_a = true;
        }
        if !self.inserted_b && mem.will_accept_transaction(self.addr_b + self.offset, false) {
            mem.add_transaction(self.addr_b + self.offset, false);
            self.inserted_b = true;
        }
        if !self.inserted_c && mem.will_accept_transaction(self.addr_c + self.offset, true) {
            mem.add_transaction(self.addr_c + self.offset, true);
            self.inserted_c = true;
        }

        if self.inserted_a && self.inserted_b && self.inserted_c {
            self.offset += self.stride;
            self.inserted_a = false;
            self.inserted_b = false;
            self.inserted_c = false;
        }
    }
}

/// Replays a trace of `addr READ|WRITE added_cycle` lines, holding
/// each transaction back until its cycle has arrived.
pub struct TraceTraffic {
    lines: std::io::Lines<BufReader<File>>,
    pending: Option<Transaction>,
    clk: u64,
}

impl TraceTraffic {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("cannot open trace file {}", path.display()))?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            pending: None,
            clk: 0,
        })
    }

    fn next_transaction(&mut self) -> Result<Option<Transaction>> {
        for line in self.lines.by_ref() {
            let line = line.context("trace read error")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            return parse_trace_line(line).map(Some);
        }
        Ok(None)
    }
}

fn parse_trace_line(line: &str) -> Result<Transaction> {
    let mut fields = line.split_whitespace();
    let (Some(addr), Some(op), Some(cycle)) = (fields.next(), fields.next(), fields.next())
    else {
        bail!("malformed trace line: {}", line);
    };
    let addr = addr.strip_prefix("0x").unwrap_or(addr);
    let addr = u64::from_str_radix(addr, 16)
        .with_context(|| format!("bad trace address: {}", line))?;
    let is_write = match op {
        "WRITE" | "write" => true,
        "READ" | "read" => false,
        _ => bail!("bad trace operation: {}", line),
    };
    let mut trans = Transaction::new(addr, is_write);
    trans.added_cycle = cycle
        .parse()
        .with_context(|| format!("bad trace cycle: {}", line))?;
    Ok(trans)
}

impl TrafficGen for TraceTraffic {
    fn tick(&mut self, mem: &mut MemorySystem) {
        mem.clock_tick();
        if self.pending.is_none() {
            self.pending = self.next_transaction().unwrap_or_else(|e| {
                eprintln!("trace error: {:#}", e);
                None
            });
        }
        if let Some(trans) = self.pending {
            if trans.added_cycle <= self.clk
                && mem.will_accept_transaction(trans.addr, trans.is_write)
            {
                mem.add_transaction(trans.addr, trans.is_write);
                self.pending = None;
            }
        }
        self.clk += 1;
    }
}
