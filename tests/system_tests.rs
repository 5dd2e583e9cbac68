//! Integration tests for the memory-system front end: callback
//! delivery, channel routing, and the ideal-latency variant.

use std::cell::RefCell;
use std::rc::Rc;

use dram_emulator::config::{Config, RawConfig};
use dram_emulator::system::{Callback, MemorySystem};

type Log = Rc<RefCell<Vec<(u64, bool)>>>;

fn logging_callbacks(log: &Log) -> (Callback, Callback) {
    let read_log = Rc::clone(log);
    let write_log = Rc::clone(log);
    (
        Box::new(move |addr| read_log.borrow_mut().push((addr, false))),
        Box::new(move |addr| write_log.borrow_mut().push((addr, true))),
    )
}

fn small_raw() -> RawConfig {
    let mut raw = RawConfig::default();
    raw.dram_structure.bankgroups = 1;
    raw.dram_structure.banks_per_group = 1;
    raw.dram_structure.rows = 16;
    raw.dram_structure.columns = 16;
    raw.timing.trefi = 1 << 40;
    raw
}

fn build(raw: RawConfig) -> (MemorySystem, Log) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let (read_cb, write_cb) = logging_callbacks(&log);
    let mem = MemorySystem::new(Config::from_raw(raw).unwrap(), read_cb, write_cb);
    (mem, log)
}

/// Tests that a read completes through the read callback.
#[test]
fn test_read_callback_delivery() {
    let (mut mem, log) = build(small_raw());
    assert!(mem.will_accept_transaction(0x0, false));
    assert!(mem.add_transaction(0x0, false));

    for _ in 0..100 {
        mem.clock_tick();
    }
    let log = log.borrow();
    assert_eq!(log.as_slice(), &[(0x0, false)]);
}

/// Tests the write-read short circuit through the facade: both
/// complete, write acknowledged first, nothing read from the wire.
#[test]
fn test_write_read_short_circuit() {
    let (mut mem, log) = build(small_raw());
    assert!(mem.add_transaction(0x100, true));
    assert!(mem.add_transaction(0x100, false));

    for _ in 0..5 {
        mem.clock_tick();
    }
    let log = log.borrow();
    assert_eq!(log.as_slice(), &[(0x100, true), (0x100, false)]);
}

/// Tests duplicate write submission: both accepted and acknowledged.
#[test]
fn test_duplicate_write_acknowledged_twice() {
    let (mut mem, log) = build(small_raw());
    assert!(mem.add_transaction(0x40, true));
    assert!(mem.add_transaction(0x40, true));

    for _ in 0..5 {
        mem.clock_tick();
    }
    assert_eq!(log.borrow().len(), 2);
}

/// Tests routing across two channels.
#[test]
fn test_multi_channel_routing() {
    let mut raw = small_raw();
    raw.system.channels = 2;
    let config = Config::from_raw(raw).unwrap();
    // channel bits sit at the top of the decoded range
    let ch1_addr = 1u64 << (config.shift_bits + config.ch_pos);
    assert_eq!(config.channel_of(ch1_addr), 1);
    assert_eq!(config.channel_of(0x0), 0);

    let mut raw = small_raw();
    raw.system.channels = 2;
    let (mut mem, log) = build(raw);
    assert!(mem.add_transaction(0x0, false));
    assert!(mem.add_transaction(ch1_addr, false));

    for _ in 0..100 {
        mem.clock_tick();
    }
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert!(log.contains(&(0x0, false)));
    assert!(log.contains(&(ch1_addr, false)));
}

/// Tests that replaced callbacks receive subsequent completions.
#[test]
fn test_register_callbacks() {
    let (mut mem, old_log) = build(small_raw());
    let new_log: Log = Rc::new(RefCell::new(Vec::new()));
    let (read_cb, write_cb) = logging_callbacks(&new_log);
    mem.register_callbacks(read_cb, write_cb);

    assert!(mem.add_transaction(0x0, false));
    for _ in 0..100 {
        mem.clock_tick();
    }
    assert!(old_log.borrow().is_empty());
    assert_eq!(new_log.borrow().len(), 1);
}

/// Tests the ideal engine: fixed latency, unconditional acceptance.
#[test]
fn test_ideal_memory() {
    let mut raw = small_raw();
    raw.system.ideal_memory = true;
    raw.timing.ideal_memory_latency = 5;
    let (mut mem, log) = build(raw);

    assert!(mem.will_accept_transaction(0x0, false));
    assert!(mem.add_transaction(0x0, false));
    assert!(mem.add_transaction(0x40, true));

    for _ in 0..5 {
        mem.clock_tick();
        assert!(log.borrow().is_empty());
    }
    mem.clock_tick();
    let log = log.borrow();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], (0x0, false));
    assert_eq!(log[1], (0x40, true));
}

/// Tests the configuration getters on the facade.
#[test]
fn test_facade_getters() {
    let (mem, _log) = build(small_raw());
    assert_eq!(mem.bus_bits(), 64);
    assert_eq!(mem.burst_length(), 8);
    assert_eq!(mem.queue_size(), 32);
    assert!((mem.tck() - 1.0).abs() < f64::EPSILON);
}
