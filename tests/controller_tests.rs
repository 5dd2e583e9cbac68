//! End-to-end controller scenarios on a minimal single-bank device.

use std::sync::Arc;

use dram_emulator::common::Transaction;
use dram_emulator::config::{Config, RawConfig};
use dram_emulator::core::controller::Controller;
use dram_emulator::core::timing::Timing;

fn scenario_raw() -> RawConfig {
    let mut raw = RawConfig::default();
    raw.dram_structure.protocol = "DDR4".to_string();
    raw.dram_structure.bankgroups = 1;
    raw.dram_structure.banks_per_group = 1;
    raw.dram_structure.rows = 16;
    raw.dram_structure.columns = 16;
    // equal short/long gaps keep the expected deltas unambiguous on a
    // single-bankgroup device
    raw.timing.tccd_s = raw.timing.tccd_l;
    // push refresh far beyond the test horizon
    raw.timing.trefi = 1 << 40;
    raw
}

fn build_controller(raw: RawConfig) -> Controller {
    let config = Arc::new(Config::from_raw(raw).unwrap());
    let timing = Arc::new(Timing::new(&config));
    Controller::new(0, config, timing)
}

/// Runs the controller for `cycles`, returning `(clk, addr, is_write)`
/// completions in delivery order.
fn run(ctrl: &mut Controller, cycles: u64) -> Vec<(u64, u64, bool)> {
    let mut done = Vec::new();
    for clk in 0..cycles {
        while let Some((addr, is_write)) = ctrl.return_done_trans(clk) {
            done.push((clk, addr, is_write));
        }
        ctrl.clock_tick();
    }
    done
}

/// Cold read: activate, then read at tRCD, completion read_delay
/// later.
#[test]
fn test_cold_read() {
    let mut ctrl = build_controller(scenario_raw());
    assert!(ctrl.will_accept_transaction(0x0, false));
    ctrl.add_transaction(Transaction::new(0x0, false));

    let done = run(&mut ctrl, 100);
    assert_eq!(done.len(), 1);
    // schedule at 0, ACT at 1, READ at 1 + tRCD, data read_delay later
    assert_eq!(done[0], (1 + 10 + 16, 0x0, false));
    assert_eq!(ctrl.stats.num_act_cmds, 1);
    assert_eq!(ctrl.stats.num_read_cmds, 1);
    assert_eq!(ctrl.stats.num_pre_cmds, 0);
    assert_eq!(ctrl.stats.num_read_row_hits, 0);
}

/// Row-hit read pair: one activate, two reads a CAS-to-CAS gap apart.
#[test]
fn test_row_hit_read_pair() {
    let mut ctrl = build_controller(scenario_raw());
    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x40, false));

    let done = run(&mut ctrl, 100);
    assert_eq!(done.len(), 2);
    let first = done[0].0;
    let second = done[1].0;
    // second read trails by max(burst, tCCD_L)
    assert_eq!(second - first, 6);
    assert_eq!(ctrl.stats.num_act_cmds, 1);
    assert_eq!(ctrl.stats.num_pre_cmds, 0);
    assert_eq!(ctrl.stats.num_read_cmds, 2);
    assert_eq!(ctrl.stats.num_read_row_hits, 1);
}

/// Row-miss read pair: precharge and a second activate in between.
#[test]
fn test_row_miss_read_pair() {
    let mut ctrl = build_controller(scenario_raw());
    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x80, false)); // next row

    let done = run(&mut ctrl, 200);
    assert_eq!(done.len(), 2);
    assert_eq!(ctrl.stats.num_act_cmds, 2);
    assert_eq!(ctrl.stats.num_pre_cmds, 1);
    assert_eq!(ctrl.stats.num_read_cmds, 2);
    // ACT@1, READ@11, PRE@max(tRAS+1, READ+AL+tRTP), ACT@+tRP, READ@+tRCD
    assert_eq!(done[0].0, 27);
    assert_eq!(done[1].0, 25 + 10 + 10 + 16);
}

/// Write-read short-circuit: the read is satisfied from the pending
/// write at clk + 1 and never reaches the wire.
#[test]
fn test_write_read_short_circuit() {
    let mut ctrl = build_controller(scenario_raw());
    ctrl.add_transaction(Transaction::new(0x100, true));
    ctrl.add_transaction(Transaction::new(0x100, false));

    let done = run(&mut ctrl, 50);
    assert_eq!(done.len(), 2);
    assert_eq!(done[0], (1, 0x100, true));
    assert_eq!(done[1], (1, 0x100, false));
    // nothing went on the wire for the read
    assert_eq!(ctrl.stats.num_read_cmds, 0);
}

/// Duplicate writes merge: both acknowledged, one wire write.
#[test]
fn test_write_merge() {
    let mut raw = scenario_raw();
    raw.system.trans_queue_size = 4;
    let mut ctrl = build_controller(raw);

    ctrl.add_transaction(Transaction::new(0x0, true));
    ctrl.add_transaction(Transaction::new(0x0, true)); // merged
    ctrl.add_transaction(Transaction::new(0x40, true));
    ctrl.add_transaction(Transaction::new(0x80, true));
    ctrl.add_transaction(Transaction::new(0xc0, true));

    let done = run(&mut ctrl, 200);
    // five acknowledgements, four wire writes
    assert_eq!(done.len(), 5);
    assert!(done.iter().all(|&(clk, _, is_write)| clk == 1 && is_write));
    assert_eq!(ctrl.stats.num_write_cmds, 4);
}

/// Write drain: a full buffer switches the scheduler to writes until
/// the drain count runs out.
#[test]
fn test_write_drain_on_full_buffer() {
    let mut raw = scenario_raw();
    raw.system.trans_queue_size = 4;
    let mut ctrl = build_controller(raw);

    ctrl.add_transaction(Transaction::new(0x200, false));
    for addr in [0x0u64, 0x40, 0x80, 0xc0] {
        assert!(ctrl.will_accept_transaction(addr, true));
        ctrl.add_transaction(Transaction::new(addr, true));
    }
    assert!(!ctrl.will_accept_transaction(0x100, true));

    let done = run(&mut ctrl, 300);
    assert_eq!(done.len(), 5);
    assert_eq!(ctrl.stats.num_write_cmds, 4);
    assert_eq!(ctrl.stats.num_read_cmds, 1);
}

/// Write drain aborts when a matching-address read is pending; the
/// read goes first and the write stays buffered.
#[test]
fn test_write_drain_read_dependency() {
    let mut raw = scenario_raw();
    raw.system.trans_queue_size = 4;
    let mut ctrl = build_controller(raw);

    ctrl.add_transaction(Transaction::new(0xc0, false)); // read first
    for addr in [0x0u64, 0x40, 0x80, 0xc0] {
        ctrl.add_transaction(Transaction::new(addr, true));
    }

    let done = run(&mut ctrl, 300);
    // four write acks plus the read completion
    assert_eq!(done.len(), 5);
    assert_eq!(ctrl.stats.num_read_cmds, 1);
    // the 0xc0 write is held back behind the pending read and the
    // drain burst ends, so only three writes hit the wire
    assert_eq!(ctrl.stats.num_write_cmds, 3);
}

/// Unified queue: reads and writes complete from a single queue.
#[test]
fn test_unified_queue() {
    let mut raw = scenario_raw();
    raw.system.unified_queue = true;
    let mut ctrl = build_controller(raw);

    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x40, true));
    ctrl.add_transaction(Transaction::new(0x80, false));

    let done = run(&mut ctrl, 300);
    assert_eq!(done.len(), 3);
    assert_eq!(ctrl.stats.num_read_cmds, 2);
    assert_eq!(ctrl.stats.num_write_cmds, 1);
}

/// Close-page policy issues the auto-precharge command variants.
#[test]
fn test_close_page_policy() {
    let mut raw = scenario_raw();
    raw.system.row_buf_policy = "CLOSE_PAGE".to_string();
    let mut ctrl = build_controller(raw);

    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x80, false));

    let done = run(&mut ctrl, 200);
    assert_eq!(done.len(), 2);
    // each read auto-precharges, so two activates and no explicit
    // precharge
    assert_eq!(ctrl.stats.num_act_cmds, 2);
    assert_eq!(ctrl.stats.num_pre_cmds, 0);
    assert_eq!(ctrl.stats.num_read_cmds, 2);
}

/// Concurrent reads to one address merge onto a single wire access.
#[test]
fn test_read_merge() {
    let mut ctrl = build_controller(scenario_raw());
    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x0, false));
    ctrl.add_transaction(Transaction::new(0x0, false));

    let done = run(&mut ctrl, 100);
    assert_eq!(done.len(), 3);
    // all three complete on the same cycle from one read command
    assert!(done.iter().all(|&(clk, addr, _)| clk == done[0].0 && addr == 0x0));
    assert_eq!(ctrl.stats.num_read_cmds, 1);
}
