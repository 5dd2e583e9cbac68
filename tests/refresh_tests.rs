//! Integration tests for refresh cadence and self-refresh.

use std::sync::Arc;

use dram_emulator::common::{CommandKind, Transaction};
use dram_emulator::config::{Config, RawConfig};
use dram_emulator::core::channel::ChannelState;
use dram_emulator::core::controller::Controller;
use dram_emulator::core::refresh::Refresh;
use dram_emulator::core::timing::Timing;

fn raw_with_policy(policy: &str) -> RawConfig {
    let mut raw = RawConfig::default();
    raw.system.refresh_policy = policy.to_string();
    raw.system.channel_size = 4096; // two ranks
    raw.timing.trefi = 100;
    raw.timing.trefib = 10;
    raw
}

fn build(raw: RawConfig) -> (Arc<Config>, ChannelState, Refresh) {
    let config = Arc::new(Config::from_raw(raw).unwrap());
    let timing = Arc::new(Timing::new(&config));
    let channel = ChannelState::new(Arc::clone(&config), timing);
    let refresh = Refresh::new(Arc::clone(&config));
    (config, channel, refresh)
}

/// Tests rank-staggered cadence: interval tREFI / ranks, ranks in
/// round-robin order.
#[test]
fn test_rank_staggered_cadence() {
    let (_config, mut channel, mut refresh) = build(raw_with_policy("RANK_LEVEL_STAGGERED"));

    // interval is tREFI / 2 = 50; nothing before the first boundary
    for _ in 0..50 {
        refresh.clock_tick(&mut channel);
    }
    assert!(!channel.refresh_waiting());
    refresh.clock_tick(&mut channel);
    assert!(channel.refresh_waiting());
    let first = channel.pending_ref_command();
    assert_eq!(first.kind, CommandKind::Refresh);
    assert_eq!(first.rank(), 0);
    channel.rank_need_refresh(0, false);

    for _ in 0..50 {
        refresh.clock_tick(&mut channel);
    }
    let second = channel.pending_ref_command();
    assert_eq!(second.rank(), 1);
}

/// Tests the simultaneous policy's one-rank-per-interval behavior.
#[test]
fn test_rank_simultaneous_single_enqueue() {
    let (_config, mut channel, mut refresh) = build(raw_with_policy("RANK_LEVEL_SIMULTANEOUS"));

    for _ in 0..101 {
        refresh.clock_tick(&mut channel);
    }
    // only the first non-self-refreshing rank is enqueued
    assert!(channel.refresh_waiting());
    assert_eq!(channel.pending_ref_command().rank(), 0);
    channel.rank_need_refresh(0, false);
    assert!(!channel.refresh_waiting());
}

/// Tests the JEDEC bank-staggered iteration order: bankgroup first,
/// then bank, then rank.
#[test]
fn test_bank_staggered_order() {
    let (_config, mut channel, mut refresh) = build(raw_with_policy("BANK_LEVEL_STAGGERED"));

    let mut seen = Vec::new();
    refresh.clock_tick(&mut channel);
    for _ in 0..8 {
        for _ in 0..10 {
            refresh.clock_tick(&mut channel);
        }
        if channel.refresh_waiting() {
            let cmd = channel.pending_ref_command();
            assert_eq!(cmd.kind, CommandKind::RefreshBank);
            seen.push((cmd.rank(), cmd.bankgroup(), cmd.bank()));
            channel.bank_need_refresh(cmd.rank(), cmd.bankgroup(), cmd.bank(), false);
        }
    }
    assert_eq!(
        seen,
        vec![
            (0, 0, 0),
            (0, 1, 0),
            (0, 0, 1),
            (0, 1, 1),
            (1, 0, 0),
            (1, 1, 0),
            (1, 0, 1),
            (1, 1, 1),
        ]
    );
}

/// Tests that an idle controller issues refreshes on cadence.
#[test]
fn test_controller_issues_refresh() {
    let mut raw = RawConfig::default();
    raw.timing.trefi = 100;
    let config = Arc::new(Config::from_raw(raw).unwrap());
    let timing = Arc::new(Timing::new(&config));
    let mut ctrl = Controller::new(0, config, timing);

    for _ in 0..450 {
        ctrl.clock_tick();
    }
    // boundaries at 100, 200, 300, 400
    assert_eq!(ctrl.stats.num_ref_cmds, 4);
}

/// Tests self-refresh entry on idleness and exit on new work.
#[test]
fn test_self_refresh_entry_and_exit() {
    let mut raw = RawConfig::default();
    raw.dram_structure.bankgroups = 1;
    raw.dram_structure.banks_per_group = 1;
    raw.dram_structure.rows = 16;
    raw.dram_structure.columns = 16;
    raw.system.enable_self_refresh = true;
    raw.system.sref_threshold = 10;
    raw.timing.txs = 20;
    raw.timing.trefi = 1 << 40;
    let config = Arc::new(Config::from_raw(raw).unwrap());
    let timing = Arc::new(Timing::new(&config));
    let mut ctrl = Controller::new(0, config, timing);

    for _ in 0..30 {
        ctrl.clock_tick();
    }
    assert_eq!(ctrl.stats.num_srefe_cmds, 1);
    assert!(ctrl.stats.sref_cycles[0] > 0);

    // new work wakes the rank and completes
    ctrl.add_transaction(Transaction::new(0x0, false));
    let mut done = 0;
    for clk in 30..200 {
        while ctrl.return_done_trans(clk).is_some() {
            done += 1;
        }
        ctrl.clock_tick();
    }
    assert_eq!(ctrl.stats.num_srefx_cmds, 1);
    assert_eq!(done, 1);
}
