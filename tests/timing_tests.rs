//! Integration tests for the timing matrix derivation.

use dram_emulator::common::CommandKind;
use dram_emulator::config::{Config, RawConfig};
use dram_emulator::core::timing::Timing;

fn config_for(protocol: &str, bankgroups: usize) -> Config {
    let mut raw = RawConfig::default();
    raw.dram_structure.protocol = protocol.to_string();
    raw.dram_structure.bankgroups = bankgroups;
    if protocol.starts_with("HBM") || protocol.starts_with("GDDR") {
        raw.dram_structure.device_width = 16;
        raw.system.bus_width = 32;
    }
    Config::from_raw(raw).unwrap()
}

fn delta(list: &[(CommandKind, i64)], kind: CommandKind) -> i64 {
    list.iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, d)| *d)
        .unwrap_or_else(|| panic!("no {:?} entry", kind))
}

/// Tests the basic read/write gap closures.
#[test]
fn test_read_write_gaps() {
    let config = config_for("DDR3", 2);
    let timing = Timing::new(&config);

    let read = &timing.same_bank[CommandKind::Read.index()];
    // read-to-read (long) = max(burst, tCCD_L)
    assert_eq!(
        delta(read, CommandKind::Read),
        (config.burst_cycle as i64).max(config.tccd_l as i64)
    );
    // read-to-precharge = AL + tRTP
    assert_eq!(
        delta(read, CommandKind::Precharge),
        (config.al + config.trtp) as i64
    );

    let write = &timing.same_bank[CommandKind::Write.index()];
    // write-to-precharge = WL + burst + tWR
    assert_eq!(
        delta(write, CommandKind::Precharge),
        (config.wl + config.burst_cycle + config.twr) as i64
    );
    // write-to-read (long) = write_delay + tWTR_L
    assert_eq!(
        delta(write, CommandKind::Read),
        (config.write_delay + config.twtr_l) as i64
    );
}

/// Tests that a single bankgroup collapses long gaps to short ones.
#[test]
fn test_single_bankgroup_collapse() {
    let grouped = config_for("DDR3", 2);
    let flat = config_for("DDR3", 1);
    let grouped_timing = Timing::new(&grouped);
    let flat_timing = Timing::new(&flat);

    assert_eq!(
        delta(
            &grouped_timing.same_bank[CommandKind::Read.index()],
            CommandKind::Read
        ),
        (grouped.burst_cycle as i64).max(grouped.tccd_l as i64)
    );
    assert_eq!(
        delta(
            &flat_timing.same_bank[CommandKind::Read.index()],
            CommandKind::Read
        ),
        (flat.burst_cycle as i64).max(flat.tccd_s as i64)
    );
    assert_eq!(
        delta(
            &flat_timing.same_bank[CommandKind::Activate.index()],
            CommandKind::Read
        ),
        (flat.trcd - flat.al) as i64
    );
}

/// Tests the protocol split on activate-to-read/write.
#[test]
fn test_activate_to_rw_by_protocol() {
    let ddr = config_for("DDR4", 4);
    let ddr_timing = Timing::new(&ddr);
    let act = &ddr_timing.same_bank[CommandKind::Activate.index()];
    assert_eq!(delta(act, CommandKind::Read), (ddr.trcd - ddr.al) as i64);
    assert_eq!(delta(act, CommandKind::Write), (ddr.trcd - ddr.al) as i64);

    for protocol in ["GDDR5", "GDDR6", "HBM", "HBM2"] {
        let config = config_for(protocol, 4);
        let timing = Timing::new(&config);
        let act = &timing.same_bank[CommandKind::Activate.index()];
        assert_eq!(delta(act, CommandKind::Read), config.trcdrd as i64);
        assert_eq!(delta(act, CommandKind::Write), config.trcdwr as i64);
    }
}

/// Tests that tPPD only applies where the protocol defines it.
#[test]
fn test_precharge_to_precharge() {
    let ddr = config_for("DDR4", 4);
    let timing = Timing::new(&ddr);
    assert!(timing.other_banks_same_bankgroup[CommandKind::Precharge.index()].is_empty());

    for protocol in ["GDDR6", "LPDDR4"] {
        let mut raw = RawConfig::default();
        raw.dram_structure.protocol = protocol.to_string();
        raw.timing.tppd = 2;
        if protocol.starts_with("GDDR") {
            raw.dram_structure.device_width = 16;
            raw.system.bus_width = 32;
        }
        let config = Config::from_raw(raw).unwrap();
        let timing = Timing::new(&config);
        assert_eq!(
            delta(
                &timing.other_banks_same_bankgroup[CommandKind::Precharge.index()],
                CommandKind::Precharge
            ),
            2
        );
    }
}

/// Tests the refresh closure constants.
#[test]
fn test_refresh_gaps() {
    let config = config_for("DDR4", 4);
    let timing = Timing::new(&config);

    let refresh = &timing.same_rank[CommandKind::Refresh.index()];
    assert_eq!(delta(refresh, CommandKind::Activate), config.trfc as i64);

    let refb = &timing.same_bank[CommandKind::RefreshBank.index()];
    assert_eq!(delta(refb, CommandKind::Activate), config.trfcb as i64);

    let sref_exit = &timing.same_rank[CommandKind::SrefExit.index()];
    assert_eq!(delta(sref_exit, CommandKind::Activate), config.txs as i64);

    let sref_enter = &timing.same_rank[CommandKind::SrefEnter.index()];
    assert_eq!(
        delta(sref_enter, CommandKind::SrefExit),
        config.tckesr as i64
    );
}
