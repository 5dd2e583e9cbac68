//! Command-to-command timing matrix.
//!
//! For every issued command kind there is a list of `(affected kind,
//! delta)` pairs per propagation scope: the same bank, the other banks
//! of the same bankgroup, the other bankgroups of the same rank, the
//! other ranks, and (for rank-scoped commands) the whole rank. When a
//! command issues at clock `t`, the controller walks the lists and
//! pushes each affected kind's next-legal time to `t + delta`.
//!
//! All deltas are derived once from the configuration; the matrix is
//! read-only afterwards and shared by every channel.

use crate::common::{CommandKind, NUM_COMMAND_KINDS};
use crate::config::{Config, Protocol};

type TimingList = Vec<(CommandKind, i64)>;

pub struct Timing {
    pub same_bank: [TimingList; NUM_COMMAND_KINDS],
    pub other_banks_same_bankgroup: [TimingList; NUM_COMMAND_KINDS],
    pub other_bankgroups_same_rank: [TimingList; NUM_COMMAND_KINDS],
    pub other_ranks: [TimingList; NUM_COMMAND_KINDS],
    pub same_rank: [TimingList; NUM_COMMAND_KINDS],
}

impl Timing {
    pub fn new(config: &Config) -> Self {
        use CommandKind::*;

        let burst = config.burst_cycle as i64;
        let al = config.al as i64;
        let rl = config.rl as i64;
        let wl = config.wl as i64;
        let read_delay = config.read_delay as i64;
        let write_delay = config.write_delay as i64;

        let mut read_to_read_l = burst.max(config.tccd_l as i64);
        let read_to_read_s = burst.max(config.tccd_s as i64);
        let read_to_read_o = burst + config.trtrs as i64;

        let read_to_write = rl + burst - wl + config.trtrs as i64;
        let read_to_write_o = read_delay + burst + config.trtrs as i64 - write_delay;
        let read_to_precharge = al + config.trtp as i64;
        let readp_to_act = al + burst + config.trtp as i64 + config.trp as i64;

        let mut write_to_read_l = write_delay + config.twtr_l as i64;
        let write_to_read_s = write_delay + config.twtr_s as i64;
        let write_to_read_o = write_delay + burst + config.trtrs as i64 - read_delay;

        let mut write_to_write_l = burst.max(config.tccd_l as i64);
        let write_to_write_s = burst.max(config.tccd_s as i64);
        let write_to_write_o = burst;

        let write_to_precharge = wl + burst + config.twr as i64;

        let precharge_to_activate = config.trp as i64;
        let precharge_to_precharge = config.tppd as i64;
        let read_to_activate = read_to_precharge + precharge_to_activate;
        let write_to_activate = write_to_precharge + precharge_to_activate;

        let activate_to_activate = config.trc as i64;
        let mut activate_to_activate_l = config.trrd_l as i64;
        let activate_to_activate_s = config.trrd_s as i64;
        let activate_to_precharge = config.tras as i64;

        let (activate_to_read, activate_to_write) = if config.is_gddr() || config.is_hbm() {
            (config.trcdrd as i64, config.trcdwr as i64)
        } else {
            (config.trcd as i64 - al, config.trcd as i64 - al)
        };
        // a refresh must be preceded by a precharge, hence tRC
        let activate_to_refresh = config.trc as i64;

        let refresh_to_refresh = config.trefi as i64;
        let refresh_to_activate = config.trfc as i64;
        let refresh_to_activate_bank = config.trfcb as i64;

        let self_refresh_entry_to_exit = config.tckesr as i64;
        let self_refresh_exit = config.txs as i64;

        // with a single bankgroup the device runs on the short-group
        // numbers; overwrite the long values so the table assignments
        // below stay uniform
        if config.bankgroups == 1 {
            read_to_read_l = burst.max(config.tccd_s as i64);
            write_to_read_l = write_delay + config.twtr_s as i64;
            write_to_write_l = burst.max(config.tccd_s as i64);
            activate_to_activate_l = config.trrd_s as i64;
        }

        let mut same_bank: [TimingList; NUM_COMMAND_KINDS] = Default::default();
        let mut other_banks_same_bankgroup: [TimingList; NUM_COMMAND_KINDS] = Default::default();
        let mut other_bankgroups_same_rank: [TimingList; NUM_COMMAND_KINDS] = Default::default();
        let mut other_ranks: [TimingList; NUM_COMMAND_KINDS] = Default::default();
        let mut same_rank: [TimingList; NUM_COMMAND_KINDS] = Default::default();

        // READ
        same_bank[Read.index()] = vec![
            (Read, read_to_read_l),
            (Write, read_to_write),
            (ReadPrecharge, read_to_read_l),
            (WritePrecharge, read_to_write),
            (Precharge, read_to_precharge),
        ];
        other_banks_same_bankgroup[Read.index()] = vec![
            (Read, read_to_read_l),
            (Write, read_to_write),
            (ReadPrecharge, read_to_read_l),
            (WritePrecharge, read_to_write),
        ];
        other_bankgroups_same_rank[Read.index()] = vec![
            (Read, read_to_read_s),
            (Write, read_to_write),
            (ReadPrecharge, read_to_read_s),
            (WritePrecharge, read_to_write),
        ];
        other_ranks[Read.index()] = vec![
            (Read, read_to_read_o),
            (Write, read_to_write_o),
            (ReadPrecharge, read_to_read_o),
            (WritePrecharge, read_to_write_o),
        ];

        // WRITE
        same_bank[Write.index()] = vec![
            (Read, write_to_read_l),
            (Write, write_to_write_l),
            (ReadPrecharge, write_to_read_l),
            (WritePrecharge, write_to_write_l),
            (Precharge, write_to_precharge),
        ];
        other_banks_same_bankgroup[Write.index()] = vec![
            (Read, write_to_read_l),
            (Write, write_to_write_l),
            (ReadPrecharge, write_to_read_l),
            (WritePrecharge, write_to_write_l),
        ];
        other_bankgroups_same_rank[Write.index()] = vec![
            (Read, write_to_read_s),
            (Write, write_to_write_s),
            (ReadPrecharge, write_to_read_s),
            (WritePrecharge, write_to_write_s),
        ];
        other_ranks[Write.index()] = vec![
            (Read, write_to_read_o),
            (Write, write_to_write_o),
            (ReadPrecharge, write_to_read_o),
            (WritePrecharge, write_to_write_o),
        ];

        // READ_PRECHARGE
        same_bank[ReadPrecharge.index()] = vec![
            (Activate, readp_to_act),
            (Refresh, read_to_activate),
            (RefreshBank, read_to_activate),
            (SrefEnter, read_to_activate),
        ];
        other_banks_same_bankgroup[ReadPrecharge.index()] = vec![
            (Read, read_to_read_l),
            (Write, read_to_write),
            (ReadPrecharge, read_to_read_l),
            (WritePrecharge, read_to_write),
        ];
        other_bankgroups_same_rank[ReadPrecharge.index()] = vec![
            (Read, read_to_read_s),
            (Write, read_to_write),
            (ReadPrecharge, read_to_read_s),
            (WritePrecharge, read_to_write),
        ];
        other_ranks[ReadPrecharge.index()] = vec![
            (Read, read_to_read_o),
            (Write, read_to_write_o),
            (ReadPrecharge, read_to_read_o),
            (WritePrecharge, read_to_write_o),
        ];

        // WRITE_PRECHARGE
        same_bank[WritePrecharge.index()] = vec![
            (Activate, write_to_activate),
            (Refresh, write_to_activate),
            (RefreshBank, write_to_activate),
            (SrefEnter, write_to_activate),
        ];
        other_banks_same_bankgroup[WritePrecharge.index()] = vec![
            (Read, write_to_read_l),
            (Write, write_to_write_l),
            (ReadPrecharge, write_to_read_l),
            (WritePrecharge, write_to_write_l),
        ];
        other_bankgroups_same_rank[WritePrecharge.index()] = vec![
            (Read, write_to_read_s),
            (Write, write_to_write_s),
            (ReadPrecharge, write_to_read_s),
            (WritePrecharge, write_to_write_s),
        ];
        other_ranks[WritePrecharge.index()] = vec![
            (Read, write_to_read_o),
            (Write, write_to_write_o),
            (ReadPrecharge, write_to_read_o),
            (WritePrecharge, write_to_write_o),
        ];

        // ACTIVATE
        same_bank[Activate.index()] = vec![
            (Activate, activate_to_activate),
            (Read, activate_to_read),
            (Write, activate_to_write),
            (ReadPrecharge, activate_to_read),
            (WritePrecharge, activate_to_write),
            (Precharge, activate_to_precharge),
        ];
        other_banks_same_bankgroup[Activate.index()] = vec![
            (Activate, activate_to_activate_l),
            (RefreshBank, activate_to_refresh),
        ];
        other_bankgroups_same_rank[Activate.index()] = vec![
            (Activate, activate_to_activate_s),
            (RefreshBank, activate_to_refresh),
        ];

        // PRECHARGE
        same_bank[Precharge.index()] = vec![
            (Activate, precharge_to_activate),
            (Refresh, precharge_to_activate),
            (RefreshBank, precharge_to_activate),
            (SrefEnter, precharge_to_activate),
        ];
        // tPPD only constrains devices that define it
        if config.is_gddr() || config.protocol == Protocol::Lpddr4 {
            other_banks_same_bankgroup[Precharge.index()] =
                vec![(Precharge, precharge_to_precharge)];
            other_bankgroups_same_rank[Precharge.index()] =
                vec![(Precharge, precharge_to_precharge)];
        }

        // REFRESH_BANK
        same_bank[RefreshBank.index()] = vec![
            (Activate, refresh_to_activate_bank),
            (Refresh, refresh_to_activate_bank),
            (RefreshBank, refresh_to_activate_bank),
            (SrefEnter, refresh_to_activate_bank),
        ];
        other_banks_same_bankgroup[RefreshBank.index()] = vec![
            (Activate, refresh_to_activate),
            (RefreshBank, refresh_to_refresh),
        ];
        other_bankgroups_same_rank[RefreshBank.index()] = vec![
            (Activate, refresh_to_activate),
            (RefreshBank, refresh_to_refresh),
        ];

        // REFRESH, SREF_ENTER and SREF_EXIT apply to the entire rank
        same_rank[Refresh.index()] = vec![
            (Activate, refresh_to_activate),
            (Refresh, refresh_to_activate),
            (SrefEnter, refresh_to_activate),
        ];

        same_rank[SrefEnter.index()] = vec![(SrefExit, self_refresh_entry_to_exit)];

        same_rank[SrefExit.index()] = vec![
            (Activate, self_refresh_exit),
            (Refresh, self_refresh_exit),
            (RefreshBank, self_refresh_exit),
            (SrefEnter, self_refresh_exit),
        ];

        Self {
            same_bank,
            other_banks_same_bankgroup,
            other_bankgroups_same_rank,
            other_ranks,
            same_rank,
        }
    }
}
