//! Aggregate state of one channel: every bank's FSM and timing table,
//! per-rank activation windows, self-refresh flags, and the queue of
//! pending refresh commands.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::common::{Address, Command, CommandKind};
use crate::config::Config;
use crate::core::bankstate::BankState;
use crate::core::timing::Timing;

pub struct ChannelState {
    config: Arc<Config>,
    timing: Arc<Timing>,

    /// Indexed `[rank][bankgroup][bank]`.
    bank_states: Vec<Vec<Vec<BankState>>>,
    rank_is_sref: Vec<bool>,

    /// Consecutive cycles each rank has spent with every bank idle;
    /// feeds the self-refresh entry policy.
    pub rank_idle_cycles: Vec<u64>,

    refresh_q: VecDeque<Command>,

    /// Expiry times of recent activates per rank; an entry means one
    /// activate still counts against the rolling tFAW window.
    four_aw: Vec<VecDeque<u64>>,
    thirty_two_aw: Vec<VecDeque<u64>>,
}

impl ChannelState {
    pub fn new(config: Arc<Config>, timing: Arc<Timing>) -> Self {
        let bank_states = (0..config.ranks)
            .map(|_| {
                (0..config.bankgroups)
                    .map(|_| (0..config.banks_per_group).map(|_| BankState::new()).collect())
                    .collect()
            })
            .collect();
        Self {
            bank_states,
            rank_is_sref: vec![false; config.ranks],
            rank_idle_cycles: vec![0; config.ranks],
            refresh_q: VecDeque::new(),
            four_aw: (0..config.ranks).map(|_| VecDeque::new()).collect(),
            thirty_two_aw: (0..config.ranks).map(|_| VecDeque::new()).collect(),
            config,
            timing,
        }
    }

    fn bank(&self, rank: usize, bankgroup: usize, bank: usize) -> &BankState {
        &self.bank_states[rank][bankgroup][bank]
    }

    pub fn open_row(&self, rank: usize, bankgroup: usize, bank: usize) -> Option<usize> {
        self.bank(rank, bankgroup, bank).open_row()
    }

    pub fn row_hit_count(&self, rank: usize, bankgroup: usize, bank: usize) -> u32 {
        self.bank(rank, bankgroup, bank).row_hit_count()
    }

    pub fn is_rank_self_refreshing(&self, rank: usize) -> bool {
        self.rank_is_sref[rank]
    }

    pub fn is_all_bank_idle_in_rank(&self, rank: usize) -> bool {
        self.bank_states[rank]
            .iter()
            .flatten()
            .all(|bank| !bank.is_open())
    }

    pub fn refresh_waiting(&self) -> bool {
        !self.refresh_q.is_empty()
    }

    pub fn pending_ref_command(&self) -> Command {
        *self
            .refresh_q
            .front()
            .expect("no refresh pending")
    }

    /// Enqueues (or retires) a rank-level refresh obligation.
    pub fn rank_need_refresh(&mut self, rank: usize, need: bool) {
        if need {
            let addr = Address::for_rank(rank);
            self.refresh_q
                .push_back(Command::new(CommandKind::Refresh, addr, 0));
        } else if let Some(pos) = self.refresh_q.iter().position(|c| c.rank() == rank) {
            self.refresh_q.remove(pos);
        }
    }

    /// Enqueues (or retires) a per-bank refresh obligation.
    pub fn bank_need_refresh(&mut self, rank: usize, bankgroup: usize, bank: usize, need: bool) {
        if need {
            let addr = Address::for_bank(rank, bankgroup, bank);
            self.refresh_q
                .push_back(Command::new(CommandKind::RefreshBank, addr, 0));
        } else if let Some(pos) = self.refresh_q.iter().position(|c| {
            c.rank() == rank && c.bankgroup() == bankgroup && c.bank() == bank
        }) {
            self.refresh_q.remove(pos);
        }
    }

    /// Resolves `cmd` against the bank states.
    ///
    /// For a rank-scoped command every bank must agree: the first bank
    /// that answers with a precondition (a precharge) wins, retargeted
    /// at that bank so the caller can clear the way; the original kind
    /// is returned only when every bank is ready for it. For a
    /// bank-scoped command the addressed bank decides, with activates
    /// additionally gated on the rank's activation windows.
    pub fn get_ready(&self, cmd: &Command, clk: u64) -> Option<Command> {
        if cmd.is_rank_command() {
            let mut num_ready = 0;
            let mut rank_cmd = None;
            for j in 0..self.config.bankgroups {
                for k in 0..self.config.banks_per_group {
                    let ready = match self.bank(cmd.rank(), j, k).get_ready(cmd, clk) {
                        Some(ready) => ready,
                        None => continue,
                    };
                    if ready.kind != cmd.kind {
                        // likely a precharge; point it at this bank
                        return Some(Command::new(
                            ready.kind,
                            Address::for_bank(cmd.rank(), j, k),
                            ready.hex_addr,
                        ));
                    }
                    rank_cmd = Some(ready);
                    num_ready += 1;
                }
            }
            if num_ready == self.config.banks {
                rank_cmd
            } else {
                None
            }
        } else {
            let ready = self
                .bank(cmd.rank(), cmd.bankgroup(), cmd.bank())
                .get_ready(cmd, clk)?;
            if ready.kind == CommandKind::Activate && !self.activation_window_ok(ready.rank(), clk)
            {
                return None;
            }
            Some(ready)
        }
    }

    /// Applies `cmd` to the bank FSMs and maintains the refresh and
    /// self-refresh bookkeeping.
    pub fn update_state(&mut self, cmd: &Command) {
        if cmd.is_rank_command() {
            for j in 0..self.config.bankgroups {
                for k in 0..self.config.banks_per_group {
                    self.bank_states[cmd.rank()][j][k].update_state(cmd);
                }
            }
            match cmd.kind {
                CommandKind::Refresh => self.rank_need_refresh(cmd.rank(), false),
                CommandKind::SrefEnter => self.rank_is_sref[cmd.rank()] = true,
                CommandKind::SrefExit => self.rank_is_sref[cmd.rank()] = false,
                _ => {}
            }
        } else {
            self.bank_states[cmd.rank()][cmd.bankgroup()][cmd.bank()].update_state(cmd);
            if cmd.is_refresh() {
                self.bank_need_refresh(cmd.rank(), cmd.bankgroup(), cmd.bank(), false);
            }
        }
    }

    /// Walks the timing matrix for `cmd` issued at `clk` and pushes
    /// out the next-legal times of every affected bank.
    pub fn update_timing(&mut self, cmd: &Command, clk: u64) {
        let timing = Arc::clone(&self.timing);
        match cmd.kind {
            CommandKind::Activate
            | CommandKind::Read
            | CommandKind::ReadPrecharge
            | CommandKind::Write
            | CommandKind::WritePrecharge
            | CommandKind::Precharge
            | CommandKind::RefreshBank => {
                if cmd.kind == CommandKind::Activate {
                    self.update_activation_times(cmd.rank(), clk);
                }
                let idx = cmd.kind.index();
                self.update_same_bank(cmd.addr, &timing.same_bank[idx], clk);
                self.update_other_banks_same_bankgroup(
                    cmd.addr,
                    &timing.other_banks_same_bankgroup[idx],
                    clk,
                );
                self.update_other_bankgroups_same_rank(
                    cmd.addr,
                    &timing.other_bankgroups_same_rank[idx],
                    clk,
                );
                self.update_other_ranks(cmd.addr, &timing.other_ranks[idx], clk);
            }
            CommandKind::Refresh | CommandKind::SrefEnter | CommandKind::SrefExit => {
                self.update_same_rank(cmd.addr, &timing.same_rank[cmd.kind.index()], clk);
            }
        }
    }

    pub fn update_timing_and_states(&mut self, cmd: &Command, clk: u64) {
        self.update_state(cmd);
        self.update_timing(cmd, clk);
    }

    /// True when the rank can legally accept another ACTIVATE at
    /// `clk` under the rolling tFAW (and, for GDDR, t32AW) windows.
    pub fn activation_window_ok(&self, rank: usize, clk: u64) -> bool {
        if !window_ok(&self.four_aw[rank], clk, 4) {
            return false;
        }
        if self.config.is_gddr() {
            return window_ok(&self.thirty_two_aw[rank], clk, 32);
        }
        true
    }

    /// Records an ACTIVATE at `t`: expires the head entry if its
    /// window has passed, then appends the new expiry.
    pub fn update_activation_times(&mut self, rank: usize, t: u64) {
        let faw = &mut self.four_aw[rank];
        if faw.front().is_some_and(|&head| t >= head) {
            faw.pop_front();
        }
        faw.push_back(t + self.config.tfaw);

        if self.config.is_gddr() {
            let aw32 = &mut self.thirty_two_aw[rank];
            if aw32.front().is_some_and(|&head| t >= head) {
                aw32.pop_front();
            }
            aw32.push_back(t + self.config.t32aw);
        }
    }

    fn update_same_bank(&mut self, addr: Address, list: &[(CommandKind, i64)], clk: u64) {
        let bank = &mut self.bank_states[addr.rank][addr.bankgroup][addr.bank];
        for &(kind, delta) in list {
            bank.update_timing(kind, clk.saturating_add_signed(delta));
        }
    }

    fn update_other_banks_same_bankgroup(
        &mut self,
        addr: Address,
        list: &[(CommandKind, i64)],
        clk: u64,
    ) {
        for k in 0..self.config.banks_per_group {
            if k == addr.bank {
                continue;
            }
            let bank = &mut self.bank_states[addr.rank][addr.bankgroup][k];
            for &(kind, delta) in list {
                bank.update_timing(kind, clk.saturating_add_signed(delta));
            }
        }
    }

    fn update_other_bankgroups_same_rank(
        &mut self,
        addr: Address,
        list: &[(CommandKind, i64)],
        clk: u64,
    ) {
        for j in 0..self.config.bankgroups {
            if j == addr.bankgroup {
                continue;
            }
            for k in 0..self.config.banks_per_group {
                let bank = &mut self.bank_states[addr.rank][j][k];
                for &(kind, delta) in list {
                    bank.update_timing(kind, clk.saturating_add_signed(delta));
                }
            }
        }
    }

    fn update_other_ranks(&mut self, addr: Address, list: &[(CommandKind, i64)], clk: u64) {
        for i in 0..self.config.ranks {
            if i == addr.rank {
                continue;
            }
            for j in 0..self.config.bankgroups {
                for k in 0..self.config.banks_per_group {
                    let bank = &mut self.bank_states[i][j][k];
                    for &(kind, delta) in list {
                        bank.update_timing(kind, clk.saturating_add_signed(delta));
                    }
                }
            }
        }
    }

    fn update_same_rank(&mut self, addr: Address, list: &[(CommandKind, i64)], clk: u64) {
        for j in 0..self.config.bankgroups {
            for k in 0..self.config.banks_per_group {
                let bank = &mut self.bank_states[addr.rank][j][k];
                for &(kind, delta) in list {
                    bank.update_timing(kind, clk.saturating_add_signed(delta));
                }
            }
        }
    }
}

/// A window refuses a new activate only when it already holds `limit`
/// live entries and the oldest has not yet expired.
fn window_ok(window: &VecDeque<u64>, clk: u64, limit: usize) -> bool {
    match window.front() {
        Some(&head) => !(clk < head && window.len() >= limit),
        None => true,
    }
}
