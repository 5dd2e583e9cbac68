//! Per-channel controller: transaction intake, transaction-to-command
//! translation, refresh interleaving, write draining, command issue,
//! and completion delivery.

use std::collections::HashMap;
use std::sync::Arc;

use crate::common::{Address, Command, CommandKind, Transaction};
use crate::config::{Config, RowBufPolicy};
use crate::core::channel::ChannelState;
use crate::core::queue::CommandQueue;
use crate::core::refresh::Refresh;
use crate::core::timing::Timing;
use crate::stats::Stats;

pub struct Controller {
    pub channel_id: usize,
    clk: u64,
    config: Arc<Config>,
    pub stats: Stats,
    channel_state: ChannelState,
    cmd_queue: CommandQueue,
    refresh: Refresh,

    is_unified_queue: bool,
    unified_queue: Vec<Transaction>,
    read_queue: Vec<Transaction>,
    write_buffer: Vec<Transaction>,

    /// In-flight reads keyed by address; one wire read satisfies every
    /// entry under its key.
    pending_rd: HashMap<u64, Vec<Transaction>>,
    /// In-flight writes keyed by address; duplicates are merged on
    /// intake, so at most one entry per address.
    pending_wr: HashMap<u64, Transaction>,

    return_queue: Vec<Transaction>,

    row_buf_policy: RowBufPolicy,
    last_trans_clk: u64,
    write_draining: usize,
}

impl Controller {
    pub fn new(channel_id: usize, config: Arc<Config>, timing: Arc<Timing>) -> Self {
        Self {
            channel_id,
            clk: 0,
            stats: Stats::new(config.ranks),
            channel_state: ChannelState::new(Arc::clone(&config), timing),
            cmd_queue: CommandQueue::new(Arc::clone(&config)),
            refresh: Refresh::new(Arc::clone(&config)),
            is_unified_queue: config.unified_queue,
            unified_queue: Vec::new(),
            read_queue: Vec::new(),
            write_buffer: Vec::new(),
            pending_rd: HashMap::new(),
            pending_wr: HashMap::new(),
            return_queue: Vec::new(),
            row_buf_policy: config.row_buf_policy,
            last_trans_clk: 0,
            write_draining: 0,
            config,
        }
    }

    /// Pops the first completion whose time has arrived, if any.
    pub fn return_done_trans(&mut self, clk: u64) -> Option<(u64, bool)> {
        let pos = self
            .return_queue
            .iter()
            .position(|t| clk >= t.complete_cycle)?;
        let trans = self.return_queue.remove(pos);
        if trans.is_write {
            self.stats.num_writes_done += 1;
        } else {
            self.stats.num_reads_done += 1;
            self.stats.read_latency_sum += self.clk - trans.added_cycle;
        }
        Some((trans.addr, trans.is_write))
    }

    pub fn will_accept_transaction(&self, _hex_addr: u64, is_write: bool) -> bool {
        if self.is_unified_queue {
            self.unified_queue.len() < self.config.trans_queue_size
        } else if is_write {
            self.write_buffer.len() < self.config.trans_queue_size
        } else {
            self.read_queue.len() < self.config.trans_queue_size
        }
    }

    /// Accepts a transaction.
    ///
    /// Writes are acknowledged at `clk + 1`; a second write to an
    /// address already pending is merged away. Reads that find a
    /// pending write to the same address short-circuit with the
    /// buffered data at `clk + 1` and never reach the wire; other
    /// reads to an address already being fetched piggyback on the
    /// in-flight access.
    pub fn add_transaction(&mut self, mut trans: Transaction) {
        trans.added_cycle = self.clk;
        self.stats.interarrival_sum += self.clk - self.last_trans_clk;
        self.stats.num_arrivals += 1;
        self.last_trans_clk = self.clk;

        if trans.is_write {
            if !self.pending_wr.contains_key(&trans.addr) {
                self.pending_wr.insert(trans.addr, trans);
                if self.is_unified_queue {
                    self.unified_queue.push(trans);
                } else {
                    self.write_buffer.push(trans);
                }
            }
            trans.complete_cycle = self.clk + 1;
            self.return_queue.push(trans);
        } else {
            if self.pending_wr.contains_key(&trans.addr) {
                trans.complete_cycle = self.clk + 1;
                self.return_queue.push(trans);
                return;
            }
            let entries = self.pending_rd.entry(trans.addr).or_default();
            entries.push(trans);
            if entries.len() == 1 {
                if self.is_unified_queue {
                    self.unified_queue.push(trans);
                } else {
                    self.read_queue.push(trans);
                }
            }
        }
    }

    /// One clock edge: refresh bookkeeping, command issue, power and
    /// self-refresh accounting, transaction scheduling, in that order.
    pub fn clock_tick(&mut self) {
        self.refresh.clock_tick(&mut self.channel_state);

        let mut cmd = None;
        if self.channel_state.refresh_waiting() {
            cmd = self.cmd_queue.finish_refresh(&self.channel_state);
        }
        if cmd.is_none() {
            cmd = self.cmd_queue.get_command_to_issue(&self.channel_state);
        }

        let mut cmd_issued = false;
        if let Some(cmd) = cmd {
            self.issue_command(&cmd);
            cmd_issued = true;

            if self.config.enable_hbm_dual_cmd {
                if let Some(second) = self.cmd_queue.get_command_to_issue(&self.channel_state) {
                    // the second slot must differ in read/write-ness
                    if second.is_read_write() != cmd.is_read_write() {
                        self.issue_command(&second);
                        self.stats.hbm_dual_cmds += 1;
                    }
                }
            }
        }

        for rank in 0..self.config.ranks {
            if self.channel_state.is_rank_self_refreshing(rank) {
                self.stats.sref_cycles[rank] += 1;
            } else if self.channel_state.is_all_bank_idle_in_rank(rank) {
                self.stats.all_bank_idle_cycles[rank] += 1;
                self.channel_state.rank_idle_cycles[rank] += 1;
            } else {
                self.stats.rank_active_cycles[rank] += 1;
                self.channel_state.rank_idle_cycles[rank] = 0;
            }
        }

        if self.config.enable_self_refresh && !cmd_issued {
            for rank in 0..self.config.ranks {
                if self.channel_state.is_rank_self_refreshing(rank) {
                    // wake the rank up as soon as it has work again
                    if !self.cmd_queue.rank_queues_empty(rank) {
                        let probe =
                            Command::new(CommandKind::SrefExit, Address::for_rank(rank), 0);
                        if let Some(cmd) = self.channel_state.get_ready(&probe, self.clk) {
                            self.issue_command(&cmd);
                            break;
                        }
                    }
                } else if self.cmd_queue.rank_queues_empty(rank)
                    && self.channel_state.rank_idle_cycles[rank] >= self.config.sref_threshold
                {
                    let probe = Command::new(CommandKind::SrefEnter, Address::for_rank(rank), 0);
                    if let Some(cmd) = self.channel_state.get_ready(&probe, self.clk) {
                        self.issue_command(&cmd);
                        break;
                    }
                }
            }
        }

        self.schedule_transaction();
        self.clk += 1;
        self.cmd_queue.clock_tick();
        self.stats.num_cycles += 1;
    }

    /// Moves at most one transaction from the transaction queues into
    /// the destination bank's command queue.
    fn schedule_transaction(&mut self) {
        // the write buffer drains in bursts: start one when it is full,
        // or opportunistically when the command queues have gone dry
        if self.write_draining == 0 && !self.is_unified_queue {
            let full = self.write_buffer.len() >= self.config.trans_queue_size;
            let idle_drain = self.write_buffer.len() > self.config.write_drain_watermark
                && self.cmd_queue.queue_empty();
            if full || idle_drain {
                self.write_draining = self.write_buffer.len();
            }
        }

        let draining_writes = self.write_draining > 0;
        let queue = if self.is_unified_queue {
            &self.unified_queue
        } else if draining_writes {
            &self.write_buffer
        } else {
            &self.read_queue
        };

        let mut chosen = None;
        for (pos, trans) in queue.iter().enumerate() {
            let cmd = self.trans_to_command(trans);
            if self
                .cmd_queue
                .will_accept_command(cmd.rank(), cmd.bankgroup(), cmd.bank())
            {
                chosen = Some((pos, *trans, cmd));
                break;
            }
        }
        let Some((pos, trans, cmd)) = chosen else {
            return;
        };

        if !self.is_unified_queue && cmd.is_write() {
            // a read to this address arrived after the write entered
            // the buffer; stop draining so the read path wins
            if self.pending_rd.contains_key(&trans.addr) {
                self.write_draining = 0;
                return;
            }
            self.write_draining -= 1;
        }
        self.cmd_queue.add_command(cmd);
        if self.is_unified_queue {
            self.unified_queue.remove(pos);
        } else if draining_writes {
            self.write_buffer.remove(pos);
        } else {
            self.read_queue.remove(pos);
        }
    }

    /// Puts `cmd` on the wire: completes pending transactions it
    /// satisfies, records stats, and updates bank states and timing.
    fn issue_command(&mut self, cmd: &Command) {
        if cmd.is_read() {
            let pending = self
                .pending_rd
                .remove(&cmd.hex_addr)
                .unwrap_or_else(|| panic!("{:#x} not in pending read queue", cmd.hex_addr));
            // one wire access satisfies every read waiting on the line
            for mut trans in pending {
                trans.complete_cycle = self.clk + self.config.read_delay;
                self.return_queue.push(trans);
            }
        } else if cmd.is_write() {
            let trans = self
                .pending_wr
                .remove(&cmd.hex_addr)
                .unwrap_or_else(|| panic!("{:#x} not in pending write queue", cmd.hex_addr));
            self.stats.write_latency_sum +=
                self.clk - trans.added_cycle + self.config.write_delay;
        }

        // row-hit classification reads the hit counter, so it must
        // precede the state update
        let row_hit = self
            .channel_state
            .row_hit_count(cmd.rank(), cmd.bankgroup(), cmd.bank())
            != 0;
        self.stats.record_command(cmd.kind, row_hit);
        self.channel_state.update_timing_and_states(cmd, self.clk);
    }

    fn trans_to_command(&self, trans: &Transaction) -> Command {
        let addr = self.config.address_mapping(trans.addr);
        let kind = match (self.row_buf_policy, trans.is_write) {
            (RowBufPolicy::OpenPage, false) => CommandKind::Read,
            (RowBufPolicy::OpenPage, true) => CommandKind::Write,
            (RowBufPolicy::ClosePage, false) => CommandKind::ReadPrecharge,
            (RowBufPolicy::ClosePage, true) => CommandKind::WritePrecharge,
        };
        Command::new(kind, addr, trans.addr)
    }

    pub fn print_stats(&self) {
        self.stats.print(self.channel_id, &self.config);
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }
}
