//! Per-bank / per-rank command queues and the issue arbiter.
//!
//! Queues hold translated read/write commands until the channel state
//! says a command (or one of its preconditions) can go on the wire.
//! Arbitration is round-robin across queues; within a queue, entries
//! are considered head-to-tail and the first one whose ready command
//! passes the precharge and write-after-read checks wins.

use std::collections::HashSet;
use std::sync::Arc;

use crate::common::{Command, CommandKind};
use crate::config::{Config, QueueStructure};
use crate::core::channel::ChannelState;

pub struct CommandQueue {
    config: Arc<Config>,
    structure: QueueStructure,
    queues: Vec<Vec<Command>>,
    num_queues: usize,
    queue_size: usize,

    /// Round-robin cursor; steps before each queue is examined, so a
    /// persistently ready first queue cannot starve the others.
    queue_idx: usize,

    /// Queue indices frozen while the pending refresh completes.
    ref_q_indices: HashSet<usize>,
    in_ref: bool,

    clk: u64,
}

impl CommandQueue {
    pub fn new(config: Arc<Config>) -> Self {
        let structure = config.queue_structure;
        let num_queues = match structure {
            QueueStructure::PerBank => config.banks * config.ranks,
            QueueStructure::PerRank => config.ranks,
        };
        Self {
            structure,
            queues: vec![Vec::new(); num_queues],
            num_queues,
            queue_size: config.cmd_queue_size,
            queue_idx: 0,
            ref_q_indices: HashSet::new(),
            in_ref: false,
            clk: 0,
            config,
        }
    }

    pub fn clock_tick(&mut self) {
        self.clk += 1;
    }

    /// Round-robin over all queues for the first issuable command.
    /// Queues frozen by an in-progress refresh are skipped. A chosen
    /// read or write is removed from its queue; preconditions
    /// (activate/precharge) leave the originating entry in place.
    pub fn get_command_to_issue(&mut self, channel: &ChannelState) -> Option<Command> {
        for _ in 0..self.num_queues {
            self.queue_idx = (self.queue_idx + 1) % self.num_queues;
            if self.in_ref && self.ref_q_indices.contains(&self.queue_idx) {
                continue;
            }
            let cmd = self.first_ready_in_queue(self.queue_idx, channel);
            if let Some(cmd) = cmd {
                if cmd.is_read_write() {
                    self.erase_rw_command(&cmd);
                }
                return Some(cmd);
            }
        }
        None
    }

    /// Drives the refresh at the head of the channel's refresh queue.
    ///
    /// On the first call for a pending refresh the involved queues are
    /// frozen. The channel then answers with either a precharge that
    /// clears the way (issue it and come back) or the refresh itself,
    /// at which point the freeze is lifted.
    pub fn finish_refresh(&mut self, channel: &ChannelState) -> Option<Command> {
        let ref_cmd = channel.pending_ref_command();
        if !self.in_ref {
            self.freeze_ref_queues(&ref_cmd);
            self.in_ref = true;
        }
        let cmd = channel.get_ready(&ref_cmd, self.clk);
        if cmd.is_some_and(|c| c.is_refresh()) {
            self.ref_q_indices.clear();
            self.in_ref = false;
        }
        cmd
    }

    pub fn will_accept_command(&self, rank: usize, bankgroup: usize, bank: usize) -> bool {
        self.queues[self.queue_index(rank, bankgroup, bank)].len() < self.queue_size
    }

    pub fn add_command(&mut self, cmd: Command) -> bool {
        let idx = self.queue_index(cmd.rank(), cmd.bankgroup(), cmd.bank());
        if self.queues[idx].len() < self.queue_size {
            self.queues[idx].push(cmd);
            true
        } else {
            false
        }
    }

    pub fn queue_empty(&self) -> bool {
        self.queues.iter().all(|q| q.is_empty())
    }

    /// True when no queue belonging to `rank` holds a command.
    pub fn rank_queues_empty(&self, rank: usize) -> bool {
        match self.structure {
            QueueStructure::PerRank => self.queues[rank].is_empty(),
            QueueStructure::PerBank => {
                let start = rank * self.config.banks;
                self.queues[start..start + self.config.banks]
                    .iter()
                    .all(|q| q.is_empty())
            }
        }
    }

    fn queue_index(&self, rank: usize, bankgroup: usize, bank: usize) -> usize {
        match self.structure {
            QueueStructure::PerRank => rank,
            QueueStructure::PerBank => {
                rank * self.config.banks + bankgroup * self.config.banks_per_group + bank
            }
        }
    }

    fn first_ready_in_queue(&self, idx: usize, channel: &ChannelState) -> Option<Command> {
        let queue = &self.queues[idx];
        for (pos, entry) in queue.iter().enumerate() {
            let cmd = match channel.get_ready(entry, self.clk) {
                Some(cmd) => cmd,
                None => continue,
            };
            if cmd.kind == CommandKind::Precharge {
                if !Self::arbitrate_precharge(pos, queue, channel) {
                    continue;
                }
            } else if cmd.is_write() && Self::has_rw_dependency(pos, queue) {
                continue;
            }
            return Some(cmd);
        }
        None
    }

    /// Decides whether a precharge demanded by `queue[pos]` may issue.
    ///
    /// It may not when an earlier entry targets the same bank (that
    /// entry keeps FIFO priority), nor while later entries could still
    /// hit the open row, unless the bank has already served four
    /// consecutive row hits.
    fn arbitrate_precharge(pos: usize, queue: &[Command], channel: &ChannelState) -> bool {
        let cmd = &queue[pos];
        for prev in &queue[..pos] {
            if prev.rank() == cmd.rank()
                && prev.bankgroup() == cmd.bankgroup()
                && prev.bank() == cmd.bank()
            {
                return false;
            }
        }

        let open_row = channel.open_row(cmd.rank(), cmd.bankgroup(), cmd.bank());
        let pending_row_hits_exist = queue[pos..].iter().any(|pending| {
            Some(pending.row()) == open_row
                && pending.bank() == cmd.bank()
                && pending.bankgroup() == cmd.bankgroup()
                && pending.rank() == cmd.rank()
        });
        let rowhit_limit_reached =
            channel.row_hit_count(cmd.rank(), cmd.bankgroup(), cmd.bank()) >= 4;
        !pending_row_hits_exist || rowhit_limit_reached
    }

    /// A write may not overtake an earlier read to the same location.
    /// (Read-after-write is already handled at transaction intake.)
    fn has_rw_dependency(pos: usize, queue: &[Command]) -> bool {
        let cmd = &queue[pos];
        queue[..pos].iter().any(|prev| {
            prev.is_read()
                && prev.row() == cmd.row()
                && prev.column() == cmd.column()
                && prev.bank() == cmd.bank()
                && prev.bankgroup() == cmd.bankgroup()
        })
    }

    fn freeze_ref_queues(&mut self, ref_cmd: &Command) {
        if ref_cmd.kind == CommandKind::Refresh {
            match self.structure {
                QueueStructure::PerBank => {
                    for i in 0..self.num_queues {
                        if i / self.config.banks == ref_cmd.rank() {
                            self.ref_q_indices.insert(i);
                        }
                    }
                }
                QueueStructure::PerRank => {
                    self.ref_q_indices.insert(ref_cmd.rank());
                }
            }
        } else {
            let idx = self.queue_index(ref_cmd.rank(), ref_cmd.bankgroup(), ref_cmd.bank());
            self.ref_q_indices.insert(idx);
        }
    }

    fn erase_rw_command(&mut self, cmd: &Command) {
        let idx = self.queue_index(cmd.rank(), cmd.bankgroup(), cmd.bank());
        let queue = &mut self.queues[idx];
        let pos = queue
            .iter()
            .position(|entry| entry.hex_addr == cmd.hex_addr && entry.kind == cmd.kind)
            .unwrap_or_else(|| panic!("issued command {} not found in its queue", cmd));
        queue.remove(pos);
    }
}
