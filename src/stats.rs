//! Per-channel simulation statistics.
//!
//! Flat counters bumped from the controller's hot paths, plus latency
//! sums for derived averages. Energy is not tracked cycle-by-cycle;
//! it is reconstructed at print time from the command counts and the
//! pre-computed per-command/per-cycle increments in the config.

use crate::common::CommandKind;
use crate::config::Config;

#[derive(Debug, Default)]
pub struct Stats {
    pub num_cycles: u64,

    pub num_reads_done: u64,
    pub num_writes_done: u64,

    pub num_read_cmds: u64,
    pub num_write_cmds: u64,
    pub num_act_cmds: u64,
    pub num_pre_cmds: u64,
    pub num_ref_cmds: u64,
    pub num_refb_cmds: u64,
    pub num_srefe_cmds: u64,
    pub num_srefx_cmds: u64,

    pub num_read_row_hits: u64,
    pub num_write_row_hits: u64,
    pub hbm_dual_cmds: u64,

    pub read_latency_sum: u64,
    pub write_latency_sum: u64,
    pub interarrival_sum: u64,
    pub num_arrivals: u64,

    pub sref_cycles: Vec<u64>,
    pub all_bank_idle_cycles: Vec<u64>,
    pub rank_active_cycles: Vec<u64>,
}

impl Stats {
    pub fn new(ranks: usize) -> Self {
        Self {
            sref_cycles: vec![0; ranks],
            all_bank_idle_cycles: vec![0; ranks],
            rank_active_cycles: vec![0; ranks],
            ..Self::default()
        }
    }

    /// Records an issued command; row-hit classification must happen
    /// before the bank state is updated for the command.
    pub fn record_command(&mut self, kind: CommandKind, row_hit: bool) {
        match kind {
            CommandKind::Read | CommandKind::ReadPrecharge => {
                self.num_read_cmds += 1;
                if row_hit {
                    self.num_read_row_hits += 1;
                }
            }
            CommandKind::Write | CommandKind::WritePrecharge => {
                self.num_write_cmds += 1;
                if row_hit {
                    self.num_write_row_hits += 1;
                }
            }
            CommandKind::Activate => self.num_act_cmds += 1,
            CommandKind::Precharge => self.num_pre_cmds += 1,
            CommandKind::Refresh => self.num_ref_cmds += 1,
            CommandKind::RefreshBank => self.num_refb_cmds += 1,
            CommandKind::SrefEnter => self.num_srefe_cmds += 1,
            CommandKind::SrefExit => self.num_srefx_cmds += 1,
        }
    }

    pub fn reset(&mut self) {
        let ranks = self.sref_cycles.len();
        *self = Self::new(ranks);
    }

    pub fn print(&self, channel: usize, config: &Config) {
        let avg = |sum: u64, n: u64| if n == 0 { 0.0 } else { sum as f64 / n as f64 };

        let cmd_energy = self.num_act_cmds as f64 * config.act_energy_inc
            + self.num_read_cmds as f64 * config.read_energy_inc
            + self.num_write_cmds as f64 * config.write_energy_inc
            + self.num_ref_cmds as f64 * config.ref_energy_inc
            + self.num_refb_cmds as f64 * config.refb_energy_inc;
        let background_energy = self.rank_active_cycles.iter().sum::<u64>() as f64
            * config.act_stb_energy_inc
            + self.all_bank_idle_cycles.iter().sum::<u64>() as f64 * config.pre_stb_energy_inc
            + self.sref_cycles.iter().sum::<u64>() as f64 * config.sref_energy_inc;
        // increments are V * mA * cycles; tCK converts cycles to ns,
        // which makes the sum picojoules
        let total_energy_pj = (cmd_energy + background_energy) * config.tck;

        println!("==========================================================");
        println!("CHANNEL {} STATISTICS", channel);
        println!("==========================================================");
        println!("num_cycles               {}", self.num_cycles);
        println!("num_reads_done           {}", self.num_reads_done);
        println!("num_writes_done          {}", self.num_writes_done);
        println!(
            "avg_read_latency         {:.2}",
            avg(self.read_latency_sum, self.num_reads_done)
        );
        println!(
            "avg_write_latency        {:.2}",
            avg(self.write_latency_sum, self.num_write_cmds)
        );
        println!(
            "avg_interarrival         {:.2}",
            avg(self.interarrival_sum, self.num_arrivals)
        );
        println!("----------------------------------------------------------");
        println!("COMMANDS");
        println!("  num_read_cmds          {}", self.num_read_cmds);
        println!("  num_write_cmds         {}", self.num_write_cmds);
        println!("  num_act_cmds           {}", self.num_act_cmds);
        println!("  num_pre_cmds           {}", self.num_pre_cmds);
        println!("  num_ref_cmds           {}", self.num_ref_cmds);
        println!("  num_refb_cmds          {}", self.num_refb_cmds);
        println!("  num_srefe_cmds         {}", self.num_srefe_cmds);
        println!("  num_srefx_cmds         {}", self.num_srefx_cmds);
        println!("  num_read_row_hits      {}", self.num_read_row_hits);
        println!("  num_write_row_hits     {}", self.num_write_row_hits);
        if config.enable_hbm_dual_cmd {
            println!("  hbm_dual_cmds          {}", self.hbm_dual_cmds);
        }
        println!("----------------------------------------------------------");
        println!("RANK CYCLES");
        for rank in 0..self.sref_cycles.len() {
            println!(
                "  rank {}: active {:<10} idle {:<10} sref {}",
                rank,
                self.rank_active_cycles[rank],
                self.all_bank_idle_cycles[rank],
                self.sref_cycles[rank]
            );
        }
        println!("----------------------------------------------------------");
        println!("total_energy             {:.1} pJ", total_energy_pj);
        println!("==========================================================");
    }
}
