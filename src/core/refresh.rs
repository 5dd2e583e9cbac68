//! Periodic refresh injection.
//!
//! Every `interval` cycles a refresh obligation is pushed into the
//! channel's refresh queue. Rank-staggered spreads rank refreshes
//! evenly across tREFI; bank-staggered walks bankgroup-first through
//! the banks at tREFIb, the iteration order fixed by JEDEC.

use std::sync::Arc;

use crate::config::{Config, RefreshPolicy};
use crate::core::channel::ChannelState;

pub struct Refresh {
    config: Arc<Config>,
    policy: RefreshPolicy,
    interval: u64,
    clk: u64,
    next_rank: usize,
    next_bankgroup: usize,
    next_bank: usize,
}

impl Refresh {
    pub fn new(config: Arc<Config>) -> Self {
        let policy = config.refresh_policy;
        let interval = match policy {
            RefreshPolicy::RankSimultaneous => config.trefi,
            RefreshPolicy::BankStaggered => config.trefib,
            RefreshPolicy::RankStaggered => config.trefi / config.ranks as u64,
        };
        Self {
            policy,
            interval,
            clk: 0,
            next_rank: 0,
            next_bankgroup: 0,
            next_bank: 0,
            config,
        }
    }

    pub fn clock_tick(&mut self, channel: &mut ChannelState) {
        if self.clk > 0 && self.clk % self.interval == 0 {
            self.insert_refresh(channel);
        }
        self.clk += 1;
    }

    fn insert_refresh(&mut self, channel: &mut ChannelState) {
        match self.policy {
            RefreshPolicy::RankSimultaneous => {
                for rank in 0..self.config.ranks {
                    if !channel.is_rank_self_refreshing(rank) {
                        channel.rank_need_refresh(rank, true);
                        break;
                    }
                }
            }
            RefreshPolicy::RankStaggered => {
                if !channel.is_rank_self_refreshing(self.next_rank) {
                    channel.rank_need_refresh(self.next_rank, true);
                }
                self.iterate_next();
            }
            RefreshPolicy::BankStaggered => {
                if !channel.is_rank_self_refreshing(self.next_rank) {
                    channel.bank_need_refresh(
                        self.next_rank,
                        self.next_bankgroup,
                        self.next_bank,
                        true,
                    );
                }
                self.iterate_next();
            }
        }
    }

    fn iterate_next(&mut self) {
        match self.policy {
            RefreshPolicy::RankStaggered => {
                self.next_rank = (self.next_rank + 1) % self.config.ranks;
            }
            RefreshPolicy::BankStaggered => {
                // bankgroup advances first, then bank, then rank
                self.next_bankgroup = (self.next_bankgroup + 1) % self.config.bankgroups;
                if self.next_bankgroup == 0 {
                    self.next_bank = (self.next_bank + 1) % self.config.banks_per_group;
                    if self.next_bank == 0 {
                        self.next_rank = (self.next_rank + 1) % self.config.ranks;
                    }
                }
            }
            RefreshPolicy::RankSimultaneous => {}
        }
    }
}
