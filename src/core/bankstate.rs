//! Per-bank state machine and next-legal-time table.

use crate::common::{Command, CommandKind, NUM_COMMAND_KINDS};

/// The mode a bank is in. `Open` carries the open row and the count of
/// consecutive row hits since the last activate, so a bank can never
/// be open without a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankMode {
    Closed,
    Open { row: usize, hit_count: u32 },
    SelfRefresh,
    /// Reserved; no transitions in or out are defined.
    PowerDown,
}

/// State of a single bank: its mode plus, for every command kind, the
/// earliest clock at which that kind may be issued here.
pub struct BankState {
    mode: BankMode,
    next_ok: [u64; NUM_COMMAND_KINDS],
}

impl Default for BankState {
    fn default() -> Self {
        Self::new()
    }
}

impl BankState {
    pub fn new() -> Self {
        Self {
            mode: BankMode::Closed,
            next_ok: [0; NUM_COMMAND_KINDS],
        }
    }

    /// Determines which command is required to make progress on `cmd`
    /// from the current mode, and returns it if its timing allows
    /// issue at `clk`. Returns `None` while blocked.
    pub fn get_ready(&self, cmd: &Command, clk: u64) -> Option<Command> {
        use CommandKind::*;
        let required = match self.mode {
            BankMode::Closed => match cmd.kind {
                Read | ReadPrecharge | Write | WritePrecharge => Activate,
                Refresh | RefreshBank | SrefEnter => cmd.kind,
                other => panic!("command {:?} has no path from a closed bank", other),
            },
            BankMode::Open { row, .. } => match cmd.kind {
                Read | ReadPrecharge | Write | WritePrecharge => {
                    if cmd.row() == row {
                        cmd.kind
                    } else {
                        Precharge
                    }
                }
                Refresh | RefreshBank | SrefEnter => Precharge,
                other => panic!("command {:?} has no path from an open bank", other),
            },
            BankMode::SelfRefresh => match cmd.kind {
                Read | ReadPrecharge | Write | WritePrecharge | SrefExit => SrefExit,
                other => panic!("command {:?} has no path from self-refresh", other),
            },
            BankMode::PowerDown => {
                panic!("bank is in the reserved power-down mode")
            }
        };
        if clk >= self.next_ok[required.index()] {
            Some(Command::new(required, cmd.addr, cmd.hex_addr))
        } else {
            None
        }
    }

    /// Applies the state transition for an issued command. Any pairing
    /// not in the transition table is a scheduling bug, not a runtime
    /// condition, and panics.
    pub fn update_state(&mut self, cmd: &Command) {
        use CommandKind::*;
        self.mode = match (self.mode, cmd.kind) {
            (BankMode::Open { row, hit_count }, Read | Write) => BankMode::Open {
                row,
                hit_count: hit_count + 1,
            },
            (BankMode::Open { .. }, ReadPrecharge | WritePrecharge | Precharge) => {
                BankMode::Closed
            }
            (BankMode::Closed, Refresh | RefreshBank) => BankMode::Closed,
            (BankMode::Closed, Activate) => BankMode::Open {
                row: cmd.row(),
                hit_count: 0,
            },
            (BankMode::Closed, SrefEnter) => BankMode::SelfRefresh,
            (BankMode::SelfRefresh, SrefExit) => BankMode::Closed,
            (mode, kind) => panic!("illegal transition: {:?} issued to bank in {:?}", kind, mode),
        };
    }

    /// Pushes the next-legal time for `kind` out to `t` (never pulls
    /// it back in).
    pub fn update_timing(&mut self, kind: CommandKind, t: u64) {
        let slot = &mut self.next_ok[kind.index()];
        *slot = (*slot).max(t);
    }

    pub fn is_open(&self) -> bool {
        matches!(self.mode, BankMode::Open { .. })
    }

    pub fn open_row(&self) -> Option<usize> {
        match self.mode {
            BankMode::Open { row, .. } => Some(row),
            _ => None,
        }
    }

    pub fn row_hit_count(&self) -> u32 {
        match self.mode {
            BankMode::Open { hit_count, .. } => hit_count,
            _ => 0,
        }
    }
}
