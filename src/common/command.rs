//! Low-level DRAM commands.

use std::fmt;

use crate::common::Address;

/// Number of distinct command kinds; sizes the per-kind timing tables.
pub const NUM_COMMAND_KINDS: usize = 10;

/// The closed set of commands the controller can put on the wire.
///
/// `Refresh`, `SrefEnter` and `SrefExit` are rank-scoped; everything
/// else targets a single bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Read,
    ReadPrecharge,
    Write,
    WritePrecharge,
    Activate,
    Precharge,
    RefreshBank,
    Refresh,
    SrefEnter,
    SrefExit,
}

impl CommandKind {
    /// Ordinal used to index the timing tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_read(self) -> bool {
        matches!(self, CommandKind::Read | CommandKind::ReadPrecharge)
    }

    pub fn is_write(self) -> bool {
        matches!(self, CommandKind::Write | CommandKind::WritePrecharge)
    }

    pub fn is_read_write(self) -> bool {
        self.is_read() || self.is_write()
    }

    pub fn is_refresh(self) -> bool {
        matches!(self, CommandKind::Refresh | CommandKind::RefreshBank)
    }

    /// Rank-scoped commands apply to every bank in the rank at once.
    pub fn is_rank_command(self) -> bool {
        matches!(
            self,
            CommandKind::Refresh | CommandKind::SrefEnter | CommandKind::SrefExit
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Read => "READ",
            CommandKind::ReadPrecharge => "READ_P",
            CommandKind::Write => "WRITE",
            CommandKind::WritePrecharge => "WRITE_P",
            CommandKind::Activate => "ACT",
            CommandKind::Precharge => "PRE",
            CommandKind::RefreshBank => "REFb",
            CommandKind::Refresh => "REF",
            CommandKind::SrefEnter => "SREF_ENTER",
            CommandKind::SrefExit => "SREF_EXIT",
        };
        f.write_str(name)
    }
}

/// A command bound to a decoded address.
///
/// `hex_addr` keeps the originating byte address so reads and writes
/// can be matched back to their pending transactions at issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub addr: Address,
    pub hex_addr: u64,
}

impl Command {
    pub fn new(kind: CommandKind, addr: Address, hex_addr: u64) -> Self {
        Self {
            kind,
            addr,
            hex_addr,
        }
    }

    pub fn is_read(&self) -> bool {
        self.kind.is_read()
    }

    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    pub fn is_read_write(&self) -> bool {
        self.kind.is_read_write()
    }

    pub fn is_refresh(&self) -> bool {
        self.kind.is_refresh()
    }

    pub fn is_rank_command(&self) -> bool {
        self.kind.is_rank_command()
    }

    pub fn rank(&self) -> usize {
        self.addr.rank
    }

    pub fn bankgroup(&self) -> usize {
        self.addr.bankgroup
    }

    pub fn bank(&self) -> usize {
        self.addr.bank
    }

    pub fn row(&self) -> usize {
        self.addr.row
    }

    pub fn column(&self) -> usize {
        self.addr.column
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} ch{} ra{} bg{} ba{} ro{} co{}",
            self.kind,
            self.addr.channel,
            self.addr.rank,
            self.addr.bankgroup,
            self.addr.bank,
            self.addr.row,
            self.addr.column
        )
    }
}
