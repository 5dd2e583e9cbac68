//! Decoded DRAM addresses.
//!
//! A physical byte address is split by the configured bit-field mapping
//! into the six levels of the device hierarchy. Rank-scoped commands
//! (refresh, self-refresh) only carry a meaningful rank; the remaining
//! fields are left at zero.

/// A fully decoded DRAM address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Address {
    pub channel: usize,
    pub rank: usize,
    pub bankgroup: usize,
    pub bank: usize,
    pub row: usize,
    pub column: usize,
}

impl Address {
    /// Creates a fully specified address.
    pub fn new(
        channel: usize,
        rank: usize,
        bankgroup: usize,
        bank: usize,
        row: usize,
        column: usize,
    ) -> Self {
        Self {
            channel,
            rank,
            bankgroup,
            bank,
            row,
            column,
        }
    }

    /// Address for a rank-scoped command; only `rank` is meaningful.
    pub fn for_rank(rank: usize) -> Self {
        Self {
            rank,
            ..Self::default()
        }
    }

    /// Address for a bank-scoped command without a row/column (e.g. a
    /// per-bank refresh or a retargeted precharge).
    pub fn for_bank(rank: usize, bankgroup: usize, bank: usize) -> Self {
        Self {
            rank,
            bankgroup,
            bank,
            ..Self::default()
        }
    }
}
