//! Shared types used throughout the DRAM simulator.
//!
//! This module provides the fundamental records that flow between
//! components: decoded device addresses, low-level DRAM commands, and
//! the transactions submitted by the traffic side.

/// Decoded device address (channel/rank/bankgroup/bank/row/column).
pub mod addr;

/// DRAM command kinds and the command record.
pub mod command;

/// Memory transaction record.
pub mod transaction;

pub use addr::Address;
pub use command::{Command, CommandKind, NUM_COMMAND_KINDS};
pub use transaction::Transaction;
