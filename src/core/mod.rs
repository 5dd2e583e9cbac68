//! The controller core: bank state machines, the command timing
//! matrix, channel aggregation, command queues, refresh cadence, and
//! the per-channel controller loop.

pub mod bankstate;
pub mod channel;
pub mod controller;
pub mod queue;
pub mod refresh;
pub mod timing;
