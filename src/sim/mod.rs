//! Simulation harness: the traffic generators that drive a memory
//! system from the front.

pub mod traffic;

pub use traffic::{RandomTraffic, StreamTraffic, TraceTraffic, TrafficGen};
