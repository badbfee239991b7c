//! Test doubles for the clock, the network, and the wire formats.
//!
//! Compiled into the library so integration tests and benchmarks can use
//! them as well.

pub mod clocks;
pub mod mock_server;
pub mod packets;
pub mod probe;

pub use clocks::{ManualClock, TokioClock};
pub use mock_server::{MockTimeServer, MockTimeServerConfig};
pub use probe::ScriptedProbe;
