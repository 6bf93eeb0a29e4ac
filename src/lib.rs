//! Discrete-time simulation of uniprocessor real-time scheduling.
//!
//! Periodic task-sets are simulated under one of four priority
//! [policies](policy::Policy) over one hyperperiod past their first
//! simultaneous release, optionally sharing the processor with aperiodic jobs
//! through background service or a polling or deferrable
//! [server](server::Service). The result is a per-unit schedule and a verdict
//! on whether any deadline was missed.

pub mod bound;
pub mod error;
pub mod gen;
pub mod load;
pub mod policy;
pub mod server;
pub mod sim;
pub mod task;
pub mod timebase;
pub mod trace;

pub use error::{Error, Result};
pub use sim::{simulate, Simulation, Report, Verdict};
