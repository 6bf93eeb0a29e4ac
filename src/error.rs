//! The crate error type.

use crate::{server::ServerKind, task::Time};

use dashu::rational::RBig;

use std::io;

/// Errors raised while admitting or simulating a task system.
///
/// Admission errors (everything except [`Error::DeadlineMiss`]) are raised
/// before any simulation state exists; a deadline miss ends a run that has
/// already produced part of its trace.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("task set is not schedulable: utilization {utilization} exceeds 1")]
    Infeasible { utilization: RBig },

    #[error("deadline missed for {task} at {time}")]
    DeadlineMiss { task: String, time: Time },

    #[error("invalid task {task}: {reason}")]
    InvalidTask { task: String, reason: &'static str },

    #[error("invalid server: {reason}")]
    InvalidServer { reason: &'static str },

    #[error("{0} service requires a server budget and period")]
    MissingServer(ServerKind),

    #[error("invalid generator parameters: {0}")]
    InvalidGenerator(&'static str),

    #[error("hyperperiod does not fit in a time value")]
    Horizon,

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error)
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
