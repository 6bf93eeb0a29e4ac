//! Priority policies for ordering ready jobs.

use crate::task::{Job, Time};

use clap::ValueEnum;

use std::fmt;

/// A uniprocessor priority policy.
///
/// Each policy assigns every job a priority key in which _lower_ values are
/// more urgent; static-priority policies express `1 / period` and
/// `1 / deadline` as the period and deadline themselves, which order the same
/// way without resorting to fractions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Rate-monotonic: shorter period first.
    #[value(name = "rm", alias = "rate-monotonic")]
    RateMonotonic,
    /// Deadline-monotonic: shorter relative deadline first.
    #[value(name = "dm", alias = "deadline-monotonic")]
    DeadlineMonotonic,
    /// Earliest absolute deadline first.
    #[value(name = "edf", alias = "earliest-deadline-first")]
    EarliestDeadline,
    /// Least laxity first.
    #[value(name = "llf", alias = "least-laxity-first")]
    LeastLaxity
}

impl Policy {
    /// Every policy, in the order the CLI reports them.
    pub const ALL: [Policy; 4] = [
        Policy::RateMonotonic,
        Policy::DeadlineMonotonic,
        Policy::EarliestDeadline,
        Policy::LeastLaxity
    ];

    /// Whether job priorities stay fixed for the lifetime of the task.
    pub fn is_static(self) -> bool {
        matches!(self, Policy::RateMonotonic | Policy::DeadlineMonotonic)
    }

    /// Returns the priority key of `job` at `now`.
    pub fn priority(self, job: &Job, now: Time) -> i128 {
        match self {
            Policy::RateMonotonic     => job.period.into(),
            Policy::DeadlineMonotonic => job.relative.into(),
            Policy::EarliestDeadline  => job.deadline.into(),
            Policy::LeastLaxity       => job.laxity(now)
        }
    }

    /// Refreshes the priority of every job in `jobs` and sorts `order`, a list
    /// of indices into `jobs`, so that ready jobs come first by ascending key.
    ///
    /// The sort is stable: ties keep the order they had before the call, so
    /// a job re-released to the back of `order` loses ties to its peers.
    pub fn sort(self, jobs: &mut [Job], order: &mut [usize], now: Time) {
        for job in jobs.iter_mut() {
            job.priority = self.priority(job, now);
        }

        order.sort_by_key(|&i| (!jobs[i].ready, jobs[i].priority));
    }

    /// Returns the short name of the policy.
    pub fn name(self) -> &'static str {
        match self {
            Policy::RateMonotonic     => "RM",
            Policy::DeadlineMonotonic => "DM",
            Policy::EarliestDeadline  => "EDF",
            Policy::LeastLaxity       => "LLF"
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
