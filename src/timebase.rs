//! Hyperperiod and phase-alignment arithmetic bounding the simulation horizon.

use crate::task::{Task, Time};

use log::warn;

/// Greatest common divisor.
pub fn gcd(mut a: Time, mut b: Time) -> Time {
    while b != 0 {
        (a, b) = (b, a % b);
    }

    a
}

/// Least common multiple, or `None` if it overflows a `Time`.
///
/// By convention the LCM with zero is zero.
pub fn lcm(a: Time, b: Time) -> Option<Time> {
    if a == 0 || b == 0 {
        return Some(0);
    }

    (a / gcd(a, b)).checked_mul(b)
}

/// Returns the least common multiple of the periods of `tasks`, i.e. the span
/// after which their release pattern repeats.
///
/// An empty task-set has hyperperiod `1`. Returns `None` if any period is zero
/// or if the result overflows.
pub fn hyperperiod<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Option<Time> {
    tasks.into_iter().try_fold(1, |acc, task| {
        lcm(acc, task.period).filter(|&h| h != 0)
    })
}

/// Outcome of the search for the first simultaneous release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Alignment {
    /// Every task releases a job at this instant.
    At(Time),
    /// Tasks `first` and `other` never release at the same time.
    Never {
        first: String,
        other: String
    }
}

impl Alignment {
    /// Offset to add to the hyperperiod: the alignment instant, or `0` when
    /// releases never coincide.
    pub fn offset(&self) -> Time {
        match self {
            Alignment::At(t) => *t,
            Alignment::Never { .. } => 0
        }
    }

    /// Whether the horizon covers a full steady-state cycle.
    pub fn is_aligned(&self) -> bool {
        matches!(self, Alignment::At(_))
    }
}

/// Finds the earliest instant at which every task of `tasks` releases a job.
///
/// The search folds tasks in one at a time, keeping the earliest common
/// release of the tasks seen so far and the step (their hyperperiod) at which
/// it recurs. A new task with release `r` and period `p` can only join if
/// `r - time` is a multiple of `gcd(step, p)`; the time is then advanced by
/// whole steps until it is a release of the new task.
///
/// An empty task-set is aligned at `0`. Overflowing periods are reported as
/// aligned at `0` as well, since the hyperperiod check rejects them anyway.
pub fn first_simultaneous_release(tasks: &[Task]) -> Alignment {
    let Some((head, rest)) = tasks.split_first() else {
        return Alignment::At(0);
    };

    let mut time = i128::from(head.release);
    let mut step = head.period;

    for task in rest {
        let release = i128::from(task.release);
        let period = i128::from(task.period);

        if (release - time) % i128::from(gcd(step, task.period)) != 0 {
            warn!("tasks {} and {} never release at the same time; \
                   simulating one hyperperiod only", head.id, task.id);

            return Alignment::Never { first: head.id.clone(), other: task.id.clone() };
        }

        while time < release || (time - release) % period != 0 {
            time += i128::from(step);
        }

        let Some(next) = lcm(step, task.period) else {
            return Alignment::At(0);
        };

        step = next;
    }

    Time::try_from(time).map_or(Alignment::At(0), Alignment::At)
}

/// Number of units to simulate for `tasks`: one hyperperiod plus the first
/// simultaneous release, plus the closing instant at which the last deadlines
/// of the cycle are checked.
///
/// Returns `None` if the hyperperiod cannot be computed.
pub fn horizon(tasks: &[Task]) -> Option<(Time, Alignment)> {
    let hyper = hyperperiod(tasks)?;
    let alignment = first_simultaneous_release(tasks);

    hyper.checked_add(alignment.offset())?
         .checked_add(1)
         .map(|units| (units, alignment))
}
