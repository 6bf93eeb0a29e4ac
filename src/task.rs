//! The task model.

use crate::error::{Error, Result};

use dashu::{
    rational::Relaxed,
    integer::Sign
};

/// Type of time instants and durations.
///
/// The simulation is discrete; one unit of `Time` is the smallest amount of
/// work a job can perform and the granularity at which scheduling decisions
/// are taken.
pub type Time = u64;

/// A periodic task as given by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Task {
    /// Identifier, stable across all jobs of the task.
    pub id: String,
    /// Release time of the first job (the task's phase).
    pub release: Time,
    /// Execution time required by every job.
    pub cost: Time,
    /// Separation between two consecutive releases.
    pub period: Time,
    /// Deadline relative to each release.
    pub deadline: Time
}

impl Task {
    /// Constructs a new `Task` with the given `cost` and `period`, released at
    /// time `0` with implicit deadline (equal to `period`).
    pub fn new(id: impl Into<String>, cost: Time, period: Time) -> Self {
        Self {
            id: id.into(),
            release: 0,
            cost,
            period,
            deadline: period
        }
    }

    /// Returns the task with first release at `release`.
    pub fn with_release(self, release: Time) -> Self {
        Self { release, ..self }
    }

    /// Returns the task with new relative deadline `deadline`.
    pub fn with_deadline(self, deadline: Time) -> Self {
        Self { deadline, ..self }
    }

    /// Checks that the task can be simulated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTask`] if the period, cost or deadline is zero.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.period == 0 {
            "period must be positive"
        } else if self.cost == 0 {
            "execution time must be positive"
        } else if self.deadline == 0 {
            "deadline must be positive"
        } else {
            return Ok(());
        };

        Err(Error::InvalidTask { task: self.id.clone(), reason })
    }
}

/// An aperiodic job: released once, never re-released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aperiodic {
    pub id: String,
    pub release: Time,
    pub cost: Time
}

impl Aperiodic {
    pub fn new(id: impl Into<String>, release: Time, cost: Time) -> Self {
        Self { id: id.into(), release, cost }
    }
}

/// Capacity reserved for aperiodic work by a polling or deferrable server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Server {
    pub id: String,
    /// Replenishment interval.
    pub period: Time,
    /// Execution units granted per period.
    pub budget: Time
}

impl Server {
    pub fn new(id: impl Into<String>, period: Time, budget: Time) -> Self {
        Self { id: id.into(), period, budget }
    }

    /// Checks that the server can be simulated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidServer`] if the period or budget is zero, or if
    /// the budget exceeds the period.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.period == 0 {
            "period must be positive"
        } else if self.budget == 0 {
            "budget must be positive"
        } else if self.budget > self.period {
            "budget exceeds period"
        } else {
            return Ok(());
        };

        Err(Error::InvalidServer { reason })
    }

    /// Returns the periodic task that this server behaves like, released at `0`.
    pub fn as_task(&self) -> Task {
        Task::new(self.id.clone(), self.budget, self.period)
    }
}

/// A live job instance, owned by a running simulation.
///
/// Both periodic tasks and servers are simulated through `Job`s; a server's
/// `remaining` execution is its unspent budget.
#[derive(Clone, Debug)]
pub struct Job<'a> {
    pub name: &'a str,
    pub release: Time,
    pub cost: Time,
    pub period: Time,
    /// Relative deadline.
    pub relative: Time,
    /// Absolute deadline, always `release + relative`.
    pub deadline: Time,
    pub remaining: Time,
    /// Priority key under the active policy; lower sorts first.
    pub priority: i128,
    pub ready: bool
}

impl<'a> Job<'a> {
    /// Returns the first job of `task`.
    pub fn first(task: &'a Task) -> Self {
        Self {
            name: &task.id,
            release: task.release,
            cost: task.cost,
            period: task.period,
            relative: task.deadline,
            deadline: task.release + task.deadline,
            remaining: task.cost,
            priority: 0,
            ready: false
        }
    }

    /// Returns the job standing in for `server`.
    ///
    /// The server starts with no budget; it is granted one at the first period
    /// boundary, which is time `0`.
    pub fn server(server: &'a Server) -> Self {
        Self {
            name: &server.id,
            release: 0,
            cost: server.budget,
            period: server.period,
            relative: server.period,
            deadline: server.period,
            remaining: 0,
            priority: 0,
            ready: false
        }
    }

    /// Returns the next job of the same task: released one period later, with
    /// a fresh budget and not yet ready.
    pub fn successor(&self) -> Self {
        let release = self.release + self.period;

        Self {
            release,
            deadline: release + self.relative,
            remaining: self.cost,
            ready: false,
            ..self.clone()
        }
    }

    /// Restarts the job at `now` with `budget` units to spend.
    ///
    /// Used for servers at their period boundaries.
    pub fn replenish(&mut self, now: Time, budget: Time) {
        self.release = now;
        self.deadline = now + self.relative;
        self.remaining = budget;
        self.ready = true;
    }

    /// Slack left at `now`: how long the job could still wait and meet its
    /// deadline running uninterrupted. Negative once that is impossible.
    pub fn laxity(&self, now: Time) -> i128 {
        i128::from(self.deadline) - i128::from(self.remaining) - i128::from(now)
    }

    /// Executes the job for one unit and returns whether it has completed.
    ///
    /// # Panics
    ///
    /// Panics if the job has no remaining execution.
    pub fn execute(&mut self) -> bool {
        self.remaining = self.remaining.checked_sub(1)
                             .expect("executed a job with no remaining work");
        self.remaining == 0
    }
}

/// Trait for tasks and collections of tasks (task-sets).
pub trait Set {
    /// Returns the exact value of the total utilization of the task-set.
    ///
    /// For this value to be computed exactly it is required that the return type
    /// be an arbitrary-precision (non-negative) rational; since its main use is to be
    /// summed or compared, it is not immediately returned as a
    /// [`RBig`](`dashu::rational::RBig`); use [`Relaxed::canonicalize`] to convert
    /// to it if needed.
    fn utilization(self) -> Relaxed;

    /// Tests if the task-set has all implicit tasks, i.e. if all their deadlines
    /// are equal to their periods.
    fn implicit(self) -> bool;
}

impl Set for &'_ Task {
    fn utilization(self) -> Relaxed {
        Relaxed::from_parts_const(
            Sign::Positive,
            self.cost.into(),
            self.period.into()
        )
    }

    fn implicit(self) -> bool {
        self.period == self.deadline
    }
}

/// A server reserves `budget / period` of the processor and is otherwise
/// treated as an implicit-deadline task.
impl Set for &'_ Server {
    fn utilization(self) -> Relaxed {
        Relaxed::from_parts_const(
            Sign::Positive,
            self.budget.into(),
            self.period.into()
        )
    }

    fn implicit(self) -> bool {
        true
    }
}

/// Any collection of `Set`s is a `Set`, and is treated as if each of its
/// elements were a task.
impl<I, T: Set> Set for I where I: IntoIterator<Item = T> {
    fn utilization(self) -> Relaxed {
        let mut out = Relaxed::default();

        for x in self {
            out += x.utilization();
        }

        out
    }

    fn implicit(self) -> bool {
        self.into_iter()
            .all(T::implicit)
    }
}
