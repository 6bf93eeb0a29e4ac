//! Aperiodic service: background serving and bandwidth-reserving servers.

use crate::{
    task::{Aperiodic, Server, Time},
    error::{Error, Result}
};

use clap::ValueEnum;

use std::{
    collections::VecDeque,
    fmt
};

/// Discipline used to serve aperiodic jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServerKind {
    /// Aperiodic jobs run only when no periodic job is ready.
    #[value(alias = "bg")]
    Background,
    /// Budget is granted at each period boundary for the work pending then.
    #[value(alias = "poller")]
    Polling,
    /// Budget is restored at each period boundary and kept until used.
    #[value(alias = "ds")]
    Deferrable
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::Background => write!(f, "background"),
            ServerKind::Polling    => write!(f, "polling"),
            ServerKind::Deferrable => write!(f, "deferrable")
        }
    }
}

/// The aperiodic service active during a simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Service {
    /// Periodic tasks only; aperiodic jobs are ignored.
    #[default]
    None,
    Background,
    Polling(Server),
    Deferrable(Server)
}

impl Service {
    /// Builds the service selected by `kind`, using `server` for the
    /// disciplines that need one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingServer`] if a polling or deferrable service is
    /// requested without a server, and [`Error::InvalidServer`] if a server
    /// is given for a discipline that has none or does not pass
    /// [`Server::validate`].
    pub fn new(kind: Option<ServerKind>, server: Option<Server>) -> Result<Self> {
        let service = match (kind, server) {
            (None, None) => Service::None,
            (Some(ServerKind::Background), None) => Service::Background,
            (None | Some(ServerKind::Background), Some(_)) => {
                return Err(Error::InvalidServer { reason: "budget and period given without a polling or deferrable service" });
            },
            (Some(ServerKind::Polling), Some(server)) => Service::Polling(server),
            (Some(ServerKind::Deferrable), Some(server)) => Service::Deferrable(server),
            (Some(kind), None) => return Err(Error::MissingServer(kind))
        };

        if let Some(server) = service.server() {
            server.validate()?;
        }

        Ok(service)
    }

    pub fn kind(&self) -> Option<ServerKind> {
        match self {
            Service::None          => None,
            Service::Background    => Some(ServerKind::Background),
            Service::Polling(_)    => Some(ServerKind::Polling),
            Service::Deferrable(_) => Some(ServerKind::Deferrable)
        }
    }

    /// The server competing with periodic tasks, if any.
    pub fn server(&self) -> Option<&Server> {
        match self {
            Service::Polling(server) | Service::Deferrable(server) => Some(server),
            Service::None | Service::Background => None
        }
    }

    /// Whether aperiodic jobs are served at all.
    pub fn serves(&self) -> bool {
        !matches!(self, Service::None)
    }

    /// Returns the budget the server is granted at `now`, or `None` if `now`
    /// is not a period boundary (or there is no server).
    ///
    /// A polling server is granted only what the jobs pending at `now` can
    /// use, so capacity left unused at a boundary is lost for the whole
    /// period. A deferrable server is always restored to its full budget.
    pub fn replenish(&self, now: Time, pending: &Pending) -> Option<Time> {
        match self {
            Service::Polling(server) if now % server.period == 0 => {
                Some(pending.demand(now, server.budget))
            },

            Service::Deferrable(server) if now % server.period == 0 => {
                Some(server.budget)
            },

            _ => None
        }
    }

    /// Whether a server with `budget` left may be selected at `now`.
    ///
    /// Both servers need budget and a released job to serve; a deferrable
    /// server without work is passed over so that its budget survives until
    /// work arrives later in the period.
    pub fn eligible(&self, budget: Time, pending: &Pending, now: Time) -> bool {
        self.server().is_some() && budget > 0 && pending.head(now).is_some()
    }
}

/// Aperiodic jobs awaiting service, in first-come-first-served order.
#[derive(Clone, Debug, Default)]
pub struct Pending<'a> {
    queue: VecDeque<(&'a Aperiodic, Time)>
}

impl<'a> Pending<'a> {
    /// Queues every job in `jobs` by release time; jobs released together
    /// keep their input order.
    pub fn new(jobs: &'a [Aperiodic]) -> Self {
        let mut sorted = jobs.iter().collect::<Vec<_>>();
        sorted.sort_by_key(|job| job.release);

        Self {
            queue: sorted.into_iter()
                         .map(|job| (job, job.cost))
                         .collect()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// The job first in line, if it has been released by `now`.
    pub fn head(&self, now: Time) -> Option<&'a Aperiodic> {
        self.queue.front()
                  .filter(|(job, _)| job.release <= now)
                  .map(|(job, _)| *job)
    }

    /// Work left on jobs released by `now`, capped at `cap`.
    pub fn demand(&self, now: Time, cap: Time) -> Time {
        self.queue.iter()
                  .take_while(|(job, _)| job.release <= now)
                  .fold(0, |used, (_, remaining)| (used + remaining).min(cap))
    }

    /// Runs the head job for one unit, dropping it once complete.
    ///
    /// Returns the job and whether it completed, or `None` if no job has been
    /// released by `now`.
    pub fn serve(&mut self, now: Time) -> Option<(&'a Aperiodic, bool)> {
        let (job, remaining) = self.queue.front_mut()
                                         .filter(|(job, _)| job.release <= now)?;
        let job = *job;

        *remaining -= 1;

        let done = *remaining == 0;

        if done {
            self.queue.pop_front();
        }

        Some((job, done))
    }
}
