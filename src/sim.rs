//! The discrete-time simulation driver.
//!
//! A [`Simulation`] owns the live state of one run: an arena of [`Job`]s with
//! one slot per periodic task (plus one for the server, if any), the order in
//! which those slots are considered, and the queue of pending aperiodic jobs.
//! Each call to [`Iterator::next`] simulates one unit of time and yields what
//! happened in it as a [`Slot`]; a deadline miss is yielded as an error and
//! ends the run.

use crate::{
    task::{Task, Aperiodic, Job, Time},
    policy::Policy,
    server::{Service, Pending},
    timebase::{self, Alignment},
    error::{Error, Result},
    bound
};

use log::{debug, info, trace, warn};

use std::{
    collections::HashSet,
    iter::FusedIterator
};

/// What the processor does during one unit of time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// The current job of a periodic task executes.
    Running(&'a str),
    /// The server executes on behalf of an aperiodic job. `budget` is the
    /// server budget available at the start of the unit.
    Serving {
        server: &'a str,
        job: &'a str,
        budget: Time
    },
    /// An aperiodic job executes in otherwise idle time.
    Background(&'a str),
    Idle
}

/// One unit of the simulated schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot<'a> {
    pub time: Time,
    pub event: Event<'a>
}

impl<'a> Slot<'a> {
    /// Name of the job executing in this slot, if any.
    ///
    /// Server slots are attributed to the aperiodic job being served.
    pub fn job(&self) -> Option<&'a str> {
        match self.event {
            Event::Running(name) | Event::Background(name) => Some(name),
            Event::Serving { job, .. } => Some(job),
            Event::Idle => None
        }
    }
}

/// A missed deadline: the simulation ends at the first one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Miss<'a> {
    pub task: &'a str,
    pub time: Time
}

impl From<Miss<'_>> for Error {
    fn from(miss: Miss) -> Self {
        Error::DeadlineMiss { task: miss.task.to_owned(), time: miss.time }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// Every deadline up to and including the last simulated instant was met.
    Completed,
    Missed(Miss<'a>)
}

/// The full outcome of a run.
#[derive(Clone, Debug)]
pub struct Report<'a> {
    /// Every simulated unit, up to the miss if there was one.
    pub slots: Vec<Slot<'a>>,
    pub verdict: Verdict<'a>,
    /// Number of units the run was allowed to cover.
    pub horizon: Time,
    pub alignment: Alignment
}

impl Report<'_> {
    pub fn completed(&self) -> bool {
        self.verdict == Verdict::Completed
    }
}

/// A single simulation run.
pub struct Simulation<'a> {
    policy: Policy,
    service: &'a Service,
    jobs: Vec<Job<'a>>,
    order: Vec<usize>,
    /// Index of the server in `jobs`.
    server: Option<usize>,
    pending: Pending<'a>,
    now: Time,
    horizon: Time,
    hyperperiod: Time,
    alignment: Alignment,
    missed: bool
}

impl<'a> Simulation<'a> {
    /// Admits a task system and prepares a run of it.
    ///
    /// The horizon is one hyperperiod of the periodic tasks (and the server)
    /// past their first simultaneous release, as computed by
    /// [`timebase::horizon`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTask`] or [`Error::InvalidServer`] for malformed
    /// input, [`Error::Infeasible`] if the periodic tasks fail the
    /// utilization bound and [`Error::Horizon`] if the hyperperiod overflows.
    pub fn new(
        tasks: &'a [Task],
        aperiodic: &'a [Aperiodic],
        policy: Policy,
        service: &'a Service
    ) -> Result<Self> {
        validate(tasks, aperiodic, service)?;
        bound::admit(tasks)?;

        let mut basis = tasks.to_vec();

        if let Some(server) = service.server() {
            if !bound::feasible_with(tasks, server) {
                warn!("utilization including server {} exceeds 1", server.id);
            }

            basis.push(server.as_task());
        }

        let hyperperiod = timebase::hyperperiod(&basis).ok_or(Error::Horizon)?;
        let (horizon, alignment) = timebase::horizon(&basis).ok_or(Error::Horizon)?;

        if !service.serves() && !aperiodic.is_empty() {
            debug!("no aperiodic service selected; ignoring {} aperiodic jobs", aperiodic.len());
        }

        info!("admitted {} tasks under {policy}: hyperperiod {hyperperiod}, horizon {horizon}",
              tasks.len());

        let mut jobs = tasks.iter()
                            .map(Job::first)
                            .collect::<Vec<_>>();

        let server = service.server().map(|server| {
            jobs.push(Job::server(server));
            jobs.len() - 1
        });

        Ok(Self {
            order: (0 .. jobs.len()).collect(),
            pending: if service.serves() { Pending::new(aperiodic) } else { Pending::default() },
            now: 0,
            missed: false,
            policy, service, jobs, server, horizon, hyperperiod, alignment
        })
    }

    /// Lengthens the run by `hyperperiods` further hyperperiods.
    #[must_use]
    pub fn extend(self, hyperperiods: Time) -> Self {
        Self {
            horizon: self.horizon.saturating_add(self.hyperperiod.saturating_mul(hyperperiods)),
            ..self
        }
    }

    pub fn horizon(&self) -> Time {
        self.horizon
    }

    pub fn hyperperiod(&self) -> Time {
        self.hyperperiod
    }

    /// Result of the phase-alignment search; a [`Alignment::Never`] means the
    /// horizon does not cover a full steady-state cycle.
    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    /// The next instant to be simulated.
    pub fn now(&self) -> Time {
        self.now
    }

    /// Live job state, one entry per periodic task in input order followed by
    /// the server.
    pub fn jobs(&self) -> &[Job<'a>] {
        &self.jobs
    }

    /// Aperiodic jobs not yet completed.
    pub fn pending(&self) -> &Pending<'a> {
        &self.pending
    }

    /// Runs the simulation to its end, collecting the schedule.
    pub fn run(mut self) -> Report<'a> {
        let mut slots = Vec::new();
        let mut verdict = Verdict::Completed;

        for slot in &mut self {
            match slot {
                Ok(slot) => slots.push(slot),
                Err(miss) => verdict = Verdict::Missed(miss)
            }
        }

        Report { slots, verdict, horizon: self.horizon, alignment: self.alignment }
    }

    fn step(&mut self, now: Time) -> Result<Event<'a>, Miss<'a>> {
        let server = self.server;

        if let Some(&i) = self.order.iter()
                                    .find(|&&i| Some(i) != server && self.jobs[i].deadline <= now) {
            debug!("{} missed its deadline at {now}", self.jobs[i].name);
            return Err(Miss { task: self.jobs[i].name, time: now });
        }

        for job in &mut self.jobs {
            if job.release <= now {
                job.ready = true;
            }
        }

        if let Some(s) = server {
            if let Some(budget) = self.service.replenish(now, &self.pending) {
                self.jobs[s].replenish(now, budget);
            }
        }

        self.policy.sort(&mut self.jobs, &mut self.order, now);

        let selected = self.order.iter().position(|&i| {
            let job = &self.jobs[i];

            job.ready && (Some(i) != server
                          || self.service.eligible(job.remaining, &self.pending, now))
        });

        let Some(pos) = selected else {
            if let Service::Background = self.service {
                if let Some((job, _)) = self.pending.serve(now) {
                    return Ok(Event::Background(&job.id));
                }
            }

            return Ok(Event::Idle);
        };

        let i = self.order[pos];

        if Some(i) == server {
            let Some((job, _)) = self.pending.serve(now) else {
                return Ok(Event::Idle);
            };

            let server = &mut self.jobs[i];
            let budget = server.remaining;
            server.execute();

            return Ok(Event::Serving { server: server.name, job: &job.id, budget });
        }

        let job = &mut self.jobs[i];
        let name = job.name;

        if job.execute() {
            *job = job.successor();
            debug!("{name} completed at {now}; next release at {}", job.release);

            self.order.remove(pos);
            self.order.push(i);
        }

        Ok(Event::Running(name))
    }
}

impl<'a> Iterator for Simulation<'a> {
    type Item = Result<Slot<'a>, Miss<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.missed || self.now >= self.horizon {
            return None;
        }

        let time = self.now;

        match self.step(time) {
            Ok(event) => {
                self.now += 1;

                let slot = Slot { time, event };
                trace!("{slot}");

                Some(Ok(slot))
            },

            Err(miss) => {
                self.missed = true;
                Some(Err(miss))
            }
        }
    }
}

impl FusedIterator for Simulation<'_> {}

/// Admits and runs a task system to completion.
///
/// # Errors
///
/// Returns any admission error of [`Simulation::new`]; a deadline miss is not
/// an error here but part of the returned [`Report`].
pub fn simulate<'a>(
    tasks: &'a [Task],
    aperiodic: &'a [Aperiodic],
    policy: Policy,
    service: &'a Service
) -> Result<Report<'a>> {
    Ok(Simulation::new(tasks, aperiodic, policy, service)?.run())
}

fn validate(tasks: &[Task], aperiodic: &[Aperiodic], service: &Service) -> Result<()> {
    let mut ids = HashSet::new();

    for task in tasks {
        task.validate()?;

        if !ids.insert(task.id.as_str()) {
            return Err(Error::InvalidTask { task: task.id.clone(), reason: "duplicate identifier" });
        }
    }

    for job in aperiodic {
        if job.cost == 0 {
            return Err(Error::InvalidTask { task: job.id.clone(), reason: "execution time must be positive" });
        }

        if !ids.insert(job.id.as_str()) {
            return Err(Error::InvalidTask { task: job.id.clone(), reason: "duplicate identifier" });
        }
    }

    if let Some(server) = service.server() {
        server.validate()?;

        if ids.contains(server.id.as_str()) {
            return Err(Error::InvalidServer { reason: "identifier collides with a task" });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Server;

    use Event::{Running, Serving, Background, Idle};

    fn events<'a>(report: &Report<'a>) -> Vec<Event<'a>> {
        report.slots.iter().map(|slot| slot.event).collect()
    }

    #[test]
    fn rate_monotonic_two_tasks() {
        let tasks = [Task::new("T1", 1, 4), Task::new("T2", 2, 6)];
        let report = simulate(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert!(report.completed());
        assert_eq!(report.horizon, 13);
        assert_eq!(events(&report), [
            Running("T1"), Running("T2"), Running("T2"), Idle,
            Running("T1"), Idle, Running("T2"), Running("T2"),
            Running("T1"), Idle, Idle, Idle,
            Running("T1")
        ]);

        for (time, slot) in report.slots.iter().enumerate() {
            assert_eq!(slot.time, time as Time);
        }
    }

    #[test]
    fn miss_stops_the_run() {
        let tasks = [Task::new("T1", 2, 4), Task::new("T2", 3, 6)];
        let report = simulate(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert_eq!(report.verdict, Verdict::Missed(Miss { task: "T2", time: 6 }));
        assert_eq!(events(&report), [
            Running("T1"), Running("T1"), Running("T2"),
            Running("T2"), Running("T1"), Running("T1")
        ]);

        let mut sim = Simulation::new(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();
        assert_eq!(sim.by_ref().filter_map(Result::err).next(), Some(Miss { task: "T2", time: 6 }));
        assert!(sim.next().is_none());
    }

    #[test]
    fn earliest_deadline_fills_full_utilization() {
        let tasks = [Task::new("T1", 2, 4), Task::new("T2", 3, 6)];
        let report = simulate(&tasks, &[], Policy::EarliestDeadline, &Service::None).unwrap();

        assert!(report.completed());
        assert!(report.slots[.. 12].iter().all(|slot| slot.event != Idle));
    }

    #[test]
    fn releases_advance_by_exactly_one_period() {
        let tasks = [
            Task::new("T1", 1, 4).with_release(1),
            Task::new("T2", 2, 6).with_release(3),
            Task::new("T3", 1, 12).with_deadline(9)
        ];

        for policy in Policy::ALL {
            let mut sim = Simulation::new(&tasks, &[], policy, &Service::None).unwrap();
            let mut releases = sim.jobs().iter().map(|job| job.release).collect::<Vec<_>>();

            while let Some(slot) = sim.next() {
                assert!(slot.is_ok(), "{policy}");

                for ((job, task), release) in sim.jobs().iter().zip(&tasks).zip(&mut releases) {
                    if job.release != *release {
                        assert_eq!(job.release, *release + task.period, "{policy}");
                        assert_eq!(job.deadline, job.release + task.deadline, "{policy}");
                        *release = job.release;
                    }
                }
            }
        }
    }

    #[test]
    fn infeasible_sets_never_start() {
        let tasks = [Task::new("T1", 3, 4), Task::new("T2", 3, 6)];

        assert!(matches!(
            Simulation::new(&tasks, &[], Policy::EarliestDeadline, &Service::None),
            Err(Error::Infeasible { .. })
        ));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let dup = [Task::new("T1", 1, 4), Task::new("T1", 1, 5)];
        assert!(matches!(
            Simulation::new(&dup, &[], Policy::RateMonotonic, &Service::None),
            Err(Error::InvalidTask { reason: "duplicate identifier", .. })
        ));

        let tasks = [Task::new("T1", 1, 4)];
        let service = Service::Polling(Server::new("T1", 5, 1));
        assert!(matches!(
            Simulation::new(&tasks, &[], Policy::RateMonotonic, &service),
            Err(Error::InvalidServer { .. })
        ));

        let empty = [Aperiodic::new("A1", 0, 0)];
        assert!(matches!(
            Simulation::new(&tasks, &empty, Policy::RateMonotonic, &Service::Background),
            Err(Error::InvalidTask { .. })
        ));
    }

    #[test]
    fn background_uses_idle_units_only() {
        let tasks = [Task::new("T1", 2, 10)];
        let aperiodic = [Aperiodic::new("A1", 3, 4)];
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &Service::Background).unwrap();

        assert!(report.completed());
        assert_eq!(events(&report), [
            Running("T1"), Running("T1"), Idle,
            Background("A1"), Background("A1"), Background("A1"), Background("A1"),
            Idle, Idle, Idle,
            Running("T1")
        ]);
    }

    #[test]
    fn aperiodic_jobs_ignored_without_service() {
        let tasks = [Task::new("T1", 2, 10)];
        let aperiodic = [Aperiodic::new("A1", 3, 4)];
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &Service::None).unwrap();

        assert!(report.slots.iter().all(|slot| !matches!(slot.event, Background(_))));
    }

    #[test]
    fn polling_server_serves_only_what_was_pending() {
        let tasks = [Task::new("T1", 2, 10)];
        let aperiodic = [Aperiodic::new("A1", 1, 3)];
        let service = Service::Polling(Server::new("S", 5, 2));
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &service).unwrap();

        assert!(report.completed());
        assert_eq!(events(&report), [
            Running("T1"), Running("T1"), Idle, Idle, Idle,
            Serving { server: "S", job: "A1", budget: 2 },
            Serving { server: "S", job: "A1", budget: 1 },
            Idle, Idle, Idle,
            Serving { server: "S", job: "A1", budget: 1 }
        ]);
    }

    #[test]
    fn deferrable_server_keeps_budget_for_late_arrivals() {
        let tasks = [Task::new("T1", 2, 10)];
        let aperiodic = [Aperiodic::new("A1", 1, 3)];
        let service = Service::Deferrable(Server::new("S", 5, 2));
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &service).unwrap();

        assert!(report.completed());
        assert_eq!(events(&report), [
            Running("T1"),
            Serving { server: "S", job: "A1", budget: 2 },
            Serving { server: "S", job: "A1", budget: 1 },
            Running("T1"), Idle,
            Serving { server: "S", job: "A1", budget: 2 },
            Idle, Idle, Idle, Idle,
            Running("T1")
        ]);
    }

    #[test]
    fn deferrable_budget_resets_every_period() {
        let tasks = [Task::new("T1", 1, 4), Task::new("T2", 1, 6)];
        let aperiodic = [
            Aperiodic::new("A1", 0, 5),
            Aperiodic::new("A2", 7, 2),
            Aperiodic::new("A3", 9, 6)
        ];
        let server = Server::new("S", 3, 1);
        let service = Service::Deferrable(server.clone());
        let mut sim = Simulation::new(&tasks, &aperiodic, Policy::EarliestDeadline, &service).unwrap();

        let mut served = vec![0; 8];

        while let Some(slot) = sim.next() {
            let slot = slot.unwrap();

            if slot.time % server.period == 0 {
                let budget = sim.jobs()[2].remaining + Time::from(matches!(slot.event, Serving { .. }));
                assert_eq!(budget, server.budget);
            }

            if let Serving { .. } = slot.event {
                served[usize::try_from(slot.time / server.period).unwrap()] += 1;
            }
        }

        assert!(served.iter().all(|&n| n <= server.budget));
        assert!(served.iter().sum::<Time>() > 0);
    }

    #[test]
    fn server_deadline_is_exempt() {
        // the server is never selected, so its own deadline passes repeatedly
        let tasks = [Task::new("T1", 1, 2)];
        let service = Service::Deferrable(Server::new("S", 4, 1));
        let report = simulate(&tasks, &[], Policy::EarliestDeadline, &service).unwrap();

        assert!(report.completed());
        assert_eq!(report.slots.len(), 5);
    }

    #[test]
    fn extension_adds_whole_hyperperiods() {
        let tasks = [Task::new("T1", 1, 4), Task::new("T2", 2, 6)];
        let sim = Simulation::new(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert_eq!(sim.hyperperiod(), 12);
        assert_eq!(sim.extend(2).horizon(), 37);
    }

    #[test]
    fn misaligned_phases_fall_back_to_hyperperiod() {
        let tasks = [Task::new("T1", 1, 4), Task::new("T2", 1, 6).with_release(1)];
        let report = simulate(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert!(!report.alignment.is_aligned());
        assert_eq!(report.horizon, 13);
    }
}
