//! Textual rendering of simulated schedules.

use crate::sim::{Event, Slot, Verdict, Report};

use itertools::Itertools;

use std::fmt::{self, Write};

impl fmt::Display for Event<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Running(task) => write!(f, "{task} running"),
            Event::Serving { server, job, budget } => write!(f, "{server} serving {job} (budget {budget})"),
            Event::Background(job) => write!(f, "{job} running in background"),
            Event::Idle => write!(f, "idle")
        }
    }
}

impl fmt::Display for Slot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.time, self.event)
    }
}

impl fmt::Display for Verdict<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Completed => write!(f, "scheduled successfully through the horizon"),
            Verdict::Missed(miss) => write!(f, "deadline missed for {} at {}", miss.task, miss.time)
        }
    }
}

/// One line per simulated unit, followed by the verdict.
pub fn listing(report: &Report) -> String {
    let mut out = report.slots.iter().join("\n");

    if !out.is_empty() {
        out.push('\n');
    }

    out.push_str(&report.verdict.to_string());
    out
}

/// Row of the chart that `event` is drawn in.
///
/// Units served by a server get their own row per aperiodic job, apart from
/// the units the same job ran in background.
fn row(event: &Event) -> String {
    match event {
        Event::Running(name) | Event::Background(name) => (*name).to_owned(),
        Event::Serving { server, job, .. } => format!("{job} (via {server})"),
        Event::Idle => "idle".to_owned()
    }
}

/// Renders `report` as a chart with one row per job that executed and one
/// column per unit of time.
///
/// Executing units are drawn as `#`, the instant of a missed deadline as `!`.
/// Rows appear in order of first appearance, with idle units in a row of
/// their own; the task that missed its deadline is always included.
pub fn gantt(report: &Report) -> String {
    let missed = match report.verdict {
        Verdict::Missed(miss) => Some(miss),
        Verdict::Completed => None
    };

    let cells = report.slots.iter()
                            .map(|slot| row(&slot.event))
                            .collect::<Vec<_>>();

    let names = cells.iter()
                     .map(String::as_str)
                     .chain(missed.map(|miss| miss.task))
                     .unique()
                     .collect::<Vec<_>>();

    let width = names.iter().map(|name| name.len()).max().unwrap_or(0);
    let mut out = String::new();

    // tens digit of the time every ten units
    let _ = write!(out, "{:width$} ", "");

    for slot in &report.slots {
        if slot.time % 10 == 0 {
            let _ = write!(out, "{}", (slot.time / 10) % 10);
        } else {
            out.push(' ');
        }
    }

    for name in names {
        let _ = write!(out, "\n{name:width$} ");

        for cell in &cells {
            out.push(if cell == name { '#' } else { '.' });
        }

        if missed.is_some_and(|miss| miss.task == name) {
            out.push('!');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sim::{simulate, Miss},
        task::{Task, Server, Aperiodic},
        policy::Policy,
        server::Service,
        timebase::Alignment
    };

    #[test]
    fn slot_lines() {
        let slots = [
            Slot { time: 0, event: Event::Running("T1") },
            Slot { time: 5, event: Event::Serving { server: "S", job: "A1", budget: 2 } },
            Slot { time: 7, event: Event::Background("A1") },
            Slot { time: 8, event: Event::Idle }
        ];

        assert_eq!(slots.iter().join("\n"), "0: T1 running\n\
                                              5: S serving A1 (budget 2)\n\
                                              7: A1 running in background\n\
                                              8: idle");
    }

    #[test]
    fn listing_ends_with_verdict() {
        let report = Report {
            slots: vec![Slot { time: 0, event: Event::Running("T2") }],
            verdict: Verdict::Missed(Miss { task: "T2", time: 1 }),
            horizon: 5,
            alignment: Alignment::At(0)
        };

        assert_eq!(listing(&report), "0: T2 running\ndeadline missed for T2 at 1");
    }

    #[test]
    fn gantt_rows() {
        let tasks = [Task::new("T1", 1, 4), Task::new("T2", 2, 6)];
        let report = simulate(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert_eq!(gantt(&report), "     0         1  \n\
                                    T1   #...#...#...#\n\
                                    T2   .##...##.....\n\
                                    idle ...#.#...###.");
    }

    #[test]
    fn gantt_marks_miss_and_served_jobs() {
        let tasks = [Task::new("T1", 2, 4), Task::new("T2", 3, 6)];
        let report = simulate(&tasks, &[], Policy::RateMonotonic, &Service::None).unwrap();

        assert!(gantt(&report).ends_with("T2 ..##..!"));

        let tasks = [Task::new("T1", 2, 10)];
        let aperiodic = [Aperiodic::new("A1", 1, 3)];
        let service = Service::Polling(Server::new("S", 5, 2));
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &service).unwrap();

        let chart = gantt(&report);
        assert!(chart.contains("\nidle       ..###..###."), "{chart}");
        assert!(chart.ends_with("\nA1 (via S) .....##...#"), "{chart}");

        let aperiodic = [Aperiodic::new("A1", 3, 4)];
        let report = simulate(&tasks, &aperiodic, Policy::RateMonotonic, &Service::Background).unwrap();

        assert!(gantt(&report).contains("\nA1   ...####...."));
    }
}
