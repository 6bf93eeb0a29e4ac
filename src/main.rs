#![warn(clippy::pedantic)]

use rtsim::{
    task::{Server, Time},
    load::TaskSet,
    policy::Policy,
    server::{Service, ServerKind},
    sim::Simulation,
    gen, bound, trace, Error
};

use clap::{Parser, ValueEnum};
use itertools::Itertools;
use log::warn;

use std::{
    ops::RangeInclusive,
    path::PathBuf,
    process::ExitCode,
    fs, thread, fmt
};

// normalized utility function
struct Nuf {
    range: RangeInclusive<usize>,
    gen: Box<dyn Fn(usize) -> f64 + Sync>
}

impl Nuf {
    #[allow(clippy::cast_precision_loss)]
    pub fn uniform() -> Self {
        Self {
            range: 2 ..= 10,
            gen: Box::new(|x| x as f64 / 10.0)
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn log() -> Self {
        Self {
            range: 1 ..= 32,
            gen: Box::new(|x| -(x as f64 / -8.0).exp_m1())
        }
    }

    pub fn gen(&self) -> impl Iterator<Item = f64> + '_ {
        self.range.clone().map(&self.gen)
    }

    pub fn len(&self) -> usize {
        self.range.end() - self.range.start() + 1
    }
}

/// Fraction of random task-sets that each policy schedules without a miss,
/// for every utilization produced by a [`Nuf`].
struct StatRunner<'a> {
    periods: &'static [Time],
    num_tasks: RangeInclusive<usize>,
    passes: usize,
    nuf: &'a Nuf
}

impl fmt::Display for StatRunner<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut results = vec![[0usize; Policy::ALL.len()]; self.nuf.len()];

        thread::scope(|s| {
            for (res, util) in results.iter_mut().zip(self.nuf.gen()) {
                s.spawn(move || {
                    let mut rng = rand::thread_rng();
                    let tasks = gen::Tasks::new(util, self.num_tasks.clone(), self.periods);

                    for _ in 0 .. self.passes {
                        let ts = tasks.gen(&mut rng);

                        for (count, policy) in res.iter_mut().zip(Policy::ALL) {
                            let schedulable = Simulation::new(&ts, &[], policy, &Service::None)
                                              .is_ok_and(|sim| sim.run().completed());

                            *count += usize::from(schedulable);
                        }
                    }
                });
            }
        });

        write!(f, "util\t{}", Policy::ALL.iter().join("\t"))?;

        for (util, counts) in self.nuf.gen().zip(results) {
            writeln!(f)?;
            write!(f, "{util:.3}\t{}", counts.iter()
                                              .map(|&n| n as f64 / self.passes as f64)
                                              .join("\t"))?;
        }

        Ok(())
    }
}

#[derive(Parser)]
#[command(version)]
enum Command {
    /// Simulate the task-set in a file
    Run {
        /// Task-set file
        file: PathBuf,
        #[arg(value_enum, short = 'p', long)]
        /// Priority policy for periodic tasks
        policy: Policy,
        #[arg(value_enum, short = 's', long)]
        /// Aperiodic service discipline
        server: Option<ServerKind>,
        #[arg(short = 'b', long)]
        /// Server budget per period (polling and deferrable only)
        budget: Option<Time>,
        #[arg(short = 't', long)]
        /// Server period (polling and deferrable only)
        period: Option<Time>,
        #[arg(long, default_value = "S")]
        /// Server name in the trace
        server_id: String,
        #[arg(short = 'x', long, default_value_t = 0)]
        /// Further hyperperiods to simulate past the computed horizon
        extend: Time,
        #[arg(short = 'g', long)]
        /// Draw a Gantt chart instead of listing every unit
        gantt: bool
    },
    /// Write a random task-set file
    Gen {
        #[arg(short = 'u')]
        /// Total utilization of the periodic tasks
        util: f64,
        #[arg(short = 'n', default_value_t = 4)]
        /// Number of periodic tasks
        num_tasks: usize,
        #[arg(value_enum, short = 'p', default_value_t = Length::Short)]
        /// Task period length class
        periods: Length,
        #[arg(short = 'a', default_value_t = 0)]
        /// Number of aperiodic jobs
        num_aperiodic: usize,
        #[arg(short = 'o')]
        /// Output file; standard output if absent
        out: Option<PathBuf>
    },
    /// Measure schedulability of random task-sets under every policy
    Sweep {
        #[arg(value_enum, short = 'p', default_value_t = Length::Short)]
        /// Task period length class
        periods: Length,
        #[arg(short = 'n', default_value_t = 10)]
        /// Maximum number of tasks per task-set
        max_tasks: usize,
        #[arg(short = 'r', default_value_t = 1_000)]
        /// Task-sets generated per utilization
        passes: usize,
        #[arg(short = 'u')]
        /// Generate log-scale utilizations instead of linear-scale
        log_nuf: bool
    }
}

#[derive(Clone, Copy, ValueEnum)]
#[repr(usize)]
enum Length {
    Short,
    Medium,
    Long
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Short  => write!(f, "short"),
            Length::Medium => write!(f, "medium"),
            Length::Long   => write!(f, "long")
        }
    }
}

struct RunArgs {
    file: PathBuf,
    policy: Policy,
    server: Option<ServerKind>,
    budget: Option<Time>,
    period: Option<Time>,
    server_id: String,
    extend: Time,
    gantt: bool
}

/// Returns whether the task-set completed without a deadline miss.
fn run(args: RunArgs) -> Result<bool, Error> {
    let ts = TaskSet::read(&args.file)?;

    println!("{}: {} periodic tasks, {} aperiodic jobs",
             args.file.display(), ts.periodic.len(), ts.aperiodic.len());

    let server = match (args.budget, args.period) {
        (Some(budget), Some(period)) => Some(Server::new(args.server_id, period, budget)),
        (None, None) => None,
        _ => return Err(Error::InvalidServer { reason: "budget and period must be given together" })
    };
    let service = Service::new(args.server, server)?;

    // DM coincides with RM on implicit deadlines, the only case the bound covers
    if args.policy.is_static() && bound::rate_monotonic(&ts.periodic) == Some(false) {
        warn!("utilization above the Liu & Layland bound; {} result decided by simulation", args.policy);
    }

    let sim = Simulation::new(&ts.periodic, &ts.aperiodic, args.policy, &service)?
              .extend(args.extend);

    match service.kind() {
        Some(kind) => println!("{} with {kind} service, {} units", args.policy, sim.horizon()),
        None => println!("{}, {} units", args.policy, sim.horizon())
    }

    if !sim.alignment().is_aligned() {
        println!("note: releases never coincide; only one hyperperiod is covered");
    }

    let report = sim.run();

    if args.gantt {
        println!("{}\n{}", trace::gantt(&report), report.verdict);
    } else {
        println!("{}", trace::listing(&report));
    }

    Ok(report.completed())
}

fn generate(
    util: f64,
    num_tasks: usize,
    periods: Length,
    num_aperiodic: usize,
    out: Option<PathBuf>
) -> Result<bool, Error> {
    let mut rng = rand::thread_rng();
    let tasks = gen::Tasks::try_new(util, num_tasks ..= num_tasks, gen::PERIODS[periods as usize])?;

    let ts = TaskSet {
        periodic: tasks.gen(&mut rng),
        aperiodic: gen::Aperiodics::new(num_aperiodic ..= num_aperiodic, 0 ..= 60, 1 ..= 5)
                   .gen(&mut rng)
    };

    if let Some(path) = out {
        fs::write(path, ts.to_string())?;
    } else {
        print!("{ts}");
    }

    Ok(true)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let result = match Command::parse() {
        Command::Run { file, policy, server, budget, period, server_id, extend, gantt } => {
            run(RunArgs { file, policy, server, budget, period, server_id, extend, gantt })
        },

        Command::Gen { util, num_tasks, periods, num_aperiodic, out } => {
            generate(util, num_tasks, periods, num_aperiodic, out)
        },

        Command::Sweep { periods, max_tasks, passes, log_nuf } => {
            let nuf = if log_nuf {
                Nuf::log()
            } else {
                Nuf::uniform()
            };

            println!("{}", StatRunner {
                periods: gen::PERIODS[periods as usize],
                num_tasks: 2 ..= max_tasks.max(2),
                passes,
                nuf: &nuf
            });

            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
