//! Random task-set generation.

use crate::{
    task::{Task, Aperiodic, Time},
    error::{Error, Result}
};

use rand::{
    distributions::{uniform::SampleRange, Bernoulli},
    seq::SliceRandom,
    Rng
};

use std::mem;

/// Candidate periods (short, medium, long).
///
/// Each class is closed under a small common multiple (12, 60 and 120
/// respectively), which bounds the hyperperiod of any generated task-set and
/// keeps simulations short.
pub const PERIODS: [&[Time]; 3] = [
    &[2, 3, 4, 6, 12],
    &[4, 5, 6, 10, 12, 15, 20, 30, 60],
    &[10, 12, 15, 20, 24, 30, 40, 60, 120]
];

/// Generator that implements Stafford's RandFixedSum.
struct Rfs {
    t: Box<[Box<[Bernoulli]>]>,
    s: f64,
    k: usize
}

impl Rfs {
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    fn new(length: usize, s: f64) -> Self {
        assert!(length > 0, "length must be nonzero");
        assert!((0.0 ..= length as f64).contains(&s), "s must be between 0 and length");

        let k = (s as usize).min(length - 1); // must have 0 <= k <= length-1
        let s = s.clamp(k as f64, (k+1) as f64);   // must have k <= s <= k+1

        // transition probability table; t[i][j] is only used where j <= i + 1

        let def = Bernoulli::from_ratio(1, 1).unwrap();

        let mut w = vec![0.0; length].into_boxed_slice();
        let mut t = (1 .. length).map(|l| vec![def; l + 1].into_boxed_slice())
                                 .collect::<Box<_>>();

        w[0] = f64::MAX;

        let delta = s - k as f64;

        for i in 1 .. length {
            let mut lastw = 0.0;

            for j in 0 .. i {
                let coe1 = (j as f64       + delta) / i as f64;
                let coe2 = ((i - j) as f64 - delta) / i as f64;

                let tmp1 = w[j]  * coe1;
                let tmp2 = lastw * coe2;

                lastw = mem::replace(&mut w[j], tmp1 + tmp2);

                t[i-1][j] = Bernoulli::new(if w[j] == 0.0 {
                    (coe1 >= 0.5).into()
                } else {
                    tmp2 / w[j]
                }).unwrap();
            }
        }

        Self { t, s, k }
    }

    /// Draws `length` values in `[0, 1]` summing to `s`.
    #[allow(clippy::cast_precision_loss)]
    fn gen(&self, rng: &mut impl Rng) -> Box<[f64]> {
        let length = self.t.len() + 1;

        let mut out = vec![0.0; length].into_boxed_slice();

        let mut sm = 0.0;
        let mut pr = 1.0;

        let mut j = self.k;

        for i in (1 .. length).rev() {
            let s = self.s - (self.k - j) as f64;
            let e = rng.sample(self.t[i-1][j]);                 // choose a transition
            let sx = rng.gen::<f64>().powf((i as f64).recip()); // next simplex coordinate
            sm += (1.0 - sx) * pr * s / (i + 1) as f64;
            pr *= sx;
            out[length - i] = f64::from(e).mul_add(pr, sm);
            j -= usize::from(e);
        }

        out[0] = (self.s - (self.k - j) as f64).mul_add(pr, sm);
        out.shuffle(rng);

        out
    }
}

/// Generator for periodic task-sets.
pub struct Tasks<R> {
    util: f64,
    num: R,
    periods: &'static [Time]
}

impl<R> Tasks<R> {
    /// Constructs a new `Tasks` with the given parameters.
    ///
    /// The task-set to be generated will have total utilization close to
    /// `util` (costs are rounded up to whole units). The number of tasks is
    /// chosen uniformly at random from `num` and each period uniformly from
    /// `periods`. Every task is released at `0` with implicit deadline.
    ///
    /// Per-task utilizations are picked uniformly at random among those
    /// summing to `util` using
    /// [Stafford's RandFixedSum](https://www.mathworks.com/matlabcentral/fileexchange/9700-random-vectors-with-fixed-sum).
    ///
    /// # Panics
    ///
    /// Panics if `util` is negative or not finite, or if `periods` is empty.
    pub fn new(util: f64, num: R, periods: &'static [Time]) -> Self {
        Self::try_new(util, num, periods).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Same as [`Tasks::new`], for parameters coming from the user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGenerator`] instead of panicking.
    pub fn try_new(util: f64, num: R, periods: &'static [Time]) -> Result<Self> {
        if !(util.is_finite() && util >= 0.0) {
            return Err(Error::InvalidGenerator("utilization must be a non-negative number"));
        }

        if periods.is_empty() {
            return Err(Error::InvalidGenerator("no candidate periods"));
        }

        Ok(Self { util, num, periods })
    }
}

impl<R> Tasks<R> where R: SampleRange<usize> + Clone {
    /// Runs the generator; tasks are named `T1`, `T2`, ...
    #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss,
            clippy::cast_possible_truncation)]
    pub fn gen(&self, rng: &mut impl Rng) -> Vec<Task> {
        // no task may exceed a utilization of 1
        let num = rng.gen_range(self.num.clone())
                     .max(self.util.ceil() as usize)
                     .max(1);

        let utils = Rfs::new(num, self.util).gen(rng);

        utils.iter().enumerate().map(|(i, u)| {
            let period = *self.periods.choose(&mut *rng).unwrap_or(&1);
            let cost = ((period as f64 * u).ceil() as Time).clamp(1, period);

            Task::new(format!("T{}", i + 1), cost, period)
        }).collect()
    }
}

/// Generator for aperiodic jobs.
pub struct Aperiodics<R1, R2, R3> {
    num: R1,
    release: R2,
    cost: R3
}

impl<R1, R2, R3> Aperiodics<R1, R2, R3> {
    /// Constructs a new `Aperiodics`; the number of jobs, their release times
    /// and their costs are each drawn uniformly from the given ranges.
    pub fn new(num: R1, release: R2, cost: R3) -> Self {
        Self { num, release, cost }
    }
}

impl<R1, R2, R3> Aperiodics<R1, R2, R3> where R1: SampleRange<usize> + Clone,
                                              R2: SampleRange<Time> + Clone,
                                              R3: SampleRange<Time> + Clone {
    /// Runs the generator; jobs are named `A1`, `A2`, ... in release order.
    pub fn gen(&self, rng: &mut impl Rng) -> Vec<Aperiodic> {
        let num = rng.gen_range(self.num.clone());

        let mut out = (0 .. num).map(|_| {
            (rng.gen_range(self.release.clone()), rng.gen_range(self.cost.clone()).max(1))
        }).collect::<Vec<_>>();

        out.sort_unstable();

        out.into_iter()
           .enumerate()
           .map(|(i, (release, cost))| Aperiodic::new(format!("A{}", i + 1), release, cost))
           .collect()
    }
}
