//! Schedulability bounds and tests.

use crate::{
    task::{Set, Task},
    error::{Error, Result}
};

use num_order::NumOrd;

/// Tests whether task-set `ts` passes the utilization bound, i.e. whether its
/// total utilization is no greater than `1`.
///
/// This is necessary for every uniprocessor scheduler and sufficient for EDF
/// and LLF with implicit deadlines; for the static-priority policies it only
/// rules task-sets out.
pub fn feasible(ts: impl Set) -> bool {
    ts.utilization().num_le(&1usize)
}

/// Tests whether task-set `ts` still passes the utilization bound once the
/// capacity `reserved` (typically a server) is set aside.
pub fn feasible_with(ts: impl Set, reserved: impl Set) -> bool {
    let mut utilization = ts.utilization();
    utilization += reserved.utilization();

    utilization.num_le(&1usize)
}

/// Admission test run before every simulation.
///
/// # Errors
///
/// Returns [`Error::Infeasible`] with the exact utilization if `ts` fails
/// [`feasible`].
pub fn admit(ts: impl Set + Copy) -> Result<()> {
    if feasible(ts) {
        Ok(())
    } else {
        Err(Error::Infeasible { utilization: ts.utilization().canonicalize() })
    }
}

/// Liu & Layland utilization bound for `n` tasks under rate-monotonic
/// scheduling, `n (2^(1/n) - 1)`.
#[allow(clippy::cast_precision_loss)]
pub fn liu_layland(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }

    let n = n as f64;
    n * (2f64.powf(n.recip()) - 1.0)
}

/// Tests whether implicit-deadline task-set `ts` is guaranteed schedulable
/// under rate-monotonic scheduling by the Liu & Layland bound.
///
/// Returns `None` if `ts` is not implicit; a `false` result is inconclusive.
#[allow(clippy::cast_precision_loss)]
pub fn rate_monotonic(ts: &[Task]) -> Option<bool> {
    ts.implicit().then(|| {
        let utilization = ts.iter()
                            .map(|t| t.cost as f64 / t.period as f64)
                            .sum::<f64>();

        utilization <= liu_layland(ts.len())
    })
}
