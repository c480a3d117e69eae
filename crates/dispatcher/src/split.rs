//! Traffic split between the two backends

use contracts::BackendId;

/// Item counts for one batch
///
/// Backend B takes the batch prefix `[0, to_b)`, backend A the suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitPlan {
    pub to_a: usize,
    pub to_b: usize,
}

impl SplitPlan {
    pub fn total(&self) -> usize {
        self.to_a + self.to_b
    }

    pub fn share(&self, backend: BackendId) -> usize {
        match backend {
            BackendId::A => self.to_a,
            BackendId::B => self.to_b,
        }
    }
}

/// Decide how many items each backend gets
///
/// - a single item goes to A when A is healthy, otherwise to B (whatever B's state)
/// - equal health: B gets `n / 2`, A the rest
/// - otherwise the unhealthy backend gets exactly one canary item
pub fn split_plan(batch_size: usize, a_healthy: bool, b_healthy: bool) -> SplitPlan {
    let to_b = match batch_size {
        0 => 0,
        1 if a_healthy => 0,
        1 => 1,
        n => match (a_healthy, b_healthy) {
            (true, true) | (false, false) => n / 2,
            (true, false) => 1,
            (false, true) => n - 1,
        },
    };

    SplitPlan {
        to_a: batch_size - to_b,
        to_b,
    }
}

/// Split a batch according to `plan`, returning `(for_a, for_b)`
///
/// Both halves keep the original order; `for_b` followed by `for_a` is the
/// original batch.
pub fn partition<T>(mut batch: Vec<T>, plan: SplitPlan) -> (Vec<T>, Vec<T>) {
    debug_assert_eq!(batch.len(), plan.total());
    let for_a = batch.split_off(plan.to_b.min(batch.len()));
    (for_a, batch)
}
