//! Evaluate many parameter sets at once.
//!
//! Results come back in input order, one per parameter set: either a
//! [`PoolResult`] or the [`EvaluationError`] that stopped it. Evaluation runs
//! on the rayon pool; all workers share one [`ExplosionCache`].

use rayon::prelude::*;
use serde::Serialize;

use crate::dice::DieMap;
use crate::distribution::Distribution;
use crate::error::EvaluationError;
use crate::explode::{ExplodeLimit, ExplosionCache};
use crate::mechanic::{Mechanic, Resolver};
use crate::params::Params;
use crate::pool::roll_count;

/// One evaluated parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolResult {
    pub params: Params,
    pub distribution: Distribution,
}

/// Serializable view of a [`PoolResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolSummary {
    /// The comment, or the notation when there is none.
    pub label: String,
    pub notation: String,
    pub mean: f64,
    pub stdev: f64,
    pub rows: Vec<SummaryRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub outcome: i64,
    pub count: u128,
    pub probability: f64,
}

impl PoolResult {
    pub fn summary(&self) -> PoolSummary {
        let notation = self.params.to_string();
        let label = match self.params.comment() {
            "" => notation.clone(),
            comment => comment.to_string(),
        };
        let dist = &self.distribution;
        PoolSummary {
            label,
            notation,
            mean: dist.mean(),
            stdev: dist.stdev(),
            rows: dist
                .iter()
                .map(|(outcome, count)| SummaryRow {
                    outcome,
                    count,
                    probability: dist.probability(outcome),
                })
                .collect(),
        }
    }
}

/// Number of (standard roll, bump roll) pairs direct enumeration visits for
/// `params` on `die`. `None` when it does not even fit in a `u128`.
/// The state machine ends in one terminal state per such pair, so this
/// tracks the work of every mechanic.
pub fn enumeration_size(params: &Params, die: &Distribution) -> Option<u128> {
    let resolver = Resolver::new(params, None);
    let std_rolls = roll_count(die.len(), resolver.std_rolled()).ok()?;
    let bump_rolls = roll_count(die.len(), resolver.bump_rolled()).ok()?;
    std_rolls.checked_mul(bump_rolls)
}

/// Evaluate each parameter set with its override die, or `default_die`.
pub fn evaluate_params(
    params: Vec<Params>,
    default_die: &Distribution,
    limit: ExplodeLimit,
    mechanic: Mechanic,
    cache: &ExplosionCache,
) -> Vec<Result<PoolResult, EvaluationError>> {
    params
        .into_par_iter()
        .map(|params| {
            let die = params.die_or(default_die);
            match mechanic.evaluate_with(&params, die, limit, cache) {
                Ok(distribution) => {
                    log::debug!(
                        "{} evaluated {} -> {} outcomes",
                        mechanic,
                        params,
                        distribution.len()
                    );
                    Ok(PoolResult {
                        params,
                        distribution,
                    })
                }
                Err(source) => {
                    log::warn!("{} failed on {}: {}", mechanic, params, source);
                    Err(EvaluationError { params, source })
                }
            }
        })
        .collect()
}

/// Parse `notations` best-effort (bad lines are logged and skipped) and
/// evaluate every parameter set that survives.
pub fn evaluate_notations(
    notations: &str,
    die_map: &DieMap,
    default_die: &Distribution,
    limit: ExplodeLimit,
    mechanic: Mechanic,
    cache: &ExplosionCache,
) -> Vec<Result<PoolResult, EvaluationError>> {
    let params: Vec<Params> = Params::parse_from_notation(notations, Some(die_map)).collect();
    evaluate_params(params, default_die, limit, mechanic, cache)
}
