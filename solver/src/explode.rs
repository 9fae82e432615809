//! Exploding dice.
//!
//! When the die showing a trigger outcome `o` explodes it is re-rolled and the
//! new value added; a re-roll that shows `o` again may explode once more. The
//! [`ExplodeLimit`] bounds the chain, either by depth or by the probability of
//! reaching the next re-roll.
//!
//! For every outcome `o` of a die the per-outcome correction is
//!
//! ```text
//! D_o = indicator(o) * chain(o)
//! ```
//!
//! i.e. with the probability of `o` the exploded chain is added, otherwise 0.
//! The "fudged" aggregate correction mixes every `D_o` weighted by the count
//! of `o`, independent of what the pool actually rolled.
//!
//! Both are pure functions of `(die, limit)` and are memoized in an
//! [`ExplosionCache`]. Corrections whose counts overflow are reported, not
//! cached.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use crate::constants::MAX_EXPLODE_ROLLS;
use crate::distribution::{gcd, Distribution, Mixture};
use crate::error::{LimitError, OverflowError};

/// How far an explosion chain may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExplodeLimit {
    /// At most `n + 1` re-rolls: the first re-roll, then up to `n` more.
    Depth(u32),
    /// Keep re-rolling while the probability of reaching the next re-roll is
    /// at least `numer / denom`. Stored in lowest terms.
    Probability { numer: u64, denom: u64 },
}

impl Default for ExplodeLimit {
    fn default() -> Self {
        ExplodeLimit::NONE
    }
}

impl ExplodeLimit {
    /// No explosions at all.
    pub const NONE: ExplodeLimit = ExplodeLimit::Depth(0);

    pub fn probability(numer: u64, denom: u64) -> Result<Self, LimitError> {
        if denom == 0 {
            return Err(LimitError::ZeroDenominator {
                text: format!("{}/{}", numer, denom),
            });
        }
        let divisor = gcd(u128::from(numer), u128::from(denom)) as u64;
        Ok(ExplodeLimit::Probability {
            numer: numer / divisor,
            denom: denom / divisor,
        })
    }

    /// Exhausted limits produce no corrections.
    pub fn is_exhausted(&self) -> bool {
        match *self {
            ExplodeLimit::Depth(depth) => depth == 0,
            ExplodeLimit::Probability { numer, .. } => numer == 0,
        }
    }

    /// Number of re-rolls in a chain whose trigger occurs `hits` times out of
    /// `total`. Always at least 1.
    pub fn rerolls(&self, hits: u128, total: u128) -> u32 {
        let mut rerolls = 1;
        while self.continues_after(rerolls, hits, total) {
            if rerolls >= MAX_EXPLODE_ROLLS {
                log::debug!("explosion chain truncated at {} re-rolls ({})", rerolls, self);
                break;
            }
            rerolls += 1;
        }
        rerolls
    }

    /// Whether the `k`-th re-roll showing the trigger explodes again.
    fn continues_after(&self, k: u32, hits: u128, total: u128) -> bool {
        match *self {
            ExplodeLimit::Depth(depth) => k <= depth,
            ExplodeLimit::Probability { numer, denom } => {
                // A certain trigger never gets less likely: no progress.
                if hits >= total {
                    return false;
                }
                // P(trigger)^k >= numer / denom, exactly.
                let lhs = hits
                    .checked_pow(k)
                    .and_then(|p| p.checked_mul(u128::from(denom)));
                let rhs = total
                    .checked_pow(k)
                    .and_then(|p| p.checked_mul(u128::from(numer)));
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => lhs >= rhs,
                    _ => false,
                }
            }
        }
    }
}

impl fmt::Display for ExplodeLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExplodeLimit::Depth(depth) => write!(f, "{}", depth),
            ExplodeLimit::Probability { numer, denom } => write!(f, "{}/{}", numer, denom),
        }
    }
}

impl FromStr for ExplodeLimit {
    type Err = LimitError;

    /// `"3"` is a depth, `"1/10000"` a probability.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let malformed = || LimitError::Malformed {
            text: s.to_string(),
        };
        match text.split_once('/') {
            Some((numer, denom)) => {
                let numer: u64 = numer.trim().parse().map_err(|_| malformed())?;
                let denom: u64 = denom.trim().parse().map_err(|_| malformed())?;
                ExplodeLimit::probability(numer, denom).map_err(|_| LimitError::ZeroDenominator {
                    text: s.to_string(),
                })
            }
            None => text.parse().map(ExplodeLimit::Depth).map_err(|_| malformed()),
        }
    }
}

/// Total added by an exploding die that showed `trigger`: the first re-roll
/// plus every further re-roll the limit allows. Built bottom-up, deepest
/// re-roll first.
pub fn explosion_chain(
    die: &Distribution,
    trigger: i64,
    limit: ExplodeLimit,
) -> Result<Distribution, OverflowError> {
    let rerolls = limit.rerolls(die.count(trigger), die.total());
    let mut chain = die.clone();
    for _ in 1..rerolls {
        let deeper = chain.checked_shift(trigger)?;
        let mut mixture = Mixture::new();
        for (outcome, count) in die.iter() {
            if outcome == trigger {
                mixture.push_distribution(&deeper, count)?;
            } else {
                mixture.push_outcome(outcome, count)?;
            }
        }
        chain = mixture.finish();
    }
    Ok(chain)
}

/// Per-outcome corrections for one `(die, limit)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplosionTable {
    deltas: BTreeMap<i64, Distribution>,
}

impl ExplosionTable {
    pub fn compute(die: &Distribution, limit: ExplodeLimit) -> Result<Self, OverflowError> {
        if limit.is_exhausted() {
            return Ok(Self::default());
        }
        let deltas = die
            .outcomes()
            .map(|outcome| -> Result<(i64, Distribution), OverflowError> {
                let chain = explosion_chain(die, outcome, limit)?;
                let delta = die.indicator(outcome).checked_product(&chain)?.lowest_terms();
                Ok((outcome, delta))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { deltas })
    }

    /// Correction for a check die showing `outcome`, if it can explode.
    pub fn delta(&self, outcome: i64) -> Option<&Distribution> {
        self.deltas.get(&outcome)
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Mix every per-outcome correction, weighted by how often the die shows
    /// that outcome. `{0: 1}` when there are no corrections.
    pub fn aggregate(&self, die: &Distribution) -> Result<Distribution, OverflowError> {
        let zero = Distribution::constant(0);
        let mut mixture = Mixture::new();
        for (outcome, count) in die.iter() {
            mixture.push_distribution(self.delta(outcome).unwrap_or(&zero), count)?;
        }
        Ok(mixture.finish().lowest_terms())
    }
}

type CacheKey = (Distribution, ExplodeLimit);

/// Memoized explosion corrections keyed by `(die, limit)`.
///
/// Values never go stale since they are pure functions of their keys. Lookups
/// return shared `Arc`s: asking twice yields the same allocation. Two threads
/// missing the same key at once may both compute it; the first insert wins.
#[derive(Debug, Default)]
pub struct ExplosionCache {
    tables: RwLock<HashMap<CacheKey, Arc<ExplosionTable>>>,
    aggregates: RwLock<HashMap<CacheKey, Arc<Distribution>>>,
}

impl ExplosionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by [`crate::mechanic::Mechanic::evaluate`].
    pub fn global() -> &'static ExplosionCache {
        static GLOBAL: OnceLock<ExplosionCache> = OnceLock::new();
        GLOBAL.get_or_init(ExplosionCache::new)
    }

    pub fn deltas_by_outcome(
        &self,
        die: &Distribution,
        limit: ExplodeLimit,
    ) -> Result<Arc<ExplosionTable>, OverflowError> {
        get_or_compute(&self.tables, die, limit, || ExplosionTable::compute(die, limit))
    }

    pub fn aggregated_deltas(
        &self,
        die: &Distribution,
        limit: ExplodeLimit,
    ) -> Result<Arc<Distribution>, OverflowError> {
        get_or_compute(&self.aggregates, die, limit, || {
            self.deltas_by_outcome(die, limit)?.aggregate(die)
        })
    }

    /// Number of cached entries across both tables.
    pub fn len(&self) -> usize {
        read(&self.tables).len() + read(&self.aggregates).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        write(&self.tables).clear();
        write(&self.aggregates).clear();
    }
}

// Cached values are immutable once inserted, so a poisoned lock still guards
// consistent data.
fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn get_or_compute<V>(
    map: &RwLock<HashMap<CacheKey, Arc<V>>>,
    die: &Distribution,
    limit: ExplodeLimit,
    compute: impl FnOnce() -> Result<V, OverflowError>,
) -> Result<Arc<V>, OverflowError> {
    let key = (die.clone(), limit);
    if let Some(value) = read(map).get(&key) {
        return Ok(Arc::clone(value));
    }
    log::debug!("explosion cache miss: {} outcomes, limit {}", die.len(), limit);
    let computed = Arc::new(compute()?);
    Ok(Arc::clone(write(map).entry(key).or_insert(computed)))
}
