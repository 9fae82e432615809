//! Discrete outcome distributions with exact integer counts.
//!
//! A [`Distribution`] maps each outcome to the number of ways it can occur.
//! Counts are never normalized behind the caller's back: `{1: 1, 2: 1}` and
//! `{1: 2, 2: 2}` describe the same probabilities but are different values.
//! Use [`Distribution::lowest_terms`] when a canonical form is wanted.
//!
//! The total of every distribution fits in a `u128`. The `checked_*` methods
//! report counts or outcomes leaving their range as an [`OverflowError`]; the
//! operator impls panic instead and are meant for small, known-good values.
//!
//! [`Mixture`] is the aggregation primitive used by every mechanic: it collects
//! weighted branches, each either a single outcome or a whole sub-distribution,
//! and brings sub-distributions with different totals to a common denominator.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul};

use crate::error::OverflowError;

/// Outcome → count histogram. Outcomes with zero count are never stored.
///
/// # Example
///
/// ```rust
/// use bumpity::distribution::Distribution;
///
/// let d6 = Distribution::die(6);
/// let two_d6 = &d6 + &d6;
/// assert_eq!(two_d6.count(7), 6);
/// assert_eq!(two_d6.total(), 36);
/// assert!((two_d6.mean() - 7.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Distribution {
    counts: BTreeMap<i64, u128>,
}

impl Distribution {
    /// Build from `(outcome, count)` pairs. Repeated outcomes are summed and
    /// zero counts dropped.
    ///
    /// # Panics
    ///
    /// If the counts sum past `u128::MAX`.
    pub fn from_counts<I>(counts: I) -> Self
    where
        I: IntoIterator<Item = (i64, u128)>,
    {
        match Self::try_from_counts(counts) {
            Ok(dist) => dist,
            Err(err) => panic!("from_counts: {}", err),
        }
    }

    pub fn try_from_counts<I>(counts: I) -> Result<Self, OverflowError>
    where
        I: IntoIterator<Item = (i64, u128)>,
    {
        let mut map = BTreeMap::new();
        let mut total: u128 = 0;
        for (outcome, count) in counts {
            if count > 0 {
                total = total.checked_add(count).ok_or(OverflowError::Count)?;
                *map.entry(outcome).or_insert(0) += count;
            }
        }
        Ok(Self { counts: map })
    }

    /// Uniform die with faces `1..=sides`. A zero-sided die always shows 0.
    pub fn die(sides: u32) -> Self {
        if sides == 0 {
            return Self::constant(0);
        }
        Self::from_counts((1..=i64::from(sides)).map(|face| (face, 1)))
    }

    /// Point mass at `outcome` with count 1.
    pub fn constant(outcome: i64) -> Self {
        Self::from_counts([(outcome, 1)])
    }

    /// Sum of all counts.
    pub fn total(&self) -> u128 {
        self.counts.values().sum()
    }

    pub fn count(&self, outcome: i64) -> u128 {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }

    pub fn probability(&self, outcome: i64) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(outcome) as f64 / total as f64
    }

    /// `(outcome, count)` pairs in ascending outcome order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (i64, u128)> + '_ {
        self.counts.iter().map(|(&outcome, &count)| (outcome, count))
    }

    pub fn outcomes(&self) -> impl DoubleEndedIterator<Item = i64> + '_ {
        self.counts.keys().copied()
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Arithmetic mean. Zero for an empty distribution.
    pub fn mean(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let weighted: f64 = self
            .iter()
            .map(|(outcome, count)| outcome as f64 * count as f64)
            .sum();
        weighted / total as f64
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let mu = self.mean();
        let weighted: f64 = self
            .iter()
            .map(|(outcome, count)| {
                let diff = outcome as f64 - mu;
                diff * diff * count as f64
            })
            .sum();
        weighted / total as f64
    }

    /// Population standard deviation.
    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Shift every outcome by `delta`.
    pub fn checked_shift(&self, delta: i64) -> Result<Self, OverflowError> {
        self.map_outcomes(|outcome| outcome.checked_add(delta))
    }

    /// Multiply every outcome by `factor` (e.g. a d10 with doubled faces).
    pub fn checked_scale(&self, factor: i64) -> Result<Self, OverflowError> {
        self.map_outcomes(|outcome| outcome.checked_mul(factor))
    }

    /// Distribution of the sum of two independent draws.
    pub fn checked_convolve(&self, other: &Distribution) -> Result<Self, OverflowError> {
        self.combine_with(other, i64::checked_add)
    }

    /// Distribution of the product of two independent draws.
    pub fn checked_product(&self, other: &Distribution) -> Result<Self, OverflowError> {
        self.combine_with(other, i64::checked_mul)
    }

    /// Panicking form of [`Distribution::checked_shift`].
    pub fn shift(&self, delta: i64) -> Self {
        expect_in_range(self.checked_shift(delta))
    }

    /// Panicking form of [`Distribution::checked_scale`].
    pub fn scale(&self, factor: i64) -> Self {
        expect_in_range(self.checked_scale(factor))
    }

    /// Panicking form of [`Distribution::checked_convolve`].
    pub fn convolve(&self, other: &Distribution) -> Self {
        expect_in_range(self.checked_convolve(other))
    }

    /// Panicking form of [`Distribution::checked_product`].
    pub fn product(&self, other: &Distribution) -> Self {
        expect_in_range(self.checked_product(other))
    }

    fn map_outcomes(&self, f: impl Fn(i64) -> Option<i64>) -> Result<Self, OverflowError> {
        let mut counts = BTreeMap::new();
        for (outcome, count) in self.iter() {
            let mapped = f(outcome).ok_or(OverflowError::Outcome)?;
            // The total is unchanged, so the sums stay in range.
            *counts.entry(mapped).or_insert(0) += count;
        }
        Ok(Self { counts })
    }

    fn combine_with(
        &self,
        other: &Distribution,
        op: impl Fn(i64, i64) -> Option<i64>,
    ) -> Result<Self, OverflowError> {
        // Every count below is bounded by the product of the totals.
        mul_counts(self.total(), other.total())?;
        let mut counts = BTreeMap::new();
        for (a, ca) in self.iter() {
            for (b, cb) in other.iter() {
                let outcome = op(a, b).ok_or(OverflowError::Outcome)?;
                *counts.entry(outcome).or_insert(0) += ca * cb;
            }
        }
        Ok(Self { counts })
    }

    /// `{1: count(outcome), 0: everything else}`.
    pub fn indicator(&self, outcome: i64) -> Self {
        let hits = self.count(outcome);
        Self::from_counts([(1, hits), (0, self.total() - hits)])
    }

    /// Divide every count by the greatest common divisor of all counts.
    pub fn lowest_terms(&self) -> Self {
        let divisor = self.counts.values().fold(0, |acc, &count| gcd(acc, count));
        if divisor <= 1 {
            return self.clone();
        }
        Self {
            counts: self
                .counts
                .iter()
                .map(|(&outcome, &count)| (outcome, count / divisor))
                .collect(),
        }
    }
}

impl Add for &Distribution {
    type Output = Distribution;

    fn add(self, rhs: &Distribution) -> Distribution {
        self.convolve(rhs)
    }
}

impl Add for Distribution {
    type Output = Distribution;

    fn add(self, rhs: Distribution) -> Distribution {
        self.convolve(&rhs)
    }
}

impl Add<i64> for &Distribution {
    type Output = Distribution;

    fn add(self, rhs: i64) -> Distribution {
        self.shift(rhs)
    }
}

impl Add<i64> for Distribution {
    type Output = Distribution;

    fn add(self, rhs: i64) -> Distribution {
        self.shift(rhs)
    }
}

impl Mul<i64> for &Distribution {
    type Output = Distribution;

    fn mul(self, rhs: i64) -> Distribution {
        self.scale(rhs)
    }
}

impl Mul for &Distribution {
    type Output = Distribution;

    fn mul(self, rhs: &Distribution) -> Distribution {
        self.product(rhs)
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (outcome, count)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", outcome, count)?;
        }
        write!(f, "}}")
    }
}

/// What a combining callback produces for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// A single outcome.
    Outcome(i64),
    /// A whole sub-distribution, weighted as one branch.
    Dist(Distribution),
}

impl From<i64> for Term {
    fn from(outcome: i64) -> Self {
        Term::Outcome(outcome)
    }
}

impl From<Distribution> for Term {
    fn from(dist: Distribution) -> Self {
        Term::Dist(dist)
    }
}

/// Streaming accumulator of weighted branches.
///
/// Stored counts are kept scaled by `denominator`, the least common multiple
/// of the totals of every sub-distribution seen so far, so each branch
/// contributes exactly `weight` regardless of how many counts its
/// sub-distribution carries. The finished distribution does not depend on
/// push order.
#[derive(Debug, Clone)]
pub struct Mixture {
    counts: BTreeMap<i64, u128>,
    denominator: u128,
    total: u128,
}

impl Default for Mixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixture {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            denominator: 1,
            total: 0,
        }
    }

    pub fn push(&mut self, term: &Term, weight: u128) -> Result<(), OverflowError> {
        match term {
            Term::Outcome(outcome) => self.push_outcome(*outcome, weight),
            Term::Dist(dist) => self.push_distribution(dist, weight),
        }
    }

    pub fn push_outcome(&mut self, outcome: i64, weight: u128) -> Result<(), OverflowError> {
        if weight == 0 {
            return Ok(());
        }
        self.add(outcome, mul_counts(weight, self.denominator)?)
    }

    /// Add `dist` as one branch of weight `weight`. Empty distributions
    /// contribute nothing.
    ///
    /// On error the mixture is left partially updated and should be dropped.
    pub fn push_distribution(
        &mut self,
        dist: &Distribution,
        weight: u128,
    ) -> Result<(), OverflowError> {
        let total = dist.total();
        if weight == 0 || total == 0 {
            return Ok(());
        }
        let denominator = lcm(self.denominator, total).ok_or(OverflowError::Count)?;
        if denominator != self.denominator {
            let rescale = denominator / self.denominator;
            self.total = mul_counts(self.total, rescale)?;
            for count in self.counts.values_mut() {
                *count *= rescale;
            }
            self.denominator = denominator;
        }
        let per_count = mul_counts(weight, denominator / total)?;
        for (outcome, count) in dist.iter() {
            self.add(outcome, mul_counts(count, per_count)?)?;
        }
        Ok(())
    }

    fn add(&mut self, outcome: i64, count: u128) -> Result<(), OverflowError> {
        self.total = self.total.checked_add(count).ok_or(OverflowError::Count)?;
        *self.counts.entry(outcome).or_insert(0) += count;
        Ok(())
    }

    pub fn finish(self) -> Distribution {
        Distribution {
            counts: self.counts,
        }
    }
}

pub(crate) fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// `None` when the result does not fit.
pub(crate) fn lcm(a: u128, b: u128) -> Option<u128> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}

pub(crate) fn mul_counts(a: u128, b: u128) -> Result<u128, OverflowError> {
    a.checked_mul(b).ok_or(OverflowError::Count)
}

/// `base^exp` for counts. Bases 0 and 1 never overflow, whatever `exp`.
pub(crate) fn pow_counts(base: u128, exp: usize) -> Result<u128, OverflowError> {
    match (base, exp) {
        (_, 0) => Ok(1),
        (0 | 1, _) => Ok(base),
        _ => u32::try_from(exp)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
            .ok_or(OverflowError::Count),
    }
}

fn expect_in_range(result: Result<Distribution, OverflowError>) -> Distribution {
    match result {
        Ok(dist) => dist,
        Err(err) => panic!("distribution arithmetic: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts_merges_and_drops_zeros() {
        let d = Distribution::from_counts([(1, 2), (2, 0), (1, 3), (4, 1)]);
        assert_eq!(d.count(1), 5);
        assert_eq!(d.count(2), 0);
        assert_eq!(d.len(), 2);
        assert_eq!(d, Distribution::from_counts([(4, 1), (1, 5)]));
    }

    #[test]
    fn test_die() {
        let d20 = Distribution::die(20);
        assert_eq!(d20.total(), 20);
        assert_eq!(d20.outcomes().next(), Some(1));
        assert_eq!(d20.outcomes().next_back(), Some(20));
        assert_eq!(Distribution::die(0), Distribution::constant(0));
    }

    #[test]
    fn test_equality_is_structural() {
        let a = Distribution::from_counts([(1, 1), (2, 1)]);
        let b = Distribution::from_counts([(1, 2), (2, 2)]);
        assert_ne!(a, b);
        assert_eq!(a, b.lowest_terms());
    }

    #[test]
    fn test_convolution() {
        let d2 = Distribution::die(2);
        let sum = &d2 + &d2;
        assert_eq!(sum, Distribution::from_counts([(2, 1), (3, 2), (4, 1)]));
        assert_eq!(sum.clone() + Distribution::constant(0), sum);
    }

    #[test]
    fn test_shift_and_scale() {
        let d = Distribution::die(3);
        assert_eq!(&d + 2, Distribution::from_counts([(3, 1), (4, 1), (5, 1)]));
        assert_eq!(&d * 2, Distribution::from_counts([(2, 1), (4, 1), (6, 1)]));
        assert_eq!(&d * 0, Distribution::from_counts([(0, 3)]));
    }

    #[test]
    fn test_indicator_and_product() {
        let d4 = Distribution::die(4);
        let hit = d4.indicator(4);
        assert_eq!(hit, Distribution::from_counts([(0, 3), (1, 1)]));

        let scaled = &hit * &Distribution::die(2);
        assert_eq!(scaled, Distribution::from_counts([(0, 6), (1, 1), (2, 1)]));
    }

    #[test]
    fn test_mean_stdev() {
        let d2 = Distribution::die(2);
        assert!((d2.mean() - 1.5).abs() < 1e-12);
        assert!((d2.stdev() - 0.5).abs() < 1e-12);
        assert_eq!(Distribution::default().mean(), 0.0);
    }

    #[test]
    fn test_lowest_terms() {
        let d = Distribution::from_counts([(0, 6), (3, 9)]);
        assert_eq!(d.lowest_terms(), Distribution::from_counts([(0, 2), (3, 3)]));
        assert_eq!(Distribution::default().lowest_terms(), Distribution::default());
    }

    #[test]
    fn test_mixture_outcomes_only() {
        let mut m = Mixture::new();
        m.push_outcome(1, 3).unwrap();
        m.push(&Term::Outcome(2), 1).unwrap();
        m.push_outcome(1, 0).unwrap();
        assert_eq!(m.finish(), Distribution::from_counts([(1, 3), (2, 1)]));
    }

    #[test]
    fn test_mixture_common_denominator() {
        // One branch is a fixed 0, the other a fair coin over {1, 2}.
        let mut m = Mixture::new();
        m.push_outcome(0, 1).unwrap();
        m.push_distribution(&Distribution::die(2), 1).unwrap();
        assert_eq!(m.finish(), Distribution::from_counts([(0, 2), (1, 1), (2, 1)]));
    }

    #[test]
    fn test_mixture_order_independent() {
        let d3 = Distribution::die(3);
        let d2 = Distribution::die(2);

        let mut a = Mixture::new();
        a.push_outcome(5, 2).unwrap();
        a.push_distribution(&d3, 1).unwrap();
        a.push_distribution(&d2, 4).unwrap();

        let mut b = Mixture::new();
        b.push_distribution(&d2, 4).unwrap();
        b.push_distribution(&d3, 1).unwrap();
        b.push_outcome(5, 2).unwrap();

        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_display() {
        let d = Distribution::from_counts([(3, 1), (-1, 2)]);
        assert_eq!(d.to_string(), "{-1: 2, 3: 1}");
    }

    #[test]
    fn test_gcd_lcm() {
        assert_eq!(gcd(12, 18), 6);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(1, 20), Some(20));
        assert_eq!(lcm(u128::MAX, 2), None);
    }

    #[test]
    fn test_pow_counts() {
        assert_eq!(pow_counts(2, 127), Ok(1 << 127));
        assert_eq!(pow_counts(2, 128), Err(OverflowError::Count));
        assert_eq!(pow_counts(1, usize::MAX), Ok(1));
        assert_eq!(pow_counts(7, 0), Ok(1));
    }

    #[test]
    fn test_checked_outcome_overflow() {
        let d6 = Distribution::die(6);
        assert_eq!(d6.checked_scale(i64::MAX), Err(OverflowError::Outcome));
        assert_eq!(d6.checked_shift(i64::MAX - 5).unwrap().count(i64::MAX), 1);
        assert_eq!(d6.checked_shift(i64::MAX - 4), Err(OverflowError::Outcome));
        let huge = Distribution::constant(i64::MAX);
        assert_eq!(huge.checked_convolve(&d6), Err(OverflowError::Outcome));
    }

    #[test]
    fn test_checked_count_overflow() {
        let heavy = Distribution::from_counts([(0, 1 << 64), (1, 1 << 64)]);
        assert_eq!(heavy.checked_convolve(&heavy), Err(OverflowError::Count));
        assert_eq!(
            Distribution::try_from_counts([(0, u128::MAX), (1, 1)]),
            Err(OverflowError::Count)
        );

        let mut m = Mixture::new();
        m.push_outcome(0, u128::MAX).unwrap();
        assert_eq!(m.push_outcome(1, 1), Err(OverflowError::Count));
    }
}
