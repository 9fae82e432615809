//! Dice pools: every sorted roll of N dice together with its multinomial weight.
//!
//! A pool of `n` dice drawn from a die with face counts `w_i` has one entry per
//! distinct sorted roll. The weight of a roll showing face `i` exactly `k_i`
//! times is
//!
//! ```text
//! n! / (k_1! * k_2! * ...) * w_1^k_1 * w_2^k_2 * ...
//! ```
//!
//! so the weights of a pool always sum to `die.total()^n`. Building a pool
//! fails when that sum does not fit in a `u128`.

use serde::Serialize;

use crate::distribution::{gcd, mul_counts, pow_counts, Distribution, Mixture, Term};
use crate::error::OverflowError;

/// Which sub-pool a die was rolled in. `Standard` sorts before `Bump`, which
/// is the tie-break between equal outcomes in a combined roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Standard,
    Bump,
}

/// One die in a combined roll: its outcome and the sub-pool it came from.
pub type TaggedDie = (i64, Pool);

/// All sorted rolls of a fixed number of dice.
#[derive(Debug, Clone)]
pub struct DicePool {
    size: usize,
    rolls: Vec<(Vec<i64>, u128)>,
}

impl DicePool {
    pub fn new(die: &Distribution, size: usize) -> Result<Self, OverflowError> {
        // Every partial weight below is bounded by the total.
        pow_counts(die.total(), size)?;
        let faces: Vec<(i64, u128)> = die.iter().collect();
        // (roll so far, weight so far, dice still to place)
        let mut partial: Vec<(Vec<i64>, u128, usize)> = vec![(Vec::with_capacity(size), 1, size)];

        for (i, &(face, count)) in faces.iter().enumerate() {
            let last = i + 1 == faces.len();
            let mut next = Vec::with_capacity(partial.len() * (size + 1));
            for (roll, weight, remaining) in partial {
                let lowest = if last { remaining } else { 0 };
                for k in lowest..=remaining {
                    let mut extended = roll.clone();
                    extended.extend(std::iter::repeat(face).take(k));
                    let w = mul_counts(weight, binomial(remaining, k)?)?;
                    let w = mul_counts(w, pow_counts(count, k)?)?;
                    next.push((extended, w, remaining - k));
                }
            }
            partial = next;
        }

        let rolls = partial
            .into_iter()
            .filter(|(_, _, remaining)| *remaining == 0)
            .map(|(roll, weight, _)| (roll, weight))
            .collect();

        Ok(Self { size, rolls })
    }

    /// Number of dice in each roll.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sorted (ascending) rolls with their weights.
    pub fn rolls(&self) -> &[(Vec<i64>, u128)] {
        &self.rolls
    }

    pub fn total_weight(&self) -> u128 {
        self.rolls.iter().map(|(_, weight)| weight).sum()
    }
}

/// Combine independent pools through a callback.
///
/// `f` is called once for every element of the cartesian product of the
/// pools' rolls (one sorted roll per pool, in the order the pools are given).
/// Each returned [`Term`] is weighted by the product of the roll weights.
/// The first error from `f` or from the weights stops the enumeration.
pub fn foreach<F>(pools: &[&DicePool], mut f: F) -> Result<Distribution, OverflowError>
where
    F: FnMut(&[&[i64]]) -> Result<Term, OverflowError>,
{
    let mut mixture = Mixture::new();
    if pools.iter().any(|pool| pool.rolls.is_empty()) {
        return Ok(mixture.finish());
    }

    let mut indices = vec![0usize; pools.len()];
    let mut selected: Vec<&[i64]> = Vec::with_capacity(pools.len());
    loop {
        selected.clear();
        let mut weight = 1u128;
        for (pool, &i) in pools.iter().zip(&indices) {
            let (roll, w) = &pool.rolls[i];
            selected.push(roll.as_slice());
            weight = mul_counts(weight, *w)?;
        }
        let term = f(&selected)?;
        mixture.push(&term, weight)?;

        // Odometer step, rightmost pool fastest.
        let mut pos = pools.len();
        loop {
            if pos == 0 {
                return Ok(mixture.finish());
            }
            pos -= 1;
            indices[pos] += 1;
            if indices[pos] < pools[pos].rolls.len() {
                break;
            }
            indices[pos] = 0;
        }
    }
}

/// C(n, k). Fails only when the result itself does not fit.
pub(crate) fn binomial(n: usize, k: usize) -> Result<u128, OverflowError> {
    if k > n {
        return Ok(0);
    }
    let k = k.min(n - k);
    let mut result: u128 = 1;
    for i in 0..k {
        // result * (n - i) is divisible by i + 1; cancel the common factor
        // first so the product never exceeds C(n, i + 1).
        let numer = (n - i) as u128;
        let denom = (i + 1) as u128;
        let common = gcd(result, denom);
        result = mul_counts(result / common, numer / (denom / common))?;
    }
    Ok(result)
}

/// Number of distinct sorted rolls of `size` dice with `faces` faces:
/// C(faces + size - 1, size).
pub fn roll_count(faces: usize, size: usize) -> Result<u128, OverflowError> {
    match (faces, size) {
        (_, 0) => Ok(1),
        (0, _) => Ok(0),
        _ => {
            let n = faces.checked_add(size - 1).ok_or(OverflowError::Count)?;
            binomial(n, size)
        }
    }
}
