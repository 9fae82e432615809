//! Face-by-face assembly of sorted rolls.
//!
//! Faces are visited in a fixed scan order. At each face the state grows by
//! `k` standard and `j` bump entries showing that face, weighted by
//! `C(s, k)·w^k · C(b, j)·w^j` where `s`/`b` are the dice still unplaced and
//! `w` is the face count. Descending scans prepend, ascending scans append,
//! so the sequence is always sorted ascending with standard before bump on
//! ties. Once no dice are left the state is terminal: it is sliced, resolved
//! and dropped.
//!
//! The scan runs ascending only when extra standard dice are rolled, so the
//! entries to discard (the highest) end up at the tail.

use std::collections::HashMap;

use super::Resolver;
use crate::distribution::{mul_counts, pow_counts, Distribution, Mixture};
use crate::error::OverflowError;
use crate::pool::{binomial, Pool, TaggedDie};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Order {
    Ascending,
    Descending,
}

/// (sorted entries so far, standard dice left, bump dice left)
type State = (Vec<TaggedDie>, usize, usize);

pub fn evaluate(
    resolver: &Resolver<'_>,
    die: &Distribution,
) -> Result<Distribution, OverflowError> {
    // Every weight below is bounded by the total mass.
    let rolled = resolver.std_rolled().saturating_add(resolver.bump_rolled());
    pow_counts(die.total(), rolled)?;

    let order = if resolver.extra_std() > 0 {
        Order::Ascending
    } else {
        Order::Descending
    };
    let faces: Vec<(i64, u128)> = match order {
        Order::Ascending => die.iter().collect(),
        Order::Descending => die.iter().rev().collect(),
    };

    let mut finished = Mixture::new();
    let mut frontier: HashMap<State, u128> = HashMap::new();
    frontier.insert((Vec::new(), resolver.std_rolled(), resolver.bump_rolled()), 1);

    for (i, &(face, count)) in faces.iter().enumerate() {
        let last = i + 1 == faces.len();
        let mut next: HashMap<State, u128> = HashMap::with_capacity(frontier.len());

        for ((state, std_left, bump_left), weight) in frontier {
            // The last face takes every die still unplaced.
            let std_lowest = if last { std_left } else { 0 };
            let bump_lowest = if last { bump_left } else { 0 };
            for k in std_lowest..=std_left {
                let std_weight = mul_counts(weight, face_weight(std_left, k, count)?)?;
                for j in bump_lowest..=bump_left {
                    let w = mul_counts(std_weight, face_weight(bump_left, j, count)?)?;
                    let grown = next_state(order, &state, face, k, j);
                    let (std_rest, bump_rest) = (std_left - k, bump_left - j);
                    if std_rest == 0 && bump_rest == 0 {
                        let roll = slice(order, &grown, resolver);
                        finished.push(&resolver.resolve(roll)?, w)?;
                    } else {
                        let entry = next.entry((grown, std_rest, bump_rest)).or_insert(0);
                        *entry = entry.checked_add(w).ok_or(OverflowError::Count)?;
                    }
                }
            }
        }
        frontier = next;
    }

    Ok(finished.finish())
}

/// Weight of placing `placed` of `left` dice on a face with count `count`.
fn face_weight(left: usize, placed: usize, count: u128) -> Result<u128, OverflowError> {
    mul_counts(binomial(left, placed)?, pow_counts(count, placed)?)
}

fn next_state(
    order: Order,
    state: &[TaggedDie],
    face: i64,
    std_count: usize,
    bump_count: usize,
) -> Vec<TaggedDie> {
    let new_std = std::iter::repeat((face, Pool::Standard)).take(std_count);
    let new_bump = std::iter::repeat((face, Pool::Bump)).take(bump_count);
    let mut grown = Vec::with_capacity(state.len() + std_count + bump_count);
    match order {
        Order::Ascending => {
            grown.extend_from_slice(state);
            grown.extend(new_std);
            grown.extend(new_bump);
        }
        Order::Descending => {
            grown.extend(new_std);
            grown.extend(new_bump);
            grown.extend_from_slice(state);
        }
    }
    grown
}

/// Keep the first `pool_size` entries of an ascending scan, or the last
/// `pool_size` when extra bump dice were rolled.
fn slice<'r>(order: Order, roll: &'r [TaggedDie], resolver: &Resolver<'_>) -> &'r [TaggedDie] {
    let pool_size = resolver.params().pool_size();
    match order {
        Order::Ascending => &roll[..pool_size.min(roll.len())],
        Order::Descending if resolver.extra_bump() > 0 => {
            &roll[roll.len().saturating_sub(pool_size)..]
        }
        Order::Descending => roll,
    }
}
