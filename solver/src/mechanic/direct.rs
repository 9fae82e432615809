//! Direct enumeration: every pair of (standard roll, bump roll) is tagged,
//! merged, sorted and resolved.

use super::Resolver;
use crate::distribution::Distribution;
use crate::error::OverflowError;
use crate::pool::{foreach, DicePool, Pool, TaggedDie};

pub fn evaluate(
    resolver: &Resolver<'_>,
    die: &Distribution,
) -> Result<Distribution, OverflowError> {
    let std_pool = DicePool::new(die, resolver.std_rolled())?;
    let bump_pool = DicePool::new(die, resolver.bump_rolled())?;

    let mut roll: Vec<TaggedDie> = Vec::with_capacity(std_pool.size() + bump_pool.size());
    foreach(&[&std_pool, &bump_pool], |rolls| {
        roll.clear();
        roll.extend(rolls[0].iter().map(|&outcome| (outcome, Pool::Standard)));
        roll.extend(rolls[1].iter().map(|&outcome| (outcome, Pool::Bump)));
        roll.sort_unstable();
        resolver.resolve(resolver.trim(&roll))
    })
}
