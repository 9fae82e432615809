//! Bumpity pool mechanics: one outcome distribution per parameter set.
//!
//! A roll of the standard and bump sub-pools is tagged, sorted ascending
//! (standard before bump on ties), trimmed of the extra dice and resolved:
//!
//! | Step | Rule |
//! |------|------|
//! | trim | drop the `extra_std` highest or the `extra_bump` lowest entries |
//! | check | the die at rank `set_die`; if it came from the bump pool, the next rank up (wrapping) |
//! | wrap bonus | if the check die wrapped below `set_die`, the `set_die` outcome is added too |
//! | bonus | outcomes at every `bonus_dice` rank |
//! | extra bonus | `-2` per extra standard die beyond the pool size, `+2` per extra bump die |
//! | explosions | correction for the check outcome, see [`crate::explode`] |
//!
//! Two independent strategies compute the same distribution:
//! [`direct`] enumerates both pools and sorts every combined roll, while
//! [`state_machine`] assembles sorted rolls face by face. Each can add
//! explosions "fudged" (the aggregate correction added once, independent of
//! the check outcome) or "exact" (the correction of each roll's own check
//! outcome).
//!
//! Results keep their full counts: a pool rolling `n` dice of total `t`
//! without explosions sums to `t^n` under every mechanic. Evaluation fails
//! with an [`OverflowError`] when that mass, or any outcome, leaves the range
//! of exact integers.

pub mod direct;
pub mod state_machine;

use std::fmt;
use std::str::FromStr;

use crate::distribution::{Distribution, Term};
use crate::error::{MechanicError, OverflowError};
use crate::explode::{ExplodeLimit, ExplosionCache, ExplosionTable};
use crate::params::Params;
use crate::pool::{Pool, TaggedDie};

/// How exploding dice are folded into a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Explosions {
    Fudged,
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    Direct,
    StateMachine,
}

/// Every way of computing a bumpity pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanic {
    DirectFudged,
    StateMachineFudged,
    StateMachineExact,
    DirectExact,
}

impl Mechanic {
    pub const ALL: [Mechanic; 4] = [
        Mechanic::DirectFudged,
        Mechanic::StateMachineFudged,
        Mechanic::StateMachineExact,
        Mechanic::DirectExact,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mechanic::DirectFudged => "direct-fudged",
            Mechanic::StateMachineFudged => "state-machine-fudged",
            Mechanic::StateMachineExact => "state-machine-exact",
            Mechanic::DirectExact => "direct-exact",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mechanic::DirectFudged => "Direct enumeration, explosions fudged within limit",
            Mechanic::StateMachineFudged => "State machine, explosions fudged within limit",
            Mechanic::StateMachineExact => "State machine, explosions accurately limited",
            Mechanic::DirectExact => "Direct enumeration, explosions accurately limited",
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            Mechanic::DirectFudged | Mechanic::DirectExact => Strategy::Direct,
            Mechanic::StateMachineFudged | Mechanic::StateMachineExact => Strategy::StateMachine,
        }
    }

    pub fn explosions(self) -> Explosions {
        match self {
            Mechanic::DirectFudged | Mechanic::StateMachineFudged => Explosions::Fudged,
            Mechanic::StateMachineExact | Mechanic::DirectExact => Explosions::Exact,
        }
    }

    /// The other strategy with the same explosion handling. The two must
    /// always agree.
    pub fn counterpart(self) -> Mechanic {
        match self {
            Mechanic::DirectFudged => Mechanic::StateMachineFudged,
            Mechanic::StateMachineFudged => Mechanic::DirectFudged,
            Mechanic::StateMachineExact => Mechanic::DirectExact,
            Mechanic::DirectExact => Mechanic::StateMachineExact,
        }
    }

    /// Evaluate using the process-wide explosion cache.
    pub fn evaluate(
        self,
        params: &Params,
        die: &Distribution,
        limit: ExplodeLimit,
    ) -> Result<Distribution, OverflowError> {
        self.evaluate_with(params, die, limit, ExplosionCache::global())
    }

    pub fn evaluate_with(
        self,
        params: &Params,
        die: &Distribution,
        limit: ExplodeLimit,
        cache: &ExplosionCache,
    ) -> Result<Distribution, OverflowError> {
        let table = match self.explosions() {
            Explosions::Exact => Some(cache.deltas_by_outcome(die, limit)?),
            Explosions::Fudged => None,
        };
        let resolver = Resolver::new(params, table.as_deref());

        let result = match self.strategy() {
            Strategy::Direct => direct::evaluate(&resolver, die)?,
            Strategy::StateMachine => state_machine::evaluate(&resolver, die)?,
        };

        match self.explosions() {
            Explosions::Fudged => result.checked_convolve(&*cache.aggregated_deltas(die, limit)?),
            Explosions::Exact => Ok(result),
        }
    }
}

impl fmt::Display for Mechanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mechanic {
    type Err = MechanicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Mechanic::ALL
            .into_iter()
            .find(|mechanic| mechanic.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| MechanicError::Unknown {
                name: s.to_string(),
                expected: Mechanic::ALL.map(Mechanic::name).join(", "),
            })
    }
}

/// Trimming and resolution rules shared by both strategies.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    params: &'a Params,
    extra_std: usize,
    extra_bump: usize,
    extra_bonus: i64,
    explosions: Option<&'a ExplosionTable>,
}

impl<'a> Resolver<'a> {
    /// Extras beyond the pool size are not rolled; each one is worth a flat
    /// `-2` (standard) or `+2` (bump) instead. [`Params`] caps the extras so
    /// the flat bonus fits in an `i64`.
    pub fn new(params: &'a Params, explosions: Option<&'a ExplosionTable>) -> Self {
        let pool_size = params.pool_size();
        let extra_std = params.extra_std().min(pool_size);
        let extra_bump = params.extra_bump().min(pool_size);
        let extra_bonus = if params.extra_std() > 0 {
            -2 * params.extra_std().saturating_sub(pool_size) as i64
        } else {
            2 * params.extra_bump().saturating_sub(pool_size) as i64
        };
        Self {
            params,
            extra_std,
            extra_bump,
            extra_bonus,
            explosions,
        }
    }

    pub fn params(&self) -> &'a Params {
        self.params
    }

    /// Standard dice actually rolled.
    pub fn std_rolled(&self) -> usize {
        self.params.num_std().saturating_add(self.extra_std)
    }

    /// Bump dice actually rolled.
    pub fn bump_rolled(&self) -> usize {
        self.params.num_bump().saturating_add(self.extra_bump)
    }

    pub fn extra_std(&self) -> usize {
        self.extra_std
    }

    pub fn extra_bump(&self) -> usize {
        self.extra_bump
    }

    pub fn extra_bonus(&self) -> i64 {
        self.extra_bonus
    }

    /// Drop the extra dice from a roll sorted ascending.
    pub fn trim<'r>(&self, sorted: &'r [TaggedDie]) -> &'r [TaggedDie] {
        if self.extra_std > 0 {
            &sorted[..sorted.len().saturating_sub(self.extra_std)]
        } else if self.extra_bump > 0 {
            &sorted[self.extra_bump.min(sorted.len())..]
        } else {
            sorted
        }
    }

    /// Total for one trimmed roll, as an outcome or (with exact explosions)
    /// a distribution.
    ///
    /// # Panics
    ///
    /// If the roll does not hold exactly one entry per pool die.
    pub fn resolve(&self, roll: &[TaggedDie]) -> Result<Term, OverflowError> {
        let params = self.params;
        assert_eq!(
            roll.len(),
            params.pool_size(),
            "trimmed roll {:?} does not match pool size {}",
            roll,
            params.pool_size()
        );

        let set_die = params.set_die();
        let check_die = match roll[set_die].1 {
            Pool::Standard => set_die,
            Pool::Bump => (set_die + 1) % roll.len(),
        };
        let check_outcome = roll[check_die].0;

        let wrap_bonus = (check_die < set_die).then_some(set_die);
        let mut total = check_outcome;
        for rank in wrap_bonus.iter().chain(params.bonus_dice()) {
            total = total.checked_add(roll[*rank].0).ok_or(OverflowError::Outcome)?;
        }
        total = total
            .checked_add(self.extra_bonus)
            .ok_or(OverflowError::Outcome)?;

        match self.explosions.and_then(|table| table.delta(check_outcome)) {
            Some(delta) => Ok(Term::Dist(delta.checked_shift(total)?)),
            None => Ok(Term::Outcome(total)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(entries: &[(i64, Pool)]) -> Vec<TaggedDie> {
        entries.to_vec()
    }

    #[test]
    fn test_names_round_trip() {
        for mechanic in Mechanic::ALL {
            assert_eq!(mechanic.name().parse::<Mechanic>().unwrap(), mechanic);
            assert_eq!(mechanic.counterpart().counterpart(), mechanic);
            assert_ne!(mechanic.counterpart().strategy(), mechanic.strategy());
            assert_eq!(mechanic.counterpart().explosions(), mechanic.explosions());
        }
        assert_eq!(" Direct-Exact ".parse::<Mechanic>().unwrap(), Mechanic::DirectExact);
        let err = "icepool".parse::<Mechanic>().unwrap_err();
        assert!(err.to_string().contains("direct-fudged"));
    }

    #[test]
    fn test_extra_bonus() {
        let p = Params::builder(2, 1, 0).extra_std(5).build().unwrap();
        let r = Resolver::new(&p, None);
        assert_eq!((r.extra_std(), r.extra_bump(), r.extra_bonus()), (3, 0, -4));
        assert_eq!(r.std_rolled(), 5);

        let p = Params::builder(1, 1, 0).extra_bump(3).build().unwrap();
        let r = Resolver::new(&p, None);
        assert_eq!((r.extra_std(), r.extra_bump(), r.extra_bonus()), (0, 2, 2));
        assert_eq!(r.bump_rolled(), 3);

        let p = Params::new(1, 1, 0).unwrap();
        assert_eq!(Resolver::new(&p, None).extra_bonus(), 0);
    }

    #[test]
    fn test_trim() {
        let roll = tagged(&[
            (1, Pool::Standard),
            (2, Pool::Bump),
            (3, Pool::Standard),
        ]);
        let p = Params::builder(2, 0, 0).extra_std(1).build().unwrap();
        assert_eq!(Resolver::new(&p, None).trim(&roll), &roll[..2]);
        let p = Params::builder(1, 1, 0).extra_bump(1).build().unwrap();
        assert_eq!(Resolver::new(&p, None).trim(&roll), &roll[1..]);
    }

    #[test]
    fn test_resolve_standard_and_bump() {
        let p = Params::builder(2, 1, 1).bonus_die(0).build().unwrap();
        let r = Resolver::new(&p, None);

        let roll = tagged(&[(1, Pool::Standard), (3, Pool::Standard), (5, Pool::Bump)]);
        assert_eq!(r.resolve(&roll), Ok(Term::Outcome(3 + 1)));

        // Bump at the set die moves the check up one rank.
        let roll = tagged(&[(1, Pool::Standard), (3, Pool::Bump), (5, Pool::Standard)]);
        assert_eq!(r.resolve(&roll), Ok(Term::Outcome(5 + 1)));
    }

    #[test]
    fn test_resolve_wrap_bonus() {
        let p = Params::new(1, 1, 1).unwrap();
        let r = Resolver::new(&p, None);
        let roll = tagged(&[(1, Pool::Standard), (2, Pool::Bump)]);
        // Check wraps to rank 0 and the set die outcome is added on top.
        assert_eq!(r.resolve(&roll), Ok(Term::Outcome(1 + 2)));
    }

    #[test]
    fn test_resolve_exact_explosion() {
        let d2 = Distribution::die(2);
        let table = ExplosionTable::compute(&d2, ExplodeLimit::Depth(1)).unwrap();
        let p = Params::new(1, 0, 0).unwrap();
        let r = Resolver::new(&p, Some(&table));
        let expected = table.delta(2).unwrap() + 2;
        assert_eq!(r.resolve(&tagged(&[(2, Pool::Standard)])), Ok(Term::Dist(expected)));
    }

    #[test]
    fn test_resolve_outcome_overflow() {
        let p = Params::builder(2, 0, 1).bonus_die(0).build().unwrap();
        let r = Resolver::new(&p, None);
        let roll = tagged(&[(1, Pool::Standard), (i64::MAX, Pool::Standard)]);
        assert_eq!(r.resolve(&roll), Err(OverflowError::Outcome));
        let roll = tagged(&[(-1, Pool::Standard), (i64::MAX, Pool::Standard)]);
        assert_eq!(r.resolve(&roll), Ok(Term::Outcome(i64::MAX - 1)));
    }

    #[test]
    #[should_panic(expected = "does not match pool size")]
    fn test_resolve_wrong_length_panics() {
        let p = Params::new(2, 0, 0).unwrap();
        Resolver::new(&p, None).resolve(&tagged(&[(1, Pool::Standard)]));
    }

    #[test]
    fn test_evaluate_with_exhausted_limit_modes_agree() {
        let cache = ExplosionCache::new();
        let d4 = Distribution::die(4);
        let p = Params::builder(2, 1, 1).extra_bump(1).build().unwrap();
        let fudged = Mechanic::DirectFudged.evaluate_with(&p, &d4, ExplodeLimit::NONE, &cache);
        let exact = Mechanic::DirectExact.evaluate_with(&p, &d4, ExplodeLimit::NONE, &cache);
        assert_eq!(fudged, exact);
        assert_eq!(fudged.unwrap().total(), 4u128.pow(4));
    }

    #[test]
    fn test_evaluate_reports_count_overflow() {
        let cache = ExplosionCache::new();
        let d2 = Distribution::die(2);
        let fits = Params::new(127, 0, 0).unwrap();
        let too_many = Params::new(64, 64, 0).unwrap();
        for mechanic in Mechanic::ALL {
            let result = mechanic.evaluate_with(&fits, &d2, ExplodeLimit::NONE, &cache);
            assert_eq!(result.map(|d| d.total()), Ok(1 << 127), "{mechanic}");
            let result = mechanic.evaluate_with(&too_many, &d2, ExplodeLimit::NONE, &cache);
            assert_eq!(result, Err(OverflowError::Count), "{mechanic}");
        }
    }
}
