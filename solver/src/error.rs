//! Error types.
//!
//! Bad input is always a typed error, and so is a result too large for exact
//! integer counts. Broken internal invariants of the mechanics (a trimmed roll
//! of the wrong length) are not errors: they panic.

use thiserror::Error;

use crate::params::Params;

/// A parameter set failed validation. Nothing is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamsError {
    #[error("num_std must be at least 1 (got {num_std})")]
    EmptyStandardPool { num_std: usize },

    #[error("set_die must refer to a die within the pool of {pool_size} (got {set_die})")]
    SetDieOutOfRange { set_die: usize, pool_size: usize },

    #[error("bonus_dice must refer to dice within the pool of {pool_size} (got {bonus_die})")]
    BonusDieOutOfRange { bonus_die: usize, pool_size: usize },

    #[error("override die name {name:?} must be non-empty and free of brackets and line breaks")]
    InvalidDieName { name: String },

    #[error("num_std + num_bump does not fit in a pool ({num_std} + {num_bump})")]
    PoolTooLarge { num_std: usize, num_bump: usize },

    #[error("{field} must be at most {max} (got {extra})")]
    TooManyExtraDice {
        field: &'static str,
        extra: usize,
        max: usize,
    },
}

impl ParamsError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ParamsError::EmptyStandardPool { .. } => "num_std",
            ParamsError::SetDieOutOfRange { .. } => "set_die",
            ParamsError::BonusDieOutOfRange { .. } => "bonus_dice",
            ParamsError::InvalidDieName { .. } => "override_die",
            ParamsError::PoolTooLarge { .. } => "num_bump",
            ParamsError::TooManyExtraDice { field, .. } => *field,
        }
    }
}

/// One notation line could not be turned into a parameter set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("line does not match pool notation: {line:?}")]
    Malformed { line: String },

    #[error("override die [{name}] used but no die map was supplied")]
    NoDieMap { name: String },

    #[error("unknown override die [{name}]")]
    UnknownDie { name: String },

    #[error("number out of range: {text:?}")]
    NumberOutOfRange { text: String },

    #[error(transparent)]
    Invalid(#[from] ParamsError),
}

/// A die expression such as `d20` or `d10*2` could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DieError {
    #[error("malformed die expression {expr:?} (expected dN, dN*K, dN+K or dN-K)")]
    Malformed { expr: String },

    #[error("die expression {expr:?} is out of range")]
    OutOfRange { expr: String },
}

/// An explosion limit such as `3` or `1/10000` could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    #[error("malformed explosion limit {text:?} (expected a depth like 3 or a fraction like 1/10000)")]
    Malformed { text: String },

    #[error("explosion limit {text:?} has a zero denominator")]
    ZeroDenominator { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MechanicError {
    #[error("unknown mechanic {name:?} (expected one of: {expected})")]
    Unknown { name: String, expected: String },
}

/// Exact arithmetic left the range of its integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OverflowError {
    #[error("outcome counts overflow u128")]
    Count,

    #[error("outcome values overflow i64")]
    Outcome,
}

/// One parameter set could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot evaluate {params}: {source}")]
pub struct EvaluationError {
    pub params: Params,
    pub source: OverflowError,
}
