//! Defaults and hard limits shared by the library, the binaries and the API.

use crate::explode::ExplodeLimit;
use crate::mechanic::Mechanic;

/// Upper bound on re-rolls in one explosion chain, whatever the limit says.
/// Deeper chains only add outcomes with vanishing probability.
pub const MAX_EXPLODE_ROLLS: u32 = 16;

/// Largest `extra_std` or `extra_bump` a parameter set accepts: the flat
/// `±2` per extra die must stay within `i64`.
pub const MAX_EXTRA_DICE: usize = (i64::MAX / 2) as usize;

/// Most faces a die expression such as `d20` may ask for.
pub const MAX_DIE_SIDES: u32 = 10_000;

/// Die expression used when a notation line names no override.
pub const DEFAULT_DIE: &str = "d20";

/// Explosion limit of the command-line tool.
pub const DEFAULT_CLI_EXPLODE_LIMIT: ExplodeLimit = ExplodeLimit::Probability {
    numer: 1,
    denom: 10_000,
};

/// Explosion limit of the HTTP API. Coarser than the command-line default
/// to keep interactive requests fast.
pub const DEFAULT_API_EXPLODE_LIMIT: ExplodeLimit = ExplodeLimit::Probability {
    numer: 1,
    denom: 10,
};

pub const DEFAULT_MECHANIC: Mechanic = Mechanic::DirectFudged;

/// Largest number of sorted roll pairs (standard × bump) one API notation
/// line may enumerate. Bigger pools are reported as line errors.
pub const MAX_API_ENUMERATED_ROLLS: u128 = 2_000_000;

/// Port of the HTTP API unless `BUMPITY_PORT` says otherwise.
pub const DEFAULT_PORT: u16 = 9000;
