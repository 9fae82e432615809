//! # Bumpity: exact outcome distributions for bumpity dice pools
//!
//! A bumpity pool rolls a *standard* and a *bump* sub-pool of the same die,
//! sorts the combined roll and reads the *set die* at a fixed rank. When the
//! die at that rank came from the bump pool the check moves one rank up,
//! wrapping around to the lowest die and adding the set die on top. Bonus
//! ranks, extra dice that are rolled and then trimmed, and exploding check
//! dice refine the result.
//!
//! Every result is an exact [`distribution::Distribution`] with integer counts.
//!
//! ## Module overview
//!
//! | Layer | Rust module | Description |
//! |-------|-------------|-------------|
//! | Counting | [`distribution`] | Outcome → count histograms, convolution, weighted mixtures |
//! | Counting | [`pool`] | Sorted rolls of N dice with multinomial weights; `foreach` over pools |
//! | Input | [`params`] | Validated parameter sets and the one-line pool notation |
//! | Input | [`dice`] | Named dice for `[name]` overrides, die expressions like `d10*2` |
//! | Core | [`explode`] | Exploding-die corrections and their cache |
//! | Core | [`mechanic`] | Direct and state-machine strategies, fudged or exact explosions |
//! | Service | [`batch`] | Parallel evaluation of many notation lines |
//! | Service | [`server`] | Axum JSON API |
//!
//! ## Example
//!
//! ```rust
//! use bumpity::distribution::Distribution;
//! use bumpity::explode::ExplodeLimit;
//! use bumpity::mechanic::Mechanic;
//! use bumpity::params::Params;
//!
//! // One standard and one bump d2, checking the higher die.
//! let params: Params = "1s1b@2".parse().unwrap();
//! let d2 = Distribution::die(2);
//! let result = Mechanic::DirectFudged.evaluate(&params, &d2, ExplodeLimit::NONE).unwrap();
//! assert_eq!(result, Distribution::from_counts([(2, 2), (3, 1), (4, 1)]));
//! ```

pub mod batch;
pub mod constants;
pub mod dice;
pub mod distribution;
pub mod env_config;
pub mod error;
pub mod explode;
pub mod mechanic;
pub mod params;
pub mod pool;
pub mod server;
