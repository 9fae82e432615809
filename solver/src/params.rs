//! Pool parameters and the compact pool notation.
//!
//! A parameter set describes one mechanic invocation: how many dice are in the
//! standard and bump sub-pools, which rank of the sorted roll is the set die,
//! which ranks are added as bonus dice, and how many extra dice are rolled into
//! one sub-pool and trimmed away again.
//!
//! ## Notation
//!
//! One parameter set per line, case-insensitive, whitespace-tolerant:
//!
//! ```text
//! [die]? N s M b @ K ( < E | > E )? ( +@ J )* ( # comment )?
//! ```
//!
//! `K` and every `J` are 1-indexed ranks into the ascending roll. `<E` rolls
//! `E` extra standard dice and drops the highest; `>E` rolls `E` extra bump
//! dice and drops the lowest. `[die]` names an override die in a [`DieMap`].

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::MAX_EXTRA_DICE;
use crate::dice::DieMap;
use crate::distribution::Distribution;
use crate::error::{NotationError, ParamsError};

/// A die with the name it is known by in notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedDie {
    name: String,
    die: Distribution,
}

impl NamedDie {
    pub fn new(name: impl Into<String>, die: Distribution) -> Result<Self, ParamsError> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains(['[', ']', '\n', '\r']) {
            return Err(ParamsError::InvalidDieName { name });
        }
        Ok(Self {
            name: trimmed.to_string(),
            die,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn die(&self) -> &Distribution {
        &self.die
    }
}

/// A validated, immutable parameter set.
///
/// Construct with [`Params::new`], [`ParamsBuilder`], or by parsing notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Params {
    num_std: usize,
    num_bump: usize,
    set_die: usize,
    bonus_dice: Vec<usize>,
    extra_std: usize,
    extra_bump: usize,
    comment: String,
    override_die: Option<NamedDie>,
}

impl Params {
    /// Parameter set with no bonus dice, extras, comment or override die.
    pub fn new(num_std: usize, num_bump: usize, set_die: usize) -> Result<Self, ParamsError> {
        ParamsBuilder::new(num_std, num_bump, set_die).build()
    }

    pub fn builder(num_std: usize, num_bump: usize, set_die: usize) -> ParamsBuilder {
        ParamsBuilder::new(num_std, num_bump, set_die)
    }

    pub fn num_std(&self) -> usize {
        self.num_std
    }

    pub fn num_bump(&self) -> usize {
        self.num_bump
    }

    /// Total dice kept after trimming.
    pub fn pool_size(&self) -> usize {
        self.num_std + self.num_bump
    }

    /// Zero-indexed rank of the set die.
    pub fn set_die(&self) -> usize {
        self.set_die
    }

    /// Zero-indexed ranks of the bonus dice, in the order given.
    pub fn bonus_dice(&self) -> &[usize] {
        &self.bonus_dice
    }

    pub fn extra_std(&self) -> usize {
        self.extra_std
    }

    pub fn extra_bump(&self) -> usize {
        self.extra_bump
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn override_die(&self) -> Option<&NamedDie> {
        self.override_die.as_ref()
    }

    /// The override die if there is one, otherwise `default`.
    pub fn die_or<'a>(&'a self, default: &'a Distribution) -> &'a Distribution {
        self.override_die
            .as_ref()
            .map(NamedDie::die)
            .unwrap_or(default)
    }

    /// Parse every non-blank line of `text`, yielding `(line number, result)`.
    /// Line numbers are 1-based.
    pub fn parse_notation_lines<'a>(
        text: &'a str,
        die_map: Option<&'a DieMap>,
    ) -> impl Iterator<Item = (usize, Result<Params, NotationError>)> + 'a {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(move |(i, line)| (i + 1, parse_line(line, die_map)))
    }

    /// Best-effort batch parse: yields every line that parses and validates,
    /// logs and skips the rest.
    pub fn parse_from_notation<'a>(
        text: &'a str,
        die_map: Option<&'a DieMap>,
    ) -> impl Iterator<Item = Params> + 'a {
        Self::parse_notation_lines(text, die_map).filter_map(|(line_no, result)| match result {
            Ok(params) => Some(params),
            Err(err) => {
                log::warn!("skipping notation line {}: {}", line_no, err);
                None
            }
        })
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(named) = &self.override_die {
            write!(f, "[{}]", named.name)?;
        }
        write!(f, "{}s{}b@{}", self.num_std, self.num_bump, self.set_die + 1)?;
        if self.extra_std > 0 {
            write!(f, "<{}", self.extra_std)?;
        } else if self.extra_bump > 0 {
            write!(f, ">{}", self.extra_bump)?;
        }
        for bonus_die in &self.bonus_dice {
            write!(f, "+@{}", bonus_die + 1)?;
        }
        if !self.comment.is_empty() {
            write!(f, "  # {}", self.comment)?;
        }
        Ok(())
    }
}

impl FromStr for Params {
    type Err = NotationError;

    /// Parse a single line. Override dice are rejected since there is no map.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s, None)
    }
}

/// Collects the fields of a [`Params`]; [`ParamsBuilder::build`] validates.
#[derive(Debug, Clone)]
pub struct ParamsBuilder {
    num_std: usize,
    num_bump: usize,
    set_die: usize,
    bonus_dice: Vec<usize>,
    extra_std: usize,
    extra_bump: usize,
    comment: String,
    override_die: Option<NamedDie>,
}

impl ParamsBuilder {
    pub fn new(num_std: usize, num_bump: usize, set_die: usize) -> Self {
        Self {
            num_std,
            num_bump,
            set_die,
            bonus_dice: Vec::new(),
            extra_std: 0,
            extra_bump: 0,
            comment: String::new(),
            override_die: None,
        }
    }

    pub fn bonus_die(mut self, rank: usize) -> Self {
        self.bonus_dice.push(rank);
        self
    }

    pub fn bonus_dice(mut self, ranks: impl IntoIterator<Item = usize>) -> Self {
        self.bonus_dice.extend(ranks);
        self
    }

    pub fn extra_std(mut self, extra: usize) -> Self {
        self.extra_std = extra;
        self
    }

    pub fn extra_bump(mut self, extra: usize) -> Self {
        self.extra_bump = extra;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn override_die(mut self, die: NamedDie) -> Self {
        self.override_die = Some(die);
        self
    }

    /// Validate and normalize. Extras are reduced by their common minimum so
    /// that at most one of them is non-zero.
    pub fn build(self) -> Result<Params, ParamsError> {
        if self.num_std < 1 {
            return Err(ParamsError::EmptyStandardPool {
                num_std: self.num_std,
            });
        }
        let pool_size =
            self.num_std
                .checked_add(self.num_bump)
                .ok_or(ParamsError::PoolTooLarge {
                    num_std: self.num_std,
                    num_bump: self.num_bump,
                })?;
        if self.set_die >= pool_size {
            return Err(ParamsError::SetDieOutOfRange {
                set_die: self.set_die,
                pool_size,
            });
        }
        if let Some(&bonus_die) = self.bonus_dice.iter().find(|&&rank| rank >= pool_size) {
            return Err(ParamsError::BonusDieOutOfRange {
                bonus_die,
                pool_size,
            });
        }

        let common = self.extra_std.min(self.extra_bump);
        let (extra_std, extra_bump) = (self.extra_std - common, self.extra_bump - common);
        for (field, extra) in [("extra_std", extra_std), ("extra_bump", extra_bump)] {
            if extra > MAX_EXTRA_DICE {
                return Err(ParamsError::TooManyExtraDice {
                    field,
                    extra,
                    max: MAX_EXTRA_DICE,
                });
            }
        }
        let comment = self
            .comment
            .trim()
            .replace(['\r', '\n'], " ");

        Ok(Params {
            num_std: self.num_std,
            num_bump: self.num_bump,
            set_die: self.set_die,
            bonus_dice: self.bonus_dice,
            extra_std,
            extra_bump,
            comment,
            override_die: self.override_die,
        })
    }
}

fn notation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)^(?:\[(?P<override>[^\]]+)\])?\s*",
            r"(?P<std>\+?[1-9]\d*)\s*s\s*",
            r"(?P<bump>(?:\+?[1-9]\d*)?\d)\s*b\s*",
            r"@\s*(?P<set>\+?[1-9]\d*)\s*",
            r"(?:<\s*(?P<ex_std>\+?[1-9]\d*)|>\s*(?P<ex_bump>\+?[1-9]\d*))?\s*",
            r"(?P<bonuses>(?:\+\s*@\s*\+?[1-9]\d*\s*)*)",
            r"(?:#\s*(?P<comment>.*))?$",
        ))
        .expect("notation regex is valid")
    })
}

fn bonus_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\+\s*@\s*\+?(?P<bonus>[1-9]\d*)").expect("bonus regex is valid")
    })
}

fn parse_number(text: &str) -> Result<usize, NotationError> {
    text.parse().map_err(|_| NotationError::NumberOutOfRange {
        text: text.to_string(),
    })
}

fn parse_line(line: &str, die_map: Option<&DieMap>) -> Result<Params, NotationError> {
    let line = line.trim();
    let caps = notation_re()
        .captures(line)
        .ok_or_else(|| NotationError::Malformed {
            line: line.to_string(),
        })?;

    let num_std = parse_number(&caps["std"])?;
    let num_bump = parse_number(&caps["bump"])?;
    // Notation ranks are 1-indexed; the regex guarantees they are >= 1.
    let set_die = parse_number(&caps["set"])? - 1;

    let mut builder = ParamsBuilder::new(num_std, num_bump, set_die);
    for bonus in bonus_re().captures_iter(&caps["bonuses"]) {
        builder = builder.bonus_die(parse_number(&bonus["bonus"])? - 1);
    }
    if let Some(extra) = caps.name("ex_std") {
        builder = builder.extra_std(parse_number(extra.as_str())?);
    }
    if let Some(extra) = caps.name("ex_bump") {
        builder = builder.extra_bump(parse_number(extra.as_str())?);
    }
    if let Some(comment) = caps.name("comment") {
        builder = builder.comment(comment.as_str());
    }

    let name = caps.name("override").map_or("", |m| m.as_str().trim());
    if !name.is_empty() {
        let map = die_map.ok_or_else(|| NotationError::NoDieMap {
            name: name.to_string(),
        })?;
        let die = map.get(name).ok_or_else(|| NotationError::UnknownDie {
            name: name.to_string(),
        })?;
        builder = builder.override_die(NamedDie::new(name, die.clone())?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_valid() {
        let p = Params::new(2, 1, 2).unwrap();
        assert_eq!(p.pool_size(), 3);
        assert_eq!(p.set_die(), 2);
        assert!(p.bonus_dice().is_empty());
        assert_eq!((p.extra_std(), p.extra_bump()), (0, 0));
    }

    #[test]
    fn test_empty_standard_pool_rejected_first() {
        // set_die is also out of range here, but num_std is reported.
        let err = Params::new(0, 0, 0).unwrap_err();
        assert_eq!(err, ParamsError::EmptyStandardPool { num_std: 0 });
        assert_eq!(err.field(), "num_std");
        assert!(err.to_string().contains("num_std"));

        let err = Params::builder(0, 3, 7).bonus_die(9).extra_std(2).build().unwrap_err();
        assert_eq!(err.field(), "num_std");
    }

    #[test]
    fn test_set_die_out_of_range() {
        let err = Params::new(1, 1, 2).unwrap_err();
        assert_eq!(
            err,
            ParamsError::SetDieOutOfRange {
                set_die: 2,
                pool_size: 2
            }
        );
        assert_eq!(err.field(), "set_die");
    }

    #[test]
    fn test_bonus_die_out_of_range() {
        let err = Params::builder(2, 0, 0).bonus_die(1).bonus_die(2).build().unwrap_err();
        assert_eq!(
            err,
            ParamsError::BonusDieOutOfRange {
                bonus_die: 2,
                pool_size: 2
            }
        );
        assert!(err.to_string().contains("bonus_dice"));
    }

    #[test]
    fn test_pool_size_overflow_rejected() {
        let err = Params::new(usize::MAX, 1, 0).unwrap_err();
        assert_eq!(
            err,
            ParamsError::PoolTooLarge {
                num_std: usize::MAX,
                num_bump: 1
            }
        );
        assert_eq!(err.field(), "num_bump");
        assert_eq!(Params::new(usize::MAX, 0, 0).unwrap().pool_size(), usize::MAX);
    }

    #[test]
    fn test_extra_dice_capped_after_normalization() {
        let err = Params::builder(1, 0, 0).extra_bump(usize::MAX).build().unwrap_err();
        assert_eq!(err.field(), "extra_bump");
        assert!(err.to_string().contains(&MAX_EXTRA_DICE.to_string()));

        let p = Params::builder(1, 0, 0)
            .extra_std(usize::MAX)
            .extra_bump(usize::MAX - 3)
            .build()
            .unwrap();
        assert_eq!((p.extra_std(), p.extra_bump()), (3, 0));
        assert!(Params::builder(1, 0, 0).extra_std(MAX_EXTRA_DICE).build().is_ok());
    }

    #[test]
    fn test_extras_normalized() {
        let p = Params::builder(2, 1, 0).extra_std(3).extra_bump(5).build().unwrap();
        assert_eq!((p.extra_std(), p.extra_bump()), (0, 2));
        let q = Params::builder(2, 1, 0).extra_std(4).extra_bump(4).build().unwrap();
        assert_eq!((q.extra_std(), q.extra_bump()), (0, 0));
        assert_eq!(q, Params::new(2, 1, 0).unwrap());
    }

    #[test]
    fn test_invalid_die_name() {
        let err = NamedDie::new("  ", Distribution::die(6)).unwrap_err();
        assert_eq!(err.field(), "override_die");
        assert!(NamedDie::new("a]b", Distribution::die(6)).is_err());
        assert_eq!(NamedDie::new(" d6 ", Distribution::die(6)).unwrap().name(), "d6");
    }

    #[test]
    fn test_parse_simple() {
        let p: Params = "2s1b@3".parse().unwrap();
        assert_eq!(p, Params::new(2, 1, 2).unwrap());
    }

    #[test]
    fn test_parse_full_line() {
        let map = DieMap::standard();
        let line = "  [d6] 3S0B @ 2 <2 +@1 + @ 3 # keep it low  ";
        let parsed: Vec<Params> = Params::parse_from_notation(line, Some(&map)).collect();
        assert_eq!(parsed.len(), 1);
        let p = &parsed[0];
        assert_eq!(p.num_std(), 3);
        assert_eq!(p.num_bump(), 0);
        assert_eq!(p.set_die(), 1);
        assert_eq!(p.bonus_dice(), &[0, 2]);
        assert_eq!(p.extra_std(), 2);
        assert_eq!(p.comment(), "keep it low");
        assert_eq!(p.override_die().unwrap().name(), "d6");
        assert_eq!(p.die_or(&Distribution::die(20)), &Distribution::die(6));
        assert_eq!(p.to_string(), "[d6]3s0b@2<2+@1+@3  # keep it low");
    }

    #[test]
    fn test_parse_plus_signs_and_extra_bump() {
        let p: Params = "+2s+10b@+12>+3+@+1".parse().unwrap();
        assert_eq!(p.num_std(), 2);
        assert_eq!(p.num_bump(), 10);
        assert_eq!(p.set_die(), 11);
        assert_eq!(p.extra_bump(), 3);
        assert_eq!(p.bonus_dice(), &[0]);
    }

    #[test]
    fn test_parse_batch_skips_bad_lines() {
        let map = DieMap::standard();
        let text = "1s0b@1\n\nnot notation\n2s0b@3\n[d7]1s0b@1\n1s1b@2 # ok\n";
        let lines: Vec<_> = Params::parse_notation_lines(text, Some(&map)).collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1].0, 3);
        assert!(matches!(lines[1].1, Err(NotationError::Malformed { .. })));
        assert!(matches!(
            lines[2].1,
            Err(NotationError::Invalid(ParamsError::SetDieOutOfRange { .. }))
        ));
        assert!(matches!(lines[3].1, Err(NotationError::UnknownDie { .. })));

        let parsed: Vec<Params> = Params::parse_from_notation(text, Some(&map)).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].to_string(), "1s0b@1");
        assert_eq!(parsed[1].to_string(), "1s1b@2  # ok");
    }

    #[test]
    fn test_parse_batch_survives_huge_numbers() {
        let max = usize::MAX;
        let text = format!("1s0b@1\n{max}s1b@1\n2s0b@2\n1s0b@1>{max}\n3s0b@1");
        let lines: Vec<_> = Params::parse_notation_lines(&text, None).collect();
        assert!(matches!(
            lines[1].1,
            Err(NotationError::Invalid(ParamsError::PoolTooLarge { .. }))
        ));
        assert!(matches!(
            lines[3].1,
            Err(NotationError::Invalid(ParamsError::TooManyExtraDice { .. }))
        ));

        let parsed: Vec<String> = Params::parse_from_notation(&text, None)
            .map(|p| p.to_string())
            .collect();
        assert_eq!(parsed, ["1s0b@1", "2s0b@2", "3s0b@1"]);
    }

    #[test]
    fn test_override_without_map() {
        let err = "[d6]1s0b@1".parse::<Params>().unwrap_err();
        assert!(matches!(err, NotationError::NoDieMap { .. }));
    }

    #[test]
    fn test_number_out_of_range() {
        let err = "99999999999999999999999s0b@1".parse::<Params>().unwrap_err();
        assert!(matches!(err, NotationError::NumberOutOfRange { .. }));
    }

    #[test]
    fn test_zero_indexed_translation_rejects_zero_rank() {
        assert!("1s0b@0".parse::<Params>().is_err());
        assert!("1s0b@1+@0".parse::<Params>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let map = DieMap::standard();
        let p = Params::builder(3, 2, 4)
            .bonus_dice([0, 0, 3])
            .extra_bump(7)
            .comment(" two\nlines ")
            .override_die(NamedDie::new("d10*2", map.get("d10*2").unwrap().clone()).unwrap())
            .build()
            .unwrap();
        assert_eq!(p.comment(), "two lines");
        let rendered = p.to_string();
        assert_eq!(rendered, "[d10*2]3s2b@5>7+@1+@1+@4  # two lines");
        let reparsed: Vec<Params> = Params::parse_from_notation(&rendered, Some(&map)).collect();
        assert_eq!(reparsed, vec![p]);
    }
}
