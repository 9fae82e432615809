//! Named dice and die expressions.
//!
//! Notation lines may pick a die other than the default with a bracketed name,
//! e.g. `[d6]2s1b@2`. Names are looked up strictly in a [`DieMap`]. The
//! command-line tool and the HTTP API accept die expressions (`d20`, `d10*2`,
//! `d6+1`) for the default die, parsed by [`parse_die`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::constants::MAX_DIE_SIDES;
use crate::distribution::Distribution;
use crate::error::DieError;

/// Name → die lookup used to resolve notation overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DieMap {
    dice: BTreeMap<String, Distribution>,
}

impl DieMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dice the command-line tool knows by name: the polyhedral set,
    /// a die that always shows 0, and a d10 with doubled faces.
    pub fn standard() -> Self {
        let mut map = Self::new();
        for sides in [4, 6, 8, 10, 12, 20] {
            map.insert(format!("d{}", sides), Distribution::die(sides));
        }
        map.insert("d0", Distribution::die(0));
        map.insert("d10*2", &Distribution::die(10) * 2);
        map
    }

    pub fn insert(&mut self, name: impl Into<String>, die: Distribution) -> Option<Distribution> {
        self.dice.insert(name.into(), die)
    }

    pub fn get(&self, name: &str) -> Option<&Distribution> {
        self.dice.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Distribution)> {
        self.dice.iter().map(|(name, die)| (name.as_str(), die))
    }

    pub fn len(&self) -> usize {
        self.dice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dice.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Distribution)> for DieMap {
    fn from_iter<I: IntoIterator<Item = (S, Distribution)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, die) in iter {
            map.insert(name, die);
        }
        map
    }
}

fn die_expr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^d\s*(?P<sides>\d+)\s*(?:(?P<op>[*+-])\s*(?P<operand>\d+))?$")
            .expect("die expression regex is valid")
    })
}

/// Parse `dN`, `dN*K`, `dN+K` or `dN-K` (case-insensitive). `N` is at most
/// [`MAX_DIE_SIDES`], and the adjusted faces must fit in an `i64`.
///
/// ```rust
/// use bumpity::dice::parse_die;
///
/// let doubled = parse_die("d10*2").unwrap();
/// assert_eq!(doubled.outcomes().next_back(), Some(20));
/// assert!(parse_die("2d6").is_err());
/// ```
pub fn parse_die(expr: &str) -> Result<Distribution, DieError> {
    let trimmed = expr.trim();
    let caps = die_expr_re()
        .captures(trimmed)
        .ok_or_else(|| DieError::Malformed {
            expr: expr.to_string(),
        })?;
    let out_of_range = || DieError::OutOfRange {
        expr: expr.to_string(),
    };

    let sides: u32 = caps["sides"].parse().map_err(|_| out_of_range())?;
    if sides > MAX_DIE_SIDES {
        return Err(out_of_range());
    }
    let die = Distribution::die(sides);

    let Some(op) = caps.name("op") else {
        return Ok(die);
    };
    let operand: i64 = caps["operand"].parse().map_err(|_| out_of_range())?;
    let adjusted = match op.as_str() {
        "*" => die.checked_scale(operand),
        "+" => die.checked_shift(operand),
        _ => die.checked_shift(-operand),
    };
    adjusted.map_err(|_| out_of_range())
}
