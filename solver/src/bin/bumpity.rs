use std::io::Read;
use std::time::Instant;

use bumpity::constants::{DEFAULT_CLI_EXPLODE_LIMIT, DEFAULT_DIE, DEFAULT_MECHANIC};
use bumpity::dice::{parse_die, DieMap};
use bumpity::distribution::Distribution;
use bumpity::error::OverflowError;
use bumpity::explode::{ExplodeLimit, ExplosionCache};
use bumpity::mechanic::{Mechanic, Strategy};
use bumpity::params::Params;

const BAR_WIDTH: f64 = 50.0;

#[derive(Debug)]
struct Args {
    die_expr: String,
    die: Distribution,
    limit: ExplodeLimit,
    mechanic: Mechanic,
    compare: bool,
    help: bool,
    notations: Vec<String>,
}

fn usage() -> String {
    let names: Vec<&str> = Mechanic::ALL.iter().map(|m| m.name()).collect();
    format!(
        "Usage: bumpity [--die EXPR] [--explode-limit LIMIT] [--mechanic NAME] [--compare] NOTATION...\n\
         \n\
         Options:\n\
         \x20 --die EXPR            Default die: dN, dN*K, dN+K, dN-K (default: {})\n\
         \x20 --explode-limit LIMIT Depth like 3 or probability like 1/10000 (default: {})\n\
         \x20 --mechanic NAME       {} (default: {})\n\
         \x20 --compare             Run every mechanic and check direct/state-machine pairs agree\n\
         \n\
         Without NOTATION arguments, notation lines are read from stdin.",
        DEFAULT_DIE,
        DEFAULT_CLI_EXPLODE_LIMIT,
        names.join(", "),
        DEFAULT_MECHANIC
    )
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{}", msg);
    std::process::exit(1);
}

/// Parse the arguments after the program name.
fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut die_expr = DEFAULT_DIE.to_string();
    let mut limit = DEFAULT_CLI_EXPLODE_LIMIT;
    let mut mechanic = DEFAULT_MECHANIC;
    let mut compare = false;
    let mut help = false;
    let mut notations = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let mut value = || iter.next().ok_or_else(|| format!("Missing value for {}", arg));
        match arg.as_str() {
            "--die" => die_expr = value()?.clone(),
            "--explode-limit" => limit = value()?.parse().map_err(|err| format!("{}", err))?,
            "--mechanic" => mechanic = value()?.parse().map_err(|err| format!("{}", err))?,
            "--compare" => compare = true,
            "--help" | "-h" => help = true,
            other if other.starts_with("--") => {
                return Err(format!("Unknown argument: {}", other));
            }
            notation => notations.push(notation.to_string()),
        }
    }

    let die = parse_die(&die_expr).map_err(|err| err.to_string())?;
    Ok(Args {
        die_expr,
        die,
        limit,
        mechanic,
        compare,
        help,
        notations,
    })
}

/// Mean, stdev and one bar per outcome, scaled to the most likely outcome.
fn print_distribution(dist: &Distribution) {
    println!("avg | {:10.2}", dist.mean());
    println!("std | {:10.2}", dist.stdev());
    println!("var | {:10.2}", dist.variance());
    let peak = dist
        .outcomes()
        .map(|outcome| dist.probability(outcome))
        .fold(0.0, f64::max);
    for (outcome, _) in dist.iter() {
        let p = dist.probability(outcome);
        let bar = if peak > 0.0 {
            (p / peak * BAR_WIDTH).round() as usize
        } else {
            0
        };
        println!("{:>3} | {:7.2}% |{}", outcome, p * 100.0, "#".repeat(bar));
    }
}

fn timed(
    mechanic: Mechanic,
    params: &Params,
    die: &Distribution,
    limit: ExplodeLimit,
) -> Result<Distribution, OverflowError> {
    let start = Instant::now();
    let dist = mechanic.evaluate_with(params, die, limit, ExplosionCache::global())?;
    println!("{} took {:.3}s", mechanic, start.elapsed().as_secs_f64());
    Ok(dist)
}

fn main() {
    bumpity::env_config::init_logging();
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw).unwrap_or_else(|msg| fail(format!("{}\n\n{}", msg, usage())));
    if args.help {
        println!("{}", usage());
        return;
    }

    let text = if args.notations.is_empty() {
        let mut input = String::new();
        if let Err(err) = std::io::stdin().read_to_string(&mut input) {
            fail(format!("Failed to read notation from stdin: {}", err));
        }
        input
    } else {
        args.notations.join("\n")
    };

    let die_map = DieMap::standard();
    println!("die: {}, explode limit: {}", args.die_expr, args.limit);

    let mut mismatches = 0;
    let mut failures = 0;
    for (line, result) in Params::parse_notation_lines(&text, Some(&die_map)) {
        let params = match result {
            Ok(params) => params,
            Err(err) => {
                eprintln!("line {}: {}", line, err);
                continue;
            }
        };
        println!();
        println!("{}", params);
        let die = params.die_or(&args.die);

        if !args.compare {
            match timed(args.mechanic, &params, die, args.limit) {
                Ok(dist) => print_distribution(&dist),
                Err(err) => {
                    eprintln!("line {}: {}", line, err);
                    failures += 1;
                }
            }
            continue;
        }

        let results: Result<Vec<(Mechanic, Distribution)>, OverflowError> = Mechanic::ALL
            .iter()
            .map(|&mechanic| Ok((mechanic, timed(mechanic, &params, die, args.limit)?)))
            .collect();
        let results = match results {
            Ok(results) => results,
            Err(err) => {
                eprintln!("line {}: {}", line, err);
                failures += 1;
                continue;
            }
        };
        for (mechanic, dist) in &results {
            let counterpart = mechanic.counterpart();
            let agrees = results
                .iter()
                .any(|(other, other_dist)| *other == counterpart && other_dist == dist);
            if !agrees && mechanic.strategy() == Strategy::Direct {
                eprintln!("{} and {} disagree on {}", mechanic, counterpart, params);
                mismatches += 1;
            }
        }
        for (mechanic, dist) in &results {
            println!("-- {} ({})", mechanic.label(), mechanic);
            print_distribution(dist);
        }
    }

    if mismatches > 0 {
        fail(format!("{} mechanic mismatches", mismatches));
    }
    if failures > 0 {
        fail(format!("{} pools could not be evaluated", failures));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let parsed = parse_args(&args(&["1s1b@2"])).unwrap();
        assert_eq!(parsed.die_expr, DEFAULT_DIE);
        assert_eq!(parsed.limit, DEFAULT_CLI_EXPLODE_LIMIT);
        assert_eq!(parsed.mechanic, DEFAULT_MECHANIC);
        assert!(!parsed.compare && !parsed.help);
        assert_eq!(parsed.notations, ["1s1b@2"]);
    }

    #[test]
    fn test_options() {
        let parsed = parse_args(&args(&[
            "--die",
            "d6+1",
            "--explode-limit",
            "2",
            "--mechanic",
            "direct-exact",
            "--compare",
            "2s0b@1",
            "1s0b@1",
        ]))
        .unwrap();
        assert_eq!(parsed.die, &Distribution::die(6) + 1);
        assert_eq!(parsed.limit, ExplodeLimit::Depth(2));
        assert_eq!(parsed.mechanic, Mechanic::DirectExact);
        assert!(parsed.compare);
        assert_eq!(parsed.notations, ["2s0b@1", "1s0b@1"]);
    }

    #[test]
    fn test_missing_values_are_errors() {
        for flag in ["--die", "--explode-limit", "--mechanic"] {
            let err = parse_args(&args(&["1s0b@1", flag])).unwrap_err();
            assert_eq!(err, format!("Missing value for {}", flag));
        }
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(parse_args(&args(&["--die", "2d6"])).is_err());
        assert!(parse_args(&args(&["--die", "d6*9223372036854775807"])).is_err());
        assert!(parse_args(&args(&["--explode-limit", "1/0"])).is_err());
        assert!(parse_args(&args(&["--mechanic", "icepool"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).unwrap_err().contains("--verbose"));
        assert!(parse_args(&args(&["-h"])).unwrap().help);
    }
}
