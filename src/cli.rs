//! Command-line configuration for the `intcode` binary.
//!
//! Arguments are parsed by hand into a [`Config`]. The log level falls back to
//! the `INTCODE_LOG` environment variable, then to `info`.

use crate::utils::log::{Level, ParseLevelError};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable holding the default log level.
pub const LOG_ENV: &str = "INTCODE_LOG";

pub const USAGE: &str = "\
Intcode VM

USAGE:
    {program} <program-file> [OPTIONS]

ARGS:
    <program-file>    File holding comma separated Intcode words

OPTIONS:
    -i, --input <v,v,...>     Initial input values (the signal in pipeline mode)
    -s, --start <pos>         Starting instruction pointer (default 0)
    -p, --phases <v,v,...>    Run as an amplifier pipeline, one stage per phase
    -f, --feedback            Wire the last stage back to the first
        --noun <n>            Write n to position 1 before running
        --verb <v>            Write v to position 2 before running
        --max-steps <n>       Fault after n executed instructions
    -t, --trace               Print the instruction trace after the run
    -l, --loglevel <level>    trace, debug, info, warn or error (default info)
    -h, --help                Print this help message

ENVIRONMENT:
    INTCODE_LOG    Log level used when --loglevel is not given

EXAMPLES:
    # Run a program that reads one input
    {program} day5.txt --input 1

    # Chain five amplifiers in a feedback loop
    {program} day7.txt --phases 9,8,7,6,5 --feedback --input 0

    # Probe a noun/verb pair
    {program} day2.txt --noun 12 --verb 2
";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing <program-file> argument")]
    MissingProgram,
    #[error("{flag} requires an argument")]
    MissingValue { flag: String },
    #[error("invalid value for {flag}: '{value}'")]
    InvalidValue { flag: String, value: String },
    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
    #[error("--noun and --verb must be given together")]
    IncompleteNounVerb,
    #[error("{0} only applies to pipeline runs (--phases)")]
    PipelineOnly(&'static str),
    #[error("{0} only applies to single-instance runs")]
    SingleShotOnly(&'static str),
    #[error(transparent)]
    Level(#[from] ParseLevelError),
}

/// What the binary was asked to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Run(Config),
    Help,
}

/// A fully validated run configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub program: PathBuf,
    pub input: Vec<i64>,
    pub start: usize,
    /// One pipeline stage per phase; `None` runs a single instance.
    pub phases: Option<Vec<i64>>,
    pub feedback: bool,
    pub noun_verb: Option<(i64, i64)>,
    pub max_steps: Option<usize>,
    pub trace: bool,
    pub level: Level,
}

/// Returns the usage text with `program` as the binary name.
pub fn usage(program: &str) -> String {
    USAGE.replace("{program}", program)
}

/// Parses the arguments following the binary name.
///
/// `env_level` is the value of [`LOG_ENV`], if set.
pub fn parse(args: &[String], env_level: Option<&str>) -> Result<Command, ConfigError> {
    let mut program = None;
    let mut input = Vec::new();
    let mut start = 0;
    let mut phases = None;
    let mut feedback = false;
    let mut noun = None;
    let mut verb = None;
    let mut max_steps = None;
    let mut trace = false;
    let mut level = None;

    let mut args = args.iter();
    while let Some(arg) = args.next() {
        let flag = arg.as_str();
        match flag {
            "-h" | "--help" => return Ok(Command::Help),
            "-i" | "--input" => input = parse_list(flag, value(flag, args.next())?)?,
            "-s" | "--start" => start = parse_value(flag, value(flag, args.next())?)?,
            "-p" | "--phases" => phases = Some(parse_list(flag, value(flag, args.next())?)?),
            "-f" | "--feedback" => feedback = true,
            "--noun" => noun = Some(parse_value(flag, value(flag, args.next())?)?),
            "--verb" => verb = Some(parse_value(flag, value(flag, args.next())?)?),
            "--max-steps" => max_steps = Some(parse_value(flag, value(flag, args.next())?)?),
            "-t" | "--trace" => trace = true,
            "-l" | "--loglevel" => level = Some(value(flag, args.next())?.parse::<Level>()?),
            other if other.starts_with('-') && other.len() > 1 => {
                return Err(ConfigError::UnexpectedArgument(other.to_string()));
            }
            other => {
                if program.is_some() {
                    return Err(ConfigError::UnexpectedArgument(other.to_string()));
                }
                program = Some(PathBuf::from(other));
            }
        }
    }

    let program = program.ok_or(ConfigError::MissingProgram)?;
    let noun_verb = match (noun, verb) {
        (Some(noun), Some(verb)) => Some((noun, verb)),
        (None, None) => None,
        _ => return Err(ConfigError::IncompleteNounVerb),
    };
    if feedback && phases.is_none() {
        return Err(ConfigError::PipelineOnly("--feedback"));
    }
    if max_steps.is_some() && phases.is_some() {
        return Err(ConfigError::SingleShotOnly("--max-steps"));
    }
    let level = match (level, env_level) {
        (Some(level), _) => level,
        (None, Some(raw)) => raw.parse()?,
        (None, None) => Level::Info,
    };

    Ok(Command::Run(Config {
        program,
        input,
        start,
        phases,
        feedback,
        noun_verb,
        max_steps,
        trace,
        level,
    }))
}

fn value<'a>(flag: &str, next: Option<&'a String>) -> Result<&'a str, ConfigError> {
    next.map(String::as_str).ok_or_else(|| ConfigError::MissingValue {
        flag: flag.to_string(),
    })
}

fn parse_value<T: std::str::FromStr>(flag: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: raw.to_string(),
    })
}

/// Parses `1,2,-3`; an empty string is an empty list.
fn parse_list(flag: &str, raw: &str) -> Result<Vec<i64>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(|item| parse_value(flag, item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn config(line: &str) -> Config {
        match parse(&args(line), None).unwrap() {
            Command::Run(config) => config,
            Command::Help => panic!("expected a run configuration"),
        }
    }

    #[test]
    fn defaults() {
        let config = config("prog.txt");
        assert_eq!(config.program, PathBuf::from("prog.txt"));
        assert!(config.input.is_empty());
        assert_eq!(config.start, 0);
        assert_eq!(config.phases, None);
        assert!(!config.feedback);
        assert_eq!(config.noun_verb, None);
        assert_eq!(config.max_steps, None);
        assert!(!config.trace);
        assert_eq!(config.level, Level::Info);
    }

    #[test]
    fn single_shot_options() {
        let config = config("prog.txt -i 1,-2,3 --start 4 --max-steps 100 -t -l debug");
        assert_eq!(config.input, vec![1, -2, 3]);
        assert_eq!(config.start, 4);
        assert_eq!(config.max_steps, Some(100));
        assert!(config.trace);
        assert_eq!(config.level, Level::Debug);
    }

    #[test]
    fn pipeline_options() {
        let config = config("--phases 9,8,7,6,5 -f prog.txt --input 0");
        assert_eq!(config.phases, Some(vec![9, 8, 7, 6, 5]));
        assert!(config.feedback);
        assert_eq!(config.input, vec![0]);
    }

    #[test]
    fn noun_and_verb() {
        assert_eq!(
            config("prog.txt --noun 12 --verb 2").noun_verb,
            Some((12, 2))
        );
        assert_eq!(
            parse(&args("prog.txt --noun 12"), None),
            Err(ConfigError::IncompleteNounVerb)
        );
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse(&args("prog.txt -h"), None), Ok(Command::Help));
        assert_eq!(parse(&args("--help"), None), Ok(Command::Help));
    }

    #[test]
    fn missing_program() {
        assert_eq!(parse(&args("-t"), None), Err(ConfigError::MissingProgram));
    }

    #[test]
    fn missing_value() {
        assert_eq!(
            parse(&args("prog.txt --input"), None),
            Err(ConfigError::MissingValue {
                flag: "--input".to_string()
            })
        );
    }

    #[test]
    fn invalid_values() {
        assert_eq!(
            parse(&args("prog.txt -i 1,x"), None),
            Err(ConfigError::InvalidValue {
                flag: "-i".to_string(),
                value: "x".to_string()
            })
        );
        assert!(matches!(
            parse(&args("prog.txt --start -1"), None),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse(&args("prog.txt -l loud"), None),
            Err(ConfigError::Level(_))
        ));
    }

    #[test]
    fn unexpected_arguments() {
        assert_eq!(
            parse(&args("prog.txt --bogus"), None),
            Err(ConfigError::UnexpectedArgument("--bogus".to_string()))
        );
        assert_eq!(
            parse(&args("a.txt b.txt"), None),
            Err(ConfigError::UnexpectedArgument("b.txt".to_string()))
        );
    }

    #[test]
    fn mode_conflicts() {
        assert_eq!(
            parse(&args("prog.txt --feedback"), None),
            Err(ConfigError::PipelineOnly("--feedback"))
        );
        assert_eq!(
            parse(&args("prog.txt -p 0,1 --max-steps 5"), None),
            Err(ConfigError::SingleShotOnly("--max-steps"))
        );
    }

    #[test]
    fn log_level_from_environment() {
        let Command::Run(config) = parse(&args("prog.txt"), Some("warn")).unwrap() else {
            panic!("expected a run configuration");
        };
        assert_eq!(config.level, Level::Warn);

        let Command::Run(config) = parse(&args("prog.txt -l error"), Some("warn")).unwrap() else {
            panic!("expected a run configuration");
        };
        assert_eq!(config.level, Level::Error);

        assert!(parse(&args("prog.txt"), Some("chatty")).is_err());
    }

    #[test]
    fn usage_names_binary() {
        let text = usage("intcode");
        assert!(text.contains("intcode <program-file> [OPTIONS]"));
        assert!(!text.contains("{program}"));
    }
}
