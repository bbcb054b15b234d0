//! Intcode VM runner.
//!
//! Loads an Intcode program from a file and runs it, either as a single
//! instance fed from `--input` or as a chain of amplifiers built from
//! `--phases`.
//!
//! # Usage
//! ```text
//! intcode <program-file> [OPTIONS]
//! ```
//!
//! Output values are printed to stdout, one per line. Logs and fault reports
//! go to stderr. The process exits with status 1 on any error.

use intcode::cli::{self, Command, Config, LOG_ENV};
use intcode::utils::log;
use intcode::virtual_machine::pipeline::{Pipeline, PipelineError, Stage};
use intcode::virtual_machine::program::Program;
use intcode::virtual_machine::vm::{self, Instruction};
use intcode::{debug, error, info};
use std::collections::VecDeque;
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let binary = args.first().map(String::as_str).unwrap_or("intcode");
    let env_level = env::var(LOG_ENV).ok();

    let config = match cli::parse(args.get(1..).unwrap_or_default(), env_level.as_deref()) {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            print_usage(binary);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{e}\n");
            print_usage(binary);
            process::exit(1);
        }
    };
    log::set_level(config.level);

    if let Err(message) = run(&config) {
        error!("{message}");
        process::exit(1);
    }
}

/// Loads the program and dispatches to the requested mode.
fn run(config: &Config) -> Result<(), String> {
    let text = fs::read_to_string(&config.program)
        .map_err(|e| format!("failed to read {}: {e}", config.program.display()))?;
    let program: Program = text
        .parse()
        .map_err(|e| format!("failed to parse {}: {e}", config.program.display()))?;
    info!(
        "loaded {} words from {}",
        program.len(),
        config.program.display()
    );

    let words = match config.noun_verb {
        Some((noun, verb)) => program
            .patch(noun, verb)
            .map_err(|e| format!("failed to patch noun {noun} and verb {verb}: {e}"))?,
        None => program.to_memory(),
    };

    match &config.phases {
        Some(phases) => run_pipeline(config, words, phases),
        None => run_single(config, words),
    }
}

fn run_single(config: &Config, mut words: Vec<i64>) -> Result<(), String> {
    let mut input: VecDeque<i64> = config.input.iter().copied().collect();
    let mut output = Vec::new();
    let result = vm::run_limited(
        &mut words,
        config.start,
        &mut input,
        &mut output,
        config.max_steps,
    );

    print_values(&output);
    match result {
        Ok(trace) => {
            debug!("{} input values left unread", input.len());
            if config.trace {
                print_trace(&trace);
            }
            if config.noun_verb.is_some() {
                println!("position 0: {}", words[0]);
            }
            Ok(())
        }
        Err(fault) => Err(fault.report()),
    }
}

fn run_pipeline(config: &Config, words: Vec<i64>, phases: &[i64]) -> Result<(), String> {
    let pipeline = phases
        .iter()
        .fold(Pipeline::new(), |pipeline, &phase| {
            pipeline.stage(Stage::new(words.clone(), vec![phase]).with_start(config.start))
        })
        .signal(config.input.iter().copied())
        .feedback(config.feedback);
    info!(
        "running {} stages{}",
        pipeline.len(),
        if config.feedback { " with feedback" } else { "" }
    );

    match pipeline.run_blocking() {
        Ok(result) => {
            print_values(&result.values);
            if config.trace {
                for (stage, trace) in result.traces.iter().enumerate() {
                    println!("stage {stage}:");
                    print_trace(trace);
                }
            }
            Ok(())
        }
        Err(PipelineError::Stage { stage, fault }) => {
            Err(format!("stage {stage}: {}", fault.report()))
        }
        Err(e) => Err(e.to_string()),
    }
}

fn print_values(values: &[i64]) {
    for value in values {
        println!("{value}");
    }
}

fn print_trace(trace: &[Instruction]) {
    for instruction in trace {
        println!("{instruction}");
    }
}

/// Prints usage information to stderr.
fn print_usage(binary: &str) {
    eprintln!("{}", cli::usage(binary));
}
