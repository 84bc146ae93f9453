//! Thin command-line harness: reads a configuration CIB and a status CIB
//! from disk, runs one scheduling pass as of the current wall-clock time,
//! and prints the resulting transition graph XML to stdout. Diagnostics go
//! to stderr; a fatal scheduler error exits non-zero.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use pacemaker_scheduler::error::SchedulerError;
use pacemaker_scheduler::time::{Clock, SystemClock, Timestamp};
use pacemaker_scheduler::Scheduler;

/// Compute a Pacemaker-style transition graph from a configuration and
/// status CIB.
#[derive(Parser)]
#[command(name = "pacemaker-cli", version, about)]
struct Args {
    /// Path to the configuration CIB (the `<configuration>` section).
    configuration: PathBuf,

    /// Path to the status CIB (the `<status>` section).
    status: PathBuf,

    /// Evaluate the pass as of this many seconds since the Unix epoch
    /// instead of the current wall-clock time. Mainly useful for
    /// reproducing a past run.
    #[arg(long)]
    now: Option<i64>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let configuration_xml = match fs::read_to_string(&args.configuration) {
        Ok(content) => content,
        Err(error) => {
            eprintln!("pacemaker-cli: failed to read {}: {error}", args.configuration.display());
            return ExitCode::FAILURE;
        }
    };
    let status_xml = match fs::read_to_string(&args.status) {
        Ok(content) => content,
        Err(error) => {
            eprintln!("pacemaker-cli: failed to read {}: {error}", args.status.display());
            return ExitCode::FAILURE;
        }
    };

    let now = match args.now {
        Some(seconds) => Timestamp::from_epoch_seconds(seconds),
        None => SystemClock.now(),
    };

    tracing::info!(now = %now, "starting scheduling pass");

    match Scheduler::schedule(&configuration_xml, &status_xml, now) {
        Ok(outcome) => {
            println!("{}", outcome.transition_graph_xml);
            for diagnostic in &outcome.diagnostics {
                eprintln!("{diagnostic}");
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            report_fatal(&error);
            ExitCode::FAILURE
        }
    }
}

fn report_fatal(error: &SchedulerError) {
    match error {
        SchedulerError::MalformedInput { message } => {
            eprintln!("pacemaker-cli: malformed input: {message}");
        }
        SchedulerError::OrderingCycle { members } => {
            eprintln!("pacemaker-cli: ordering cycle detected among: {}", members.join(", "));
        }
        SchedulerError::Invariant { message } => {
            eprintln!("pacemaker-cli: internal invariant violation: {message}");
        }
    }
}
