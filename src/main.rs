//! Batch driver binary (spec §6 CLI surface): loads one or more settings
//! files, builds a `World` via the factory, and drives it tick by tick to
//! `Scenario.endTime` — once per requested run index.
//!
//! Grounded in the teacher's `main.rs` logger setup (`env_logger` + the
//! `log` facade) minus the GUI/Embassy machinery, which this batch-mode
//! engine has no use for (see DESIGN.md).

use std::process::ExitCode;

use clap::{Arg, Command};
use log::{debug, info};

use dtn_sim::context::SimulationContext;
use dtn_sim::factory;
use dtn_sim::message::Message;
use dtn_sim::reporting::ReportListener;
use dtn_sim::router::DeleteMode;
use dtn_sim::settings::Settings;

/// Logs every listener callback at `debug` (delivery/abort/interference
/// outcomes) or `info` (new messages), the way a report writer would
/// consume the same hooks — report writers themselves are out of scope
/// (spec §1).
struct LoggingListener;

impl ReportListener for LoggingListener {
    fn register_node(&mut self, host: u32) {
        debug!("registered host {host}");
    }

    fn new_message(&mut self, message: &Message) {
        info!("new message {message}");
    }

    fn transmission_performed(&mut self, message_id: &str, source: u32) {
        debug!("host {source} transmitted {message_id}");
    }

    fn message_transfer_started(&mut self, message_id: &str, from: u32, to: u32) {
        debug!("transfer started: {message_id} {from} -> {to}");
    }

    fn message_transferred(&mut self, message_id: &str, from: u32, to: u32, first_delivery: bool, final_target: bool) {
        info!("transferred {message_id} {from} -> {to} (first_delivery={first_delivery}, final_target={final_target})");
    }

    fn message_transfer_aborted(&mut self, message_id: &str, from: u32, to: u32, cause: &str) {
        debug!("transfer aborted {message_id} {from} -> {to}: {cause}");
    }

    fn message_transmission_interfered(&mut self, message_id: &str, from: u32, to: u32) {
        debug!("interference on {message_id} {from} -> {to}");
    }

    fn message_deleted(&mut self, message_id: &str, host: u32, mode: DeleteMode, cause: &str) {
        debug!("deleted {message_id} at host {host} ({mode:?}): {cause}");
    }
}

fn build_cli() -> Command {
    Command::new("dtn-sim")
        .about("Discrete-event simulator for delay-tolerant networks")
        .arg(
            Arg::new("batch")
                .short('b')
                .value_name("RUNS")
                .num_args(0..=1)
                .default_missing_value("1")
                .help("Batch mode: a run count, or a comma list of indices/a:b ranges"),
        )
        .arg(
            Arg::new("args")
                .value_name("ARGS")
                .num_args(0..)
                .trailing_var_arg(true)
                .help("Without -b, an optional leading run index followed by settings file paths; with -b, just settings file paths"),
        )
}

/// Parses the `-b` grammar (spec §6): either a bare run count (`N`, meaning
/// run indices `0..N`) or a comma-separated list of single values and
/// `a:b` inclusive ranges.
fn parse_batch_spec(spec: &str) -> anyhow::Result<Vec<u64>> {
    if spec.contains(',') || spec.contains(':') {
        let mut indices = Vec::new();
        for part in spec.split(',') {
            let part = part.trim();
            if let Some((a, b)) = part.split_once(':') {
                let start: u64 = a.trim().parse()?;
                let end: u64 = b.trim().parse()?;
                indices.extend(start..=end);
            } else {
                indices.push(part.parse()?);
            }
        }
        Ok(indices)
    } else {
        let count: u64 = spec.parse()?;
        Ok((0..count).collect())
    }
}

/// Builds and drives one run to `Scenario.endTime`, returning the listener
/// event count for a summary log line.
fn run_one(settings: &Settings, run_index: u64) -> anyhow::Result<usize> {
    let context = SimulationContext::fresh(0, run_index);
    let mut world = factory::build_world(settings, context)?;
    world.add_listener(Box::new(LoggingListener));

    let end_time = factory::load_scenario(settings)?.end_time;
    info!("run {run_index}: simulating to t={end_time}");

    let mut total_events = 0;
    while world.now() < end_time && !world.is_cancelled() {
        total_events += world.update().len();
    }
    info!("run {run_index}: finished at t={}, {total_events} listener events", world.now());
    Ok(total_events)
}

fn main() -> ExitCode {
    env_logger::init();

    let matches = build_cli().get_matches();
    let rest: Vec<String> = matches.get_many::<String>("args").map(|v| v.cloned().collect()).unwrap_or_default();

    let (run_indices, config_paths): (Vec<u64>, Vec<String>) = match matches.get_one::<String>("batch") {
        Some(batch_spec) => match parse_batch_spec(batch_spec) {
            Ok(indices) => (indices, rest),
            Err(err) => {
                eprintln!("invalid -b argument `{batch_spec}`: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => match rest.split_first() {
            Some((first, remainder)) if first.parse::<u64>().is_ok() => (vec![first.parse().unwrap()], remainder.to_vec()),
            _ => (vec![0], rest),
        },
    };

    if config_paths.is_empty() {
        eprintln!("usage: dtn-sim [-b RUNS] <settings.toml>...");
        return ExitCode::FAILURE;
    }

    let settings = match Settings::load(&config_paths) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("settings error: {err}");
            return ExitCode::FAILURE;
        }
    };

    for run_index in run_indices {
        if let Err(err) = run_one(&settings, run_index) {
            eprintln!("run {run_index} failed: {err:#}");
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_count_expands_to_zero_based_range() {
        assert_eq!(parse_batch_spec("3").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn comma_list_and_ranges_expand_in_order() {
        assert_eq!(parse_batch_spec("0,2:4,7").unwrap(), vec![0, 2, 3, 4, 7]);
    }

    #[test]
    fn cli_without_batch_flag_parses_leading_run_index() {
        let matches = build_cli().get_matches_from(["dtn-sim", "5", "scenario.toml"]);
        assert!(matches.get_one::<String>("batch").is_none());
        let rest: Vec<String> = matches.get_many::<String>("args").unwrap().cloned().collect();
        assert_eq!(rest, vec!["5".to_string(), "scenario.toml".to_string()]);
    }

    #[test]
    fn cli_batch_flag_without_trailing_value_defaults_to_one_run() {
        let matches = build_cli().get_matches_from(["dtn-sim", "-b"]);
        assert_eq!(matches.get_one::<String>("batch").map(String::as_str), Some("1"));
    }

    #[test]
    fn cli_batch_flag_consumes_its_run_spec_and_leaves_config_paths() {
        let matches = build_cli().get_matches_from(["dtn-sim", "-b", "0,2:4", "scenario.toml"]);
        assert_eq!(matches.get_one::<String>("batch").map(String::as_str), Some("0,2:4"));
        let rest: Vec<String> = matches.get_many::<String>("args").unwrap().cloned().collect();
        assert_eq!(rest, vec!["scenario.toml".to_string()]);
    }
}
