//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use phone_demo_sequencer::animation::effect::{EffectProvider, EffectTrigger, NoopEffectProvider};
use phone_demo_sequencer::cli::terminal::{LineStyle, TerminalView, format_change_human};
use phone_demo_sequencer::core::config::Config;
use phone_demo_sequencer::core::errors::PdsError;
use phone_demo_sequencer::daemon::driver::{DriverOptions, DriverReport, spawn_driver};
use phone_demo_sequencer::daemon::signals::{SignalAction, SignalHandler};
use phone_demo_sequencer::logger::activity::{
    ActivityEvent, ActivityLoggerConfig, ActivityLoggerHandle, spawn_logger,
};
use phone_demo_sequencer::runtime::clock::{MonotonicClock, SimulatedClock};
use phone_demo_sequencer::runtime::simulated::SimulatedRuntime;
use phone_demo_sequencer::view::recording::{Recorder, ViewChange, ViewEvent};

/// How often the foreground loop checks signals and driver liveness.
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Phone demo sequencer: drives a mocked phone through a looping buy flow.
#[derive(Debug, Parser)]
#[command(
    name = "pds",
    author,
    version,
    about = "Phone Demo Sequencer - looping buy-flow animation driver",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the demo in real time until interrupted.
    Run(RunArgs),
    /// Run the demo on a virtual clock and print the timeline.
    Simulate(SimulateArgs),
    /// View and validate configuration.
    Config(ConfigArgs),
    /// Show version and optional build metadata.
    Version(VersionArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Stop after this many completed cycles.
    #[arg(long, value_name = "N")]
    cycles: Option<u64>,
    /// Do not print particle bursts.
    #[arg(long)]
    no_effect: bool,
}

#[derive(Debug, Clone, Args)]
struct SimulateArgs {
    /// Number of cycles to simulate.
    #[arg(long, default_value_t = 1, value_name = "N")]
    cycles: u64,
    /// Include every counter frame instead of only the final value.
    #[arg(long)]
    all_frames: bool,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            cycles: 1,
            all_frames: false,
        }
    }
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print the config file path in use.
    Path,
    /// Print the effective configuration.
    Show,
    /// Load and validate the configuration.
    Validate,
}

#[derive(Debug, Clone, Args, Default)]
struct VersionArgs {
    /// Include additional build metadata fields.
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input at runtime.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure.
    #[error("{0}")]
    Runtime(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
        }
    }
}

impl From<PdsError> for CliError {
    fn from(e: PdsError) -> Self {
        match e {
            PdsError::InvalidConfig { .. }
            | PdsError::MissingConfig { .. }
            | PdsError::ConfigParse { .. } => Self::User(e.to_string()),
            _ => Self::Runtime(e.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_live(cli, args),
        Command::Simulate(args) => run_simulate(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Version(args) => emit_version(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

// ──────────────────── run ────────────────────

fn run_live(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let config = Config::load(cli.config.as_deref())?;
    let mode = output_mode(cli);
    let style = match mode {
        OutputMode::Human => LineStyle::Human,
        OutputMode::Json => LineStyle::Json,
    };

    let (logger, logger_join) = if config.logging.enabled {
        let (handle, join) = spawn_logger(ActivityLoggerConfig::from_config(&config))?;
        (Some(handle), Some(join))
    } else {
        (None, None)
    };

    let view = TerminalView::stdout(Arc::new(MonotonicClock::new()), style);
    let provider: Option<Box<dyn EffectProvider>> = if args.no_effect {
        None
    } else {
        Some(Box::new(view.confetti()))
    };
    let effect = EffectTrigger::new(provider, &config.effect);

    let driver = spawn_driver(
        &config,
        view.handles(),
        effect,
        logger.clone(),
        DriverOptions {
            autostart: true,
            max_cycles: args.cycles,
        },
    )?;

    let signals = SignalHandler::new();
    while !driver.is_finished() {
        match signals.next_action() {
            Some(SignalAction::Shutdown) => {
                driver.shutdown();
                break;
            }
            Some(SignalAction::Cancel) => driver.cancel(),
            Some(SignalAction::Start) => driver.start(),
            None => thread::sleep(SIGNAL_POLL_INTERVAL),
        }
    }

    let report = match driver.join() {
        Ok(report) => report,
        Err(e) => {
            if let Some(logger) = &logger {
                logger.send(ActivityEvent::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                });
            }
            shutdown_logger(logger, logger_join);
            return Err(e.into());
        }
    };
    view.finish()?;
    shutdown_logger(logger, logger_join);

    match mode {
        OutputMode::Human => print_report_human(&report),
        OutputMode::Json => {
            let payload = json!({
                "command": "run",
                "report": serde_json::to_value(&report)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

fn shutdown_logger(logger: Option<ActivityLoggerHandle>, join: Option<thread::JoinHandle<()>>) {
    if let Some(logger) = logger {
        logger.shutdown();
    }
    if let Some(join) = join
        && join.join().is_err()
    {
        eprintln!("[PDS-LOGGER] logger thread panicked during shutdown");
    }
}

fn print_report_human(report: &DriverReport) {
    println!(
        "{} {} ({} cycles, {:.1}s)",
        "Stopped:".bold(),
        report.reason,
        report.cycles_completed,
        Duration::from_millis(report.uptime_ms).as_secs_f64(),
    );
    if report.stats.step_failures > 0 {
        println!(
            "  {} {} step failures (see activity log)",
            "warning:".yellow(),
            report.stats.step_failures
        );
    }
}

// ──────────────────── simulate ────────────────────

fn run_simulate(cli: &Cli, args: &SimulateArgs) -> Result<(), CliError> {
    if args.cycles == 0 {
        return Err(CliError::User("--cycles must be at least 1".to_string()));
    }
    let config = Config::load(cli.config.as_deref())?;

    let clock = SimulatedClock::new();
    let recorder = Recorder::new(Arc::new(clock.clone()));
    let effect = EffectTrigger::new(Some(Box::new(NoopEffectProvider)), &config.effect);
    let mut runtime = SimulatedRuntime::with_clock(&config, recorder.handles(), effect, clock);

    runtime.start();
    let elapsed = runtime.run_cycles(args.cycles);
    let stats = runtime.controller().stats();
    let events = recorder.drain();
    let events = if args.all_frames {
        events
    } else {
        collapse_counter_frames(events)
    };

    match output_mode(cli) {
        OutputMode::Human => {
            for event in &events {
                println!(
                    "{}",
                    format_change_human(Duration::from_millis(event.at_ms), &event.change)
                );
            }
            println!(
                "{} {} cycle(s) in {:.1}s virtual time, {} steps, {} effects",
                "Simulated".bold(),
                runtime.controller().cycles_completed(),
                elapsed.as_secs_f64(),
                stats.steps_executed,
                stats.effects_fired,
            );
        }
        OutputMode::Json => {
            let payload = json!({
                "command": "simulate",
                "cycles": runtime.controller().cycles_completed(),
                "elapsed_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "stats": serde_json::to_value(stats)?,
                "events": serde_json::to_value(&events)?,
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

/// Keep only the last frame of each uninterrupted run of counter updates.
fn collapse_counter_frames(events: Vec<ViewEvent>) -> Vec<ViewEvent> {
    let mut out: Vec<ViewEvent> = Vec::with_capacity(events.len());
    for event in events {
        if let ViewChange::Text { target, .. } = &event.change
            && let Some(last) = out.last_mut()
            && matches!(&last.change, ViewChange::Text { target: prev, .. } if prev == target)
        {
            *last = event;
            continue;
        }
        out.push(event);
    }
    out
}

// ──────────────────── config ────────────────────

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config show",
                        "config": serde_json::to_value(&config)?,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("{}", "Configuration is valid.".green());
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                        println!(
                            "  Cycle length: {} ms",
                            config.timing.cycle_length().as_millis()
                        );
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("{} {e}", "Configuration is INVALID:".red());
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

// ──────────────────── version ────────────────────

fn emit_version(cli: &Cli, args: &VersionArgs) -> Result<(), CliError> {
    let version = env!("CARGO_PKG_VERSION");
    let package = env!("CARGO_PKG_NAME");
    let target = option_env!("TARGET").unwrap_or("unknown");
    let profile = option_env!("PROFILE").unwrap_or("unknown");
    let git_sha = option_env!("GIT_SHA").unwrap_or("unknown");

    match output_mode(cli) {
        OutputMode::Human => {
            println!("pds {version}");
            if args.verbose {
                println!("package: {package}");
                println!("target: {target}");
                println!("profile: {profile}");
                println!("git_sha: {git_sha}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "binary": "pds",
                "version": version,
                "package": package,
                "build": {
                    "target": target,
                    "profile": profile,
                    "git_sha": git_sha,
                }
            });
            write_json_line(&payload)?;
        }
    }
    Ok(())
}

// ──────────────────── output ────────────────────

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("PDS_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "pds",
            "--config",
            "/tmp/pds.toml",
            "--json",
            "--no-color",
            "simulate",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["pds", "simulate", "--json", "--no-color"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_every_subcommand() {
        let cases = [
            vec!["pds", "run"],
            vec!["pds", "run", "--cycles", "3", "--no-effect"],
            vec!["pds", "simulate", "--cycles", "2", "--all-frames"],
            vec!["pds", "config"],
            vec!["pds", "config", "path"],
            vec!["pds", "config", "show"],
            vec!["pds", "config", "validate"],
            vec!["pds", "version", "--verbose"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse case: {case:?}");
        }
    }

    #[test]
    fn rejects_non_numeric_cycles() {
        assert!(Cli::try_parse_from(["pds", "run", "--cycles", "many"]).is_err());
    }

    #[test]
    fn completions_support_bash_zsh_and_fish() {
        for shell in ["bash", "zsh", "fish"] {
            let parsed = Cli::try_parse_from(["pds", "completions", shell]);
            assert!(parsed.is_ok(), "failed shell parse for {shell}");
        }
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn config_errors_map_to_user_exit_code() {
        let err = CliError::from(PdsError::InvalidConfig {
            details: "balance.steps must be >= 1".to_string(),
        });
        assert_eq!(err.exit_code(), 1);
        let err = CliError::from(PdsError::Runtime {
            details: "boom".to_string(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn collapse_keeps_last_counter_frame() {
        let text = |at_ms, target, text: &str| ViewEvent {
            at_ms,
            change: ViewChange::Text {
                target,
                text: text.to_string(),
            },
        };
        let events = vec![
            text(0, "balance", "26"),
            text(16, "balance", "53"),
            text(32, "balance", "1,337"),
            ViewEvent {
                at_ms: 3_000,
                change: ViewChange::ScreenActivated {
                    screen: phone_demo_sequencer::view::screen::Screen::Buy,
                },
            },
            text(11_000, "new_balance", "40"),
            text(11_016, "new_balance", "2,004"),
        ];
        let collapsed = collapse_counter_frames(events);
        assert_eq!(collapsed.len(), 3);
        assert_eq!(collapsed[0], text(32, "balance", "1,337"));
        assert_eq!(collapsed[2], text(11_016, "new_balance", "2,004"));
    }
}
