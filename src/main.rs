use board_test_harness::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use board_test_harness::port::pair_ports;
use board_test_harness::prompt::ConsolePrompt;
use board_test_harness::{
    CommandPreparer, ConsoleReporter, Harness, HarnessError, HarnessResult,
    MultiplexPolicy, SerialBoardProvider, SuiteSpec,
};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status when the harness itself fails, as opposed to a test.
const HARNESS_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "board-harness",
    version,
    about = "Run firmware test suites on microcontroller boards over serial.",
    long_about = "Flashes each suite onto its boards, drives the tests over the boards' UART links and \
                  reports every assertion. Exits nonzero when any assertion failed."
)]
struct Args {
    /// Programming port of each board, primary first (repeatable).
    #[arg(short, long = "prog", value_name = "PORT")]
    prog: Vec<String>,

    /// UART port of each board, primary first. Derived from --prog when omitted.
    #[arg(short, long = "uart", value_name = "PORT")]
    uart: Vec<String>,

    /// Offset from programming port number to UART port number.
    #[arg(long, allow_negative_numbers = true, value_name = "N")]
    uart_offset: Option<i64>,

    /// Suite to run, as NAME:BOARDS[:PATH] (repeatable).
    #[arg(short, long = "suite", value_name = "SUITE")]
    suite: Vec<SuiteSpec>,

    /// Configuration file (default: resolved from BOARD_HARNESS_CONFIG, ./harness.toml, ...).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Per-line read timeout in milliseconds.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Abort a test that has not finished after this many seconds.
    #[arg(long, value_name = "SECS")]
    deadline_secs: Option<f64>,

    /// Only read the primary board.
    #[arg(long)]
    primary_only: bool,

    /// Ask before running each suite.
    #[arg(long)]
    confirm: bool,

    /// Write a JSON report of the run to FILE.
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,

    /// More logging on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    /// Command-line flags win over file and environment.
    fn apply(&self, config: &mut Config) {
        if !self.prog.is_empty() {
            config.serial.prog_ports = self.prog.clone();
        }
        if !self.uart.is_empty() {
            config.serial.uart_ports = self.uart.clone();
        }
        if let Some(offset) = self.uart_offset {
            config.serial.uart_offset = Some(offset);
        }
        if let Some(ms) = self.timeout_ms {
            config.serial.read_timeout_ms = ms;
        }
        if let Some(secs) = self.deadline_secs {
            config.run.test_deadline_secs = Some(secs);
        }
        if self.primary_only {
            config.run.multiplex = MultiplexPolicy::PrimaryOnly;
        }
        if self.confirm {
            config.run.confirm = true;
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// File, then environment, then flags. Validated only once all three are in.
fn resolve_config(args: &Args) -> HarnessResult<(Option<PathBuf>, Config)> {
    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let config_path = loader.config_path.clone();
    let mut config = loader.into_config();
    args.apply(&mut config);
    config.validate()?;
    Ok((config_path, config))
}

fn run(args: Args) -> HarnessResult<u8> {
    let (config_path, config) = resolve_config(&args)?;

    init_tracing(&config.logging, args.verbose);
    match config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file, using defaults"),
    }

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(0);
    }

    let boards = pair_ports(
        &config.serial.prog_ports,
        &config.serial.uart_ports,
        config.serial.uart_offset(),
    )?;
    if boards.is_empty() {
        warn!("No boards configured; every suite will be skipped");
    }
    for (i, board) in boards.iter().enumerate() {
        info!("Board {}: programming {}, UART {}", i + 1, board.programming, board.uart);
    }

    let provider = SerialBoardProvider::new(boards, config.serial.read_timeout());
    let mut harness = Harness::new(Box::new(provider), config.run_options());
    if !config.flash.command.is_empty() {
        harness = harness.with_preparer(Box::new(CommandPreparer::new(config.flash.command.clone())));
    }
    if config.run.confirm {
        harness = harness.with_gate(Box::new(ConsolePrompt::stdio()));
    }

    let mut suites = config.suites.clone();
    suites.extend(args.suite.iter().cloned());
    if suites.is_empty() {
        return Err(HarnessError::NoSuites);
    }
    for suite in suites {
        harness.add_suite(suite);
    }

    let mut console = ConsoleReporter::stdout();
    harness.run_all(&mut console);
    harness.summarize(&mut console);

    if let Some(path) = &args.report {
        harness.report().save(path)?;
        info!("Report written to {}", path.display());
    }

    Ok(harness.exit_code())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("board-harness: {e}");
            ExitCode::from(HARNESS_FAILURE)
        }
    }
}
