use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;

use sdo_fetch::app::{App, FetchOptions, ProgressSink};
use sdo_fetch::config::{
    ConfigLoader, DEFAULT_OUTPUT_DIR, ResolvedConfig, validate_interval, validate_scale,
};
use sdo_fetch::daemon::{
    DEFAULT_DAEMON_LOG_FILE, DEFAULT_DAEMON_OUTPUT_DIR, DEFAULT_DAEMON_PATH, DaemonScript,
};
use sdo_fetch::domain::{FetchStrategy, Preset, SourceKey};
use sdo_fetch::error::SdoError;
use sdo_fetch::helioviewer::HelioviewerHttpClient;
use sdo_fetch::logging::init_logging;
use sdo_fetch::menu::{Menu, MenuChoice};
use sdo_fetch::monitor::{Monitor, MonitorOptions, StopSignal};
use sdo_fetch::output::{ConsoleOutput, JsonOutput, OutputMode, TimestampResult};
use sdo_fetch::store::OutputDir;

const MONITOR_OUTPUT_DIR: &str = "monitoring";

#[derive(Parser)]
#[command(name = "sdo-fetch")]
#[command(about = "Fetch the latest Solar Dynamics Observatory images from Helioviewer")]
#[command(version, author)]
struct Cli {
    /// Print JSON results instead of console progress
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Output directory for images and metadata
    #[arg(long, short = 'o', global = true)]
    output: Option<String>,

    /// Path to a JSON config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the latest image of one source")]
    Fetch(FetchArgs),
    #[command(about = "Download a preset or a list of sources")]
    Batch(BatchArgs),
    #[command(about = "Download sources repeatedly until interrupted")]
    Monitor(MonitorArgs),
    #[command(about = "List available sources")]
    Sources,
    #[command(about = "Print the latest available observation date")]
    Timestamp(TimestampArgs),
    #[command(about = "Write a standalone monitoring daemon script")]
    Daemon(DaemonArgs),
}

#[derive(Args, Clone, Default)]
struct StrategyArgs {
    #[arg(long)]
    strategy: Option<FetchStrategy>,

    /// Image scale in arcseconds per pixel (tile and screenshot strategies)
    #[arg(long)]
    scale: Option<f64>,
}

#[derive(Args, Clone)]
struct FetchArgs {
    #[arg(long, short = 's')]
    source: Option<String>,

    #[command(flatten)]
    strategy: StrategyArgs,
}

#[derive(Args, Clone)]
struct BatchArgs {
    #[arg(long, conflicts_with = "sources")]
    preset: Option<Preset>,

    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    #[command(flatten)]
    strategy: StrategyArgs,
}

#[derive(Args, Clone)]
struct MonitorArgs {
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Seconds between passes
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many passes
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    iterations: Option<u64>,

    /// Also append logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(flatten)]
    strategy: StrategyArgs,
}

#[derive(Args, Clone)]
struct TimestampArgs {
    /// Fall back to an approximate date instead of failing
    #[arg(long)]
    with_fallback: bool,
}

#[derive(Args, Clone)]
struct DaemonArgs {
    #[arg(long, default_value = DEFAULT_DAEMON_PATH)]
    path: String,

    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    #[arg(long)]
    interval: Option<u64>,

    #[arg(long, default_value = DEFAULT_DAEMON_LOG_FILE)]
    log_file: String,

    /// Binary the script invokes
    #[arg(long, default_value = "sdo-fetch")]
    binary: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SdoError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SdoError) -> u8 {
    match error {
        SdoError::InvalidSource(_)
        | SdoError::InvalidPreset(_)
        | SdoError::InvalidInterval(_)
        | SdoError::InvalidScale(_)
        | SdoError::ConfigRead(_)
        | SdoError::ConfigParse(_) => 2,
        SdoError::HelioviewerHttp(_)
        | SdoError::HelioviewerStatus { .. }
        | SdoError::UnexpectedResponse { .. } => 3,
        SdoError::Filesystem(_) => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Some(Commands::Monitor(args)) => args.log_file.clone(),
        _ => None,
    };
    init_logging(log_file.as_deref())?;

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let output = cli.output.map(Utf8PathBuf::from);

    match cli.command {
        Some(Commands::Fetch(args)) => run_fetch(args, &config, output, output_mode),
        Some(Commands::Batch(args)) => run_batch(args, &config, output, output_mode),
        Some(Commands::Monitor(args)) => run_monitor(args, &config, output, output_mode),
        Some(Commands::Sources) => match output_mode {
            OutputMode::NonInteractive => JsonOutput::print_sources().into_diagnostic(),
            OutputMode::Interactive => {
                ConsoleOutput::print_sources();
                Ok(())
            }
        },
        Some(Commands::Timestamp(args)) => run_timestamp(args, &config, output_mode),
        Some(Commands::Daemon(args)) => run_daemon(args, &config, output, output_mode),
        None => {
            if matches!(output_mode, OutputMode::Interactive) && std::io::stdout().is_terminal() {
                run_menu(&config, output)
            } else {
                let args = FetchArgs {
                    source: None,
                    strategy: StrategyArgs::default(),
                };
                run_fetch(args, &config, output, output_mode)
            }
        }
    }
}

fn build_app(
    config: &ResolvedConfig,
    output_dir: Utf8PathBuf,
) -> Result<App<HelioviewerHttpClient>, SdoError> {
    let client = HelioviewerHttpClient::new(config.timeout)?;
    Ok(App::new(OutputDir::new(output_dir), client, config.endpoints.clone())
        .with_request_timeout(config.timeout))
}

fn fetch_options(args: &StrategyArgs, config: &ResolvedConfig) -> Result<FetchOptions, SdoError> {
    let image_scale = match args.scale {
        Some(scale) => validate_scale(scale)?,
        None => config.image_scale,
    };
    Ok(FetchOptions {
        strategy: args.strategy.unwrap_or(config.strategy),
        image_scale,
    })
}

fn sink_for(output_mode: OutputMode) -> &'static dyn ProgressSink {
    match output_mode {
        OutputMode::Interactive => &ConsoleOutput,
        OutputMode::NonInteractive => &JsonOutput,
    }
}

fn run_fetch(
    args: FetchArgs,
    config: &ResolvedConfig,
    output: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let options = fetch_options(&args.strategy, config)?;
    let source = match args.source {
        Some(source) => source,
        None => config
            .sources
            .first()
            .map(|key| key.to_string())
            .ok_or_else(|| SdoError::InvalidSource("no source configured".to_string()))?,
    };
    // Rejects unknown names before the HTTP client is even built.
    let key: SourceKey = source.parse()?;

    let output_dir = output.unwrap_or_else(|| config.output_dir_or(DEFAULT_OUTPUT_DIR));
    let app = build_app(config, output_dir)?;
    let record = app.fetch_key(key, options, sink_for(output_mode))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_record(&record).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_record(&record);
            Ok(())
        }
    }
}

fn run_batch(
    args: BatchArgs,
    config: &ResolvedConfig,
    output: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let options = fetch_options(&args.strategy, config)?;
    let (sources, preset) = if args.sources.is_empty() {
        let preset = args.preset.unwrap_or(Preset::Multiple);
        (preset.sources(), Some(preset))
    } else {
        (SourceKey::parse_list(&args.sources)?, None)
    };

    let fallback_dir = preset.map_or(DEFAULT_OUTPUT_DIR, Preset::default_output_dir);
    let output_dir = output.unwrap_or_else(|| config.output_dir_or(fallback_dir));
    let app = build_app(config, output_dir)?;
    let result = app.fetch_batch(&sources, options, sink_for(output_mode));
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_batch(&result).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_batch(&result, preset);
            Ok(())
        }
    }
}

fn run_monitor(
    args: MonitorArgs,
    config: &ResolvedConfig,
    output: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let fetch = fetch_options(&args.strategy, config)?;
    let sources = if args.sources.is_empty() {
        config.sources.clone()
    } else {
        SourceKey::parse_list(&args.sources)?
    };
    let interval = match args.interval {
        Some(secs) => validate_interval(secs)?,
        None => config.interval,
    };
    let options = MonitorOptions {
        sources,
        interval,
        max_iterations: args.iterations,
        fetch,
    };

    let output_dir = output.unwrap_or_else(|| config.output_dir_or(MONITOR_OUTPUT_DIR));
    start_monitor(config, output_dir, &options, output_mode)
}

fn start_monitor(
    config: &ResolvedConfig,
    output_dir: Utf8PathBuf,
    options: &MonitorOptions,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = build_app(config, output_dir)?;
    let stop = StopSignal::new();
    stop.install_ctrlc_handler().into_diagnostic()?;

    if matches!(output_mode, OutputMode::Interactive) {
        println!(
            "Starting continuous monitoring of {} every {} seconds. Press Ctrl+C to stop.",
            options
                .sources
                .iter()
                .map(SourceKey::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            options.interval.as_secs()
        );
    }

    let summary = Monitor::new(&app, stop).run(options, sink_for(output_mode));
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_monitor(&summary).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_monitor(&summary);
            Ok(())
        }
    }
}

fn run_timestamp(
    args: TimestampArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = build_app(config, config.output_dir_or(DEFAULT_OUTPUT_DIR))?;
    if args.with_fallback {
        let date = app.resolve_date();
        return match output_mode {
            OutputMode::NonInteractive => JsonOutput::print_date(&date).into_diagnostic(),
            OutputMode::Interactive => {
                println!("Latest usable observation date: {}", date.value);
                Ok(())
            }
        };
    }

    let result = TimestampResult {
        latest: app.latest_timestamp()?,
    };
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_timestamp(&result).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_timestamp(&result);
            Ok(())
        }
    }
}

fn run_daemon(
    args: DaemonArgs,
    config: &ResolvedConfig,
    output: Option<Utf8PathBuf>,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let mut script = DaemonScript {
        binary: args.binary,
        log_file: args.log_file,
        output_dir: output
            .unwrap_or_else(|| config.output_dir_or(DEFAULT_DAEMON_OUTPUT_DIR))
            .to_string(),
        ..DaemonScript::default()
    };
    if !args.sources.is_empty() {
        script.sources = SourceKey::parse_list(&args.sources)?;
    }
    if let Some(secs) = args.interval {
        script.interval = validate_interval(secs)?;
    }

    let written = script.write(&Utf8PathBuf::from(args.path))?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_daemon(&written).into_diagnostic(),
        OutputMode::Interactive => {
            ConsoleOutput::print_daemon(&written);
            Ok(())
        }
    }
}

fn run_menu(config: &ResolvedConfig, output: Option<Utf8PathBuf>) -> miette::Result<()> {
    let choice = Menu::new(config.sources.clone()).run()?;
    let fetch = FetchOptions {
        strategy: config.strategy,
        image_scale: config.image_scale,
    };

    match choice {
        MenuChoice::Preset(preset) => {
            let output_dir =
                output.unwrap_or_else(|| config.output_dir_or(preset.default_output_dir()));
            let app = build_app(config, output_dir)?;
            println!("Downloading {}", preset.title());
            let result = app.fetch_batch(&preset.sources(), fetch, &ConsoleOutput);
            ConsoleOutput::print_batch(&result, Some(preset));
            Ok(())
        }
        MenuChoice::Monitor { sources, interval } => {
            let options = MonitorOptions {
                sources,
                interval,
                max_iterations: None,
                fetch,
            };
            let output_dir = output.unwrap_or_else(|| config.output_dir_or(MONITOR_OUTPUT_DIR));
            start_monitor(config, output_dir, &options, OutputMode::Interactive)
        }
        MenuChoice::CreateDaemon => {
            let script = DaemonScript {
                output_dir: output
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DAEMON_OUTPUT_DIR))
                    .to_string(),
                ..DaemonScript::default()
            };
            let written = script.write(&Utf8PathBuf::from(DEFAULT_DAEMON_PATH))?;
            ConsoleOutput::print_daemon(&written);
            Ok(())
        }
        MenuChoice::Exit => {
            println!("Goodbye!");
            Ok(())
        }
    }
}
