//! worktrace CLI - Command-line interface for the worktrace engine
//!
//! Commands:
//! - report: Window metrics and trends for an entry batch
//! - buckets: Daily, weekly or monthly series
//! - daily: Per-day KPI records
//! - validate: Check which entries survive normalization
//! - doctor: Diagnose configuration and environment

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use worktrace::encoder::ReportEncoder;
use worktrace::types::NormalizationReport;
use worktrace::{
    parse_batch, AggregationMode, EngineConfig, EngineInput, MetricsEngine, MetricsError, Resolution,
    ZonePolicy, PRODUCER_NAME, WORKTRACE_VERSION,
};

/// worktrace - Working-day metrics for time-tracking data
#[derive(Parser)]
#[command(name = "worktrace")]
#[command(version = WORKTRACE_VERSION)]
#[command(about = "Compute working-day KPIs from time-tracking entries", long_about = None)]
struct Cli {
    /// Log debug output to stderr (otherwise RUST_LOG applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Window metrics and trends
    Report {
        #[command(flatten)]
        io: IoArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Bucketed series with running means
    Buckets {
        #[command(flatten)]
        io: IoArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Bucket granularity (daily, weekly, monthly)
        #[arg(long, default_value = "weekly")]
        resolution: Resolution,

        /// Headline roll-up of hour metrics (sum, mean)
        #[arg(long, default_value = "sum")]
        mode: AggregationMode,
    },

    /// Per-day KPI records
    Daily {
        #[command(flatten)]
        io: IoArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Check which entries survive normalization
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        #[command(flatten)]
        engine: EngineArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,

        /// Fail when any entry is dropped
        #[arg(long)]
        strict: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct IoArgs {
    /// Input file path (use - for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Output format
    #[arg(long, default_value = "json-pretty")]
    output_format: OutputFormat,
}

#[derive(Args)]
struct EngineArgs {
    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time zone for local times: UTC, an IANA name, or an offset like +02:00
    #[arg(long)]
    zone: Option<ZonePolicy>,

    /// Local hour from which activity counts as late work
    #[arg(long)]
    late_hour: Option<u32>,

    /// Trend threshold in minutes
    #[arg(long)]
    threshold: Option<u32>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

fn run(command: Commands) -> Result<(), WorktraceCliError> {
    match command {
        Commands::Report { io, engine } => {
            let engine = engine.build()?;
            let input = read_batch(&io.input)?;
            let result = engine.analyze(&input);
            write_output(&io, &ReportEncoder::new().encode(result))
        }

        Commands::Buckets {
            io,
            engine,
            resolution,
            mode,
        } => {
            let engine = engine.build()?;
            let input = read_batch(&io.input)?;
            let series = engine.buckets(&input, resolution, mode);
            write_output(&io, &ReportEncoder::new().encode(series))
        }

        Commands::Daily { io, engine } => {
            let engine = engine.build()?;
            let input = read_batch(&io.input)?;
            let (entries, _) = engine.normalize(&input);
            let kpis = engine.daily_kpis(&entries);
            write_output(&io, &ReportEncoder::new().encode(kpis))
        }

        Commands::Validate {
            input,
            engine,
            json,
            strict,
        } => cmd_validate(&input, engine, json, strict),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

impl EngineArgs {
    /// Config file first, then flag overrides
    fn build(self) -> Result<MetricsEngine, WorktraceCliError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
            None => EngineConfig::default(),
        };

        if let Some(zone) = self.zone {
            config = config.with_zone(zone);
        }
        if let Some(late_hour) = self.late_hour {
            config = config.with_late_hour(late_hour);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_trend_threshold(threshold);
        }

        debug!("engine config: zone={}, late_hour={}", config.zone, config.late_hour);
        Ok(MetricsEngine::new(config)?)
    }
}

fn read_input(input: &Path) -> Result<String, WorktraceCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_batch(input: &Path) -> Result<EngineInput, WorktraceCliError> {
    let batch = parse_batch(&read_input(input)?)?;
    info!("read {} entries", batch.entries.len());
    Ok(batch)
}

fn write_output<T: Serialize>(io_args: &IoArgs, value: &T) -> Result<(), WorktraceCliError> {
    let mut data = match io_args.output_format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    data.push('\n');

    if io_args.output.to_string_lossy() == "-" {
        print!("{data}");
    } else {
        fs::write(&io_args.output, data)?;
    }
    Ok(())
}

fn cmd_validate(input: &Path, engine: EngineArgs, json: bool, strict: bool) -> Result<(), WorktraceCliError> {
    let engine = engine.build()?;
    let batch = read_batch(input)?;
    let (entries, report) = engine.normalize(&batch);
    let working_days = engine.working_days(&entries).len();

    if json {
        let output = ValidationOutput {
            normalization: &report,
            working_days,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_validation(&report, working_days);
    }

    if strict && report.dropped() > 0 {
        Err(WorktraceCliError::ValidationFailed(report.dropped()))
    } else {
        Ok(())
    }
}

fn print_validation(report: &NormalizationReport, working_days: usize) {
    println!("Validation Report");
    println!("=================");
    println!("Total entries:  {}", report.total);
    println!("Kept entries:   {}", report.kept);
    println!("Working days:   {working_days}");

    if report.dropped() > 0 {
        println!("\nDropped:");
        println!("  - unparseable start:     {}", report.dropped_unparseable_start);
        println!("  - missing or bad stop:   {}", report.dropped_missing_stop);
        println!("  - non-positive duration: {}", report.dropped_non_positive_duration);
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), WorktraceCliError> {
    let mut checks = vec![DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("worktrace version {WORKTRACE_VERSION}"),
    }];

    if let Some(path) = config {
        checks.push(check_config(path));
    }

    // Named zones come from the compiled-in tz database
    checks.push(match "Europe/Zurich".parse::<ZonePolicy>() {
        Ok(_) => DoctorCheck {
            name: "tz_database".to_string(),
            status: CheckStatus::Ok,
            message: "IANA zone names resolve".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "tz_database".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    });

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; pass --input or pipe an entry batch".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe".to_string(),
        }
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: WORKTRACE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("worktrace Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error)) {
        Err(WorktraceCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    let (status, message) = if !path.exists() {
        (CheckStatus::Warning, "config file does not exist".to_string())
    } else {
        match fs::read_to_string(path) {
            Ok(content) => match EngineConfig::from_json(&content) {
                Ok(config) => (
                    CheckStatus::Ok,
                    format!(
                        "config valid (zone {}, windows {:?})",
                        config.zone,
                        config.all_windows()
                    ),
                ),
                Err(e) => (CheckStatus::Error, e.to_string()),
            },
            Err(e) => (CheckStatus::Error, format!("cannot read config file: {e}")),
        }
    };

    DoctorCheck {
        name: "config".to_string(),
        status,
        message,
    }
}

// Error handling

enum WorktraceCliError {
    Io(io::Error),
    Engine(MetricsError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for WorktraceCliError {
    fn from(e: io::Error) -> Self {
        WorktraceCliError::Io(e)
    }
}

impl From<MetricsError> for WorktraceCliError {
    fn from(e: MetricsError) -> Self {
        WorktraceCliError::Engine(e)
    }
}

impl From<serde_json::Error> for WorktraceCliError {
    fn from(e: serde_json::Error) -> Self {
        WorktraceCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<WorktraceCliError> for CliError {
    fn from(e: WorktraceCliError) -> Self {
        match e {
            WorktraceCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            WorktraceCliError::Engine(e) => {
                let (code, hint) = match &e {
                    MetricsError::ParseError(_) | MetricsError::JsonError(_) => (
                        "PARSE_ERROR",
                        "Input must be an entry batch object or an array of entries",
                    ),
                    MetricsError::InvalidTimezone(_) => {
                        ("INVALID_TIMEZONE", "Use UTC, an IANA name, or an offset like +02:00")
                    }
                    MetricsError::InvalidConfig(_) => ("INVALID_CONFIG", "Run 'worktrace doctor --config <file>'"),
                    MetricsError::EncodingError(_) => ("ENCODING_ERROR", "Report this as a bug"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            WorktraceCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            WorktraceCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} entries were dropped during normalization"),
                hint: Some("Run 'worktrace validate' without --strict for details".to_string()),
            },
            WorktraceCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationOutput<'a> {
    normalization: &'a NormalizationReport,
    working_days: usize,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
