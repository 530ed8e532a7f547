use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ssesweep::{LogFormat, RunMode, S3Store, SweepConfig, SweepError, SweepReport, SweepRunner, StoreError};
use tabled::{Table, settings::Style};

#[derive(Parser)]
#[command(name = "ssesweep")]
#[command(about = "S3 server-side encryption audit and remediation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// S3 bucket to sweep
    #[arg(short, long, env = "BUCKET_NAME", global = true)]
    bucket: Option<String>,

    /// Only sweep keys under this prefix
    #[arg(long, env = "BUCKET_PREFIX", global = true)]
    prefix: Option<String>,

    /// AWS region
    #[arg(long = "aws-region", env = "AWS_REGION", global = true)]
    region: Option<String>,

    /// Custom endpoint for S3-compatible stores (enables path-style addressing)
    #[arg(long, env = "S3_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// AWS named profile (role) to use
    #[arg(short = 'r', long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// Per-object outcome log (default: <timestamp>_<mode>_<bucket>.log)
    #[arg(short = 'l', long = "log-file-name", env = "LOG_FILE_NAME", global = true)]
    log_file: Option<PathBuf>,

    /// Per-object outcome log format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormatArg>,

    /// Worker count per pool (default is number of CPUs x 16)
    #[arg(short, long, env = "WORKER_COUNT", global = true)]
    workers: Option<usize>,

    /// Capacity of each inter-stage queue (default is workers x 2)
    #[arg(long, global = true)]
    queue_capacity: Option<usize>,

    /// Required server-side encryption algorithm
    #[arg(long, env = "TARGET_ALGORITHM", global = true)]
    target_algorithm: Option<String>,

    /// KMS key id, only with --target-algorithm aws:kms
    #[arg(long, env = "KMS_KEY_ID", global = true)]
    kms_key_id: Option<String>,

    /// Log a progress summary every N objects
    #[arg(long, global = true)]
    progress_interval: Option<u64>,

    /// YAML file with sweep settings; command-line flags take precedence
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Summary output format
    #[arg(short, long, default_value = "table", global = true)]
    output: OutputFormat,

    /// Verbose mode
    #[arg(short, long, env = "VERBOSE", global = true)]
    verbose: bool,

    /// Debug mode
    #[arg(long, env = "DEBUG", global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the encryption status of each object
    Report,

    /// Rewrite every non-compliant object with the target encryption
    #[command(alias = "encrypt")]
    Remediate {
        /// Log what would be remediated without copying anything
        #[arg(long)]
        dry_run: bool,

        /// Post-copy metadata reads before a remediation counts as failed
        #[arg(long)]
        verify_attempts: Option<u32>,

        /// Delay between post-copy metadata reads, in milliseconds
        #[arg(long)]
        verify_delay_ms: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Jsonl,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Jsonl => LogFormat::Jsonl,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "ssesweep=trace,info"
    } else if cli.verbose {
        "ssesweep=debug,info"
    } else {
        "ssesweep=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(e.as_ref());
            print_error(e);
            code
        }
    }
}

fn exit_code(err: &(dyn std::error::Error + 'static)) -> ExitCode {
    match err.downcast_ref::<SweepError>() {
        Some(SweepError::Config(_)) | Some(SweepError::Yaml(_)) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn print_error(err: Box<dyn std::error::Error>) {
    if let Some(sweep_err) = err.downcast_ref::<SweepError>() {
        if let Some(store_err) = sweep_err.store_error() {
            print_store_error(sweep_err, store_err);
            return;
        }
    }

    eprintln!("\x1b[31m✗ Error:\x1b[0m {}", err);
}

fn print_store_error(err: &SweepError, store_err: &StoreError) {
    eprintln!("\n\x1b[31m✗ S3 Error [{}]\x1b[0m", store_err.error_code());
    eprintln!("  {}", err);
    eprintln!("\n\x1b[33mSuggestion:\x1b[0m");
    for line in store_err.suggestion().lines() {
        eprintln!("  {}", line);
    }
    eprintln!();
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (mode, config) = build_config(&cli)?;
    config.validate()?;

    let store = S3Store::connect(&config.connection()).await?;
    let runner = SweepRunner::new(Arc::new(store), config);

    let report = runner.run(mode).await?;
    print_report(&report, cli.output)?;

    Ok(())
}

fn build_config(cli: &Cli) -> Result<(RunMode, SweepConfig), SweepError> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading settings from {}", path.display());
            SweepConfig::load(path)?
        }
        None => SweepConfig::default(),
    };

    if let Some(bucket) = &cli.bucket {
        config.bucket = bucket.clone();
    }
    if cli.prefix.is_some() {
        config.prefix = cli.prefix.clone();
    }
    if cli.region.is_some() {
        config.region = cli.region.clone();
    }
    if cli.endpoint.is_some() {
        config.endpoint = cli.endpoint.clone();
    }
    if cli.profile.is_some() {
        config.profile = cli.profile.clone();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }
    if let Some(format) = cli.log_format {
        config.log_format = format.into();
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if cli.queue_capacity.is_some() {
        config.queue_capacity = cli.queue_capacity;
    }
    if let Some(algorithm) = &cli.target_algorithm {
        config.target_algorithm = algorithm.clone();
    }
    if cli.kms_key_id.is_some() {
        config.kms_key_id = cli.kms_key_id.clone();
    }
    if let Some(interval) = cli.progress_interval {
        config.progress_interval = interval;
    }

    let mode = match &cli.command {
        Commands::Report => RunMode::Report,
        Commands::Remediate { dry_run, verify_attempts, verify_delay_ms } => {
            config.dry_run = config.dry_run || *dry_run;
            if let Some(attempts) = verify_attempts {
                config.verify_attempts = *attempts;
            }
            if let Some(delay) = verify_delay_ms {
                config.verify_delay_ms = *delay;
            }
            RunMode::Remediate
        }
    };

    Ok((mode, config))
}

fn print_report(report: &SweepReport, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(report)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new(report.rows());
            table.with(Style::rounded());
            println!("{}", table);

            let mode = if report.dry_run {
                format!("{} (dry run)", report.mode.as_str())
            } else {
                report.mode.as_str().to_string()
            };
            println!(
                "\n{} s3://{} swept in {} mode: {} objects across {} pages in {:.1}s",
                "✓".green(),
                report.bucket,
                mode,
                report.discovered,
                report.pages,
                report.elapsed_ms as f64 / 1000.0
            );

            if report.counters.failed > 0 {
                println!(
                    "{} {} objects failed; see the outcome log and re-run to retry",
                    "⚠".yellow(),
                    report.counters.failed
                );
            }

            if let Some(path) = &report.log_file {
                println!("  Outcome log: {}", path.display());
            }
        }
    }

    Ok(())
}
