use std::{collections::BTreeSet, path::Path};

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use s3logs::{
    archive::{TASK_NAME, run_archive_cycle},
    check::{StatusLevel, run_status_check},
    config::S3logsConfig,
    db::LogStore,
    fetch::fetch_logs,
    services::S3ObjectStore,
};

/// CLI arguments for the S3 log archiver.
#[derive(Parser, Debug)]
#[command(version, about = "Archive aging log rows to S3 and retrieve per-course logs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "s3logs.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run one archive cycle (intended to be invoked on a schedule)
    ProcessLogs,
    /// Reconstruct per-course log files from the archive plus the live table
    FetchCourseLogs {
        /// Comma separated list of course ids, e.g. 101,102,103
        #[arg(long)]
        courses: Option<String>,
        /// Existing writable directory for the pulled log files
        #[arg(long)]
        logfolder: Option<String>,
    },
    /// Probe S3 connectivity, write permissions and the enable flag
    Status,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s3logs=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &str) -> S3logsConfig {
    match S3logsConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

/// Parse `--courses` into a set of ids. Each token must be a plain
/// base-10 integer: no sign, no decimal point, no whitespace.
fn parse_course_ids(raw: &str) -> Result<BTreeSet<i64>, String> {
    let mut ids = BTreeSet::new();

    for token in raw.split(',') {
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Invalid course id: '{token}'"));
        }
        let id: i64 = token
            .parse()
            .map_err(|_| format!("Invalid course id: '{token}'"))?;
        ids.insert(id);
    }

    if ids.is_empty() {
        return Err("No course ids supplied".into());
    }
    Ok(ids)
}

/// Check `--logfolder` is an existing, writable directory.
fn check_log_folder(path: &Path) -> Result<(), String> {
    if !path.is_dir() {
        return Err("Supplied path is not a directory".into());
    }

    let probe = path.join(".s3logs_write_probe");
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            Ok(())
        }
        Err(_) => Err("Supplied folder is not writable".into()),
    }
}

/// Report a CLI validation failure and exit.
///
/// Exits with status 0, not a failure code: validation problems are
/// reported to the operator as usage guidance, matching the historical
/// behavior of this tool.
fn usage_exit(message: Option<&str>) -> ! {
    if let Some(message) = message {
        eprintln!("{message}");
    }
    let _ = Args::command().print_help();
    std::process::exit(0);
}

async fn process_logs(config: &S3logsConfig) {
    tracing::info!(task = TASK_NAME, "Starting scheduled task");
    if !config.archive.enable {
        tracing::warn!("Log archiving is disabled by configuration, skipping cycle");
        return;
    }

    let db = match LogStore::connect(&config.database.url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to the database");
            std::process::exit(1);
        }
    };
    let store = S3ObjectStore::new(&config.s3).await;

    match run_archive_cycle(&db, &store, &config.archive).await {
        Ok(result) if result.is_noop() => {
            tracing::info!("No records found to process, finishing");
        }
        Ok(result) => {
            tracing::info!(
                rows = result.rows_archived,
                pages = result.pages_fetched,
                key = result.key.as_deref().unwrap_or(""),
                "Archive cycle finished"
            );
        }
        // Fatal: surface to the host scheduler through the exit status so
        // the failure is visible in run history.
        Err(e) => {
            tracing::error!(error = %e, "Archive cycle failed");
            std::process::exit(1);
        }
    }
}

async fn fetch_course_logs(
    config_path: &str,
    courses: Option<String>,
    logfolder: Option<String>,
) {
    // Validate the arguments before touching the config, the database or
    // the store; a usage mistake must not depend on either being present.
    let (Some(courses), Some(logfolder)) = (courses, logfolder) else {
        usage_exit(None);
    };

    let course_ids = match parse_course_ids(&courses) {
        Ok(ids) => ids,
        Err(message) => usage_exit(Some(message.as_str())),
    };

    let log_folder = Path::new(&logfolder);
    if let Err(message) = check_log_folder(log_folder) {
        usage_exit(Some(message.as_str()));
    }

    let config = load_config(config_path);
    let db = match LogStore::connect(&config.database.url).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to the database");
            std::process::exit(1);
        }
    };
    let store = S3ObjectStore::new(&config.s3).await;

    if let Err(e) = fetch_logs(&db, &store, &course_ids, log_folder).await {
        tracing::error!(error = %e, "Failed to fetch course logs");
        std::process::exit(1);
    }
}

async fn status(config: &S3logsConfig) {
    let store = S3ObjectStore::new(&config.s3).await;
    let result = run_status_check(&store, config.archive.enable).await;

    match result.level {
        StatusLevel::Ok => println!("OK: {}", result.summary),
        StatusLevel::Warning => println!("WARNING: {}", result.summary),
        StatusLevel::Error => {
            println!("ERROR: {}", result.summary);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let args = Args::parse();

    match args.command {
        Command::ProcessLogs => process_logs(&load_config(&args.config)).await,
        Command::FetchCourseLogs { courses, logfolder } => {
            fetch_course_logs(&args.config, courses, logfolder).await;
        }
        Command::Status => status(&load_config(&args.config)).await,
    }
}
