use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use log_export_engine::cli_style::{format_job_row, get_styles, styled_status};
use log_export_engine::config::{AppConfig, CliConfig, FileConfig};
use log_export_engine::log_export::{JobId, LogExportService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rustyline::{
    completion::Completer, highlight::Highlighter, history::FileHistory, validate::Validator,
    CompletionType, Config, Editor, Helper,
};

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// Path to a TOML config file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the source log and the produced exports.
    #[clap(long, value_parser = parse_path, default_value = "logs")]
    pub logs_dir: PathBuf,

    /// File name of the source log inside the logs directory.
    #[clap(long, default_value = "app.log")]
    pub source_log: String,

    /// Fixed prefix of export file names. Defaults to the source log name.
    #[clap(long)]
    pub artifact_prefix: Option<String>,

    /// Extension of export file names.
    #[clap(long, default_value = "log")]
    pub artifact_extension: String,

    /// Maximum number of exports running at the same time.
    #[clap(long, default_value_t = 4)]
    pub max_concurrent_exports: usize,

    /// Artificial delay added to every export, in milliseconds.
    #[clap(long, default_value_t = 0)]
    pub export_delay_ms: u64,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            logs_dir: args.logs_dir.clone(),
            source_log: args.source_log.clone(),
            artifact_prefix: args.artifact_prefix.clone(),
            artifact_extension: args.artifact_extension.clone(),
            max_concurrent_exports: args.max_concurrent_exports,
            export_delay_ms: args.export_delay_ms,
        }
    }
}

#[derive(Parser)]
#[command(styles=get_styles(),name = "")]
struct InnerCli {
    #[command(subcommand)]
    command: InnerCommand,
}

#[derive(Subcommand)]
enum InnerCommand {
    /// Starts exporting the source log lines that contain the given date.
    Create { date: String },

    /// Shows the status of an export job.
    Status { id: JobId },

    /// Blocks until an export job completes or fails.
    Wait { id: JobId },

    /// Copies the file produced by a completed export job.
    Download {
        id: JobId,
        /// Destination path, defaults to logfile_<id>.log in the current directory.
        #[clap(long)]
        out: Option<PathBuf>,
    },

    /// Lists the export jobs known to this session.
    Jobs {
        #[clap(long)]
        json: bool,
    },

    /// Shows the logs directory and the source log in use.
    Where,

    /// Close this program.
    Exit,
}

enum CommandExecutionResult {
    Ok,
    Exit,
    Error(String),
}

const PROMPT: &str = ">> ";

fn execute_command(
    line: String,
    service: &LogExportService,
    runtime: &Handle,
) -> CommandExecutionResult {
    if line.is_empty() {
        return CommandExecutionResult::Ok;
    }

    let args =
        shlex::split(&line).unwrap_or_else(|| line.split_whitespace().map(String::from).collect());

    let cli = InnerCli::try_parse_from(std::iter::once(" ").chain(args.iter().map(String::as_str)));

    match cli {
        Ok(cli) => match cli.command {
            InnerCommand::Create { date } => match service.create(&date) {
                Ok(id) => println!("Export job {} started.", id),
                Err(err) => return CommandExecutionResult::Error(err.to_string()),
            },
            InnerCommand::Status { id } => match service.status(id) {
                Ok(status) => println!("Job {}: {}", id, styled_status(&status)),
                Err(err) => return CommandExecutionResult::Error(err.to_string()),
            },
            InnerCommand::Wait { id } => {
                match runtime.block_on(service.wait_until_terminal(id, WAIT_POLL_INTERVAL)) {
                    Ok(status) => println!("Job {}: {}", id, styled_status(&status)),
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                }
            }
            InnerCommand::Download { id, out } => {
                let artifact = match service.download(id) {
                    Ok(x) => x,
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                };
                let destination = out.unwrap_or_else(|| PathBuf::from(artifact.download_name()));
                let bytes = match runtime.block_on(artifact.read()) {
                    Ok(x) => x,
                    Err(err) => return CommandExecutionResult::Error(err.to_string()),
                };
                if let Err(err) = std::fs::write(&destination, &bytes) {
                    return CommandExecutionResult::Error(format!(
                        "Could not write {}: {}",
                        destination.display(),
                        err
                    ));
                }
                println!(
                    "Saved {} ({} bytes) to {}",
                    artifact.file_name,
                    bytes.len(),
                    destination.display()
                );
            }
            InnerCommand::Jobs { json } => {
                let jobs = service.jobs();
                if json {
                    match serde_json::to_string_pretty(&jobs) {
                        Ok(text) => println!("{}", text),
                        Err(err) => return CommandExecutionResult::Error(err.to_string()),
                    }
                } else if jobs.is_empty() {
                    println!("  (no export jobs)");
                } else {
                    for job in jobs.iter() {
                        println!("{}", format_job_row(job));
                    }
                }
            }
            InnerCommand::Where => {
                println!("Logs directory: {}", service.exports_dir().display());
                println!("Source log:     {}", service.source_log().display());
                println!("Running jobs:   {}", service.in_flight());
            }
            InnerCommand::Exit => return CommandExecutionResult::Exit,
        },

        Err(e) => {
            if e.print().is_err() {
                println!("{}", e);
            }
        }
    }
    CommandExecutionResult::Ok
}

#[derive(rustyline_derive::Hinter)]
struct ConsoleHelper {
    commands_names: Vec<String>,
}

impl ConsoleHelper {
    pub fn new() -> Self {
        let commands_names: Vec<String> = InnerCli::command()
            .get_subcommands()
            .map(|sc| sc.get_name().to_string())
            .collect();

        ConsoleHelper { commands_names }
    }
}

impl Completer for ConsoleHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        if line.contains(' ') {
            return Ok((0, Vec::with_capacity(0)));
        }
        let matches = self
            .commands_names
            .iter()
            .filter(|c| c.starts_with(line))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        Ok((0, matches))
    }
}

impl Highlighter for ConsoleHelper {}
impl Validator for ConsoleHelper {}
impl Helper for ConsoleHelper {}

fn run_console(service: &LogExportService, runtime: &Handle) -> Result<()> {
    InnerCli::command().print_long_help()?;

    let config = Config::builder()
        .completion_type(CompletionType::List)
        .build();

    let mut rl = Editor::<ConsoleHelper, FileHistory>::with_config(config)?;
    rl.set_helper(Some(ConsoleHelper::new()));

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);
                match execute_command(line.trim().to_string(), service, runtime) {
                    CommandExecutionResult::Ok => {}
                    CommandExecutionResult::Exit => {
                        break;
                    }
                    CommandExecutionResult::Error(err) => {
                        eprintln!("Error: {}", err);
                        continue;
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("CTRL-D: exiting.");
                break;
            }
            Err(e) => {
                println!("Error: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    if !app_config.source_log_path().exists() {
        warn!(
            "Source log {:?} does not exist yet, exports will fail until it does",
            app_config.source_log_path()
        );
    }

    let service = Arc::new(LogExportService::open(app_config.export_settings()));

    let console_service = Arc::clone(&service);
    let runtime = Handle::current();
    tokio::task::spawn_blocking(move || run_console(&console_service, &runtime))
        .await
        .context("Console thread panicked")??;

    service.shutdown().await;
    info!("Bye");
    Ok(())
}
