//! ---
//! airlift_section: "05-external-interfaces"
//! airlift_subsection: "binary"
//! airlift_type: "source"
//! airlift_scope: "code"
//! airlift_description: "Control CLI for operators driving the Airflow stack lifecycle."
//! airlift_version: "v0.1.0"
//! airlift_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::process::ExitCode;

use airlift_common::{init_tracing, LogFormat};
use airlift_lifecycle::{Operation, OperationError};
use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

mod operations;
mod scripts;
mod settings;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Airflow + Postgres environment lifecycle control",
    long_about = None
)]
struct Cli {
    /// Configuration file (AIRLIFT_CONFIG takes precedence when set).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding docker-compose.yaml, sql/ and the working directories.
    #[arg(
        long = "project-dir",
        global = true,
        value_name = "DIR",
        env = "AIRLIFT_PROJECT_DIR",
        default_value = "."
    )]
    project_dir: PathBuf,

    /// Console log format (overrides `logging.format`).
    #[arg(long = "log-format", global = true, value_enum)]
    log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stop the stack and remove its volumes.
    #[command(name = "down-airflow")]
    DownAirflow,
    /// Stop the stack and empty the logs, dags and plugins directories.
    #[command(name = "reset-airflow")]
    ResetAirflow,
    /// Initialize the Airflow metadata database and create the admin user.
    #[command(name = "init-airflow")]
    InitAirflow(operations::AdminArgs),
    /// Apply the application schema to the Postgres service.
    #[command(name = "create-schema")]
    CreateSchema,
    /// Start every service in the background.
    #[command(name = "up-airflow")]
    UpAirflow,
    /// Run the database inspection script inside the webserver.
    #[command(name = "ver-db")]
    VerDb,
    /// Full bring-up: reset, init, create-schema, up.
    #[command(name = "start")]
    Start(operations::AdminArgs),
    /// Print the effective configuration as YAML.
    #[command(name = "show-config")]
    ShowConfig,
    /// Render the Makefile or batch adapter that delegates to this binary.
    #[command(name = "scripts")]
    Scripts(scripts::ScriptsCommand),
}

impl Commands {
    fn operation(&self) -> Option<Operation> {
        match self {
            Commands::DownAirflow => Some(Operation::Down),
            Commands::ResetAirflow => Some(Operation::Reset),
            Commands::InitAirflow(_) => Some(Operation::Init),
            Commands::CreateSchema => Some(Operation::CreateSchema),
            Commands::UpAirflow => Some(Operation::Up),
            Commands::VerDb => Some(Operation::InspectDatabase),
            Commands::Start(_) => Some(Operation::Start),
            Commands::ShowConfig | Commands::Scripts(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Pretty,
    StructuredJson,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::StructuredJson => LogFormat::StructuredJson,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<OperationError>()
                .map(OperationError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Scripts(command) = &cli.command {
        return scripts::run(command);
    }

    ensure!(
        cli.project_dir.is_dir(),
        "project directory {} does not exist",
        cli.project_dir.display()
    );
    let project_dir = cli
        .project_dir
        .canonicalize()
        .with_context(|| format!("unable to resolve {}", cli.project_dir.display()))?;
    let loaded = settings::load(cli.config.as_deref(), &project_dir)?;
    let source = loaded.source;
    let mut config = loaded.config;
    if let Some(format) = cli.log_format {
        config.logging.format = format.into();
    }

    let operation = match cli.command.operation() {
        Some(operation) => operation,
        None => return settings::show(&config, &source),
    };

    let logging = settings::logging_for(&config.logging, &project_dir);
    init_tracing("airliftctl", &logging).context("unable to initialise logging")?;
    tracing::debug!(source = %source, "configuration loaded");

    let admin = match cli.command {
        Commands::InitAirflow(args) | Commands::Start(args) => args.apply(config.admin.clone()),
        _ => config.admin.clone(),
    };
    operations::run(operation, &config, &project_dir, admin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn every_operation_has_a_subcommand() {
        let command = Cli::command();
        for operation in Operation::ALL {
            assert!(
                command.find_subcommand(operation.cli_name()).is_some(),
                "missing subcommand {}",
                operation.cli_name()
            );
        }
    }

    #[test]
    fn subcommands_map_to_operations() {
        let cli = Cli::try_parse_from(["airliftctl", "ver-db"]).expect("parses");
        assert_eq!(cli.command.operation(), Some(Operation::InspectDatabase));
        let cli = Cli::try_parse_from(["airliftctl", "--project-dir", "/srv/etl", "show-config"])
            .expect("parses");
        assert_eq!(cli.command.operation(), None);
        assert_eq!(cli.project_dir, PathBuf::from("/srv/etl"));
    }
}
