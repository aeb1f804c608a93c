use clap::{Args, Parser, Subcommand, ValueEnum};
use mite_workitem::application::commands::{
    AppState, StoreKind, WorkItemTarget, configure_impl, list_projects_impl, list_services_impl,
    save_defaults_impl, start_impl, status_impl, stop_impl, test_connection_impl,
};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const LOG_FILE_NAME: &str = "mite-workitem.log";

#[derive(Debug, Parser)]
#[command(name = "mite-workitem", version, about = "Track work item time in mite")]
struct Cli {
    /// Workspace holding `config/` and `logs/`. Defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = StoreArg::File, global = true)]
    store: StoreArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StoreArg {
    File,
    Keyring,
}

impl From<StoreArg> for StoreKind {
    fn from(value: StoreArg) -> Self {
        match value {
            StoreArg::File => StoreKind::File,
            StoreArg::Keyring => StoreKind::Keyring,
        }
    }
}

#[derive(Debug, Args)]
struct WorkItemArgs {
    /// Host project the work item belongs to.
    #[arg(long)]
    project: String,

    #[arg(long = "work-item")]
    work_item: u64,

    /// Title used for the note of a newly created entry.
    #[arg(long)]
    title: Option<String>,
}

impl From<WorkItemArgs> for WorkItemTarget {
    fn from(args: WorkItemArgs) -> Self {
        Self {
            host_project_id: args.project,
            work_item_id: args.work_item,
            title: args.title,
        }
    }
}

#[derive(Debug, Args)]
struct CredentialArgs {
    #[arg(long)]
    account: String,

    #[arg(long = "api-key")]
    api_key: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show tracking state for a work item.
    Status(WorkItemArgs),
    /// Start tracking a work item, creating today's entry if needed.
    Start(WorkItemArgs),
    /// Stop the tracker on the work item's entry.
    Stop(WorkItemArgs),
    /// Save account name and API key.
    Configure(CredentialArgs),
    /// Check credentials against mite without saving them.
    TestConnection(CredentialArgs),
    /// Save default mite project and service for a host project.
    Defaults {
        #[arg(long)]
        project: String,
        #[arg(long = "mite-project")]
        mite_project: Option<u64>,
        #[arg(long = "mite-service")]
        mite_service: Option<u64>,
    },
    /// List mite projects.
    Projects {
        #[arg(long)]
        project: String,
    },
    /// List mite services.
    Services {
        #[arg(long)]
        project: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let workspace_root = match cli.root {
        Some(path) => path,
        None => match env::current_dir() {
            Ok(path) => path,
            Err(error) => {
                eprintln!("cannot determine working directory: {error}");
                return ExitCode::FAILURE;
            }
        },
    };

    let state = match AppState::new(workspace_root, cli.store.into()) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("startup failed: {error}");
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = init_logging(state.logs_dir());
    tracing::debug!(workspace = %state.workspace_root().display(), "workspace ready");

    match run(&state, cli.command).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(state: &AppState, command: Command) -> Result<bool, String> {
    match command {
        Command::Status(args) => {
            let response = status_impl(state, &args.into()).await;
            print_json(&response)?;
            Ok(response.succeeded())
        }
        Command::Start(args) => {
            let response = start_impl(state, &args.into()).await;
            print_json(&response)?;
            Ok(response.succeeded())
        }
        Command::Stop(args) => {
            let response = stop_impl(state, &args.into()).await;
            print_json(&response)?;
            Ok(response.succeeded())
        }
        Command::Configure(args) => {
            let response = configure_impl(state, args.account, args.api_key)
                .await
                .map_err(|error| state.command_error("configure", &error))?;
            print_json(&response)?;
            Ok(true)
        }
        Command::TestConnection(args) => {
            let check = test_connection_impl(state, args.account, args.api_key).await;
            print_json(&check)?;
            Ok(check.is_granted())
        }
        Command::Defaults {
            project,
            mite_project,
            mite_service,
        } => {
            save_defaults_impl(state, project, mite_project, mite_service)
                .await
                .map_err(|error| state.command_error("defaults", &error))?;
            print_json(&serde_json::json!({ "saved": true }))?;
            Ok(true)
        }
        Command::Projects { project } => {
            let projects = list_projects_impl(state, project)
                .await
                .map_err(|error| state.command_error("projects", &error))?;
            print_json(&projects)?;
            Ok(true)
        }
        Command::Services { project } => {
            let services = list_services_impl(state, project)
                .await
                .map_err(|error| state.command_error("services", &error))?;
            print_json(&services)?;
            Ok(true)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn init_logging(logs_dir: &Path) -> WorkerGuard {
    let debug_enabled = env::var("MITE_WORKITEM_DEBUG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (file_writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_NAME));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}
