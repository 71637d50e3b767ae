//! CLI entry point for tasklist.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tasklist_app::{MemoryStore, ProjectConfig, TaskListController, open_store, open_store_at, seed_if_fresh};
use tasklist_core::TaskId;
use time::OffsetDateTime;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;

/// Tasks ordered by due date, kept in a local database.
#[derive(Parser, Debug)]
#[command(
    name = "tasklist",
    version,
    about = "tasklist: tasks ordered by due date, stored in SQLite"
)]
struct Cli {
    /// Project directory holding `.tasklist/` (defaults to current).
    #[arg(long)]
    project: Option<PathBuf>,

    /// Database file; overrides the environment and config.
    #[arg(long, conflicts_with = "in_memory")]
    db: Option<PathBuf>,

    /// Keep tasks in memory for this invocation only.
    #[arg(long)]
    in_memory: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a task.
    Add {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        details: String,
        /// RFC 3339 or `YYYY-MM-DD HH:MM` (UTC).
        #[arg(long, value_parser = commands::parse_due)]
        due: Option<OffsetDateTime>,
    },

    /// Change fields of a task; omitted fields keep their values.
    Edit {
        #[arg(long)]
        id: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        details: Option<String>,
        #[arg(long, value_parser = commands::parse_due, conflicts_with = "clear_due")]
        due: Option<OffsetDateTime>,
        #[arg(long)]
        clear_due: bool,
    },

    /// Complete (delete) a task.
    Done {
        #[arg(long)]
        id: TaskId,
    },

    /// Delete every task.
    Clear {
        /// Actually delete instead of reporting what would go.
        #[arg(long)]
        yes: bool,
    },

    /// List tasks in due order.
    Ls {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    install_tracing();
    tokio::runtime::Runtime::new()?.block_on(execute(cli))
}

async fn execute(cli: Cli) -> Result<()> {
    let Cli {
        project,
        db,
        in_memory,
        cmd,
    } = cli;
    let workdir = project.unwrap_or_else(|| PathBuf::from("."));
    let config = ProjectConfig::from_workdir(&workdir)?;

    let controller = if in_memory {
        let store = Arc::new(MemoryStore::new());
        seed_if_fresh(&config, store.as_ref(), true)?;
        TaskListController::spawn(store)
    } else if let Some(path) = db {
        TaskListController::spawn(open_store_at(&config, &path)?)
    } else {
        TaskListController::spawn(open_store(&config, &workdir)?)
    };

    let outcome = commands::run(cmd, &controller, &config.display).await;
    controller.shutdown().await;
    outcome
}

fn install_tracing() {
    // RUST_LOG is honoured; the default level is INFO.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
