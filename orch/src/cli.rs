//! CLI command definitions: entity CRUD plus `execute`, `run`, and
//! `interactive`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "orch", about = "Supervised code-agent orchestrator", version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Path to the config file; overrides the `.orchestrator.yml` / XDG lookup chain.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); overrides RUST_LOG.
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Project CRUD.
    Project {
        #[command(subcommand)]
        command: EntityCommand,
    },
    /// Epic CRUD + execute.
    Epic {
        #[command(subcommand)]
        command: EntityCommand,
    },
    /// Story CRUD + execute.
    Story {
        #[command(subcommand)]
        command: EntityCommand,
    },
    /// Task CRUD + execute.
    Task {
        #[command(subcommand)]
        command: EntityCommand,
    },
    /// Subtask CRUD + execute.
    Subtask {
        #[command(subcommand)]
        command: EntityCommand,
    },
    /// Milestone CRUD + execute.
    Milestone {
        #[command(subcommand)]
        command: EntityCommand,
    },

    /// Start the interactive REPL.
    Interactive,

    /// Invoke the orchestrator's iteration loop against an existing task id.
    Run {
        task_id: String,

        #[arg(long)]
        max_iterations: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
pub enum EntityCommand {
    Create {
        title: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        /// Working directory for a new project; ignored for work items.
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
    List {
        #[arg(long)]
        project: Option<String>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    Show {
        id: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,
    },
    Delete {
        id: String,

        #[arg(long)]
        hard: bool,
    },
    Execute {
        id: String,

        #[arg(long)]
        max_iterations: Option<u32>,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
