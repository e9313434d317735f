use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use megamemory::{cli, config, server};

#[derive(Parser)]
#[command(
    name = "megamemory",
    version,
    about = "Per-project knowledge graph MCP server for coding agents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Merge two graph files, surfacing disagreements as conflicts
    Merge {
        /// Left graph file (overwritten unless --into is given)
        file1: String,
        /// Right graph file
        file2: String,
        /// Write the merged graph here instead of overwriting file1
        #[arg(long)]
        into: Option<String>,
        /// Branch label recorded on left-side conflict variants
        #[arg(long, default_value = "left")]
        left_label: String,
        /// Branch label recorded on right-side conflict variants
        #[arg(long, default_value = "right")]
        right_label: String,
    },
    /// List unresolved merge conflicts
    Conflicts {
        /// Path to the knowledge store
        #[arg(long)]
        db: Option<String>,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve one conflict group
    Resolve {
        /// Merge group UUID (see `megamemory conflicts`)
        merge_group: String,
        /// Which side to keep: left, right, or both
        #[arg(long)]
        keep: Option<String>,
        /// Path to the knowledge store
        #[arg(long)]
        db: Option<String>,
    },
    /// Show graph statistics
    Stats {
        /// Path to the knowledge store
        #[arg(long)]
        db: Option<String>,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.megamemory/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::KnowledgeConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            server::serve_stdio(config).await?;
        }
        Command::Merge {
            file1,
            file2,
            into,
            left_label,
            right_label,
        } => {
            cli::merge::merge(
                &file1,
                &file2,
                into.as_deref(),
                &left_label,
                &right_label,
            )?;
        }
        Command::Conflicts { db, json } => {
            cli::conflicts::conflicts(db.as_deref(), json)?;
        }
        Command::Resolve {
            merge_group,
            keep,
            db,
        } => {
            cli::resolve::resolve(&merge_group, keep.as_deref(), db.as_deref())?;
        }
        Command::Stats { db } => {
            cli::stats::stats(db.as_deref())?;
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
