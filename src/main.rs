//! # bizdesk CLI
//!
//! The `bizdesk` binary runs the web app and exposes the upload pipeline and
//! chat from the command line.
//!
//! ## Usage
//!
//! ```bash
//! bizdesk --config ./config/bizdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bizdesk init` | Create the business table and the vector collection |
//! | `bizdesk serve` | Start the HTTP server |
//! | `bizdesk ingest <file> --name <business>` | Upload a document from disk |
//! | `bizdesk ask <business_id> "<question>"` | Ask the assistant a question |
//! | `bizdesk show <business_id>` | Print a stored business |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `bizdesk=info,tower_http=info`).

use bizdesk::{commands, config, migrate, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// bizdesk: document-grounded customer support for small businesses.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/bizdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "bizdesk",
    about = "bizdesk: document-grounded customer support for small businesses",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bizdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the business table and vector collection.
    ///
    /// Idempotent, running it multiple times is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Run the upload pipeline on a local file.
    Ingest {
        /// Document to upload (pdf, doc, docx, txt, csv).
        file: PathBuf,

        /// Display name of the business.
        #[arg(long)]
        name: String,
    },

    /// Ask the assistant a question about a stored business.
    Ask {
        business_id: String,
        question: String,
    },

    /// Print a stored business with its FAQs and products.
    Show { business_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bizdesk=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            migrate::run_migrations(&cfg).await?;
            server::run_server(&cfg).await?;
        }
        Commands::Ingest { file, name } => {
            commands::run_ingest(&cfg, &file, &name).await?;
        }
        Commands::Ask {
            business_id,
            question,
        } => {
            commands::run_ask(&cfg, &business_id, &question).await?;
        }
        Commands::Show { business_id } => {
            commands::run_show(&cfg, &business_id).await?;
        }
    }

    Ok(())
}
