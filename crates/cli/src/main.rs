mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tidemark_core::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tidemark")]
#[command(version, about = "Schema migration tool for MongoDB")]
struct Cli {
    /// MongoDB connection string (overrides MONGODB_URL)
    #[arg(long, global = true)]
    mongodb_url: Option<String>,

    /// Database name (overrides MONGODB_DATABASE)
    #[arg(long, global = true)]
    database: Option<String>,

    /// Migrations directory (overrides MIGRATIONS_DIR)
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new migration file
    Create {
        /// Human-readable description, slugified into the filename
        description: String,
    },

    /// Apply all pending migrations in timestamp order
    Migrate,

    /// Revert the most recently applied migration, or a named one
    Rollback {
        /// Identifier to revert instead of the most recent one
        #[arg(long)]
        target: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },

    /// Show applied/pending state for every known migration
    Status,

    /// List available migrations with their status
    List,
}

impl Cli {
    /// Environment-derived configuration with CLI flags layered on top.
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(url) = &self.mongodb_url {
            config.mongodb_url = url.clone();
        }
        if let Some(database) = &self.database {
            config.database = Some(database.clone());
        }
        if let Some(dir) = &self.migrations_dir {
            config.migrations_dir = dir.clone();
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Commands::Create { description } => commands::create::run(&config, &description).await,
        Commands::Migrate => commands::migrate::run(&config).await,
        Commands::Rollback { target, yes } => {
            commands::rollback::run(&config, target.as_deref(), yes).await
        }
        Commands::Status => commands::status::run(&config).await,
        Commands::List => commands::list::run(&config).await,
    }
}
