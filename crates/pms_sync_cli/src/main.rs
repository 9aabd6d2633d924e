//! pms-sync CLI - mirror a practice-management platform into a local database.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::auth::AuthAction;
use crate::commands::operator::OperatorAction;
use crate::commands::shared::OutputFormat;

#[derive(Parser)]
#[command(name = "pms-sync")]
#[command(version)]
#[command(about = "Mirror a practice-management platform's REST API into SQL")]
#[command(
    long_about = "pms-sync pulls every entity of a veterinary practice-management platform \
(appointments, contacts, patients, consults, invoices and their reference data) \
through its paginated REST API and upserts them into a local SQL mirror. Runs \
are started from the command line or by a scheduler calling the trigger server, \
and every run is recorded in the sync_run_logs table."
)]
#[command(after_long_help = r#"EXAMPLES
    Seed the platform credential once:
        $ pms-sync auth seed --refresh-token "$PMS_REFRESH_TOKEN"

    Sync every entity now:
        $ pms-sync run

    Sync only two entities:
        $ pms-sync run --entities patients,consults

    Serve the trigger endpoint for a scheduler:
        $ pms-sync serve --bind 0.0.0.0:8080

    Generate shell completions:
        $ pms-sync completions bash > ~/.local/share/bash-completion/completions/pms-sync

CONFIGURATION
    pms-sync reads configuration from:
      1. ~/.config/pms-sync/config.toml (or $XDG_CONFIG_HOME/pms-sync/config.toml)
      2. ./pms-sync.toml
      3. Environment variables (PMS_SYNC_<SECTION>__<KEY>)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    PMS_SYNC_DATABASE__URL          Mirror database (default: ~/.local/state/pms-sync/mirror.db)
    PMS_SYNC_SOURCE__API_BASE       Platform API base URL
    PMS_SYNC_AUTH__TOKEN_URL        OAuth token endpoint
    PMS_SYNC_AUTH__CLIENT_ID        OAuth client id
    PMS_SYNC_AUTH__CLIENT_SECRET    OAuth client secret
    PMS_SYNC_TRIGGER__SECRET        Shared secret the scheduler sends as a bearer token
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger endpoint (/sync, /health)
    Serve {
        /// Address to listen on (default from config or 0.0.0.0:8080)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Run one sync now
    Run {
        /// Only sync these entities (comma separated), in catalog order
        #[arg(short, long, value_delimiter = ',')]
        entities: Vec<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage the platform credential
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Manage operators allowed to trigger a sync
    Operator {
        #[command(subcommand)]
        action: OperatorAction,
    },
    /// List the entity catalog in sync order
    Entities {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Show recent sync runs
    Runs {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: u64,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

fn init_tracing() {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("pms_sync=info,pms_sync_cli=info"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Spinners own the terminal; the server always logs.
    if !Term::stdout().is_term() || matches!(cli.command, Commands::Serve { .. }) {
        init_tracing();
    }

    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        Commands::Entities { output } => {
            commands::entities::handle_entities(*output)?;
            return Ok(());
        }
        _ => {}
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database URL; set PMS_SYNC_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    if let Commands::Migrate { action } = cli.command {
        return commands::migrate::handle_migrate(action, &database_url).await;
    }

    let db = Arc::new(pms_sync::connect_and_migrate(&database_url).await?);

    match cli.command {
        Commands::Serve { bind } => commands::serve::handle_serve(bind, &config, &db).await?,
        Commands::Run { entities, output } => {
            commands::run::handle_run(entities, output, &config, &db).await?
        }
        Commands::Auth { action } => commands::auth::handle_auth(action, &config, &db).await?,
        Commands::Operator { action } => {
            commands::operator::handle_operator(action, &db).await?
        }
        Commands::Runs { limit, output } => {
            commands::runs::handle_runs(limit, output, &db).await?
        }
        Commands::Migrate { .. }
        | Commands::Entities { .. }
        | Commands::Completions { .. }
        | Commands::Man { .. } => {}
    }

    Ok(())
}
