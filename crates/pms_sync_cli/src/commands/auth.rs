//! Credential bootstrap and inspection.

use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;
use console::style;
use pms_sync::credential::{CredentialUpdate, expiry_after, store, token_is_expired};
use sea_orm::DatabaseConnection;
use tabled::{Table, Tabled, settings::Style};

use super::shared::{OutputFormat, credential_manager, transport};
use crate::config::Config;

/// Credential subcommands.
#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the platform's initial token pair
    ///
    /// Without --access-token the stored token is already expired, so the
    /// first run refreshes it using the refresh token.
    Seed {
        /// Refresh token issued by the platform
        #[arg(long, env = "PMS_SYNC_SEED_REFRESH_TOKEN")]
        refresh_token: String,

        /// Current access token, if you have one
        #[arg(long)]
        access_token: Option<String>,

        /// Seconds until --access-token expires
        #[arg(long, default_value_t = 0)]
        expires_in: i64,
    },
    /// Show the stored credential's expiry
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Obtain a valid access token now, refreshing if needed
    Refresh,
}

pub(crate) async fn handle_auth(
    action: AuthAction,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AuthAction::Seed {
            refresh_token,
            access_token,
            expires_in,
        } => seed(db, &refresh_token, access_token.as_deref(), expires_in).await,
        AuthAction::Status { output } => status(db, config, output).await,
        AuthAction::Refresh => refresh(db, config).await,
    }
}

async fn seed(
    db: &DatabaseConnection,
    refresh_token: &str,
    access_token: Option<&str>,
    expires_in: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    if refresh_token.trim().is_empty() {
        return Err("refresh token must not be empty".into());
    }

    let now = Utc::now();
    let expires_at = expiry_after(now, expires_in.max(0))?;
    store::save(
        db,
        &CredentialUpdate {
            access_token: access_token.unwrap_or_default(),
            refresh_token,
            expires_at,
            issued_at: now,
        },
    )
    .await?;

    println!(
        "{} Stored platform credential (access token {})",
        style("✓").green().bold(),
        if expires_at > now {
            format!("valid until {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"))
        } else {
            "will be refreshed on the next run".to_string()
        }
    );
    Ok(())
}

#[derive(Debug, serde::Serialize, Tabled)]
struct CredentialDetail {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

async fn status(
    db: &DatabaseConnection,
    config: &Config,
    output: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(credential) = store::load(db).await? else {
        println!("No platform credential stored.");
        println!();
        println!("Seed one with:");
        println!("  pms-sync auth seed --refresh-token <TOKEN>");
        return Ok(());
    };

    let now = Utc::now();
    let expires_at = credential.expires_at.with_timezone(&Utc);
    let margin = config.safety_margin()?;
    let expired = token_is_expired(expires_at, margin, now);

    let details = vec![
        CredentialDetail {
            property: "Issued".to_string(),
            value: credential.issued_at.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        },
        CredentialDetail {
            property: "Expires".to_string(),
            value: credential.expires_at.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        },
        CredentialDetail {
            property: "Remaining".to_string(),
            value: format!("{}s", (expires_at - now).num_seconds().max(0)),
        },
        CredentialDetail {
            property: "Needs refresh".to_string(),
            value: if expired { "yes" } else { "no" }.to_string(),
        },
    ];

    match output {
        OutputFormat::Table => {
            let mut table = Table::new(details);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&details)?),
    }
    Ok(())
}

async fn refresh(db: &Arc<DatabaseConnection>, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let manager = credential_manager(config, db, transport(config)?)?;
    let token = manager.try_get_valid_token(Utc::now()).await?;
    println!(
        "{} Access token valid until {}",
        style("✓").green().bold(),
        token.expires_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(())
}
