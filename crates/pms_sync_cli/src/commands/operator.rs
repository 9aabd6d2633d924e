//! Operator accounts allowed to trigger a sync with a session token.

use chrono::Utc;
use clap::Subcommand;
use console::style;
use pms_sync::entity::operator::{ActiveModel, Column, Entity as Operator, Model};
use pms_sync::trigger::token_digest;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tabled::{Table, Tabled, settings::Style};
use uuid::Uuid;

use super::shared::OutputFormat;

/// Operator subcommands.
#[derive(Subcommand)]
pub enum OperatorAction {
    /// Add an operator and print their session token
    ///
    /// The token is shown once; only its SHA-256 digest is stored.
    Add {
        /// Operator email
        email: String,
    },
    /// Issue a new session token for an operator (invalidates the old one)
    Rotate {
        /// Operator email
        email: String,
    },
    /// Deactivate an operator
    Revoke {
        /// Operator email
        email: String,
    },
    /// List operators
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
}

#[derive(Debug, Clone, serde::Serialize, Tabled)]
struct OperatorDisplay {
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Created")]
    created_at: String,
}

impl From<&Model> for OperatorDisplay {
    fn from(operator: &Model) -> Self {
        Self {
            email: operator.email.clone(),
            active: operator.is_active,
            created_at: operator.created_at.format("%Y-%m-%d").to_string(),
        }
    }
}

pub(crate) async fn handle_operator(
    action: OperatorAction,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        OperatorAction::Add { email } => add(db, &email).await,
        OperatorAction::Rotate { email } => rotate(db, &email).await,
        OperatorAction::Revoke { email } => revoke(db, &email).await,
        OperatorAction::List { output } => list(db, output).await,
    }
}

/// A fresh random session token.
fn new_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

async fn find(db: &DatabaseConnection, email: &str) -> Result<Model, Box<dyn std::error::Error>> {
    Ok(Operator::find()
        .filter(Column::Email.eq(email))
        .one(db)
        .await?
        .ok_or_else(|| format!("Operator '{email}' not found"))?)
}

async fn add(db: &DatabaseConnection, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(format!("'{email}' is not an email address").into());
    }
    if Operator::find()
        .filter(Column::Email.eq(&email))
        .one(db)
        .await?
        .is_some()
    {
        return Err(format!("Operator '{email}' already exists").into());
    }

    let token = new_session_token();
    ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        token_sha256: Set(token_digest(&token)),
        is_active: Set(true),
        created_at: Set(Utc::now().fixed_offset()),
    }
    .insert(db)
    .await?;

    println!("{} Added operator '{}'", style("✓").green().bold(), style(&email).cyan());
    print_token(&token);
    Ok(())
}

async fn rotate(db: &DatabaseConnection, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let operator = find(db, &email.trim().to_lowercase()).await?;
    let token = new_session_token();

    let mut active: ActiveModel = operator.into();
    active.token_sha256 = Set(token_digest(&token));
    active.is_active = Set(true);
    let operator = active.update(db).await?;

    println!(
        "{} Rotated token for '{}'",
        style("✓").green().bold(),
        style(&operator.email).cyan()
    );
    print_token(&token);
    Ok(())
}

async fn revoke(db: &DatabaseConnection, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let operator = find(db, &email.trim().to_lowercase()).await?;
    if !operator.is_active {
        println!("Operator '{}' is already inactive.", operator.email);
        return Ok(());
    }

    let mut active: ActiveModel = operator.into();
    active.is_active = Set(false);
    let operator = active.update(db).await?;

    println!(
        "{} Revoked operator '{}'",
        style("✓").green().bold(),
        style(&operator.email).cyan()
    );
    Ok(())
}

async fn list(db: &DatabaseConnection, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let operators = Operator::find().order_by_asc(Column::Email).all(db).await?;

    if operators.is_empty() {
        println!("No operators configured.");
        println!();
        println!("Add one with:");
        println!("  pms-sync operator add vet@clinic.example");
        return Ok(());
    }

    let displays: Vec<OperatorDisplay> = operators.iter().map(OperatorDisplay::from).collect();
    match output {
        OutputFormat::Table => {
            let mut table = Table::new(displays);
            table.with(Style::rounded());
            println!("{table}");
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&displays)?),
    }
    Ok(())
}

fn print_token(token: &str) {
    println!();
    println!("  Session token: {}", style(token).bold());
    println!();
    println!("  Send it as `Authorization: Bearer <token>` to /sync.");
    println!("  It will not be shown again.");
}
