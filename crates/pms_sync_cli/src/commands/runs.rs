//! Recent sync runs from the audit log.

use chrono::Utc;
use pms_sync::SyncRunLogModel;
use pms_sync::audit;
use sea_orm::DatabaseConnection;
use tabled::{Table, Tabled, settings::Style};

use super::shared::{OutputFormat, format_duration_ms};

#[derive(Debug, Tabled)]
struct RunDisplay {
    #[tabled(rename = "Started")]
    started_at: String,
    #[tabled(rename = "Trigger")]
    sync_type: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Synced")]
    records_synced: i64,
    #[tabled(rename = "Errored")]
    records_errored: i64,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl From<&SyncRunLogModel> for RunDisplay {
    fn from(run: &SyncRunLogModel) -> Self {
        Self {
            started_at: run.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            sync_type: run.sync_type.clone(),
            status: run.status.to_string(),
            mode: run.mode.to_string(),
            records_synced: run.records_synced,
            records_errored: run.records_errored,
            duration: format_duration_ms(u64::try_from(run.duration_ms).unwrap_or_default()),
        }
    }
}

pub(crate) async fn handle_runs(
    limit: u64,
    output: OutputFormat,
    db: &DatabaseConnection,
) -> Result<(), Box<dyn std::error::Error>> {
    let runs = audit::recent_runs(db, limit).await?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&runs)?);
            return Ok(());
        }
        OutputFormat::Table if runs.is_empty() => {
            println!("No sync runs recorded yet.");
            return Ok(());
        }
        OutputFormat::Table => {
            let rows: Vec<RunDisplay> = runs.iter().map(RunDisplay::from).collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }

    match audit::last_successful_run(db).await? {
        Some(run) => println!(
            "Last successful sync: {} ago",
            format_age(run.age(Utc::now()).num_seconds())
        ),
        None => println!("No successful sync yet."),
    }
    Ok(())
}

fn format_age(secs: i64) -> String {
    match secs.max(0) {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d {}h", s / 86_400, (s % 86_400) / 3600),
    }
}
