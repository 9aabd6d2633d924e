//! One-shot sync in-process.

use std::sync::Arc;

use console::style;
use pms_sync::sync::{EntitySyncResult, RunRequest, SyncReport, TriggerSource};
use sea_orm::DatabaseConnection;
use tabled::{Table, Tabled, settings::Style};

use super::shared::{OutputFormat, build_engine, format_duration_ms};
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Display row for one entity's result.
#[derive(Debug, Tabled)]
struct ResultRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Pages")]
    pages: u32,
    #[tabled(rename = "Fetched")]
    fetched: i64,
    #[tabled(rename = "Upserted")]
    upserted: i64,
    #[tabled(rename = "Errored")]
    errored: i64,
    #[tabled(rename = "Time")]
    elapsed: String,
}

impl From<&EntitySyncResult> for ResultRow {
    fn from(result: &EntitySyncResult) -> Self {
        Self {
            entity: result.entity.clone(),
            status: result.status.to_string(),
            mode: result
                .mode
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
            pages: result.pages,
            fetched: result.fetched,
            upserted: result.upserted,
            errored: result.errored,
            elapsed: format_duration_ms(result.elapsed_ms),
        }
    }
}

pub(crate) async fn handle_run(
    entities: Vec<String>,
    output: OutputFormat,
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = build_engine(config, db)?;

    let reporter = Arc::new(match output {
        OutputFormat::Table => ProgressReporter::new(),
        OutputFormat::Json => ProgressReporter::logging(),
    });
    let callback = reporter.as_callback();

    let request = RunRequest::new(TriggerSource::Cli).with_entities(entities);
    let result = engine.run(request, Some(&callback)).await;
    reporter.finish();
    let report = result?;

    match output {
        OutputFormat::Table => print_report(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn print_report(report: &SyncReport) {
    let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("\n{table}");

    let status = match report.status {
        pms_sync::RunStatus::Completed => style(report.status.to_string()).green().bold(),
        pms_sync::RunStatus::Partial => style(report.status.to_string()).yellow().bold(),
        pms_sync::RunStatus::Failed => style(report.status.to_string()).red().bold(),
    };
    println!(
        "Run {}: {} fetched, {} upserted, {} errored in {}",
        status,
        report.total_records,
        report.total_upserted,
        report.total_errored(),
        format_duration_ms(report.total_elapsed_ms)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pms_sync::sync::{EntityStatus, FetchMode};

    #[test]
    fn rows_show_dash_for_entities_that_never_fetched() {
        let skipped = EntitySyncResult::skipped("invoices");
        let row = ResultRow::from(&skipped);
        assert_eq!(row.mode, "-");
        assert_eq!(row.status, "skipped");

        let synced = EntitySyncResult {
            entity: "patients".to_string(),
            fetched: 12,
            upserted: 12,
            errored: 0,
            elapsed_ms: 2_500,
            status: EntityStatus::Synced,
            mode: Some(FetchMode::Incremental),
            pages: 1,
            error: None,
        };
        let row = ResultRow::from(&synced);
        assert_eq!(row.mode, "incremental");
        assert_eq!(row.elapsed, "2.5s");
    }
}
