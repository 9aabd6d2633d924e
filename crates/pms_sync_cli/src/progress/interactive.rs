use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use pms_sync::sync::{EntityStatus, EntitySyncResult, RunPhase, SyncProgress};

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// Run-level spinner (authentication, then the final summary).
    run_bar: Option<ProgressBar>,
    /// One spinner per entity, by name.
    entity_bars: HashMap<String, ProgressBar>,
    /// Failed batches per entity, shown in the entity's final line.
    failed_batches: HashMap<String, usize>,
}

/// Interactive progress reporter using indicatif.
///
/// All mutable state is consolidated into a single `Mutex<ProgressState>`
/// to ensure consistent updates.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        match event {
            SyncProgress::Phase(RunPhase::Authenticating) => {
                let pb = self.spinner("Auth");
                pb.set_message("Obtaining access token...");
                state.run_bar = Some(pb);
            }

            SyncProgress::Phase(RunPhase::Authenticated) => {
                if let Some(pb) = state.run_bar.take() {
                    pb.finish_with_message("✓ access token ready");
                }
            }

            SyncProgress::Phase(RunPhase::AuthFailed) => {
                if let Some(pb) = state.run_bar.take() {
                    pb.abandon_with_message("✗ no valid access token");
                }
            }

            SyncProgress::EntityStarted {
                entity,
                mode,
                position,
                total,
            } => {
                let pb = self.spinner(&entity);
                pb.set_message(format!("[{position}/{total}] {mode} fetch..."));
                state.entity_bars.insert(entity, pb);
            }

            SyncProgress::FetchedPage {
                entity,
                page,
                total_so_far,
                ..
            } => {
                if let Some(pb) = state.entity_bars.get(&entity) {
                    pb.set_message(format!("Page {page} ({total_so_far} records)"));
                }
            }

            SyncProgress::FetchStopped {
                entity,
                page,
                reason,
            } => {
                if let Some(pb) = state.entity_bars.get(&entity) {
                    pb.set_message(format!("⚠ page {page} failed: {reason}"));
                }
            }

            SyncProgress::PersistingBatch {
                entity,
                batch,
                size,
            } => {
                if let Some(pb) = state.entity_bars.get(&entity) {
                    pb.set_message(format!("Saving batch {batch} ({size} records)"));
                }
            }

            SyncProgress::BatchFailed { entity, .. } => {
                *state.failed_batches.entry(entity).or_default() += 1;
            }

            SyncProgress::EntityCompleted { result } => {
                let failed = state
                    .failed_batches
                    .get(&result.entity)
                    .copied()
                    .unwrap_or(0);
                if let Some(pb) = state.entity_bars.remove(&result.entity) {
                    pb.finish_with_message(completion_message(&result, failed));
                }
            }

            SyncProgress::EntitySkipped { entity, .. } => {
                let pb = self.spinner(&entity);
                pb.finish_with_message("· skipped (time budget spent)");
            }

            SyncProgress::RunCompleted {
                total_upserted,
                total_errored,
                elapsed_ms,
            } => {
                let pb = self.spinner("Done");
                pb.finish_with_message(format!(
                    "{total_upserted} upserted, {total_errored} errored in {:.1}s",
                    elapsed_ms as f64 / 1000.0
                ));
            }

            _ => {}
        }
    }

    /// Finish any bars still spinning.
    pub fn finish(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        for (_, pb) in state.entity_bars.drain() {
            pb.finish();
        }
        if let Some(pb) = state.run_bar.take() {
            pb.finish();
        }
    }

    fn spinner(&self, prefix: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(Self::spinner_style());
        pb.set_prefix(format!("{prefix:20}"));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn completion_message(result: &EntitySyncResult, failed_batches: usize) -> String {
    match result.status {
        EntityStatus::Synced => format!(
            "✓ {} records saved ({} pages)",
            result.upserted, result.pages
        ),
        EntityStatus::Partial if failed_batches > 0 => format!(
            "⚠ {}/{} saved, {} errored in {} batch(es)",
            result.upserted, result.fetched, result.errored, failed_batches
        ),
        EntityStatus::Partial => format!(
            "⚠ {}/{} saved, {} errored",
            result.upserted, result.fetched, result.errored
        ),
        EntityStatus::Crashed => format!(
            "✗ crashed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
        EntityStatus::Skipped => "· skipped".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pms_sync::sync::FetchMode;

    fn result(status: EntityStatus) -> EntitySyncResult {
        EntitySyncResult {
            entity: "patients".to_string(),
            fetched: 30,
            upserted: 20,
            errored: 10,
            elapsed_ms: 5,
            status,
            mode: Some(FetchMode::Full),
            pages: 3,
            error: None,
        }
    }

    #[test]
    fn completion_messages_reflect_status() {
        assert!(completion_message(&result(EntityStatus::Synced), 0).starts_with('✓'));
        assert_eq!(
            completion_message(&result(EntityStatus::Partial), 1),
            "⚠ 20/30 saved, 10 errored in 1 batch(es)"
        );
        let mut crashed = result(EntityStatus::Crashed);
        crashed.error = Some("table missing".to_string());
        assert_eq!(completion_message(&crashed, 0), "✗ crashed: table missing");
    }

    #[test]
    fn events_for_unknown_entities_are_ignored() {
        let reporter = InteractiveReporter::new();
        reporter.handle(SyncProgress::FetchedPage {
            entity: "ghost".to_string(),
            page: 1,
            count: 1,
            total_so_far: 1,
        });
        reporter.finish();
    }
}
