//! Cursor-following page walker.
//!
//! Each page is `{"results": [...], "next": "<url>" | null}` (a bare array is
//! accepted as a single final page). The walk ends when `next` is absent or
//! when `max_pages` pages have been fetched, whichever comes first, so a cursor
//! that never ends still terminates. An error mid-walk stops it and keeps what
//! was already fetched.

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::credential::AccessToken;
use crate::sync::{ProgressCallback, SyncProgress, emit};

use super::SourceClient;

/// Why a page walk stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStop {
    /// The last page had no `next` cursor.
    Exhausted,
    /// `max_pages` pages were fetched and a cursor remained.
    PageCap,
    /// A page could not be fetched or decoded.
    Failed(FetchFailure),
}

/// Where and why a page walk failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// 1-indexed page that failed.
    pub page: u32,
    pub url: String,
    pub reason: String,
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "page {} ({}): {}", self.page, self.url, self.reason)
    }
}

/// Everything fetched for one entity.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub records: Vec<Value>,
    pub pages_fetched: u32,
    pub stop: FetchStop,
}

impl FetchOutcome {
    pub fn failure(&self) -> Option<&FetchFailure> {
        match &self.stop {
            FetchStop::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

struct Page {
    records: Vec<Value>,
    next: Option<String>,
}

/// Walk every page starting at `start_url`.
///
/// Never returns an error: a failed page ends the walk with
/// [`FetchStop::Failed`] and the records gathered so far.
pub async fn fetch_all_pages(
    client: &SourceClient,
    token: &AccessToken,
    entity: &str,
    start_url: &str,
    max_pages: u32,
    on_progress: Option<&ProgressCallback>,
) -> FetchOutcome {
    let mut records: Vec<Value> = Vec::new();
    let mut pages_fetched = 0u32;
    let mut url = start_url.to_string();

    loop {
        if pages_fetched >= max_pages {
            warn!(
                entity = %entity,
                pages = pages_fetched,
                "page cap reached with a cursor remaining; stopping"
            );
            return FetchOutcome {
                records,
                pages_fetched,
                stop: FetchStop::PageCap,
            };
        }

        let page_number = pages_fetched + 1;
        let page = match fetch_page(client, token, &url).await {
            Ok(page) => page,
            Err(reason) => {
                warn!(
                    entity = %entity,
                    page = page_number,
                    url = %url,
                    reason = %reason,
                    "page fetch failed; keeping {} records already fetched",
                    records.len()
                );
                emit(
                    on_progress,
                    SyncProgress::FetchStopped {
                        entity: entity.to_string(),
                        page: page_number,
                        reason: reason.clone(),
                    },
                );
                return FetchOutcome {
                    records,
                    pages_fetched,
                    stop: FetchStop::Failed(FetchFailure {
                        page: page_number,
                        url,
                        reason,
                    }),
                };
            }
        };

        pages_fetched = page_number;
        let count = page.records.len();
        records.extend(page.records);

        debug!(entity = %entity, page = page_number, count, "fetched page");
        emit(
            on_progress,
            SyncProgress::FetchedPage {
                entity: entity.to_string(),
                page: page_number,
                count,
                total_so_far: records.len(),
            },
        );

        let Some(next) = page.next else {
            return FetchOutcome {
                records,
                pages_fetched,
                stop: FetchStop::Exhausted,
            };
        };

        url = match resolve_next(&url, &next) {
            Ok(resolved) => resolved,
            Err(reason) => {
                warn!(entity = %entity, next = %next, reason = %reason, "unusable next cursor");
                return FetchOutcome {
                    records,
                    pages_fetched,
                    stop: FetchStop::Failed(FetchFailure {
                        page: page_number + 1,
                        url: next,
                        reason,
                    }),
                };
            }
        };
    }
}

async fn fetch_page(client: &SourceClient, token: &AccessToken, url: &str) -> Result<Page, String> {
    let response = client
        .get_page(url, token)
        .await
        .map_err(|e| e.to_string())?;

    if !response.is_success() {
        return Err(format!(
            "HTTP {}: {}",
            response.status,
            response.body_snippet()
        ));
    }

    let body: Value =
        serde_json::from_slice(&response.body).map_err(|e| format!("invalid JSON: {e}"))?;
    parse_page(body)
}

fn parse_page(body: Value) -> Result<Page, String> {
    match body {
        Value::Array(records) => Ok(Page {
            records,
            next: None,
        }),
        Value::Object(mut map) => {
            let records = match map.remove("results") {
                Some(Value::Array(records)) => records,
                Some(Value::Null) | None => {
                    return Err("response has no results array".to_string());
                }
                Some(_) => return Err("results is not an array".to_string()),
            };
            let next = match map.remove("next") {
                Some(Value::String(next)) if !next.trim().is_empty() => Some(next),
                _ => None,
            };
            Ok(Page { records, next })
        }
        _ => Err("response is neither an object nor an array".to_string()),
    }
}

/// Resolve a possibly relative `next` cursor against the current page URL.
fn resolve_next(current: &str, next: &str) -> Result<String, String> {
    let base = Url::parse(current).map_err(|e| e.to_string())?;
    base.join(next)
        .map(|url| url.to_string())
        .map_err(|e| e.to_string())
}
