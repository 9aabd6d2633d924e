//! Client for the remote platform's paginated REST API.

pub mod pagination;
mod rate_limit;

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::catalog::EntityDefinition;
use crate::credential::AccessToken;
use crate::http::{HttpError, HttpRequest, HttpResponse, HttpTransport};

pub use pagination::{FetchFailure, FetchOutcome, FetchStop, fetch_all_pages};
pub use rate_limit::ApiRateLimiter;

/// Page cap per entity per run; bounds cyclic or runaway cursors.
pub const DEFAULT_MAX_PAGES: u32 = 50;

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("source URL cannot be a base: {0}")]
    NotABase(String),
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Authenticated access to the source API.
#[derive(Clone)]
pub struct SourceClient {
    transport: Arc<dyn HttpTransport>,
    api_base: Url,
    page_size: u32,
    limiter: Option<ApiRateLimiter>,
}

impl SourceClient {
    /// Client rooted at `api_base`, e.g. `https://api.pms.example/`.
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: &str) -> Result<Self> {
        let mut api_base = Url::parse(api_base)?;
        if api_base.cannot_be_a_base() {
            return Err(SourceError::NotABase(api_base.to_string()));
        }
        // `Url::join` would drop a last path segment without the slash.
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }

        Ok(Self {
            transport,
            api_base,
            page_size: DEFAULT_PAGE_SIZE,
            limiter: None,
        })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Pace page requests to `requests_per_second` (`0` leaves them unpaced).
    pub fn with_rate_limit(mut self, requests_per_second: u32) -> Self {
        self.limiter = ApiRateLimiter::new(requests_per_second);
        self
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// First-page URL for an entity: `<api_base>/<source_path>?page_size=N`.
    pub fn entity_url(&self, entity: &EntityDefinition) -> Result<Url> {
        let mut url = self.api_base.join(entity.source_path)?;
        url.query_pairs_mut()
            .append_pair("page_size", &self.page_size.to_string());
        Ok(url)
    }

    /// GET one page with the bearer token, waiting for the pacer first.
    pub async fn get_page(
        &self,
        url: &str,
        token: &AccessToken,
    ) -> std::result::Result<HttpResponse, HttpError> {
        if let Some(limiter) = &self.limiter {
            limiter.wait().await;
        }
        self.transport
            .send(HttpRequest::get_json(url, token.secret()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::http::MockTransport;

    fn client(base: &str) -> SourceClient {
        SourceClient::new(Arc::new(MockTransport::new()), base).expect("client")
    }

    #[test]
    fn entity_url_appends_path_and_page_size() {
        let catalog = Catalog::standard();
        let patients = catalog.get("patients").expect("patients");

        let url = client("https://pms.test/api").entity_url(patients).unwrap();
        assert_eq!(url.as_str(), "https://pms.test/api/v1/animal?page_size=100");

        let url = client("https://pms.test/api/")
            .with_page_size(25)
            .entity_url(patients)
            .unwrap();
        assert_eq!(url.as_str(), "https://pms.test/api/v1/animal?page_size=25");
    }

    #[test]
    fn invalid_base_urls_are_rejected() {
        assert!(matches!(
            SourceClient::new(Arc::new(MockTransport::new()), "not a url"),
            Err(SourceError::InvalidUrl(_))
        ));
        assert!(matches!(
            SourceClient::new(Arc::new(MockTransport::new()), "mailto:ops@clinic.test"),
            Err(SourceError::NotABase(_))
        ));
    }

    #[test]
    fn page_size_is_at_least_one() {
        let catalog = Catalog::standard();
        let url = client("https://pms.test/")
            .with_page_size(0)
            .entity_url(catalog.get("products").unwrap())
            .unwrap();
        assert_eq!(url.as_str(), "https://pms.test/v1/product?page_size=1");
    }
}
