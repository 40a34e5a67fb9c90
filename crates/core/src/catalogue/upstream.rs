use async_trait::async_trait;
use thiserror::Error;

use crate::catalogue::raw::CataloguePage;
use crate::domain::country::Country;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream catalogue is not configured: {0}")]
    NotConfigured(String),
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),
    #[error("upstream does not provide this endpoint")]
    Unsupported,
}

impl UpstreamError {
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

/// Paginated read-only access to the provider catalogue.
#[async_trait]
pub trait CatalogueSource: Send + Sync {
    /// False when required credentials are missing; the refresher backs off
    /// instead of issuing requests.
    fn is_configured(&self) -> bool;

    async fn fetch_page(&self, page: u32) -> Result<CataloguePage, UpstreamError>;

    async fn fetch_countries(&self) -> Result<Vec<Country>, UpstreamError> {
        Err(UpstreamError::Unsupported)
    }
}

/// Source used when no provider is wired in; every call reports misconfiguration.
#[derive(Default)]
pub struct UnconfiguredSource;

#[async_trait]
impl CatalogueSource for UnconfiguredSource {
    fn is_configured(&self) -> bool {
        false
    }

    async fn fetch_page(&self, _page: u32) -> Result<CataloguePage, UpstreamError> {
        Err(UpstreamError::NotConfigured("no catalogue source configured".to_string()))
    }
}
