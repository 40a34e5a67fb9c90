use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use roamcat_core::catalogue::raw::{CataloguePage, CountriesPayload, RawCountry};
use roamcat_core::catalogue::upstream::{CatalogueSource, UpstreamError};
use roamcat_core::config::UpstreamConfig;
use roamcat_core::domain::country::Country;
use roamcat_core::domain::package::is_iso2;

const API_KEY_HEADER: &str = "X-API-Key";
const MAX_ERROR_BODY: usize = 512;

/// Catalogue source backed by the provider's paginated HTTP API.
#[derive(Clone)]
pub struct HttpCatalogueSource {
    http: Client,
    base_url: String,
    catalogue_path: String,
    countries_path: String,
    api_key: Option<SecretString>,
}

impl HttpCatalogueSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| UpstreamError::Transport(format!("http client: {error}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            catalogue_path: config.catalogue_path.clone(),
            countries_path: config.countries_path.clone(),
            api_key: config.api_key.clone().filter(|key| !key.expose_secret().trim().is_empty()),
        })
    }

    pub fn catalogue_url(&self) -> String {
        join_url(&self.base_url, &self.catalogue_path)
    }

    pub fn countries_url(&self) -> Option<String> {
        let path = self.countries_path.trim();
        (!path.is_empty()).then(|| join_url(&self.base_url, path))
    }

    fn api_key(&self) -> Result<&str, UpstreamError> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .ok_or_else(|| UpstreamError::NotConfigured("upstream.api_key is not set".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let api_key = self.api_key()?;
        let response = self
            .http
            .get(url)
            .query(query)
            .header(API_KEY_HEADER, api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| UpstreamError::Transport(error.to_string()))?;

        let response = check_status(response).await?;
        response.json::<T>().await.map_err(|error| UpstreamError::Decode(error.to_string()))
    }
}

#[async_trait]
impl CatalogueSource for HttpCatalogueSource {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn fetch_page(&self, page: u32) -> Result<CataloguePage, UpstreamError> {
        let url = self.catalogue_url();
        debug!(event_name = "upstream.catalogue.request", page, url = %url, "requesting catalogue page");
        self.get_json(&url, &[("page", page.to_string())]).await
    }

    async fn fetch_countries(&self) -> Result<Vec<Country>, UpstreamError> {
        let url = self.countries_url().ok_or(UpstreamError::Unsupported)?;
        debug!(event_name = "upstream.countries.request", url = %url, "requesting countries");
        let payload: CountriesPayload = self.get_json(&url, &[]).await?;
        Ok(countries_from_payload(payload.countries))
    }
}

async fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY).rev().find(|index| body.is_char_boundary(*index)).unwrap_or(0);
        body.truncate(cut);
    }
    Err(UpstreamError::Status { status: status.as_u16(), body })
}

fn join_url(base_url: &str, path: &str) -> String {
    if path.is_empty() {
        return base_url.to_string();
    }
    format!("{base_url}/{}", path.trim_start_matches('/'))
}

/// Keeps entries with an ISO-2 code; the name falls back to the code.
fn countries_from_payload(raw: Vec<RawCountry>) -> Vec<Country> {
    raw.into_iter()
        .filter_map(|country| {
            let code = country.iso?.trim().to_ascii_uppercase();
            if !is_iso2(&code) {
                return None;
            }
            let name = country
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| code.clone());
            Some(Country::new(code, name))
        })
        .collect()
}
