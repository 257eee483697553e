use crate::listings::request::QueryRequest;
use crate::listings::traits::ListingsSource;
use crate::models::QueryResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const LISTINGS_PATH: &str = "/api/listings";
const HEALTH_PATH: &str = "/healthz";

#[derive(Debug, Deserialize)]
struct Health {
    #[serde(default)]
    ok: bool,
}

/// HTTP client for the listings backend
pub struct ListingsClient {
    client: Client,
    api_base: String,
}

impl ListingsClient {
    /// Create a client for the backend at `api_base` (e.g. `http://localhost:8000`)
    pub fn new(api_base: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("map-scout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Ask the backend whether it is up
    pub async fn health(&self) -> Result<bool> {
        let url = self.url(HEALTH_PATH);
        debug!("Checking backend health at {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach listings backend")?;

        if !response.status().is_success() {
            warn!("Health check returned status: {}", response.status());
            return Ok(false);
        }

        let health: Health = response
            .json()
            .await
            .context("Failed to parse health response")?;
        Ok(health.ok)
    }
}

#[async_trait]
impl ListingsSource for ListingsClient {
    async fn fetch(&self, request: &QueryRequest) -> Result<QueryResult> {
        let url = self.url(LISTINGS_PATH);
        let pairs = request.query_pairs();

        debug!("Fetching {} with {} parameters", url, pairs.len());

        let response = self
            .client
            .get(&url)
            .query(&pairs)
            .send()
            .await
            .context("Failed to fetch listings")?;

        if !response.status().is_success() {
            warn!("Listings backend returned status: {}", response.status());
            anyhow::bail!("Listings request failed: {}", response.status());
        }

        let result: QueryResult = response
            .json()
            .await
            .context("Failed to parse listings response")?;

        info!(
            "Received {} listings for {}",
            result.listings.len(),
            request.viewport
        );
        Ok(result)
    }

    fn source_name(&self) -> &'static str {
        "listings-api"
    }
}
