use crate::listings::request::QueryRequest;
use crate::models::QueryResult;
use anyhow::Result;
use async_trait::async_trait;

/// Anything that can answer a listings query.
/// The coordinator only talks to this, so tests can script completions.
#[async_trait]
pub trait ListingsSource: Send + Sync {
    /// Run one query against the backend
    async fn fetch(&self, request: &QueryRequest) -> Result<QueryResult>;

    /// Get the name of the backend
    fn source_name(&self) -> &'static str;
}
