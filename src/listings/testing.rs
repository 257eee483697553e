//! Scripted listings sources for driving the coordinator in tests.

use crate::listings::request::QueryRequest;
use crate::listings::traits::ListingsSource;
use crate::models::{Listing, QueryResult};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

struct PendingCall {
    request: QueryRequest,
    reply: Option<oneshot::Sender<Result<QueryResult>>>,
}

/// Every fetch parks until the test answers it with [`ScriptedSource::reply`]
#[derive(Default)]
pub struct ScriptedSource {
    calls: Mutex<Vec<PendingCall>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> QueryRequest {
        self.calls.lock().unwrap()[index].request.clone()
    }

    /// Yields until `count` fetches have reached the source
    pub async fn wait_for_calls(&self, count: usize) {
        while self.call_count() < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn reply(&self, index: usize, result: Result<QueryResult>) {
        let sender = self.calls.lock().unwrap()[index]
            .reply
            .take()
            .expect("call already answered");
        let _ = sender.send(result);
    }
}

#[async_trait]
impl ListingsSource for ScriptedSource {
    async fn fetch(&self, request: &QueryRequest) -> Result<QueryResult> {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push(PendingCall {
            request: request.clone(),
            reply: Some(tx),
        });
        rx.await.context("scripted reply dropped")?
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// Answers immediately with one listing whose id names the viewport
#[derive(Default)]
pub struct EchoSource {
    calls: AtomicUsize,
    requests: Mutex<Vec<QueryRequest>>,
    fail: bool,
}

impl EchoSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingsSource for EchoSource {
    async fn fetch(&self, request: &QueryRequest) -> Result<QueryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(anyhow!("backend unavailable"));
        }
        Ok(result_with_id(&format!("listing@{}", request.viewport)))
    }

    fn source_name(&self) -> &'static str {
        "echo"
    }
}

/// A result holding a single listing with the given id
pub fn result_with_id(id: &str) -> QueryResult {
    QueryResult {
        listings: vec![Listing {
            id: id.to_string(),
            lat: 40.75,
            lng: -73.95,
            price: 500_000,
            title: String::new(),
            address: String::new(),
            sale_type: None,
            beds: None,
            baths: None,
            sqft: None,
            google_maps_link: String::new(),
            extra: Default::default(),
        }],
        ..Default::default()
    }
}
