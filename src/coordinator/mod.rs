//! Turns viewport and filter changes into listings fetches.
//!
//! Every dispatch is tagged with a generation number. Completions compare
//! their tag with the newest issued generation, so a late answer to an old
//! request can never replace what the newest request produced, no matter how
//! many fetches are in flight or in which order they finish.

mod state;

pub use state::MapState;

use crate::filters::FilterState;
use crate::listings::{ListingsSource, QueryRequest};
use crate::models::{QueryResult, Viewport};
use anyhow::Result;
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of handing one (viewport, filters) pair to the coordinator
#[derive(Debug)]
pub enum Dispatch {
    Issued {
        generation: u64,
        handle: JoinHandle<()>,
    },
    /// Same request as the one in flight or on screen
    Skipped,
}

impl Dispatch {
    pub fn generation(&self) -> Option<u64> {
        match self {
            Dispatch::Issued { generation, .. } => Some(*generation),
            Dispatch::Skipped => None,
        }
    }

    /// Waits until the fetch has completed and been reconciled
    pub async fn finished(self) {
        if let Dispatch::Issued { handle, .. } = self {
            if let Err(e) = handle.await {
                warn!("Fetch task ended abnormally: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct Tracker {
    issued: u64,
    emissions: u64,
    in_flight: Option<QueryRequest>,
    /// Last request whose result is on screen
    displayed: Option<QueryRequest>,
}

struct Shared {
    source: Arc<dyn ListingsSource>,
    tracker: Mutex<Tracker>,
    state: watch::Sender<MapState>,
    shutdown: CancellationToken,
}

impl Shared {
    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, generation: u64, request: QueryRequest, outcome: Result<QueryResult>) {
        let mut tracker = self.tracker();

        if self.shutdown.is_cancelled() {
            debug!(generation, "Coordinator shut down, dropping completion");
            return;
        }

        if generation != tracker.issued {
            match &outcome {
                Ok(_) => debug!(generation, latest = tracker.issued, "Discarding stale result"),
                Err(e) => debug!(
                    generation,
                    latest = tracker.issued,
                    "Discarding stale failure: {:#}",
                    e
                ),
            }
            return;
        }

        tracker.in_flight = None;

        match outcome {
            Ok(result) => {
                info!(
                    generation,
                    listings = result.listings.len(),
                    "Showing results for {}",
                    request.viewport
                );
                tracker.displayed = Some(request.clone());
                self.state.send_modify(|s| {
                    s.result = result;
                    s.loading = false;
                    s.loading_since = None;
                    s.error = None;
                    s.generation = generation;
                    s.request = Some(request);
                    s.updated_at = Some(Utc::now());
                });
            }
            Err(e) => {
                let message = format!("{:#}", e);
                warn!(generation, "Listings fetch failed: {}", message);
                // Let the same request through again on the next emission
                tracker.displayed = None;
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.loading_since = None;
                    s.error = Some(message);
                });
            }
        }
    }
}

/// Keeps the published [`MapState`] in step with the newest request
pub struct QueryCoordinator {
    shared: Arc<Shared>,
}

impl QueryCoordinator {
    pub fn new(source: Arc<dyn ListingsSource>) -> Self {
        info!("Query coordinator using source '{}'", source.source_name());
        let (state, _) = watch::channel(MapState::default());

        Self {
            shared: Arc::new(Shared {
                source,
                tracker: Mutex::new(Tracker::default()),
                state,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Derive the request for this combination and dispatch it unless it is
    /// already in flight or already on screen. Must run inside a tokio runtime.
    pub fn submit(&self, viewport: &Viewport, filters: &FilterState) -> Dispatch {
        let request = QueryRequest::derive(viewport, filters);
        let mut tracker = self.shared.tracker();
        tracker.emissions += 1;

        if self.shared.shutdown.is_cancelled() {
            debug!("Coordinator shut down, ignoring emission");
            return Dispatch::Skipped;
        }

        // An older, superseded request is not a duplicate: only compare with
        // what is in flight, or with the screen when nothing is.
        let duplicate = match &tracker.in_flight {
            Some(in_flight) => *in_flight == request,
            None => tracker.displayed.as_ref() == Some(&request),
        };
        if duplicate {
            debug!("Request for {} unchanged, not dispatching", request.viewport);
            return Dispatch::Skipped;
        }

        tracker.issued += 1;
        let generation = tracker.issued;
        tracker.in_flight = Some(request.clone());

        self.shared.state.send_modify(|s| {
            if !s.loading {
                s.loading_since = Some(Utc::now());
            }
            s.loading = true;
            s.error = None;
        });
        drop(tracker);

        debug!(generation, "Dispatching listings query for {}", request.viewport);

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            let outcome = tokio::select! {
                _ = shared.shutdown.cancelled() => return,
                outcome = shared.source.fetch(&request) => outcome,
            };
            shared.complete(generation, request, outcome);
        });

        Dispatch::Issued { generation, handle }
    }

    /// Number of (viewport, filters) pairs received, dispatched or not
    pub fn emissions(&self) -> u64 {
        self.shared.tracker().emissions
    }

    pub fn last_issued(&self) -> u64 {
        self.shared.tracker().issued
    }

    pub fn snapshot(&self) -> MapState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<MapState> {
        self.shared.state.subscribe()
    }

    /// Waits until no fetch is outstanding and returns the state at that point
    pub async fn wait_settled(&self) -> MapState {
        let mut rx = self.subscribe();
        let settled = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }

    /// Drops every outstanding completion. Nothing is published afterwards.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.is_cancelled() {
            debug!("Shutting down query coordinator");
            self.shared.shutdown.cancel();
        }
    }
}

impl Drop for QueryCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{AmenityCategory, SaleType};
    use crate::listings::testing::{result_with_id, ScriptedSource};
    use crate::models::FALLBACK_VIEWPORT;
    use anyhow::anyhow;

    fn bbox_a() -> Viewport {
        Viewport::new(-74.02, 40.70, -73.97, 40.74)
    }

    fn bbox_b() -> Viewport {
        Viewport::new(-73.96, 40.76, -73.91, 40.80)
    }

    fn shown_id(state: &MapState) -> &str {
        &state.result.listings[0].id
    }

    #[tokio::test]
    async fn late_answer_to_older_request_is_discarded() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let filters = FilterState::default();

        let d1 = coordinator.submit(&bbox_a(), &filters);
        let d2 = coordinator.submit(&bbox_b(), &filters);
        source.wait_for_calls(2).await;

        source.reply(1, Ok(result_with_id("from-b")));
        d2.finished().await;
        source.reply(0, Ok(result_with_id("from-a")));
        d1.finished().await;

        let state = coordinator.snapshot();
        assert_eq!(shown_id(&state), "from-b");
        assert_eq!(state.generation, 2);
        assert_eq!(state.request.unwrap().viewport, bbox_b());
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn newest_of_three_wins_in_any_completion_order() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let filters = FilterState::default();

        let d1 = coordinator.submit(&bbox_a(), &filters);
        let d2 = coordinator.submit(&bbox_b(), &filters);
        let d3 = coordinator.submit(&FALLBACK_VIEWPORT, &filters);
        source.wait_for_calls(3).await;

        source.reply(1, Ok(result_with_id("second")));
        d2.finished().await;
        let state = coordinator.snapshot();
        assert!(state.loading, "stale completion must not clear loading");
        assert!(state.result.listings.is_empty());

        source.reply(2, Ok(result_with_id("third")));
        d3.finished().await;
        source.reply(0, Ok(result_with_id("first")));
        d1.finished().await;

        let state = coordinator.snapshot();
        assert_eq!(shown_id(&state), "third");
        assert_eq!(state.generation, 3);
    }

    #[tokio::test]
    async fn stale_failure_is_swallowed() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let filters = FilterState::default();

        let d1 = coordinator.submit(&bbox_a(), &filters);
        let d2 = coordinator.submit(&bbox_b(), &filters);
        source.wait_for_calls(2).await;

        source.reply(0, Err(anyhow!("connection reset")));
        d1.finished().await;
        let state = coordinator.snapshot();
        assert!(state.error.is_none());
        assert!(state.loading);

        source.reply(1, Ok(result_with_id("from-b")));
        d2.finished().await;
        let state = coordinator.snapshot();
        assert!(state.error.is_none());
        assert_eq!(shown_id(&state), "from-b");
    }

    #[tokio::test]
    async fn current_failure_surfaces_and_clears_loading() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());

        let d1 = coordinator.submit(&bbox_a(), &FilterState::default());
        source.wait_for_calls(1).await;
        assert!(coordinator.snapshot().loading);

        source.reply(0, Err(anyhow!("503 Service Unavailable")));
        d1.finished().await;

        let state = coordinator.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("503 Service Unavailable"));
        assert_eq!(state.summary(), "Error: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn failed_request_can_be_retried_by_the_same_emission() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let filters = FilterState::default();

        let d1 = coordinator.submit(&bbox_a(), &filters);
        source.wait_for_calls(1).await;
        source.reply(0, Err(anyhow!("timeout")));
        d1.finished().await;

        let retry = coordinator.submit(&bbox_a(), &filters);
        assert_eq!(retry.generation(), Some(2));
    }

    #[tokio::test]
    async fn identical_requests_are_not_dispatched_twice() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let filters = FilterState::default().with_sale_type(SaleType::Sale);

        let d1 = coordinator.submit(&bbox_a(), &filters);
        assert!(matches!(
            coordinator.submit(&bbox_a(), &filters),
            Dispatch::Skipped
        ));

        source.wait_for_calls(1).await;
        source.reply(0, Ok(result_with_id("a")));
        d1.finished().await;

        assert!(matches!(
            coordinator.submit(&bbox_a(), &filters),
            Dispatch::Skipped
        ));
        assert_eq!(coordinator.emissions(), 3);
        assert_eq!(coordinator.last_issued(), 1);
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn returning_to_a_superseded_request_dispatches_again() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let narrow = FilterState::default().with_radius(AmenityCategory::Parks, 500);
        let wide = FilterState::default().with_radius(AmenityCategory::Parks, 2500);

        let d1 = coordinator.submit(&bbox_a(), &narrow);
        source.wait_for_calls(1).await;
        source.reply(0, Ok(result_with_id("narrow")));
        d1.finished().await;

        let _d2 = coordinator.submit(&bbox_a(), &wide);
        let d3 = coordinator.submit(&bbox_a(), &narrow);
        assert_eq!(d3.generation(), Some(3));
        source.wait_for_calls(3).await;
        assert_eq!(source.request(2).category(AmenityCategory::Parks).unwrap().radius_m, 500);
    }

    #[tokio::test]
    async fn nothing_is_published_after_shutdown() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());

        let d1 = coordinator.submit(&bbox_a(), &FilterState::default());
        source.wait_for_calls(1).await;
        coordinator.shutdown();
        source.reply(0, Ok(result_with_id("late")));
        d1.finished().await;

        let state = coordinator.snapshot();
        assert!(state.result.listings.is_empty());
        assert_eq!(state.generation, 0);
        assert!(matches!(
            coordinator.submit(&bbox_b(), &FilterState::default()),
            Dispatch::Skipped
        ));
    }

    #[tokio::test]
    async fn subscribers_see_the_settled_state() {
        let source = Arc::new(ScriptedSource::new());
        let coordinator = QueryCoordinator::new(source.clone());
        let mut rx = coordinator.subscribe();

        let _d1 = coordinator.submit(&bbox_a(), &FilterState::default());
        source.wait_for_calls(1).await;
        source.reply(0, Ok(result_with_id("a")));

        let state = coordinator.wait_settled().await;
        assert_eq!(shown_id(&state), "a");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().generation, 1);
    }
}
