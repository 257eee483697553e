use chrono::{DateTime, Duration, Utc};

use crate::listings::QueryRequest;
use crate::models::QueryResult;

/// What the map layer should currently show
#[derive(Debug, Clone, Default)]
pub struct MapState {
    pub result: QueryResult,
    pub loading: bool,
    pub loading_since: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Generation of the dispatch that produced `result` (0 = nothing yet)
    pub generation: u64,
    /// Request that produced `result`
    pub request: Option<QueryRequest>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MapState {
    /// Quick fetches never flash a spinner: the indicator only shows once a
    /// fetch has been outstanding for `delay`.
    pub fn show_loading_indicator(&self, now: DateTime<Utc>, delay: Duration) -> bool {
        match (self.loading, self.loading_since) {
            (true, Some(since)) => now - since >= delay,
            _ => false,
        }
    }

    /// One-line status for the map overlay
    pub fn summary(&self) -> String {
        if self.loading {
            return "Loading…".to_string();
        }
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }

        let used = &self.result.amenities_used;
        format!(
            "Showing {} listings • amenities fetched: parks {}, worship {}, stores {}, gyms {}, sports {}",
            self.result.listings.len(),
            used.parks.len(),
            used.worship.len(),
            used.stores.len(),
            used.gyms.len(),
            used.sports.len(),
        )
    }
}
