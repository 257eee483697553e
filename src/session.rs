use crate::adjuster::{AdjustTarget, AdjusterProfile, Scheduler, ValueAdjuster};
use crate::coordinator::{Dispatch, MapState, QueryCoordinator};
use crate::filters::{AmenityCategory, FilterState, Radius};
use crate::listings::ListingsSource;
use crate::models::{Viewport, FALLBACK_VIEWPORT};
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, info, warn};

struct Inputs {
    filters: FilterState,
    viewport: Viewport,
}

struct Shared {
    inputs: Mutex<Inputs>,
    coordinator: QueryCoordinator,
}

impl Shared {
    fn inputs(&self) -> MutexGuard<'_, Inputs> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_filters(&self, update: impl FnOnce(FilterState) -> FilterState) -> Dispatch {
        let mut inputs = self.inputs();
        inputs.filters = update(inputs.filters.clone());
        // Emit under the lock so emissions follow replacement order
        self.emit(&inputs)
    }

    fn emit(&self, inputs: &Inputs) -> Dispatch {
        if inputs.filters.has_inverted_price_range() {
            warn!(
                min = inputs.filters.min_price,
                max = inputs.filters.max_price,
                "Minimum price is above maximum, passing through unchanged"
            );
        }
        self.coordinator.submit(&inputs.viewport, &inputs.filters)
    }
}

/// Owns the filter form and the map viewport for one map screen, and feeds
/// every change to the [`QueryCoordinator`].
pub struct MapSession {
    shared: Arc<Shared>,
}

impl MapSession {
    pub fn new(source: Arc<dyn ListingsSource>, filters: FilterState) -> Self {
        Self {
            shared: Arc::new(Shared {
                inputs: Mutex::new(Inputs {
                    filters,
                    viewport: FALLBACK_VIEWPORT,
                }),
                coordinator: QueryCoordinator::new(source),
            }),
        }
    }

    /// Initial fetch against the fallback box, so the map is populated before
    /// the first viewport settles
    pub fn mount(&self) -> Dispatch {
        info!("Mounting map session, initial fetch for {}", FALLBACK_VIEWPORT);
        let inputs = self.shared.inputs();
        self.shared
            .coordinator
            .submit(&FALLBACK_VIEWPORT, &inputs.filters)
    }

    pub fn filters(&self) -> FilterState {
        self.shared.inputs().filters.clone()
    }

    pub fn viewport(&self) -> Viewport {
        self.shared.inputs().viewport
    }

    /// Map movement has stopped
    pub fn settle_viewport(&self, viewport: Viewport) -> Dispatch {
        let mut inputs = self.shared.inputs();
        debug!("Viewport settled at {}", viewport);
        inputs.viewport = viewport;
        self.shared.emit(&inputs)
    }

    pub fn replace_filters(&self, filters: FilterState) -> Dispatch {
        self.shared.update_filters(|_| filters)
    }

    pub fn update_filters(&self, update: impl FnOnce(FilterState) -> FilterState) -> Dispatch {
        self.shared.update_filters(update)
    }

    /// Like [`MapSession::update_filters`]; nothing is replaced or emitted on error
    pub fn try_update_filters(
        &self,
        update: impl FnOnce(FilterState) -> Result<FilterState>,
    ) -> Result<Dispatch> {
        let mut inputs = self.shared.inputs();
        inputs.filters = update(inputs.filters.clone())?;
        Ok(self.shared.emit(&inputs))
    }

    /// Subtype checkbox clicked
    pub fn toggle_subtype(&self, category: AmenityCategory, subtype: &str) -> Result<Dispatch> {
        self.try_update_filters(|f| f.toggle_subtype(category, subtype))
    }

    /// Press-and-hold control for one category's radius. Steps go through the
    /// same replacement path as every other filter change.
    pub fn radius_adjuster(
        &self,
        category: AmenityCategory,
        scheduler: Arc<dyn Scheduler>,
    ) -> ValueAdjuster {
        let target = Arc::new(RadiusTarget {
            session: Arc::downgrade(&self.shared),
            category,
        });
        ValueAdjuster::new(
            format!("{}-radius", category),
            AdjusterProfile::radius(),
            scheduler,
            target,
        )
    }

    pub fn coordinator(&self) -> &QueryCoordinator {
        &self.shared.coordinator
    }

    pub fn state(&self) -> MapState {
        self.shared.coordinator.snapshot()
    }

    pub fn shutdown(&self) {
        self.shared.coordinator.shutdown();
    }
}

struct RadiusTarget {
    session: Weak<Shared>,
    category: AmenityCategory,
}

impl AdjustTarget for RadiusTarget {
    fn current(&self) -> i64 {
        match self.session.upgrade() {
            Some(shared) => shared.inputs().filters.radius(self.category).meters() as i64,
            None => Radius::DEFAULT as i64,
        }
    }

    fn apply(&self, value: i64) {
        if let Some(shared) = self.session.upgrade() {
            let category = self.category;
            // Fire and forget; the coordinator publishes the outcome
            drop(shared.update_filters(|f| f.with_radius(category, value)));
        }
    }
}
