use serde::Serialize;

use crate::filters::{AmenityCategory, FilterState, SaleType};
use crate::models::Viewport;

/// Proximity part of a query for one amenity category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryQuery {
    pub category: AmenityCategory,
    pub radius_m: u32,
    pub enabled: bool,
    /// Sorted
    pub subtypes: Vec<String>,
}

/// Canonical listings query for one (viewport, filters) combination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub viewport: Viewport,
    pub sale_type: SaleType,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_beds: Option<u32>,
    pub min_baths: Option<u32>,
    pub categories: Vec<CategoryQuery>,
}

impl QueryRequest {
    pub fn derive(viewport: &Viewport, filters: &FilterState) -> Self {
        let categories = AmenityCategory::ALL
            .into_iter()
            .map(|category| {
                let filter = filters.category(category);
                CategoryQuery {
                    category,
                    radius_m: filter.radius.meters(),
                    enabled: filter.enabled,
                    // BTreeSet iterates in order
                    subtypes: filter.selected.iter().cloned().collect(),
                }
            })
            .collect();

        Self {
            viewport: *viewport,
            sale_type: filters.sale_type,
            min_price: filters.min_price,
            max_price: filters.max_price,
            min_beds: filters.min_beds,
            min_baths: filters.min_baths,
            categories,
        }
    }

    pub fn category(&self, category: AmenityCategory) -> Option<&CategoryQuery> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// Query-string pairs for the listings endpoint. Unconstrained bounds are
    /// left out and each selected subtype becomes its own repeated parameter.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let vp = &self.viewport;
        let mut pairs = vec![
            ("west", vp.west.to_string()),
            ("south", vp.south.to_string()),
            ("east", vp.east.to_string()),
            ("north", vp.north.to_string()),
            ("sale_type", self.sale_type.as_str().to_string()),
        ];

        for c in &self.categories {
            pairs.push((c.category.radius_param(), c.radius_m.to_string()));
        }

        let need_parks = self
            .category(AmenityCategory::Parks)
            .map(|c| c.enabled)
            .unwrap_or(false);
        pairs.push(("need_parks", need_parks.to_string()));

        let bounds = [
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("min_beds", self.min_beds.map(u64::from)),
            ("min_baths", self.min_baths.map(u64::from)),
        ];
        for (key, value) in bounds {
            if let Some(v) = value {
                pairs.push((key, v.to_string()));
            }
        }

        for c in &self.categories {
            if c.category.is_toggle_gated() {
                continue;
            }
            for subtype in &c.subtypes {
                pairs.push((c.category.as_str(), subtype.clone()));
            }
        }

        pairs
    }
}
