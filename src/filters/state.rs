use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::catalog;

/// Which kind of listing to show
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    #[default]
    Any,
    Sale,
    Rent,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::Any => "any",
            SaleType::Sale => "sale",
            SaleType::Rent => "rent",
        }
    }
}

impl fmt::Display for SaleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SaleType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(SaleType::Any),
            "sale" => Ok(SaleType::Sale),
            "rent" => Ok(SaleType::Rent),
            other => bail!("Unknown sale type '{}' (expected any, sale or rent)", other),
        }
    }
}

/// Amenity classes usable as proximity filters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AmenityCategory {
    Parks,
    Worship,
    Stores,
    Gyms,
    Sports,
}

impl AmenityCategory {
    pub const ALL: [AmenityCategory; 5] = [
        AmenityCategory::Parks,
        AmenityCategory::Worship,
        AmenityCategory::Stores,
        AmenityCategory::Gyms,
        AmenityCategory::Sports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AmenityCategory::Parks => "parks",
            AmenityCategory::Worship => "worship",
            AmenityCategory::Stores => "stores",
            AmenityCategory::Gyms => "gyms",
            AmenityCategory::Sports => "sports",
        }
    }

    /// Query parameter carrying this category's radius
    pub fn radius_param(&self) -> &'static str {
        match self {
            AmenityCategory::Parks => "parks_radius",
            AmenityCategory::Worship => "worship_radius",
            AmenityCategory::Stores => "stores_radius",
            AmenityCategory::Gyms => "gyms_radius",
            AmenityCategory::Sports => "sports_radius",
        }
    }

    /// Gated by an on/off toggle rather than by a subtype selection
    pub fn is_toggle_gated(&self) -> bool {
        matches!(self, AmenityCategory::Parks)
    }
}

impl fmt::Display for AmenityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmenityCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        AmenityCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| anyhow::anyhow!("Unknown amenity category '{}'", s))
    }
}

/// Proximity radius in meters, always within [`Radius::MIN`, `Radius::MAX`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "i64", into = "i64")]
pub struct Radius(u32);

impl Radius {
    pub const MIN: u32 = 25;
    pub const MAX: u32 = 5000;
    pub const DEFAULT: u32 = 1000;

    /// Clamps out-of-range input to the nearest bound
    pub fn new(meters: i64) -> Self {
        Self(meters.clamp(Self::MIN as i64, Self::MAX as i64) as u32)
    }

    pub fn meters(&self) -> u32 {
        self.0
    }
}

impl Default for Radius {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl From<i64> for Radius {
    fn from(meters: i64) -> Self {
        Self::new(meters)
    }
}

impl From<Radius> for i64 {
    fn from(radius: Radius) -> Self {
        radius.0 as i64
    }
}

/// Per-category proximity settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryFilter {
    pub radius: Radius,
    pub selected: BTreeSet<String>,
    /// Only meaningful for toggle-gated categories
    pub enabled: bool,
}

/// Everything the filter form controls.
///
/// Consumers never mutate a `FilterState` they were handed; the `with_*`
/// methods build the replacement value that gets handed back to the owner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterState {
    pub sale_type: SaleType,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
    pub min_beds: Option<u32>,
    pub min_baths: Option<u32>,
    pub parks: CategoryFilter,
    pub worship: CategoryFilter,
    pub stores: CategoryFilter,
    pub gyms: CategoryFilter,
    pub sports: CategoryFilter,
}

impl FilterState {
    pub fn category(&self, category: AmenityCategory) -> &CategoryFilter {
        match category {
            AmenityCategory::Parks => &self.parks,
            AmenityCategory::Worship => &self.worship,
            AmenityCategory::Stores => &self.stores,
            AmenityCategory::Gyms => &self.gyms,
            AmenityCategory::Sports => &self.sports,
        }
    }

    fn category_mut(&mut self, category: AmenityCategory) -> &mut CategoryFilter {
        match category {
            AmenityCategory::Parks => &mut self.parks,
            AmenityCategory::Worship => &mut self.worship,
            AmenityCategory::Stores => &mut self.stores,
            AmenityCategory::Gyms => &mut self.gyms,
            AmenityCategory::Sports => &mut self.sports,
        }
    }

    pub fn radius(&self, category: AmenityCategory) -> Radius {
        self.category(category).radius
    }

    /// Whether the category currently constrains results
    pub fn is_active(&self, category: AmenityCategory) -> bool {
        let filter = self.category(category);
        if category.is_toggle_gated() {
            filter.enabled
        } else {
            !filter.selected.is_empty()
        }
    }

    pub fn with_sale_type(mut self, sale_type: SaleType) -> Self {
        self.sale_type = sale_type;
        self
    }

    pub fn with_price_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn with_min_beds(mut self, beds: Option<u32>) -> Self {
        self.min_beds = beds;
        self
    }

    pub fn with_min_baths(mut self, baths: Option<u32>) -> Self {
        self.min_baths = baths;
        self
    }

    pub fn with_radius(mut self, category: AmenityCategory, meters: i64) -> Self {
        self.category_mut(category).radius = Radius::new(meters);
        self
    }

    pub fn with_category_enabled(mut self, category: AmenityCategory, enabled: bool) -> Self {
        self.category_mut(category).enabled = enabled;
        self
    }

    /// Checks or unchecks one subtype box
    pub fn with_subtype(
        mut self,
        category: AmenityCategory,
        subtype: &str,
        checked: bool,
    ) -> Result<Self> {
        if !catalog::is_known_subtype(category, subtype) {
            bail!("'{}' is not a {} subtype", subtype, category);
        }

        let selected = &mut self.category_mut(category).selected;
        if checked {
            selected.insert(subtype.to_string());
        } else {
            selected.remove(subtype);
        }
        Ok(self)
    }

    pub fn toggle_subtype(self, category: AmenityCategory, subtype: &str) -> Result<Self> {
        let checked = !self.category(category).selected.contains(subtype);
        self.with_subtype(category, subtype, checked)
    }

    /// `min > max` for price. Not rejected, only reported.
    pub fn has_inverted_price_range(&self) -> bool {
        matches!((self.min_price, self.max_price), (Some(min), Some(max)) if min > max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_is_clamped_on_construction() {
        assert_eq!(Radius::new(10).meters(), 25);
        assert_eq!(Radius::new(-4).meters(), 25);
        assert_eq!(Radius::new(5008).meters(), 5000);
        assert_eq!(Radius::new(1250).meters(), 1250);
        assert_eq!(Radius::default().meters(), 1000);
    }

    #[test]
    fn deserialized_radius_is_clamped() {
        let radius: Radius = serde_json::from_str("99999").unwrap();
        assert_eq!(radius.meters(), Radius::MAX);
    }

    #[test]
    fn with_methods_leave_the_original_untouched() {
        let original = FilterState::default();
        let next = original
            .clone()
            .with_sale_type(SaleType::Rent)
            .with_radius(AmenityCategory::Gyms, 2000);

        assert_eq!(original.sale_type, SaleType::Any);
        assert_eq!(original.radius(AmenityCategory::Gyms).meters(), 1000);
        assert_eq!(next.sale_type, SaleType::Rent);
        assert_eq!(next.radius(AmenityCategory::Gyms).meters(), 2000);
    }

    #[test]
    fn toggling_twice_restores_the_selection() {
        let original = FilterState::default()
            .with_subtype(AmenityCategory::Worship, "church", true)
            .unwrap();

        let on = original
            .clone()
            .toggle_subtype(AmenityCategory::Worship, "mosque")
            .unwrap();
        assert!(on.worship.selected.contains("mosque"));

        let off = on.toggle_subtype(AmenityCategory::Worship, "mosque").unwrap();
        assert_eq!(off, original);
    }

    #[test]
    fn unknown_subtypes_are_rejected() {
        let err = FilterState::default()
            .toggle_subtype(AmenityCategory::Stores, "synagogue")
            .unwrap_err();
        assert!(err.to_string().contains("not a stores subtype"));
    }

    #[test]
    fn activity_depends_on_gating() {
        let filters = FilterState::default();
        assert!(!filters.is_active(AmenityCategory::Parks));
        assert!(!filters.is_active(AmenityCategory::Sports));

        let filters = filters
            .with_category_enabled(AmenityCategory::Parks, true)
            .with_subtype(AmenityCategory::Sports, "tennis", true)
            .unwrap();
        assert!(filters.is_active(AmenityCategory::Parks));
        assert!(filters.is_active(AmenityCategory::Sports));
    }

    #[test]
    fn inverted_price_range_is_reported_not_fixed() {
        let filters = FilterState::default().with_price_range(Some(900_000), Some(400_000));
        assert!(filters.has_inverted_price_range());
        assert_eq!(filters.min_price, Some(900_000));
    }

    #[test]
    fn parses_sale_types_and_categories() {
        assert_eq!("Rent".parse::<SaleType>().unwrap(), SaleType::Rent);
        assert!("lease".parse::<SaleType>().is_err());
        assert_eq!("gyms".parse::<AmenityCategory>().unwrap(), AmenityCategory::Gyms);
    }
}
