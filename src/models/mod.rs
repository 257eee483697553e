use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::filters::SaleType;

/// Bounding box shown when no viewport has settled yet (New York City)
pub const FALLBACK_VIEWPORT: Viewport = Viewport {
    west: -74.1,
    south: 40.6,
    east: -73.8,
    north: 40.9,
};

/// Visible map region in geographic degrees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Viewport {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self { west, south, east, north }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.5}, {:.5}, {:.5}, {:.5}]",
            self.west, self.south, self.east, self.north
        )
    }
}

/// Parses `west,south,east,north`
impl FromStr for Viewport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .split(',')
            .map(|p| {
                p.trim()
                    .parse::<f64>()
                    .with_context(|| format!("Invalid coordinate '{}'", p.trim()))
            })
            .collect::<Result<Vec<f64>>>()?;

        if parts.len() != 4 {
            bail!("Expected west,south,east,north but got {} values", parts.len());
        }

        Ok(Self::new(parts[0], parts[1], parts[2], parts[3]))
    }
}

/// A property listing returned by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    #[serde(deserialize_with = "id_from_str_or_number")]
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub sale_type: Option<SaleType>,
    #[serde(default)]
    pub beds: Option<u32>,
    #[serde(default)]
    pub baths: Option<u32>,
    #[serde(default)]
    pub sqft: Option<u32>,
    #[serde(default)]
    pub google_maps_link: String,
    /// Anything else the backend sends along
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A point of interest that matched one of the proximity filters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Amenity {
    #[serde(deserialize_with = "id_from_str_or_number")]
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Amenities the backend used for proximity matching, per category.
/// Missing categories deserialize as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AmenitiesUsed {
    #[serde(default)]
    pub parks: Vec<Amenity>,
    #[serde(default)]
    pub worship: Vec<Amenity>,
    #[serde(default)]
    pub stores: Vec<Amenity>,
    #[serde(default)]
    pub gyms: Vec<Amenity>,
    #[serde(default)]
    pub sports: Vec<Amenity>,
}

/// Payload of one listings query
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    #[serde(default)]
    pub listings: Vec<Listing>,
    #[serde(default)]
    pub amenities_used: AmenitiesUsed,
}

fn id_from_str_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(i) => i.to_string(),
        RawId::Float(f) => f.to_string(),
    })
}
