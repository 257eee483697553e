use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::adjuster::Direction;
use crate::filters::{AmenityCategory, FilterState, SaleType};
use crate::models::Viewport;

/// A press-and-hold on one radius control, as `category:+|-:millis`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldGesture {
    pub category: AmenityCategory,
    pub direction: Direction,
    pub duration: Duration,
}

impl FromStr for HoldGesture {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let [category, direction, millis] = parts.as_slice() else {
            bail!("Expected category:+|-:millis, got '{}'", s);
        };

        let direction = match *direction {
            "+" => Direction::Increase,
            "-" => Direction::Decrease,
            other => bail!("Direction must be + or -, got '{}'", other),
        };
        let millis: u64 = millis
            .parse()
            .with_context(|| format!("Invalid hold duration '{}'", millis))?;

        Ok(Self {
            category: category.parse()?,
            direction,
            duration: Duration::from_millis(millis),
        })
    }
}

/// Browse listings around a map viewport, filtered by price, size and
/// proximity to amenities
#[derive(Debug, Parser)]
#[command(name = "map-scout", version, about)]
pub struct Config {
    /// Base URL of the listings backend
    #[arg(long, env = "MAP_SCOUT_API_BASE", default_value = "http://localhost:8000")]
    pub api_base: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "MAP_SCOUT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Delay before a pending fetch is reported as loading, in milliseconds
    #[arg(long, env = "MAP_SCOUT_LOADING_DELAY_MS", default_value_t = 200)]
    pub loading_delay_ms: i64,

    /// Where to save the final result set
    #[arg(long, default_value = "listings.json")]
    pub output: PathBuf,

    /// Viewport to settle on after the initial load, as west,south,east,north
    #[arg(long, allow_hyphen_values = true)]
    pub bbox: Option<Viewport>,

    #[arg(long, default_value = "any")]
    pub sale_type: SaleType,

    #[arg(long)]
    pub min_price: Option<u64>,

    #[arg(long)]
    pub max_price: Option<u64>,

    #[arg(long)]
    pub min_beds: Option<u32>,

    #[arg(long)]
    pub min_baths: Option<u32>,

    /// Only show listings near a park
    #[arg(long)]
    pub need_parks: bool,

    /// Houses of worship to be near (repeatable)
    #[arg(long = "worship")]
    pub worship: Vec<String>,

    /// Store groups to be near (repeatable)
    #[arg(long = "store")]
    pub stores: Vec<String>,

    /// Gym types to be near (repeatable)
    #[arg(long = "gym")]
    pub gyms: Vec<String>,

    /// Sports facilities to be near (repeatable)
    #[arg(long = "sport")]
    pub sports: Vec<String>,

    /// Radius in meters for every amenity category (clamped to 25..=5000)
    #[arg(long)]
    pub radius: Option<i64>,

    /// Hold a radius control after loading, e.g. `parks:+:1200`
    #[arg(long, allow_hyphen_values = true)]
    pub hold: Option<HoldGesture>,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn loading_delay(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.loading_delay_ms)
    }

    /// Filter form as described by the command line
    pub fn initial_filters(&self) -> Result<FilterState> {
        let mut filters = FilterState::default()
            .with_sale_type(self.sale_type)
            .with_price_range(self.min_price, self.max_price)
            .with_min_beds(self.min_beds)
            .with_min_baths(self.min_baths)
            .with_category_enabled(AmenityCategory::Parks, self.need_parks);

        let selections = [
            (AmenityCategory::Worship, &self.worship),
            (AmenityCategory::Stores, &self.stores),
            (AmenityCategory::Gyms, &self.gyms),
            (AmenityCategory::Sports, &self.sports),
        ];
        for (category, subtypes) in selections {
            for subtype in subtypes {
                filters = filters.with_subtype(category, subtype, true)?;
            }
        }

        if let Some(radius) = self.radius {
            for category in AmenityCategory::ALL {
                filters = filters.with_radius(category, radius);
            }
        }

        Ok(filters)
    }
}
