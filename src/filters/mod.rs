pub mod catalog;
pub mod state;

pub use catalog::SubtypeOption;
pub use state::{AmenityCategory, CategoryFilter, FilterState, Radius, SaleType};
