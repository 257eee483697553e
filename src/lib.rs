//! Map client core for browsing real-estate listings: keeps the listings shown
//! on the map in step with the viewport and the filter form, and drives the
//! press-and-hold radius controls.

pub mod adjuster;
pub mod config;
pub mod coordinator;
pub mod filters;
pub mod listings;
pub mod models;
pub mod session;
