pub mod client;
pub mod request;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use client::ListingsClient;
pub use request::QueryRequest;
pub use traits::ListingsSource;
