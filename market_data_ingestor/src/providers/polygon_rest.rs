//! Polygon.io aggregates (`/v2/aggs`) endpoint.

pub mod params;
pub mod provider;
pub mod response;

pub use params::PolygonAggsParams;
pub use provider::PolygonProvider;
