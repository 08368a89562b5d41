//! Alpaca Market Data v2 stock bars endpoint.

pub mod params;
pub mod provider;
pub mod response;

pub use params::AlpacaBarsParams;
pub use provider::AlpacaProvider;
