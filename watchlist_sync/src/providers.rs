//! Maps the configured [`ProviderKind`] to a concrete provider.
use market_data_ingestor::providers::{
    DataProvider, ProviderInitError, alpaca_rest::AlpacaProvider, polygon_rest::PolygonProvider,
};

use crate::config::ProviderKind;

/// Build a boxed data provider for `kind`, reading credentials from the environment.
pub fn build_provider(kind: ProviderKind) -> Result<Box<dyn DataProvider>, ProviderInitError> {
    match kind {
        ProviderKind::Polygon => Ok(Box::new(PolygonProvider::new()?)),
        ProviderKind::Alpaca => Ok(Box::new(AlpacaProvider::new()?)),
    }
}
