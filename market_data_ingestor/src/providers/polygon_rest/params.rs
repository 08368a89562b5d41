use serde::{Deserialize, Serialize};

/// Sort order of the aggregate results.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

/// Query parameters of the aggregates endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PolygonAggsParams {
    /// Split-adjusted prices.
    pub adjusted: bool,
    pub sort: Sort,
    /// Base aggregates per page; 50 000 is the vendor maximum.
    pub limit: u32,
}

impl Default for PolygonAggsParams {
    fn default() -> Self {
        Self {
            adjusted: true,
            sort: Sort::Asc,
            limit: 50_000,
        }
    }
}
