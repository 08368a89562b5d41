use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{
        raw::RawBar,
        request_params::{BarsRequest, ProviderParams},
    },
    providers::{
        ApiSnafu, BarsPage, ClientBuildSnafu, DataProvider, MissingEnvVarSnafu, ProviderError,
        ProviderInitError, ReqwestSnafu, StatusSnafu, ValidationSnafu,
        polygon_rest::{params::PolygonAggsParams, response::PolygonAggsResponse},
    },
};

const BASE_URL: &str = "https://api.polygon.io";

pub struct PolygonProvider {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl PolygonProvider {
    /// Creates a new Polygon provider.
    ///
    /// Reads the API key from the `POLYGON_API_KEY` environment variable.
    pub fn new() -> Result<Self, ProviderInitError> {
        let api_key = SecretString::new(get_env_var("POLYGON_API_KEY").context(MissingEnvVarSnafu)?.into());
        Self::with_api_key(api_key)
    }

    pub fn with_api_key(api_key: SecretString) -> Result<Self, ProviderInitError> {
        let client = Client::builder().build().context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            api_key,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Points the provider at another endpoint (a proxy, or a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn first_page_url(&self, request: &BarsRequest) -> String {
        format!(
            "{}/v2/aggs/ticker/{}/range/1/day/{}/{}",
            self.base_url.trim_end_matches('/'),
            request.symbol,
            request.start.format("%Y-%m-%d"),
            request.end.format("%Y-%m-%d"),
        )
    }
}

#[async_trait]
impl DataProvider for PolygonProvider {
    fn name(&self) -> &'static str {
        "polygon"
    }

    async fn fetch_page(&self, request: &BarsRequest, cursor: Option<&str>) -> Result<BarsPage, ProviderError> {
        if request.symbol.trim().is_empty() || request.symbol.contains('/') {
            return ValidationSnafu {
                message: format!("invalid symbol {:?}", request.symbol),
            }
            .fail();
        }
        if request.start > request.end {
            return ValidationSnafu {
                message: format!("start {} is after end {}", request.start, request.end),
            }
            .fail();
        }

        // A `next_url` cursor already carries every query parameter except the key.
        let call = match cursor {
            Some(next_url) => self.client.get(next_url),
            None => {
                let params = match &request.provider_specific {
                    ProviderParams::Polygon(p) => p.clone(),
                    _ => PolygonAggsParams::default(),
                };
                self.client.get(self.first_page_url(request)).query(&params)
            }
        };

        let response = call
            .query(&[("apiKey", self.api_key.expose_secret())])
            .send()
            .await
            .context(ReqwestSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return StatusSnafu { status, message }.fail();
        }

        let page = response
            .json::<PolygonAggsResponse>()
            .await
            .context(ReqwestSnafu)?;
        if let Some(message) = page.api_error() {
            return ApiSnafu { message }.fail();
        }

        let rows: Vec<RawBar> = page.results.into_iter().flatten().map(RawBar::from).collect();
        debug!(
            symbol = %request.symbol,
            rows = rows.len(),
            more = page.next_url.is_some(),
            "polygon aggregates page fetched"
        );
        Ok(BarsPage {
            rows,
            next_page: page.next_url,
        })
    }
}
