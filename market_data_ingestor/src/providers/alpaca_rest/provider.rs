use async_trait::async_trait;
use reqwest::{Client, header};
use secrecy::{ExposeSecret, SecretString};
use shared_utils::env::get_env_var;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    models::{raw::RawBar, request_params::BarsRequest},
    providers::{
        BarsPage, ClientBuildSnafu, DataProvider, InvalidApiKeySnafu, MissingEnvVarSnafu, ProviderError,
        ProviderInitError, ReqwestSnafu, StatusSnafu,
        alpaca_rest::{
            params::{construct_params, validate_request},
            response::AlpacaResponse,
        },
    },
};

const BASE_URL: &str = "https://data.alpaca.markets/v2/stocks/bars";

pub struct AlpacaProvider {
    client: Client,
    base_url: String,
}

impl AlpacaProvider {
    /// Creates a new Alpaca provider.
    ///
    /// Reads API keys from the `APCA_API_KEY_ID` and `APCA_API_SECRET_KEY`
    /// environment variables.
    pub fn new() -> Result<Self, ProviderInitError> {
        let api_key = SecretString::new(get_env_var("APCA_API_KEY_ID").context(MissingEnvVarSnafu)?.into());
        let secret_key =
            SecretString::new(get_env_var("APCA_API_SECRET_KEY").context(MissingEnvVarSnafu)?.into());
        Self::with_credentials(&api_key, &secret_key)
    }

    pub fn with_credentials(
        api_key: &SecretString,
        secret_key: &SecretString,
    ) -> Result<Self, ProviderInitError> {
        let mut key = header::HeaderValue::from_str(api_key.expose_secret()).context(InvalidApiKeySnafu)?;
        key.set_sensitive(true);
        let mut secret =
            header::HeaderValue::from_str(secret_key.expose_secret()).context(InvalidApiKeySnafu)?;
        secret.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert("APCA-API-KEY-ID", key);
        headers.insert("APCA-API-SECRET-KEY", secret);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// Points the provider at another endpoint (a proxy, or a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl DataProvider for AlpacaProvider {
    fn name(&self) -> &'static str {
        "alpaca"
    }

    async fn fetch_page(&self, request: &BarsRequest, cursor: Option<&str>) -> Result<BarsPage, ProviderError> {
        validate_request(request)?;

        let mut query_params = construct_params(request)?;
        if let Some(token) = cursor {
            query_params.push(("page_token".to_string(), token.to_string()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&query_params)
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

        let page = response.json::<AlpacaResponse>().await.context(ReqwestSnafu)?;

        let rows: Vec<RawBar> = page
            .bars
            .and_then(|mut bars| bars.shift_remove(&request.symbol))
            .into_iter()
            .flatten()
            .map(RawBar::from)
            .collect();

        debug!(
            symbol = %request.symbol,
            rows = rows.len(),
            more = page.next_page_token.is_some(),
            "alpaca bars page fetched"
        );
        Ok(BarsPage {
            rows,
            next_page: page.next_page_token,
        })
    }
}
