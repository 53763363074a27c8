use {
    crate::{
        config::{GatewayConfig, resolve_base_url, validate_secret},
        domain::{
            error::{GatewayError, PaymentError},
            gateway::{
                AccountInfo, CreateTransactionRequest, GatewayFuture, GatewayTransaction,
                PaymentGateway,
            },
            id::GatewayId,
        },
    },
    reqwest::{Client, Method, header},
    serde::de::DeserializeOwned,
    url::Url,
};

const SECRET_HEADER: &str = "api-secret";
const TRANSACTIONS_PATH: [&str; 2] = ["v1", "transactions"];
const ACCOUNT_INFO_PATH: [&str; 2] = ["v1", "account-info"];

/// HTTP client for the ViperPay PIX API.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
    api_secret: String,
}

impl GatewayClient {
    /// Fails fast on a missing/malformed secret or base URL; callers treat the
    /// error as fatal at startup.
    pub fn new(config: &GatewayConfig) -> Result<Self, PaymentError> {
        validate_secret(&config.api_secret)?;
        let base_url = resolve_base_url(config.base_url.as_deref(), config.url_mode)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Configuration(format!("http client: {e}")))?;

        tracing::info!(
            base_url = %base_url,
            timeout_secs = config.timeout.as_secs(),
            "gateway client ready"
        );

        Ok(Self {
            client,
            base_url,
            api_secret: config.api_secret.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Each segment is percent-encoded on its own, so an id can never add
    /// path components of its own.
    fn endpoint<'s>(
        &self,
        segments: impl IntoIterator<Item = &'s str>,
    ) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::Transport(format!("base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| GatewayError::Transport(format!("base url has no path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&CreateTransactionRequest>,
    ) -> Result<T, GatewayError> {
        tracing::debug!(%method, %url, "gateway request");

        let mut req = self
            .client
            .request(method, url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(SECRET_HEADER, &self.api_secret);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %url, "gateway rejected request");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(%url, error = %e, "unparsable gateway response");
            GatewayError::Parse(format!("{e}: {text}"))
        })
    }
}

impl PaymentGateway for GatewayClient {
    fn create_transaction<'a>(
        &'a self,
        request: &'a CreateTransactionRequest,
    ) -> GatewayFuture<'a, GatewayTransaction> {
        Box::pin(async move {
            let url = self.endpoint(TRANSACTIONS_PATH)?;
            Ok(self.request(Method::POST, url, Some(request)).await?)
        })
    }

    fn get_transaction<'a>(&'a self, id: &'a GatewayId) -> GatewayFuture<'a, GatewayTransaction> {
        Box::pin(async move {
            let url = self.endpoint(TRANSACTIONS_PATH.into_iter().chain([id.as_str()]))?;
            Ok(self.request(Method::GET, url, None).await?)
        })
    }

    fn get_account_info(&self) -> GatewayFuture<'_, AccountInfo> {
        Box::pin(async move {
            let url = self.endpoint(ACCOUNT_INFO_PATH)?;
            Ok(self.request(Method::GET, url, None).await?)
        })
    }
}
