use {
    crate::domain::error::PaymentError,
    std::{fmt, net::SocketAddr, time::Duration},
    url::{Host, Url},
};

pub const DEFAULT_GATEWAY_URL: &str = "https://api.viperpay.com.br";
pub const DEFAULT_CALLBACK_PATH: &str = "/api/webhooks/pix";
const SECRET_PREFIX: &str = "sk_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// How the gateway base URL is resolved when it is absent or not HTTPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseUrlMode {
    /// Missing or malformed URL is a configuration error.
    Strict,
    /// Missing or non-HTTPS URL falls back to [`DEFAULT_GATEWAY_URL`].
    Permissive,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub api_secret: String,
    pub url_mode: BaseUrlMode,
    pub timeout: Duration,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_secret", &"<redacted>")
            .field("url_mode", &self.url_mode)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct WebhookConfig {
    /// Pre-configured absolute HTTPS callback URL, used verbatim.
    pub public_url: Option<String>,
    pub callback_path: String,
    pub signing_secret: Option<String>,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("public_url", &self.public_url)
            .field("callback_path", &self.callback_path)
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Zero disables the sweeper.
    pub interval: Duration,
    pub min_age: Duration,
    pub batch: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: Option<String>,
    pub environment: Environment,
    pub external_id_prefix: String,
    pub gateway: GatewayConfig,
    pub webhook: WebhookConfig,
    pub sweeper: SweeperConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build and validate from any key/value source. Blank values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PaymentError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr = get("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".into())
            .parse::<SocketAddr>()
            .map_err(|e| PaymentError::Configuration(format!("LISTEN_ADDR: {e}")))?;

        let environment = match get("APP_ENV").as_deref() {
            None | Some("production") => Environment::Production,
            Some("development") => Environment::Development,
            Some(other) => {
                return Err(PaymentError::Configuration(format!(
                    "APP_ENV must be development or production, got: {other}"
                )));
            }
        };

        let url_mode = match get("VIPERPAY_URL_MODE").as_deref() {
            None | Some("strict") => BaseUrlMode::Strict,
            Some("permissive") => BaseUrlMode::Permissive,
            Some(other) => {
                return Err(PaymentError::Configuration(format!(
                    "VIPERPAY_URL_MODE must be strict or permissive, got: {other}"
                )));
            }
        };

        let api_secret = get("VIPERPAY_API_SECRET").ok_or_else(|| {
            PaymentError::Configuration("VIPERPAY_API_SECRET is required".into())
        })?;

        let gateway = GatewayConfig {
            base_url: get("VIPERPAY_API_URL"),
            api_secret,
            url_mode,
            timeout: Duration::from_secs(parse_u64(&get, "VIPERPAY_TIMEOUT_SECS", 30)?),
        };
        validate_secret(&gateway.api_secret)?;
        resolve_base_url(gateway.base_url.as_deref(), gateway.url_mode)?;

        let public_url = get("VIPERPAY_WEBHOOK_URL");
        if let Some(url) = &public_url {
            let parsed = Url::parse(url).map_err(|e| {
                PaymentError::Configuration(format!("VIPERPAY_WEBHOOK_URL: {e}"))
            })?;
            if parsed.scheme() != "https" {
                return Err(PaymentError::Configuration(format!(
                    "VIPERPAY_WEBHOOK_URL must be https, got: {url}"
                )));
            }
        }

        let mut callback_path = get("WEBHOOK_CALLBACK_PATH").unwrap_or_else(|| DEFAULT_CALLBACK_PATH.into());
        if !callback_path.starts_with('/') {
            callback_path.insert(0, '/');
        }

        let sweeper = SweeperConfig {
            interval: Duration::from_secs(parse_u64(&get, "RECONCILE_INTERVAL_SECS", 0)?),
            min_age: Duration::from_secs(parse_u64(&get, "RECONCILE_MIN_AGE_SECS", 300)?),
            batch: parse_u64(&get, "RECONCILE_BATCH", 20)? as i64,
        };

        Ok(Self {
            listen_addr,
            database_url: get("DATABASE_URL"),
            environment,
            external_id_prefix: get("EXTERNAL_ID_PREFIX").unwrap_or_else(|| "pix".into()),
            gateway,
            webhook: WebhookConfig {
                public_url,
                callback_path,
                signing_secret: get("WEBHOOK_SIGNING_SECRET"),
            },
            sweeper,
        })
    }
}

fn parse_u64(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, PaymentError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|e| PaymentError::Configuration(format!("{key}: {e}"))),
    }
}

pub fn validate_secret(secret: &str) -> Result<(), PaymentError> {
    if secret.trim().is_empty() {
        return Err(PaymentError::Configuration(
            "VIPERPAY_API_SECRET is required".into(),
        ));
    }
    if !secret.starts_with(SECRET_PREFIX) {
        return Err(PaymentError::Configuration(format!(
            "VIPERPAY_API_SECRET must start with '{SECRET_PREFIX}'"
        )));
    }
    Ok(())
}

/// Decided on the parsed host, after the URL parser has normalized numeric
/// and hex IPv4 forms.
pub fn is_loopback_url(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
        Some(Host::Ipv6(ip)) => {
            ip.is_loopback()
                || ip.is_unspecified()
                || ip.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
        Some(Host::Domain(name)) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
        None => false,
    }
}

/// Resolve the gateway base URL: HTTPS required (plain HTTP only towards a
/// loopback sandbox), trailing slash stripped.
pub fn resolve_base_url(raw: Option<&str>, mode: BaseUrlMode) -> Result<String, PaymentError> {
    let candidate = raw.map(str::trim).filter(|s| !s.is_empty());

    let checked = candidate.map(|url| {
        let parsed = Url::parse(url)
            .map_err(|e| PaymentError::Configuration(format!("VIPERPAY_API_URL: {e}")))?;
        let secure = parsed.scheme() == "https"
            || (parsed.scheme() == "http" && is_loopback_url(&parsed));
        if !secure {
            return Err(PaymentError::Configuration(format!(
                "VIPERPAY_API_URL must start with https://, got: {url}"
            )));
        }
        Ok(url.trim_end_matches('/').to_string())
    });

    match (checked, mode) {
        (Some(Ok(url)), _) => Ok(url),
        (Some(Err(e)), BaseUrlMode::Strict) => Err(e),
        (None, BaseUrlMode::Strict) => Err(PaymentError::Configuration(
            "VIPERPAY_API_URL is required".into(),
        )),
        (Some(Err(e)), BaseUrlMode::Permissive) => {
            tracing::warn!(error = %e, fallback = DEFAULT_GATEWAY_URL, "using fallback gateway URL");
            Ok(DEFAULT_GATEWAY_URL.to_string())
        }
        (None, BaseUrlMode::Permissive) => Ok(DEFAULT_GATEWAY_URL.to_string()),
    }
}
