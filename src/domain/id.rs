use {
    super::error::PaymentError,
    derive_more::Display,
    rand::Rng,
    serde::{Deserialize, Serialize},
};

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Locally generated reference for a transaction attempt (`<prefix>-<millis>-<suffix>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(String);

impl ExternalId {
    pub fn new(id: impl Into<String>) -> Result<Self, PaymentError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(PaymentError::Validation(format!(
                "ExternalId must be non-empty without whitespace, got: {id:?}"
            )));
        }
        Ok(Self(id))
    }

    /// Fresh id for a new creation attempt. The suffix only needs to separate
    /// requests landing in the same millisecond of this process.
    pub fn generate(prefix: &str) -> Self {
        let millis = chrono::Utc::now().timestamp_millis();
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        Self(format!("{prefix}-{millis}-{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Identifier the gateway assigns once it accepts a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GatewayId(String);

impl GatewayId {
    pub fn new(id: impl Into<String>) -> Result<Self, PaymentError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PaymentError::Validation("GatewayId must be non-empty".into()));
        }
        if matches!(trimmed, "." | "..") {
            return Err(PaymentError::Validation(format!(
                "GatewayId cannot be a relative path segment, got: {trimmed:?}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_follow_prefix_millis_suffix() {
        let id = ExternalId::generate("pix");
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "pix");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| BASE36.contains(&b)));
    }

    #[test]
    fn generated_ids_differ() {
        let a = ExternalId::generate("pix");
        let b = ExternalId::generate("pix");
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_blank_ids() {
        assert!(ExternalId::new("").is_err());
        assert!(ExternalId::new("a b").is_err());
        assert!(GatewayId::new("   ").is_err());
        assert_eq!(GatewayId::new(" tx_1 ").unwrap().as_str(), "tx_1");
    }

    #[test]
    fn rejects_dot_segment_gateway_ids() {
        assert!(GatewayId::new("..").is_err());
        assert!(GatewayId::new(".").is_err());
        assert!(GatewayId::new("tx..1").is_ok());
    }
}
