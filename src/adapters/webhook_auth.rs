use {
    crate::domain::error::PaymentError,
    axum::http::HeaderMap,
    hmac::{Hmac, Mac},
    sha2::Sha256,
};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String, PaymentError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::WebhookSignature(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of the signature header against the raw body.
pub fn verify(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), PaymentError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| PaymentError::WebhookSignature(format!("missing {SIGNATURE_HEADER} header")))?;
    let provided = hex::decode(provided.trim())
        .map_err(|e| PaymentError::WebhookSignature(format!("signature is not hex: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::WebhookSignature(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
}
