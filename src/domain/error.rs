use {super::transaction::TransactionStatus, thiserror::Error};

/// Failure talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Gateway answered with a non-2xx status.
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Gateway answered 2xx but the body was not the JSON we expect.
    #[error("invalid gateway response: {0}")]
    Parse(String),

    /// Request never completed (connect failure, timeout, reset).
    #[error("gateway transport: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("duplicate external_id: {0}")]
    DuplicateKey(String),

    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("invalid status transition: {from} → {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("gateway_id already set for {external_id}")]
    GatewayIdConflict { external_id: String },

    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),
}
