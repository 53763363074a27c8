use crate::domain::error::{GatewayError, PaymentError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

// Newtype so the domain error stays free of axum.
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match &self.0 {
            PaymentError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            PaymentError::MalformedPayload(msg) => {
                (StatusCode::BAD_REQUEST, "malformed_payload", msg.clone())
            }
            PaymentError::WebhookSignature(_) => (
                StatusCode::UNAUTHORIZED,
                "webhook_error",
                "invalid webhook signature".to_string(),
            ),
            PaymentError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                format!("transaction {id} not found"),
            ),
            PaymentError::Gateway(err) if err.is_not_found() => (
                StatusCode::NOT_FOUND,
                "transaction_not_found",
                "transaction not found at gateway".to_string(),
            ),
            PaymentError::Gateway(err) => {
                tracing::error!("gateway error: {err}");
                let message = match err {
                    GatewayError::Status { status, .. } => {
                        format!("payment gateway rejected the request ({status})")
                    }
                    GatewayError::Parse(_) => "payment gateway sent an invalid response".into(),
                    GatewayError::Transport(_) => "payment gateway unreachable".into(),
                };
                (StatusCode::BAD_GATEWAY, "gateway_error", message)
            }
            PaymentError::DuplicateKey(_)
            | PaymentError::InvalidTransition { .. }
            | PaymentError::GatewayIdConflict { .. } => {
                tracing::error!("store conflict: {}", self.0);
                (StatusCode::CONFLICT, "conflict", self.0.to_string())
            }
            PaymentError::Configuration(msg) => {
                tracing::error!("configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "service misconfigured".to_string(),
                )
            }
            PaymentError::Database(err) => {
                tracing::error!("database error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
            PaymentError::Serialization(err) => {
                tracing::error!("serialization error: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = self.parts();

        let body = serde_json::json!({
            "success": false,
            "error_code": error_code,
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: PaymentError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn validation_is_a_client_error() {
        assert_eq!(
            status_of(PaymentError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn gateway_failures_are_distinguished() {
        assert_eq!(
            status_of(PaymentError::Gateway(GatewayError::Status {
                status: 404,
                body: "{}".into()
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(PaymentError::Gateway(GatewayError::Status {
                status: 500,
                body: "boom".into()
            })),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(PaymentError::Gateway(GatewayError::Transport("timeout".into()))),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn duplicate_key_is_a_conflict() {
        assert_eq!(
            status_of(PaymentError::DuplicateKey("pix-1".into())),
            StatusCode::CONFLICT
        );
    }
}
