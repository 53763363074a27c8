use {
    crate::{
        AppState,
        adapters::{api_errors::ApiError, webhook_auth},
        domain::{error::PaymentError, id::GatewayId},
        services::{
            reconciler::WebhookPayload,
            request_builder::{RawOrder, RequestContext},
        },
    },
    axum::{
        Json, Router,
        body::Bytes,
        extract::{DefaultBodyLimit, Path, State},
        http::{HeaderMap, StatusCode},
        routing::{get, post},
    },
    rust_decimal::prelude::ToPrimitive,
    serde_json::{Value, json},
    std::time::Duration,
    tower_http::{timeout::TimeoutLayer, trace::TraceLayer},
    tracing::field::{Empty, display},
};

/// Checkout orders and gateway callbacks are both small JSON documents.
const BODY_LIMIT: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let callback_path = state.callback_path.to_string();
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/health/gateway", get(gateway_health))
        .route("/api/payments", post(create_payment))
        .route("/api/payments/{transaction_id}", get(payment_status))
        .route(&callback_path, get(webhook_probe).post(pix_webhook))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Request timeout and tracing around any router. A request still running
/// after `timeout` is answered with 408.
pub fn with_service_layers(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

pub fn request_context(headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    RequestContext {
        host: header("host"),
        forwarded_host: header("x-forwarded-host"),
        forwarded_proto: header("x-forwarded-proto"),
        forwarded_for: header("x-forwarded-for"),
        real_ip: header("x-real-ip"),
    }
}

#[tracing::instrument(
    name = "create_payment",
    skip_all,
    fields(external_id = Empty, gateway_id = Empty)
)]
pub async fn create_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let order: RawOrder = serde_json::from_slice(&body)
        .map_err(|e| PaymentError::Validation(format!("invalid request body: {e}")))?;

    let created = state
        .transactions
        .create(&order, &request_context(&headers))
        .await?;

    tracing::Span::current()
        .record("external_id", display(&created.external_id))
        .record("gateway_id", display(&created.id));

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "transaction": created })),
    ))
}

#[tracing::instrument(name = "payment_status", skip_all, fields(gateway_id = Empty))]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    tracing::Span::current().record("gateway_id", display(&transaction_id));
    let gateway_id = GatewayId::new(transaction_id)?;
    let remote = state.transactions.get_status(&gateway_id).await?;

    Ok(Json(json!({
        "success": true,
        "transaction": {
            "id": remote.id,
            "external_id": remote.external_id,
            "status": remote.status,
            "total_value": remote.total_value.and_then(|v| v.to_f64()),
            "customer": remote.customer,
            "payment_method": remote.payment_method,
            "pix_payload": remote.pix_payload(),
            "hasError": remote.has_error,
        }
    })))
}

#[tracing::instrument(name = "gateway_health", skip_all)]
pub async fn gateway_health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let account = state.transactions.check_gateway().await?;
    Ok(Json(json!({ "success": true, "account": account })))
}

pub async fn webhook_probe() -> Json<Value> {
    Json(json!({
        "message": "PIX webhook endpoint is active",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Gateway callback. Once the signature (if configured) checks out, the
/// gateway always gets a 200 so it does not retry storms; problems are
/// logged instead.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(gateway_id = Empty, status = Empty)
)]
pub async fn pix_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    if let Some(secret) = state.webhook_signing_secret.as_deref() {
        webhook_auth::verify(secret, &headers, &body).inspect_err(|e| {
            tracing::warn!(error = %e, "webhook rejected");
        })?;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body is not a valid payload");
            return Ok(ack("invalid_payload"));
        }
    };

    let span = tracing::Span::current();
    if let Some(id) = payload.id.as_deref() {
        span.record("gateway_id", id);
    }
    if let Some(status) = payload.status.as_deref() {
        span.record("status", status);
    }

    let label = match state.reconciler.handle(&payload).await {
        Ok(outcome) => outcome.label(),
        Err(PaymentError::MalformedPayload(msg)) => {
            tracing::warn!("malformed webhook: {msg}");
            "invalid_payload"
        }
        Err(e) => {
            tracing::error!(error = %e, "webhook processing failed");
            "error"
        }
    };

    Ok(ack(label))
}

fn ack(status: &str) -> Json<Value> {
    Json(json!({
        "received": true,
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
