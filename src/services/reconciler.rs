use {
    crate::domain::{
        error::PaymentError,
        hooks::{HookRegistry, StatusNotice},
        id::GatewayId,
        money::decimal_from_json,
        store::TransactionStore,
        transaction::{StatusChange, TransactionStatus, TransactionUpdate},
    },
    serde::Deserialize,
    std::sync::Arc,
};

/// Gateway callback body. Every field is optional so shape problems surface
/// as [`PaymentError::MalformedPayload`] instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    pub id: Option<String>,
    pub external_id: Option<String>,
    pub total_amount: Option<serde_json::Value>,
    pub status: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Status written and hooks dispatched.
    Updated(StatusChange),
    /// Replay of a status already stored; nothing dispatched.
    Duplicate(StatusChange),
    /// No local record for this gateway id.
    Orphan,
    /// Recognized payload that changes nothing (unknown status, PENDING after settlement).
    Ignored(String),
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated(_) => "processed",
            Self::Duplicate(_) => "duplicate",
            Self::Orphan => "orphan",
            Self::Ignored(_) => "ignored",
        }
    }
}

/// Inbound path: applies gateway callbacks to the store idempotently.
pub struct WebhookReconciler {
    store: Arc<dyn TransactionStore>,
    hooks: HookRegistry,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn TransactionStore>, hooks: HookRegistry) -> Self {
        Self { store, hooks }
    }

    pub async fn handle(&self, payload: &WebhookPayload) -> Result<ReconcileOutcome, PaymentError> {
        let id = non_empty(payload.id.as_deref())
            .ok_or_else(|| PaymentError::MalformedPayload("missing id".into()))?;
        let raw_status = non_empty(payload.status.as_deref())
            .ok_or_else(|| PaymentError::MalformedPayload("missing status".into()))?;
        let gateway_id = GatewayId::new(id)?;

        let status = match TransactionStatus::try_from(raw_status) {
            Ok(s) => s,
            Err(_) => {
                tracing::warn!(gateway_id = %gateway_id, status = raw_status, "unknown webhook status, ignored");
                return Ok(ReconcileOutcome::Ignored(format!("unknown status {raw_status}")));
            }
        };

        let change = match self
            .store
            .update_by_gateway_id(&gateway_id, &TransactionUpdate::status(status))
            .await
        {
            Ok(change) => change,
            Err(PaymentError::NotFound(_)) => {
                tracing::warn!(gateway_id = %gateway_id, status = %status, "orphan webhook, no local transaction");
                return Ok(ReconcileOutcome::Orphan);
            }
            Err(PaymentError::InvalidTransition { from, to }) => {
                tracing::info!(gateway_id = %gateway_id, %from, %to, "webhook would regress status, ignored");
                return Ok(ReconcileOutcome::Ignored(format!("{from} → {to}")));
            }
            Err(e) => return Err(e),
        };

        if let Some(ext) = payload.external_id.as_deref() {
            if ext != change.external_id.as_str() {
                tracing::warn!(
                    gateway_id = %gateway_id,
                    stored = %change.external_id,
                    reported = ext,
                    "webhook external_id does not match stored record"
                );
            }
        }

        if !change.changed() {
            tracing::info!(gateway_id = %gateway_id, status = %status, "duplicate webhook, status unchanged");
            return Ok(ReconcileOutcome::Duplicate(change));
        }

        tracing::info!(
            gateway_id = %gateway_id,
            external_id = %change.external_id,
            from = %change.previous,
            to = %change.current,
            "transaction status updated"
        );

        let notice = StatusNotice {
            gateway_id,
            external_id: change.external_id.clone(),
            status: change.current,
            previous: change.previous,
            total_amount: payload
                .total_amount
                .as_ref()
                .and_then(|v| decimal_from_json(v).ok()),
        };
        self.hooks.dispatch(&notice).await;

        Ok(ReconcileOutcome::Updated(change))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
