use {
    super::reconciler::{ReconcileOutcome, WebhookPayload, WebhookReconciler},
    crate::{
        config::SweeperConfig,
        domain::{error::PaymentError, gateway::PaymentGateway, store::TransactionStore},
    },
    std::sync::Arc,
    tokio::sync::watch,
};

/// Re-polls the gateway for PENDING transactions whose webhook never
/// arrived, feeding the answer through the webhook path.
pub struct PendingSweeper {
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<WebhookReconciler>,
    config: SweeperConfig,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub checked: usize,
    pub updated: usize,
    pub failed: usize,
}

impl PendingSweeper {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Arc<WebhookReconciler>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
            config,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.config.interval.is_zero() {
            tracing::info!("pending sweeper disabled");
            return;
        }
        tracing::info!(interval_secs = self.config.interval.as_secs(), "pending sweeper started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("pending sweeper shutting down");
                    return;
                }
                _ = tokio::time::sleep(self.config.interval) => {}
            }

            match self.sweep_once().await {
                Ok(report) if report.checked == 0 => {}
                Ok(report) => tracing::info!(?report, "pending sweep finished"),
                Err(e) => tracing::error!(error = %e, "pending sweep error"),
            }
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, PaymentError> {
        let min_age = chrono::Duration::from_std(self.config.min_age)
            .map_err(|e| PaymentError::Configuration(format!("RECONCILE_MIN_AGE_SECS: {e}")))?;
        let cutoff = chrono::Utc::now() - min_age;
        let rows = self.store.list_pending(cutoff, self.config.batch).await?;

        let mut report = SweepReport::default();
        for row in rows {
            let Some(gateway_id) = row.gateway_id else {
                continue;
            };
            report.checked += 1;

            let remote = match self.gateway.get_transaction(&gateway_id).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(gateway_id = %gateway_id, error = %e, "status poll failed");
                    report.failed += 1;
                    continue;
                }
            };

            let payload = WebhookPayload {
                id: Some(gateway_id.as_str().to_string()),
                external_id: remote.external_id.clone(),
                total_amount: remote
                    .total_value
                    .map(|v| serde_json::Value::String(v.to_string())),
                status: Some(remote.status.clone()),
                payment_method: remote.payment_method.clone(),
            };
            match self.reconciler.handle(&payload).await {
                Ok(ReconcileOutcome::Updated(_)) => report.updated += 1,
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(gateway_id = %gateway_id, error = %e, "applying polled status failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
