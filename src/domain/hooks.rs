use {
    super::error::PaymentError,
    super::id::{ExternalId, GatewayId},
    super::transaction::TransactionStatus,
    rust_decimal::Decimal,
    std::{collections::HashMap, future::Future, pin::Pin, sync::Arc},
};

pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), PaymentError>> + Send + 'a>>;

/// What a hook learns about a status change it is notified of.
#[derive(Debug, Clone)]
pub struct StatusNotice {
    pub gateway_id: GatewayId,
    pub external_id: ExternalId,
    pub status: TransactionStatus,
    pub previous: TransactionStatus,
    pub total_amount: Option<Decimal>,
}

/// Best-effort side effect (emails, fulfilment, alerts) run after a status
/// change is stored. Failures are logged by the caller, never propagated.
pub trait StatusHook: Send + Sync {
    fn name(&self) -> &str;

    fn notify<'a>(&'a self, notice: &'a StatusNotice) -> HookFuture<'a>;
}

#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: HashMap<TransactionStatus, Vec<Arc<dyn StatusHook>>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, status: TransactionStatus, hook: Arc<dyn StatusHook>) {
        self.hooks.entry(status).or_default().push(hook);
    }

    pub fn with(mut self, status: TransactionStatus, hook: Arc<dyn StatusHook>) -> Self {
        self.register(status, hook);
        self
    }

    pub fn hooks_for(&self, status: TransactionStatus) -> &[Arc<dyn StatusHook>] {
        self.hooks.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Runs every hook registered for `notice.status` in order. A failing
    /// hook is logged and does not stop the ones after it.
    pub async fn dispatch(&self, notice: &StatusNotice) {
        for hook in self.hooks_for(notice.status) {
            if let Err(e) = hook.notify(notice).await {
                tracing::error!(
                    hook = hook.name(),
                    gateway_id = %notice.gateway_id,
                    status = %notice.status,
                    error = %e,
                    "status hook failed"
                );
            }
        }
    }

    /// One [`LoggingHook`] per settled status.
    pub fn logging() -> Self {
        let hook: Arc<dyn StatusHook> = Arc::new(LoggingHook);
        TransactionStatus::ALL
            .into_iter()
            .filter(|s| *s != TransactionStatus::Pending)
            .fold(Self::new(), |reg, status| reg.with(status, hook.clone()))
    }
}

pub struct LoggingHook;

impl StatusHook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn notify<'a>(&'a self, notice: &'a StatusNotice) -> HookFuture<'a> {
        Box::pin(async move {
            match notice.status {
                TransactionStatus::Authorized => tracing::info!(
                    gateway_id = %notice.gateway_id,
                    external_id = %notice.external_id,
                    amount = ?notice.total_amount,
                    "payment authorized"
                ),
                TransactionStatus::Failed => tracing::warn!(
                    gateway_id = %notice.gateway_id,
                    external_id = %notice.external_id,
                    "payment failed"
                ),
                TransactionStatus::Chargeback => tracing::warn!(
                    gateway_id = %notice.gateway_id,
                    external_id = %notice.external_id,
                    amount = ?notice.total_amount,
                    "chargeback received"
                ),
                TransactionStatus::InDispute => tracing::warn!(
                    gateway_id = %notice.gateway_id,
                    external_id = %notice.external_id,
                    "payment in dispute"
                ),
                TransactionStatus::Pending => {}
            }
            Ok(())
        })
    }
}
