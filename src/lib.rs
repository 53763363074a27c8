pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    config::Config,
    domain::{gateway::PaymentGateway, hooks::HookRegistry, store::TransactionStore},
    services::{
        reconciler::WebhookReconciler, request_builder::TransactionRequestBuilder,
        transaction_service::TransactionService,
    },
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<TransactionService>,
    pub reconciler: Arc<WebhookReconciler>,
    pub webhook_signing_secret: Option<Arc<str>>,
    pub callback_path: Arc<str>,
}

impl AppState {
    /// Wires the outbound and inbound paths over one shared store.
    pub fn new(
        config: &Config,
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        hooks: HookRegistry,
    ) -> Self {
        let builder = TransactionRequestBuilder::new(
            config.external_id_prefix.clone(),
            config.webhook.public_url.clone(),
            config.webhook.callback_path.clone(),
            config.environment,
        );
        Self {
            transactions: Arc::new(TransactionService::new(
                builder,
                store.clone(),
                gateway,
                hooks.clone(),
            )),
            reconciler: Arc::new(WebhookReconciler::new(store, hooks)),
            webhook_signing_secret: config.webhook.signing_secret.as_deref().map(Arc::from),
            callback_path: config.webhook.callback_path.as_str().into(),
        }
    }
}
