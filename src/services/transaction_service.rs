use {
    super::request_builder::{RawOrder, RequestContext, TransactionRequestBuilder},
    crate::domain::{
        error::PaymentError,
        gateway::{AccountInfo, GatewayTransaction, PaymentGateway},
        hooks::{HookRegistry, StatusNotice},
        id::{ExternalId, GatewayId},
        store::TransactionStore,
        transaction::{PaymentMethod, TransactionStatus, TransactionUpdate},
    },
    rust_decimal::Decimal,
    serde::Serialize,
    std::sync::Arc,
};

/// What the caller gets back after a successful creation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreatedTransaction {
    pub id: String,
    pub external_id: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub total_value: Option<Decimal>,
    pub pix_payload: Option<String>,
    pub payment_method: PaymentMethod,
    #[serde(rename = "hasError")]
    pub has_error: bool,
    /// Gateway-confirmed total deviates from the requested amount by more
    /// than rounding.
    pub amount_mismatch: bool,
    /// Set when the gateway accepted the transaction but recording its
    /// response locally failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookkeeping_error: Option<String>,
}

/// Outbound path: build → persist PENDING → gateway → persist result.
pub struct TransactionService {
    builder: TransactionRequestBuilder,
    store: Arc<dyn TransactionStore>,
    gateway: Arc<dyn PaymentGateway>,
    hooks: HookRegistry,
}

impl TransactionService {
    /// `hooks` should be the registry the webhook path uses: a status the
    /// gateway settles synchronously is notified here, and the matching
    /// callback then arrives as a replay.
    pub fn new(
        builder: TransactionRequestBuilder,
        store: Arc<dyn TransactionStore>,
        gateway: Arc<dyn PaymentGateway>,
        hooks: HookRegistry,
    ) -> Self {
        Self {
            builder,
            store,
            gateway,
            hooks,
        }
    }

    pub async fn create(
        &self,
        order: &RawOrder,
        ctx: &RequestContext,
    ) -> Result<CreatedTransaction, PaymentError> {
        let built = self.builder.build(order, ctx)?;
        let external_id = built.record.external_id.clone();
        let requested = built.record.total_amount;

        tracing::debug!(
            external_id = %external_id,
            customer = %built.record.customer.name,
            document = %built.record.customer.formatted_document(),
            phone = %built.record.customer.formatted_phone(),
            "order validated"
        );

        // Persisted before the gateway call so a crash leaves a PENDING row
        // rather than a gateway transaction we have no record of.
        self.store.insert(built.record).await?;
        tracing::info!(
            external_id = %external_id,
            amount = %requested,
            items = built.request.items.len(),
            "transaction persisted as PENDING"
        );

        let response = match self.gateway.create_transaction(&built.request).await {
            Ok(r) => r,
            Err(e) => {
                // Not marked FAILED: the gateway may have created it anyway.
                tracing::error!(
                    external_id = %external_id,
                    error = %e,
                    "gateway creation failed, PENDING row left for reconciliation"
                );
                return Err(e);
            }
        };

        if response.external_id.as_deref().is_some_and(|id| id != external_id.as_str()) {
            tracing::warn!(
                external_id = %external_id,
                gateway_external_id = ?response.external_id,
                "gateway echoed a different external_id"
            );
        }

        let amount_mismatch = response
            .total_value
            .is_some_and(|confirmed| requested.deviates_from(confirmed));
        if amount_mismatch {
            tracing::warn!(
                external_id = %external_id,
                requested = %requested,
                confirmed = ?response.total_value,
                "gateway total deviates from requested amount"
            );
        }

        let bookkeeping_error = match self.record_response(&external_id, &response).await {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(
                    external_id = %external_id,
                    gateway_id = %response.id,
                    error = %e,
                    "failed to record gateway response locally"
                );
                Some(e.to_string())
            }
        };

        tracing::info!(
            external_id = %external_id,
            gateway_id = %response.id,
            status = %response.status,
            "gateway transaction created"
        );

        Ok(CreatedTransaction {
            id: response.id.clone(),
            external_id: external_id.into_inner(),
            status: response.status.clone(),
            total_value: response.total_value,
            pix_payload: response.pix_payload().map(str::to_string),
            payment_method: PaymentMethod::Pix,
            has_error: response.has_error,
            amount_mismatch,
            bookkeeping_error,
        })
    }

    async fn record_response(
        &self,
        external_id: &ExternalId,
        response: &GatewayTransaction,
    ) -> Result<(), PaymentError> {
        let status = match TransactionStatus::try_from(response.status.as_str()) {
            Ok(s) => Some(s),
            Err(_) => {
                tracing::warn!(
                    external_id = %external_id,
                    status = %response.status,
                    "unrecognized status in gateway response, keeping local status"
                );
                None
            }
        };

        let gateway_id = GatewayId::new(response.id.clone())?;
        let update = TransactionUpdate {
            gateway_id: Some(gateway_id.clone()),
            status,
            total_value: response.total_value,
            pix_payload: response.pix_payload().map(str::to_string),
            has_error: Some(response.has_error),
            gateway_customer: response
                .customer
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
        };
        let change = self.store.update_by_external_id(external_id, &update).await?;

        if change.changed() {
            tracing::info!(
                external_id = %external_id,
                gateway_id = %gateway_id,
                from = %change.previous,
                to = %change.current,
                "gateway settled transaction at creation"
            );
            let notice = StatusNotice {
                gateway_id,
                external_id: change.external_id.clone(),
                status: change.current,
                previous: change.previous,
                total_amount: response.total_value,
            };
            self.hooks.dispatch(&notice).await;
        }
        Ok(())
    }

    /// Read-only pass-through to the gateway.
    pub async fn get_status(
        &self,
        gateway_id: &GatewayId,
    ) -> Result<GatewayTransaction, PaymentError> {
        self.gateway.get_transaction(gateway_id).await
    }

    /// Credential/connectivity probe, not part of the transactional path.
    pub async fn check_gateway(&self) -> Result<AccountInfo, PaymentError> {
        self.gateway.get_account_info().await
    }
}
