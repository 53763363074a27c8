use {
    super::error::PaymentError,
    super::id::{ExternalId, GatewayId},
    super::transaction::{NewTransaction, StatusChange, Transaction, TransactionUpdate},
    chrono::{DateTime, Utc},
    std::{future::Future, pin::Pin},
};

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PaymentError>> + Send + 'a>>;

/// Durable record of every transaction attempt. Single source of truth for
/// local state; both the outbound and the webhook path read through it.
pub trait TransactionStore: Send + Sync {
    /// Fails with [`PaymentError::DuplicateKey`] when `external_id` exists.
    fn insert(&self, tx: NewTransaction) -> StoreFuture<'_, Transaction>;

    fn update_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange>;

    /// [`PaymentError::NotFound`] is the expected answer for callbacks about
    /// transactions this deployment never created.
    fn update_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange>;

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreFuture<'a, Option<Transaction>>;

    fn find_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
    ) -> StoreFuture<'a, Option<Transaction>>;

    /// PENDING rows that already carry a gateway id and were last touched
    /// before `older_than`, oldest first.
    fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreFuture<'_, Vec<Transaction>>;
}
