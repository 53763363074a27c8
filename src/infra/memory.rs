use {
    crate::domain::{
        error::PaymentError,
        id::{ExternalId, GatewayId},
        store::{StoreFuture, TransactionStore},
        transaction::{
            NewTransaction, StatusChange, Transaction, TransactionStatus, TransactionUpdate,
        },
    },
    chrono::{DateTime, Utc},
    std::{collections::HashMap, sync::Arc},
    tokio::sync::RwLock,
};

#[derive(Default)]
struct Inner {
    by_external: HashMap<String, Transaction>,
    // gateway_id -> external_id
    gateway_index: HashMap<String, String>,
}

/// Thread-safe in-memory store. Used by tests and by deployments started
/// without `DATABASE_URL`; state is lost on restart.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_external.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Snapshot of every record, ordered by creation.
    pub async fn all(&self) -> Vec<Transaction> {
        let mut rows: Vec<Transaction> =
            self.inner.read().await.by_external.values().cloned().collect();
        rows.sort_by_key(|t| t.created_at);
        rows
    }
}

impl Inner {
    fn apply(
        &mut self,
        external_id: &str,
        update: &TransactionUpdate,
    ) -> Result<StatusChange, PaymentError> {
        if let Some(gid) = &update.gateway_id {
            if let Some(owner) = self.gateway_index.get(gid.as_str()) {
                if owner != external_id {
                    return Err(PaymentError::GatewayIdConflict {
                        external_id: external_id.to_string(),
                    });
                }
            }
        }

        let tx = self
            .by_external
            .get_mut(external_id)
            .ok_or_else(|| PaymentError::NotFound(external_id.to_string()))?;
        let change = tx.apply(update)?;

        if let Some(gid) = &tx.gateway_id {
            self.gateway_index
                .insert(gid.as_str().to_string(), external_id.to_string());
        }
        Ok(change)
    }
}

impl TransactionStore for InMemoryTransactionStore {
    fn insert(&self, tx: NewTransaction) -> StoreFuture<'_, Transaction> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let key = tx.external_id.as_str().to_string();
            if inner.by_external.contains_key(&key) {
                return Err(PaymentError::DuplicateKey(key));
            }
            let record = tx.into_record();
            inner.by_external.insert(key, record.clone());
            Ok(record)
        })
    }

    fn update_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange> {
        Box::pin(async move {
            self.inner
                .write()
                .await
                .apply(external_id.as_str(), update)
        })
    }

    fn update_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange> {
        Box::pin(async move {
            let mut inner = self.inner.write().await;
            let external_id = inner
                .gateway_index
                .get(gateway_id.as_str())
                .cloned()
                .ok_or_else(|| PaymentError::NotFound(gateway_id.to_string()))?;
            inner.apply(&external_id, update)
        })
    }

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(async move {
            Ok(self
                .inner
                .read()
                .await
                .by_external
                .get(external_id.as_str())
                .cloned())
        })
    }

    fn find_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            Ok(inner
                .gateway_index
                .get(gateway_id.as_str())
                .and_then(|ext| inner.by_external.get(ext))
                .cloned())
        })
    }

    fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreFuture<'_, Vec<Transaction>> {
        Box::pin(async move {
            let inner = self.inner.read().await;
            let mut rows: Vec<Transaction> = inner
                .by_external
                .values()
                .filter(|t| {
                    t.status == TransactionStatus::Pending
                        && t.gateway_id.is_some()
                        && t.updated_at < older_than
                })
                .cloned()
                .collect();
            rows.sort_by_key(|t| t.updated_at);
            rows.truncate(limit.max(0) as usize);
            Ok(rows)
        })
    }
}
