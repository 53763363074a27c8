use {
    crate::domain::{
        error::PaymentError,
        id::{ExternalId, GatewayId},
        money::Amount,
        store::{StoreFuture, TransactionStore},
        transaction::{
            Customer, DocumentType, Item, NewTransaction, PaymentMethod, StatusChange, Transaction,
            TransactionStatus, TransactionUpdate,
        },
    },
    chrono::{DateTime, Utc},
    rust_decimal::Decimal,
    sqlx::{PgPool, types::Json},
    uuid::Uuid,
};

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    external_id: String,
    gateway_id: Option<String>,
    status: String,
    total_amount: Decimal,
    total_value: Option<Decimal>,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_document: String,
    customer_document_type: String,
    items: Json<Vec<Item>>,
    webhook_url: String,
    ip_address: String,
    pix_payload: Option<String>,
    has_error: bool,
    gateway_customer: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = PaymentError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Transaction {
            id: row.id,
            external_id: ExternalId::new(row.external_id)?,
            gateway_id: row.gateway_id.map(GatewayId::new).transpose()?,
            status: TransactionStatus::try_from(row.status.as_str())?,
            total_amount: Amount::new(row.total_amount)?,
            total_value: row.total_value,
            payment_method: PaymentMethod::Pix,
            customer: Customer {
                name: row.customer_name,
                email: row.customer_email,
                phone: row.customer_phone,
                document_type: DocumentType::try_from(row.customer_document_type.as_str())?,
                document: row.customer_document,
            },
            items: row.items.0,
            webhook_url: row.webhook_url,
            ip_address: row.ip_address,
            pix_payload: row.pix_payload,
            has_error: row.has_error,
            gateway_customer: row.gateway_customer,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Which unique key an update is addressed by.
#[derive(Clone, Copy)]
enum Key {
    External,
    Gateway,
}

impl Key {
    fn select_for_update(self) -> &'static str {
        match self {
            Key::External => "SELECT * FROM transactions WHERE external_id = $1 FOR UPDATE",
            Key::Gateway => "SELECT * FROM transactions WHERE gateway_id = $1 FOR UPDATE",
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// PostgreSQL-backed store. Updates lock only the addressed row.
#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_inner(&self, tx: NewTransaction) -> Result<Transaction, PaymentError> {
        let record = tx.into_record();
        let result = sqlx::query(
            r#"
            INSERT INTO transactions
                (id, external_id, status, total_amount, payment_method,
                 customer_name, customer_email, customer_phone,
                 customer_document, customer_document_type,
                 items, webhook_url, ip_address, has_error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(record.id)
        .bind(record.external_id.as_str())
        .bind(record.status.as_str())
        .bind(record.total_amount.value())
        .bind(record.payment_method.as_str())
        .bind(&record.customer.name)
        .bind(&record.customer.email)
        .bind(&record.customer.phone)
        .bind(&record.customer.document)
        .bind(record.customer.document_type.as_str())
        .bind(Json(&record.items))
        .bind(&record.webhook_url)
        .bind(&record.ip_address)
        .bind(record.has_error)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(e) if is_unique_violation(&e) => Err(PaymentError::DuplicateKey(
                record.external_id.into_inner(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_inner(
        &self,
        key: Key,
        value: &str,
        update: &TransactionUpdate,
    ) -> Result<StatusChange, PaymentError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SET LOCAL lock_timeout = '5s'")
            .execute(&mut *tx)
            .await?;

        let row: Option<TransactionRow> = sqlx::query_as(key.select_for_update())
            .bind(value)
            .fetch_optional(&mut *tx)
            .await?;
        let mut record = Transaction::try_from(
            row.ok_or_else(|| PaymentError::NotFound(value.to_string()))?,
        )?;

        // Domain rules run against the locked row.
        let change = record.apply(update)?;

        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET gateway_id = $2, status = $3, total_value = $4, pix_payload = $5,
                has_error = $6, gateway_customer = $7, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.gateway_id.as_ref().map(GatewayId::as_str))
        .bind(record.status.as_str())
        .bind(record.total_value)
        .bind(record.pix_payload.as_deref())
        .bind(record.has_error)
        .bind(record.gateway_customer.as_ref())
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(PaymentError::GatewayIdConflict {
                    external_id: record.external_id.into_inner(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(change)
    }

    async fn find_inner(&self, sql: &str, value: &str) -> Result<Option<Transaction>, PaymentError> {
        let row: Option<TransactionRow> = sqlx::query_as(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Transaction::try_from).transpose()
    }

    async fn list_pending_inner(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Transaction>, PaymentError> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT * FROM transactions
            WHERE status = 'PENDING' AND gateway_id IS NOT NULL AND updated_at < $1
            ORDER BY updated_at
            LIMIT $2
            "#,
        )
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }
}

impl TransactionStore for PgTransactionStore {
    fn insert(&self, tx: NewTransaction) -> StoreFuture<'_, Transaction> {
        Box::pin(self.insert_inner(tx))
    }

    fn update_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange> {
        Box::pin(self.update_inner(Key::External, external_id.as_str(), update))
    }

    fn update_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
        update: &'a TransactionUpdate,
    ) -> StoreFuture<'a, StatusChange> {
        Box::pin(self.update_inner(Key::Gateway, gateway_id.as_str(), update))
    }

    fn find_by_external_id<'a>(
        &'a self,
        external_id: &'a ExternalId,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(self.find_inner(
            "SELECT * FROM transactions WHERE external_id = $1",
            external_id.as_str(),
        ))
    }

    fn find_by_gateway_id<'a>(
        &'a self,
        gateway_id: &'a GatewayId,
    ) -> StoreFuture<'a, Option<Transaction>> {
        Box::pin(self.find_inner(
            "SELECT * FROM transactions WHERE gateway_id = $1",
            gateway_id.as_str(),
        ))
    }

    fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreFuture<'_, Vec<Transaction>> {
        Box::pin(self.list_pending_inner(older_than, limit))
    }
}
