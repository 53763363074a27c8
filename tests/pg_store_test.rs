//! Requires a local Postgres (see `TEST_ADMIN_DATABASE_URL`); run with
//! `cargo test -- --ignored`.

mod common;

use common::*;
use pix_sync::domain::error::PaymentError;
use pix_sync::domain::hooks::HookRegistry;
use pix_sync::domain::id::{ExternalId, GatewayId};
use pix_sync::domain::store::TransactionStore;
use pix_sync::domain::transaction::{TransactionStatus, TransactionUpdate};
use pix_sync::infra::postgres::transaction_repo::PgTransactionStore;
use pix_sync::services::reconciler::{ReconcileOutcome, WebhookPayload, WebhookReconciler};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

const DB: &str = "pix_sync_test_store";

fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::now_v7().simple())
}

fn gateway_update(gateway_id: &str) -> TransactionUpdate {
    TransactionUpdate {
        gateway_id: Some(GatewayId::new(gateway_id).unwrap()),
        total_value: Some(dec!(39.90)),
        pix_payload: Some(PIX_PAYLOAD.into()),
        has_error: Some(false),
        gateway_customer: Some(json!({ "email": "maria@example.com", "name": "Maria Silva" })),
        ..TransactionUpdate::default()
    }
}

async fn store() -> PgTransactionStore {
    PgTransactionStore::new(setup_pool(DB).await)
}

#[tokio::test]
#[ignore]
async fn insert_then_find_roundtrips_the_record() {
    let store = store().await;
    let ext = unique("pix");

    let inserted = store.insert(new_transaction(&ext, dec!(39.90))).await.unwrap();
    assert_eq!(inserted.status, TransactionStatus::Pending);

    let found = store
        .find_by_external_id(&ExternalId::new(ext.clone()).unwrap())
        .await
        .unwrap()
        .expect("row must exist");
    assert_eq!(found.id, inserted.id);
    assert_eq!(found.total_amount.value(), dec!(39.90));
    assert_eq!(found.customer.document, "11144477735");
    assert_eq!(found.items.len(), 1);
    assert!(found.gateway_id.is_none());
}

#[tokio::test]
#[ignore]
async fn duplicate_external_id_is_rejected() {
    let store = store().await;
    let ext = unique("pix");

    store.insert(new_transaction(&ext, dec!(10))).await.unwrap();
    let err = store.insert(new_transaction(&ext, dec!(10))).await.unwrap_err();
    assert!(matches!(err, PaymentError::DuplicateKey(ref k) if *k == ext));
}

#[tokio::test]
#[ignore]
async fn gateway_response_is_recorded_and_addressable_by_gateway_id() {
    let store = store().await;
    let ext = unique("pix");
    let gw = unique("gw");

    store.insert(new_transaction(&ext, dec!(39.90))).await.unwrap();
    store
        .update_by_external_id(&ExternalId::new(ext.clone()).unwrap(), &gateway_update(&gw))
        .await
        .unwrap();

    let change = store
        .update_by_gateway_id(
            &GatewayId::new(gw.clone()).unwrap(),
            &TransactionUpdate::status(TransactionStatus::Authorized),
        )
        .await
        .unwrap();
    assert_eq!(change.previous, TransactionStatus::Pending);
    assert_eq!(change.current, TransactionStatus::Authorized);

    let row = store
        .find_by_gateway_id(&GatewayId::new(gw).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, TransactionStatus::Authorized);
    assert_eq!(row.pix_payload.as_deref(), Some(PIX_PAYLOAD));
    assert_eq!(row.total_value, Some(dec!(39.90)));
    assert!(row.gateway_customer.is_some());
}

#[tokio::test]
#[ignore]
async fn unknown_gateway_id_is_not_found() {
    let store = store().await;
    let err = store
        .update_by_gateway_id(
            &GatewayId::new("ghost-1").unwrap(),
            &TransactionUpdate::status(TransactionStatus::Authorized),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::NotFound(_)));
}

#[tokio::test]
#[ignore]
async fn pending_is_never_reentered() {
    let store = store().await;
    let ext = ExternalId::new(unique("pix")).unwrap();

    store.insert(new_transaction(ext.as_str(), dec!(5))).await.unwrap();
    store
        .update_by_external_id(&ext, &TransactionUpdate::status(TransactionStatus::Failed))
        .await
        .unwrap();
    let err = store
        .update_by_external_id(&ext, &TransactionUpdate::status(TransactionStatus::Pending))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::InvalidTransition { .. }));

    let row = store.find_by_external_id(&ext).await.unwrap().unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
}

#[tokio::test]
#[ignore]
async fn gateway_id_is_write_once_and_unique() {
    let store = store().await;
    let a = ExternalId::new(unique("pix")).unwrap();
    let b = ExternalId::new(unique("pix")).unwrap();
    let gw = unique("gw");

    store.insert(new_transaction(a.as_str(), dec!(5))).await.unwrap();
    store.insert(new_transaction(b.as_str(), dec!(5))).await.unwrap();
    store.update_by_external_id(&a, &gateway_update(&gw)).await.unwrap();

    // Same id again is a no-op.
    store.update_by_external_id(&a, &gateway_update(&gw)).await.unwrap();

    let err = store
        .update_by_external_id(&a, &gateway_update(&unique("gw")))
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::GatewayIdConflict { .. }));

    let err = store.update_by_external_id(&b, &gateway_update(&gw)).await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayIdConflict { .. }));
    assert!(store.find_by_external_id(&b).await.unwrap().unwrap().gateway_id.is_none());
}

#[tokio::test]
#[ignore]
async fn list_pending_only_returns_rows_with_gateway_id() {
    let store = store().await;
    let with_gw = ExternalId::new(unique("pix")).unwrap();
    let without_gw = ExternalId::new(unique("pix")).unwrap();
    let gw = unique("gw");

    store.insert(new_transaction(with_gw.as_str(), dec!(5))).await.unwrap();
    store.insert(new_transaction(without_gw.as_str(), dec!(5))).await.unwrap();
    store.update_by_external_id(&with_gw, &gateway_update(&gw)).await.unwrap();

    let later = chrono::Utc::now() + chrono::Duration::seconds(5);
    let rows = store.list_pending(later, 1000).await.unwrap();
    assert!(rows.iter().any(|r| r.external_id == with_gw));
    assert!(rows.iter().all(|r| r.external_id != without_gw));
}

// ── concurrent_webhooks_under_row_locks ────────────────────────────────────
// FOR UPDATE serializes the read-modify-write, so only one delivery sees the
// PENDING → AUTHORIZED change.

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn concurrent_webhooks_under_row_locks() {
    let store = Arc::new(store().await);
    let ext = ExternalId::new(unique("pix")).unwrap();
    let gw = unique("gw");
    store.insert(new_transaction(ext.as_str(), dec!(5))).await.unwrap();
    store.update_by_external_id(&ext, &gateway_update(&gw)).await.unwrap();

    let hook = Arc::new(CountingHook::default());
    let reconciler = Arc::new(WebhookReconciler::new(
        store.clone(),
        HookRegistry::new().with(TransactionStatus::Authorized, hook.clone()),
    ));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let reconciler = reconciler.clone();
        let payload = WebhookPayload {
            id: Some(gw.clone()),
            status: Some("AUTHORIZED".into()),
            ..WebhookPayload::default()
        };
        handles.push(tokio::spawn(async move {
            reconciler.handle(&payload).await.unwrap()
        }));
    }

    let mut updated = 0;
    for h in handles {
        if let ReconcileOutcome::Updated(_) = h.await.unwrap() {
            updated += 1;
        }
    }
    assert_eq!(updated, 1);
    assert_eq!(hook.count(), 1);
}
