//! Purchase lifecycle against in-memory stores and a scripted provider

mod common;

use aremxyplug_backend::bills::{
    BillRecord, BillService, DataPurchase, DataService, DataTransaction, ElectricityPurchase,
    ElectricityService, ElectricityTransaction, PurchaseHandler, StatusUpdate, StatusUpdateTarget, TransactionStatus,
};
use aremxyplug_backend::database::memory::{InMemoryMessageSink, InMemoryTransactionRepository};
use aremxyplug_backend::error::{ErrorCode, ValidationError};
use aremxyplug_backend::providers::ProviderError;
use aremxyplug_backend::services::PurchaseNotifier;
use bigdecimal::BigDecimal;
use common::{delivered, electricity_request, pending, ScriptedProvider};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    provider: Arc<ScriptedProvider>,
    store: Arc<InMemoryTransactionRepository<ElectricityTransaction>>,
    messages: Arc<InMemoryMessageSink>,
    handler: Arc<PurchaseHandler<ElectricityService>>,
}

fn electricity_fixture(provider: ScriptedProvider) -> Fixture {
    let provider = Arc::new(provider);
    let store = Arc::new(InMemoryTransactionRepository::new());
    let messages = Arc::new(InMemoryMessageSink::new());
    let notifier = Arc::new(PurchaseNotifier::new(messages.clone()));
    let handler = Arc::new(
        PurchaseHandler::<ElectricityService>::new(provider.clone(), store.clone())
            .with_notifier(notifier),
    );

    Fixture {
        provider,
        store,
        messages,
        handler,
    }
}

#[tokio::test]
async fn delivered_purchase_is_persisted_and_retrievable() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Ok(delivered("req-1", "TX-99"))),
    );

    let outcome = fx
        .handler
        .purchase(electricity_request("req-1", "08031234567"))
        .await
        .unwrap();

    assert!(!outcome.replayed);
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.record.status(), TransactionStatus::Success);
    assert_eq!(outcome.record.meta.transaction_id, "TX-99");
    assert_eq!(outcome.record.meta.amount, BigDecimal::from(5000));
    assert_eq!(
        outcome.record.token.as_deref(),
        Some("Token : 1234-5678-9012-3456")
    );

    let by_request = fx.handler.get("req-1").await.unwrap();
    let by_transaction = fx.handler.get("TX-99").await.unwrap();
    assert_eq!(by_request.meta, by_transaction.meta);
    assert_eq!(fx.store.len().await, 1);
}

#[tokio::test]
async fn provider_timeout_leaves_failed_record() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Err(ProviderError::Timeout { timeout_secs: 30 })),
    );

    let outcome = fx
        .handler
        .purchase(electricity_request("req-2", "08031234567"))
        .await
        .unwrap();

    let failure = outcome.failure.expect("timeout is reported");
    assert_eq!(failure.status_code(), 504);
    assert_eq!(failure.error_code(), ErrorCode::ExternalServiceTimeout);

    assert_eq!(outcome.record.status(), TransactionStatus::Failed);
    assert_eq!(outcome.record.meta.amount, BigDecimal::from(5000));
    assert!(outcome.record.meta.transaction_id.is_empty());

    let stored = fx.handler.get("req-2").await.unwrap();
    assert_eq!(stored.status(), TransactionStatus::Failed);
}

#[tokio::test]
async fn settled_request_id_is_replayed_without_dispatch() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Ok(delivered("req-3", "TX-3"))),
    );

    fx.handler
        .purchase(electricity_request("req-3", "08031234567"))
        .await
        .unwrap();
    let replay = fx
        .handler
        .purchase(electricity_request("req-3", "08031234567"))
        .await
        .unwrap();

    assert!(replay.replayed);
    assert_eq!(replay.record.meta.transaction_id, "TX-3");
    assert_eq!(fx.provider.purchase_calls(), 1);
    assert_eq!(fx.store.len().await, 1);
}

#[tokio::test]
async fn response_without_details_is_recorded_as_failed() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Ok(json!({ "code": "000", "amount": 5000 }))),
    );

    let outcome = fx
        .handler
        .purchase(electricity_request("req-4", "08031234567"))
        .await
        .unwrap();

    assert_eq!(outcome.record.status(), TransactionStatus::Failed);
    assert_eq!(
        outcome.failure.map(|f| f.error_code()),
        Some(ErrorCode::ProviderResponseInvalid)
    );
    assert_eq!(fx.store.len().await, 1);
}

#[tokio::test]
async fn invalid_request_writes_nothing() {
    let fx = electricity_fixture(ScriptedProvider::new().always(delivered("req-5", "TX-5")));

    let mut request = electricity_request("req-5", "08031234567");
    request.amount = BigDecimal::from(0);

    let err = fx.handler.purchase(request).await.unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert_eq!(fx.provider.purchase_calls(), 0);
    assert!(fx.store.is_empty().await);
}

#[tokio::test]
async fn request_id_reused_by_another_customer_conflicts() {
    let fx = electricity_fixture(ScriptedProvider::new().always(delivered("req-6", "TX-6")));

    fx.handler
        .purchase(electricity_request("req-6", "08031234567"))
        .await
        .unwrap();
    let err = fx
        .handler
        .purchase(electricity_request("req-6", "08039999999"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 409);
    assert_eq!(err.error_code(), ErrorCode::DuplicateRequest);
    assert_eq!(fx.provider.purchase_calls(), 1);
}

#[tokio::test]
async fn concurrent_purchases_with_one_request_id_dispatch_once() {
    let fx = electricity_fixture(
        ScriptedProvider::new()
            .always(delivered("req-7", "TX-7"))
            .with_delay(Duration::from_millis(50)),
    );

    let (first, second) = tokio::join!(
        fx.handler.purchase(electricity_request("req-7", "08031234567")),
        fx.handler.purchase(electricity_request("req-7", "08031234567")),
    );
    let outcomes = [first.unwrap(), second.unwrap()];

    assert_eq!(fx.provider.purchase_calls(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.replayed).count(), 1);

    let dispatched = outcomes.iter().find(|o| !o.replayed).unwrap();
    assert_eq!(dispatched.record.status(), TransactionStatus::Success);
    assert_eq!(dispatched.record.meta.transaction_id, "TX-7");

    assert_eq!(fx.store.len().await, 1);
    assert_eq!(fx.handler.get("req-7").await.unwrap().status(), TransactionStatus::Success);
    assert_eq!(fx.messages.messages().await.len(), 1);
}

#[tokio::test]
async fn retried_pending_purchase_is_not_dispatched_again() {
    let fx = electricity_fixture(
        ScriptedProvider::new()
            .then_purchase(Ok(pending("req-p", "TX-P")))
            .always(delivered("req-p", "TX-P")),
    );

    let first = fx
        .handler
        .purchase(electricity_request("req-p", "08031234567"))
        .await
        .unwrap();
    assert_eq!(first.record.status(), TransactionStatus::Pending);

    let retry = fx
        .handler
        .purchase(electricity_request("req-p", "08031234567"))
        .await
        .unwrap();

    assert!(retry.replayed);
    assert_eq!(retry.record.status(), TransactionStatus::Pending);
    assert_eq!(retry.record.meta.transaction_id, "TX-P");
    assert_eq!(fx.provider.purchase_calls(), 1);
    assert!(fx.messages.messages().await.is_empty());
}

#[tokio::test]
async fn abbreviated_electricity_request_with_flat_provider_document() {
    let fx = electricity_fixture(ScriptedProvider::new().then_purchase(Ok(json!({
        "code": "000",
        "transactions": {
            "status": "completed",
            "product_name": "Prepaid Token",
            "transactionId": "TX-99"
        },
        "amount": 5000
    }))));

    let request: ElectricityPurchase = serde_json::from_value(json!({
        "meterNo": "1234567890",
        "discoType": "IKEDC",
        "amount": 5000,
        "requestId": "req-1"
    }))
    .unwrap();

    let outcome = fx.handler.purchase(request).await.unwrap();
    assert!(outcome.failure.is_none());

    let record = fx.handler.get("req-1").await.unwrap();
    assert_eq!(record.meta.request_id, "req-1");
    assert_eq!(record.meta.transaction_id, "TX-99");
    assert_eq!(record.status(), TransactionStatus::Success);
    assert_eq!(record.meta.amount, BigDecimal::from(5000));
    assert_eq!(record.meter_number, "1234567890");
    assert_eq!(record.meta.user_identifier, "1234567890");
    assert_eq!(fx.store.len().await, 1);
}

#[tokio::test]
async fn list_returns_empty_for_unknown_customer_and_rejects_blank() {
    let fx = electricity_fixture(ScriptedProvider::new());

    assert!(fx.handler.list("nobody@example.com").await.unwrap().is_empty());
    assert_eq!(fx.handler.list("  ").await.unwrap_err().status_code(), 400);
}

#[tokio::test]
async fn list_returns_customer_purchases_in_order() {
    let fx = electricity_fixture(
        ScriptedProvider::new()
            .then_purchase(Ok(delivered("req-a", "TX-a")))
            .then_purchase(Ok(delivered("req-b", "TX-b"))),
    );

    for id in ["req-a", "req-b"] {
        fx.handler
            .purchase(electricity_request(id, "08031234567"))
            .await
            .unwrap();
    }

    let records = fx.handler.list("08031234567").await.unwrap();
    let ids: Vec<_> = records.iter().map(|r| r.request_id().to_string()).collect();
    assert_eq!(ids, vec!["req-a", "req-b"]);
}

#[tokio::test]
async fn requery_settles_pending_purchase_and_notifies() {
    let fx = electricity_fixture(
        ScriptedProvider::new()
            .then_purchase(Ok(pending("req-8", "TX-8")))
            .then_requery(Ok(delivered("req-8", "TX-8"))),
    );

    let outcome = fx
        .handler
        .purchase(electricity_request("req-8", "08031234567"))
        .await
        .unwrap();
    assert_eq!(outcome.record.status(), TransactionStatus::Pending);
    assert!(fx.messages.messages().await.is_empty());

    let settled = fx.handler.requery("req-8").await.unwrap();
    assert_eq!(settled.status(), TransactionStatus::Success);
    assert_eq!(settled.meta.transaction_id, "TX-8");

    let messages = fx.messages.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].recipient, "08031234567");
    assert_eq!(messages[0].subject, "electricity purchase successful");
}

#[tokio::test]
async fn requery_of_settled_purchase_skips_provider() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Ok(delivered("req-9", "TX-9"))),
    );

    fx.handler
        .purchase(electricity_request("req-9", "08031234567"))
        .await
        .unwrap();

    // No requery answer is scripted, so reaching the provider would fail.
    let record = fx.handler.requery("TX-9").await.unwrap();
    assert_eq!(record.status(), TransactionStatus::Success);
}

#[tokio::test]
async fn pushed_status_update_settles_once() {
    let fx = electricity_fixture(
        ScriptedProvider::new().then_purchase(Ok(pending("req-10", ""))),
    );
    fx.handler
        .purchase(electricity_request("req-10", "08031234567"))
        .await
        .unwrap();

    let target: Arc<dyn StatusUpdateTarget> = fx.handler.clone();
    let delivered = StatusUpdate {
        request_id: "req-10".to_string(),
        status: TransactionStatus::Success,
        transaction_id: Some("TX-10".to_string()),
    };
    assert_eq!(
        target.apply_status_update(&delivered).await.unwrap(),
        Some(TransactionStatus::Success)
    );

    let reversed = StatusUpdate {
        request_id: "req-10".to_string(),
        status: TransactionStatus::Failed,
        transaction_id: Some("TX-other".to_string()),
    };
    assert_eq!(
        target.apply_status_update(&reversed).await.unwrap(),
        Some(TransactionStatus::Success)
    );

    let stored = fx.handler.get("req-10").await.unwrap();
    assert_eq!(stored.meta.transaction_id, "TX-10");

    let unknown = StatusUpdate {
        request_id: "req-unknown".to_string(),
        status: TransactionStatus::Success,
        transaction_id: None,
    };
    assert_eq!(target.apply_status_update(&unknown).await.unwrap(), None);
}

#[tokio::test]
async fn data_purchase_falls_back_to_item_amount() {
    let provider = Arc::new(ScriptedProvider::new().then_purchase(Ok(json!({
        "code": "000",
        "requestId": "data-1",
        "content": {
            "transactions": {
                "status": "delivered",
                "product_name": "MTN Data",
                "unique_element": "08031234567",
                "amount": "1000",
                "transactionId": "TX-D1"
            }
        }
    }))));
    let store = Arc::new(InMemoryTransactionRepository::<DataTransaction>::new());
    let handler = PurchaseHandler::<DataService>::new(provider, store);

    let request: DataPurchase = serde_json::from_value(json!({
        "requestId": "data-1",
        "network": "mtn-data",
        "plan": "mtn-10mb-100",
        "phone": "08031234567",
        "email": "ada@example.com",
        "amount": 1000
    }))
    .unwrap();

    let outcome = handler.purchase(request).await.unwrap();
    assert_eq!(outcome.record.status(), TransactionStatus::Success);
    assert_eq!(outcome.record.meta.amount, BigDecimal::from(1000));
    assert_eq!(outcome.record.meta.user_identifier, "ada@example.com");
    assert_eq!(outcome.record.meta.product_descriptor, "MTN Data mtn-10mb-100");
}

#[test]
fn validation_error_names_the_field() {
    let mut request = electricity_request("req-11", "08031234567");
    request.meter_number = String::new();

    let err = ElectricityService::validate(&request).unwrap_err();
    assert!(matches!(err, ValidationError::MissingField { ref field } if field == "meter_number"));
}
