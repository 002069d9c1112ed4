use alaskapay_sdk::{
    backend::PaymentBackend,
    types::{BillPaymentRequest, FraudDecision, WithdrawalRequest},
    AlaskaPayClient, Amount, BackendConfig, Currency, Error, SecurePin,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client(server: &MockServer) -> AlaskaPayClient {
    AlaskaPayClient::new(BackendConfig::new(server.uri(), "anon-key")).unwrap()
}

#[tokio::test]
async fn test_verify_pin_sends_pin_to_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/verify-pin"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer user-token"))
        .and(body_json(json!({ "user_id": "user-1", "pin": "1234" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "valid": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server).await.with_session("user-token");
    let pin = SecurePin::new("1234").unwrap();
    assert!(client.verify_pin("user-1", &pin).await.unwrap());
}

#[tokio::test]
async fn test_bill_payment_carries_idempotency_key() {
    let server = MockServer::start().await;
    let key = Uuid::new_v4();
    Mock::given(method("POST"))
        .and(path("/functions/v1/process-bill-payment"))
        .and(header("idempotency-key", key.to_string().as_str()))
        .and(body_partial_json(json!({
            "amount": 1000,
            "currency": "NGN",
            "idempotency_key": key,
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "payment": { "id": "pay-9", "status": "completed", "reference": "BP-9" },
            "fraud_check": { "decision": "review", "risk_score": 0.62, "reasons": ["new payee"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = BillPaymentRequest {
        saved_biller_id: "sb-1".to_string(),
        payee_id: "ikeja-electric".to_string(),
        account_number: "0123456789".to_string(),
        amount: Amount::from_major(1000),
        currency: Currency::Ngn,
        scheduled_date: None,
        notes: None,
        idempotency_key: key,
    };
    let response = client(&server)
        .await
        .process_bill_payment(&request)
        .await
        .unwrap();

    assert_eq!(response.payment.reference.as_deref(), Some("BP-9"));
    assert_eq!(response.fraud_check.decision, FraudDecision::Review);
    assert_eq!(response.fraud_check.reasons, vec!["new payee".to_string()]);
}

#[tokio::test]
async fn test_backend_error_message_passes_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/wallet-transfer"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "Recipient wallet not found" })),
        )
        .mount(&server)
        .await;

    let request = alaskapay_sdk::types::WalletTransferRequest {
        recipient_phone: "+2348012345678".to_string(),
        amount: Amount::from_major(50),
        currency: Currency::Ngn,
        description: None,
        idempotency_key: Uuid::new_v4(),
    };
    let err = client(&server)
        .await
        .wallet_transfer(&request)
        .await
        .unwrap_err();

    match &err {
        Error::Backend { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "Recipient wallet not found");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.user_message(), "Recipient wallet not found");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/verify-transfer"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .await
        .verify_transfer("TRF-1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Backend { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_fetch_balance_reads_wallet_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/wallets"))
        .and(query_param("id", "eq.wallet-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": "wallet-1", "balance": 2500.5 }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/wallets"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client(&server).await;
    assert_eq!(
        client.fetch_balance("wallet-1").await.unwrap(),
        Amount::from_minor(250_050)
    );
    assert!(matches!(
        client.fetch_balance("missing").await,
        Err(Error::Backend { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_kyc_limits_from_function() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/kyc-limits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tier": 1,
            "daily_limit": 1000,
            "consumed_today": "800.00"
        })))
        .mount(&server)
        .await;

    let limits = client(&server).await.fetch_kyc_limits("user-1").await.unwrap();
    assert_eq!(limits.tier, 1);
    assert_eq!(limits.remaining(), Amount::from_major(200));
}

#[tokio::test]
async fn test_withdrawal_inserts_row() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/withdrawal_requests"))
        .and(header("prefer", "return=representation"))
        .and(body_partial_json(json!({ "amount": 250, "fee": 50, "net_amount": 200 })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!([{ "id": "wd-7", "status": "pending" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = WithdrawalRequest {
        wallet_id: "wallet-1".to_string(),
        bank_account_id: "bank-1".to_string(),
        amount: Amount::from_major(250),
        fee: Amount::from_major(50),
        net_amount: Amount::from_major(200),
        currency: Currency::Ngn,
        kyc_tier: 2,
        idempotency_key: Uuid::new_v4(),
    };
    let record = client(&server)
        .await
        .create_withdrawal_request(&request)
        .await
        .unwrap();
    assert_eq!(record.id, "wd-7");
}
