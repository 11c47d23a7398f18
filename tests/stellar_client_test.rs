//! HTTP-level tests for the Horizon client against a mock server, since
//! exercising the real network isn't an option here.

use pending_deposits::stellar::{NetworkConfig, StellarClient};

fn client_for(url: String) -> StellarClient {
    StellarClient::new(NetworkConfig {
        horizon_url: url,
        passphrase: "Test SDF Network ; September 2015".into(),
    })
}

#[tokio::test]
async fn get_account_parses_balances_and_trustlines() {
    let mut server = mockito::Server::new_async().await;

    let body = r#"{
        "account_id": "GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ",
        "sequence": "123",
        "balances": [
            {"balance": "100.0000000", "asset_type": "native"},
            {"balance": "50.0000000", "asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "GISSUER"}
        ],
        "thresholds": {"low_threshold": 0, "med_threshold": 0, "high_threshold": 0}
    }"#;

    let _mock = server
        .mock("GET", mockito::Matcher::Regex(r".*/accounts/.*".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let account = client
        .get_account("GBBD47UZQ5CSKQPV456PYYH4FSYJHBWGQJUVNMCNWZ2NBEHKQPW3KXKJ")
        .await
        .expect("mocked horizon response should parse");

    assert!(account.has_trustline("USD", "GISSUER"));
    assert!(!account.has_trustline("EUR", "GISSUER"));
    assert_eq!(account.next_sequence().unwrap(), 124);
}

#[tokio::test]
async fn get_account_maps_404_to_account_not_found() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", mockito::Matcher::Regex(r".*/accounts/.*".into()))
        .with_status(404)
        .create_async()
        .await;

    let client = client_for(server.url());
    let result = client.get_account("GMISSING").await;

    assert!(matches!(
        result,
        Err(pending_deposits::error::StellarError::AccountNotFound)
    ));
    assert!(!client.account_exists("GMISSING").await.unwrap());
}

#[tokio::test]
async fn get_account_maps_5xx_to_horizon_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", mockito::Matcher::Regex(r".*/accounts/.*".into()))
        .with_status(503)
        .with_body("service unavailable")
        .create_async()
        .await;

    let client = client_for(server.url());
    let result = client.get_account("GWHATEVER").await;

    match result {
        Err(pending_deposits::error::StellarError::HorizonError { status, .. }) => {
            assert_eq!(status, 503)
        }
        other => panic!("expected HorizonError, got {other:?}"),
    }
}

#[tokio::test]
async fn get_transaction_reports_unsuccessful_onchain_result() {
    let mut server = mockito::Server::new_async().await;

    let body = r#"{
        "hash": "abc123",
        "successful": false,
        "paging_token": "456",
        "result_xdr": "AAAAAAAAAGT////6AAAAAA=="
    }"#;

    let _mock = server
        .mock("GET", mockito::Matcher::Regex(r".*/transactions/.*".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let tx = client
        .get_transaction("abc123")
        .await
        .expect("mocked horizon response should parse");

    assert!(!tx.successful);
    assert_eq!(tx.paging_token, "456");
}

#[tokio::test]
async fn submit_transaction_posts_the_envelope_as_form_data() {
    let mut server = mockito::Server::new_async().await;

    let body = r#"{
        "hash": "def456",
        "successful": true,
        "paging_token": "789",
        "result_xdr": "AAAAAAAAAGQAAAAAAAAAAQAAAAAAAAAA"
    }"#;

    let _mock = server
        .mock("POST", "/transactions")
        .match_body(mockito::Matcher::Regex("tx=".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await;

    let client = client_for(server.url());
    let tx = client
        .submit_transaction("AAAAtestenvelope")
        .await
        .expect("mocked submit should succeed");

    assert!(tx.successful);
    assert_eq!(tx.hash, "def456");
}

#[tokio::test]
async fn health_check_reports_unhealthy_on_unreachable_host() {
    let client = client_for("http://127.0.0.1:1".into());
    let health = client.health_check().await;
    assert!(!health.is_healthy);
    assert!(health.error_message.is_some());
}
