//! LicenseClient against a mock license server: request shapes and the
//! success / application error / transport error split.

mod common;

use std::time::Duration;

use common::{client, fail, fingerprint, ok, FINGERPRINT};
use license_activator_lib::licensing::{LicenseError, MachineStatus, TransportError};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn expiry_payload_is_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/jwt-expiry"))
        .and(body_json(json!({ "token": "T1" })))
        .respond_with(ok(json!({
            "remainingDays": 12,
            "isExpired": false,
            "expiryDate": "2026-11-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let expiry = client(&server).check_token_expiry("T1").await.unwrap();
    assert_eq!(expiry.remaining_days, Some(12));
    assert_eq!(expiry.is_expired, Some(false));
    assert!(expiry.expiry_date_parsed().is_some());
}

#[tokio::test]
async fn application_error_carries_server_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/license/activate"))
        .and(body_json(json!({ "activationCode": "BAD-1" })))
        .respond_with(fail("activation code already used", "CODE_USED"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).activate_license("BAD-1").await.unwrap_err();
    match err {
        LicenseError::Server { code, message } => {
            assert_eq!(code, "CODE_USED");
            assert_eq!(message, "activation code already used");
        }
        other => panic!("expected application error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_200_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/license/verify"))
        .respond_with(ResponseTemplate::new(502).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;

    let err = client(&server).verify_token("T1").await.unwrap_err();
    assert!(matches!(err, LicenseError::Network(TransportError::Status(502))));
    assert!(err.is_transport());
}

#[tokio::test]
async fn slow_reply_is_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/license/verify"))
        .respond_with(ok(json!({})).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let err = client(&server).verify_token("T1").await.unwrap_err();
    assert!(matches!(err, LicenseError::Network(TransportError::Timeout)));
}

#[tokio::test]
async fn unreachable_server_is_transport_error() {
    // Nothing listens on the discard port.
    let client = license_activator_lib::licensing::LicenseClient::with_timeout(
        "http://127.0.0.1:9/api",
        Duration::from_millis(500),
    )
    .unwrap();
    let err = client.verify_token("T1").await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn non_json_body_is_transport_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/license/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server).verify_token("T1").await.unwrap_err();
    assert!(matches!(err, LicenseError::Network(TransportError::Decode(_))));
}

#[tokio::test]
async fn verify_by_license_id_sends_license_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/license/verify"))
        .and(body_json(json!({ "licenseId": "L1" })))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).verify_license_id("L1").await.unwrap();
}

#[tokio::test]
async fn list_tokens_is_get_with_json_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/token/list/by-jwt"))
        .and(body_json(json!({ "token": "T1" })))
        .respond_with(ok(json!({
            "tokens": [
                { "token": "first", "createdAt": "2026-01-01" },
                { "token": "second" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client(&server).list_tokens("T1").await.unwrap();
    let tokens: Vec<_> = tokens.into_iter().map(|t| t.token).collect();
    assert_eq!(tokens, vec!["first", "second"]);
}

#[tokio::test]
async fn machine_status_allowed_and_blocked() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/token/machine-status/{FINGERPRINT}")))
        .respond_with(ok(json!({ "status": "blocked", "reason": "abuse" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/token/machine-status/{FINGERPRINT}")))
        .respond_with(ok(json!({ "status": "active" })))
        .mount(&server)
        .await;

    let client = client(&server);
    assert_eq!(
        client.machine_status(&fingerprint()).await.unwrap(),
        MachineStatus::Blocked("abuse".to_string())
    );
    assert_eq!(
        client.machine_status(&fingerprint()).await.unwrap(),
        MachineStatus::Allowed
    );
}

#[tokio::test]
async fn machine_status_blocked_inside_failure_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("/api/token/machine-status/{FINGERPRINT}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "data": { "status": "blocked" }
        })))
        .mount(&server)
        .await;

    let status = client(&server).machine_status(&fingerprint()).await.unwrap();
    assert_eq!(status, MachineStatus::Blocked("no reason given".to_string()));
}

#[tokio::test]
async fn token_activation_payload_is_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/activate"))
        .and(body_json(json!({
            "token": "tok-9",
            "licenseId": "L1",
            "machineCode": FINGERPRINT
        })))
        .respond_with(ok(json!({
            "token": { "email": "user@example.com", "token": "issued" },
            "todayUsageCount": 2,
            "maxDailyLimit": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let activation = client(&server)
        .activate_token("tok-9", "L1", &fingerprint())
        .await
        .unwrap();
    assert_eq!(activation.token.email, "user@example.com");
    assert_eq!(activation.token.token, "issued");
    assert_eq!(activation.today_usage_count, Some(2));
}
