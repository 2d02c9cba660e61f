//! End-to-end session behaviour against a mock backend.

mod common;

use std::time::Duration as StdDuration;

use chrono::Duration;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{bearer, token, Harness};
use propdesk::api::{RecordId, Resource};
use propdesk::error::{ApiError, AppError, AuthError, ErrorPayload};
use propdesk::store::{ACCESS_COOKIE, REFRESH_COOKIE};
use propdesk::{SessionState, TokenStore};

#[tokio::test]
async fn test_login_stores_tokens() {
    let server = MockServer::start().await;
    let access = token("access", Duration::hours(2));
    let refresh = token("refresh", Duration::days(7));

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .and(body_json(json!({ "identifier": "pm@example.com", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Login successful",
            "tokens": { "access": access, "refresh": refresh },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    let message = h.client.login("pm@example.com", "hunter2").await.unwrap();

    assert_eq!(message, "Login successful");
    let session = h.client.session();
    assert!(session.is_authenticated());
    assert_eq!(session.state(), SessionState::ValidAccess);
    assert_eq!(session.get_access_token().unwrap().as_str(), access);
    assert_eq!(&*h.jar.get(ACCESS_COOKIE).unwrap().unwrap(), &access);
    assert_eq!(&*h.jar.get(REFRESH_COOKIE).unwrap().unwrap(), &refresh);
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    let result = h.client.login("pm@example.com", "wrong").await;

    match result {
        Err(AppError::Auth(AuthError::LoginFailed(msg))) => assert_eq!(msg, "Invalid credentials"),
        other => panic!("expected login failure, got {:?}", other),
    }
    assert!(!h.client.session().is_authenticated());
    assert!(h.jar.is_empty());
}

#[tokio::test]
async fn test_request_carries_bearer_token() {
    let server = MockServer::start().await;
    let access = token("access", Duration::hours(2));

    Mock::given(method("GET"))
        .and(path("/api/tenants/"))
        .and(header("authorization", bearer(&access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Unit 4B tenant" },
            { "id": 2, "name": "Unit 7A tenant" },
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(&access, &token("refresh", Duration::days(7)));

    let tenants = h.client.list(Resource::Tenants).await.unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[1]["id"], 2);
}

#[tokio::test]
async fn test_expired_access_refreshes_once_before_request() {
    let server = MockServer::start().await;
    let refresh = token("refresh", Duration::days(7));
    let fresh = token("fresh", Duration::hours(2));

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .and(body_json(json!({ "refresh": refresh })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "tokens": { "access": fresh } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/units/5/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 5, "label": "5C" })))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(&token("stale", Duration::minutes(-1)), &refresh);
    assert_eq!(
        h.client.session().state(),
        SessionState::ExpiredAccessValidRefresh
    );

    let unit = h.client.get(Resource::Units, &RecordId::Int(5)).await.unwrap();
    assert_eq!(unit["label"], "5C");

    // Same refresh token retained, access replaced.
    let session = h.client.session();
    assert_eq!(session.get_access_token().unwrap().as_str(), fresh);
    assert_eq!(session.get_refresh_token().unwrap().as_str(), refresh);
    assert!(h.redirects().is_empty());
}

#[tokio::test]
async fn test_unauthorized_response_is_replayed_once() {
    let server = MockServer::start().await;
    let revoked = token("revoked", Duration::hours(1));
    let fresh = token("fresh", Duration::hours(2));

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "tokens": { "access": fresh } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/invoices/"))
        .and(header("authorization", bearer(&revoked).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/invoices/"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": 1,
            "next": null,
            "results": [{ "id": "INV-1", "amount": "1200.00" }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(&revoked, &token("refresh", Duration::days(7)));

    let invoices = h.client.list(Resource::Invoices).await.unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["id"], "INV-1");
}

#[tokio::test]
async fn test_second_unauthorized_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tokens": { "access": token("fresh", Duration::hours(2)) }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/payments/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::hours(1)),
        &token("refresh", Duration::days(7)),
    );

    let result = h.client.list(Resource::Payments).await;
    assert!(matches!(result, Err(ApiError::Unauthorized)));
    assert!(h.redirects().is_empty());
}

#[tokio::test]
async fn test_expired_refresh_token_forces_login() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/offices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::hours(-3)),
        &token("refresh", Duration::days(-1)),
    );
    assert_eq!(h.client.session().state(), SessionState::FullyExpired);

    let result = h.client.list(Resource::Offices).await;

    match result {
        Err(ApiError::LoginRequired { redirect_to }) => assert_eq!(redirect_to, "/auth/login"),
        other => panic!("expected login redirect, got {:?}", other),
    }
    assert_eq!(h.redirects(), vec!["/auth/login".to_string()]);
    assert!(h.jar.is_empty());
    assert_eq!(h.client.session().state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_refresh_rejection_clears_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is blacklisted", "code": "token_not_valid" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::minutes(-10)),
        &token("refresh", Duration::days(3)),
    );

    let result = h.client.get(Resource::Receipts, &RecordId::Int(1)).await;

    assert!(matches!(result, Err(ApiError::LoginRequired { .. })));
    assert!(h.jar.get(REFRESH_COOKIE).unwrap().is_none());
    assert!(h.client.session().get_refresh_token().is_none());
    assert_eq!(h.redirects().len(), 1);
}

#[tokio::test]
async fn test_unauthorized_then_failed_refresh_forces_login() {
    let server = MockServer::start().await;
    let revoked = token("revoked", Duration::hours(1));

    Mock::given(method("GET"))
        .and(path("/api/properties/3/"))
        .and(header("authorization", bearer(&revoked).as_str()))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token is blacklisted" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(&revoked, &token("refresh", Duration::days(7)));
    assert_eq!(h.client.session().state(), SessionState::ValidAccess);

    let result = h.client.get(Resource::Properties, &RecordId::Int(3)).await;

    match result {
        Err(ApiError::LoginRequired { redirect_to }) => assert_eq!(redirect_to, "/auth/login"),
        other => panic!("expected login redirect, got {:?}", other),
    }
    assert_eq!(h.redirects(), vec!["/auth/login".to_string()]);
    assert!(h.jar.is_empty());
    assert_eq!(h.client.session().state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    let server = MockServer::start().await;
    let fresh = token("fresh", Duration::hours(2));

    Mock::given(method("POST"))
        .and(path("/api/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "tokens": { "access": fresh } }))
                .set_delay(StdDuration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("authorization", bearer(&fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("stale", Duration::minutes(-1)),
        &token("refresh", Duration::days(7)),
    );

    let (properties, units) = tokio::join!(
        h.client.list(Resource::Properties),
        h.client.list(Resource::Units)
    );
    assert!(properties.unwrap().is_empty());
    assert!(units.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_offline_clears_cookies() {
    let server = MockServer::start().await;
    let access = token("access", Duration::hours(2));
    let refresh = token("refresh", Duration::days(7));

    Mock::given(method("POST"))
        .and(path("/api/auth/logout/"))
        .and(header("authorization", bearer(&access).as_str()))
        .and(body_json(json!({ "refresh_token": refresh })))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(&access, &refresh);

    h.client.logout().await.unwrap();

    assert!(h.jar.is_empty());
    assert_eq!(h.client.session().state(), SessionState::NoSession);
}

#[tokio::test]
async fn test_validation_errors_are_tagged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/tenants/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "email": ["Enter a valid email address."],
            "phone": ["This field is required."],
        })))
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::hours(2)),
        &token("refresh", Duration::days(7)),
    );

    let result = h
        .client
        .create(Resource::Tenants, &json!({ "email": "nope" }))
        .await;

    match result {
        Err(ApiError::Rejected {
            status: 400,
            payload: ErrorPayload::Validation(fields),
        }) => {
            assert_eq!(fields["email"], vec!["Enter a valid email address."]);
            assert!(fields.contains_key("phone"));
        }
        other => panic!("expected validation errors, got {:?}", other),
    }
}

#[tokio::test]
async fn test_current_user_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 12,
            "role": "property_manager",
            "first_name": "Grace",
            "last_name": "Mensah",
            "email": "grace@example.com",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::hours(2)),
        &token("refresh", Duration::days(7)),
    );

    let first = h.client.current_user().await.unwrap();
    let second = h.client.current_user().await.unwrap();

    assert_eq!(first.display_name_or_username(), "Grace Mensah");
    assert_eq!(second.id, RecordId::Int(12));
}

#[tokio::test]
async fn test_update_and_delete() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/utility-charges/9/"))
        .and(body_json(json!({ "amount": "45.10" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": 9, "amount": "45.10" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/utility-charges/9/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/utility-charges/10/"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "detail": "Not found." })),
        )
        .mount(&server)
        .await;

    let h = Harness::new(&server);
    h.seed_cookies(
        &token("access", Duration::hours(2)),
        &token("refresh", Duration::days(7)),
    );

    let updated = h
        .client
        .update(
            Resource::UtilityCharges,
            &RecordId::Int(9),
            &json!({ "amount": "45.10" }),
        )
        .await
        .unwrap();
    assert_eq!(updated["amount"], "45.10");

    h.client
        .delete(Resource::UtilityCharges, &RecordId::Int(9))
        .await
        .unwrap();

    let missing = h
        .client
        .delete(Resource::UtilityCharges, &RecordId::Int(10))
        .await;
    match missing {
        Err(ApiError::Rejected { status: 404, payload }) => {
            assert_eq!(payload.message(), "Not found.")
        }
        other => panic!("expected 404, got {:?}", other),
    }
}
