use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};
use slotsync_common::signature::sign_payload;
use slotsync_config::{BookingConfig, WebhookConfig};
use slotsync_db::{InMemoryStore, Repositories};
use tower::ServiceExt;

use crate::auth::ADMIN_AUTH_HEADER;
use crate::handlers::BookingApiState;
use crate::routes::routes;
use crate::signing::SigningSecretManager;
use crate::test_support::{event_type, session_type, slot, MockProvider};

const ADMIN_SECRET: &str = "admin-secret";
const SIGNING_KEY: &str = "provider-key";

async fn router(provider: MockProvider) -> (Router, InMemoryStore) {
    let memory = InMemoryStore::new();
    memory
        .session_types()
        .upsert(session_type("st-free", 0, true))
        .await
        .unwrap();
    memory
        .event_mappings()
        .upsert("st-free", "ETX", "https://api.calendly.com/event_types/ETX")
        .await
        .unwrap();

    let state = BookingApiState::new(
        Repositories::in_memory(&memory),
        Arc::new(provider),
        None,
        Arc::new(SigningSecretManager::new(Some(SIGNING_KEY.to_string()))),
        WebhookConfig::default(),
        BookingConfig::default(),
    );
    (
        routes(Arc::new(state), Some(ADMIN_SECRET.to_string())),
        memory,
    )
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn availability_returns_slots_inside_the_window() {
    let start = Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap();
    let mut provider = MockProvider::new();
    provider.expect_get_available_times().returning(move |_, _, _| {
        Ok(vec![
            slot(start + Duration::hours(9), 60, 1),
            slot(start + Duration::hours(11), 60, 0),
        ])
    });
    let (app, _) = router(provider).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/booking/availability",
            json!({ "session_type_id": "st-free", "start_date": "2030-06-01", "end_date": "2030-06-07" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let slots = body["time_slots"].as_array().unwrap();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0]["start_time"], "2030-06-01T09:00:00Z");
}

#[tokio::test]
async fn unmapped_session_type_is_unprocessable() {
    let (app, memory) = router(MockProvider::new()).await;
    memory
        .session_types()
        .upsert(session_type("st-unmapped", 0, true))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/booking/availability",
            json!({ "session_type_id": "st-unmapped", "start_date": "2030-06-01", "end_date": "2030-06-02" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["kind"], "mapping_not_found");
    assert_eq!(body["error"]["retryable"], false);
}

#[tokio::test]
async fn admin_routes_require_the_shared_secret() {
    let (app, _) = router(MockProvider::new()).await;

    let missing = app
        .clone()
        .oneshot(json_request("POST", "/booking/reconcile", json!({})))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let wrong = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/booking/reconcile")
                .header(ADMIN_AUTH_HEADER, "guess")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/booking/reconcile")
                .header(ADMIN_AUTH_HEADER, ADMIN_SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["replayed"], 0);
}

#[tokio::test]
async fn mapping_is_readable_without_admin_but_only_linked_with_it() {
    let mut provider = MockProvider::new();
    provider
        .expect_list_event_types()
        .returning(|| Ok(vec![event_type("ETY", true)]));
    let (app, _) = router(provider).await;

    let read = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/booking/mappings/st-free")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(read.status(), StatusCode::OK);
    assert_eq!(body_json(read).await["provider_event_type_id"], "ETX");

    let unauthorized = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/booking/mappings/st-free",
            json!({ "provider_event_type_id": "ETY" }),
        ))
        .await
        .unwrap();
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let mut linked = json_request(
        "PUT",
        "/booking/mappings/st-free",
        json!({ "provider_event_type_id": "ETY" }),
    );
    linked
        .headers_mut()
        .insert(ADMIN_AUTH_HEADER, ADMIN_SECRET.parse().unwrap());
    let linked = app.oneshot(linked).await.unwrap();
    assert_eq!(linked.status(), StatusCode::OK);
    assert_eq!(
        body_json(linked).await["provider_event_type_uri"],
        "https://api.calendly.com/event_types/ETY"
    );
}

#[tokio::test]
async fn webhook_signature_failures_are_unauthorized() {
    let (app, _) = router(MockProvider::new()).await;
    let payload = json!({ "event": "invitee.created", "payload": { "uri": "x" } }).to_string();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/booking/webhook")
                .header("Calendly-Webhook-Signature", "t=1,v1=deadbeef")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"]["kind"], "signature_invalid");
}

#[tokio::test]
async fn unmatched_webhook_is_still_acknowledged() {
    let (app, memory) = router(MockProvider::new()).await;
    let payload = json!({
        "event": "invitee.canceled",
        "payload": { "uri": "https://api.calendly.com/scheduled_events/E/invitees/UNKNOWN" }
    })
    .to_string();
    let signature = sign_payload(SIGNING_KEY, Utc::now().timestamp(), payload.as_bytes());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/booking/webhook")
                .header("Calendly-Webhook-Signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outcome"], "deferred");
    assert_eq!(memory.webhook_events().list_unprocessed(10).await.unwrap().len(), 1);
}
