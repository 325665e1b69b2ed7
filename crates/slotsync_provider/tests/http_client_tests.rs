mod fixtures;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, DurationRound, Utc};
use serde_json::json;
use slotsync_provider::{ProviderClient, ProviderError, WebhookSubscriptionRequest};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fixtures::{available_time_json, client, event_type_json, user_body, TOKEN};

#[tokio::test]
async fn current_account_is_fetched_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body(&server.uri())))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server.uri());
    let first = client.get_current_account().await.unwrap();
    let second = client.get_current_account().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.uri, format!("{}/users/U1", server.uri()));
    assert_eq!(first.scheduling_url, "https://calendly.com/test-builder");
}

async fn mount_two_pages(server: &MockServer) {
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body(&base)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/event_types"))
        .and(query_param("page_token", "P2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection": [event_type_json(&base, "ET3", 30, false)],
            "pagination": { "next_page": null }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/event_types"))
        .and(query_param("user", format!("{}/users/U1", base).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection": [
                event_type_json(&base, "ET1", 60, true),
                event_type_json(&base, "ET2", 45, true)
            ],
            "pagination": { "next_page": format!("{}/event_types?page_token=P2", base) }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn list_event_types_follows_pagination() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;

    let event_types = client(&server.uri()).list_event_types().await.unwrap();

    let ids: Vec<_> = event_types.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["ET1", "ET2", "ET3"]);
    assert_eq!(event_types[0].duration_minutes, 60);
    assert!(!event_types[2].active);
}

#[tokio::test]
async fn pager_is_lazy_and_restartable() {
    let server = MockServer::start().await;
    mount_two_pages(&server).await;
    let client = client(&server.uri());
    let user_uri = format!("{}/users/U1", server.uri());

    let mut pages = client.event_type_pages(&user_uri).unwrap();
    assert!(server.received_requests().await.unwrap().is_empty());

    assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 2);
    assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 1);
    assert!(pages.next_page().await.unwrap().is_none());
    assert!(pages.is_exhausted());

    pages.restart();
    let again = pages.next_page().await.unwrap().unwrap();
    assert_eq!(again[0].id, "ET1");
}

#[tokio::test]
async fn failed_page_is_fetched_again_on_the_next_call() {
    let server = MockServer::start().await;
    // Outlasts the client's own retries for the second page, once.
    Mock::given(method("GET"))
        .and(path("/event_types"))
        .and(query_param("page_token", "P2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_two_pages(&server).await;
    let client = client(&server.uri());
    let user_uri = format!("{}/users/U1", server.uri());

    let mut pages = client.event_type_pages(&user_uri).unwrap();
    assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 2);

    let err = pages.next_page().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "got {:?}", err);
    assert!(!pages.is_exhausted());

    let retried = pages.next_page().await.unwrap().unwrap();
    assert_eq!(retried[0].id, "ET3");
    assert!(pages.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let body = user_body(&server.uri());

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(move |_req: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(body.clone())
            }
        })
        .expect(3)
        .mount(&server)
        .await;

    client(&server.uri()).get_current_account().await.unwrap();
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rate_limit_is_retried_honouring_retry_after() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let body = user_body(&server.uri());

    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(move |_req: &wiremock::Request| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ResponseTemplate::new(429).insert_header("Retry-After", "0")
            } else {
                ResponseTemplate::new(200).set_body_json(body.clone())
            }
        })
        .expect(2)
        .mount(&server)
        .await;

    assert!(client(&server.uri()).get_current_account().await.is_ok());
}

#[tokio::test]
async fn retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(&server.uri()).get_current_account().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "got {:?}", err);
}

#[tokio::test]
async fn unauthorized_is_an_auth_error_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "title": "Unauthenticated",
            "message": "The access token is invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri()).get_current_account().await.unwrap_err();
    match err {
        ProviderError::Auth { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "The access token is invalid");
        }
        other => panic!("expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn slow_provider_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(user_body(&server.uri()))
                .set_delay(StdDuration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = fixtures::provider_config(&server.uri());
    config.max_retries = 0;
    let client = slotsync_provider::HttpProviderClient::new(&config, TOKEN).unwrap();

    let err = client.get_current_account().await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)), "got {:?}", err);
}

#[tokio::test]
async fn long_windows_are_split_and_merged() {
    let server = MockServer::start().await;
    let base = server.uri();
    let start = (Utc::now() + Duration::days(1))
        .duration_trunc(Duration::hours(1))
        .unwrap();
    let end = start + Duration::days(10);

    Mock::given(method("GET"))
        .and(path("/event_types/ET1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": event_type_json(&base, "ET1", 60, true)
        })))
        .mount(&server)
        .await;

    // Both chunk calls return the same records, including a slot on the chunk
    // boundary and one past the window end.
    let boundary = start + Duration::days(7);
    Mock::given(method("GET"))
        .and(path("/event_type_available_times"))
        .and(query_param("event_type", format!("{}/event_types/ET1", base).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection": [
                available_time_json(boundary, "available", 1),
                available_time_json(start + Duration::hours(2), "available", 1),
                available_time_json(end + Duration::hours(1), "available", 1),
            ]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let slots = client(&base)
        .get_available_times(&format!("{}/event_types/ET1", base), start, end)
        .await
        .unwrap();

    let starts: Vec<_> = slots.iter().map(|s| s.start_time).collect();
    assert_eq!(starts, vec![start + Duration::hours(2), boundary]);
    assert!(slots
        .iter()
        .all(|s| s.end_time - s.start_time == Duration::minutes(60)));
}

#[tokio::test]
async fn inverted_window_is_rejected_without_calling_the_provider() {
    let server = MockServer::start().await;
    let start = Utc::now() + Duration::days(2);

    let err = client(&server.uri())
        .get_available_times("https://api.calendly.com/event_types/ET1", start, start - Duration::hours(1))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidDateRange(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn oversize_window_is_rejected_without_calling_the_provider() {
    let server = MockServer::start().await;
    let start = Utc::now() + Duration::days(1);

    let err = client(&server.uri())
        .get_available_times(
            "https://api.calendly.com/event_types/ET1",
            start,
            start + Duration::days(365 * 100),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::InvalidDateRange(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn provider_range_rejection_maps_to_invalid_date_range() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/event_types/ET1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resource": event_type_json(&base, "ET1", 30, true)
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/event_type_available_times"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "title": "Invalid Argument",
            "message": "date range can be no greater than 1 week (7 days)"
        })))
        .mount(&server)
        .await;

    let start = Utc::now() + Duration::days(1);
    let err = client(&base)
        .get_available_times(&format!("{}/event_types/ET1", base), start, start + Duration::days(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidDateRange(_)), "got {:?}", err);
}

#[tokio::test]
async fn webhook_subscription_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook_subscriptions"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server.uri())
        .create_webhook_subscription(WebhookSubscriptionRequest {
            url: "https://slotsync.example.com/api/booking/webhook".to_string(),
            events: vec!["invitee.created".to_string()],
            organization: format!("{}/organizations/O1", server.uri()),
            user: None,
            scope: "organization".to_string(),
            signing_key: "k".repeat(64),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
}

#[tokio::test]
async fn webhook_subscription_returns_created_resource() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("POST"))
        .and(path("/webhook_subscriptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "resource": {
                "uri": format!("{}/webhook_subscriptions/W1", base),
                "callback_url": "https://slotsync.example.com/api/booking/webhook",
                "events": ["invitee.created", "invitee.canceled"],
                "state": "active",
                "scope": "user"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client(&base)
        .create_webhook_subscription(WebhookSubscriptionRequest {
            url: "https://slotsync.example.com/api/booking/webhook".to_string(),
            events: vec!["invitee.created".to_string(), "invitee.canceled".to_string()],
            organization: format!("{}/organizations/O1", base),
            user: Some(format!("{}/users/U1", base)),
            scope: "user".to_string(),
            signing_key: "k".repeat(64),
        })
        .await
        .unwrap();

    assert_eq!(created.state.as_deref(), Some("active"));
    assert_eq!(created.events.len(), 2);
}
