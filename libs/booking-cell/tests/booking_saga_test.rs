use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::router::booking_routes;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const DATE: &str = "2025-03-10";
const TIME: &str = "14:00";

struct TestIds {
    client: Uuid,
    psychologist: Uuid,
    payment: Uuid,
    session: Uuid,
}

impl TestIds {
    fn new() -> Self {
        Self {
            client: Uuid::new_v4(),
            psychologist: Uuid::new_v4(),
            payment: Uuid::new_v4(),
            session: Uuid::new_v4(),
        }
    }
}

async fn create_test_app(mock_server: &MockServer) -> Router {
    let config = TestConfig::with_mock_server(&mock_server.uri());
    booking_routes(Arc::new(config.to_app_config()))
}

fn booking_body(ids: &TestIds) -> Value {
    json!({
        "client_id": ids.client,
        "psychologist_id": ids.psychologist,
        "scheduled_date": DATE,
        "scheduled_time": TIME,
        "amount": 1000.0,
        "payment_received_date": "2025-03-09",
        "payment_method": "cash"
    })
}

async fn post_booking(app: Router, body: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/book")
                .header("content-type", "application/json")
                .header("authorization", "Bearer test-token")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Mounts the read-side mocks every saga run needs: client, psychologist,
/// the day's availability, and permissive notification endpoints.
async fn setup_read_mocks(mock_server: &MockServer, ids: &TestIds) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", format!("eq.{}", ids.client)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row(&ids.client, "Test Client")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .and(query_param("id", format!("eq.{}", ids.psychologist)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::psychologist_row(&ids.psychologist, "Dr. Test")
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(&ids.psychologist, DATE, &["10:00", TIME, "16:00"])
        ])))
        .mount(mock_server)
        .await;

    // Notification channels accept everything; their outcomes never reach the
    // caller anyway.
    for notification_path in ["/email/send", "/whatsapp/messages", "/whatsapp/reminders/check"] {
        Mock::given(method("POST"))
            .and(path(notification_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queued": true})))
            .mount(mock_server)
            .await;
    }
}

async fn setup_write_mocks(mock_server: &MockServer, ids: &TestIds) {
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::payment_row(&ids.payment, &ids.client, &ids.psychologist, 1000.0)
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "event_id": "evt-123",
            "meet_link": "https://meet.google.com/abc-defg-hij",
            "html_link": "https://calendar.google.com/event?eid=evt-123"
        })))
        .mount(mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::session_row(
                &ids.session,
                &ids.client,
                &ids.psychologist,
                &ids.payment,
                DATE,
                TIME,
            )
        ])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn successful_booking_returns_201_with_joined_record() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    setup_read_mocks(&mock_server, &ids).await;
    setup_write_mocks(&mock_server, &ids).await;

    let app = create_test_app(&mock_server).await;
    let (status, body) = post_booking(app, booking_body(&ids)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["booking"]["session"]["status"], json!("booked"));
    assert_eq!(body["booking"]["client"]["id"], json!(ids.client));
    assert_eq!(body["booking"]["psychologist"]["id"], json!(ids.psychologist));
}

#[tokio::test]
async fn successful_booking_links_payment_and_consumes_slot() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    setup_read_mocks(&mock_server, &ids).await;
    setup_write_mocks(&mock_server, &ids).await;

    let app = create_test_app(&mock_server).await;
    let (status, _) = post_booking(app, booking_body(&ids)).await;
    assert_eq!(status, StatusCode::CREATED);

    let requests = mock_server.received_requests().await.unwrap();

    let payment_patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/payments")
        .expect("payment should be linked to the session");
    let patch_body: Value = serde_json::from_slice(&payment_patch.body).unwrap();
    assert_eq!(patch_body["session_id"], json!(ids.session));

    let slot_patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH" && r.url.path() == "/rest/v1/availability_slots")
        .expect("consumed slot should be removed from the day");
    let slot_body: Value = serde_json::from_slice(&slot_patch.body).unwrap();
    let remaining: Vec<String> = serde_json::from_value(slot_body["slots"].clone()).unwrap();
    assert!(!remaining.contains(&TIME.to_string()));
    assert!(remaining.contains(&"10:00".to_string()));
}

#[tokio::test]
async fn slot_conflict_returns_409_and_deletes_payment() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    setup_read_mocks(&mock_server, &ids).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::payment_row(&ids.payment, &ids.client, &ids.psychologist, 1000.0)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event_id": "evt-1"})))
        .mount(&mock_server)
        .await;

    // Another coordinator already holds the slot: the unique index rejects us.
    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::unique_violation_body()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", ids.payment)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, body) = post_booking(app, booking_body(&ids)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("just taken"));
}

#[tokio::test]
async fn internal_session_failure_returns_500_and_deletes_payment() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    setup_read_mocks(&mock_server, &ids).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::payment_row(&ids.payment, &ids.client, &ids.psychologist, 1000.0)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event_id": "evt-1"})))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database on fire"))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", ids.payment)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, body) = post_booking(app, booking_body(&ids)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // The caller never learns the internals.
    assert!(!body["error"].as_str().unwrap().contains("fire"));
}

#[tokio::test]
async fn unavailable_slot_is_rejected_before_any_write() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row(&ids.client, "Test Client")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::psychologist_row(&ids.psychologist, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    // The requested time is not in the day's slot list.
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(&ids.psychologist, DATE, &["10:00"])
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, body) = post_booking(app, booking_body(&ids)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not available"));
}

#[tokio::test]
async fn blocked_time_is_rejected() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row(&ids.client, "Test Client")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::psychologist_row(&ids.psychologist, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    let mut day = MockSupabaseResponses::availability_row(&ids.psychologist, DATE, &[TIME]);
    day["blocked_times"] = json!([TIME]);
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([day])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, _) = post_booking(app, booking_body(&ids)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_client_after_both_lookups_returns_404() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, body) = post_booking(app, booking_body(&ids)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Client"));
}

#[tokio::test]
async fn client_is_resolved_through_linked_account_key() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    let account_key = Uuid::new_v4();

    // Primary-key lookup misses.
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("id", format!("eq.{}", account_key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    // Linked-account lookup hits.
    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .and(query_param("account_id", format!("eq.{}", account_key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row_with_account(&ids.client, &account_key, "Linked Client")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::psychologist_row(&ids.psychologist, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::availability_row(&ids.psychologist, DATE, &[TIME])
        ])))
        .mount(&mock_server)
        .await;

    setup_write_mocks(&mock_server, &ids).await;
    for notification_path in ["/email/send", "/whatsapp/messages", "/whatsapp/reminders/check"] {
        Mock::given(method("POST"))
            .and(path(notification_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&mock_server)
            .await;
    }

    let app = create_test_app(&mock_server).await;
    let mut body = booking_body(&ids);
    body["client_id"] = json!(account_key);

    let (status, response) = post_booking(app, body).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["booking"]["client"]["id"], json!(ids.client));
}

#[tokio::test]
async fn unknown_psychologist_returns_404() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row(&ids.client, "Test Client")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let (status, _) = post_booking(app, booking_body(&ids)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_package_returns_404() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::client_row(&ids.client, "Test Client")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/psychologists"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::psychologist_row(&ids.psychologist, "Dr. Test")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/packages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let mut body = booking_body(&ids);
    body["package_id"] = json!(Uuid::new_v4());

    let (status, response) = post_booking(app, body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(response["error"].as_str().unwrap().contains("Package"));
}

#[tokio::test]
async fn malformed_time_returns_400_without_any_lookup() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();

    Mock::given(method("GET"))
        .and(path("/rest/v1/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let mut body = booking_body(&ids);
    body["scheduled_time"] = json!("2pm");

    let (status, _) = post_booking(app, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_identical_requests_yield_exactly_one_booking() {
    let mock_server = MockServer::start().await;
    let ids = TestIds::new();
    setup_read_mocks(&mock_server, &ids).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::payment_row(&ids.payment, &ids.client, &ids.psychologist, 1000.0)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendar/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"event_id": "evt-1"})))
        .mount(&mock_server)
        .await;

    // The unique index lets exactly one insert through; every later insert
    // collides.
    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::session_row(
                &ids.session,
                &ids.client,
                &ids.psychologist,
                &ids.payment,
                DATE,
                TIME,
            )
        ])))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/sessions"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(MockSupabaseResponses::unique_violation_body()),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/availability_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&mock_server).await;
    let body = booking_body(&ids);

    let (first, second, third) = tokio::join!(
        post_booking(app.clone(), body.clone()),
        post_booking(app.clone(), body.clone()),
        post_booking(app, body),
    );

    let statuses = [first.0, second.0, third.0];
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();

    assert_eq!(created, 1, "exactly one concurrent booking must win");
    assert_eq!(conflicts, 2, "every loser must see a conflict");
}
