//! HTTP-level tests for the client against a mock server.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bloomsync_client::{ChangesApi, ClientError, HttpChangesApi};
use bloomsync_core::types::{CardStatus, OrderCardPatch};

fn changes_body() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "changes": [{
                "card_id": "card-a",
                "tenant_id": "t1",
                "status": "unassigned",
                "assigned_to": null,
                "notes": null,
                "sort_order": 0,
                "is_stale": false,
                "updated_at": "2025-01-25T10:00:00Z",
                "updated_by": "system"
            }],
            "server_timestamp": "2025-01-25T10:00:05Z"
        },
        "meta": {"request_id": "req-1", "timestamp": "2025-01-25T10:00:05Z"}
    })
}

#[tokio::test]
async fn fetch_changes_unwraps_the_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/card-states/changes"))
        .and(query_param("tenant_id", "t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changes_body()))
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", None).expect("client");
    let page = api.fetch_changes(None).await.expect("changes");

    assert_eq!(page.changes.len(), 1);
    assert_eq!(page.changes[0].card_id, "card-a");
    assert_eq!(
        page.server_timestamp.to_rfc3339(),
        "2025-01-25T10:00:05+00:00"
    );
}

#[tokio::test]
async fn fetch_changes_passes_the_watermark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/card-states/changes"))
        .and(query_param("since", "2025-01-25T10:00:05+00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {"changes": [], "server_timestamp": "2025-01-25T10:00:10Z"},
            "meta": {"request_id": "req-2", "timestamp": "2025-01-25T10:00:10Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", None).expect("client");
    let since = chrono::DateTime::parse_from_rfc3339("2025-01-25T10:00:05+00:00")
        .expect("timestamp")
        .with_timezone(&chrono::Utc);
    let page = api.fetch_changes(Some(since)).await.expect("changes");
    assert!(page.changes.is_empty());
}

#[tokio::test]
async fn patch_sends_actor_header_and_unwraps_state() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/card-states/card-a"))
        .and(header("x-actor-id", "florist-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "card_id": "card-a",
                "tenant_id": "t1",
                "status": "assigned",
                "assigned_to": "florist-7",
                "notes": null,
                "sort_order": 0,
                "is_stale": false,
                "updated_at": "2025-01-25T10:01:00Z",
                "updated_by": "florist-7"
            },
            "meta": {"request_id": "req-3", "timestamp": "2025-01-25T10:01:00Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", None).expect("client");
    let patch = OrderCardPatch {
        status: Some(CardStatus::Assigned),
        assigned_to: Some(Some("florist-7".to_string())),
        ..OrderCardPatch::default()
    };
    let view = api.patch_card("card-a", &patch).await.expect("patched");

    assert_eq!(view.status, CardStatus::Assigned);
    assert_eq!(view.updated_by, "florist-7");
}

#[tokio::test]
async fn stale_conflict_becomes_a_typed_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/card-states/card-a"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": {"code": "conflict_stale", "message": "card removed"},
            "meta": {"request_id": "req-4", "timestamp": "2025-01-25T10:02:00Z"}
        })))
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", None).expect("client");
    let patch = OrderCardPatch {
        status: Some(CardStatus::Completed),
        ..OrderCardPatch::default()
    };
    let err = api.patch_card("card-a", &patch).await.expect_err("conflict");
    assert!(matches!(err, ClientError::StaleCard { card_id } if card_id == "card-a"));
}

#[tokio::test]
async fn bearer_key_is_attached_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/card-states/changes"))
        .and(header("authorization", "Bearer secret-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(changes_body()))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", Some("secret-key".to_string()))
        .expect("client");
    api.fetch_changes(None).await.expect("changes");
}

#[tokio::test]
async fn plain_error_body_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/card-states/changes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let api = HttpChangesApi::new(&server.uri(), "t1", "florist-7", None).expect("client");
    let err = api.fetch_changes(None).await.expect_err("server error");
    assert!(matches!(err, ClientError::Api { status: 500, .. }));
}
