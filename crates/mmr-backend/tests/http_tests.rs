/*
[INPUT]:  Mock HTTP responses
[OUTPUT]: Test results for HTTP client
[POS]:    Integration tests - order and stage time endpoints
[UPDATE]: When HTTP endpoints change
*/

mod common;

use common::{
    ACCESS_TOKEN, API_KEY, USER_ID, anonymous_client, order_json, setup_mock_server,
    signed_in_client,
};
use mmr_backend::{BackendError, OrderStage, OrderStore, Stage, StageTimeStore};
use rstest::rstest;
use tokio_test::assert_ok;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_create_order_sends_auth_headers() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("manufacturing_number", "eq.MO-100"))
        .and(header("apikey", API_KEY))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(header("prefer", "return=representation"))
        .and(body_json(serde_json::json!([{
            "manufacturing_number": "MO-100",
            "current_stage": "assembly",
            "stages": ["assembly"],
            "user_id": USER_ID,
        }])))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!([order_json("o-1", Some("MO-100"), "assembly")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let order = assert_ok!(client.create_order(Some(" MO-100 "), &[Stage::Assembly]).await);
    assert_eq!(order.id, "o-1");
    assert_eq!(order.current_stage, OrderStage::Assembly);
    assert!(!order.is_ad_hoc());
}

#[tokio::test]
async fn test_create_order_detects_existing_number() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": "o-existing" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .create_order(Some("MO-100"), &[Stage::Assembly])
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::DuplicateIdentifier { ref number } if number == "MO-100"));
    assert!(err.is_duplicate_key());
}

#[rstest]
#[case::conflict_with_code(409, serde_json::json!({
    "code": "23505",
    "message": "duplicate key value violates unique constraint",
}))]
#[case::conflict_without_body(409, serde_json::json!({}))]
#[case::bad_request_with_code(400, serde_json::json!({
    "code": "23505",
    "message": "insert failed",
}))]
#[case::message_only(400, serde_json::json!({
    "message": "duplicate key value violates unique constraint \"orders_number_key\"",
}))]
#[tokio::test]
async fn test_create_order_maps_unique_violation(
    #[case] status: u16,
    #[case] body: serde_json::Value,
) {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;

    let err = client
        .create_order(Some("MO-100"), &[Stage::Assembly])
        .await
        .unwrap_err();
    assert!(
        matches!(err, BackendError::DuplicateIdentifier { ref number } if number == "MO-100"),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn test_create_ad_hoc_task_skips_number_lookup() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(body_partial_json(serde_json::json!([{ "manufacturing_number": null }])))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!([order_json("o-2", None, "assembly")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let order = assert_ok!(OrderStore::create_order(&client, None, &[Stage::Assembly]).await);
    assert!(order.is_ad_hoc());
}

#[tokio::test]
async fn test_remote_calls_fail_fast_without_session() {
    let server = setup_mock_server().await;
    let client = anonymous_client(&server);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(client.list_orders().await, Err(BackendError::AuthRequired)));
    assert!(matches!(
        client.save_stage_time("o-1", Stage::Assembly, 10).await,
        Err(BackendError::AuthRequired)
    ));
    assert!(matches!(
        client.get_all_stage_times().await,
        Err(BackendError::AuthRequired)
    ));
}

#[tokio::test]
async fn test_expired_token_maps_to_auth_required() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "code": "PGRST301",
            "message": "JWT expired",
        })))
        .mount(&server)
        .await;

    let err = client.list_orders().await.unwrap_err();
    assert!(err.is_auth_error());
}

#[tokio::test]
async fn test_update_order_stage_records_completion() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("id", "eq.o-1"))
        .and(body_partial_json(serde_json::json!({
            "current_stage": "summary",
            "has_incidents": true,
            "description": "[Tooling failure] torque driver broke",
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([order_json("o-1", Some("MO-1"), "summary")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(
        client
            .update_order_stage(
                "o-1",
                OrderStage::Summary,
                Some(true),
                Some("[Tooling failure] torque driver broke"),
            )
            .await
    );
}

#[tokio::test]
async fn test_update_order_stage_unknown_order() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let err = client
        .update_order_stage("missing", OrderStage::Summary, None, Some("done"))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::NotFound { .. }));
}

#[tokio::test]
async fn test_update_order_number_ignores_own_row() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("manufacturing_number", "eq.MO-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{ "id": "o-1" }])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("id", "eq.o-1"))
        .and(body_partial_json(serde_json::json!({ "manufacturing_number": "MO-2" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([order_json("o-1", Some("MO-2"), "assembly")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let order = assert_ok!(client.update_order_number("o-1", "MO-2").await);
    assert_eq!(order.manufacturing_number.as_deref(), Some("MO-2"));
}

#[tokio::test]
async fn test_save_stage_time_inserts_then_updates() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/stage_times"))
        .and(query_param("order_id", "eq.o-1"))
        .and(query_param("stage", "eq.assembly"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/stage_times"))
        .and(body_json(serde_json::json!([{
            "order_id": "o-1",
            "stage": "assembly",
            "time_ms": 2500,
            "user_id": USER_ID,
        }])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(client.save_stage_time("o-1", Stage::Assembly, 2500).await);

    Mock::given(method("GET"))
        .and(path("/rest/v1/stage_times"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": "st-1",
            "order_id": "o-1",
            "stage": "assembly",
            "time_ms": 2500,
            "user_id": USER_ID,
        }])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/stage_times"))
        .and(query_param("order_id", "eq.o-1"))
        .and(query_param("stage", "eq.assembly"))
        .and(body_json(serde_json::json!({ "time_ms": 3100, "user_id": USER_ID })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(StageTimeStore::save_stage_time(&client, "o-1", Stage::Assembly, 3100).await);
}

#[tokio::test]
async fn test_get_all_stage_times_aggregates() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/stage_times"))
        .and(query_param("select", "id,order_id,stage,time_ms,user_id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "a", "order_id": "o-1", "stage": "assembly", "time_ms": 2500, "user_id": "u-1" },
            { "id": "b", "order_id": "o-1", "stage": "packaging", "time_ms": "500", "user_id": "u-2" },
            { "id": "c", "order_id": "o-2", "stage": "assembly", "time_ms": 900, "user_id": "u-1" },
        ])))
        .mount(&server)
        .await;

    let times = assert_ok!(client.get_all_stage_times().await);
    assert_eq!(times["o-1"].total, 3000);
    assert_eq!(times["o-1"].stage(Stage::Packaging), 500);
    assert_eq!(times["o-2"].users[&Stage::Assembly], "u-1");
}

#[tokio::test]
async fn test_delete_all_orders_removes_stage_times_first() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("select", "id"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "id": "o-1" }, { "id": "o-2" }])),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/stage_times"))
        .and(query_param("order_id", "in.(o-1,o-2)"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/manufacturing_orders"))
        .and(query_param("id", "neq.00000000-0000-0000-0000-000000000000"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(client.delete_all_orders().await);
}

#[rstest]
#[case::bad_gateway(502, true)]
#[case::unavailable(503, true)]
#[case::gateway_timeout(504, true)]
#[case::bad_request(400, false)]
#[case::forbidden(403, false)]
#[tokio::test]
async fn test_server_errors_are_retryable(#[case] status: u16, #[case] retryable: bool) {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/manufacturing_orders"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;

    let err = client.list_orders().await.unwrap_err();
    assert_eq!(err.is_retryable(), retryable);
    assert_eq!(err.is_remote_unavailable(), retryable);
}

#[tokio::test]
async fn test_rate_limit_reports_retry_delay() {
    let server = setup_mock_server().await;
    let client = signed_in_client(&server);

    Mock::given(method("GET"))
        .and(path("/rest/v1/stage_times"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let err = client.get_all_stage_times().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.retry_delay(), Some(7));
}
