use axum::extract::Form;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tribe_tally::config::BackendConfig;
use tribe_tally::gateway::{
    AddScoreRequest, BackendClient, BackendRoute, Gateway, GatewayError, HttpGateway,
};
use tribe_tally::scoring::{ActivityId, OfficerId, PointRuleId, TribeId};

async fn sbo_route(Form(fields): Form<HashMap<String, String>>) -> Response {
    let operation = fields.get("operation").cloned().unwrap_or_default();
    let payload: Value = fields
        .get("json")
        .and_then(|raw| serde_json::from_str(raw).ok())
        .unwrap_or(Value::Null);

    match operation.as_str() {
        "getAllTribes" => Json(json!([
            { "id": 1, "name": "Red Hawks", "rank": "1", "display_points": "40" },
            { "id": "2", "name": "Blue Owls", "rank": 2, "total_points": 25 }
        ]))
        .into_response(),
        "getActivityScores" => {
            Json(json!({ "success": false, "message": "Activity not found" })).into_response()
        }
        "addScore" => Json(json!({ "success": true, "message": payload.to_string() }))
            .into_response(),
        "getActivityPointRules" => "\u{feff}[]".into_response(),
        "getSboActivities" => "<b>Warning</b>: mysqli_connect() failed".into_response(),
        "slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!([])).into_response()
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn spawn_backend() -> String {
    let app = Router::new().route("/sbo.php", post(sbo_route));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend runs");
    });
    format!("http://{addr}/")
}

fn gateway(base_url: String) -> HttpGateway {
    HttpGateway::new(&BackendConfig {
        base_url,
        officer_id: None,
        request_timeout: Duration::from_secs(1),
    })
    .expect("client builds")
}

#[tokio::test]
async fn bare_lists_decode_into_tribes() {
    let gateway = gateway(spawn_backend().await);
    let client = BackendClient::new(Arc::new(gateway));

    let tribes = client.tribes().await.expect("tribes load");
    assert_eq!(tribes.len(), 2);
    assert_eq!(tribes[0].rank, Some(1));
    assert_eq!(tribes[0].display_points, Some(40));
    assert_eq!(tribes[1].id, TribeId::from("2"));
}

#[tokio::test]
async fn backend_failures_carry_their_message() {
    let gateway = gateway(spawn_backend().await);
    let client = BackendClient::new(Arc::new(gateway));

    let err = client
        .scores(&ActivityId::from("9"))
        .await
        .expect_err("backend rejects");
    assert!(matches!(err, GatewayError::Rejected { .. }));
    assert_eq!(err.user_message(), "Activity not found");
}

#[tokio::test]
async fn add_score_posts_camel_case_payload() {
    let gateway = gateway(spawn_backend().await);
    let client = BackendClient::new(Arc::new(gateway));

    let echoed = client
        .add_score(&AddScoreRequest {
            sbo_id: OfficerId::from("7"),
            activity_id: ActivityId::from("3"),
            tribe_id: TribeId::from("A"),
            point_rule_id: PointRuleId::from("2"),
            is_participation: true,
        })
        .await
        .expect("score accepted");
    let sent: Value = serde_json::from_str(&echoed).expect("payload echoed");
    assert_eq!(
        sent,
        json!({
            "sboId": "7",
            "activityId": "3",
            "tribeId": "A",
            "pointRuleId": "2",
            "isParticipation": true
        })
    );
}

#[tokio::test]
async fn byte_order_mark_is_ignored() {
    let gateway = gateway(spawn_backend().await);
    let response = gateway
        .invoke(
            BackendRoute::Sbo,
            "getActivityPointRules",
            json!({ "activityId": "1" }),
        )
        .await;
    assert!(response.success);
    assert_eq!(response.items, Some(Vec::new()));
}

#[tokio::test]
async fn transport_problems_become_failed_responses() {
    let gateway = gateway(spawn_backend().await);

    let malformed = gateway
        .invoke(BackendRoute::Sbo, "getSboActivities", json!({ "sboId": "7" }))
        .await;
    assert!(!malformed.success);
    assert!(malformed.message_or("").contains("malformed"));

    let server_error = gateway
        .invoke(BackendRoute::Sbo, "unknownOperation", json!({}))
        .await;
    assert!(!server_error.success);
    assert_eq!(
        server_error.message.as_deref(),
        Some("unknownOperation returned HTTP 500")
    );

    let missing_route = gateway
        .invoke(BackendRoute::Faculty, "getAllTribes", json!({}))
        .await;
    assert_eq!(
        missing_route.message.as_deref(),
        Some("getAllTribes returned HTTP 404")
    );

    let slow = gateway.invoke(BackendRoute::Sbo, "slow", json!({})).await;
    assert!(!slow.success);
    assert!(slow.message_or("").contains("timed out"));
}

#[tokio::test]
async fn unreachable_backend_is_reported_not_raised() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let gateway = gateway(format!("http://{addr}"));
    let response = gateway.invoke(BackendRoute::Sbo, "getAllTribes", json!({})).await;
    assert!(!response.success);
    assert!(response.message_or("").starts_with("getAllTribes request failed"));
}
