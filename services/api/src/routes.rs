use crate::infra::{AppState, AwardOutcome, RemovalOutcome, ScoringApi};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tribe_tally::error::AppError;
use tribe_tally::roster::RosterFilter;
use tribe_tally::scoring::{ActivityId, ParticipationStatus, PointRuleId, ScoreId, StudentId, TribeId};

type SharedApi = Arc<ScoringApi>;

#[derive(Debug, Deserialize)]
pub(crate) struct AwardRequest {
    pub(crate) point_rule_id: PointRuleId,
    #[serde(default)]
    pub(crate) tribe_ids: Vec<TribeId>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RemovalQuery {
    #[serde(default)]
    pub(crate) confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RosterQuery {
    pub(crate) status: Option<String>,
    pub(crate) search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParticipationRequest {
    pub(crate) status: String,
}

pub(crate) fn with_scoring_routes(api: ScoringApi) -> Router {
    scoring_router(api)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) fn scoring_router(api: ScoringApi) -> Router {
    Router::new()
        .route("/api/v1/activities", get(activities_handler))
        .route("/api/v1/activities/:activity_id/board", get(board_handler))
        .route("/api/v1/activities/:activity_id/scores", post(award_handler))
        .route(
            "/api/v1/activities/:activity_id/scores/:score_id",
            delete(removal_handler),
        )
        .route(
            "/api/v1/activities/:activity_id/participants",
            get(roster_handler),
        )
        .route(
            "/api/v1/activities/:activity_id/participants/:student_id",
            post(participation_handler),
        )
        .route("/api/v1/rankings", get(rankings_handler))
        .with_state(Arc::new(api))
}

pub(crate) async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn activities_handler(
    State(api): State<SharedApi>,
) -> Result<Json<Value>, AppError> {
    let activities = api.activities().await?;
    Ok(Json(json!({ "activities": activities })))
}

pub(crate) async fn board_handler(
    State(api): State<SharedApi>,
    Path(activity_id): Path<String>,
) -> Result<Response, AppError> {
    let board = api.board(&ActivityId(activity_id)).await?;
    Ok(Json(board).into_response())
}

pub(crate) async fn award_handler(
    State(api): State<SharedApi>,
    Path(activity_id): Path<String>,
    Json(request): Json<AwardRequest>,
) -> Result<Response, AppError> {
    let outcome = api
        .award(
            &ActivityId(activity_id),
            &request.point_rule_id,
            &request.tribe_ids,
        )
        .await?;

    // A batch where every award failed still returns its per-tribe report.
    let status = match &outcome {
        AwardOutcome::Participation(report) if report.committed.is_empty() => {
            StatusCode::BAD_GATEWAY
        }
        _ => StatusCode::CREATED,
    };
    let payload = json!({
        "notices": outcome.notices(),
        "outcome": outcome,
    });
    Ok((status, Json(payload)).into_response())
}

pub(crate) async fn removal_handler(
    State(api): State<SharedApi>,
    Path((activity_id, score_id)): Path<(String, String)>,
    Query(query): Query<RemovalQuery>,
) -> Result<Response, AppError> {
    let outcome = api
        .remove(&ActivityId(activity_id), &ScoreId(score_id), query.confirm)
        .await?;

    let status = match &outcome {
        RemovalOutcome::AwaitingConfirmation { .. } => StatusCode::CONFLICT,
        RemovalOutcome::Removed(_) => StatusCode::OK,
    };
    let payload = json!({
        "notices": outcome.notices(),
        "removal": outcome,
    });
    Ok((status, Json(payload)).into_response())
}

pub(crate) async fn roster_handler(
    State(api): State<SharedApi>,
    Path(activity_id): Path<String>,
    Query(query): Query<RosterQuery>,
) -> Result<Response, AppError> {
    let status = match query
        .status
        .as_deref()
        .map(str::parse::<ParticipationStatus>)
        .transpose()
    {
        Ok(status) => status,
        Err(message) => return Ok(bad_request(message)),
    };
    let filter = RosterFilter {
        status,
        search: query.search,
    };

    let roster = api.roster(&ActivityId(activity_id), &filter).await?;
    Ok(Json(roster).into_response())
}

pub(crate) async fn participation_handler(
    State(api): State<SharedApi>,
    Path((activity_id, student_id)): Path<(String, String)>,
    Json(request): Json<ParticipationRequest>,
) -> Result<Response, AppError> {
    let status = match request.status.parse::<ParticipationStatus>() {
        Ok(status) => status,
        Err(message) => return Ok(bad_request(message)),
    };

    let update = api
        .update_participation(&ActivityId(activity_id), &StudentId(student_id), status)
        .await?;
    Ok(Json(update).into_response())
}

pub(crate) async fn rankings_handler(
    State(api): State<SharedApi>,
) -> Result<Json<Value>, AppError> {
    let leaderboard = api.rankings().await?;
    let leaders: Vec<&str> = leaderboard
        .leaders()
        .into_iter()
        .map(|entry| entry.name.as_str())
        .collect();
    let entries: Vec<Value> = leaderboard
        .entries()
        .iter()
        .map(|entry| {
            json!({
                "tribe_id": entry.tribe_id,
                "name": entry.name,
                "rank": entry.rank,
                "rank_label": entry.rank_label(),
                "points": entry.points,
                "special_bonus": entry.special_bonus,
                "total_scores": entry.total_scores,
                "tied_with": entry.tied_with,
            })
        })
        .collect();

    Ok(Json(json!({ "leaders": leaders, "entries": entries })))
}

fn bad_request(message: String) -> Response {
    let payload = json!({ "error": message });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::demo_api;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use tribe_tally::gateway::{BackendClient, MemoryBackend};

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let (api, _) = demo_api();
        let (status, body) = send(with_scoring_routes(api), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn board_reports_open_rules_and_eligible_tribes() {
        let (api, _) = demo_api();
        let (status, body) = send(
            scoring_router(api),
            get_request("/api/v1/activities/1/board"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["board"]["status"], "open");
        assert_eq!(body["board"]["rules"].as_array().map(Vec::len), Some(4));
        assert_eq!(
            body["eligible_participation_tribes"].as_array().map(Vec::len),
            Some(5)
        );
    }

    #[tokio::test]
    async fn board_without_rules_is_unconfigured() {
        let (api, _) = demo_api();
        let (status, body) = send(
            scoring_router(api),
            get_request("/api/v1/activities/2/board"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["board"]["status"], "unconfigured");
    }

    #[tokio::test]
    async fn unknown_activity_is_unprocessable() {
        let (api, _) = demo_api();
        let (status, body) = send(
            scoring_router(api),
            get_request("/api/v1/activities/99/board"),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["notices"][0]["level"], "error");
    }

    #[tokio::test]
    async fn placement_can_only_be_awarded_once() {
        let (api, backend) = demo_api();
        let router = scoring_router(api);

        let (status, body) = send(
            router.clone(),
            json_request(
                "POST",
                "/api/v1/activities/1/scores",
                json!({ "point_rule_id": 1, "tribe_ids": ["3"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"]["kind"], "placement");
        assert_eq!(body["notices"][0]["message"], "Green Vipers awarded 1st (50 pts)");

        let (status, _) = send(
            router,
            json_request(
                "POST",
                "/api/v1/activities/1/scores",
                json!({ "point_rule_id": "1", "tribe_ids": ["4"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(backend.call_count("addScore"), 1);
    }

    #[tokio::test]
    async fn stale_participation_request_reports_skipped_tribes() {
        let (api, backend) = demo_api();
        let activity = ActivityId::from("1");
        backend.award(
            &activity,
            &TribeId::from("4"),
            &PointRuleId::from("4"),
            "Officer 12",
        );

        let (status, body) = send(
            scoring_router(api),
            json_request(
                "POST",
                "/api/v1/activities/1/scores",
                json!({ "point_rule_id": "4", "tribe_ids": ["4", "5"] }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"]["kind"], "participation");
        assert_eq!(body["outcome"]["committed"][0]["id"], "5");
        assert_eq!(body["outcome"]["skipped"][0]["tribe"]["id"], "4");
        assert_eq!(body["outcome"]["skipped"][0]["reason"], "already_participated");
        assert_eq!(backend.call_count("addScore"), 1);
    }

    #[tokio::test]
    async fn removal_waits_for_confirmation() {
        let (api, backend) = demo_api();
        let activity = ActivityId::from("1");
        let score = backend.award(&activity, &TribeId::from("2"), &PointRuleId::from("2"), "Officer 3");
        let router = scoring_router(api);
        let uri = format!("/api/v1/activities/1/scores/{score}");

        let (status, body) = send(router.clone(), json_request("DELETE", &uri, Value::Null)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["removal"]["state"], "awaiting_confirmation");
        assert_eq!(backend.call_count("removeScore"), 0);

        let confirmed = format!("{uri}?confirm=true");
        let (status, body) = send(router, json_request("DELETE", &confirmed, Value::Null)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removal"]["message"], "Score removed successfully");
        assert_eq!(backend.call_count("removeScore"), 1);
    }

    #[tokio::test]
    async fn roster_filters_by_status() {
        let (api, _) = demo_api();
        let router = scoring_router(api);

        let (status, body) = send(
            router.clone(),
            get_request("/api/v1/activities/1/participants?status=pending"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["participants"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["counts"]["absent"], 1);

        let (status, _) = send(
            router,
            get_request("/api/v1/activities/1/participants?status=sleeping"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn participation_updates_reach_the_backend() {
        let (api, backend) = demo_api();
        let (status, body) = send(
            scoring_router(api),
            json_request(
                "POST",
                "/api/v1/activities/1/participants/2023-0002",
                json!({ "status": "participated" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "participated");
        let roster = backend.participants(&ActivityId::from("1"));
        let ben = roster
            .iter()
            .find(|participant| participant.student_id == StudentId::from("2023-0002"))
            .expect("student registered");
        assert_eq!(ben.status, ParticipationStatus::Participated);
    }

    #[tokio::test]
    async fn rankings_show_ties() {
        let (api, _) = demo_api();
        let (status, body) = send(scoring_router(api), get_request("/api/v1/rankings")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["leaders"], json!(["Red Hawks"]));
        assert_eq!(body["entries"][1]["rank_label"], "#2 (tied with Green Vipers)");
        assert_eq!(body["entries"][4]["rank_label"], "unranked");
    }

    #[tokio::test]
    async fn missing_officer_is_a_bad_request() {
        let api = ScoringApi::new(BackendClient::new(Arc::new(MemoryBackend::new())), None);
        let (status, _) = send(scoring_router(api), get_request("/api/v1/activities")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
