use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{BackendRoute, Gateway};
use crate::scoring::domain::{
    Activity, ActivityId, OfficerId, ParticipationStatus, Participant, PointRule, PointRuleId,
    Score, ScoreId, StudentId, Tribe, TribeId,
};

/// Payload of the `addScore` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddScoreRequest {
    pub sbo_id: OfficerId,
    pub activity_id: ActivityId,
    pub tribe_id: TribeId,
    pub point_rule_id: PointRuleId,
    pub is_participation: bool,
}

/// Typed facade over a [`Gateway`] for the operations the scoring workflow uses.
#[derive(Clone)]
pub struct BackendClient {
    gateway: Arc<dyn Gateway>,
}

impl BackendClient {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    pub async fn activities(&self, officer: &OfficerId) -> Result<Vec<Activity>, GatewayError> {
        self.list("getSboActivities", json!({ "sboId": officer }))
            .await
    }

    pub async fn point_rules(&self, activity: &ActivityId) -> Result<Vec<PointRule>, GatewayError> {
        self.list("getActivityPointRules", json!({ "activityId": activity }))
            .await
    }

    pub async fn scores(&self, activity: &ActivityId) -> Result<Vec<Score>, GatewayError> {
        self.list("getActivityScores", json!({ "activityId": activity }))
            .await
    }

    pub async fn tribes(&self) -> Result<Vec<Tribe>, GatewayError> {
        self.list("getAllTribes", json!({})).await
    }

    pub async fn add_score(&self, request: &AddScoreRequest) -> Result<String, GatewayError> {
        let payload = serde_json::to_value(request).map_err(|source| GatewayError::Decode {
            operation: "addScore",
            source,
        })?;
        self.acknowledge("addScore", payload).await
    }

    pub async fn remove_score(
        &self,
        officer: &OfficerId,
        score: &ScoreId,
    ) -> Result<String, GatewayError> {
        self.acknowledge("removeScore", json!({ "sboId": officer, "scoreId": score }))
            .await
    }

    pub async fn participants(
        &self,
        activity: &ActivityId,
    ) -> Result<Vec<Participant>, GatewayError> {
        self.list("getActivityParticipants", json!({ "activityId": activity }))
            .await
    }

    pub async fn update_participation(
        &self,
        officer: &OfficerId,
        activity: &ActivityId,
        student: &StudentId,
        status: ParticipationStatus,
    ) -> Result<String, GatewayError> {
        self.acknowledge(
            "updateStudentParticipation",
            json!({
                "sboId": officer,
                "activityId": activity,
                "studentId": student,
                "status": status,
            }),
        )
        .await
    }

    async fn list<T>(&self, operation: &'static str, payload: Value) -> Result<Vec<T>, GatewayError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .gateway
            .invoke(BackendRoute::Sbo, operation, payload)
            .await;
        if !response.success {
            return Err(GatewayError::Rejected {
                operation,
                message: response.message_or("request failed"),
            });
        }

        response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|source| GatewayError::Decode { operation, source })
            })
            .collect()
    }

    async fn acknowledge(
        &self,
        operation: &'static str,
        payload: Value,
    ) -> Result<String, GatewayError> {
        let response = self
            .gateway
            .invoke(BackendRoute::Sbo, operation, payload)
            .await;
        if response.success {
            Ok(response.message_or("done"))
        } else {
            Err(GatewayError::Rejected {
                operation,
                message: response.message_or("request failed"),
            })
        }
    }
}

/// Failure of a typed backend call.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{operation} failed: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
    #[error("unable to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl GatewayError {
    /// The part of the error meant for people: the backend message when there is one.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
