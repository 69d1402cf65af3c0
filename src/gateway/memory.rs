use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{normalize_body, BackendRoute, Gateway, GatewayResponse};
use crate::scoring::domain::{
    is_truthy, Activity, ActivityId, ParticipationStatus, Participant, PointRule, PointRuleId,
    Score, ScoreId, StudentId, Tribe, TribeId,
};

/// In-process backend implementing the scoring operations with the same
/// response shapes as the PHP routes.
///
/// Unlike the PHP routes it enforces one score per (activity, tribe) and one
/// placement per rule, rejecting duplicates the way a unique constraint would.
/// Every invoked operation is recorded so callers can assert on traffic.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
}

#[derive(Debug, Default)]
struct BackendState {
    activities: Vec<Activity>,
    point_rules: BTreeMap<ActivityId, Vec<PointRule>>,
    tribes: Vec<Tribe>,
    scores: Vec<Score>,
    participants: BTreeMap<ActivityId, Vec<Participant>>,
    rejected_tribes: HashMap<TribeId, String>,
    next_score_id: u64,
    calls: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_activity(&self, activity: Activity, rules: Vec<PointRule>) {
        let mut state = self.lock();
        state.point_rules.insert(activity.id.clone(), rules);
        state.activities.push(activity);
    }

    pub fn add_tribes(&self, tribes: impl IntoIterator<Item = Tribe>) {
        self.lock().tribes.extend(tribes);
    }

    pub fn add_participants(
        &self,
        activity: &ActivityId,
        participants: impl IntoIterator<Item = Participant>,
    ) {
        self.lock()
            .participants
            .entry(activity.clone())
            .or_default()
            .extend(participants);
    }

    /// Record a score directly, as another officer's session would.
    pub fn award(
        &self,
        activity: &ActivityId,
        tribe: &TribeId,
        rule: &PointRuleId,
        officer: &str,
    ) -> ScoreId {
        let mut state = self.lock();
        state.insert_score(activity, tribe, rule, officer)
    }

    /// Make every subsequent `addScore` for `tribe` fail with `message`.
    pub fn reject_tribe(&self, tribe: &TribeId, message: impl Into<String>) {
        self.lock()
            .rejected_tribes
            .insert(tribe.clone(), message.into());
    }

    pub fn scores(&self, activity: &ActivityId) -> Vec<Score> {
        self.lock()
            .scores
            .iter()
            .filter(|score| &score.activity_id == activity)
            .cloned()
            .collect()
    }

    pub fn participants(&self, activity: &ActivityId) -> Vec<Participant> {
        self.lock()
            .participants
            .get(activity)
            .cloned()
            .unwrap_or_default()
    }

    /// Operation names in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Gateway for MemoryBackend {
    async fn invoke(
        &self,
        _route: BackendRoute,
        operation: &str,
        payload: Value,
    ) -> GatewayResponse {
        let mut state = self.lock();
        state.calls.push(operation.to_string());

        let body = match operation {
            "getSboActivities" => json!(state.activities),
            "getActivityPointRules" => {
                let activity = ActivityId(text_field(&payload, "activityId").unwrap_or_default());
                json!(state.point_rules.get(&activity).cloned().unwrap_or_default())
            }
            "getActivityScores" => {
                let activity = ActivityId(text_field(&payload, "activityId").unwrap_or_default());
                let scores: Vec<&Score> = state
                    .scores
                    .iter()
                    .filter(|score| score.activity_id == activity)
                    .collect();
                json!(scores)
            }
            "getAllTribes" => json!(state.tribes),
            "addScore" => state.add_score(&payload),
            "removeScore" => state.remove_score(&payload),
            "getActivityParticipants" => {
                let activity = ActivityId(text_field(&payload, "activityId").unwrap_or_default());
                json!(state.participants.get(&activity).cloned().unwrap_or_default())
            }
            "updateStudentParticipation" => state.update_participation(&payload),
            unknown => failure(&format!("Invalid operation: {unknown}")),
        };

        normalize_body(body)
    }
}

impl BackendState {
    fn add_score(&mut self, payload: &Value) -> Value {
        let (Some(officer), Some(activity), Some(tribe), Some(rule_id)) = (
            text_field(payload, "sboId"),
            text_field(payload, "activityId"),
            text_field(payload, "tribeId"),
            text_field(payload, "pointRuleId"),
        ) else {
            return failure("Missing required fields");
        };
        let activity = ActivityId(activity);
        let tribe = TribeId(tribe);
        let rule_id = PointRuleId(rule_id);
        let is_participation = payload.get("isParticipation").is_some_and(is_truthy);

        let Some(rule) = self
            .point_rules
            .get(&activity)
            .and_then(|rules| rules.iter().find(|rule| rule.id == rule_id))
            .cloned()
        else {
            return failure("Point rule not found for this activity");
        };
        if rule.is_participation() != is_participation {
            return failure("Participation flag does not match the point rule");
        }
        if let Some(message) = self.rejected_tribes.get(&tribe) {
            return failure(message);
        }
        if !self.tribes.iter().any(|known| known.id == tribe) {
            return failure("Tribe not found");
        }

        let activity_scores = || self.scores.iter().filter(|s| s.activity_id == activity);
        if activity_scores().any(|score| score.tribe_id == tribe) {
            return failure("This tribe already has a score for this activity");
        }
        if !rule.is_participation() && activity_scores().any(|score| score.point_rule_id == rule_id)
        {
            return failure("This place has already been awarded");
        }

        let score_id = self.insert_score(&activity, &tribe, &rule_id, &format!("Officer {officer}"));
        json!({
            "success": true,
            "message": "Score added successfully",
            "score_id": score_id,
        })
    }

    fn remove_score(&mut self, payload: &Value) -> Value {
        let Some(score_id) = text_field(payload, "scoreId").map(ScoreId) else {
            return failure("Missing score id");
        };
        let before = self.scores.len();
        self.scores.retain(|score| score.id != score_id);
        if self.scores.len() == before {
            failure("Score not found")
        } else {
            json!({ "success": true, "message": "Score removed successfully" })
        }
    }

    fn update_participation(&mut self, payload: &Value) -> Value {
        let (Some(activity), Some(student)) = (
            text_field(payload, "activityId").map(ActivityId),
            text_field(payload, "studentId").map(StudentId),
        ) else {
            return failure("Missing required fields");
        };
        let status = match text_field(payload, "status")
            .unwrap_or_default()
            .parse::<ParticipationStatus>()
        {
            Ok(status) => status,
            Err(message) => return failure(&message),
        };

        let participant = self
            .participants
            .get_mut(&activity)
            .and_then(|roster| roster.iter_mut().find(|p| p.student_id == student));
        match participant {
            Some(participant) => {
                participant.status = status;
                json!({ "success": true, "message": "Participation updated" })
            }
            None => failure("Student is not registered for this activity"),
        }
    }

    fn insert_score(
        &mut self,
        activity: &ActivityId,
        tribe: &TribeId,
        rule_id: &PointRuleId,
        officer: &str,
    ) -> ScoreId {
        self.next_score_id += 1;
        let rule = self
            .point_rules
            .get(activity)
            .and_then(|rules| rules.iter().find(|rule| &rule.id == rule_id));
        let score = Score {
            id: ScoreId(self.next_score_id.to_string()),
            activity_id: activity.clone(),
            tribe_id: tribe.clone(),
            point_rule_id: rule_id.clone(),
            awarded_by: Some(officer.to_string()),
            created_at: Some(Local::now().naive_local()),
            place: rule.map(|rule| rule.place.clone()),
            points: rule.map(|rule| rule.points),
            tribe_name: self
                .tribes
                .iter()
                .find(|known| &known.id == tribe)
                .map(|known| known.name.clone()),
            allows_all: rule.map(PointRule::is_participation),
        };
        let id = score.id.clone();
        self.scores.push(score);
        id
    }
}

fn failure(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

fn text_field(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::String(raw) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend.add_activity(
            Activity::new("1", "Tug of War"),
            vec![
                PointRule::placement("10", "1st", 10),
                PointRule::participation("11", "Joined", 5),
            ],
        );
        backend.add_tribes([Tribe::new("A", "Tribe A"), Tribe::new("B", "Tribe B")]);
        backend
    }

    fn add_score(tribe: &str, rule: &str, participation: bool) -> Value {
        json!({
            "sboId": "7",
            "activityId": "1",
            "tribeId": tribe,
            "pointRuleId": rule,
            "isParticipation": participation,
        })
    }

    #[tokio::test]
    async fn rejects_second_score_for_same_tribe() {
        let backend = backend();
        let first = backend
            .invoke(BackendRoute::Sbo, "addScore", add_score("A", "10", false))
            .await;
        assert!(first.success);

        let second = backend
            .invoke(BackendRoute::Sbo, "addScore", add_score("A", "11", true))
            .await;
        assert!(!second.success);
        assert_eq!(backend.scores(&ActivityId::from("1")).len(), 1);
    }

    #[tokio::test]
    async fn rejects_reused_placement() {
        let backend = backend();
        backend.award(
            &ActivityId::from("1"),
            &TribeId::from("A"),
            &PointRuleId::from("10"),
            "Other officer",
        );

        let response = backend
            .invoke(BackendRoute::Sbo, "addScore", add_score("B", "10", false))
            .await;
        assert!(!response.success);
        assert_eq!(
            response.message.as_deref(),
            Some("This place has already been awarded")
        );
    }

    #[tokio::test]
    async fn unknown_operations_fail_and_are_recorded() {
        let backend = backend();
        let response = backend
            .invoke(BackendRoute::Admin, "dropTables", json!({}))
            .await;
        assert!(!response.success);
        assert_eq!(backend.calls(), vec!["dropTables".to_string()]);
    }
}
