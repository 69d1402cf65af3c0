//! Stateful scoring workflow for one activity selection.
//!
//! The coordinator owns an [`ActivitySnapshot`] that is replaced wholesale by
//! every fetch, and a [`SelectionState`] describing what the officer is doing.
//! Eligibility is always recomputed from the snapshot at call time; the
//! snapshot itself is re-fetched after every mutation.

use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::domain::{
    Activity, ActivityId, OfficerId, PointRule, PointRuleId, Score, ScoreId, Tribe, TribeId,
};
use super::eligibility::{self, BoardStatus, ScoreIndex};
use super::notice::Notice;
use crate::gateway::{AddScoreRequest, BackendClient, GatewayError};

/// Latest fetched backend state for the selected activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySnapshot {
    pub activity: Activity,
    pub point_rules: Vec<PointRule>,
    pub scores: Vec<Score>,
    pub tribes: Vec<Tribe>,
}

impl ActivitySnapshot {
    pub fn status(&self) -> BoardStatus {
        eligibility::board_status(&self.scores, &self.point_rules, &self.tribes)
    }

    pub fn assignable_rules(&self) -> Vec<PointRule> {
        eligibility::assignable_rules(&self.scores, &self.point_rules, &self.tribes)
    }

    pub fn eligible_participation_tribes(&self) -> Vec<Tribe> {
        eligibility::eligible_participation_tribes(&self.scores, &self.point_rules, &self.tribes)
    }

    pub fn eligible_single_tribes(&self) -> Vec<Tribe> {
        eligibility::eligible_single_tribes(&self.scores, &self.tribes)
    }

    pub fn index(&self) -> ScoreIndex {
        ScoreIndex::build(&self.scores, &self.point_rules)
    }

    pub fn rule(&self, id: &PointRuleId) -> Option<&PointRule> {
        self.point_rules.iter().find(|rule| &rule.id == id)
    }

    pub fn tribe(&self, id: &TribeId) -> Option<&Tribe> {
        self.tribes.iter().find(|tribe| &tribe.id == id)
    }

    pub fn score(&self, id: &ScoreId) -> Option<&Score> {
        self.scores.iter().find(|score| &score.id == id)
    }

    fn tribe_or_placeholder(&self, id: &TribeId) -> Tribe {
        self.tribe(id)
            .cloned()
            .unwrap_or_else(|| Tribe::new(id.clone(), id.0.clone()))
    }
}

/// What the officer is currently doing for the selected activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    Idle,
    /// A placement rule is chosen and the tribe selector is open.
    RuleSelected(PointRule),
    /// A participation rule is chosen and tribes are being collected.
    BatchPending {
        rule: PointRule,
        tribes: BTreeSet<TribeId>,
    },
    /// A commit for `rule` is in flight.
    Saving { rule: PointRule },
}

impl SelectionState {
    pub fn rule(&self) -> Option<&PointRule> {
        match self {
            Self::Idle => None,
            Self::RuleSelected(rule)
            | Self::BatchPending { rule, .. }
            | Self::Saving { rule } => Some(rule),
        }
    }

    pub fn selector_open(&self) -> bool {
        matches!(self, Self::RuleSelected(_) | Self::BatchPending { .. })
    }

    fn reopened(rule: PointRule) -> Self {
        if rule.is_participation() {
            Self::BatchPending {
                rule,
                tribes: BTreeSet::new(),
            }
        } else {
            Self::RuleSelected(rule)
        }
    }
}

/// Why a pending tribe was dropped from a participation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyPlaced,
    AlreadyParticipated,
}

impl SkipReason {
    pub const fn label(self) -> &'static str {
        match self {
            Self::AlreadyPlaced => "already has a placement score",
            Self::AlreadyParticipated => "already has a participation score",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTribe {
    pub tribe: Tribe,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTribe {
    pub tribe: Tribe,
    pub message: String,
}

/// Outcome of a participation batch commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub rule: PointRule,
    pub committed: Vec<Tribe>,
    pub failed: Vec<FailedTribe>,
    pub skipped: Vec<SkippedTribe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.committed.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn notices(&self) -> Vec<Notice> {
        let mut notices: Vec<Notice> = self.skipped.iter().map(skip_notice).collect();

        if !self.committed.is_empty() {
            notices.push(Notice::success(format!(
                "Awarded {} ({} pts) to {} tribe(s)",
                self.rule.place,
                self.rule.points,
                self.committed.len()
            )));
        }
        if !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|f| f.tribe.name.as_str()).collect();
            notices.push(Notice::error(format!(
                "{} failed: {}",
                self.failed.len(),
                names.join(", ")
            )));
        }
        if let Some(error) = &self.refresh_error {
            notices.push(refresh_notice(error));
        }
        notices
    }
}

/// Outcome of a single placement award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AwardReceipt {
    pub tribe: Tribe,
    pub rule: PointRule,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

impl AwardReceipt {
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices = vec![Notice::success(format!(
            "{} awarded {} ({} pts)",
            self.tribe.name, self.rule.place, self.rule.points
        ))];
        if let Some(error) = &self.refresh_error {
            notices.push(refresh_notice(error));
        }
        notices
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovalReceipt {
    pub score_id: ScoreId,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

impl RemovalReceipt {
    pub fn notices(&self) -> Vec<Notice> {
        let mut notices = vec![Notice::success(self.message.clone())];
        if let Some(error) = &self.refresh_error {
            notices.push(refresh_notice(error));
        }
        notices
    }
}

/// Result of picking a tribe in the open selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Awarded(AwardReceipt),
    Selected { tribe: TribeId, pending: usize },
    Deselected { tribe: TribeId, pending: usize },
}

/// Client-side checks that short-circuit before any backend call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("select an activity first")]
    NoActivity,
    #[error("activity {0} is not assigned to this officer")]
    UnknownActivity(ActivityId),
    #[error("select a place first")]
    NoRuleSelected,
    #[error("point rule {0} is not configured for this activity")]
    UnknownRule(PointRuleId),
    #[error("{place} can no longer be awarded")]
    RuleUnavailable { place: String },
    #[error("tribe {0} is not part of this activity")]
    UnknownTribe(TribeId),
    #[error("{tribe} already has a placement score")]
    AlreadyPlaced { tribe: String },
    #[error("{tribe} already has a participation score")]
    AlreadyParticipated { tribe: String },
    #[error("select at least one tribe")]
    EmptyBatch,
    #[error("a placement goes to exactly one tribe, {count} were given")]
    SingleTribeRequired { count: usize },
    #[error("score {0} is not recorded for this activity")]
    UnknownScore(ScoreId),
}

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("a save is already in progress")]
    Busy,
    #[error("removal must be confirmed before it is committed")]
    ConfirmationRequired,
    #[error("none of the selected tribes can still receive participation points")]
    NothingToCommit { skipped: Vec<SkippedTribe> },
}

impl ScoringError {
    pub fn notices(&self) -> Vec<Notice> {
        match self {
            Self::Gateway(err) => vec![Notice::error(err.user_message())],
            Self::NothingToCommit { skipped } => {
                let mut notices: Vec<Notice> = skipped.iter().map(skip_notice).collect();
                notices.push(Notice::error(self.to_string()));
                notices
            }
            Self::ConfirmationRequired => vec![Notice::warning(self.to_string())],
            other => vec![Notice::error(other.to_string())],
        }
    }
}

fn skip_notice(skipped: &SkippedTribe) -> Notice {
    Notice::warning(format!(
        "Skipping {}: {}",
        skipped.tribe.name,
        skipped.reason.label()
    ))
}

fn refresh_notice(error: &str) -> Notice {
    Notice::warning(format!("Saved, but scores could not be refreshed: {error}"))
}

/// Drives rule/tribe selection and score mutations for one officer.
pub struct ScoringCoordinator {
    client: BackendClient,
    officer: OfficerId,
    snapshot: Option<ActivitySnapshot>,
    state: SelectionState,
    pending_removal: Option<ScoreId>,
}

impl ScoringCoordinator {
    pub fn new(client: BackendClient, officer: OfficerId) -> Self {
        Self {
            client,
            officer,
            snapshot: None,
            state: SelectionState::Idle,
            pending_removal: None,
        }
    }

    pub fn officer(&self) -> &OfficerId {
        &self.officer
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&ActivitySnapshot> {
        self.snapshot.as_ref()
    }

    pub fn pending_removal(&self) -> Option<&ScoreId> {
        self.pending_removal.as_ref()
    }

    /// Look the activity up among the officer's activities and select it.
    pub async fn open_activity(
        &mut self,
        activity_id: &ActivityId,
    ) -> Result<&ActivitySnapshot, ScoringError> {
        self.ensure_not_saving()?;
        let activity = self
            .client
            .activities(&self.officer)
            .await?
            .into_iter()
            .find(|activity| &activity.id == activity_id)
            .ok_or_else(|| ValidationError::UnknownActivity(activity_id.clone()))?;
        self.select_activity(activity).await
    }

    /// Fetch rules, tribes and scores for `activity` and reset the selection.
    ///
    /// On failure the previous snapshot and selection are left untouched.
    pub async fn select_activity(
        &mut self,
        activity: Activity,
    ) -> Result<&ActivitySnapshot, ScoringError> {
        self.ensure_not_saving()?;
        let (point_rules, tribes, scores) = futures::try_join!(
            self.client.point_rules(&activity.id),
            self.client.tribes(),
            self.client.scores(&activity.id),
        )?;

        info!(
            activity = %activity.id,
            rules = point_rules.len(),
            tribes = tribes.len(),
            scores = scores.len(),
            "activity selected"
        );

        self.state = SelectionState::Idle;
        self.pending_removal = None;
        Ok(self.snapshot.insert(ActivitySnapshot {
            activity,
            point_rules,
            scores,
            tribes,
        }))
    }

    /// Refetch everything for the selected activity.
    pub async fn refresh(&mut self) -> Result<&ActivitySnapshot, ScoringError> {
        let activity = self.require_snapshot()?.activity.clone();
        self.select_activity(activity).await
    }

    /// Replace the held scores with a fresh fetch; a failed fetch keeps the
    /// previous scores in place.
    pub async fn refresh_scores(&mut self) -> Result<(), ScoringError> {
        let activity_id = self.require_snapshot()?.activity.id.clone();
        match self.client.scores(&activity_id).await {
            Ok(scores) => {
                debug!(activity = %activity_id, scores = scores.len(), "scores refreshed");
                if let Some(snapshot) = self.snapshot.as_mut() {
                    snapshot.scores = scores;
                }
                Ok(())
            }
            Err(err) => {
                warn!(activity = %activity_id, error = %err, "score refresh failed");
                Err(err.into())
            }
        }
    }

    pub fn select_point_rule(
        &mut self,
        rule_id: &PointRuleId,
    ) -> Result<&SelectionState, ScoringError> {
        self.ensure_not_saving()?;
        let snapshot = self.require_snapshot()?;
        let rule = snapshot
            .rule(rule_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownRule(rule_id.clone()))?;
        if !snapshot.assignable_rules().contains(&rule) {
            return Err(ValidationError::RuleUnavailable { place: rule.place }.into());
        }

        debug!(rule = %rule.id, participation = rule.is_participation(), "point rule selected");
        self.state = SelectionState::reopened(rule);
        Ok(&self.state)
    }

    /// Pick a tribe in the open selector.
    ///
    /// Placement rules commit immediately; participation rules toggle the
    /// tribe in the pending batch without touching the backend.
    pub async fn pick_tribe(&mut self, tribe_id: &TribeId) -> Result<PickOutcome, ScoringError> {
        match &self.state {
            SelectionState::Idle => Err(ValidationError::NoRuleSelected.into()),
            SelectionState::Saving { .. } => Err(ScoringError::Busy),
            SelectionState::RuleSelected(rule) => {
                let rule = rule.clone();
                self.add_score(tribe_id, &rule)
                    .await
                    .map(PickOutcome::Awarded)
            }
            SelectionState::BatchPending { .. } => self.toggle_pending(tribe_id),
        }
    }

    fn toggle_pending(&mut self, tribe_id: &TribeId) -> Result<PickOutcome, ScoringError> {
        let snapshot = self.require_snapshot()?;
        let tribe = snapshot
            .tribe(tribe_id)
            .ok_or_else(|| ValidationError::UnknownTribe(tribe_id.clone()))?;
        let index = snapshot.index();
        let rejection = if index.placed.contains(tribe_id) {
            Some(ValidationError::AlreadyPlaced {
                tribe: tribe.name.clone(),
            })
        } else if index.participated.contains(tribe_id) {
            Some(ValidationError::AlreadyParticipated {
                tribe: tribe.name.clone(),
            })
        } else {
            None
        };

        let SelectionState::BatchPending { tribes, .. } = &mut self.state else {
            return Err(ValidationError::NoRuleSelected.into());
        };

        if tribes.remove(tribe_id) {
            return Ok(PickOutcome::Deselected {
                tribe: tribe_id.clone(),
                pending: tribes.len(),
            });
        }
        if let Some(rejection) = rejection {
            return Err(rejection.into());
        }
        tribes.insert(tribe_id.clone());
        Ok(PickOutcome::Selected {
            tribe: tribe_id.clone(),
            pending: tribes.len(),
        })
    }

    /// Add `tribe_ids` to the pending batch in one go.
    ///
    /// Unlike [`pick_tribe`](Self::pick_tribe) this never toggles a tribe out
    /// and does not reject tribes that already hold a score: a caller working
    /// from an older board gets them back as skipped from
    /// [`save_participation_batch`](Self::save_participation_batch). Unknown
    /// tribes are still rejected and leave the batch untouched.
    pub fn stage_participation_batch<I>(&mut self, tribe_ids: I) -> Result<usize, ScoringError>
    where
        I: IntoIterator<Item = TribeId>,
    {
        let snapshot = self.require_snapshot()?;
        let mut staged = BTreeSet::new();
        for tribe_id in tribe_ids {
            if snapshot.tribe(&tribe_id).is_none() {
                return Err(ValidationError::UnknownTribe(tribe_id).into());
            }
            staged.insert(tribe_id);
        }

        match &mut self.state {
            SelectionState::BatchPending { tribes, .. } => {
                tribes.extend(staged);
                Ok(tribes.len())
            }
            SelectionState::Saving { .. } => Err(ScoringError::Busy),
            _ => Err(ValidationError::NoRuleSelected.into()),
        }
    }

    /// Award `rule` to a single tribe.
    ///
    /// Success closes the selector and refetches scores; a backend failure
    /// leaves the selector open with the rule still chosen.
    pub async fn add_score(
        &mut self,
        tribe_id: &TribeId,
        rule: &PointRule,
    ) -> Result<AwardReceipt, ScoringError> {
        self.ensure_not_saving()?;
        let snapshot = self.require_snapshot()?;
        let tribe = snapshot
            .tribe(tribe_id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownTribe(tribe_id.clone()))?;
        let index = snapshot.index();
        if index.placed.contains(tribe_id) {
            return Err(ValidationError::AlreadyPlaced { tribe: tribe.name }.into());
        }
        if index.participated.contains(tribe_id) {
            return Err(ValidationError::AlreadyParticipated { tribe: tribe.name }.into());
        }
        if !rule.is_participation() && index.used_rules.contains(&rule.id) {
            return Err(ValidationError::RuleUnavailable {
                place: rule.place.clone(),
            }
            .into());
        }

        let request = AddScoreRequest {
            sbo_id: self.officer.clone(),
            activity_id: snapshot.activity.id.clone(),
            tribe_id: tribe_id.clone(),
            point_rule_id: rule.id.clone(),
            is_participation: rule.is_participation(),
        };

        let restore = match &self.state {
            SelectionState::Idle | SelectionState::Saving { .. } => {
                SelectionState::reopened(rule.clone())
            }
            open => open.clone(),
        };
        let client = self.client.clone();
        let saving = SavingGuard::enter(&mut self.state, rule, restore);
        match client.add_score(&request).await {
            Ok(message) => {
                info!(tribe = %tribe.id, rule = %rule.id, "score added");
                saving.finish(SelectionState::Idle);
                let refresh_error = self.refresh_scores().await.err().map(|e| e.to_string());
                Ok(AwardReceipt {
                    tribe,
                    rule: rule.clone(),
                    message,
                    refresh_error,
                })
            }
            Err(err) => {
                warn!(tribe = %tribe.id, rule = %rule.id, error = %err, "add score rejected");
                drop(saving);
                Err(err.into())
            }
        }
    }

    /// Commit the pending participation batch.
    ///
    /// Scores are fetched again right before committing because other
    /// officers may have scored the same tribes since the last fetch. Tribes
    /// that picked up any score are skipped and reported, the rest are
    /// awarded concurrently, and scores are fetched once more after every
    /// call has settled. Successful awards are kept when others fail.
    pub async fn save_participation_batch(&mut self) -> Result<BatchReport, ScoringError> {
        let (rule, pending) = match &self.state {
            SelectionState::BatchPending { rule, tribes } => (rule.clone(), tribes.clone()),
            SelectionState::Saving { .. } => return Err(ScoringError::Busy),
            _ => return Err(ValidationError::NoRuleSelected.into()),
        };
        if pending.is_empty() {
            return Err(ValidationError::EmptyBatch.into());
        }
        let activity_id = self.require_snapshot()?.activity.id.clone();

        let client = self.client.clone();
        let restore = SelectionState::BatchPending {
            rule: rule.clone(),
            tribes: pending.clone(),
        };
        let saving = SavingGuard::enter(&mut self.state, &rule, restore);
        let fresh = match client.scores(&activity_id).await {
            Ok(scores) => scores,
            Err(err) => {
                warn!(activity = %activity_id, error = %err, "pre-commit score fetch failed");
                return Err(err.into());
            }
        };

        let snapshot = match self.snapshot.as_mut() {
            Some(snapshot) => snapshot,
            None => return Err(ValidationError::NoActivity.into()),
        };
        snapshot.scores = fresh;
        let index = snapshot.index();

        let mut skipped = Vec::new();
        let mut valid = Vec::new();
        for tribe_id in &pending {
            let tribe = snapshot.tribe_or_placeholder(tribe_id);
            if index.placed.contains(tribe_id) {
                skipped.push(SkippedTribe {
                    tribe,
                    reason: SkipReason::AlreadyPlaced,
                });
            } else if index.participated.contains(tribe_id) {
                skipped.push(SkippedTribe {
                    tribe,
                    reason: SkipReason::AlreadyParticipated,
                });
            } else {
                valid.push(tribe);
            }
        }
        for entry in &skipped {
            warn!(tribe = %entry.tribe.id, reason = entry.reason.label(), "skipping tribe");
        }

        if valid.is_empty() {
            saving.finish(SelectionState::Idle);
            return Err(ScoringError::NothingToCommit { skipped });
        }

        let requests: Vec<AddScoreRequest> = valid
            .iter()
            .map(|tribe| AddScoreRequest {
                sbo_id: self.officer.clone(),
                activity_id: activity_id.clone(),
                tribe_id: tribe.id.clone(),
                point_rule_id: rule.id.clone(),
                is_participation: true,
            })
            .collect();
        let results = join_all(requests.iter().map(|request| client.add_score(request))).await;
        saving.finish(SelectionState::Idle);

        let mut committed = Vec::new();
        let mut failed = Vec::new();
        for (tribe, result) in valid.into_iter().zip(results) {
            match result {
                Ok(_) => committed.push(tribe),
                Err(err) => failed.push(FailedTribe {
                    tribe,
                    message: err.user_message(),
                }),
            }
        }

        let refresh_error = self.refresh_scores().await.err().map(|e| e.to_string());

        info!(
            activity = %activity_id,
            rule = %rule.id,
            committed = committed.len(),
            failed = failed.len(),
            skipped = skipped.len(),
            "participation batch saved"
        );

        Ok(BatchReport {
            rule,
            committed,
            failed,
            skipped,
            refresh_error,
        })
    }

    /// First step of a removal: remember which score the officer wants gone.
    pub fn request_removal(&mut self, score_id: &ScoreId) -> Result<&Score, ScoringError> {
        self.ensure_not_saving()?;
        let score = self
            .snapshot
            .as_ref()
            .ok_or(ValidationError::NoActivity)?
            .score(score_id)
            .ok_or_else(|| ValidationError::UnknownScore(score_id.clone()))?;
        self.pending_removal = Some(score_id.clone());
        Ok(score)
    }

    pub fn cancel_removal(&mut self) -> Option<ScoreId> {
        self.pending_removal.take()
    }

    /// Second step of a removal. The request is consumed whether or not the
    /// backend accepts it.
    pub async fn confirm_removal(&mut self) -> Result<RemovalReceipt, ScoringError> {
        self.ensure_not_saving()?;
        let score_id = self
            .pending_removal
            .take()
            .ok_or(ScoringError::ConfirmationRequired)?;

        let message = self
            .client
            .remove_score(&self.officer, &score_id)
            .await
            .inspect_err(|err| warn!(score = %score_id, error = %err, "remove score rejected"))?;
        info!(score = %score_id, "score removed");

        let refresh_error = self.refresh_scores().await.err().map(|e| e.to_string());
        Ok(RemovalReceipt {
            score_id,
            message,
            refresh_error,
        })
    }

    /// Close the tribe selector and drop any pending batch.
    pub fn cancel(&mut self) {
        self.state = SelectionState::Idle;
    }

    fn ensure_not_saving(&self) -> Result<(), ScoringError> {
        if matches!(self.state, SelectionState::Saving { .. }) {
            Err(ScoringError::Busy)
        } else {
            Ok(())
        }
    }

    fn require_snapshot(&self) -> Result<&ActivitySnapshot, ScoringError> {
        self.snapshot
            .as_ref()
            .ok_or_else(|| ValidationError::NoActivity.into())
    }
}

/// Holds `Saving` for the length of a commit. If the commit future is
/// dropped before it settles, the selection it replaced is put back.
struct SavingGuard<'a> {
    state: &'a mut SelectionState,
    restore: Option<SelectionState>,
}

impl<'a> SavingGuard<'a> {
    fn enter(state: &'a mut SelectionState, rule: &PointRule, restore: SelectionState) -> Self {
        *state = SelectionState::Saving { rule: rule.clone() };
        Self {
            state,
            restore: Some(restore),
        }
    }

    fn finish(mut self, next: SelectionState) {
        self.restore = None;
        *self.state = next;
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        if let Some(restore) = self.restore.take() {
            *self.state = restore;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryBackend;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryBackend>, ScoringCoordinator) {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_activity(
            Activity::new("act-1", "Sack Race"),
            vec![
                PointRule::placement("1", "1st", 10),
                PointRule::participation("2", "Joined", 5),
            ],
        );
        backend.add_tribes([
            Tribe::new("A", "Tribe A"),
            Tribe::new("B", "Tribe B"),
            Tribe::new("C", "Tribe C"),
        ]);
        let coordinator =
            ScoringCoordinator::new(BackendClient::new(backend.clone()), OfficerId::from("7"));
        (backend, coordinator)
    }

    #[tokio::test]
    async fn operations_require_an_activity() {
        let (backend, mut coordinator) = setup();
        let err = coordinator
            .select_point_rule(&PointRuleId::from("1"))
            .expect_err("no activity yet");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::NoActivity)
        ));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn picking_without_a_rule_is_rejected_locally() {
        let (backend, mut coordinator) = setup();
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        let calls_before = backend.calls().len();

        let err = coordinator
            .pick_tribe(&TribeId::from("A"))
            .await
            .expect_err("no rule selected");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::NoRuleSelected)
        ));
        assert_eq!(backend.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn participation_rule_opens_empty_batch_and_toggles() {
        let (backend, mut coordinator) = setup();
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("2"))
            .expect("rule selectable");
        assert!(matches!(
            coordinator.state(),
            SelectionState::BatchPending { tribes, .. } if tribes.is_empty()
        ));

        let picked = coordinator
            .pick_tribe(&TribeId::from("A"))
            .await
            .expect("tribe toggles on");
        assert_eq!(
            picked,
            PickOutcome::Selected {
                tribe: TribeId::from("A"),
                pending: 1
            }
        );
        let unpicked = coordinator
            .pick_tribe(&TribeId::from("A"))
            .await
            .expect("tribe toggles off");
        assert_eq!(
            unpicked,
            PickOutcome::Deselected {
                tribe: TribeId::from("A"),
                pending: 0
            }
        );
        assert_eq!(backend.call_count("addScore"), 0);
    }

    #[tokio::test]
    async fn placed_tribe_cannot_join_participation_batch() {
        let (backend, mut coordinator) = setup();
        backend.award(
            &ActivityId::from("act-1"),
            &TribeId::from("A"),
            &PointRuleId::from("1"),
            "Officer 9",
        );
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("2"))
            .expect("participation still open");

        let err = coordinator
            .pick_tribe(&TribeId::from("A"))
            .await
            .expect_err("placed tribe rejected");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::AlreadyPlaced { .. })
        ));
        assert!(matches!(
            coordinator.state(),
            SelectionState::BatchPending { tribes, .. } if tribes.is_empty()
        ));
    }

    #[tokio::test]
    async fn used_placement_rule_cannot_be_selected() {
        let (backend, mut coordinator) = setup();
        backend.award(
            &ActivityId::from("act-1"),
            &TribeId::from("B"),
            &PointRuleId::from("1"),
            "Officer 9",
        );
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");

        let err = coordinator
            .select_point_rule(&PointRuleId::from("1"))
            .expect_err("rule already used");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::RuleUnavailable { .. })
        ));
        assert_eq!(coordinator.state(), &SelectionState::Idle);
    }

    #[tokio::test]
    async fn failed_award_keeps_selector_open() {
        let (backend, mut coordinator) = setup();
        backend.reject_tribe(&TribeId::from("A"), "Tribe A is suspended");
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("1"))
            .expect("rule selectable");

        let err = coordinator
            .pick_tribe(&TribeId::from("A"))
            .await
            .expect_err("backend rejects");
        assert_eq!(
            err.notices(),
            vec![Notice::error("Tribe A is suspended")]
        );
        assert!(matches!(
            coordinator.state(),
            SelectionState::RuleSelected(rule) if rule.id == PointRuleId::from("1")
        ));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected_without_network() {
        let (backend, mut coordinator) = setup();
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("2"))
            .expect("rule selectable");
        let calls_before = backend.calls().len();

        let err = coordinator
            .save_participation_batch()
            .await
            .expect_err("empty batch");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::EmptyBatch)
        ));
        assert_eq!(backend.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn cancel_closes_selector() {
        let (_, mut coordinator) = setup();
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("1"))
            .expect("rule selectable");
        assert!(coordinator.state().selector_open());

        coordinator.cancel();
        assert_eq!(coordinator.state(), &SelectionState::Idle);
    }

    #[tokio::test]
    async fn staged_batch_defers_scored_tribes_to_the_save() {
        let (backend, mut coordinator) = setup();
        let activity = ActivityId::from("act-1");
        coordinator
            .open_activity(&activity)
            .await
            .expect("activity loads");
        backend.award(&activity, &TribeId::from("A"), &PointRuleId::from("2"), "Officer 9");
        coordinator.refresh_scores().await.expect("scores refetched");
        coordinator
            .select_point_rule(&PointRuleId::from("2"))
            .expect("rule selectable");

        let err = coordinator
            .stage_participation_batch([TribeId::from("B"), TribeId::from("Z")])
            .expect_err("unknown tribe");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::UnknownTribe(_))
        ));

        let pending = coordinator
            .stage_participation_batch([TribeId::from("A"), TribeId::from("B")])
            .expect("tribes staged");
        assert_eq!(pending, 2);

        let report = coordinator
            .save_participation_batch()
            .await
            .expect("batch saved");
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].tribe.id, TribeId::from("A"));
        assert_eq!(report.skipped[0].reason, SkipReason::AlreadyParticipated);
    }

    #[tokio::test]
    async fn staging_requires_a_participation_rule() {
        let (_, mut coordinator) = setup();
        coordinator
            .open_activity(&ActivityId::from("act-1"))
            .await
            .expect("activity loads");
        coordinator
            .select_point_rule(&PointRuleId::from("1"))
            .expect("rule selectable");

        let err = coordinator
            .stage_participation_batch([TribeId::from("A")])
            .expect_err("placement rule selected");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::NoRuleSelected)
        ));
    }

    #[tokio::test]
    async fn unknown_activity_is_a_validation_error() {
        let (_, mut coordinator) = setup();
        let err = coordinator
            .open_activity(&ActivityId::from("missing"))
            .await
            .expect_err("activity not assigned");
        assert!(matches!(
            err,
            ScoringError::Validation(ValidationError::UnknownActivity(_))
        ));
        assert!(coordinator.snapshot().is_none());
    }
}
