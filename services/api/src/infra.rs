use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tribe_tally::config::{BackendConfig, ConfigError};
use tribe_tally::error::AppError;
use tribe_tally::gateway::{BackendClient, HttpGateway, MemoryBackend};
use tribe_tally::rankings::Leaderboard;
use tribe_tally::roster::{Roster, RosterFilter, StatusUpdate};
use tribe_tally::scoring::{
    Activity, ActivityId, ActivitySnapshot, AwardReceipt, BatchReport, BoardStatus, Notice,
    OfficerId, ParticipationStatus, Participant, PickOutcome, PointRule, PointRuleId,
    RemovalReceipt, Score, ScoreId, ScoringCoordinator, ScoringError, SelectionState, StudentId,
    Tribe, TribeId, ValidationError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Entry point shared by the HTTP routes and the CLI commands. Every call
/// starts from a fresh fetch, so nothing is cached between requests.
#[derive(Clone)]
pub(crate) struct ScoringApi {
    client: BackendClient,
    officer: Option<OfficerId>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BoardView {
    pub(crate) activity: Activity,
    pub(crate) board: BoardStatus,
    pub(crate) point_rules: Vec<PointRule>,
    pub(crate) scores: Vec<Score>,
    pub(crate) tribes: Vec<Tribe>,
    pub(crate) eligible_participation_tribes: Vec<Tribe>,
    pub(crate) eligible_single_tribes: Vec<Tribe>,
}

impl BoardView {
    fn from_snapshot(snapshot: &ActivitySnapshot) -> Self {
        Self {
            activity: snapshot.activity.clone(),
            board: snapshot.status(),
            point_rules: snapshot.point_rules.clone(),
            scores: snapshot.scores.clone(),
            tribes: snapshot.tribes.clone(),
            eligible_participation_tribes: snapshot.eligible_participation_tribes(),
            eligible_single_tribes: snapshot.eligible_single_tribes(),
        }
    }

    pub(crate) fn tribe_name(&self, id: &TribeId) -> String {
        self.tribes
            .iter()
            .find(|tribe| &tribe.id == id)
            .map(|tribe| tribe.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn rule_label(&self, id: &PointRuleId) -> String {
        self.point_rules
            .iter()
            .find(|rule| &rule.id == id)
            .map(|rule| format!("{} ({} pts)", rule.place, rule.points))
            .unwrap_or_else(|| format!("rule {id}"))
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum AwardOutcome {
    Placement(AwardReceipt),
    Participation(BatchReport),
}

impl AwardOutcome {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        match self {
            Self::Placement(receipt) => receipt.notices(),
            Self::Participation(report) => report.notices(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub(crate) enum RemovalOutcome {
    AwaitingConfirmation { score: Score, prompt: String },
    Removed(RemovalReceipt),
}

impl RemovalOutcome {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        match self {
            Self::AwaitingConfirmation { prompt, .. } => vec![Notice::warning(prompt.clone())],
            Self::Removed(receipt) => receipt.notices(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RosterView {
    pub(crate) activity_id: ActivityId,
    pub(crate) counts: BTreeMap<&'static str, usize>,
    pub(crate) participants: Vec<Participant>,
}

impl ScoringApi {
    pub(crate) fn new(client: BackendClient, officer: Option<OfficerId>) -> Self {
        Self { client, officer }
    }

    pub(crate) fn has_officer(&self) -> bool {
        self.officer.is_some()
    }

    pub(crate) fn officer(&self) -> Result<OfficerId, AppError> {
        self.officer
            .clone()
            .ok_or_else(|| ConfigError::MissingOfficer.into())
    }

    fn coordinator(&self) -> Result<ScoringCoordinator, AppError> {
        Ok(ScoringCoordinator::new(self.client.clone(), self.officer()?))
    }

    pub(crate) async fn activities(&self) -> Result<Vec<Activity>, AppError> {
        Ok(self.client.activities(&self.officer()?).await?)
    }

    pub(crate) async fn board(&self, activity: &ActivityId) -> Result<BoardView, AppError> {
        let mut coordinator = self.coordinator()?;
        let snapshot = coordinator.open_activity(activity).await?;
        Ok(BoardView::from_snapshot(snapshot))
    }

    /// Award `rule` to `tribes`: a placement rule takes exactly one tribe and
    /// commits at once, a participation rule commits them as one batch.
    pub(crate) async fn award(
        &self,
        activity: &ActivityId,
        rule: &PointRuleId,
        tribes: &[TribeId],
    ) -> Result<AwardOutcome, AppError> {
        let mut coordinator = self.coordinator()?;
        coordinator.open_activity(activity).await?;
        let batch = matches!(
            coordinator.select_point_rule(rule)?,
            SelectionState::BatchPending { .. }
        );
        let tribes: BTreeSet<&TribeId> = tribes.iter().collect();

        if batch {
            coordinator.stage_participation_batch(tribes.into_iter().cloned())?;
            let report = coordinator.save_participation_batch().await?;
            return Ok(AwardOutcome::Participation(report));
        }

        let count = tribes.len();
        let tribe = match tribes.into_iter().next() {
            Some(tribe) if count == 1 => tribe,
            _ => {
                let err = ValidationError::SingleTribeRequired { count };
                return Err(ScoringError::from(err).into());
            }
        };
        match coordinator.pick_tribe(tribe).await? {
            PickOutcome::Awarded(receipt) => Ok(AwardOutcome::Placement(receipt)),
            PickOutcome::Selected { .. } | PickOutcome::Deselected { .. } => {
                Err(ScoringError::from(ValidationError::NoRuleSelected).into())
            }
        }
    }

    /// Two-step removal. Without `confirmed` only the pending request is
    /// described and the backend is never asked to delete anything.
    pub(crate) async fn remove(
        &self,
        activity: &ActivityId,
        score: &ScoreId,
        confirmed: bool,
    ) -> Result<RemovalOutcome, AppError> {
        let mut coordinator = self.coordinator()?;
        let board = BoardView::from_snapshot(coordinator.open_activity(activity).await?);
        let score = coordinator.request_removal(score)?.clone();

        if !confirmed {
            let prompt = format!(
                "Remove {} from {}? Confirm to delete the score.",
                board.rule_label(&score.point_rule_id),
                board.tribe_name(&score.tribe_id)
            );
            return Ok(RemovalOutcome::AwaitingConfirmation { score, prompt });
        }

        let receipt = coordinator.confirm_removal().await?;
        Ok(RemovalOutcome::Removed(receipt))
    }

    pub(crate) async fn rankings(&self) -> Result<Leaderboard, AppError> {
        Ok(Leaderboard::load(&self.client).await?)
    }

    pub(crate) async fn roster(
        &self,
        activity: &ActivityId,
        filter: &RosterFilter,
    ) -> Result<RosterView, AppError> {
        let roster = Roster::load(self.client.clone(), activity.clone()).await?;
        Ok(RosterView {
            activity_id: activity.clone(),
            counts: roster.counts(),
            participants: roster.filtered(filter).into_iter().cloned().collect(),
        })
    }

    pub(crate) async fn update_participation(
        &self,
        activity: &ActivityId,
        student: &StudentId,
        status: ParticipationStatus,
    ) -> Result<StatusUpdate, AppError> {
        let officer = self.officer()?;
        let mut roster = Roster::load(self.client.clone(), activity.clone()).await?;
        Ok(roster.update_status(&officer, student, status).await?)
    }
}

/// Scoring entry point backed by the PHP routes. An explicit `officer` wins
/// over the configured one.
pub(crate) fn remote_api(
    config: &BackendConfig,
    officer: Option<OfficerId>,
) -> Result<ScoringApi, AppError> {
    let gateway = HttpGateway::new(config)?;
    Ok(ScoringApi::new(
        BackendClient::new(Arc::new(gateway)),
        officer.or_else(|| config.officer_id.clone()),
    ))
}

pub(crate) const DEMO_OFFICER: &str = "7";

/// Backend seeded with a small field day: one scorable activity, one without
/// point rules, five ranked tribes, and a short roster.
pub(crate) fn demo_backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());

    backend.add_activity(
        Activity {
            location: Some("North Field".to_string()),
            event_title: Some("Foundation Week".to_string()),
            ..Activity::new("1", "Tribe Relay")
        },
        vec![
            PointRule::placement("1", "1st", 50),
            PointRule::placement("2", "2nd", 30),
            PointRule::placement("3", "3rd", 20),
            PointRule::participation("4", "Participation", 10),
        ],
    );
    backend.add_activity(Activity::new("2", "Cheer Dance"), Vec::new());

    backend.add_tribes([
        ranked("1", "Red Hawks", Some(1), 120, &[]),
        ranked("2", "Blue Owls", Some(2), 95, &["Green Vipers"]),
        ranked("3", "Green Vipers", Some(2), 95, &["Blue Owls"]),
        ranked("4", "Gold Lions", Some(4), 60, &[]),
        ranked("5", "Silver Wolves", None, 0, &[]),
    ]);

    backend.add_participants(
        &ActivityId::from("1"),
        [
            student("2023-0001", "Ana Reyes", "Red Hawks", ParticipationStatus::Participated),
            student("2023-0002", "Ben Cruz", "Blue Owls", ParticipationStatus::Pending),
            student("2023-0003", "Cara Lim", "Green Vipers", ParticipationStatus::Absent),
            student("2023-0004", "Dan Uy", "Gold Lions", ParticipationStatus::Pending),
        ],
    );

    backend
}

fn ranked(id: &str, name: &str, rank: Option<u32>, points: i64, tied_with: &[&str]) -> Tribe {
    Tribe {
        rank,
        display_points: Some(points),
        total_points: Some(points),
        tied_with: tied_with.iter().map(|name| name.to_string()).collect(),
        ..Tribe::new(id, name)
    }
}

fn student(id: &str, name: &str, tribe: &str, status: ParticipationStatus) -> Participant {
    Participant {
        student_id: StudentId::from(id),
        name: name.to_string(),
        tribe_name: Some(tribe.to_string()),
        status,
    }
}

#[cfg(test)]
pub(crate) fn demo_api() -> (ScoringApi, Arc<MemoryBackend>) {
    let backend = demo_backend();
    let api = ScoringApi::new(
        BackendClient::new(backend.clone()),
        Some(OfficerId::from(DEMO_OFFICER)),
    );
    (api, backend)
}
