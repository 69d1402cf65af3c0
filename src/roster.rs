//! Student participation roster for an activity.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::gateway::{BackendClient, GatewayError};
use crate::scoring::domain::{ActivityId, OfficerId, ParticipationStatus, Participant, StudentId};

/// Roster filters; `search` matches names and student ids case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterFilter {
    pub status: Option<ParticipationStatus>,
    pub search: Option<String>,
}

impl RosterFilter {
    fn matches(&self, participant: &Participant) -> bool {
        if self.status.is_some_and(|status| participant.status != status) {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                participant.name.to_lowercase().contains(&needle)
                    || participant.student_id.0.to_lowercase().contains(&needle)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub student_id: StudentId,
    pub status: ParticipationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<String>,
}

pub struct Roster {
    client: BackendClient,
    activity_id: ActivityId,
    participants: Vec<Participant>,
}

impl Roster {
    pub async fn load(client: BackendClient, activity_id: ActivityId) -> Result<Self, GatewayError> {
        let participants = client.participants(&activity_id).await?;
        Ok(Self {
            client,
            activity_id,
            participants,
        })
    }

    pub fn activity_id(&self) -> &ActivityId {
        &self.activity_id
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn filtered(&self, filter: &RosterFilter) -> Vec<&Participant> {
        self.participants
            .iter()
            .filter(|participant| filter.matches(participant))
            .collect()
    }

    pub fn counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> = ParticipationStatus::ordered()
            .into_iter()
            .map(|status| (status.label(), 0))
            .collect();
        for participant in &self.participants {
            *counts.entry(participant.status.label()).or_default() += 1;
        }
        counts
    }

    /// Keeps the previous roster when the follow-up fetch fails.
    pub async fn refresh(&mut self) -> Result<(), GatewayError> {
        let participants = self.client.participants(&self.activity_id).await?;
        self.participants = participants;
        Ok(())
    }

    pub async fn update_status(
        &mut self,
        officer: &OfficerId,
        student: &StudentId,
        status: ParticipationStatus,
    ) -> Result<StatusUpdate, GatewayError> {
        let message = self
            .client
            .update_participation(officer, &self.activity_id, student, status)
            .await?;
        info!(activity = %self.activity_id, student = %student, %status, "participation updated");

        let refresh_error = match self.refresh().await {
            Ok(()) => None,
            Err(err) => {
                warn!(activity = %self.activity_id, error = %err, "roster refresh failed");
                Some(err.to_string())
            }
        };

        Ok(StatusUpdate {
            student_id: student.clone(),
            status,
            message,
            refresh_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryBackend;
    use std::sync::Arc;

    fn participant(id: &str, name: &str, status: ParticipationStatus) -> Participant {
        Participant {
            student_id: StudentId::from(id),
            name: name.to_string(),
            tribe_name: None,
            status,
        }
    }

    async fn roster() -> (Arc<MemoryBackend>, Roster) {
        let backend = Arc::new(MemoryBackend::new());
        let activity = ActivityId::from("act-9");
        backend.add_participants(
            &activity,
            [
                participant("2021-001", "Ana Reyes", ParticipationStatus::Pending),
                participant("2021-002", "Ben Cruz", ParticipationStatus::Participated),
                participant("2022-003", "Cara Lim", ParticipationStatus::Absent),
            ],
        );
        let roster = Roster::load(BackendClient::new(backend.clone()), activity)
            .await
            .expect("roster loads");
        (backend, roster)
    }

    #[tokio::test]
    async fn filters_by_status_and_search() {
        let (_, roster) = roster().await;

        let filter = RosterFilter {
            status: Some(ParticipationStatus::Participated),
            search: None,
        };
        assert_eq!(roster.filtered(&filter).len(), 1);

        let filter = RosterFilter {
            status: None,
            search: Some("2021".to_string()),
        };
        let names: Vec<&str> = roster
            .filtered(&filter)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Ana Reyes", "Ben Cruz"]);

        let counts = roster.counts();
        assert_eq!(counts["pending"], 1);
        assert_eq!(counts["unknown"], 0);
    }

    #[tokio::test]
    async fn update_status_refetches_roster() {
        let (backend, mut roster) = roster().await;
        let update = roster
            .update_status(
                &OfficerId::from("7"),
                &StudentId::from("2021-001"),
                ParticipationStatus::Participated,
            )
            .await
            .expect("update accepted");

        assert!(update.refresh_error.is_none());
        assert_eq!(backend.call_count("getActivityParticipants"), 2);
        assert_eq!(
            roster.participants()[0].status,
            ParticipationStatus::Participated
        );
    }

    #[tokio::test]
    async fn unknown_student_is_rejected() {
        let (_, mut roster) = roster().await;
        let err = roster
            .update_status(
                &OfficerId::from("7"),
                &StudentId::from("nobody"),
                ParticipationStatus::Absent,
            )
            .await
            .expect_err("student not registered");
        assert_eq!(
            err.user_message(),
            "Student is not registered for this activity"
        );
    }
}
