//! Tribe leaderboard built from the backend's ranking fields.
//!
//! Rank, points and ties are computed server side; this module only orders
//! and presents them.

use serde::Serialize;

use crate::gateway::{BackendClient, GatewayError};
use crate::scoring::domain::{Tribe, TribeId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub tribe_id: TribeId,
    pub name: String,
    pub rank: Option<u32>,
    pub points: i64,
    pub special_bonus: i64,
    pub total_scores: i64,
    pub tied_with: Vec<String>,
}

impl LeaderboardEntry {
    fn from_tribe(tribe: &Tribe) -> Self {
        Self {
            tribe_id: tribe.id.clone(),
            name: tribe.name.clone(),
            rank: tribe.rank,
            points: tribe.display_points.or(tribe.total_points).unwrap_or(0),
            special_bonus: tribe.special_bonus.unwrap_or(0),
            total_scores: tribe.total_scores.unwrap_or(0),
            tied_with: tribe.tied_with.clone(),
        }
    }

    pub fn is_tied(&self) -> bool {
        !self.tied_with.is_empty()
    }

    pub fn rank_label(&self) -> String {
        match (self.rank, self.is_tied()) {
            (Some(rank), false) => format!("#{rank}"),
            (Some(rank), true) => format!("#{rank} (tied with {})", self.tied_with.join(", ")),
            (None, _) => "unranked".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Leaderboard {
    entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Order tribes by backend rank; unranked tribes go last, ties by name.
    pub fn from_tribes(tribes: &[Tribe]) -> Self {
        let mut entries: Vec<LeaderboardEntry> =
            tribes.iter().map(LeaderboardEntry::from_tribe).collect();
        entries.sort_by(|a, b| {
            (a.rank.is_none(), a.rank, &a.name).cmp(&(b.rank.is_none(), b.rank, &b.name))
        });
        Self { entries }
    }

    pub async fn load(client: &BackendClient) -> Result<Self, GatewayError> {
        let tribes = client.tribes().await?;
        Ok(Self::from_tribes(&tribes))
    }

    pub fn entries(&self) -> &[LeaderboardEntry] {
        &self.entries
    }

    /// Every tribe sharing the best rank.
    pub fn leaders(&self) -> Vec<&LeaderboardEntry> {
        let Some(best) = self.entries.first().and_then(|entry| entry.rank) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .take_while(|entry| entry.rank == Some(best))
            .collect()
    }
}
