//! Which point rules and tribes are still assignable for an activity.
//!
//! Everything here is a pure function of the latest fetched
//! `{scores, point rules, tribes}`; callers recompute after every fetch
//! instead of patching results locally.

use serde::Serialize;
use std::collections::HashSet;

use super::domain::{PointRule, PointRuleId, Score, Tribe, TribeId};

/// Score set classified by rule kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreIndex {
    pub placed: HashSet<TribeId>,
    pub participated: HashSet<TribeId>,
    pub used_rules: HashSet<PointRuleId>,
}

impl ScoreIndex {
    /// Scores whose rule is missing from `rules` are classified by their own
    /// `allows_all` column, and count as placements when that is absent too.
    pub fn build(scores: &[Score], rules: &[PointRule]) -> Self {
        let mut index = Self::default();
        for score in scores {
            let participation = rules
                .iter()
                .find(|rule| rule.id == score.point_rule_id)
                .map(PointRule::is_participation)
                .or(score.allows_all)
                .unwrap_or(false);

            if participation {
                index.participated.insert(score.tribe_id.clone());
            } else {
                index.placed.insert(score.tribe_id.clone());
            }
            index.used_rules.insert(score.point_rule_id.clone());
        }
        index
    }

    pub fn is_scored(&self, tribe: &TribeId) -> bool {
        self.placed.contains(tribe) || self.participated.contains(tribe)
    }
}

/// Point rules that can still be awarded, in configuration order.
pub fn assignable_rules(scores: &[Score], rules: &[PointRule], tribes: &[Tribe]) -> Vec<PointRule> {
    let index = ScoreIndex::build(scores, rules);
    let participation_open = tribes.iter().any(|tribe| !index.is_scored(&tribe.id));

    rules
        .iter()
        .filter(|rule| {
            if rule.is_participation() {
                participation_open
            } else {
                !index.used_rules.contains(&rule.id)
            }
        })
        .cloned()
        .collect()
}

/// Tribes holding neither a placement nor a participation score.
pub fn eligible_participation_tribes(
    scores: &[Score],
    rules: &[PointRule],
    tribes: &[Tribe],
) -> Vec<Tribe> {
    let index = ScoreIndex::build(scores, rules);
    tribes
        .iter()
        .filter(|tribe| !index.is_scored(&tribe.id))
        .cloned()
        .collect()
}

/// Tribes with no score at all, offered for single placements.
///
/// A tribe holding only a participation score is hidden here as well.
pub fn eligible_single_tribes(scores: &[Score], tribes: &[Tribe]) -> Vec<Tribe> {
    let scored: HashSet<&TribeId> = scores.iter().map(|score| &score.tribe_id).collect();
    tribes
        .iter()
        .filter(|tribe| !scored.contains(&tribe.id))
        .cloned()
        .collect()
}

/// Overall scoring state of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BoardStatus {
    /// No point rules are configured for the activity.
    Unconfigured,
    /// Rules exist but none can be awarded any more.
    Complete,
    Open { rules: Vec<PointRule> },
}

impl BoardStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Unconfigured => "Point rules must be configured before scoring",
            Self::Complete => "All scoring complete",
            Self::Open { .. } => "Scoring open",
        }
    }
}

pub fn board_status(scores: &[Score], rules: &[PointRule], tribes: &[Tribe]) -> BoardStatus {
    if rules.is_empty() {
        return BoardStatus::Unconfigured;
    }

    let rules = assignable_rules(scores, rules, tribes);
    if rules.is_empty() {
        BoardStatus::Complete
    } else {
        BoardStatus::Open { rules }
    }
}
