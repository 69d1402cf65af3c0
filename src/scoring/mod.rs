//! Tribe scoring for campus event activities.

mod coordinator;
pub mod domain;
pub mod eligibility;
mod notice;

pub use coordinator::{
    ActivitySnapshot, AwardReceipt, BatchReport, FailedTribe, PickOutcome, RemovalReceipt,
    ScoringCoordinator, ScoringError, SelectionState, SkipReason, SkippedTribe, ValidationError,
};
pub use domain::{
    Activity, ActivityId, OfficerId, ParticipationStatus, Participant, PointRule, PointRuleId,
    Score, ScoreId, StudentId, Tribe, TribeId,
};
pub use eligibility::{
    assignable_rules, board_status, eligible_participation_tribes, eligible_single_tribes,
    BoardStatus, ScoreIndex,
};
pub use notice::{Notice, NoticeLevel};
