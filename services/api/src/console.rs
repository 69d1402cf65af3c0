use crate::infra::{AwardOutcome, BoardView, RemovalOutcome, RosterView, ScoringApi};
use clap::Args;
use tribe_tally::error::AppError;
use tribe_tally::rankings::Leaderboard;
use tribe_tally::roster::RosterFilter;
use tribe_tally::scoring::{
    ActivityId, BoardStatus, Notice, ParticipationStatus, PointRuleId, ScoreId, Tribe, TribeId,
};

#[derive(Args, Debug)]
pub(crate) struct BoardArgs {
    /// Activity id
    #[arg(long)]
    pub(crate) activity: String,
}

#[derive(Args, Debug)]
pub(crate) struct AwardArgs {
    /// Activity id
    #[arg(long)]
    pub(crate) activity: String,
    /// Point rule id to award
    #[arg(long)]
    pub(crate) rule: String,
    /// Tribe id; repeat for participation batches
    #[arg(long = "tribe", required = true)]
    pub(crate) tribes: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RemoveArgs {
    /// Activity id
    #[arg(long)]
    pub(crate) activity: String,
    /// Score id to remove
    #[arg(long)]
    pub(crate) score: String,
    /// Confirm the removal; without it the score is only described
    #[arg(long)]
    pub(crate) yes: bool,
}

#[derive(Args, Debug)]
pub(crate) struct RosterArgs {
    /// Activity id
    #[arg(long)]
    pub(crate) activity: String,
    /// Only show students with this status (pending, participated, absent)
    #[arg(long, value_parser = parse_status)]
    pub(crate) status: Option<ParticipationStatus>,
    /// Match student names or ids
    #[arg(long)]
    pub(crate) search: Option<String>,
}

pub(crate) fn parse_status(raw: &str) -> Result<ParticipationStatus, String> {
    raw.parse()
}

pub(crate) async fn list_activities(api: &ScoringApi) -> Result<(), AppError> {
    let activities = api.activities().await?;
    if activities.is_empty() {
        println!("No activities are assigned to this officer.");
        return Ok(());
    }

    println!("Assigned activities");
    for activity in activities {
        let when = activity
            .starts_at
            .map(|start| start.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "unscheduled".to_string());
        let place = activity.location.as_deref().unwrap_or("no location");
        println!("- [{}] {} ({when}, {place})", activity.id, activity.name);
    }
    Ok(())
}

pub(crate) async fn show_board(api: &ScoringApi, args: BoardArgs) -> Result<(), AppError> {
    let board = api.board(&ActivityId(args.activity)).await?;
    render_board(&board);
    Ok(())
}

pub(crate) async fn award(api: &ScoringApi, args: AwardArgs) -> Result<(), AppError> {
    let tribes: Vec<TribeId> = args.tribes.into_iter().map(TribeId).collect();
    let outcome = api
        .award(&ActivityId(args.activity), &PointRuleId(args.rule), &tribes)
        .await?;
    render_notices(&outcome.notices());

    if let AwardOutcome::Participation(report) = &outcome {
        for failure in &report.failed {
            println!("  {}: {}", failure.tribe.name, failure.message);
        }
    }
    Ok(())
}

pub(crate) async fn remove(api: &ScoringApi, args: RemoveArgs) -> Result<(), AppError> {
    let outcome = api
        .remove(&ActivityId(args.activity), &ScoreId(args.score), args.yes)
        .await?;
    render_notices(&outcome.notices());
    if matches!(outcome, RemovalOutcome::AwaitingConfirmation { .. }) {
        println!("Re-run with --yes to delete the score.");
    }
    Ok(())
}

pub(crate) async fn show_rankings(api: &ScoringApi) -> Result<(), AppError> {
    let leaderboard = api.rankings().await?;
    render_rankings(&leaderboard);
    Ok(())
}

pub(crate) async fn show_roster(api: &ScoringApi, args: RosterArgs) -> Result<(), AppError> {
    let filter = RosterFilter {
        status: args.status,
        search: args.search,
    };
    let roster = api.roster(&ActivityId(args.activity), &filter).await?;
    render_roster(&roster);
    Ok(())
}

pub(crate) fn render_notices(notices: &[Notice]) {
    for notice in notices {
        println!("{notice}");
    }
}

pub(crate) fn render_board(board: &BoardView) {
    let activity = &board.activity;
    match &activity.event_title {
        Some(event) => println!("{} / {} (activity {})", event, activity.name, activity.id),
        None => println!("{} (activity {})", activity.name, activity.id),
    }
    println!("Status: {}", board.board.label());

    if !board.point_rules.is_empty() {
        println!("\nPoint rules");
        let open: &[_] = match &board.board {
            BoardStatus::Open { rules } => rules.as_slice(),
            BoardStatus::Unconfigured | BoardStatus::Complete => &[],
        };
        for rule in &board.point_rules {
            let kind = if rule.is_participation() {
                "participation"
            } else {
                "placement"
            };
            let availability = if open.contains(rule) {
                "available"
            } else {
                "awarded"
            };
            println!(
                "- [{}] {} ({} pts, {kind}): {availability}",
                rule.id, rule.place, rule.points
            );
        }
    }

    println!("\nScores");
    if board.scores.is_empty() {
        println!("- none yet");
    }
    for score in &board.scores {
        let officer = score.awarded_by.as_deref().unwrap_or("unknown officer");
        println!(
            "- [{}] {}: {} by {officer}",
            score.id,
            board.tribe_name(&score.tribe_id),
            board.rule_label(&score.point_rule_id)
        );
    }

    let names = |tribes: &[Tribe]| {
        tribes
            .iter()
            .map(|tribe| tribe.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!(
        "\nEligible for a placement: {}",
        names(&board.eligible_single_tribes)
    );
    println!(
        "Eligible for participation: {}",
        names(&board.eligible_participation_tribes)
    );
}

pub(crate) fn render_rankings(leaderboard: &Leaderboard) {
    println!("Tribe rankings");
    for entry in leaderboard.entries() {
        let bonus = if entry.special_bonus > 0 {
            format!(", +{} bonus", entry.special_bonus)
        } else {
            String::new()
        };
        println!(
            "{:<28} {:<18} {} pts across {} score(s){bonus}",
            entry.rank_label(),
            entry.name,
            entry.points,
            entry.total_scores
        );
    }
}

pub(crate) fn render_roster(roster: &RosterView) {
    let counts: Vec<String> = roster
        .counts
        .iter()
        .map(|(label, count)| format!("{label}: {count}"))
        .collect();
    println!("Roster for activity {} ({})", roster.activity_id, counts.join(", "));
    for participant in &roster.participants {
        let tribe = participant.tribe_name.as_deref().unwrap_or("no tribe");
        println!(
            "- {} {} [{tribe}] {}",
            participant.student_id, participant.name, participant.status
        );
    }
}
