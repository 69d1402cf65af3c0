use crate::console::{render_board, render_notices, render_rankings, render_roster};
use crate::infra::{demo_backend, ScoringApi, DEMO_OFFICER};
use clap::Args;
use tribe_tally::carousel::Carousel;
use tribe_tally::error::AppError;
use tribe_tally::gateway::BackendClient;
use tribe_tally::roster::RosterFilter;
use tribe_tally::scoring::{
    ActivityId, OfficerId, ParticipationStatus, PickOutcome, PointRuleId, ScoringCoordinator,
    StudentId, TribeId,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Viewport width in pixels used to page the tribe cards
    #[arg(long, default_value_t = 1024)]
    pub(crate) width: u32,
    /// Skip the participation roster portion of the demo
    #[arg(long)]
    pub(crate) skip_roster: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { width, skip_roster } = args;
    let backend = demo_backend();
    let client = BackendClient::new(backend.clone());
    let officer = OfficerId::from(DEMO_OFFICER);
    let api = ScoringApi::new(client.clone(), Some(officer.clone()));
    let activity = ActivityId::from("1");

    println!("Tribe scoring demo (officer {officer})\n");
    render_board(&api.board(&activity).await?);

    println!("\n== Awarding 1st place ==");
    let mut coordinator = ScoringCoordinator::new(client, officer);
    coordinator.open_activity(&activity).await?;
    coordinator.select_point_rule(&PointRuleId::from("1"))?;
    if let PickOutcome::Awarded(receipt) = coordinator.pick_tribe(&TribeId::from("1")).await? {
        render_notices(&receipt.notices());
    }

    println!("\n== Participation batch ==");
    coordinator.select_point_rule(&PointRuleId::from("4"))?;
    for tribe in ["2", "3", "5"] {
        if let PickOutcome::Selected { tribe, pending } =
            coordinator.pick_tribe(&TribeId::from(tribe)).await?
        {
            println!("Selected tribe {tribe} ({pending} pending)");
        }
    }
    // Another officer places tribe 3 before this batch is saved.
    backend.award(
        &activity,
        &TribeId::from("3"),
        &PointRuleId::from("2"),
        "Officer 12",
    );
    println!("Another officer awarded 2nd place to tribe 3 in the meantime");
    let report = coordinator.save_participation_batch().await?;
    render_notices(&report.notices());

    println!("\n== Removing a score ==");
    let removable = coordinator
        .snapshot()
        .and_then(|snapshot| snapshot.scores.first())
        .map(|score| score.id.clone());
    if let Some(score_id) = removable {
        let score = coordinator.request_removal(&score_id)?;
        println!(
            "Pending removal of score {} for tribe {}",
            score.id, score.tribe_id
        );
        let receipt = coordinator.confirm_removal().await?;
        render_notices(&receipt.notices());
    }

    if let Some(snapshot) = coordinator.snapshot() {
        println!("\n== Tribe cards ({}px viewport) ==", width);
        let names: Vec<&str> = snapshot
            .tribes
            .iter()
            .map(|tribe| tribe.name.as_str())
            .collect();
        let mut carousel = Carousel::new(names.len(), width);
        loop {
            let range = carousel.visible_range();
            println!(
                "{}-{} of {}: {}",
                range.start + 1,
                range.end,
                names.len(),
                carousel.visible(&names).join(" | ")
            );
            if !carousel.next() {
                break;
            }
        }
    }

    println!();
    render_rankings(&api.rankings().await?);

    if !skip_roster {
        println!();
        let update = api
            .update_participation(
                &activity,
                &StudentId::from("2023-0004"),
                ParticipationStatus::Participated,
            )
            .await?;
        println!("{}: {}", update.student_id, update.message);
        render_roster(&api.roster(&activity, &RosterFilter::default()).await?);
    }

    Ok(())
}
