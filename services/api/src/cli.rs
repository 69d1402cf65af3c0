use crate::console::{self, AwardArgs, BoardArgs, RemoveArgs, RosterArgs};
use crate::demo::{run_demo, DemoArgs};
use crate::infra::{remote_api, ScoringApi};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tribe_tally::config::AppConfig;
use tribe_tally::error::AppError;
use tribe_tally::scoring::OfficerId;

#[derive(Parser, Debug)]
#[command(
    name = "Tribe Tally",
    about = "Award and review tribe points for campus activities",
    version
)]
struct Cli {
    /// Officer account used for scoring (overrides TALLY_OFFICER_ID)
    #[arg(long, global = true)]
    officer: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// List the activities assigned to the officer
    Activities,
    /// Show point rules, scores and eligible tribes for an activity
    Board(BoardArgs),
    /// Award a point rule to one tribe, or to several for participation
    Award(AwardArgs),
    /// Remove a recorded score (asks for --yes before deleting)
    Remove(RemoveArgs),
    /// Show the tribe leaderboard
    Rankings,
    /// List registered students and their participation status
    Roster(RosterArgs),
    /// Walk through a scoring session against an in-memory backend
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let officer = cli
        .officer
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(OfficerId);
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args, officer).await,
        Command::Demo(args) => run_demo(args).await,
        Command::Activities => console::list_activities(&connect(officer)?).await,
        Command::Board(args) => console::show_board(&connect(officer)?, args).await,
        Command::Award(args) => console::award(&connect(officer)?, args).await,
        Command::Remove(args) => console::remove(&connect(officer)?, args).await,
        Command::Rankings => console::show_rankings(&connect(officer)?).await,
        Command::Roster(args) => console::show_roster(&connect(officer)?, args).await,
    }
}

fn connect(officer: Option<OfficerId>) -> Result<ScoringApi, AppError> {
    let config = AppConfig::load()?;
    remote_api(&config.backend, officer)
}
