use anyhow::{bail, Context, Result};
use dsa_sheet_tracker::commands::{self, TrackerState};
use dsa_sheet_tracker::config::TrackerConfig;
use dsa_sheet_tracker::utils::init_logging;
use log::info;
use serde::Serialize;

const USAGE: &str = "usage: dsa-sheet-tracker [progress | topics | random <user> | records <user> | toggle <user> <problem-id>]";

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn sign_in(state: &TrackerState, user: Option<String>) -> Result<()> {
    let user = user.context(USAGE)?;
    let session = commands::sign_in(state, user).await?;
    info!("{} has {} practiced problems", session.user_id, session.practiced_count);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = TrackerConfig::from_env()?;
    init_logging(config.log_level)?;
    info!(
        "dsa-sheet-tracker {} on {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    let state = TrackerState::from_config(&config)?;
    commands::load_catalog(&state).await?;

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "progress".to_string());
    match command.as_str() {
        "progress" => print_json(&commands::progress_stats(&state).await?),
        "topics" => print_json(&commands::grouped_problems(&state).await?),
        "random" => {
            sign_in(&state, args.next()).await?;
            print_json(&commands::random_problem(&state).await?)
        }
        "records" => {
            sign_in(&state, args.next()).await?;
            print_json(&commands::practiced_records(&state).await?)
        }
        "toggle" => {
            sign_in(&state, args.next()).await?;
            let problem_id = args.next().context(USAGE)?;
            let practiced = commands::toggle_practiced(&state, problem_id.clone()).await?;
            println!("{} {}", problem_id, if practiced { "practiced" } else { "not practiced" });
            Ok(())
        }
        other => bail!("unknown command {}\n{}", other, USAGE),
    }
}
