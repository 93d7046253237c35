use std::sync::Arc;

use api_types::Role;
use clap::Parser;
use eyre::WrapErr;
use manhunt_core::{
    clock::SystemClock,
    game::{GameRules, Outcome, SessionRequest},
    relay::HttpRelayClient,
    runner::{SessionDeps, SessionEvent, SessionRunner},
};
use tracing_subscriber::EnvFilter;

mod provider;
mod sink;

use provider::StdinProvider;
use sink::LogSink;

#[derive(Parser, Debug)]
#[command(
    name = "manhunt-client",
    version,
    about = "Play manhunt from a terminal",
    long_about = "Joins a game on a relay and plays it headless. Position fixes are read \
                  from stdin as `lat,lon,accuracy` lines; map markers and game events are \
                  written to the log."
)]
struct Args {
    /// Base URL of the relay
    #[arg(long, env = "MANHUNT_RELAY_URL", default_value = "http://localhost:8787")]
    relay_url: String,

    /// Display name
    #[arg(short, long)]
    name: String,

    /// Game code shared by everyone in the match
    #[arg(short, long)]
    game_code: String,

    /// `hunter` or `hunted`
    #[arg(short, long)]
    role: Role,

    /// Seconds between relay polls
    #[arg(long, default_value_t = 5)]
    poll_interval: u64,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::FixAccepted { fix, quality } => {
            tracing::debug!(accuracy = fix.accuracy, %quality, "position accepted");
        }
        SessionEvent::FixRejected { accuracy } => {
            tracing::warn!(accuracy, "GPS accuracy too low, keeping previous position");
        }
        SessionEvent::ProviderFailed(error) => tracing::warn!(%error, "location error"),
        SessionEvent::RelayFailed(error) => tracing::warn!(%error, "relay unreachable, retrying next cycle"),
        SessionEvent::PlayerCount(count) => tracing::debug!(count, "players in game"),
        SessionEvent::OpponentsVisible(count) => tracing::debug!(count, "opponents visible"),
        SessionEvent::Countdown(countdown) => {
            if countdown.remaining_ms % 60_000 < 1_000 {
                tracing::info!(remaining = %countdown, "time left");
            }
        }
        SessionEvent::Ended(outcome) => tracing::info!("{}", outcome.message()),
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if args.verbose { "debug" } else { "info" })
        }))
        .init();

    let relay = HttpRelayClient::new(&args.relay_url).wrap_err("invalid relay url")?;
    let rules = GameRules {
        poll_interval_ms: args.poll_interval.max(1) * 1000,
        ..GameRules::default()
    };

    let request = SessionRequest {
        player_name: args.name,
        game_code: args.game_code,
        role: Some(args.role),
    };
    let deps = SessionDeps {
        provider: Arc::new(StdinProvider),
        relay: Arc::new(relay),
        sink: Box::new(LogSink),
        clock: Arc::new(SystemClock),
    };

    let (mut runner, mut events) = SessionRunner::start(&request, rules, deps)?;
    let identity = runner.identity();
    tracing::info!(
        player_id = %identity.player_id,
        game_code = %identity.game_code,
        role = %identity.role,
        "joined game; enter fixes as `lat,lon,accuracy`"
    );

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(SessionEvent::Ended(outcome)) => {
                    log_event(&SessionEvent::Ended(outcome));
                    break runner.finished().await;
                }
                Some(event) => log_event(&event),
                None => break runner.finished().await,
            },
            _ = tokio::signal::ctrl_c() => {
                let outcome = runner.leave();
                log_event(&SessionEvent::Ended(outcome.clone()));
                break outcome;
            }
        }
    };

    if let Outcome::Victory { opponent_name, .. } = &outcome {
        tracing::info!(opponent = %opponent_name, "hunter wins");
    }
    Ok(())
}
