#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless command-line driver that plays a scripted round of the cow game.

mod autoplay;

use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use cow_game_core::GameParameters;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::autoplay::{Autoplay, Output};

/// Plays a seeded cow game to completion and prints every change-event.
#[derive(Debug, Parser)]
#[command(name = "cow-game", version)]
struct Cli {
    /// Seed for world generation and the autoplayer's choices.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Grid columns.
    #[arg(long, default_value_t = 10)]
    width: u32,
    /// Grid rows.
    #[arg(long, default_value_t = 10)]
    height: u32,
    /// NPCs queued at the start of the game.
    #[arg(long, default_value_t = 5)]
    npcs: usize,
    /// Bus stops the NPCs are spread across.
    #[arg(long, default_value_t = 3)]
    spawnpoints: usize,
    /// Simulated milliseconds per autoplay step.
    #[arg(long, default_value_t = 500)]
    step_ms: u64,
    /// Steps played before giving up on reaching game over.
    #[arg(long, default_value_t = 1_000)]
    max_steps: u32,
    /// Print JSON lines instead of text.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn parameters(&self) -> GameParameters {
        GameParameters {
            seed: self.seed,
            width: self.width,
            height: self.height,
            npc_count: self.npcs,
            spawnpoint_count: self.spawnpoints,
            ..GameParameters::default()
        }
    }

    fn output(&self) -> Output {
        if self.json {
            Output::Json
        } else {
            Output::Text
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let step = Duration::from_millis(cli.step_ms);
    let autoplay = Autoplay::new(cli.parameters(), step, cli.output())
        .context("failed to start a new game")?;
    let summary = autoplay.run(cli.max_steps)?;
    summary.print(cli.output())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_game_parameters() {
        let cli = Cli::try_parse_from([
            "cow-game",
            "--seed",
            "9",
            "--width",
            "13",
            "--npcs",
            "2",
            "--step-ms",
            "250",
            "--json",
        ])
        .expect("valid flags");

        let parameters = cli.parameters();
        assert_eq!(parameters.seed, 9);
        assert_eq!(parameters.width, 13);
        assert_eq!(parameters.height, 10);
        assert_eq!(parameters.npc_count, 2);
        assert_eq!(parameters.spawnpoint_count, 3);
        assert_eq!(cli.step_ms, 250);
        assert_eq!(cli.max_steps, 1_000);
        assert_eq!(cli.output(), Output::Json);
    }

    #[test]
    fn unknown_flags_are_rejected() {
        assert!(Cli::try_parse_from(["cow-game", "--cows", "3"]).is_err());
    }
}
