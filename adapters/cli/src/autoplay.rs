//! Scripted player that drives a headless game to completion.

use std::{collections::BTreeMap, time::Duration};

use cow_game_core::{Address, Event, GameParameters, GameState, NpcId, Position, Score};
use cow_game_system_commands::{
    focus_on_npc, notify_npc_arrived_at_home, notify_npc_exploded, start_new_game, tap,
};
use cow_game_system_game::{GameChange, GameController, GameOverWatcher, NpcSpawner};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, warn};

/// Probability of throwing a horse on any step with NPCs on the streets.
const HORSE_CHANCE: f64 = 0.15;
/// Mixed into the game seed so the player's choices differ from world generation.
const PLAYER_SEED_SALT: u64 = 0x00c0_ffee;

/// Format used for printed change-events and the summary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Output {
    /// Human readable lines.
    Text,
    /// One JSON document per line.
    Json,
}

/// Outcome of an autoplay session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct Summary {
    seed: u64,
    steps: u32,
    finished: bool,
    version: u64,
    score: Score,
    houses_won: Vec<Address>,
    houses_lost: Vec<Address>,
}

impl Summary {
    pub(crate) fn print(&self, output: Output) -> anyhow::Result<()> {
        match output {
            Output::Json => {
                #[derive(Serialize)]
                struct Line<'a> {
                    summary: &'a Summary,
                }
                println!("{}", serde_json::to_string(&Line { summary: self })?);
            }
            Output::Text => {
                let outcome = if self.finished { "game over" } else { "unfinished" };
                println!(
                    "{outcome} after {} steps: {} points, {} houses won, {} lost, {} horses thrown",
                    self.steps,
                    self.score.points,
                    self.score.houses_won,
                    self.score.houses_lost,
                    self.score.horses_spawned,
                );
            }
        }
        Ok(())
    }
}

/// Headless game with a scripted player attached.
pub(crate) struct Autoplay {
    game: GameController,
    spawner: NpcSpawner,
    watcher: GameOverWatcher,
    rng: ChaCha8Rng,
    step: Duration,
    seed: u64,
    progress: BTreeMap<NpcId, usize>,
}

impl Autoplay {
    /// Generates the world, attaches the behaviours, and starts the game.
    pub(crate) fn new(
        parameters: GameParameters,
        step: Duration,
        output: Output,
    ) -> anyhow::Result<Self> {
        let game = GameController::new();
        let _ = game.subscribe_events(move |change| print_change(change, output));
        let spawner = NpcSpawner::start(&game);
        let watcher = GameOverWatcher::start(&game);

        let seed = parameters.seed;
        game.enqueue_command(start_new_game(parameters)?)?;

        let autoplay = Self {
            game,
            spawner,
            watcher,
            rng: ChaCha8Rng::seed_from_u64(seed ^ PLAYER_SEED_SALT),
            step,
            seed,
            progress: BTreeMap::new(),
        };
        autoplay.deliver();
        Ok(autoplay)
    }

    /// Plays until the game ends or `max_steps` have passed.
    pub(crate) fn run(mut self, max_steps: u32) -> anyhow::Result<Summary> {
        let mut steps = 0;
        while steps < max_steps && self.game.model().game_state != GameState::GameOver {
            steps += 1;
            self.play_step()?;
        }

        let model = self.game.model();
        let finished = model.game_state == GameState::GameOver;
        if !finished {
            warn!(steps, "stopped before the game ended");
        }
        self.spawner.dispose();
        self.watcher.dispose();

        Ok(Summary {
            seed: self.seed,
            steps,
            finished,
            version: self.game.version(),
            score: model.score,
            houses_won: model.houses_won.clone(),
            houses_lost: model.houses_lost.clone(),
        })
    }

    fn play_step(&mut self) -> anyhow::Result<()> {
        let _ = self.spawner.advance(self.step)?;
        self.deliver();

        let model = self.game.model();
        self.progress.retain(|id, _| model.live_npc(*id).is_some());
        for npc in &model.npcs {
            let position = self.progress.entry(npc.id).or_insert(0);
            *position += 1;
            if *position + 1 >= npc.route.len() {
                self.game.enqueue_command(notify_npc_arrived_at_home(npc.id))?;
            }
        }
        self.deliver();

        let model = self.game.model();
        if model.npcs.is_empty() || !self.rng.gen_bool(HORSE_CHANCE) {
            return Ok(());
        }
        let Some(target) = model.npcs.choose(&mut self.rng) else {
            return Ok(());
        };
        let step = self.progress.get(&target.id).copied().unwrap_or(0);
        let spot = target
            .route
            .get(step)
            .copied()
            .unwrap_or(target.spawn_address);
        debug!(npc = target.id.get(), ?spot, "throwing a horse");

        self.game.enqueue_command(focus_on_npc(target.id))?;
        self.game.enqueue_command(tap("terrain", Position::from(spot)))?;
        self.game
            .enqueue_command(tap("player", Position::from(model.player_spawn)))?;
        self.game.enqueue_command(notify_npc_exploded(target.id))?;
        self.deliver();

        Ok(())
    }

    fn deliver(&self) {
        pollster::block_on(self.game.deliver_events());
    }
}

fn print_change(change: &GameChange, output: Output) -> anyhow::Result<()> {
    match output {
        Output::Json => {
            #[derive(Serialize)]
            struct Line<'a> {
                version: u64,
                event: &'a Event,
            }
            let line = Line {
                version: change.version,
                event: &change.event,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        Output::Text => {
            println!(
                "v{:<4} {:<18} {}",
                change.version,
                change.event.kind().name(),
                describe(&change.event)
            );
        }
    }
    Ok(())
}

fn describe(event: &Event) -> String {
    let at = |address: &Address| format!("({}, {})", address.x(), address.y());
    match event {
        Event::NewGameStarted {
            grid,
            player_spawn,
            npcs_to_spawn,
            ..
        } => format!(
            "{}x{} town, {} NPCs on the bus, player at {}",
            grid.width(),
            grid.height(),
            npcs_to_spawn.len(),
            at(player_spawn)
        ),
        Event::DestinationUpdated { position } => {
            format!("player heading to ({:.1}, {:.1})", position.x, position.y)
        }
        Event::HorseSpawned { horse } => format!("horse #{} thrown", horse.get()),
        Event::NpcSpawned { npc } => format!(
            "NPC {} stepped off at {}, {} steps from home",
            npc.id.get(),
            at(&npc.spawn_address),
            npc.route.len().saturating_sub(1)
        ),
        Event::NpcArrivedAtHome { npc, home } => {
            format!("NPC {} made it home to {}; house lost", npc.id.get(), at(home))
        }
        Event::NpcExploded { npc, home } => {
            format!("NPC {} exploded; house {} saved", npc.id.get(), at(home))
        }
        Event::NpcFocused { npc } => format!("camera follows NPC {}", npc.get()),
        Event::HouseFocused { house } => format!("camera on house {}", at(house)),
        Event::GameEnded => "every house resolved".to_owned(),
    }
}
