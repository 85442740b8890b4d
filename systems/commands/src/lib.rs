#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Factories producing the commands collaborators enqueue on the game controller.
//!
//! Every factory returns a [`Command`] that validates against the model it is
//! executed on and emits events through the [`GameContext`]. Nothing touches the
//! model directly; the reducer owns every transition.

use std::{fmt, str::FromStr};

use cow_game_controller::CommandContext;
use cow_game_core::{Address, Event, GameParameters, HorseId, Model, Npc, NpcId, Position};
use cow_game_world::{generate_world, GenerationError};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::debug;

/// Context handed to every game command.
pub type GameContext<'a> = CommandContext<'a, Model, Event>;

type Body = Box<dyn FnOnce(&mut GameContext<'_>) -> Result<(), CommandError>>;

/// Reasons a command refuses to run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `spawn_npc` ran while no NPC was queued.
    #[error("there are no NPCs left to spawn")]
    NoNpcsToSpawn,
    /// The command referenced an NPC that is not walking the streets.
    #[error("NPC {} is not alive", .0.get())]
    InvalidNpcId(NpcId),
    /// The requested world could not be generated.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Named, single-use unit of work executed by the game controller.
pub struct Command {
    name: &'static str,
    body: Body,
}

impl Command {
    /// Wraps `body` under `name`, which is what logs display.
    pub fn new<F>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(&mut GameContext<'_>) -> Result<(), CommandError> + 'static,
    {
        Self {
            name,
            body: Box::new(body),
        }
    }

    /// Name shown in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Executes the command against `context`.
    pub fn run(self, context: &mut GameContext<'_>) -> Result<(), CommandError> {
        (self.body)(context)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Kind of object the player tapped on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tappable {
    /// The player character; throws a horse.
    Player,
    /// Open terrain; sends the player there.
    Terrain,
}

/// Tag that names no known [`Tappable`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown tappable `{0}`")]
pub struct UnknownTappable(pub String);

impl FromStr for Tappable {
    type Err = UnknownTappable;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "player" => Ok(Self::Player),
            "terrain" => Ok(Self::Terrain),
            other => Err(UnknownTappable(other.to_owned())),
        }
    }
}

/// Generates a world for `parameters` and returns the command that starts it.
///
/// Generation happens here rather than when the command runs, so invalid
/// parameters are reported to the caller before anything is queued.
pub fn start_new_game(parameters: GameParameters) -> Result<Command, CommandError> {
    let mut rng = ChaCha8Rng::seed_from_u64(parameters.seed);
    let world = generate_world(&parameters, &mut rng)?;
    debug!(
        seed = parameters.seed,
        npcs = world.npcs.len(),
        spawnpoints = world.spawnpoints.len(),
        "generated world"
    );

    Ok(Command::new("start_new_game", move |context| {
        context.emit(Event::NewGameStarted {
            parameters,
            grid: world.grid,
            player_spawn: world.player_spawn,
            npcs_to_spawn: world.npcs,
        });
        Ok(())
    }))
}

/// Reacts to a tap on the object tagged `tag`; unknown tags do nothing.
#[must_use]
pub fn tap(tag: &str, position: Position) -> Command {
    match tag.parse::<Tappable>() {
        Ok(tappable) => tap_on(tappable, position),
        Err(unknown) => Command::new("tap", move |_| {
            debug!(%unknown, "ignoring tap");
            Ok(())
        }),
    }
}

/// Reacts to a tap on `tappable` at `position`.
#[must_use]
pub fn tap_on(tappable: Tappable, position: Position) -> Command {
    match tappable {
        Tappable::Player => Command::new("tap_player", emit_horse),
        Tappable::Terrain => Command::new("tap_terrain", move |context| {
            context.emit(Event::DestinationUpdated { position });
            Ok(())
        }),
    }
}

/// Throws a horse while a game is in progress.
#[must_use]
pub fn spawn_horse() -> Command {
    Command::new("spawn_horse", emit_horse)
}

fn emit_horse(context: &mut GameContext<'_>) -> Result<(), CommandError> {
    if !context.model().is_playing() {
        return Ok(());
    }
    let horse = HorseId::new(context.model().horses_spawned);
    context.emit(Event::HorseSpawned { horse });
    Ok(())
}

/// Lets the next queued NPC off the bus.
#[must_use]
pub fn spawn_npc() -> Command {
    Command::new("spawn_npc", |context| {
        let npc = context
            .model()
            .npcs_to_spawn
            .first()
            .cloned()
            .ok_or(CommandError::NoNpcsToSpawn)?;
        context.emit(Event::NpcSpawned { npc });
        Ok(())
    })
}

/// Records that NPC `id` reached its home.
#[must_use]
pub fn notify_npc_arrived_at_home(id: NpcId) -> Command {
    Command::new("notify_npc_arrived_at_home", move |context| {
        let npc = live_npc(context, id)?;
        let home = npc.home;
        context.emit(Event::NpcArrivedAtHome { npc, home });
        Ok(())
    })
}

/// Records that NPC `id` was hit by a horse.
#[must_use]
pub fn notify_npc_exploded(id: NpcId) -> Command {
    Command::new("notify_npc_exploded", move |context| {
        let npc = live_npc(context, id)?;
        let home = npc.home;
        context.emit(Event::NpcExploded { npc, home });
        Ok(())
    })
}

fn live_npc(context: &GameContext<'_>, id: NpcId) -> Result<Npc, CommandError> {
    context
        .model()
        .live_npc(id)
        .cloned()
        .ok_or(CommandError::InvalidNpcId(id))
}

/// Points the camera at NPC `id`.
#[must_use]
pub fn focus_on_npc(id: NpcId) -> Command {
    Command::new("focus_on_npc", move |context| {
        context.emit(Event::NpcFocused { npc: id });
        Ok(())
    })
}

/// Points the camera at the house on `address`.
#[must_use]
pub fn focus_on_house(address: Address) -> Command {
    Command::new("focus_on_house", move |context| {
        context.emit(Event::HouseFocused { house: address });
        Ok(())
    })
}

/// Finishes the game in progress.
#[must_use]
pub fn end_game() -> Command {
    Command::new("end_game", |context| {
        if context.model().is_playing() {
            context.emit(Event::GameEnded);
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tappable_tags_parse() {
        assert_eq!("player".parse::<Tappable>(), Ok(Tappable::Player));
        assert_eq!("terrain".parse::<Tappable>(), Ok(Tappable::Terrain));
        assert_eq!(
            "cow".parse::<Tappable>(),
            Err(UnknownTappable("cow".to_owned()))
        );
    }

    #[test]
    fn commands_debug_as_their_name() {
        assert_eq!(format!("{:?}", spawn_npc()), "spawn_npc");
        assert_eq!(format!("{:?}", tap("terrain", Position::default())), "tap_terrain");
        assert_eq!(tap("cow", Position::default()).name(), "tap");
    }
}
