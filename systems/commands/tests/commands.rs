use std::{collections::HashSet, rc::Rc};

use cow_game_core::{
    Address, Event, EventKind, Focus, GameParameters, GameState, HorseId, Model, Position,
};
use cow_game_system_commands::{
    end_game, focus_on_house, focus_on_npc, notify_npc_arrived_at_home, notify_npc_exploded,
    spawn_horse, spawn_npc, start_new_game, tap, Command, CommandError, GameContext,
};
use cow_game_world::{reduce, GenerationError};

/// Executes commands the way the controller does and keeps what they commit.
struct Harness {
    model: Rc<Model>,
    version: u64,
    published: Vec<Event>,
}

impl Harness {
    fn new() -> Self {
        Self {
            model: Rc::new(Model::default()),
            version: 0,
            published: Vec::new(),
        }
    }

    fn started() -> Self {
        let mut harness = Self::new();
        let command = start_new_game(GameParameters::default()).expect("world");
        harness.execute(command).expect("new game");
        harness
    }

    fn execute(&mut self, command: Command) -> Result<(), CommandError> {
        let mut context = GameContext::new(&reduce, Rc::clone(&self.model), self.version);
        command.run(&mut context)?;
        if let Some(last) = context.changes().last() {
            self.model = Rc::clone(&last.model);
            self.version = last.version;
        }
        self.published
            .extend(context.changes().iter().map(|change| change.event.clone()));
        Ok(())
    }

    fn kinds(&self) -> Vec<EventKind> {
        self.published.iter().map(Event::kind).collect()
    }
}

#[test]
fn new_game_queues_routed_npcs() {
    let harness = Harness::started();
    let model = &harness.model;

    assert_eq!(harness.kinds(), [EventKind::NewGameStarted]);
    assert_eq!(harness.version, 1);
    assert_eq!(model.game_state, GameState::Playing);
    assert_eq!(model.npcs_to_spawn.len(), 5);
    assert!(model.npcs.is_empty());
    assert!(model.houses_won.is_empty());
    assert!(model.houses_lost.is_empty());
    assert_eq!(model.score.houses_remaining, 5);

    let homes: HashSet<Address> = model.npcs_to_spawn.iter().map(|npc| npc.home).collect();
    assert_eq!(homes.len(), 5);
    for npc in &model.npcs_to_spawn {
        assert!(model.grid.is_habitable(npc.home));
        assert_eq!(npc.route.first(), Some(&npc.spawn_address));
        assert_eq!(npc.route.last(), Some(&npc.home));
        assert!(npc.route.windows(2).all(|pair| pair[0].is_adjacent(pair[1])));
        assert!(npc.route[1..npc.route.len() - 1]
            .iter()
            .all(|address| !model.grid.is_habitable(*address)));
    }
}

#[test]
fn impossible_worlds_are_rejected_before_queueing() {
    let parameters = GameParameters {
        npc_count: 37,
        ..GameParameters::default()
    };
    let error = start_new_game(parameters).expect_err("too many NPCs");
    assert_eq!(
        error,
        CommandError::Generation(GenerationError::NotEnoughHouses {
            available: 36,
            required: 37,
        })
    );
}

#[test]
fn same_seed_starts_the_same_game() {
    let first = Harness::started();
    let second = Harness::started();
    assert_eq!(first.model, second.model);
}

#[test]
fn spawning_drains_the_queue_then_fails() {
    let mut harness = Harness::started();

    for spawned in 1..=5 {
        harness.execute(spawn_npc()).expect("spawn");
        assert_eq!(harness.model.npcs.len(), spawned);
        assert_eq!(harness.model.npcs_to_spawn.len(), 5 - spawned);
    }
    let before = Rc::clone(&harness.model);
    let published = harness.published.len();

    assert_eq!(harness.execute(spawn_npc()), Err(CommandError::NoNpcsToSpawn));
    assert!(Rc::ptr_eq(&before, &harness.model));
    assert_eq!(harness.published.len(), published);
    assert_eq!(harness.version, 6);
}

#[test]
fn arrival_loses_the_house_once() {
    let mut harness = Harness::started();
    harness.execute(spawn_npc()).expect("spawn");
    let npc = harness.model.npcs[0].clone();

    harness
        .execute(notify_npc_arrived_at_home(npc.id))
        .expect("arrived");

    assert_eq!(
        harness.published.last().map(Event::kind),
        Some(EventKind::NpcArrivedAtHome)
    );
    assert_eq!(harness.model.houses_lost, vec![npc.home]);
    assert_eq!(harness.model.score.houses_lost, 1);
    assert_eq!(harness.model.score.points, 0);
    assert_eq!(harness.model.score.houses_remaining, 4);

    assert_eq!(
        harness.execute(notify_npc_arrived_at_home(npc.id)),
        Err(CommandError::InvalidNpcId(npc.id))
    );
}

#[test]
fn explosion_wins_the_house_and_scores() {
    let mut harness = Harness::started();
    harness.execute(spawn_npc()).expect("spawn");
    let npc = harness.model.npcs[0].clone();

    harness.execute(spawn_horse()).expect("horse");
    harness.execute(notify_npc_exploded(npc.id)).expect("exploded");

    assert_eq!(harness.model.houses_won, vec![npc.home]);
    assert_eq!(harness.model.score.points, 100 - 10);
    assert_eq!(
        harness.execute(notify_npc_exploded(npc.id)),
        Err(CommandError::InvalidNpcId(npc.id))
    );
}

#[test]
fn taps_dispatch_on_their_tag() {
    let mut harness = Harness::started();
    let position = Position::new(4.5, 2.0);

    harness.execute(tap("terrain", position)).expect("terrain");
    harness.execute(tap("player", position)).expect("player");
    harness.execute(tap("player", position)).expect("player");
    harness.execute(tap("cow", position)).expect("unknown tags are ignored");

    assert_eq!(harness.model.player_destination, Some(position));
    assert_eq!(
        harness.published[1..],
        [
            Event::DestinationUpdated { position },
            Event::HorseSpawned {
                horse: HorseId::new(0)
            },
            Event::HorseSpawned {
                horse: HorseId::new(1)
            },
        ]
    );
    assert_eq!(harness.model.horses_spawned, 2);
}

#[test]
fn horses_and_game_end_require_a_game_in_progress() {
    let mut harness = Harness::new();
    harness.execute(spawn_horse()).expect("ignored");
    harness.execute(end_game()).expect("ignored");
    assert!(harness.published.is_empty());

    let mut harness = Harness::started();
    harness.execute(end_game()).expect("end");
    harness.execute(end_game()).expect("already over");
    harness.execute(spawn_horse()).expect("ignored");
    assert_eq!(harness.kinds(), [EventKind::NewGameStarted, EventKind::GameEnded]);
    assert_eq!(harness.model.game_state, GameState::GameOver);
}

#[test]
fn focus_moves_between_npcs_and_houses() {
    let mut harness = Harness::started();
    harness.execute(spawn_npc()).expect("spawn");
    let npc = harness.model.npcs[0].clone();

    harness.execute(focus_on_npc(npc.id)).expect("focus");
    harness.execute(focus_on_npc(npc.id)).expect("unchanged");
    assert_eq!(harness.model.focus, Some(Focus::Npc(npc.id)));

    harness.execute(focus_on_house(npc.home)).expect("focus");
    harness.execute(focus_on_house(harness.model.player_spawn)).expect("street");
    assert_eq!(harness.model.focus, Some(Focus::House(npc.home)));

    assert_eq!(
        harness.kinds()[2..],
        [EventKind::NpcFocused, EventKind::HouseFocused]
    );
}
