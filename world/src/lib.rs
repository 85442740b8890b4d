#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! World generation, route finding, and the pure model reducer.

mod generation;
mod navigation;

use cow_game_core::{Event, Focus, GameState, Model, NpcId, Score};

pub use generation::{
    create_grid, enumerate_habitable_houses, generate_npcs, generate_world, player_spawn,
    reachable_homes, select_spawnpoints, street_addresses, GeneratedWorld, GenerationError,
    NpcGenerator,
};
pub use navigation::{find_path, PathError};

/// Folds a single event into the model.
///
/// Returns `None` when the event leaves the model unchanged, which tells the
/// controller not to advance the version or publish the event. The match has
/// no wildcard arm, so adding an [`Event`] variant fails to compile until it is
/// handled here.
#[must_use]
pub fn reduce(model: &Model, event: &Event) -> Option<Model> {
    match event {
        Event::NewGameStarted {
            parameters,
            grid,
            player_spawn,
            npcs_to_spawn,
        } => {
            let mut next = Model {
                game_state: GameState::Playing,
                parameters: parameters.clone(),
                score: Score::default(),
                grid: grid.clone(),
                player_spawn: *player_spawn,
                player_destination: None,
                focus: None,
                npcs_to_spawn: npcs_to_spawn.clone(),
                npcs: Vec::new(),
                houses_lost: Vec::new(),
                houses_won: Vec::new(),
                horses_spawned: 0,
            };
            retally(&mut next);
            Some(next)
        }
        Event::DestinationUpdated { position } => {
            if model.player_destination == Some(*position) {
                return None;
            }
            let mut next = model.clone();
            next.player_destination = Some(*position);
            Some(next)
        }
        Event::HorseSpawned { .. } => {
            let mut next = model.clone();
            next.horses_spawned = next.horses_spawned.saturating_add(1);
            retally(&mut next);
            Some(next)
        }
        Event::NpcSpawned { npc } => {
            let index = model
                .npcs_to_spawn
                .iter()
                .position(|queued| queued.id == npc.id)?;
            let mut next = model.clone();
            let spawned = next.npcs_to_spawn.remove(index);
            next.npcs.push(spawned);
            Some(next)
        }
        Event::NpcArrivedAtHome { npc, home } => {
            let mut next = retire_npc(model, npc.id)?;
            next.houses_lost.push(*home);
            retally(&mut next);
            Some(next)
        }
        Event::NpcExploded { npc, home } => {
            let mut next = retire_npc(model, npc.id)?;
            next.houses_won.push(*home);
            retally(&mut next);
            Some(next)
        }
        Event::NpcFocused { npc } => {
            let _ = model.live_npc(*npc)?;
            refocus(model, Focus::Npc(*npc))
        }
        Event::HouseFocused { house } => {
            if !model.grid.is_habitable(*house) {
                return None;
            }
            refocus(model, Focus::House(*house))
        }
        Event::GameEnded => {
            if model.game_state != GameState::Playing {
                return None;
            }
            let mut next = model.clone();
            next.game_state = GameState::GameOver;
            Some(next)
        }
    }
}

fn retire_npc(model: &Model, id: NpcId) -> Option<Model> {
    let index = model.npcs.iter().position(|npc| npc.id == id)?;
    let mut next = model.clone();
    let _ = next.npcs.remove(index);
    if next.focus == Some(Focus::Npc(id)) {
        next.focus = None;
    }
    Some(next)
}

fn refocus(model: &Model, focus: Focus) -> Option<Model> {
    if model.focus == Some(focus) {
        return None;
    }
    let mut next = model.clone();
    next.focus = Some(focus);
    Some(next)
}

fn retally(model: &mut Model) {
    let count = |len: usize| u32::try_from(len).unwrap_or(u32::MAX);
    let houses_remaining = count(model.npcs_to_spawn.len() + model.npcs.len());
    model.score = Score::tally(
        &model.parameters,
        count(model.houses_won.len()),
        count(model.houses_lost.len()),
        model.horses_spawned,
        houses_remaining,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use cow_game_core::{Address, EventKind, GameParameters, HorseId, Npc, Position};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn started() -> (Model, Vec<Npc>) {
        let parameters = GameParameters::default();
        let world = generate_world(&parameters, &mut ChaCha8Rng::seed_from_u64(5)).expect("world");
        let event = Event::NewGameStarted {
            parameters,
            grid: world.grid,
            player_spawn: world.player_spawn,
            npcs_to_spawn: world.npcs.clone(),
        };
        let model = reduce(&Model::default(), &event).expect("new game");
        (model, world.npcs)
    }

    fn spawned(model: &Model, npc: &Npc) -> Model {
        reduce(model, &Event::NpcSpawned { npc: npc.clone() }).expect("spawned")
    }

    fn sample_event(kind: EventKind, model: &Model, npc: &Npc) -> Event {
        match kind {
            EventKind::NewGameStarted => Event::NewGameStarted {
                parameters: model.parameters.clone(),
                grid: model.grid.clone(),
                player_spawn: model.player_spawn,
                npcs_to_spawn: Vec::new(),
            },
            EventKind::DestinationUpdated => Event::DestinationUpdated {
                position: Position::new(1.5, 2.5),
            },
            EventKind::HorseSpawned => Event::HorseSpawned {
                horse: HorseId::new(0),
            },
            EventKind::NpcSpawned => Event::NpcSpawned { npc: npc.clone() },
            EventKind::NpcArrivedAtHome => Event::NpcArrivedAtHome {
                npc: npc.clone(),
                home: npc.home,
            },
            EventKind::NpcExploded => Event::NpcExploded {
                npc: npc.clone(),
                home: npc.home,
            },
            EventKind::NpcFocused => Event::NpcFocused { npc: npc.id },
            EventKind::HouseFocused => Event::HouseFocused { house: npc.home },
            EventKind::GameEnded => Event::GameEnded,
        }
    }

    #[test]
    fn new_game_builds_fresh_model() {
        let (model, npcs) = started();
        assert_eq!(model.game_state, GameState::Playing);
        assert_eq!(model.npcs_to_spawn, npcs);
        assert!(model.npcs.is_empty());
        assert!(model.houses_won.is_empty());
        assert!(model.houses_lost.is_empty());
        assert_eq!(model.score.houses_remaining, 5);
        assert_eq!(model.score.points, 0);
    }

    #[test]
    fn spawning_moves_npc_between_lists() {
        let (model, npcs) = started();
        let next = spawned(&model, &npcs[0]);
        assert_eq!(next.npcs, vec![npcs[0].clone()]);
        assert_eq!(next.npcs_to_spawn.len(), 4);
        assert!(next.npcs_to_spawn.iter().all(|npc| npc.id != npcs[0].id));
        assert_eq!(reduce(&next, &Event::NpcSpawned { npc: npcs[0].clone() }), None);
    }

    #[test]
    fn outcomes_update_lists_and_score() {
        let (model, npcs) = started();
        let model = spawned(&spawned(&model, &npcs[0]), &npcs[1]);

        let model = reduce(
            &model,
            &Event::NpcArrivedAtHome {
                npc: npcs[0].clone(),
                home: npcs[0].home,
            },
        )
        .expect("arrived");
        assert_eq!(model.houses_lost, vec![npcs[0].home]);
        assert_eq!(model.score.houses_lost, 1);
        assert_eq!(model.score.houses_remaining, 4);

        let model = reduce(&model, &Event::HorseSpawned { horse: HorseId::new(0) }).expect("horse");
        let model = reduce(
            &model,
            &Event::NpcExploded {
                npc: npcs[1].clone(),
                home: npcs[1].home,
            },
        )
        .expect("exploded");
        assert_eq!(model.houses_won, vec![npcs[1].home]);
        assert_eq!(model.score.points, 100 - 10);
        assert_eq!(model.score.houses_remaining, 3);

        let repeat = Event::NpcExploded {
            npc: npcs[1].clone(),
            home: npcs[1].home,
        };
        assert_eq!(reduce(&model, &repeat), None);
    }

    #[test]
    fn unchanged_transitions_report_none() {
        let (model, npcs) = started();
        let destination = Event::DestinationUpdated {
            position: Position::new(3.0, 4.0),
        };
        let moved = reduce(&model, &destination).expect("moved");
        assert_eq!(reduce(&moved, &destination), None);

        assert_eq!(reduce(&model, &Event::NpcFocused { npc: npcs[0].id }), None);
        let live = spawned(&model, &npcs[0]);
        let focused = reduce(&live, &Event::NpcFocused { npc: npcs[0].id }).expect("focus");
        assert_eq!(focused.focus, Some(Focus::Npc(npcs[0].id)));
        assert_eq!(reduce(&focused, &Event::NpcFocused { npc: npcs[0].id }), None);

        assert_eq!(reduce(&model, &Event::HouseFocused { house: Address::new(0, 0) }), None);
        assert_eq!(reduce(&Model::default(), &Event::GameEnded), None);
    }

    #[test]
    fn game_end_is_terminal() {
        let (model, _) = started();
        let ended = reduce(&model, &Event::GameEnded).expect("ended");
        assert_eq!(ended.game_state, GameState::GameOver);
        assert_eq!(reduce(&ended, &Event::GameEnded), None);
    }

    #[test]
    fn reducer_handles_every_event_kind() {
        let (model, npcs) = started();
        let live = spawned(&model, &npcs[0]);
        for kind in EventKind::ALL {
            let event = sample_event(kind, &live, &npcs[0]);
            assert_eq!(event.kind(), kind);
            let _ = reduce(&live, &event);
        }
    }
}
