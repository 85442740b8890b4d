//! Long-running reactions to change-events.

use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

use cow_game_controller::ControllerError;
use cow_game_core::Event;
use cow_game_message_bus::Subscription;
use cow_game_system_commands::{end_game, spawn_npc};
use tracing::{debug, info};

use crate::{CommandSender, GameController};

#[derive(Debug, Default)]
struct SpawnSchedule {
    clock: Duration,
    deadlines: VecDeque<Duration>,
}

impl SpawnSchedule {
    fn reset(&mut self, deadlines: impl IntoIterator<Item = Duration>) {
        self.clock = Duration::ZERO;
        self.deadlines = deadlines.into_iter().collect();
        self.deadlines.make_contiguous().sort_unstable();
    }

    fn advance(&mut self, elapsed: Duration) -> usize {
        self.clock = self.clock.saturating_add(elapsed);
        let due = self
            .deadlines
            .iter()
            .take_while(|deadline| **deadline <= self.clock)
            .count();
        let _ = self.deadlines.drain(..due);
        due
    }

    fn clear(&mut self) {
        self.clock = Duration::ZERO;
        self.deadlines.clear();
    }
}

/// Spawns queued NPCs as their spawn times pass.
///
/// Every delivered `NewGameStarted` restarts the clock and schedules one
/// spawn per queued NPC. The host drives time with [`NpcSpawner::advance`].
#[derive(Debug)]
pub struct NpcSpawner {
    schedule: Rc<RefCell<SpawnSchedule>>,
    subscription: Subscription,
    sender: CommandSender,
}

impl NpcSpawner {
    /// Attaches the spawner to `game`.
    #[must_use]
    pub fn start(game: &GameController) -> Self {
        let schedule = Rc::new(RefCell::new(SpawnSchedule::default()));
        let listener_schedule = Rc::clone(&schedule);
        let subscription = game.subscribe_events(move |change| {
            if let Event::NewGameStarted { .. } = change.event {
                let npcs = &change.model.npcs_to_spawn;
                listener_schedule
                    .borrow_mut()
                    .reset(npcs.iter().map(|npc| npc.spawn_time));
                info!(npcs = npcs.len(), "NPC spawner timers have started");
            }
            Ok(())
        });

        Self {
            schedule,
            subscription,
            sender: game.sender(),
        }
    }

    /// Moves the clock forward and enqueues one `spawn_npc` per deadline passed.
    ///
    /// Returns the number of spawns enqueued.
    pub fn advance(&self, elapsed: Duration) -> Result<usize, ControllerError> {
        let due = self.schedule.borrow_mut().advance(elapsed);
        for _ in 0..due {
            self.sender.enqueue(spawn_npc())?;
        }
        if due > 0 {
            debug!(due, clock = ?self.clock(), "spawning NPCs");
        }
        Ok(due)
    }

    /// Time elapsed since the current game started.
    #[must_use]
    pub fn clock(&self) -> Duration {
        self.schedule.borrow().clock
    }

    /// Spawns still scheduled.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.schedule.borrow().deadlines.len()
    }

    /// Detaches from the game and cancels every scheduled spawn.
    pub fn dispose(self) {
        self.subscription.unsubscribe();
        self.schedule.borrow_mut().clear();
    }
}

/// Ends the game once every NPC home has been resolved.
#[derive(Debug)]
pub struct GameOverWatcher {
    subscription: Subscription,
}

impl GameOverWatcher {
    /// Attaches the watcher to `game`.
    #[must_use]
    pub fn start(game: &GameController) -> Self {
        let sender = game.sender();
        let subscription = game.subscribe_events(move |change| {
            let model = &change.model;
            if model.is_playing() && model.score.houses_remaining == 0 {
                info!(points = model.score.points, "every house resolved; ending game");
                sender.enqueue(end_game())?;
            }
            Ok(())
        });

        Self { subscription }
    }

    /// Detaches from the game.
    pub fn dispose(self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::SpawnSchedule;
    use std::time::Duration;

    #[test]
    fn schedule_releases_deadlines_as_the_clock_passes_them() {
        let mut schedule = SpawnSchedule::default();
        schedule.reset([3, 9, 6].map(Duration::from_secs));

        assert_eq!(schedule.advance(Duration::from_secs(2)), 0);
        assert_eq!(schedule.advance(Duration::from_secs(1)), 1);
        assert_eq!(schedule.advance(Duration::from_secs(7)), 2);
        assert_eq!(schedule.advance(Duration::from_secs(100)), 0);
        assert_eq!(schedule.clock, Duration::from_secs(110));

        schedule.clear();
        assert_eq!(schedule.clock, Duration::ZERO);
        assert!(schedule.deadlines.is_empty());
    }
}
