#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Cow game controller: the command queue, the reducer, and event delivery
//! wired together behind one handle.
//!
//! Commands execute synchronously when enqueued. Their committed change-events
//! are queued on the message bus and reach subscribers when the host drives
//! [`GameController::deliver_events`].

mod behaviours;

use std::rc::Rc;

use cow_game_controller::{
    ChangeEvent, CommandContext, Controller, ControllerError, StateMachine, WeakController,
};
use cow_game_core::{Event, Model};
use cow_game_message_bus::{Delivery, MessageBus, Subscription};
use cow_game_system_commands::{Command, CommandError};
use tracing::trace;

pub use behaviours::{GameOverWatcher, NpcSpawner};

/// Change-event published for every committed game event.
pub type GameChange = ChangeEvent<Model, Event>;

/// Cow game rules plugged into the generic controller.
#[derive(Clone, Copy, Debug, Default)]
pub struct CowGame;

impl StateMachine for CowGame {
    type Model = Model;
    type Event = Event;
    type Command = Command;
    type Error = CommandError;

    fn execute(
        &self,
        command: Command,
        context: &mut CommandContext<'_, Model, Event>,
    ) -> Result<(), CommandError> {
        command.run(context)
    }

    fn reduce(&self, model: &Model, event: &Event) -> Option<Model> {
        cow_game_world::reduce(model, event)
    }
}

/// Cloneable handle owning the game state and its subscribers.
#[derive(Clone, Debug)]
pub struct GameController {
    controller: Controller<CowGame>,
    bus: MessageBus<GameChange>,
}

impl Default for GameController {
    fn default() -> Self {
        Self::new()
    }
}

impl GameController {
    /// Creates a controller holding a game that has not started yet.
    #[must_use]
    pub fn new() -> Self {
        let bus = MessageBus::new();
        let outbox = bus.clone();
        let controller = Controller::new(CowGame, Model::default(), move |change: GameChange| {
            let kind = change.event.kind().name();
            let version = change.version;
            let sequence = outbox.post(change);
            trace!(event = kind, version, sequence, "queued change-event");
        });

        Self { controller, bus }
    }

    /// Queues `command`; it runs before this call returns unless a command is
    /// already executing.
    pub fn enqueue_command(&self, command: Command) -> Result<(), ControllerError> {
        self.controller.enqueue_command(command)
    }

    /// Subscribes a listener that handles each change-event synchronously.
    pub fn subscribe_events<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&GameChange) -> anyhow::Result<()> + 'static,
    {
        self.bus.subscribe_sync(listener)
    }

    /// Subscribes a listener that may finish handling a change-event later.
    pub fn subscribe_events_async<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&GameChange) -> Delivery + 'static,
    {
        self.bus.subscribe(listener)
    }

    /// Delivers every queued change-event, including those produced while
    /// delivering.
    pub async fn deliver_events(&self) {
        self.bus.dispatch().await;
    }

    /// Change-events committed but not yet delivered.
    #[must_use]
    pub fn undelivered_events(&self) -> usize {
        self.bus.queued()
    }

    /// Latest committed model.
    #[must_use]
    pub fn model(&self) -> Rc<Model> {
        self.controller.model()
    }

    /// Version of the latest committed model.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.controller.version()
    }

    /// Handle for enqueueing commands that does not keep the game alive.
    #[must_use]
    pub fn sender(&self) -> CommandSender {
        CommandSender {
            controller: self.controller.downgrade(),
        }
    }
}

/// Weak command handle held by behaviours and listeners.
#[derive(Clone, Debug)]
pub struct CommandSender {
    controller: WeakController<CowGame>,
}

impl CommandSender {
    /// Queues `command` on the game, failing with
    /// [`ControllerError::Detached`] once the game has been dropped.
    pub fn enqueue(&self, command: Command) -> Result<(), ControllerError> {
        self.controller.enqueue_command(command)
    }
}
