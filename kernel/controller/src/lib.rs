#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Serialized command execution over an immutable, versioned model.
//!
//! Commands are queued and executed one at a time. A command observes the
//! committed model, emits events through a [`CommandContext`], and either
//! commits every resulting change at once or, on error, none of them. Committed
//! changes are forwarded in order to a sink supplied by the owner.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};

use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// Commands allowed to wait in the queue before new ones are rejected.
pub const MAX_PENDING_COMMANDS: usize = 100;

/// Failures reported to callers of [`Controller::enqueue_command`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// The queue already holds [`MAX_PENDING_COMMANDS`] commands.
    #[error("command queue overflow: {pending} commands are already pending")]
    QueueOverflow {
        /// Commands waiting at the time of the rejected call.
        pending: usize,
    },
    /// The controller behind a weak handle has been dropped.
    #[error("the controller has been dropped")]
    Detached,
}

/// Domain plugged into a [`Controller`].
pub trait StateMachine: 'static {
    /// Authoritative state.
    type Model: 'static;
    /// Fact describing a single state transition.
    type Event: fmt::Debug + 'static;
    /// Request to change the state.
    type Command: fmt::Debug + 'static;
    /// Reason a command was rejected.
    type Error: fmt::Display;

    /// Runs `command`, emitting events through `context`.
    ///
    /// Returning `Err` discards every emitted event. A panic is not caught: it
    /// unwinds out of [`Controller::enqueue_command`] with the model left at the
    /// last commit, and commands still queued run on the next enqueue.
    fn execute(
        &self,
        command: Self::Command,
        context: &mut CommandContext<'_, Self::Model, Self::Event>,
    ) -> Result<(), Self::Error>;

    /// Folds `event` into `model`; `None` means the model is unchanged.
    fn reduce(&self, model: &Self::Model, event: &Self::Event) -> Option<Self::Model>;
}

/// A committed event together with the model it produced.
pub struct ChangeEvent<M, E> {
    /// Event that was applied.
    pub event: E,
    /// Version assigned to the resulting model.
    pub version: u64,
    /// Model after the event was applied.
    pub model: Rc<M>,
}

impl<M, E: Clone> Clone for ChangeEvent<M, E> {
    fn clone(&self) -> Self {
        Self {
            event: self.event.clone(),
            version: self.version,
            model: Rc::clone(&self.model),
        }
    }
}

impl<M, E: fmt::Debug> fmt::Debug for ChangeEvent<M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvent")
            .field("event", &self.event)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Tentative state seen by a single executing command.
pub struct CommandContext<'a, M, E> {
    reducer: &'a dyn Fn(&M, &E) -> Option<M>,
    model: Rc<M>,
    version: u64,
    changes: Vec<ChangeEvent<M, E>>,
}

impl<'a, M, E: fmt::Debug> CommandContext<'a, M, E> {
    /// Starts a context from a committed model and version.
    pub fn new(reducer: &'a dyn Fn(&M, &E) -> Option<M>, model: Rc<M>, version: u64) -> Self {
        Self {
            reducer,
            model,
            version,
            changes: Vec::new(),
        }
    }

    /// Model including every event this command has emitted so far.
    #[must_use]
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Version of [`Self::model`].
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Applies `event` to the tentative model.
    ///
    /// Events the reducer reports as unchanged are dropped without a version.
    pub fn emit(&mut self, event: E) {
        match (self.reducer)(&self.model, &event) {
            Some(next) => {
                self.version += 1;
                self.model = Rc::new(next);
                self.changes.push(ChangeEvent {
                    event,
                    version: self.version,
                    model: Rc::clone(&self.model),
                });
            }
            None => trace!(?event, version = self.version, "event left the model unchanged"),
        }
    }

    /// Changes captured so far, in emission order.
    #[must_use]
    pub fn changes(&self) -> &[ChangeEvent<M, E>] {
        &self.changes
    }

    fn into_parts(self) -> (Rc<M>, u64, Vec<ChangeEvent<M, E>>) {
        (self.model, self.version, self.changes)
    }
}

impl<M, E> fmt::Debug for CommandContext<'_, M, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("version", &self.version)
            .field("changes", &self.changes.len())
            .finish_non_exhaustive()
    }
}

type Sink<M, E> = Box<dyn Fn(ChangeEvent<M, E>)>;

struct Inner<S: StateMachine> {
    machine: S,
    model: RefCell<Rc<S::Model>>,
    version: Cell<u64>,
    queue: RefCell<VecDeque<(u64, S::Command)>>,
    command_counter: Cell<u64>,
    is_draining: Cell<bool>,
    sink: Sink<S::Model, S::Event>,
}

/// Cloneable handle that serializes command execution.
pub struct Controller<S: StateMachine> {
    inner: Rc<Inner<S>>,
}

impl<S: StateMachine> Clone for Controller<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: StateMachine> fmt::Debug for Controller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("version", &self.inner.version.get())
            .field("pending", &self.inner.queue.borrow().len())
            .field("is_draining", &self.inner.is_draining.get())
            .finish_non_exhaustive()
    }
}

impl<S: StateMachine> Controller<S> {
    /// Creates a controller at version zero.
    pub fn new<F>(machine: S, initial_model: S::Model, sink: F) -> Self
    where
        F: Fn(ChangeEvent<S::Model, S::Event>) + 'static,
    {
        Self {
            inner: Rc::new(Inner {
                machine,
                model: RefCell::new(Rc::new(initial_model)),
                version: Cell::new(0),
                queue: RefCell::new(VecDeque::new()),
                command_counter: Cell::new(0),
                is_draining: Cell::new(false),
                sink: Box::new(sink),
            }),
        }
    }

    /// Queues `command` and drains the queue unless a drain is already running.
    ///
    /// Calls made while draining, for example from the sink, only append; the
    /// running drain executes them after the current command has committed.
    pub fn enqueue_command(&self, command: S::Command) -> Result<(), ControllerError> {
        let pending = self.inner.queue.borrow().len();
        if pending >= MAX_PENDING_COMMANDS {
            warn!(?command, pending, "rejecting command; queue is full");
            return Err(ControllerError::QueueOverflow { pending });
        }

        let sequence = self.inner.command_counter.get() + 1;
        self.inner.command_counter.set(sequence);
        self.inner.queue.borrow_mut().push_back((sequence, command));

        self.drain();
        Ok(())
    }

    fn drain(&self) {
        if self.inner.is_draining.replace(true) {
            return;
        }
        let _guard = DrainGuard {
            flag: &self.inner.is_draining,
        };

        loop {
            let Some((sequence, command)) = self.inner.queue.borrow_mut().pop_front() else {
                break;
            };
            self.run(sequence, command);
        }
    }

    fn run(&self, sequence: u64, command: S::Command) {
        let version = self.inner.version.get();
        let label = format!("{command:?}");
        debug!(command = %label, sequence, version, "executing command");

        let reduce = |model: &S::Model, event: &S::Event| self.inner.machine.reduce(model, event);
        let committed = Rc::clone(&self.inner.model.borrow());
        let mut context = CommandContext::new(&reduce, committed, version);

        if let Err(error) = self.inner.machine.execute(command, &mut context) {
            error!(command = %label, sequence, version, %error, "command failed; model unchanged");
            return;
        }

        let (model, version, changes) = context.into_parts();
        if changes.is_empty() {
            return;
        }
        *self.inner.model.borrow_mut() = model;
        self.inner.version.set(version);

        for change in changes {
            (self.inner.sink)(change);
        }
    }

    /// Latest committed model.
    #[must_use]
    pub fn model(&self) -> Rc<S::Model> {
        Rc::clone(&self.inner.model.borrow())
    }

    /// Version of the latest committed model.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Commands waiting behind the one currently executing.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Creates a handle that does not keep the controller alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakController<S> {
        WeakController {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Controller`].
pub struct WeakController<S: StateMachine> {
    inner: Weak<Inner<S>>,
}

impl<S: StateMachine> Clone for WeakController<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S: StateMachine> fmt::Debug for WeakController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakController")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<S: StateMachine> WeakController<S> {
    /// Returns the controller if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Controller<S>> {
        self.inner.upgrade().map(|inner| Controller { inner })
    }

    /// Queues `command` on the controller if it is still alive.
    pub fn enqueue_command(&self, command: S::Command) -> Result<(), ControllerError> {
        self.upgrade()
            .ok_or(ControllerError::Detached)?
            .enqueue_command(command)
    }
}

struct DrainGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
