#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Single-threaded asynchronous publish/subscribe bus.
//!
//! Messages are delivered strictly in the order they were posted. While one
//! message is being delivered, newly posted messages wait in the queue instead
//! of being dispatched recursively, and delivery of the next message only starts
//! once every listener has settled on the current one.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    fmt,
    future::Future,
    rc::{Rc, Weak},
};

use futures_util::future::{join_all, LocalBoxFuture};
use tracing::{debug, error};

/// Outcome reported by a listener for a single message.
pub enum Delivery {
    /// The listener finished handling the message.
    Done,
    /// The listener failed; the failure is logged and delivery continues.
    Failed(anyhow::Error),
    /// The listener continues asynchronously; the bus awaits the future before
    /// moving to the next message.
    Pending(LocalBoxFuture<'static, anyhow::Result<()>>),
}

impl Delivery {
    /// Wraps a future the bus should await before delivering the next message.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl From<anyhow::Result<()>> for Delivery {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(error) => Self::Failed(error),
        }
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Failed(error) => f.debug_tuple("Failed").field(error).finish(),
            Self::Pending(_) => f.write_str("Pending"),
        }
    }
}

type Listener<M> = Rc<dyn Fn(&M) -> Delivery>;

trait ListenerRegistry {
    fn remove(&self, id: u64);
}

/// Handle returned by [`MessageBus::subscribe`].
#[must_use = "dropping a subscription keeps the listener attached; call `unsubscribe` to detach it"]
pub struct Subscription {
    registry: Weak<dyn ListenerRegistry>,
    id: u64,
}

impl Subscription {
    /// Detaches the listener. Messages already being delivered still reach it.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

struct Inner<M> {
    queue: RefCell<VecDeque<(u64, M)>>,
    message_counter: Cell<u64>,
    is_dequeuing: Cell<bool>,
    listeners: RefCell<Vec<(u64, Listener<M>)>>,
    listener_counter: Cell<u64>,
}

impl<M> ListenerRegistry for Inner<M> {
    fn remove(&self, id: u64) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

/// Cloneable handle to a FIFO message bus.
pub struct MessageBus<M> {
    inner: Rc<Inner<M>>,
}

impl<M> Clone for MessageBus<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for MessageBus<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("queued", &self.inner.queue.borrow().len())
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("is_dequeuing", &self.inner.is_dequeuing.get())
            .finish()
    }
}

impl<M: 'static> Default for MessageBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: 'static> MessageBus<M> {
    /// Creates an empty bus without listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(VecDeque::new()),
                message_counter: Cell::new(0),
                is_dequeuing: Cell::new(false),
                listeners: RefCell::new(Vec::new()),
                listener_counter: Cell::new(0),
            }),
        }
    }

    /// Attaches a listener that may settle asynchronously.
    ///
    /// Only failures returned through [`Delivery`] are isolated. A panicking
    /// listener unwinds out of [`Self::dispatch`]; the message being delivered
    /// is lost for the listeners after it, while later messages stay queued for
    /// the next dispatch.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&M) -> Delivery + 'static,
    {
        let id = self.inner.listener_counter.get() + 1;
        self.inner.listener_counter.set(id);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));

        let inner = Rc::downgrade(&self.inner);
        let registry: Weak<dyn ListenerRegistry> = inner;
        Subscription { registry, id }
    }

    /// Attaches a listener that settles as soon as it returns.
    pub fn subscribe_sync<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&M) -> anyhow::Result<()> + 'static,
    {
        self.subscribe(move |message| Delivery::from(listener(message)))
    }

    /// Appends a message to the queue without delivering it; returns its sequence number.
    pub fn post(&self, message: M) -> u64 {
        let sequence = self.inner.message_counter.get() + 1;
        self.inner.message_counter.set(sequence);
        self.inner.queue.borrow_mut().push_back((sequence, message));
        sequence
    }

    /// Posts a message and returns a future that delivers the queue.
    ///
    /// The message is queued immediately; delivery happens when the future is
    /// polled. If another dispatch is already running, the future completes at
    /// once and the running dispatch delivers the message.
    pub fn enqueue_message(&self, message: M) -> impl Future<Output = ()> + 'static {
        let _ = self.post(message);
        let bus = self.clone();
        async move { bus.dispatch().await }
    }

    /// Delivers queued messages until the queue is empty.
    pub async fn dispatch(&self) {
        if self.inner.is_dequeuing.replace(true) {
            return;
        }
        let _guard = DequeueGuard {
            flag: &self.inner.is_dequeuing,
        };

        loop {
            let Some((sequence, message)) = self.inner.queue.borrow_mut().pop_front() else {
                break;
            };
            let label = sequence_label(sequence);
            debug!(message = %label, "broadcasting message");

            let listeners: Vec<Listener<M>> = self
                .inner
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();

            let mut settling = Vec::new();
            for listener in listeners {
                match listener(&message) {
                    Delivery::Done => {}
                    Delivery::Failed(error) => {
                        error!(
                            message = %label,
                            error = %error,
                            "listener failed; delivery continues"
                        );
                    }
                    Delivery::Pending(future) => settling.push(future),
                }
            }

            if settling.is_empty() {
                continue;
            }
            for result in join_all(settling).await {
                if let Err(error) = result {
                    error!(
                        message = %label,
                        error = %error,
                        "async listener failed; delivery continues"
                    );
                }
            }
        }
    }

    /// Number of messages waiting for delivery.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

struct DequeueGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for DequeueGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// Spreadsheet-style column label used to tag messages in logs (1 → `A`, 27 → `AA`).
fn sequence_label(mut sequence: u64) -> String {
    let mut label = String::new();
    while sequence > 0 {
        let remainder = (sequence - 1) % 26;
        label.insert(0, char::from(b'A' + remainder as u8));
        sequence = (sequence - remainder) / 26;
    }
    label
}
