use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::panic_message;
use crate::types::JobId;

/// Metadata delivered alongside every broadcast message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastContext {
    /// Synchronization run the message belongs to, if any.
    pub run_id: Option<JobId>,
}

impl BroadcastContext {
    pub fn for_run(run_id: JobId) -> Self {
        Self {
            run_id: Some(run_id),
        }
    }
}

type Listener<M> = Arc<dyn Fn(&M, &BroadcastContext) + Send + Sync>;

/// Unit of work executed by the delivery task.
enum Delivery<M> {
    Message {
        listener_id: u64,
        listener: Listener<M>,
        message: Arc<M>,
        context: BroadcastContext,
    },
    Flush(oneshot::Sender<()>),
}

struct Inner<M> {
    /// Registered listeners in registration order.
    listeners: Vec<(u64, Listener<M>)>,
    sender: Option<mpsc::UnboundedSender<Delivery<M>>>,
    task: Option<JoinHandle<()>>,
}

struct Shared<M> {
    name: String,
    next_listener_id: AtomicU64,
    inner: Mutex<Inner<M>>,
}

impl<M> Shared<M> {
    fn lock(&self) -> MutexGuard<'_, Inner<M>> {
        // Listeners run outside the lock, so a poisoned lock still holds consistent state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removal side of a listener list, erased over the message type.
trait ListenerRegistry: Send + Sync {
    fn remove(&self, listener_id: u64) -> bool;
}

impl<M: Send + Sync + 'static> ListenerRegistry for Shared<M> {
    fn remove(&self, listener_id: u64) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(id, _)| *id != listener_id);
        let removed = inner.listeners.len() != before;

        if removed {
            debug!(broadcaster = %self.name, listener_id, "unregistered listener");
        }

        removed
    }
}

/// Token returned by [`Broadcaster::register`].
///
/// Identifies exactly one registration. It only holds a weak reference to the broadcaster, so
/// it neither keeps the broadcaster alive nor fails once the broadcaster is gone.
#[derive(Clone)]
pub struct ListenerRegistration {
    listener_id: u64,
    registry: Weak<dyn ListenerRegistry>,
}

impl ListenerRegistration {
    /// Removes the listener from its broadcaster.
    ///
    /// Returns `true` if the listener was registered. Calling it again is a no-op returning
    /// `false`.
    pub fn unregister(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.listener_id),
            None => false,
        }
    }

    pub fn id(&self) -> u64 {
        self.listener_id
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("listener_id", &self.listener_id)
            .finish()
    }
}

/// Publish/subscribe hub delivering messages to in-process listeners.
///
/// Deliveries run one at a time on a dedicated task, in the order they were enqueued, so
/// producers are never blocked by slow listeners. A broadcast is addressed to the listeners
/// registered at the moment it is made: later registrations do not see it, and removals
/// after that moment do not cancel it.
///
/// Cloning yields another handle to the same broadcaster.
pub struct Broadcaster<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for Broadcaster<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M> fmt::Debug for Broadcaster<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Broadcaster")
            .field("name", &self.shared.name)
            .finish_non_exhaustive()
    }
}

impl<M> Broadcaster<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a broadcaster and spawns its delivery task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(deliver(name.clone(), receiver));

        Self {
            shared: Arc::new(Shared {
                name,
                next_listener_id: AtomicU64::new(0),
                inner: Mutex::new(Inner {
                    listeners: Vec::new(),
                    sender: Some(sender),
                    task: Some(task),
                }),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Registers a listener that receives every subsequent broadcast.
    pub fn register<F>(&self, listener: F) -> ListenerRegistration
    where
        F: Fn(&M, &BroadcastContext) + Send + Sync + 'static,
    {
        let listener_id = self.shared.next_listener_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut inner = self.shared.lock();
            inner.listeners.push((listener_id, Arc::new(listener)));
        }

        debug!(broadcaster = %self.shared.name, listener_id, "registered listener");

        let registry: Arc<dyn ListenerRegistry> = self.shared.clone();
        ListenerRegistration {
            listener_id,
            registry: Arc::downgrade(&registry),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.lock().listeners.len()
    }

    /// Enqueues `message` for every listener currently registered.
    ///
    /// Never blocks. After [`Broadcaster::shutdown`] the message is logged and dropped.
    pub fn broadcast(&self, message: M, context: BroadcastContext) {
        let inner = self.shared.lock();

        let Some(sender) = inner.sender.as_ref() else {
            warn!(
                broadcaster = %self.shared.name,
                "broadcaster is shut down, dropping message"
            );
            return;
        };

        let message = Arc::new(message);
        for (listener_id, listener) in &inner.listeners {
            let delivery = Delivery::Message {
                listener_id: *listener_id,
                listener: listener.clone(),
                message: message.clone(),
                context,
            };

            if sender.send(delivery).is_err() {
                warn!(
                    broadcaster = %self.shared.name,
                    "delivery task has stopped, dropping message"
                );
                return;
            }
        }
    }

    /// Waits until every delivery enqueued before this call has run.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();

        {
            let inner = self.shared.lock();
            let Some(sender) = inner.sender.as_ref() else {
                return;
            };
            if sender.send(Delivery::Flush(done_tx)).is_err() {
                return;
            }
        }

        let _ = done_rx.await;
    }

    /// Stops accepting messages, delivers what is already queued and waits for the delivery
    /// task to exit.
    ///
    /// Calling it more than once is a no-op.
    pub async fn shutdown(&self) {
        let task = {
            let mut inner = self.shared.lock();
            // Dropping the sender lets the delivery task drain the queue and finish.
            inner.sender = None;
            inner.task.take()
        };

        let Some(task) = task else {
            return;
        };

        if let Err(err) = task.await {
            error!(broadcaster = %self.shared.name, error = %err, "delivery task failed");
        }

        debug!(broadcaster = %self.shared.name, "broadcaster shut down");
    }
}

async fn deliver<M>(name: String, mut receiver: mpsc::UnboundedReceiver<Delivery<M>>) {
    while let Some(delivery) = receiver.recv().await {
        match delivery {
            Delivery::Message {
                listener_id,
                listener,
                message,
                context,
            } => {
                let result =
                    catch_unwind(AssertUnwindSafe(|| listener(message.as_ref(), &context)));

                if let Err(payload) = result {
                    error!(
                        broadcaster = %name,
                        listener_id,
                        panic = %panic_message(payload.as_ref()),
                        "listener panicked while handling a message"
                    );
                }
            }
            Delivery::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    fn collecting(
        broadcaster: &Broadcaster<u32>,
    ) -> (Arc<StdMutex<Vec<u32>>>, ListenerRegistration) {
        let received = Arc::new(StdMutex::new(Vec::new()));
        let sink = received.clone();
        let registration = broadcaster.register(move |message: &u32, _| {
            sink.lock().unwrap().push(*message);
        });
        (received, registration)
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let broadcaster = Broadcaster::new("test");
        let (received, _registration) = collecting(&broadcaster);

        for message in 0..100 {
            broadcaster.broadcast(message, BroadcastContext::default());
        }
        broadcaster.flush().await;

        assert_eq!(*received.lock().unwrap(), (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn unregistered_listener_receives_nothing_further() {
        let broadcaster = Broadcaster::new("test");
        let (received, registration) = collecting(&broadcaster);

        broadcaster.broadcast(1, BroadcastContext::default());
        broadcaster.flush().await;

        assert!(registration.unregister());
        assert!(!registration.unregister());
        assert_eq!(broadcaster.listener_count(), 0);

        broadcaster.broadcast(2, BroadcastContext::default());
        broadcaster.flush().await;

        assert_eq!(*received.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_delivery() {
        let broadcaster = Broadcaster::new("test");
        let _panicking = broadcaster.register(|_: &u32, _| panic!("listener failure"));
        let (received, _registration) = collecting(&broadcaster);

        broadcaster.broadcast(1, BroadcastContext::default());
        broadcaster.broadcast(2, BroadcastContext::default());
        broadcaster.flush().await;

        assert_eq!(*received.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn messages_after_shutdown_are_dropped() {
        let broadcaster = Broadcaster::new("test");
        let (received, registration) = collecting(&broadcaster);

        broadcaster.broadcast(1, BroadcastContext::default());
        broadcaster.shutdown().await;
        broadcaster.broadcast(2, BroadcastContext::default());
        broadcaster.shutdown().await;

        assert_eq!(*received.lock().unwrap(), vec![1]);
        assert!(registration.unregister());
    }

    #[tokio::test]
    async fn registration_outlives_broadcaster() {
        let broadcaster = Broadcaster::<u32>::new("test");
        let registration = broadcaster.register(|_, _| {});

        drop(broadcaster);

        assert!(!registration.unregister());
    }

    #[tokio::test]
    async fn context_is_passed_to_listeners() {
        let broadcaster = Broadcaster::new("test");
        let seen = Arc::new(StdMutex::new(None));
        let sink = seen.clone();
        let _registration = broadcaster.register(move |_: &u32, context: &BroadcastContext| {
            *sink.lock().unwrap() = context.run_id;
        });

        broadcaster.broadcast(1, BroadcastContext::for_run(JobId(9)));
        broadcaster.flush().await;

        assert_eq!(*seen.lock().unwrap(), Some(JobId(9)));
    }
}
