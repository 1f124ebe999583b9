//! Reactive cells that keep a fetched value fresh while observed.

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::debug;

use super::{Callback, CallbackId, Topic, TopicRegistry};

type Fetch<T> = Box<dyn Fn() -> BoxFuture<'static, Option<T>> + Send + Sync>;

/// A cached value bound to a fetch function and a [`Topic`].
///
/// While at least one [`Observer`] is alive the cell holds exactly one
/// registration under its topic; every notification re-runs the fetch.
/// A fetch resolving to `None` leaves the previous value in place, and a
/// result is only stored if no newer fetch was issued in the meantime.
///
/// Fetches are spawned onto the ambient tokio runtime.
pub struct Updater<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Updater<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    topic: Topic,
    registry: Arc<TopicRegistry>,
    fetch: Fetch<T>,
    value: watch::Sender<Option<T>>,
    observers: Mutex<Observers>,
    flight: Mutex<Flight>,
    abort_superseded: bool,
}

/// The newest issued fetch. Issuing and storing both go through this lock,
/// so a result is compared and written against the same generation.
#[derive(Default)]
struct Flight {
    generation: u64,
    in_flight: Option<AbortHandle>,
}

#[derive(Default)]
struct Observers {
    count: usize,
    callback: Option<CallbackId>,
}

impl<T> Updater<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(registry: Arc<TopicRegistry>, topic: Topic, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self::build(registry, topic, fetch, false)
    }

    /// Like [`Updater::new`], but a new fetch aborts the one still in flight.
    pub fn aborting<F, Fut>(registry: Arc<TopicRegistry>, topic: Topic, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self::build(registry, topic, fetch, true)
    }

    fn build<F, Fut>(
        registry: Arc<TopicRegistry>,
        topic: Topic,
        fetch: F,
        abort_superseded: bool,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        let (value, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                topic,
                registry,
                fetch: Box::new(move || fetch().boxed()),
                value,
                observers: Mutex::new(Observers::default()),
                flight: Mutex::new(Flight::default()),
                abort_superseded,
            }),
        }
    }

    pub fn topic(&self) -> Topic {
        self.inner.topic
    }

    /// Start observing. The first observer registers the cell under its
    /// topic and triggers the initial fetch; later ones only bump the count.
    /// Dropping the returned handle releases it.
    pub fn observe(&self) -> Observer<T> {
        let rx = self.inner.value.subscribe();

        let mut observers = self.inner.observers.lock().unwrap();
        if observers.count == 0 {
            let weak = Arc::downgrade(&self.inner);
            let callback: Callback = Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.trigger();
                }
            });
            observers.callback = Some(self.inner.registry.register(self.inner.topic, callback));
            self.inner.trigger();
        }
        observers.count += 1;
        drop(observers);

        Observer {
            inner: Arc::clone(&self.inner),
            rx,
        }
    }

    /// Last stored value, without observing.
    pub fn value(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Fetch and store once, regardless of observers. Used when something
    /// the fetch depends on has changed outside the update socket.
    pub async fn update(&self) {
        // An aborted fetch was superseded by a newer one; nothing to report.
        let _ = self.inner.trigger().await;
    }

    pub fn observers(&self) -> usize {
        self.inner.observers.lock().unwrap().count
    }
}

impl<T> Inner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The fetch closure runs under the flight lock and must only build
    /// its future.
    fn trigger(self: &Arc<Self>) -> JoinHandle<()> {
        let mut flight = self.flight.lock().unwrap();
        flight.generation += 1;
        let generation = flight.generation;
        let fetch = (self.fetch)();
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            if let Some(value) = fetch.await {
                inner.store(generation, value);
            }
        });

        let previous = flight.in_flight.replace(handle.abort_handle());
        if self.abort_superseded
            && let Some(previous) = previous
        {
            previous.abort();
        }
        handle
    }

    fn store(&self, generation: u64, value: T) {
        let flight = self.flight.lock().unwrap();
        if flight.generation != generation {
            debug!(topic = ?self.topic, generation, "discarding superseded fetch result");
            return;
        }
        self.value.send_replace(Some(value));
    }
}

impl<T> Inner<T> {
    fn release(&self) {
        let mut observers = self.observers.lock().unwrap();
        observers.count = observers.count.saturating_sub(1);
        if observers.count == 0
            && let Some(id) = observers.callback.take()
        {
            self.registry.unregister(id, self.topic);
        }
    }
}

/// A live view of an [`Updater`]. Holding it keeps the cell subscribed.
pub struct Observer<T> {
    inner: Arc<Inner<T>>,
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> Observer<T> {
    /// Last stored value; `None` until the first fetch resolves.
    pub fn value(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Wait until a new value is stored, then return it.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    pub fn topic(&self) -> Topic {
        self.inner.topic
    }
}

impl<T> Drop for Observer<T> {
    fn drop(&mut self) {
        self.inner.release();
    }
}
