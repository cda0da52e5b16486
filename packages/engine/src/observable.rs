//! Minimal multi-subscriber publish/subscribe stream.
//!
//! Every live subscriber receives every emitted value, in emission order.
//! A subscriber may ask for the most recent value to be replayed on
//! subscribe, and may tie its lifetime to a [`CancellationToken`]: once
//! the token is cancelled the callback is never invoked again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observer<T> {
    callback: Callback<T>,
    cancel: Option<CancellationToken>,
}

impl<T> Observer<T> {
    fn is_live(&self) -> bool {
        self.cancel
            .as_ref()
            .is_none_or(|token| !token.is_cancelled())
    }
}

/// Options for [`Observable::subscribe`].
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Immediately deliver the last emitted value, if any.
    pub replay_latest: bool,
    /// Unsubscribe when this token is cancelled.
    pub cancel: Option<CancellationToken>,
}

impl SubscribeOptions {
    /// Options that replay the last value.
    #[must_use]
    pub const fn replay() -> Self {
        Self {
            replay_latest: true,
            cancel: None,
        }
    }

    /// Ties the subscription to `token`.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// A stream of values pushed to registered callbacks.
pub struct Observable<T> {
    observers: Mutex<Vec<Observer<T>>>,
    latest: Mutex<Option<T>>,
}

impl<T> Default for Observable<T> {
    fn default() -> Self {
        Self {
            observers: Mutex::new(Vec::new()),
            latest: Mutex::new(None),
        }
    }
}

impl<T: Clone> Observable<T> {
    /// Creates a stream with no subscribers and no value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for every future value.
    ///
    /// Subscribing with an already-cancelled token is a no-op.
    pub fn subscribe(
        &self,
        callback: impl Fn(&T) + Send + Sync + 'static,
        options: SubscribeOptions,
    ) {
        let observer = Observer {
            callback: Arc::new(callback),
            cancel: options.cancel,
        };
        if !observer.is_live() {
            return;
        }

        let callback = observer.callback.clone();
        lock(&self.observers).push(observer);

        if options.replay_latest {
            let latest = lock(&self.latest).clone();
            if let Some(value) = latest {
                callback(&value);
            }
        }
    }

    /// Records `value` as the latest and delivers it to every live
    /// subscriber. Cancelled subscribers are dropped.
    pub fn next(&self, value: T) {
        *lock(&self.latest) = Some(value.clone());

        // Callbacks run without the lock held so they may subscribe.
        let callbacks: Vec<Callback<T>> = {
            let mut observers = lock(&self.observers);
            observers.retain(Observer::is_live);
            observers.iter().map(|o| o.callback.clone()).collect()
        };

        for callback in callbacks {
            callback(&value);
        }
    }

    /// The last emitted value.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        lock(&self.latest).clone()
    }

    /// Number of subscribers whose token has not been cancelled.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.observers).iter().filter(|o| o.is_live()).count()
    }
}

fn lock<V>(mutex: &Mutex<V>) -> MutexGuard<'_, V> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
