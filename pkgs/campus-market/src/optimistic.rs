//! Optimistic mutations with rollback
//!
//! [`apply_optimistic`] publishes the local effect of a change before the
//! remote write finishes, then either keeps it or restores the exact prior
//! value. Observers of a [`SharedState`] only ever see the value before the
//! change or the value after it.

use std::future::Future;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::notify::Notification;
use crate::MarketError;

/// Application state observed by the UI and mutated through
/// [`apply_optimistic`] or replaced wholesale by a feed
pub struct SharedState<T> {
    value: watch::Sender<T>,
    mutations: Mutex<()>,
}

impl<T: Clone> SharedState<T> {
    pub fn new(initial: T) -> Self {
        let (value, _) = watch::channel(initial);
        Self {
            value,
            mutations: Mutex::new(()),
        }
    }

    /// Copy of the current value
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.value.subscribe()
    }

    /// Replace the whole value, returning the previous one
    pub fn replace(&self, value: T) -> T {
        self.value.send_replace(value)
    }
}

impl<T: Clone + Default> Default for SharedState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Texts shown when a mutation settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationNotices {
    pub success: String,
    /// Shown when the store rejects the caller
    pub denied: String,
    /// Shown for any other failure; `{error}` is replaced by the cause
    pub failed: String,
}

impl MutationNotices {
    pub fn new(
        success: impl Into<String>,
        denied: impl Into<String>,
        failed: impl Into<String>,
    ) -> Self {
        Self {
            success: success.into(),
            denied: denied.into(),
            failed: failed.into(),
        }
    }

    fn failure(&self, error: &MarketError) -> Notification {
        if error.is_permission_denied() {
            return Notification::error(self.denied.clone());
        }

        let cause = match error {
            MarketError::RemoteFailure(msg) => msg.clone(),
            other => other.to_string(),
        };
        Notification::error(self.failed.replace("{error}", &cause))
    }
}

/// How an optimistic mutation settled
#[derive(Debug)]
pub enum Outcome<R> {
    /// The remote write succeeded and the local change was kept
    Committed { value: R, notification: Notification },
    /// The remote write failed and the prior value was restored
    RolledBack {
        error: MarketError,
        notification: Notification,
    },
}

impl<R> Outcome<R> {
    pub fn is_committed(&self) -> bool {
        matches!(self, Outcome::Committed { .. })
    }

    pub fn notification(&self) -> &Notification {
        match self {
            Outcome::Committed { notification, .. } | Outcome::RolledBack { notification, .. } => {
                notification
            }
        }
    }

    pub fn into_result(self) -> Result<R, MarketError> {
        match self {
            Outcome::Committed { value, .. } => Ok(value),
            Outcome::RolledBack { error, .. } => Err(error),
        }
    }
}

/// Apply `transition` to `state` immediately, then await `remote`.
///
/// On failure the state is restored to the value captured right before the
/// transition (full replace). Mutations of the same state are serialized:
/// a second call waits until the first has settled. No retry is attempted.
pub async fn apply_optimistic<T, R, E, Fut>(
    state: &SharedState<T>,
    transition: impl FnOnce(&mut T),
    remote: Fut,
    notices: &MutationNotices,
) -> Outcome<R>
where
    T: Clone,
    Fut: Future<Output = Result<R, E>>,
    E: Into<MarketError>,
{
    let _serialized = state.mutations.lock().await;

    let snapshot = state.get();
    let mut next = snapshot.clone();
    transition(&mut next);
    state.value.send_replace(next);
    debug!("Optimistic change published");

    match remote.await {
        Ok(value) => {
            info!("Mutation committed: {}", notices.success);
            Outcome::Committed {
                value,
                notification: Notification::success(notices.success.clone()),
            }
        }
        Err(err) => {
            let error = err.into();
            state.value.send_replace(snapshot);
            warn!("Mutation rolled back: {}", error);
            Outcome::RolledBack {
                notification: notices.failure(&error),
                error,
            }
        }
    }
}
