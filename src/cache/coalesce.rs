//! Per-key request coalescing for the cache fill path.
//!
//! The first caller for a key becomes the leader and drives the producer
//! itself. Callers arriving while that production is outstanding subscribe to
//! the leader's outcome instead of starting another one. The registry entry is
//! removed the moment the outcome is published, so the next caller after that
//! starts fresh.

use std::{future::Future, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use metrics::counter;
use thiserror::Error;
use tokio::{
    sync::watch,
    time::{Instant, timeout_at},
};

type Outcome<T, E> = Option<Result<T, E>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoalesceError<E> {
    /// The producer failed; every waiter sees the same error.
    #[error("{0}")]
    Producer(E),
    /// This caller's own deadline passed before an outcome was available.
    #[error("deadline exceeded while waiting for upstream result")]
    DeadlineExceeded,
    /// The leader went away (cancelled or panicked) without publishing an outcome.
    #[error("in-flight request was abandoned before completing")]
    Abandoned,
}

/// Deduplicates concurrent productions that share a key.
///
/// Results are not retained once delivered; caching is the caller's concern.
pub struct Coalescer<T, E> {
    inflight: Arc<DashMap<String, watch::Receiver<Outcome<T, E>>>>,
}

impl<T, E> Default for Coalescer<T, E> {
    fn default() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
        }
    }
}

impl<T, E> Clone for Coalescer<T, E> {
    fn clone(&self) -> Self {
        Self {
            inflight: Arc::clone(&self.inflight),
        }
    }
}

enum Role<T, E> {
    Leader(Flight<T, E>),
    Follower(watch::Receiver<Outcome<T, E>>),
}

impl<T: Clone, E: Clone> Coalescer<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a production currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Run `producer` for `key` unless an identical production is already
    /// running, in which case wait for and return its outcome.
    pub async fn run<F, Fut>(&self, key: &str, producer: F) -> Result<T, CoalesceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_until(key, None, producer).await
    }

    /// Like [`run`](Self::run), bounded by this caller's `deadline`.
    ///
    /// A follower whose deadline passes stops waiting and returns
    /// [`CoalesceError::DeadlineExceeded`]; the production carries on for
    /// everyone else. A leader whose deadline passes drops its producer, and
    /// the followers it was serving receive [`CoalesceError::Abandoned`].
    pub async fn run_until<F, Fut>(
        &self,
        key: &str,
        deadline: Option<Instant>,
        producer: F,
    ) -> Result<T, CoalesceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.join(key) {
            Role::Follower(mut receiver) => {
                counter!("pokedex_coalesce_shared_total").increment(1);
                match deadline {
                    Some(deadline) => timeout_at(deadline, wait_for_outcome(&mut receiver))
                        .await
                        .map_err(|_| CoalesceError::DeadlineExceeded)?,
                    None => wait_for_outcome(&mut receiver).await,
                }
            }
            Role::Leader(flight) => {
                let outcome = match deadline {
                    Some(deadline) => timeout_at(deadline, producer())
                        .await
                        .map_err(|_| CoalesceError::DeadlineExceeded)?,
                    None => producer().await,
                };
                flight.publish(outcome.clone());
                outcome.map_err(CoalesceError::Producer)
            }
        }
    }

    fn join(&self, key: &str) -> Role<T, E> {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(occupied) => Role::Follower(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = watch::channel(None);
                vacant.insert(receiver);
                Role::Leader(Flight {
                    key: key.to_string(),
                    sender: Some(sender),
                    inflight: Arc::clone(&self.inflight),
                })
            }
        }
    }
}

async fn wait_for_outcome<T: Clone, E: Clone>(
    receiver: &mut watch::Receiver<Outcome<T, E>>,
) -> Result<T, CoalesceError<E>> {
    let Ok(outcome) = receiver.wait_for(Option::is_some).await else {
        return Err(CoalesceError::Abandoned);
    };

    match outcome.as_ref() {
        Some(Ok(value)) => Ok(value.clone()),
        Some(Err(err)) => Err(CoalesceError::Producer(err.clone())),
        None => Err(CoalesceError::Abandoned),
    }
}

/// Leader's claim on a registry slot.
///
/// Dropping an unpublished flight unregisters the key and closes the channel,
/// which resolves every follower with [`CoalesceError::Abandoned`].
struct Flight<T, E> {
    key: String,
    sender: Option<watch::Sender<Outcome<T, E>>>,
    inflight: Arc<DashMap<String, watch::Receiver<Outcome<T, E>>>>,
}

impl<T, E> Flight<T, E> {
    fn publish(mut self, outcome: Result<T, E>) {
        self.inflight.remove(&self.key);
        if let Some(sender) = self.sender.take() {
            sender.send_replace(Some(outcome));
        }
    }
}

impl<T, E> Drop for Flight<T, E> {
    fn drop(&mut self) {
        // Only an unpublished flight still owns its registry entry.
        if self.sender.is_some() {
            self.inflight.remove(&self.key);
        }
    }
}
