//! Singleflight coalescing of cache refreshes.
//!
//! A [`Coalescer`] owns one lock guarding the caller's cached state together
//! with the marker of the fetch currently in flight. Callers that find the
//! state stale either start a fetch or attach to the one already running;
//! every attached caller observes the same settled result.
//!
//! The fetch runs on its own task, so a caller that stops waiting (deadline,
//! dropped request) does not cancel it for the others. When the fetch
//! settles, the successful value is committed to the state and the in-flight
//! marker is cleared in a single critical section: a caller arriving right
//! after sees either the flight or the committed value, never neither.
//! Failures are delivered to all waiters and are not remembered.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinError;
use tracing::{error, trace};

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E, K> {
    key: K,
    generation: u64,
    flight: Flight<T, E>,
}

struct Slot<T, E, S, K> {
    state: S,
    in_flight: Option<InFlight<T, E, K>>,
    generation: u64,
}

impl<T, E, S, K> Slot<T, E, S, K> {
    /// Clear the in-flight marker if it still belongs to `generation`.
    fn settle(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|current| current.generation == generation)
        {
            self.in_flight = None;
        }
    }
}

/// Ensures overlapping callers share one execution of a fetch.
///
/// `S` is the state the owning cache keeps under the same lock (use `()` when
/// the coalescer is used on its own) and `K` tags each flight so callers
/// interested in a different key never adopt its result.
pub struct Coalescer<T, E, S = (), K = ()> {
    slot: Arc<Mutex<Slot<T, E, S, K>>>,
}

impl<T, E> Default for Coalescer<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<JoinError> + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(())
    }
}

/// The lock is never held across an await, so poisoning only means a commit
/// closure panicked; the state it guards is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E, S, K> Coalescer<T, E, S, K>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<JoinError> + Send + Sync + 'static,
    S: Send + 'static,
    K: PartialEq + Send + Sync + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                state,
                in_flight: None,
                generation: 0,
            })),
        }
    }

    /// Run `fetch`, or join the execution already in flight.
    ///
    /// The settled result is not retained: a call made after settlement
    /// invokes `fetch` again.
    pub async fn run<F, Fut>(&self, fetch: F) -> Result<T, E>
    where
        K: Default,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.run_with(K::default(), |_| None, fetch, |_, _| {}).await
    }

    /// Serve from state when `fresh` says so, otherwise coalesce a fetch.
    ///
    /// `fresh` is evaluated under the lock. If a flight for the same `key` is
    /// running, the caller attaches to it; if a flight for another key is
    /// running, the caller waits for it to settle and evaluates again.
    /// Otherwise `fetch` is invoked (still under the lock, so it should only
    /// build the future) and spawned. On success `commit` writes the value
    /// into the state under the lock that clears the flight.
    pub async fn run_with<Fresh, F, Fut, Commit>(
        &self,
        key: K,
        fresh: Fresh,
        fetch: F,
        commit: Commit,
    ) -> Result<T, E>
    where
        Fresh: Fn(&S) -> Option<T> + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        Commit: FnOnce(&mut S, &T) + Send + 'static,
    {
        let flight = loop {
            let settling = {
                let mut slot = lock(&self.slot);
                if let Some(value) = fresh(&slot.state) {
                    return Ok(value);
                }
                match slot
                    .in_flight
                    .as_ref()
                    .map(|current| (current.key == key, current.flight.clone()))
                {
                    Some((true, flight)) => {
                        trace!("joining in-flight fetch");
                        break flight;
                    }
                    Some((false, other)) => other,
                    None => break self.start(&mut slot, key, fetch(), commit),
                }
            };
            trace!("waiting for a fetch of another key to settle");
            let _ = settling.await;
        };

        flight.await
    }

    /// Inspect the guarded state.
    pub fn with_state<R>(&self, inspect: impl FnOnce(&S) -> R) -> R {
        inspect(&lock(&self.slot).state)
    }

    /// Whether a fetch is currently outstanding.
    pub fn is_in_flight(&self) -> bool {
        lock(&self.slot).in_flight.is_some()
    }

    fn start<Fut, Commit>(
        &self,
        slot: &mut Slot<T, E, S, K>,
        key: K,
        fetch: Fut,
        commit: Commit,
    ) -> Flight<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        Commit: FnOnce(&mut S, &T) + Send + 'static,
    {
        slot.generation = slot.generation.wrapping_add(1);
        let generation = slot.generation;
        trace!(generation, "starting coalesced fetch");

        let task_slot = Arc::clone(&self.slot);
        let task = tokio::spawn(async move {
            let result = fetch.await;
            let mut slot = lock(&task_slot);
            if let Ok(value) = &result {
                commit(&mut slot.state, value);
            }
            slot.settle(generation);
            result
        });

        // A panicking fetch never reaches its own settle; clear it here.
        let abort_slot = Arc::clone(&self.slot);
        let flight = async move {
            task.await.unwrap_or_else(|join_error| {
                error!(error = %join_error, "coalesced fetch task aborted");
                lock(&abort_slot).settle(generation);
                Err(E::from(join_error))
            })
        }
        .boxed()
        .shared();

        slot.in_flight = Some(InFlight {
            key,
            generation,
            flight: flight.clone(),
        });
        flight
    }
}
