//! At most one enrichment per entity at a time.
//!
//! The first caller for a key becomes the leader and runs the work; callers
//! arriving while it runs wait for the leader's result instead of starting a
//! second run. If the leader is dropped before finishing, one of the waiting
//! callers takes over. A waiting caller may also refuse the leader's result
//! and run again once the leader is done.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use tokio::sync::watch;

pub(crate) struct InFlight<K, V> {
    running: Mutex<HashMap<K, watch::Receiver<Option<V>>>>,
}

enum Role<V> {
    Leader(watch::Sender<Option<V>>),
    Follower(watch::Receiver<Option<V>>),
}

/// Removes the leader's entry when the leader finishes or is dropped.
struct LeaderGuard<'a, K: Eq + Hash, V> {
    inflight: &'a InFlight<K, V>,
    key: K,
    receiver: watch::Receiver<Option<V>>,
}

impl<K: Eq + Hash, V> Drop for LeaderGuard<'_, K, V> {
    fn drop(&mut self) {
        let mut running = self.inflight.lock();
        if running
            .get(&self.key)
            .map(|rx| rx.same_channel(&self.receiver))
            .unwrap_or(false)
        {
            running.remove(&self.key);
        }
    }
}

impl<K, V> Default for InFlight<K, V> {
    fn default() -> Self {
        Self {
            running: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V> InFlight<K, V> {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, watch::Receiver<Option<V>>>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    pub fn is_running(&self, key: &K) -> bool {
        self.lock().contains_key(key)
    }
}

impl<K, V> InFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        self.run_accepting(key, |_| true, work).await
    }

    /// Runs `work` unless another caller is already running `key`. A follower
    /// only takes the leader's result when `accept` approves it. A rejected result makes the follower wait
    /// for the leader to finish and then run `work` itself.
    pub async fn run_accepting<A, F, Fut>(&self, key: K, accept: A, work: F) -> V
    where
        A: Fn(&V) -> bool,
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let tx = loop {
            match self.join(&key) {
                Role::Leader(tx) => break tx,
                Role::Follower(mut rx) => match wait_for_leader(&mut rx).await {
                    Some(value) if accept(&value) => return value,
                    // Rejected, or the leader vanished without a result.
                    _ => continue,
                },
            }
        };

        let _guard = LeaderGuard {
            inflight: self,
            key,
            receiver: tx.subscribe(),
        };
        let value = work().await;
        let _ = tx.send(Some(value.clone()));
        value
    }

    fn join(&self, key: &K) -> Role<V> {
        let mut running = self.lock();
        if let Some(rx) = running.get(key) {
            // A finished leader whose entry is not yet removed is not joined.
            if rx.has_changed().is_ok() && rx.borrow().is_none() {
                return Role::Follower(rx.clone());
            }
        }
        let (tx, rx) = watch::channel(None);
        running.insert(key.clone(), rx);
        Role::Leader(tx)
    }
}

async fn wait_for_leader<V: Clone>(rx: &mut watch::Receiver<Option<V>>) -> Option<V> {
    loop {
        if let Some(value) = rx.borrow_and_update().clone() {
            return Some(value);
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}
