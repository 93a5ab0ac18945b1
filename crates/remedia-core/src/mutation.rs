//! Writes with cache invalidation.
//!
//! A [`Mutation`] runs one write exactly once. On success it invalidates the
//! keys it declares and returns without waiting for the refetches, so a view
//! may render stale data for one cycle after the write. On failure the error
//! goes back to the caller untouched.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::query::{QueryClient, QueryKey};
use crate::Result;

/// A named write and the cache keys it makes stale.
#[derive(Clone)]
pub struct Mutation {
    name: String,
    invalidates: Vec<QueryKey>,
    queries: QueryClient,
}

/// Result of a write issued under an [`Intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settled<T> {
    /// The write belonged to the latest intent and its effects were applied.
    Applied(T),
    /// A newer intent for the same entity was issued while this write was in
    /// flight; the response was discarded.
    Superseded,
}

impl Mutation {
    pub fn new(queries: &QueryClient, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            invalidates: Vec::new(),
            queries: queries.clone(),
        }
    }

    #[must_use]
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invalidated_keys(&self) -> &[QueryKey] {
        &self.invalidates
    }

    /// Run the write. Never retried.
    pub async fn run<T, Fut>(&self, write: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match write.await {
            Ok(value) => {
                self.invalidate_declared();
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(mutation = %self.name, "Mutation failed: {}", error);
                Err(error)
            }
        }
    }

    /// Run the write with an optimistic cache update.
    ///
    /// `update` is applied to the cached value under `key` before the write
    /// starts. If the write fails the previous value is restored and the key
    /// is invalidated so the server state wins on the next read.
    pub async fn run_optimistic<V, T, U, Fut>(
        &self,
        key: &QueryKey,
        update: U,
        write: Fut,
    ) -> Result<T>
    where
        V: Send + Sync + 'static,
        U: FnOnce(&V) -> V,
        Fut: Future<Output = Result<T>>,
    {
        let snapshot = self.apply_optimistic(key, update);
        match self.run(write).await {
            Ok(value) => Ok(value),
            Err(error) => {
                self.roll_back(key, snapshot);
                Err(error)
            }
        }
    }

    /// Like [`Self::run_optimistic`], but the response only takes effect if
    /// `intent` is still the latest for its entity when it arrives. Older
    /// responses neither invalidate nor roll back, so the cache reflects the
    /// last user intent regardless of the order responses arrive in.
    pub async fn run_intent<V, T, U, Fut>(
        &self,
        intent: &Intent,
        key: &QueryKey,
        update: U,
        write: Fut,
    ) -> Result<Settled<T>>
    where
        V: Send + Sync + 'static,
        U: FnOnce(&V) -> V,
        Fut: Future<Output = Result<T>>,
    {
        let snapshot = self.apply_optimistic(key, update);
        let result = write.await;

        if !intent.is_latest() {
            match &result {
                Ok(_) => tracing::debug!(
                    mutation = %self.name,
                    entity = %intent.entity,
                    ticket = intent.ticket,
                    "Discarding superseded mutation response"
                ),
                Err(error) => tracing::warn!(
                    mutation = %self.name,
                    entity = %intent.entity,
                    ticket = intent.ticket,
                    "Superseded mutation failed: {}",
                    error
                ),
            }
            return Ok(Settled::Superseded);
        }

        match result {
            Ok(value) => {
                self.invalidate_declared();
                Ok(Settled::Applied(value))
            }
            Err(error) => {
                tracing::warn!(mutation = %self.name, "Mutation failed: {}", error);
                self.roll_back(key, snapshot);
                Err(error)
            }
        }
    }

    fn apply_optimistic<V, U>(&self, key: &QueryKey, update: U) -> Option<Arc<V>>
    where
        V: Send + Sync + 'static,
        U: FnOnce(&V) -> V,
    {
        let snapshot = self.queries.get_query_data::<V>(key);
        if let Some(previous) = &snapshot {
            self.queries.set_query_data(key, Arc::new(update(previous)));
        }
        snapshot
    }

    fn roll_back<V: Send + Sync + 'static>(&self, key: &QueryKey, snapshot: Option<Arc<V>>) {
        if let Some(previous) = snapshot {
            tracing::debug!(mutation = %self.name, key = %key, "Rolling back optimistic update");
            self.queries.set_query_data(key, previous);
        }
        self.queries.invalidate(key);
    }

    fn invalidate_declared(&self) {
        for key in &self.invalidates {
            self.queries.invalidate(key);
        }
    }
}

/// Orders user intents per entity so late responses can be recognized.
#[derive(Debug, Clone, Default)]
pub struct IntentSequencer {
    latest: Arc<Mutex<HashMap<String, u64>>>,
}

impl IntentSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new intent for `entity`, superseding earlier ones.
    pub fn begin(&self, entity: &str) -> Intent {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = latest.entry(entity.to_string()).or_insert(0);
        *ticket += 1;
        Intent {
            sequencer: self.clone(),
            entity: entity.to_string(),
            ticket: *ticket,
        }
    }

    pub fn is_latest(&self, entity: &str, ticket: u64) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity)
            .is_some_and(|latest| *latest == ticket)
    }
}

/// One user intent for an entity.
#[derive(Debug, Clone)]
pub struct Intent {
    sequencer: IntentSequencer,
    entity: String,
    ticket: u64,
}

impl Intent {
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn is_latest(&self) -> bool {
        self.sequencer.is_latest(&self.entity, self.ticket)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::QueryConfig;
    use crate::query::keys;
    use crate::Error;

    fn counting_fetcher(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<Result<Vec<String>>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(vec![format!("remedy-{call}")]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn successful_write_invalidates_declared_keys_once() {
        let queries = QueryClient::new(QueryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let key = keys::remedies();
        let options = queries.default_options();
        queries
            .fetch_query(key.clone(), options, counting_fetcher(&calls))
            .await
            .unwrap();

        let mutation = Mutation::new(&queries, "create-remedy")
            .invalidates(keys::remedies())
            .invalidates(keys::all_user_remedies());
        let writes = AtomicUsize::new(0);
        mutation
            .run(async {
                writes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(writes.load(Ordering::SeqCst), 1);
        assert!(queries.is_stale(&key));

        // First read after the write serves stale data and refetches once.
        queries
            .fetch_query(key.clone(), options, counting_fetcher(&calls))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        queries
            .fetch_query(key.clone(), options, counting_fetcher(&calls))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_write_is_returned_and_invalidates_nothing() {
        let queries = QueryClient::new(QueryConfig::default());
        queries.set_query_data(&keys::remedies(), Arc::new(vec!["cached".to_string()]));

        let error = Mutation::new(&queries, "create-remedy")
            .invalidates(keys::remedies())
            .run(async { Err::<(), _>(Error::http(500, "boom")) })
            .await
            .unwrap_err();

        assert_eq!(error, Error::http(500, "boom"));
        assert!(!queries.is_stale(&keys::remedies()));
    }

    #[tokio::test]
    async fn optimistic_update_rolls_back_on_failure() {
        let queries = QueryClient::new(QueryConfig::default());
        let key = keys::list("videos");
        queries.set_query_data(&key, Arc::new(vec![false]));

        let mutation = Mutation::new(&queries, "toggle");
        let seen_during_write = {
            let queries = queries.clone();
            let key = key.clone();
            move || queries.get_query_data::<Vec<bool>>(&key)
        };
        let error = mutation
            .run_optimistic(&key, |flags: &Vec<bool>| flags.iter().map(|f| !f).collect(), async {
                assert_eq!(seen_during_write().as_deref(), Some(&vec![true]));
                Err::<(), _>(Error::Network("offline".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Network(_)));
        assert_eq!(
            queries.get_query_data::<Vec<bool>>(&key).as_deref(),
            Some(&vec![false])
        );
    }

    #[test]
    fn sequencer_tracks_latest_intent_per_entity() {
        let sequencer = IntentSequencer::new();
        let first = sequencer.begin("video-1");
        let other = sequencer.begin("video-2");
        let second = sequencer.begin("video-1");

        assert!(!first.is_latest());
        assert!(second.is_latest());
        assert!(other.is_latest());
        assert!(second.ticket() > first.ticket());
    }

    #[tokio::test]
    async fn superseded_response_does_not_touch_cache() {
        let queries = QueryClient::new(QueryConfig::default());
        let key = keys::list("videos");
        queries.set_query_data(&key, Arc::new(false));
        let sequencer = IntentSequencer::new();
        let mutation = Mutation::new(&queries, "toggle").invalidates(key.clone());

        let first = sequencer.begin("video-1");
        let settled_first = mutation
            .run_intent(&first, &key, |_: &bool| true, async {
                sequencer.begin("video-1");
                Err::<(), _>(Error::http(500, "late failure"))
            })
            .await
            .unwrap();

        assert_eq!(settled_first, Settled::Superseded);
        assert_eq!(queries.get_query_data::<bool>(&key).as_deref(), Some(&true));
        assert!(!queries.is_stale(&key));
    }
}
