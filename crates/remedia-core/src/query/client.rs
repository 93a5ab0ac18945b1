//! Query client: cache slots, fetch deduplication, invalidation and
//! revalidation.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::{QueryKey, RetryPolicy};
use crate::config::QueryConfig;
use crate::{Error, Result};

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchFuture = Pin<Box<dyn Future<Output = Result<AnyData>> + Send>>;
type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Per-query policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub stale_time: Duration,
    pub retry: RetryPolicy,
    /// Disabled queries never fetch; used for dependent queries.
    pub enabled: bool,
}

impl QueryOptions {
    pub const fn from_config(config: &QueryConfig) -> Self {
        Self {
            stale_time: config.stale_time(),
            retry: config.retry_policy(),
            enabled: true,
        }
    }

    #[must_use]
    pub const fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Snapshot of one cache slot as seen by a consumer.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    /// No data yet and a fetch is in flight.
    pub is_loading: bool,
    /// Any fetch (initial or background) is in flight.
    pub is_fetching: bool,
    pub is_stale: bool,
    pub error: Option<Error>,
    pub updated_at: Option<Instant>,
}

impl<T> QueryState<T> {
    fn empty() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_fetching: false,
            is_stale: true,
            error: None,
            updated_at: None,
        }
    }
}

struct Entry {
    data: Option<AnyData>,
    error: Option<Error>,
    updated_at: Option<Instant>,
    /// Bumped by every invalidation of this key.
    epoch: u64,
    /// Epoch under which the current data was fetched.
    data_epoch: u64,
    /// Number of completed fetches, used to join concurrent requests.
    completed_fetches: u64,
    fetching: bool,
    observers: usize,
    options: QueryOptions,
    fetcher: Option<Fetcher>,
    fetch_lock: Arc<tokio::sync::Mutex<()>>,
    version: watch::Sender<u64>,
}

impl Entry {
    fn new(options: QueryOptions) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            data: None,
            error: None,
            updated_at: None,
            epoch: 0,
            data_epoch: 0,
            completed_fetches: 0,
            fetching: false,
            observers: 0,
            options,
            fetcher: None,
            fetch_lock: Arc::new(tokio::sync::Mutex::new(())),
            version,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.data.is_some()
            && self.data_epoch == self.epoch
            && self
                .updated_at
                .is_some_and(|at| now.duration_since(at) < self.options.stale_time)
    }

    fn notify(&self) {
        self.version.send_modify(|version| *version += 1);
    }

    fn state<T: Send + Sync + 'static>(&self, key: &QueryKey, now: Instant) -> QueryState<T> {
        let data = self.data.clone().and_then(|data| {
            data.downcast::<T>()
                .map_err(|_| tracing::warn!(key = %key, "Cached data has an unexpected type"))
                .ok()
        });
        QueryState {
            is_loading: self.fetching && data.is_none(),
            data,
            is_fetching: self.fetching,
            is_stale: !self.is_fresh(now),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    config: QueryConfig,
}

/// Process-wide query cache handle. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Default options derived from the client configuration.
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::from_config(&self.inner.config)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a query through the cache.
    ///
    /// Fresh data is returned without fetching. Stale data is returned
    /// immediately while one background refetch runs. Without data the
    /// caller waits for the fetch, retried per `options.retry`.
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        self.register(&key, options, erase(fetcher), false);
        let data = self.ensure(&key).await?;
        downcast(&key, data)
    }

    /// Mount a query: like a view subscribing to a key. The key stays
    /// mounted until the observer is dropped; mounted keys are refetched on
    /// invalidation, window focus and reconnect.
    pub async fn observe<T, F, Fut>(
        &self,
        key: QueryKey,
        options: QueryOptions,
        fetcher: F,
    ) -> QueryObserver<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let receiver = self.register(&key, options, erase(fetcher), true);
        let observer = QueryObserver {
            client: self.clone(),
            key,
            receiver,
            _marker: PhantomData,
        };

        if options.enabled {
            if let Err(error) = self.ensure(&observer.key).await {
                tracing::debug!(key = %observer.key, "Initial query fetch failed: {}", error);
            }
        }
        observer
    }

    /// Current state of a key without triggering a fetch.
    pub fn state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryState<T> {
        let now = Instant::now();
        self.entries()
            .get(key)
            .map_or_else(QueryState::empty, |entry| entry.state(key, now))
    }

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.state::<T>(key).data
    }

    /// Write data directly into a cache slot, marking it fresh.
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: Arc<T>) {
        let options = self.default_options();
        let mut entries = self.entries();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(options));
        entry.data = Some(value);
        entry.error = None;
        entry.updated_at = Some(Instant::now());
        entry.data_epoch = entry.epoch;
        entry.notify();
    }

    /// Drop a cache slot entirely.
    pub fn remove(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().remove(key) {
            entry.notify();
        }
    }

    /// Drop every slot whose key starts with `prefix`, so the next read
    /// waits for a fetch instead of serving old data.
    pub fn remove_matching(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = !key.starts_with(prefix);
            if !keep {
                entry.notify();
            }
            keep
        });
        before - entries.len()
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        self.entries()
            .get(key)
            .map_or(true, |entry| !entry.is_fresh(now))
    }

    /// Mark every key starting with `prefix` stale and refetch the mounted
    /// ones in the background. Returns the number of keys invalidated.
    ///
    /// Does not wait for refetches to finish.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut invalidated = 0;
        let mut refetch = Vec::new();
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
                entry.epoch += 1;
                entry.notify();
                invalidated += 1;
                if entry.observers > 0 && entry.options.enabled {
                    refetch.push(key.clone());
                }
            }
        }

        tracing::debug!(
            prefix = %prefix,
            invalidated,
            refetching = refetch.len(),
            "Invalidated queries"
        );
        for key in refetch {
            self.spawn_refetch(key);
        }
        invalidated
    }

    /// Revalidate mounted stale queries after the window regains focus.
    pub fn on_window_focus(&self) -> usize {
        if !self.inner.config.refetch_on_window_focus {
            return 0;
        }
        self.revalidate_mounted("window focus")
    }

    /// Revalidate mounted stale queries after the network comes back.
    pub fn on_reconnect(&self) -> usize {
        if !self.inner.config.refetch_on_reconnect {
            return 0;
        }
        self.revalidate_mounted("reconnect")
    }

    fn revalidate_mounted(&self, reason: &str) -> usize {
        let now = Instant::now();
        let stale = self
            .entries()
            .iter()
            .filter(|(_, entry)| {
                entry.observers > 0 && entry.options.enabled && !entry.is_fresh(now)
            })
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();

        tracing::debug!(reason, count = stale.len(), "Revalidating mounted queries");
        let count = stale.len();
        for key in stale {
            self.spawn_refetch(key);
        }
        count
    }

    fn register(
        &self,
        key: &QueryKey,
        options: QueryOptions,
        fetcher: Fetcher,
        mount: bool,
    ) -> watch::Receiver<u64> {
        let mut entries = self.entries();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(options));
        entry.options = options;
        entry.fetcher = Some(fetcher);
        if mount {
            entry.observers += 1;
        }
        entry.version.subscribe()
    }

    fn unmount(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }

    async fn ensure(&self, key: &QueryKey) -> Result<AnyData> {
        enum Plan {
            Fresh(AnyData),
            Stale(AnyData),
            Fetch,
        }

        let plan = {
            let now = Instant::now();
            let entries = self.entries();
            match entries.get(key) {
                Some(entry) if entry.is_fresh(now) => {
                    entry.data.clone().map_or(Plan::Fetch, Plan::Fresh)
                }
                Some(entry) => entry.data.clone().map_or(Plan::Fetch, Plan::Stale),
                None => Plan::Fetch,
            }
        };

        match plan {
            Plan::Fresh(data) => {
                tracing::debug!(key = %key, "Query cache hit");
                Ok(data)
            }
            Plan::Stale(data) => {
                tracing::debug!(key = %key, "Serving stale data, refetching in background");
                self.spawn_refetch(key.clone());
                Ok(data)
            }
            Plan::Fetch => self.fetch(key).await,
        }
    }

    /// Fetch `key` with its registered fetcher. Concurrent calls for the
    /// same key run one fetch; late arrivals receive its result.
    async fn fetch(&self, key: &QueryKey) -> Result<AnyData> {
        let (lock, requested_after) = {
            let entries = self.entries();
            let entry = entries
                .get(key)
                .ok_or_else(|| Error::Other(format!("query {key} is not registered")))?;
            (entry.fetch_lock.clone(), entry.completed_fetches)
        };
        let _fetch_guard = lock.lock_owned().await;

        let (fetcher, retry, epoch) = {
            let mut entries = self.entries();
            let entry = entries
                .get_mut(key)
                .ok_or_else(|| Error::Other(format!("query {key} was removed")))?;

            if entry.completed_fetches != requested_after && entry.is_fresh(Instant::now()) {
                if let Some(data) = entry.data.clone() {
                    tracing::debug!(key = %key, "Joined in-flight query fetch");
                    return Ok(data);
                }
            }

            let fetcher = entry
                .fetcher
                .clone()
                .ok_or_else(|| Error::Other(format!("query {key} has no fetcher")))?;
            entry.fetching = true;
            entry.notify();
            (fetcher, entry.options.retry, entry.epoch)
        };

        tracing::debug!(key = %key, "Fetching query");
        let result = retry.run(key, || fetcher()).await;

        let mut entries = self.entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.fetching = false;
            entry.completed_fetches += 1;
            match &result {
                Ok(data) => {
                    entry.data = Some(data.clone());
                    entry.error = None;
                    entry.updated_at = Some(Instant::now());
                    entry.data_epoch = epoch;
                }
                Err(error) => {
                    tracing::warn!(key = %key, "Query fetch failed: {}", error);
                    entry.error = Some(error.clone());
                }
            }
            entry.notify();
        }
        result
    }

    fn spawn_refetch(&self, key: QueryKey) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(key = %key, "No async runtime, refetch deferred to next read");
            return;
        };

        let client = self.clone();
        handle.spawn(async move {
            if let Err(error) = client.fetch(&key).await {
                tracing::debug!(key = %key, "Background refetch failed: {}", error);
            }
        });
    }

    /// Force a refetch of a registered key, bypassing freshness.
    async fn refetch(&self, key: &QueryKey) -> Result<AnyData> {
        self.fetch(key).await
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || {
        let future = fetcher();
        Box::pin(async move { future.await.map(|value| Arc::new(value) as AnyData) })
    })
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, data: AnyData) -> Result<Arc<T>> {
    data.downcast::<T>()
        .map_err(|_| Error::Other(format!("query {key} holds data of another type")))
}

/// A mounted query. Dropping it unmounts the key.
pub struct QueryObserver<T> {
    client: QueryClient,
    key: QueryKey,
    receiver: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QueryObserver<T> {
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn state(&self) -> QueryState<T> {
        self.client.state(&self.key)
    }

    /// Wait for the next change to this key's slot. Returns `false` once
    /// the slot has been removed from the cache.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Wait until no fetch is in flight and return the settled state.
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            let _ = self.receiver.borrow_and_update();
            let state = self.state();
            if !state.is_fetching {
                return state;
            }
            if !self.changed().await {
                return self.state();
            }
        }
    }

    /// User-triggered refetch, e.g. a retry button on an error view.
    pub async fn refetch(&self) -> Result<Arc<T>> {
        let data = self.client.refetch(&self.key).await?;
        downcast(&self.key, data)
    }
}

impl<T> Drop for QueryObserver<T> {
    fn drop(&mut self) {
        self.client.unmount(&self.key);
    }
}
