//! In-memory backend for tests and offline runs.
//!
//! Records every call it receives and can be scripted to fail or to delay
//! its response, so query and mutation behavior can be asserted without a
//! live project.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::auth::{AuthSession, AuthUser};
use super::{Auth, Filter, FilterOp, Functions, Storage, TableQuery, Tables};
use crate::util::unix_timestamp_now;
use crate::{Error, Result};

const ADMIN_CHECK_FUNCTION: &str = "check_is_admin";
const MEMORY_STORAGE_HOST: &str = "https://storage.memory.local";

/// Category of backend call, used to script failures and delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Select,
    Insert,
    Update,
    Delete,
    Session,
    SignOut,
    Upload,
    Rpc,
    Invoke,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Select { table: String, limit: Option<usize> },
    Insert { table: String, row: Value },
    Update { table: String, filters: Vec<Filter>, patch: Value },
    Delete { table: String, filters: Vec<Filter> },
    Session,
    SignOut,
    Upload { bucket: String, path: String, size: usize, content_type: String },
    Rpc { name: String, args: Value },
    Invoke { name: String, body: Value },
}

impl BackendCall {
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::Select { .. } => CallKind::Select,
            Self::Insert { .. } => CallKind::Insert,
            Self::Update { .. } => CallKind::Update,
            Self::Delete { .. } => CallKind::Delete,
            Self::Session => CallKind::Session,
            Self::SignOut => CallKind::SignOut,
            Self::Upload { .. } => CallKind::Upload,
            Self::Rpc { .. } => CallKind::Rpc,
            Self::Invoke { .. } => CallKind::Invoke,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    session: Option<AuthSession>,
    admins: HashSet<String>,
    objects: BTreeMap<String, Vec<u8>>,
    function_responses: HashMap<String, Value>,
    calls: Vec<BackendCall>,
    failures: HashMap<CallKind, VecDeque<Error>>,
    delays: HashMap<CallKind, VecDeque<Duration>>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sign in as `user_id` with a long-lived session.
    pub fn sign_in_as(&self, user_id: &str) {
        self.state().session = Some(AuthSession {
            access_token: format!("memory-token-{user_id}"),
            refresh_token: format!("memory-refresh-{user_id}"),
            expires_at: unix_timestamp_now() + 3600,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some(format!("{user_id}@example.com")),
            },
        });
    }

    pub fn grant_admin(&self, user_id: &str) {
        self.state().admins.insert(user_id.to_string());
    }

    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state().objects.get(path).cloned()
    }

    pub fn set_function_response(&self, name: &str, response: Value) {
        self.state()
            .function_responses
            .insert(name.to_string(), response);
    }

    /// Make the next call of `kind` fail with `error`.
    pub fn fail_next(&self, kind: CallKind, error: Error) {
        self.state().failures.entry(kind).or_default().push_back(error);
    }

    /// Delay the response of the next call of `kind`; the effect is applied
    /// immediately, only the answer is late.
    pub fn delay_next(&self, kind: CallKind, delay: Duration) {
        self.state().delays.entry(kind).or_default().push_back(delay);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    pub fn count_calls(&self, kind: CallKind) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.kind() == kind)
            .count()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Record the call and pop any scripted failure or delay for it.
    fn begin(&self, call: BackendCall) -> (Result<()>, Option<Duration>) {
        let kind = call.kind();
        let mut state = self.state();
        state.calls.push(call);
        let failure = state.failures.get_mut(&kind).and_then(VecDeque::pop_front);
        let delay = state.delays.get_mut(&kind).and_then(VecDeque::pop_front);
        (failure.map_or(Ok(()), Err), delay)
    }

    async fn finish<T>(delay: Option<Duration>, value: Result<T>) -> Result<T> {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        value
    }
}

fn matches_filters(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        let actual = row.get(&filter.column).unwrap_or(&Value::Null);
        match filter.op {
            FilterOp::Eq | FilterOp::Is => actual == &filter.value,
            FilterOp::Neq => actual != &filter.value,
            FilterOp::ILike => match (actual.as_str(), filter.value.as_str()) {
                (Some(actual), Some(pattern)) => ilike(actual, pattern),
                _ => false,
            },
        }
    })
}

/// `ILIKE` for patterns with `%` only at the ends. A backslash escapes the
/// next character.
fn ilike(value: &str, pattern: &str) -> bool {
    let value = value.to_lowercase();
    let mut needle = String::new();
    let mut leading = false;
    let mut trailing = false;
    let pattern = pattern.to_lowercase();
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => needle.extend(chars.next()),
            '%' if needle.is_empty() => leading = true,
            '%' => trailing = true,
            other => needle.push(other),
        }
    }
    match (leading, trailing) {
        (true, true) => value.contains(&needle),
        (true, false) => value.ends_with(&needle),
        (false, true) => value.starts_with(&needle),
        (false, false) => value == needle,
    }
}

fn compare_column(left: &Value, right: &Value, column: &str) -> std::cmp::Ordering {
    let left = left.get(column).unwrap_or(&Value::Null);
    let right = right.get(column).unwrap_or(&Value::Null);
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(std::cmp::Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => std::cmp::Ordering::Equal,
        (Value::Null, _) => std::cmp::Ordering::Less,
        (_, Value::Null) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}

#[async_trait]
impl Tables for MemoryBackend {
    async fn select(&self, table: &str, query: &TableQuery) -> Result<Vec<Value>> {
        let (outcome, delay) = self.begin(BackendCall::Select {
            table: table.to_string(),
            limit: query.limit,
        });
        let result = outcome.map(|()| {
            let state = self.state();
            let mut rows = state
                .tables
                .get(table)
                .map(|rows| {
                    rows.iter()
                        .filter(|row| matches_filters(row, &query.filters))
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if let Some(order) = &query.order {
                rows.sort_by(|a, b| {
                    let ordering = compare_column(a, b, &order.column);
                    if order.ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                });
            }
            if let Some(limit) = query.limit {
                rows.truncate(limit);
            }
            rows
        });
        Self::finish(delay, result).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let (outcome, delay) = self.begin(BackendCall::Insert {
            table: table.to_string(),
            row: row.clone(),
        });
        let result = outcome.and_then(|()| {
            let Value::Object(mut fields) = row else {
                return Err(Error::http(400, "insert payload must be an object"));
            };
            fields
                .entry("id")
                .or_insert_with(|| Value::String(Uuid::now_v7().to_string()));
            fields
                .entry("created_at")
                .or_insert_with(|| {
                    Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
                });
            let stored = Value::Object(fields);
            self.state()
                .tables
                .entry(table.to_string())
                .or_default()
                .push(stored.clone());
            Ok(stored)
        });
        Self::finish(delay, result).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let (outcome, delay) = self.begin(BackendCall::Update {
            table: table.to_string(),
            filters: filters.to_vec(),
            patch: patch.clone(),
        });
        let result = outcome.and_then(|()| {
            let Value::Object(patch) = patch else {
                return Err(Error::http(400, "update payload must be an object"));
            };
            let mut state = self.state();
            let mut updated = Vec::new();
            for row in state.tables.entry(table.to_string()).or_default() {
                if !matches_filters(row, filters) {
                    continue;
                }
                if let Value::Object(fields) = row {
                    merge(fields, &patch);
                }
                updated.push(row.clone());
            }
            Ok(updated)
        });
        Self::finish(delay, result).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        let (outcome, delay) = self.begin(BackendCall::Delete {
            table: table.to_string(),
            filters: filters.to_vec(),
        });
        let result = outcome.map(|()| {
            if let Some(rows) = self.state().tables.get_mut(table) {
                rows.retain(|row| !matches_filters(row, filters));
            }
        });
        Self::finish(delay, result).await
    }
}

fn merge(fields: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        fields.insert(key.clone(), value.clone());
    }
}

#[async_trait]
impl Auth for MemoryBackend {
    async fn session(&self) -> Result<Option<AuthSession>> {
        let (outcome, delay) = self.begin(BackendCall::Session);
        let result = outcome.map(|()| self.state().session.clone());
        Self::finish(delay, result).await
    }

    async fn sign_out(&self) -> Result<()> {
        let (outcome, delay) = self.begin(BackendCall::SignOut);
        let result = outcome.map(|()| self.state().session = None);
        Self::finish(delay, result).await
    }
}

#[async_trait]
impl Storage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let (outcome, delay) = self.begin(BackendCall::Upload {
            bucket: bucket.to_string(),
            path: path.to_string(),
            size: bytes.len(),
            content_type: content_type.to_string(),
        });
        let result = outcome.and_then(|()| {
            let mut state = self.state();
            if state.objects.contains_key(path) {
                return Err(Error::Storage(format!("object already exists: {path}")));
            }
            state.objects.insert(path.to_string(), bytes);
            Ok(path.to_string())
        });
        Self::finish(delay, result).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{MEMORY_STORAGE_HOST}/{bucket}/{path}")
    }
}

#[async_trait]
impl Functions for MemoryBackend {
    async fn rpc(&self, name: &str, args: Value) -> Result<Value> {
        let (outcome, delay) = self.begin(BackendCall::Rpc {
            name: name.to_string(),
            args: args.clone(),
        });
        let result = outcome.and_then(|()| {
            let state = self.state();
            if name == ADMIN_CHECK_FUNCTION {
                let user_id = args
                    .get("user_id")
                    .and_then(Value::as_str)
                    .map(ToString::to_string)
                    .or_else(|| state.session.as_ref().map(|session| session.user.id.clone()));
                return Ok(Value::Bool(
                    user_id.is_some_and(|user_id| state.admins.contains(&user_id)),
                ));
            }
            state
                .function_responses
                .get(name)
                .cloned()
                .ok_or_else(|| Error::http(404, format!("function {name} not found")))
        });
        Self::finish(delay, result).await
    }

    async fn invoke(&self, name: &str, body: Value) -> Result<Value> {
        let (outcome, delay) = self.begin(BackendCall::Invoke {
            name: name.to_string(),
            body,
        });
        let result = outcome.and_then(|()| {
            self.state()
                .function_responses
                .get(name)
                .cloned()
                .ok_or_else(|| Error::http(404, format!("function {name} not found")))
        });
        Self::finish(delay, result).await
    }
}
