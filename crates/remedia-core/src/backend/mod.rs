//! Backend-as-a-service boundary.
//!
//! The rest of the crate talks to the hosted backend only through the four
//! capability traits defined here: row CRUD on named tables, session
//! introspection, object storage and server-side functions. `Backend` bundles
//! them so feature code can hold a single `Arc<dyn Backend>`.

mod auth;
mod memory;
mod supabase;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;

pub use auth::{
    AuthSession, AuthUser, MemorySessionStore, SessionPersistence, SupabaseAuthClient,
};
pub use memory::{BackendCall, CallKind, MemoryBackend};
pub use supabase::SupabaseBackend;

/// Comparison operator for a filter predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    /// Case-insensitive pattern match using `%` wildcards.
    ILike,
    /// Identity comparison for `null`, `true` and `false`.
    Is,
}

impl FilterOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::ILike => "ilike",
            Self::Is => "is",
        }
    }
}

/// A single `column op value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Neq,
            value: value.into(),
        }
    }

    /// Substring match, case-insensitive. `%` and `_` in `term` match
    /// literally.
    pub fn contains(column: impl Into<String>, term: &str) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::ILike,
            value: Value::String(format!("%{}%", escape_like(term.trim()))),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Is,
            value: Value::Null,
        }
    }

    /// Render the right-hand side of a REST filter parameter, e.g. `eq.42`.
    pub fn to_param_value(&self) -> String {
        format!("{}.{}", self.op.as_str(), render_value(&self.value))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Sort order for a select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Column selection plus filters, ordering and limit for a table read.
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self::new("*")
    }
}

impl TableQuery {
    pub fn new(columns: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string parameters understood by the REST gateway.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(filter_params(&self.filters));
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{direction}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

pub(crate) fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| (filter.column.clone(), filter.to_param_value()))
        .collect()
}

/// Row CRUD on named tables.
#[async_trait]
pub trait Tables: Send + Sync {
    async fn select(&self, table: &str, query: &TableQuery) -> Result<Vec<Value>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch every row matching `filters` and return the updated rows.
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;
}

/// Session and user introspection.
#[async_trait]
pub trait Auth: Send + Sync {
    async fn session(&self) -> Result<Option<AuthSession>>;

    async fn user(&self) -> Result<Option<AuthUser>> {
        Ok(self.session().await?.map(|session| session.user))
    }

    async fn sign_out(&self) -> Result<()>;
}

/// Binary object storage.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload bytes and return the stored object path.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Server-side functions: database RPC and edge functions.
#[async_trait]
pub trait Functions: Send + Sync {
    async fn rpc(&self, name: &str, args: Value) -> Result<Value>;

    async fn invoke(&self, name: &str, body: Value) -> Result<Value>;
}

/// Every capability the application consumes from the hosted backend.
pub trait Backend: Tables + Auth + Storage + Functions {}

impl<T: Tables + Auth + Storage + Functions + ?Sized> Backend for T {}

/// Decode raw rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}
