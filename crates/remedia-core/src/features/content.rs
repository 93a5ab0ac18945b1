//! Generic read and write plumbing shared by every content table.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::context::AppContext;
use crate::backend::{decode_rows, Filter, TableQuery};
use crate::query::{keys, QueryKey};
use crate::{Error, Result};

/// A typed row of a content table.
pub trait Content: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Root of the query key family, e.g. `["remedies"]`.
    const KEY_ROOT: &'static str;
    const COLUMNS: &'static str = "*";
    const SEARCH_COLUMN: &'static str = "name";
    /// Column and ascending flag for list ordering.
    const ORDER_BY: (&'static str, bool) = ("created_at", false);
    /// Other key families showing these rows; invalidated by every write.
    const RELATED_KEYS: &'static [&'static str] = &[];

    fn id(&self) -> &str;

    /// Human-readable name for lists and logs.
    fn label(&self) -> &str;
}

/// Cached reads and invalidating writes for one content table.
pub struct ContentService<T> {
    ctx: AppContext,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ContentService<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Content> ContentService<T> {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            ctx: ctx.clone(),
            _marker: PhantomData,
        }
    }

    pub const fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn list_key() -> QueryKey {
        keys::list(T::KEY_ROOT)
    }

    fn base_query() -> TableQuery {
        let (column, ascending) = T::ORDER_BY;
        TableQuery::new(T::COLUMNS).order_by(column, ascending)
    }

    /// Every row, newest first unless the type orders otherwise.
    pub async fn list(&self) -> Result<Arc<Vec<T>>> {
        self.cached_rows(Self::list_key(), Self::base_query()).await
    }

    /// Rows whose `column` contains `term`, case-insensitively. A blank term
    /// is the plain list.
    pub async fn search(&self, column: &str, term: &str) -> Result<Arc<Vec<T>>> {
        if term.trim().is_empty() {
            return self.list().await;
        }
        let query = Self::base_query().filter(Filter::contains(column, term.trim()));
        self.cached_rows(keys::search(T::KEY_ROOT, column, term), query)
            .await
    }

    /// At most `limit` rows, filtered on the default search column when a
    /// non-blank `search` is given. The limit is applied by the backend.
    pub async fn page(&self, search: Option<&str>, limit: usize) -> Result<Arc<Vec<T>>> {
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let mut query = Self::base_query().limit(limit);
        if let Some(term) = search {
            query = query.filter(Filter::contains(T::SEARCH_COLUMN, term));
        }
        self.cached_rows(keys::page(T::KEY_ROOT, search, limit), query)
            .await
    }

    /// Search in the type's default search column.
    pub async fn search_default(&self, term: &str) -> Result<Arc<Vec<T>>> {
        self.search(T::SEARCH_COLUMN, term).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        let query = TableQuery::new(T::COLUMNS)
            .filter(Filter::eq("id", id))
            .limit(1);
        let rows = self
            .cached_rows(keys::detail(T::KEY_ROOT, id), query)
            .await?;
        Ok(rows.first().cloned())
    }

    /// Read rows for `key` through the query cache.
    pub(crate) async fn cached_rows(&self, key: QueryKey, query: TableQuery) -> Result<Arc<Vec<T>>> {
        let backend = self.ctx.backend.clone();
        self.ctx
            .queries
            .fetch_query(key, self.ctx.queries.default_options(), move || {
                let backend = backend.clone();
                let query = query.clone();
                async move { decode_rows::<T>(backend.select(T::TABLE, &query).await?) }
            })
            .await
    }

    fn write_mutation(&self, action: &str) -> crate::mutation::Mutation {
        T::RELATED_KEYS.iter().fold(
            self.ctx
                .mutation(&format!("{action}-{}", T::TABLE))
                .invalidates(Self::list_key()),
            |mutation, root| mutation.invalidates(QueryKey::new(root)),
        )
    }

    /// Insert a row built from `draft` and return it as stored.
    pub async fn create(&self, draft: &impl Serialize) -> Result<T> {
        let result = self.try_create(draft).await;
        self.ctx
            .reported(&format!("Failed to create {}", singular(T::TABLE)), result)
    }

    /// [`Self::create`] without reporting failures.
    pub(crate) async fn try_create(&self, draft: &impl Serialize) -> Result<T> {
        let row = serde_json::to_value(draft)?;
        self.write_mutation("create")
            .run(async {
                let stored = self.ctx.backend.insert(T::TABLE, row).await?;
                Ok(serde_json::from_value::<T>(stored)?)
            })
            .await
    }

    /// Patch the row with `id`; the family key covers its detail key.
    pub async fn update(&self, id: &str, patch: Value) -> Result<T> {
        let result = self.try_update(id, patch).await;
        self.ctx
            .reported(&format!("Failed to update {}", singular(T::TABLE)), result)
    }

    /// [`Self::update`] without reporting failures.
    pub(crate) async fn try_update(&self, id: &str, patch: Value) -> Result<T> {
        if !patch.is_object() {
            return Err(Error::invalid_input("Update patch must be a JSON object"));
        }
        let filters = [Filter::eq("id", id)];
        self.write_mutation("update")
            .run(async {
                let rows = self.ctx.backend.update(T::TABLE, &filters, patch).await?;
                decode_rows::<T>(rows)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| Error::http(404, format!("{} {id} not found", singular(T::TABLE))))
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let filters = [Filter::eq("id", id)];
        let result = self
            .write_mutation("delete")
            .run(self.ctx.backend.delete(T::TABLE, &filters))
            .await;
        self.ctx
            .reported(&format!("Failed to delete {}", singular(T::TABLE)), result)
    }
}

fn singular(table: &str) -> String {
    let name = table.replace('_', " ");
    name.strip_suffix("ies")
        .map(|stem| format!("{stem}y"))
        .or_else(|| name.strip_suffix('s').map(ToString::to_string))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::backend::{BackendCall, CallKind};
    use crate::features::context::testing::harness;
    use crate::features::models::{Expert, HealthConcern, Symptom};
    use crate::notify::ToastLevel;

    #[test]
    fn singular_names_read_naturally() {
        assert_eq!(singular("remedies"), "remedy");
        assert_eq!(singular("news_articles"), "news article");
        assert_eq!(singular("videos"), "video");
    }

    #[tokio::test]
    async fn list_is_cached_until_a_write_invalidates_it() {
        let h = harness();
        h.backend.seed(
            "experts",
            [json!({"id": "e1", "full_name": "Dr. Ada", "created_at": "2026-01-01T00:00:00Z"})],
        );
        let experts = ContentService::<Expert>::new(&h.ctx);

        assert_eq!(experts.list().await.unwrap().len(), 1);
        assert_eq!(experts.list().await.unwrap().len(), 1);
        assert_eq!(h.backend.count_calls(CallKind::Select), 1);

        experts
            .create(&json!({"full_name": "Dr. Lin"}))
            .await
            .unwrap();
        assert!(h.ctx.queries.is_stale(&ContentService::<Expert>::list_key()));
    }

    #[tokio::test]
    async fn search_matches_column_case_insensitively() {
        let h = harness();
        h.backend.seed(
            "health_concerns",
            [
                json!({"id": "h1", "name": "Insomnia"}),
                json!({"id": "h2", "name": "Migraine"}),
            ],
        );
        let concerns = ContentService::<HealthConcern>::new(&h.ctx);

        let found = concerns.search_default("INSOM").await.unwrap();
        assert_eq!(
            found.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            vec!["h1"]
        );
        assert_eq!(concerns.search("name", "  ").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn search_treats_wildcards_literally() {
        let h = harness();
        h.backend.seed(
            "health_concerns",
            [
                json!({"id": "h1", "name": "50% relief"}),
                json!({"id": "h2", "name": "500 mg relief"}),
                json!({"id": "h3", "name": "cold_sore"}),
                json!({"id": "h4", "name": "cold sore"}),
            ],
        );
        let concerns = ContentService::<HealthConcern>::new(&h.ctx);

        let ids = |rows: &[HealthConcern]| rows.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&concerns.search_default("50%").await.unwrap()), vec!["h1"]);
        assert_eq!(ids(&concerns.search_default("cold_").await.unwrap()), vec!["h3"]);
    }

    #[tokio::test]
    async fn page_limits_rows_in_the_backend_query() {
        let h = harness();
        h.backend.seed(
            "health_concerns",
            [
                json!({"id": "h1", "name": "Insomnia"}),
                json!({"id": "h2", "name": "Insomnia, chronic"}),
                json!({"id": "h3", "name": "Migraine"}),
            ],
        );
        let concerns = ContentService::<HealthConcern>::new(&h.ctx);

        assert_eq!(concerns.page(None, 2).await.unwrap().len(), 2);
        let found = concerns.page(Some(" insom "), 1).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].name.starts_with("Insomnia"));
        assert_eq!(
            h.backend.calls().last(),
            Some(&BackendCall::Select {
                table: "health_concerns".to_string(),
                limit: Some(1),
            })
        );
        assert!(h
            .ctx
            .queries
            .get_query_data::<Vec<HealthConcern>>(&keys::page("health-concerns", Some("insom"), 1))
            .is_some());
    }

    #[tokio::test]
    async fn get_returns_none_for_missing_rows() {
        let h = harness();
        let symptoms = ContentService::<Symptom>::new(&h.ctx);
        assert_eq!(symptoms.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_invalidates_family_and_related_keys() {
        let h = harness();
        h.backend.seed("symptoms", [json!({"id": "s1", "name": "Cough"})]);
        let symptoms = ContentService::<Symptom>::new(&h.ctx);
        symptoms.get("s1").await.unwrap();
        h.ctx
            .queries
            .set_query_data(&keys::admin_symptoms("co"), Arc::new(Vec::<Symptom>::new()));

        let updated = symptoms
            .update("s1", json!({"name": "Dry cough"}))
            .await
            .unwrap();

        assert_eq!(updated.name, "Dry cough");
        assert!(h.ctx.queries.is_stale(&keys::detail("symptoms", "s1")));
        assert!(h.ctx.queries.is_stale(&keys::admin_symptoms("co")));
    }

    #[tokio::test]
    async fn failed_write_is_toasted_and_returned() {
        let h = harness();
        h.backend
            .fail_next(CallKind::Delete, Error::http(403, "row-level security"));
        let experts = ContentService::<Expert>::new(&h.ctx);

        let error = experts.delete("e1").await.unwrap_err();

        assert_eq!(error.status(), Some(403));
        let toasts = h.notifier.toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].level, ToastLevel::Error);
        assert_eq!(toasts[0].title, "Failed to delete expert");
    }
}
