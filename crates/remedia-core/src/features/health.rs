//! Health concerns and the symptom admin table.

use std::sync::Arc;

use serde::Serialize;

use super::content::{Content, ContentService};
use super::context::AppContext;
use super::models::{HealthConcern, Symptom};
use crate::backend::{Filter, TableQuery};
use crate::query::keys;
use crate::util::normalize_text_option;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymptomDraft {
    pub name: String,
    pub description: Option<String>,
}

pub struct HealthService {
    concerns: ContentService<HealthConcern>,
    symptoms: ContentService<Symptom>,
}

impl HealthService {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            concerns: ContentService::new(ctx),
            symptoms: ContentService::new(ctx),
        }
    }

    pub const fn concerns(&self) -> &ContentService<HealthConcern> {
        &self.concerns
    }

    pub const fn symptoms(&self) -> &ContentService<Symptom> {
        &self.symptoms
    }

    /// Symptom admin table, keyed `["admin-symptoms", search]`.
    pub async fn admin_symptoms(&self, search: &str) -> Result<Arc<Vec<Symptom>>> {
        let (column, ascending) = Symptom::ORDER_BY;
        let mut query = TableQuery::default().order_by(column, ascending);
        if let Some(term) = normalize_text_option(Some(search.to_string())) {
            query = query.filter(Filter::contains(Symptom::SEARCH_COLUMN, &term));
        }
        self.symptoms
            .cached_rows(keys::admin_symptoms(search), query)
            .await
    }

    pub async fn add_symptom(&self, draft: SymptomDraft) -> Result<Symptom> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("Symptom name is required"));
        }
        self.symptoms
            .create(&SymptomDraft {
                name: name.to_string(),
                description: normalize_text_option(draft.description),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::backend::CallKind;
    use crate::features::context::testing::harness;

    #[tokio::test]
    async fn admin_symptoms_are_cached_per_search_term() {
        let h = harness();
        h.backend.seed(
            "symptoms",
            [
                json!({"id": "s1", "name": "Headache"}),
                json!({"id": "s2", "name": "Fever"}),
                json!({"id": "s3", "name": "Head cold"}),
            ],
        );
        let health = HealthService::new(&h.ctx);

        let head = health.admin_symptoms("head").await.unwrap();
        let all = health.admin_symptoms("").await.unwrap();
        health.admin_symptoms("head").await.unwrap();

        assert_eq!(
            head.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Head cold", "Headache"]
        );
        assert_eq!(all.len(), 3);
        assert_eq!(h.backend.count_calls(CallKind::Select), 2);
    }

    #[tokio::test]
    async fn adding_a_symptom_invalidates_every_admin_search() {
        let h = harness();
        let health = HealthService::new(&h.ctx);
        health.admin_symptoms("").await.unwrap();
        health.admin_symptoms("fev").await.unwrap();

        health
            .add_symptom(SymptomDraft {
                name: " Fever ".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert!(h.ctx.queries.is_stale(&keys::admin_symptoms("")));
        assert!(h.ctx.queries.is_stale(&keys::admin_symptoms("fev")));
        assert_eq!(h.backend.rows("symptoms")[0]["name"], "Fever");
    }

    #[tokio::test]
    async fn blank_symptom_name_is_rejected_before_any_write() {
        let h = harness();
        let error = HealthService::new(&h.ctx)
            .add_symptom(SymptomDraft::default())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::InvalidInput(_)));
        assert_eq!(h.backend.count_calls(CallKind::Insert), 0);
    }
}
