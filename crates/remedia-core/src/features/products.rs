//! Product import from a shop page URL.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::context::AppContext;
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const EXTRACT_PRODUCT_FUNCTION: &str = "extract-product";

/// Metadata scraped from a product page. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    pub title: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
}

impl ProductMetadata {
    fn from_response(value: &Value) -> Self {
        // Some functions wrap the payload in `data`.
        let payload = value.get("data").filter(|data| data.is_object()).unwrap_or(value);
        Self {
            title: text_field(payload, &["title", "name"]),
            image_url: text_field(payload, &["image_url", "imageUrl", "image"]),
            description: text_field(payload, &["description"]),
            price: text_field(payload, &["price"]),
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.image_url.is_none()
            && self.description.is_none()
            && self.price.is_none()
    }
}

fn text_field(payload: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match payload.get(*name)? {
        Value::String(text) => normalize_text_option(Some(text.clone())),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Run the `extract-product` edge function once for `url`. Failures are
/// reported and returned without a retry.
pub async fn extract_product(ctx: &AppContext, url: &str) -> Result<ProductMetadata> {
    let url = url.trim();
    if !is_http_url(url) {
        return Err(Error::invalid_input(
            "Product URL must start with http:// or https://",
        ));
    }

    tracing::debug!(url, "extracting product metadata");
    let result = ctx
        .backend
        .invoke(EXTRACT_PRODUCT_FUNCTION, json!({ "url": url }))
        .await
        .map(|response| ProductMetadata::from_response(&response));
    let metadata = ctx.reported("Failed to import product", result)?;
    if metadata.is_empty() {
        tracing::warn!(url, "product page yielded no metadata");
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{BackendCall, CallKind};
    use crate::features::context::testing::harness;

    #[tokio::test]
    async fn extracts_and_normalizes_fields() {
        let h = harness();
        h.backend.set_function_response(
            "extract-product",
            json!({
                "title": "  Lavender Oil ",
                "imageUrl": "https://shop.example/lavender.jpg",
                "description": "",
                "price": 12.5,
            }),
        );

        let product = extract_product(&h.ctx, " https://shop.example/p/1 ")
            .await
            .unwrap();

        assert_eq!(
            product,
            ProductMetadata {
                title: Some("Lavender Oil".to_string()),
                image_url: Some("https://shop.example/lavender.jpg".to_string()),
                description: None,
                price: Some("12.5".to_string()),
            }
        );
        assert_eq!(
            h.backend.calls(),
            vec![BackendCall::Invoke {
                name: "extract-product".to_string(),
                body: json!({"url": "https://shop.example/p/1"}),
            }]
        );
    }

    #[tokio::test]
    async fn reads_wrapped_payload() {
        let h = harness();
        h.backend.set_function_response(
            "extract-product",
            json!({"data": {"name": "Chamomile", "price": "$4.99"}}),
        );

        let product = extract_product(&h.ctx, "https://shop.example/p/2")
            .await
            .unwrap();
        assert_eq!(product.title.as_deref(), Some("Chamomile"));
        assert_eq!(product.price.as_deref(), Some("$4.99"));
    }

    #[tokio::test]
    async fn failure_is_not_retried() {
        let h = harness();
        h.backend
            .fail_next(CallKind::Invoke, Error::http(503, "scraper busy"));

        let error = extract_product(&h.ctx, "https://shop.example/p/3")
            .await
            .unwrap_err();

        assert_eq!(error.status(), Some(503));
        assert_eq!(h.backend.count_calls(CallKind::Invoke), 1);
        assert_eq!(h.notifier.toasts()[0].title, "Failed to import product");
    }

    #[tokio::test]
    async fn rejects_non_http_url_without_calling_backend() {
        let h = harness();
        let error = extract_product(&h.ctx, "ftp://shop.example")
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
        assert!(h.backend.calls().is_empty());
    }
}
