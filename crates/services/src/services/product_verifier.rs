//! Re-checks candidate products against their live pages.
//!
//! One model call covers the whole batch. If that call fails for any reason
//! the unverified batch is returned unchanged.

use std::collections::HashMap;

use db::models::recommendation_session::ProductResult;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

use super::reasoning::{ModelTool, ReasoningModel, StructuredRequest, generate_structured};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct VerificationBatch {
    results: Vec<VerificationRecord>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct VerificationRecord {
    url: String,
    /// Page loads and the item can be bought right now
    is_valid: bool,
    #[serde(default)]
    reason: String,
    /// Best primary product image found on the page
    #[serde(default)]
    image_url: Option<String>,
    /// Sizes currently in stock
    #[serde(default)]
    available_sizes: Option<Vec<String>>,
}

const SYSTEM_PROMPT: &str = "You verify e-commerce product pages. Fetch every URL you are \
given and report exactly what the page shows. An item that is sold out, unavailable or \
missing is not valid.";

pub struct ProductVerifier<'a> {
    model: &'a dyn ReasoningModel,
}

impl<'a> ProductVerifier<'a> {
    pub fn new(model: &'a dyn ReasoningModel) -> Self {
        Self { model }
    }

    /// Keep only products confirmed purchasable, enriched with image and sizes
    pub async fn verify(&self, products: Vec<ProductResult>) -> Vec<ProductResult> {
        if products.is_empty() {
            return products;
        }

        let request = StructuredRequest::new(SYSTEM_PROMPT, build_prompt(&products))
            .temperature(0.0)
            .tools(&[ModelTool::PageFetch])
            .max_tokens(8192);

        match generate_structured::<VerificationBatch>(self.model, request).await {
            Ok(batch) => {
                let before = products.len();
                let verified = apply(products, batch.results);
                info!(before, after = verified.len(), "Verified product availability");
                verified
            }
            Err(e) => {
                warn!(error = %e, count = products.len(), "Verification failed, returning unverified products");
                products
            }
        }
    }
}

fn build_prompt(products: &[ProductResult]) -> String {
    let mut prompt = String::from("Verify each of these product pages:\n\n");
    for (i, product) in products.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} from {}\n   URL: {}\n",
            i + 1,
            product.name,
            product.retailer,
            product.url
        ));
    }
    prompt.push_str(
        r#"
## Instructions
For every URL above, return one result with the same url and:
1. is_valid: true only if the page loads without error AND the item can be purchased now.
   Anything marked sold out, unavailable or out of stock is not valid.
2. reason: a short explanation of the decision
3. image_url: the best primary product image on the page, or null
4. available_sizes: the sizes currently in stock, or an empty list
"#,
    );
    prompt
}

/// Drop products without a valid record and fold the record into the rest
fn apply(products: Vec<ProductResult>, records: Vec<VerificationRecord>) -> Vec<ProductResult> {
    let mut by_url: HashMap<String, VerificationRecord> = HashMap::new();
    for record in records {
        by_url.entry(record.url.clone()).or_insert(record);
    }

    products
        .into_iter()
        .filter_map(|mut product| {
            let record = by_url.get(&product.url)?;
            if !record.is_valid {
                tracing::debug!(url = %product.url, reason = %record.reason, "Dropping unavailable product");
                return None;
            }
            if let Some(image_url) = record.image_url.as_ref().filter(|u| !u.trim().is_empty()) {
                product.image_url = Some(image_url.clone());
            }
            product.available_sizes = record.available_sizes.clone();
            Some(product)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::reasoning::{ModelError, testing::ScriptedModel};

    fn product(name: &str, url: &str) -> ProductResult {
        ProductResult {
            id: name.to_string(),
            name: name.to_string(),
            retailer: "Acme".to_string(),
            url: url.to_string(),
            price: Some(120.0),
            currency: "USD".to_string(),
            image_url: Some("original.jpg".to_string()),
            available_sizes: None,
            is_preferred_store: true,
        }
    }

    #[tokio::test]
    async fn test_verifier_fails_open_on_error() {
        let model = ScriptedModel::with_replies(vec![Err(ModelError::Call("down".to_string()))]);
        let input = vec![product("A", "url1"), product("B", "url2")];

        let output = ProductVerifier::new(&model).verify(input.clone()).await;

        assert_eq!(output, input);
    }

    #[tokio::test]
    async fn test_verifier_fails_open_on_bad_shape() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({ "unexpected": true }))]);
        let input = vec![product("A", "url1")];

        assert_eq!(ProductVerifier::new(&model).verify(input.clone()).await, input);
    }

    #[tokio::test]
    async fn test_verifier_filters_and_enriches() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({
            "results": [
                { "url": "url1", "is_valid": true, "image_url": "X", "available_sizes": ["S"] },
                { "url": "url2", "is_valid": false }
            ]
        }))]);

        let output = ProductVerifier::new(&model)
            .verify(vec![product("A", "url1"), product("B", "url2")])
            .await;

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].name, "A");
        assert_eq!(output[0].image_url.as_deref(), Some("X"));
        assert_eq!(output[0].available_sizes, Some(vec!["S".to_string()]));

        let request = &model.requests()[0];
        assert_eq!(request.tools, vec![ModelTool::PageFetch]);
        assert!(request.prompt.contains("URL: url1") && request.prompt.contains("URL: url2"));
    }

    #[tokio::test]
    async fn test_unmatched_products_are_dropped_and_missing_image_kept() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({
            "results": [
                { "url": "url1", "is_valid": true, "reason": "in stock", "image_url": null }
            ]
        }))]);

        let output = ProductVerifier::new(&model)
            .verify(vec![product("A", "url1"), product("C", "url3")])
            .await;

        assert_eq!(output.len(), 1);
        assert_eq!(output[0].image_url.as_deref(), Some("original.jpg"));
        assert_eq!(output[0].available_sizes, None);
    }

    #[tokio::test]
    async fn test_blank_verified_image_keeps_search_image() {
        let model = ScriptedModel::with_replies(vec![Ok(json!({
            "results": [
                { "url": "url1", "is_valid": true, "image_url": "" },
                { "url": "url2", "is_valid": true, "image_url": "  " }
            ]
        }))]);

        let output = ProductVerifier::new(&model)
            .verify(vec![product("A", "url1"), product("B", "url2")])
            .await;

        assert_eq!(output.len(), 2);
        assert!(output
            .iter()
            .all(|p| p.image_url.as_deref() == Some("original.jpg")));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_the_model() {
        let model = ScriptedModel::default();

        assert!(ProductVerifier::new(&model).verify(Vec::new()).await.is_empty());
        assert!(model.requests().is_empty());
    }
}
