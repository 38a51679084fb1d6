//! Live product search for a piece description or a free-text query.

use db::models::{
    recommendation_preferences::{PreferenceSet, StorePreference},
    recommendation_session::{ProductResult, default_currency},
    wardrobe::ClothingType,
};
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::reasoning::{
    ModelError, ModelTool, ReasoningModel, StructuredRequest, generate_structured,
};

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("product search failed: {0}")]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct ProductBatch {
    products: Vec<FoundProduct>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct FoundProduct {
    name: String,
    retailer: String,
    /// Current price, null when the page shows none
    price: Option<f64>,
    /// ISO 4217 code, USD when unknown
    #[serde(default)]
    currency: Option<String>,
    /// Direct link to the product page
    url: String,
    image_url: Option<String>,
}

const SYSTEM_PROMPT: &str = "You are a shopping assistant with live web access. You find \
specific products that are for sale right now and report only what you actually saw on the \
retailer's page. Never invent URLs.";

pub struct ProductSearchEngine<'a> {
    model: &'a dyn ReasoningModel,
}

impl<'a> ProductSearchEngine<'a> {
    pub fn new(model: &'a dyn ReasoningModel) -> Self {
        Self { model }
    }

    /// Find products matching `query`. Zero matches is an empty list, not an error.
    pub async fn search(
        &self,
        query: &str,
        preferences: &PreferenceSet,
    ) -> Result<Vec<ProductResult>, SearchError> {
        let price_limit = applicable_price_limit(query, preferences);
        let request = StructuredRequest::new(SYSTEM_PROMPT, build_prompt(query, preferences, price_limit))
            .temperature(0.1)
            .tools(&[ModelTool::WebSearch, ModelTool::PageFetch])
            .max_tokens(8192);

        let batch: ProductBatch = generate_structured(self.model, request).await?;

        let products: Vec<ProductResult> = batch
            .products
            .into_iter()
            .map(|p| ProductResult {
                id: Uuid::new_v4().to_string(),
                is_preferred_store: preferences.is_preferred_retailer(&p.retailer),
                name: p.name,
                retailer: p.retailer,
                url: p.url,
                price: p.price,
                currency: p
                    .currency
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(default_currency),
                image_url: p.image_url,
                available_sizes: None,
            })
            .collect();

        info!(
            query = %query,
            price_limit = ?price_limit,
            count = products.len(),
            "Product search finished"
        );
        Ok(products)
    }
}

/// Price limit of the first clothing type named in `query`, if one is set
pub fn applicable_price_limit(query: &str, preferences: &PreferenceSet) -> Option<f64> {
    ClothingType::find_in(query).and_then(|t| preferences.price_limit_for(t))
}

fn build_prompt(query: &str, preferences: &PreferenceSet, price_limit: Option<f64>) -> String {
    let preferred = preferences.stores_with(StorePreference::Preferred);
    let avoided = preferences.stores_with(StorePreference::Avoided);

    let mut prompt = format!("Find products to buy for: \"{}\"\n", query.trim());

    if let Some(limit) = price_limit {
        prompt.push_str(&format!(
            "\nPRICE LIMIT: Under ${}. Do not return anything priced above this.\n",
            limit
        ));
    }
    if !preferred.is_empty() {
        prompt.push_str(&format!(
            "\nPREFERRED STORES (search these first): {}\n",
            preferred.join(", ")
        ));
    }
    if !avoided.is_empty() {
        prompt.push_str(&format!(
            "\nAVOIDED STORES (never return products from these): {}\n",
            avoided.join(", ")
        ));
    }

    prompt.push_str(
        r#"
## Instructions
1. Use web search to find between 3 and 10 products that closely match the description
2. Open each product page and confirm it is in stock before including it
3. Use the exact product page URL, never a search or category page
4. Report the price shown on the page, or null if none is shown
5. Include the main product image URL when you can find it
"#,
    );
    prompt
}
