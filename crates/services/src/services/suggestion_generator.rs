//! Proposes new pieces that would complement the current wardrobe.

use std::collections::HashSet;

use db::models::{
    query_log::QueryLogEntry,
    recommendation_preferences::PreferenceSet,
    recommendation_session::{PieceSuggestion, SuggestionStatus},
    wardrobe::WardrobeItem,
};
use schemars::JsonSchema;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    reasoning::{ModelError, ReasoningModel, StructuredRequest, generate_structured},
    wardrobe_context::{build_preference_summary, build_user_context, build_wardrobe_context},
};

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("suggestion generation failed: {0}")]
    Model(#[from] ModelError),
}

/// Response from suggestion generation
#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct SuggestionBatch {
    suggestions: Vec<GeneratedSuggestion>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
struct GeneratedSuggestion {
    /// Specific description of the piece, e.g. "Camel wool single-breasted coat"
    description: String,
    // The next three only shape the schema so the model commits to a concrete
    // piece; the description carries them forward.
    /// One of: coat, jacket, denim, dress, skirt, top, pants, knitwear, shoes, bag, accessory
    #[allow(dead_code)]
    clothing_type: String,
    #[allow(dead_code)]
    color: String,
    #[allow(dead_code)]
    style: String,
    /// Why this piece fills a gap in the wardrobe
    rationale: String,
    /// IDs of existing wardrobe items this piece pairs with
    compatible_piece_ids: Vec<i64>,
}

const SYSTEM_PROMPT: &str = "You are a personal stylist. You study a client's existing wardrobe \
and suggest a small number of new pieces that would genuinely expand what they can wear. \
You only reference wardrobe items by the IDs you are given.";

pub struct SuggestionGenerator<'a> {
    model: &'a dyn ReasoningModel,
}

impl<'a> SuggestionGenerator<'a> {
    pub fn new(model: &'a dyn ReasoningModel) -> Self {
        Self { model }
    }

    /// Ask the model for new pieces and normalise what comes back
    pub async fn generate(
        &self,
        wardrobe: &[WardrobeItem],
        preferences: &PreferenceSet,
        recent_queries: &[QueryLogEntry],
    ) -> Result<Vec<PieceSuggestion>, GenerationError> {
        let prompt = build_prompt(wardrobe, preferences, recent_queries);
        let request = StructuredRequest::new(SYSTEM_PROMPT, prompt)
            .temperature(0.7)
            .max_tokens(4096);

        let batch: SuggestionBatch = generate_structured(self.model, request).await?;
        debug!(count = batch.suggestions.len(), "Model returned suggestions");

        let suggestions = normalize(batch.suggestions, wardrobe);
        info!(
            count = suggestions.len(),
            wardrobe_size = wardrobe.len(),
            "Generated piece suggestions"
        );
        Ok(suggestions)
    }
}

fn build_prompt(
    wardrobe: &[WardrobeItem],
    preferences: &PreferenceSet,
    recent_queries: &[QueryLogEntry],
) -> String {
    let mut prompt = format!(
        r#"Suggest new pieces for this wardrobe.

## Current Wardrobe
{}
## Shopping Preferences
{}"#,
        build_wardrobe_context(wardrobe),
        build_preference_summary(preferences),
    );

    let user_context = build_user_context(recent_queries);
    if !user_context.is_empty() {
        prompt.push_str(&format!("\n## USER CONTEXT\n{}", user_context));
    }

    prompt.push_str(
        r#"
## Instructions
1. Suggest between 3 and 5 new pieces that fill real gaps in the wardrobe
2. Each piece must work with several items the client already owns
3. Respect the price limits and lean towards the preferred stores
4. Be specific about color, material and cut in each description
5. List the IDs of compatible existing pieces, using only the [ID:n] values shown above
"#,
    );
    prompt
}

/// Fresh ids, pending status, and only compatible ids that exist in `wardrobe`
fn normalize(generated: Vec<GeneratedSuggestion>, wardrobe: &[WardrobeItem]) -> Vec<PieceSuggestion> {
    let known: HashSet<i64> = wardrobe.iter().map(|item| item.id).collect();

    generated
        .into_iter()
        .map(|g| {
            let mut seen = HashSet::new();
            let compatible_piece_ids = g
                .compatible_piece_ids
                .into_iter()
                .filter(|id| known.contains(id) && seen.insert(*id))
                .collect();
            PieceSuggestion {
                id: Uuid::new_v4().to_string(),
                description: g.description,
                rationale: g.rationale,
                refined_description: None,
                compatible_piece_ids,
                status: SuggestionStatus::Pending,
            }
        })
        .collect()
}
