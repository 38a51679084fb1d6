//! Per-user shopping preferences, seeded from and merged with order history.

use db::models::{
    recommendation_preferences::{PreferenceSet, StorePreference},
    wardrobe::{ClothingType, WardrobeItem, retailers_from_history},
};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use ts_rs::TS;

use super::context::UserContext;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store name must not be empty")]
    EmptyStoreName,
    #[error("price limit must be a positive amount, got {0}")]
    InvalidPrice(f64),
}

/// Preferences plus the retailers found in the wardrobe's order history
#[derive(Debug, Clone, Serialize, TS)]
pub struct LoadedPreferences {
    pub preferences: PreferenceSet,
    pub detected_retailers: Vec<String>,
}

#[derive(Clone)]
pub struct PreferenceStore {
    pool: SqlitePool,
}

impl PreferenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load preferences, seeding them on first use and merging newly seen
    /// retailers afterwards
    pub async fn load(
        &self,
        ctx: &UserContext,
        wardrobe: &[WardrobeItem],
    ) -> Result<LoadedPreferences, PreferenceError> {
        let detected_retailers = retailers_from_history(wardrobe);

        let preferences = match PreferenceSet::find_by_user(&self.pool, &ctx.user_id).await? {
            None => {
                let seeded = PreferenceSet::seeded(&detected_retailers);
                seeded.save(&self.pool, &ctx.user_id).await?;
                info!(
                    user_id = %ctx.user_id,
                    store_count = seeded.stores.len(),
                    "Seeded preferences from order history"
                );
                seeded
            }
            Some(mut existing) => {
                let added = existing.merge_detected(&detected_retailers);
                if added > 0 {
                    existing.touch();
                    existing.save(&self.pool, &ctx.user_id).await?;
                    debug!(user_id = %ctx.user_id, added, "Merged new retailers into preferences");
                }
                existing
            }
        };

        Ok(LoadedPreferences {
            preferences,
            detected_retailers,
        })
    }

    /// Stored preferences without merging new retailers. Seeds them from the
    /// wardrobe's order history when none exist yet.
    pub async fn current(&self, ctx: &UserContext) -> Result<PreferenceSet, PreferenceError> {
        if let Some(existing) = PreferenceSet::find_by_user(&self.pool, &ctx.user_id).await? {
            return Ok(existing);
        }
        let wardrobe = WardrobeItem::find_by_user(&self.pool, &ctx.user_id).await?;
        Ok(self.load(ctx, &wardrobe).await?.preferences)
    }

    pub async fn update_store_preference(
        &self,
        ctx: &UserContext,
        name: &str,
        preference: StorePreference,
    ) -> Result<PreferenceSet, PreferenceError> {
        self.mutate(ctx, |prefs| {
            prefs.set_store_preference(name, preference);
        })
        .await
    }

    /// No-op (but still persisted) when the store already exists
    pub async fn add_store(
        &self,
        ctx: &UserContext,
        name: &str,
    ) -> Result<PreferenceSet, PreferenceError> {
        if name.trim().is_empty() {
            return Err(PreferenceError::EmptyStoreName);
        }
        self.mutate(ctx, |prefs| {
            prefs.add_store(name);
        })
        .await
    }

    pub async fn remove_store(
        &self,
        ctx: &UserContext,
        name: &str,
    ) -> Result<PreferenceSet, PreferenceError> {
        self.mutate(ctx, |prefs| {
            prefs.remove_store(name);
        })
        .await
    }

    pub async fn upsert_price_limit(
        &self,
        ctx: &UserContext,
        clothing_type: ClothingType,
        max_price: f64,
    ) -> Result<PreferenceSet, PreferenceError> {
        if !max_price.is_finite() || max_price <= 0.0 {
            return Err(PreferenceError::InvalidPrice(max_price));
        }
        self.mutate(ctx, |prefs| {
            prefs.upsert_price_limit(clothing_type, max_price);
        })
        .await
    }

    pub async fn remove_price_limit(
        &self,
        ctx: &UserContext,
        clothing_type: ClothingType,
    ) -> Result<PreferenceSet, PreferenceError> {
        self.mutate(ctx, |prefs| {
            prefs.remove_price_limit(clothing_type);
        })
        .await
    }

    /// Apply `change`, stamp `last_updated` and persist the whole set
    async fn mutate(
        &self,
        ctx: &UserContext,
        change: impl FnOnce(&mut PreferenceSet),
    ) -> Result<PreferenceSet, PreferenceError> {
        let mut prefs = self.current(ctx).await?;
        change(&mut prefs);
        prefs.touch();
        prefs.save(&self.pool, &ctx.user_id).await?;
        Ok(prefs)
    }
}
