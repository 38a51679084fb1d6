use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use strum_macros::{Display, EnumString};
use ts_rs::TS;

use super::wardrobe::ClothingType;

/// How a user feels about shopping at a store
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorePreference {
    Preferred,
    Avoided,
    Neutral,
}

/// A store the user shops at (or wants to avoid)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct StoreInfo {
    pub name: String,
    /// Detected from the wardrobe's order history rather than added by hand
    pub is_from_history: bool,
    pub preference: StorePreference,
}

/// Store names match ignoring surrounding whitespace and case (Unicode-aware)
pub fn store_names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Upper price bound for one clothing type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct PriceLimit {
    pub clothing_type: ClothingType,
    pub max_price: f64,
}

/// Per-user shopping preferences.
///
/// Store names are unique ignoring case and there is at most one price limit
/// per clothing type; every mutator below keeps both true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
pub struct PreferenceSet {
    pub stores: Vec<StoreInfo>,
    pub price_limits: Vec<PriceLimit>,
    pub last_updated: DateTime<Utc>,
}

impl PreferenceSet {
    /// First-load preferences: every retailer from the order history is preferred
    pub fn seeded(retailers: &[String]) -> Self {
        let mut set = Self {
            stores: Vec::with_capacity(retailers.len()),
            price_limits: Vec::new(),
            last_updated: Utc::now(),
        };
        for name in retailers {
            if set.find_store(name).is_none() {
                set.stores.push(StoreInfo {
                    name: name.clone(),
                    is_from_history: true,
                    preference: StorePreference::Preferred,
                });
            }
        }
        set
    }

    /// Append history retailers not yet known as neutral entries.
    /// Returns the number of stores added.
    pub fn merge_detected(&mut self, retailers: &[String]) -> usize {
        let mut added = 0;
        for name in retailers {
            if self.find_store(name).is_none() {
                self.stores.push(StoreInfo {
                    name: name.clone(),
                    is_from_history: true,
                    preference: StorePreference::Neutral,
                });
                added += 1;
            }
        }
        added
    }

    pub fn find_store(&self, name: &str) -> Option<&StoreInfo> {
        self.stores.iter().find(|s| store_names_match(&s.name, name))
    }

    /// Returns false when the store is already present
    pub fn add_store(&mut self, name: &str) -> bool {
        if self.find_store(name).is_some() {
            return false;
        }
        self.stores.push(StoreInfo {
            name: name.trim().to_string(),
            is_from_history: false,
            preference: StorePreference::Preferred,
        });
        true
    }

    pub fn remove_store(&mut self, name: &str) -> bool {
        let before = self.stores.len();
        self.stores.retain(|s| !store_names_match(&s.name, name));
        self.stores.len() != before
    }

    pub fn set_store_preference(&mut self, name: &str, preference: StorePreference) -> bool {
        match self.stores.iter_mut().find(|s| store_names_match(&s.name, name)) {
            Some(store) => {
                store.preference = preference;
                true
            }
            None => false,
        }
    }

    pub fn upsert_price_limit(&mut self, clothing_type: ClothingType, max_price: f64) {
        match self
            .price_limits
            .iter_mut()
            .find(|p| p.clothing_type == clothing_type)
        {
            Some(limit) => limit.max_price = max_price,
            None => self.price_limits.push(PriceLimit {
                clothing_type,
                max_price,
            }),
        }
    }

    pub fn remove_price_limit(&mut self, clothing_type: ClothingType) -> bool {
        let before = self.price_limits.len();
        self.price_limits.retain(|p| p.clothing_type != clothing_type);
        self.price_limits.len() != before
    }

    pub fn price_limit_for(&self, clothing_type: ClothingType) -> Option<f64> {
        self.price_limits
            .iter()
            .find(|p| p.clothing_type == clothing_type)
            .map(|p| p.max_price)
    }

    pub fn stores_with(&self, preference: StorePreference) -> Vec<&str> {
        self.stores
            .iter()
            .filter(|s| s.preference == preference)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// True if any preferred store name occurs in `retailer` (case-insensitive)
    pub fn is_preferred_retailer(&self, retailer: &str) -> bool {
        let retailer = retailer.to_lowercase();
        self.stores_with(StorePreference::Preferred)
            .iter()
            .any(|store| retailer.contains(&store.to_lowercase()))
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

impl PreferenceSet {
    pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        let json = sqlx::query_scalar::<_, String>(
            "SELECT preferences FROM recommendation_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        json.map(|json| serde_json::from_str(&json).map_err(|e| sqlx::Error::Decode(Box::new(e))))
            .transpose()
    }

    /// Overwrite the stored preferences for `user_id`
    pub async fn save(&self, pool: &SqlitePool, user_id: &str) -> Result<(), sqlx::Error> {
        let json = serde_json::to_string(self).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query(
            r#"INSERT INTO recommendation_preferences (user_id, preferences)
               VALUES ($1, $2)
               ON CONFLICT(user_id) DO UPDATE SET
                   preferences = excluded.preferences,
                   updated_at = datetime('now', 'subsec')"#,
        )
        .bind(user_id)
        .bind(json)
        .execute(pool)
        .await?;
        Ok(())
    }
}
