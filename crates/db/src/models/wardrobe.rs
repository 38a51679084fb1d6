use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use ts_rs::TS;

use super::recommendation_preferences::store_names_match;

/// Clothing category of a wardrobe piece.
///
/// Declaration order matters: keyword matching walks the variants in this order
/// and picks the first one found in the text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Type,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    EnumIter,
    AsRefStr,
    Default,
)]
#[sqlx(type_name = "clothing_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ClothingType {
    Coat,
    Jacket,
    Denim,
    Dress,
    Skirt,
    Top,
    Pants,
    Knitwear,
    Shoes,
    Bag,
    Accessory,
    #[default]
    Other,
}

impl ClothingType {
    /// First clothing type whose name occurs in `text` (case-insensitive substring)
    pub fn find_in(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        Self::iter().find(|t| lower.contains(t.as_ref()))
    }
}

/// Purchase details recorded when a piece was imported from an order
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct OrderInfo {
    pub order_date: Option<String>,
    pub order_number: Option<String>,
    pub retailer: Option<String>,
}

/// A single piece in a user's wardrobe
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
pub struct WardrobeItem {
    pub id: i64,
    pub name: String,
    pub clothing_type: ClothingType,
    pub color: String,
    pub style: String,
    pub designer: String,
    pub image_url: Option<String>,
    pub order: Option<OrderInfo>,
}

/// Request body for inserting a wardrobe piece
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
pub struct CreateWardrobeItem {
    pub name: String,
    pub clothing_type: ClothingType,
    pub color: String,
    pub style: String,
    pub designer: String,
    pub image_url: Option<String>,
    pub retailer: Option<String>,
    pub order_date: Option<String>,
    pub order_number: Option<String>,
}

#[derive(Debug, FromRow)]
struct WardrobeItemRow {
    id: i64,
    name: String,
    clothing_type: ClothingType,
    color: String,
    style: String,
    designer: String,
    image_url: Option<String>,
    order_date: Option<String>,
    order_number: Option<String>,
    retailer: Option<String>,
}

impl From<WardrobeItemRow> for WardrobeItem {
    fn from(row: WardrobeItemRow) -> Self {
        let has_order =
            row.order_date.is_some() || row.order_number.is_some() || row.retailer.is_some();
        Self {
            id: row.id,
            name: row.name,
            clothing_type: row.clothing_type,
            color: row.color,
            style: row.style,
            designer: row.designer,
            image_url: row.image_url,
            order: has_order.then_some(OrderInfo {
                order_date: row.order_date,
                order_number: row.order_number,
                retailer: row.retailer,
            }),
        }
    }
}

impl WardrobeItem {
    pub fn retailer(&self) -> Option<&str> {
        self.order
            .as_ref()
            .and_then(|o| o.retailer.as_deref())
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub async fn find_by_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        let rows = sqlx::query_as::<_, WardrobeItemRow>(
            r#"SELECT id, name, clothing_type, color, style, designer, image_url,
                      order_date, order_number, retailer
               FROM wardrobe_items
               WHERE user_id = $1
               ORDER BY id ASC"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Self::from).collect())
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        data: &CreateWardrobeItem,
    ) -> Result<Self, sqlx::Error> {
        let row = sqlx::query_as::<_, WardrobeItemRow>(
            r#"INSERT INTO wardrobe_items
                   (user_id, name, clothing_type, color, style, designer, image_url,
                    order_date, order_number, retailer)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
               RETURNING id, name, clothing_type, color, style, designer, image_url,
                         order_date, order_number, retailer"#,
        )
        .bind(user_id)
        .bind(&data.name)
        .bind(data.clothing_type)
        .bind(&data.color)
        .bind(&data.style)
        .bind(&data.designer)
        .bind(&data.image_url)
        .bind(&data.order_date)
        .bind(&data.order_number)
        .bind(&data.retailer)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }
}

/// Distinct retailer names from the wardrobe's order history, sorted.
/// Names differing only by case collapse to the first spelling seen.
pub fn retailers_from_history(items: &[WardrobeItem]) -> Vec<String> {
    let mut retailers: Vec<String> = Vec::new();
    for retailer in items.iter().filter_map(WardrobeItem::retailer) {
        if !retailers.iter().any(|r| store_names_match(r, retailer)) {
            retailers.push(retailer.to_string());
        }
    }
    retailers.sort();
    retailers
}
