//! Plain-text summaries of the wardrobe and preferences for model prompts.

use db::models::{
    query_log::QueryLogEntry,
    recommendation_preferences::{PreferenceSet, StorePreference},
    wardrobe::WardrobeItem,
};

/// Items grouped by category with their ids, followed by palette and brand lines
pub fn build_wardrobe_context(items: &[WardrobeItem]) -> String {
    if items.is_empty() {
        return "The wardrobe is currently empty.".to_string();
    }

    // Group in first-seen order so the prompt is stable for a given wardrobe
    let mut groups: Vec<(String, Vec<&WardrobeItem>)> = Vec::new();
    for item in items {
        let category = item.clothing_type.to_string().to_uppercase();
        match groups.iter_mut().find(|(c, _)| *c == category) {
            Some((_, members)) => members.push(item),
            None => groups.push((category, vec![item])),
        }
    }

    let mut context = format!("The wardrobe contains {} pieces:\n\n", items.len());
    for (category, members) in &groups {
        context.push_str(&format!("{} ({}):\n", category, members.len()));
        for item in members {
            let details = [item.color.as_str(), item.style.as_str()]
                .into_iter()
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            context.push_str(&format!("- [ID:{}] {} by {}", item.id, item.name, item.designer));
            if !details.is_empty() {
                context.push_str(&format!(" - {details}"));
            }
            context.push('\n');
        }
        context.push('\n');
    }

    let colors = distinct(items.iter().map(|i| i.color.as_str()));
    let designers = distinct(items.iter().map(|i| i.designer.as_str()));
    context.push_str(&format!("COLOR PALETTE: {}\n", or_various(&colors)));
    context.push_str(&format!("BRANDS: {}\n", or_various(&designers)));

    context
}

/// Preferred/avoided stores and price limits, one line each
pub fn build_preference_summary(preferences: &PreferenceSet) -> String {
    let preferred = preferences.stores_with(StorePreference::Preferred);
    let avoided = preferences.stores_with(StorePreference::Avoided);
    let limits = preferences
        .price_limits
        .iter()
        .map(|p| format!("{}: max ${}", p.clothing_type, p.max_price))
        .collect::<Vec<_>>();

    format!(
        "- Preferred stores: {}\n- Avoided stores: {}\n- Price limits: {}\n",
        join_or(&preferred, "None specified"),
        join_or(&avoided, "None"),
        join_or(&limits, "None specified"),
    )
}

/// Recent queries the user made, newest first; empty when there are none
pub fn build_user_context(recent: &[QueryLogEntry]) -> String {
    if recent.is_empty() {
        return String::new();
    }
    let mut context = String::from("Recent things the user asked about:\n");
    for entry in recent {
        context.push_str(&format!("- [{}] {}\n", entry.source, entry.query));
    }
    context
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen: Vec<&str> = Vec::new();
    for value in values.filter(|v| !v.is_empty()) {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

fn or_various(values: &[&str]) -> String {
    if values.is_empty() {
        "Various".to_string()
    } else {
        values.join(", ")
    }
}

fn join_or<S: AsRef<str>>(values: &[S], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use db::models::wardrobe::ClothingType;

    use super::*;

    fn item(id: i64, clothing_type: ClothingType, name: &str, color: &str) -> WardrobeItem {
        WardrobeItem {
            id,
            name: name.to_string(),
            clothing_type,
            color: color.to_string(),
            style: String::new(),
            designer: "Acme".to_string(),
            image_url: None,
            order: None,
        }
    }

    #[test]
    fn test_empty_wardrobe() {
        assert_eq!(build_wardrobe_context(&[]), "The wardrobe is currently empty.");
    }

    #[test]
    fn test_wardrobe_context_groups_by_category() {
        let items = vec![
            item(1, ClothingType::Top, "Silk blouse", "ivory"),
            item(2, ClothingType::Pants, "Wide trousers", ""),
            item(3, ClothingType::Top, "Striped tee", "navy"),
        ];
        let context = build_wardrobe_context(&items);

        assert!(context.starts_with("The wardrobe contains 3 pieces:"));
        assert!(context.contains("TOP (2):\n- [ID:1] Silk blouse by Acme - ivory\n- [ID:3] Striped tee by Acme - navy\n"));
        assert!(context.contains("- [ID:2] Wide trousers by Acme\n"));
        assert!(context.contains("COLOR PALETTE: ivory, navy\n"));
        assert!(context.contains("BRANDS: Acme\n"));
    }

    #[test]
    fn test_preference_summary_defaults() {
        let summary = build_preference_summary(&PreferenceSet::seeded(&[]));
        assert!(summary.contains("Preferred stores: None specified"));
        assert!(summary.contains("Avoided stores: None"));
        assert!(summary.contains("Price limits: None specified"));
    }

    #[test]
    fn test_preference_summary_lists_limits() {
        let mut prefs = PreferenceSet::seeded(&["Acme".to_string()]);
        prefs.upsert_price_limit(ClothingType::Jacket, 200.0);
        let summary = build_preference_summary(&prefs);
        assert!(summary.contains("Preferred stores: Acme"));
        assert!(summary.contains("Price limits: jacket: max $200"));
    }
}
