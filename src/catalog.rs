use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Books,
    Clothing,
    Furniture,
    Gaming,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Excellent,
    Good,
    Fair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerInfo {
    pub name: String,
    pub avatar: String,
    pub rating: f32,
}

/// A marketplace listing. The chat core reads `id`, `title` and `seller`;
/// everything else is marketplace plumbing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub title: String,
    pub price: u32,
    pub location: String,
    pub time_posted: String,
    pub category: Category,
    pub condition: Condition,
    pub images: Vec<String>,
    pub description: String,
    pub seller: SellerInfo,
    #[serde(default)]
    pub is_favorited: bool,
}

/// Per-account marketplace state: own listings and favorites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub favorite_items: Vec<Item>,
    pub user_items: Vec<Item>,
}

impl UserData {
    pub fn stats(&self) -> ProfileStats {
        ProfileStats {
            listed: self.user_items.len(),
            favorited: self.favorite_items.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub listed: usize,
    pub favorited: usize,
}

/// Drop duplicate ids, keeping the last occurrence, preserving first-seen
/// order. Items without an id never make it into a catalog.
pub fn dedupe_by_id(items: &[Item]) -> Vec<Item> {
    let mut by_id: HashMap<&str, &Item> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for item in items {
        if by_id.insert(&item.id, item).is_none() {
            order.push(&item.id);
        }
    }
    order
        .into_iter()
        .map(|id| by_id[id].clone())
        .collect()
}

/// Dedupe and force the favorite flag on.
pub fn normalize_favorites(items: &[Item]) -> Vec<Item> {
    dedupe_by_id(items)
        .into_iter()
        .map(|mut item| {
            item.is_favorited = true;
            item
        })
        .collect()
}

/// Merge the base catalog with a user's own listings: user listings first,
/// then base items the user has not re-listed, favorite flags applied.
pub fn items_for_user(base: &[Item], user_items: &[Item], favorites: &[Item]) -> Vec<Item> {
    let favorite_ids: HashSet<&str> = favorites.iter().map(|item| item.id.as_str()).collect();

    let user_items = dedupe_by_id(user_items);
    let user_ids: HashSet<String> = user_items.iter().map(|item| item.id.clone()).collect();

    let mut merged: Vec<Item> = user_items;
    merged.extend(
        dedupe_by_id(base)
            .into_iter()
            .filter(|item| !user_ids.contains(&item.id)),
    );
    for item in &mut merged {
        item.is_favorited = favorite_ids.contains(item.id.as_str());
    }
    merged
}

/// The read-only listing provider the chat core consumes, plus the simple
/// mutations the marketplace surface needs.
pub struct Catalog {
    items: Vec<Item>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: dedupe_by_id(&items),
        }
    }

    pub fn with_seed_items() -> Self {
        Self::new(seed_items())
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Newly listed items go to the front, like a fresh post.
    pub fn add_listing(&mut self, item: Item) {
        self.items.retain(|existing| existing.id != item.id);
        self.items.insert(0, item);
    }

    /// Flip the favorite flag; returns the new value, or None for an
    /// unknown id.
    pub fn toggle_favorite(&mut self, id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.is_favorited = !item.is_favorited;
        Some(item.is_favorited)
    }

    pub fn favorites(&self) -> Vec<Item> {
        self.items
            .iter()
            .filter(|item| item.is_favorited)
            .cloned()
            .collect()
    }
}

/// The default listings every fresh marketplace starts with.
pub fn seed_items() -> Vec<Item> {
    vec![
        Item {
            id: "1".into(),
            title: "MacBook Pro 13-inch 2020 - Excellent Condition".into(),
            price: 899,
            location: "North Campus".into(),
            time_posted: "2 hours ago".into(),
            category: Category::Electronics,
            condition: Condition::Excellent,
            images: vec![
                "https://images.unsplash.com/photo-1680370834492-4e683c0d14c2?w=1080&q=80".into(),
            ],
            description: "Great laptop for programming and design work. Has been my main \
                          machine for 2 years. Battery life is still excellent, no major \
                          scratches or dents. Comes with original charger and box."
                .into(),
            seller: SellerInfo {
                name: "Alex Chen".into(),
                avatar: "https://images.unsplash.com/photo-1472099645785-5658abf4ff4e?w=150&h=150"
                    .into(),
                rating: 4.9,
            },
            is_favorited: false,
        },
        Item {
            id: "2".into(),
            title: "Organic Chemistry Textbook - 8th Edition".into(),
            price: 85,
            location: "Science Library".into(),
            time_posted: "5 hours ago".into(),
            category: Category::Books,
            condition: Condition::Good,
            images: vec![
                "https://images.unsplash.com/photo-1608453162650-cba45689c284?w=1080&q=80".into(),
            ],
            description: "Used for CHEM 2410/2420. Some highlighting and notes in margins but \
                          all pages intact. Still in good condition. Retail price is $350+."
                .into(),
            seller: SellerInfo {
                name: "Sarah Johnson".into(),
                avatar: "https://images.unsplash.com/photo-1494790108755-2616b612b8b5?w=150&h=150"
                    .into(),
                rating: 4.7,
            },
            is_favorited: true,
        },
        Item {
            id: "3".into(),
            title: "Vintage Denim Jacket - Size M".into(),
            price: 35,
            location: "Student Center".into(),
            time_posted: "1 day ago".into(),
            category: Category::Clothing,
            condition: Condition::Good,
            images: vec![
                "https://images.unsplash.com/photo-1714583353759-ac534aae73ce?w=1080&q=80".into(),
            ],
            description: "Classic vintage denim jacket. Perfect for layering. Some fading which \
                          adds to the vintage look. No tears or holes."
                .into(),
            seller: SellerInfo {
                name: "Mike Torres".into(),
                avatar: "https://images.unsplash.com/photo-1507003211169-0a1dd7228f2d?w=150&h=150"
                    .into(),
                rating: 4.8,
            },
            is_favorited: false,
        },
        Item {
            id: "4".into(),
            title: "IKEA Desk Lamp - White".into(),
            price: 15,
            location: "West Campus".into(),
            time_posted: "2 days ago".into(),
            category: Category::Furniture,
            condition: Condition::Excellent,
            images: vec![
                "https://images.unsplash.com/photo-1586023492125-27b9e57b3050?w=400&h=400".into(),
            ],
            description: "Great condition desk lamp. Works perfectly, no issues. Moving out so \
                          need to sell quickly."
                .into(),
            seller: SellerInfo {
                name: "Emma Wilson".into(),
                avatar: "https://images.unsplash.com/photo-1438761681033-6461ffad8d80?w=150&h=150"
                    .into(),
                rating: 4.6,
            },
            is_favorited: false,
        },
        Item {
            id: "5".into(),
            title: "PlayStation 5 Controller - DualSense".into(),
            price: 45,
            location: "Gaming Lounge".into(),
            time_posted: "3 days ago".into(),
            category: Category::Gaming,
            condition: Condition::Excellent,
            images: vec![
                "https://images.unsplash.com/photo-1606144042614-b2417e99c4e3?w=400&h=400".into(),
            ],
            description: "Extra PS5 controller in excellent condition. Barely used, no stick \
                          drift or button issues."
                .into(),
            seller: SellerInfo {
                name: "Jordan Lee".into(),
                avatar: "https://images.unsplash.com/photo-1500648767791-00dcc994a43e?w=150&h=150"
                    .into(),
                rating: 4.9,
            },
            is_favorited: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str) -> Item {
        Item {
            id: id.into(),
            title: title.into(),
            price: 10,
            location: "Campus".into(),
            time_posted: "now".into(),
            category: Category::Other,
            condition: Condition::Good,
            images: vec![],
            description: String::new(),
            seller: SellerInfo {
                name: "Sam Doe".into(),
                avatar: String::new(),
                rating: 5.0,
            },
            is_favorited: false,
        }
    }

    #[test]
    fn dedupe_keeps_latest_record_in_first_seen_position() {
        let items = vec![item("a", "old"), item("b", "b"), item("a", "new")];
        let deduped = dedupe_by_id(&items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, "a");
        assert_eq!(deduped[0].title, "new");
        assert_eq!(deduped[1].id, "b");
    }

    #[test]
    fn normalize_favorites_forces_the_flag() {
        let favorites = normalize_favorites(&[item("a", "a"), item("a", "a")]);
        assert_eq!(favorites.len(), 1);
        assert!(favorites[0].is_favorited);
    }

    #[test]
    fn items_for_user_puts_own_listings_first_and_flags_favorites() {
        let base = seed_items();
        let mine = vec![item("mine", "My lamp"), item("1", "Re-listed laptop")];
        let favorites = vec![item("2", "fav")];

        let merged = items_for_user(&base, &mine, &favorites);
        assert_eq!(merged[0].id, "mine");
        assert_eq!(merged[1].id, "1");
        assert_eq!(merged[1].title, "Re-listed laptop");
        // The base "1" was shadowed by the user's re-listing.
        assert_eq!(merged.iter().filter(|i| i.id == "1").count(), 1);
        assert!(merged.iter().find(|i| i.id == "2").unwrap().is_favorited);
        assert!(!merged.iter().find(|i| i.id == "3").unwrap().is_favorited);
    }

    #[test]
    fn catalog_add_and_toggle() {
        let mut catalog = Catalog::with_seed_items();
        assert_eq!(catalog.items().len(), 5);

        catalog.add_listing(item("6", "Bike"));
        assert_eq!(catalog.items()[0].id, "6");

        assert_eq!(catalog.toggle_favorite("6"), Some(true));
        assert_eq!(catalog.toggle_favorite("6"), Some(false));
        assert_eq!(catalog.toggle_favorite("missing"), None);

        assert_eq!(catalog.get("4").unwrap().seller.name, "Emma Wilson");
    }

    #[test]
    fn profile_stats_count_listings_and_favorites() {
        let data = UserData {
            favorite_items: vec![item("a", "a")],
            user_items: vec![item("b", "b"), item("c", "c")],
        };
        assert_eq!(
            data.stats(),
            ProfileStats {
                listed: 2,
                favorited: 1
            }
        );
    }
}
