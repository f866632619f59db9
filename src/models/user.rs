use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listener account
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub preferred_categories: Vec<i32>,
}

impl User {
    pub fn is_valid(&self) -> bool {
        self.id > 0 && !self.email.is_empty()
    }

    pub fn has_preference_for(&self, category_id: i32) -> bool {
        self.preferred_categories.contains(&category_id)
    }
}
