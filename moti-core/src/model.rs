use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A category's identity: a store-generated key for remote records, or a
/// plain index for the built-in offline list.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryId {
    Index(u64),
    Key(String),
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryId::Index(index) => write!(f, "{index}"),
            CategoryId::Key(key) => f.write_str(key),
        }
    }
}

/// Stored as `{ "id": ..., "name": ... }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryItem {
    pub id: CategoryId,
    pub name: String,
}

impl CategoryItem {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    /// Looked up among the user's categories, never owned.
    pub category_id: CategoryId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Achievement {
    pub fn category_in<'a>(&self, categories: &'a [CategoryItem]) -> Option<&'a CategoryItem> {
        categories
            .iter()
            .find(|category| category.id == self.category_id)
    }
}

/// A new achievement before the store has given it an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAchievement {
    pub category_id: CategoryId,
    pub title: String,
    pub image_url: Option<String>,
}

/// Something decoded from one child node of a collection.
pub trait Record: DeserializeOwned {
    /// Shape checks serde can't express. An `Err` discards the node.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl Record for CategoryItem {
    fn validate(&self) -> Result<(), String> {
        match &self.id {
            CategoryId::Key(key) if key.is_empty() => Err("empty category id".to_string()),
            _ => Ok(()),
        }
    }
}

impl Record for Achievement {
    fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty achievement id".to_string());
        }
        Ok(())
    }
}
