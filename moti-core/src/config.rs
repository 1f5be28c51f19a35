use serde::{Deserialize, Serialize};
use tether::{StoreError, StorePath};

/// Node names under each user's scope, plus the app-wide version node.
pub mod paths {
    pub const CATEGORY: &str = "category";
    pub const ACHIEVEMENT: &str = "achievement";
    pub const VERSION: &str = "version";
}

pub(crate) fn node(name: &'static str) -> Result<StorePath, StoreError> {
    StorePath::root().child(name)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Categories every user gets on first launch, in display order.
    pub default_categories: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_categories: vec!["all".to_string(), "uncategorized".to_string()],
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Bootstrap counts as done once a user has at least this many categories.
    pub fn required_categories(&self) -> usize {
        self.default_categories.len()
    }
}
