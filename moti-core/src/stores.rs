//! Read and write paths for the user's categories and achievements.
//!
//! Collection reads decode each child on its own: a malformed child is logged
//! and skipped, the rest still come back. Only a failed read (or a missing user)
//! fails the whole fetch, so callers can tell "you have zero items" from
//! "you aren't allowed to ask".

use std::future::Future;
use std::sync::Arc;

use serde_json::json;
use tether::{RemoteStoreClient, Snapshot, StoreError, StorePath, UserScope};

use crate::config::{node, paths};
use crate::model::{Achievement, CategoryId, CategoryItem, NewAchievement, Record};

pub trait CategorySource: Send + Sync {
    fn fetch_categories(&self) -> impl Future<Output = Result<Vec<CategoryItem>, StoreError>> + Send;

    fn add_category(&self, name: &str) -> impl Future<Output = Result<CategoryItem, StoreError>> + Send;
}

pub trait AchievementSource: Send + Sync {
    fn fetch_achievements(&self) -> impl Future<Output = Result<Vec<Achievement>, StoreError>> + Send;
}

pub(crate) fn decode_children<T: Record>(path: &StorePath, snapshot: &Snapshot) -> Vec<T> {
    snapshot
        .children()
        .iter()
        .filter_map(|child| {
            let key = child.key().unwrap_or("?");
            let record = child
                .decode::<T>()
                .map_err(|e| e.to_string())
                .and_then(|record| record.validate().map(|()| record));
            match record {
                Ok(record) => Some(record),
                Err(reason) => {
                    log::warn!("Discarding malformed node {path}/{key}: {reason}");
                    None
                }
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct CategoryStore {
    client: Arc<RemoteStoreClient>,
}

impl CategoryStore {
    pub fn new(client: Arc<RemoteStoreClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<RemoteStoreClient> {
        &self.client
    }

    pub async fn fetch(&self) -> Result<Vec<CategoryItem>, StoreError> {
        self.fetch_in(&self.client.user_scope()?).await
    }

    pub async fn fetch_in(&self, scope: &UserScope) -> Result<Vec<CategoryItem>, StoreError> {
        let path = node(paths::CATEGORY)?;
        let snapshot = scope.read_once(&path).await?;
        Ok(decode_children(&path, &snapshot))
    }

    pub async fn count_existing(&self) -> Result<usize, StoreError> {
        self.count_existing_in(&self.client.user_scope()?).await
    }

    /// How many category nodes exist, decodable or not.
    pub async fn count_existing_in(&self, scope: &UserScope) -> Result<usize, StoreError> {
        let path = node(paths::CATEGORY)?;
        Ok(scope.read_once(&path).await?.children_count())
    }

    pub async fn add(&self, name: &str) -> Result<CategoryItem, StoreError> {
        self.add_in(&self.client.user_scope()?, name).await
    }

    /// Allocate a fresh store key and write `{id, name}` under it, both in
    /// `scope`.
    pub async fn add_in(&self, scope: &UserScope, name: &str) -> Result<CategoryItem, StoreError> {
        let path = node(paths::CATEGORY)?;
        let key = scope.child_key(&path)?;
        let item = CategoryItem::new(CategoryId::Key(key.clone()), name);

        let record = json!({ "id": item.id, "name": item.name });
        scope.write_once(&path.child(&key)?, record).await?;
        Ok(item)
    }
}

impl CategorySource for CategoryStore {
    async fn fetch_categories(&self) -> Result<Vec<CategoryItem>, StoreError> {
        self.fetch().await
    }

    async fn add_category(&self, name: &str) -> Result<CategoryItem, StoreError> {
        self.add(name).await
    }
}

#[derive(Clone)]
pub struct AchievementStore {
    client: Arc<RemoteStoreClient>,
}

impl AchievementStore {
    pub fn new(client: Arc<RemoteStoreClient>) -> Self {
        Self { client }
    }

    pub async fn fetch(&self) -> Result<Vec<Achievement>, StoreError> {
        let path = node(paths::ACHIEVEMENT)?;
        let snapshot = self.client.read_once(&path).await?;
        Ok(decode_children(&path, &snapshot))
    }

    pub async fn add(&self, new: NewAchievement) -> Result<Achievement, StoreError> {
        let scope = self.client.user_scope()?;
        let path = node(paths::ACHIEVEMENT)?;
        let key = scope.child_key(&path)?;
        let node_path = path.child(&key)?;
        let achievement = Achievement {
            id: key.clone(),
            category_id: new.category_id,
            title: new.title,
            image_url: new.image_url,
            created_at: Some(chrono::Utc::now()),
        };

        let record = serde_json::to_value(&achievement)
            .map_err(|e| StoreError::malformed(&node_path, e))?;
        scope.write_once(&node_path, record).await?;
        Ok(achievement)
    }
}

impl AchievementSource for AchievementStore {
    async fn fetch_achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        self.fetch().await
    }
}
