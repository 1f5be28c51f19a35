//! Built-in data for running without a network connection.

use std::sync::{Mutex, PoisonError};

use tether::StoreError;

use crate::model::{Achievement, CategoryId, CategoryItem};
use crate::stores::{AchievementSource, CategorySource};

const BUILT_IN_CATEGORIES: [&str; 5] = ["all", "uncategorized", "food", "exercise", "development"];

#[derive(Debug)]
pub struct StaticCategoryRepository {
    categories: Mutex<Vec<CategoryItem>>,
}

impl Default for StaticCategoryRepository {
    fn default() -> Self {
        let categories = BUILT_IN_CATEGORIES
            .iter()
            .zip(0u64..)
            .map(|(name, index)| CategoryItem::new(CategoryId::Index(index), *name))
            .collect();
        Self {
            categories: Mutex::new(categories),
        }
    }
}

impl CategorySource for StaticCategoryRepository {
    async fn fetch_categories(&self) -> Result<Vec<CategoryItem>, StoreError> {
        Ok(self
            .categories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn add_category(&self, name: &str) -> Result<CategoryItem, StoreError> {
        let mut categories = self.categories.lock().unwrap_or_else(PoisonError::into_inner);
        let item = CategoryItem::new(CategoryId::Index(categories.len() as u64), name);
        categories.push(item.clone());
        Ok(item)
    }
}

#[derive(Debug, Default)]
pub struct StaticAchievementRepository {
    achievements: Vec<Achievement>,
}

impl StaticAchievementRepository {
    pub fn with_achievements(achievements: Vec<Achievement>) -> Self {
        Self { achievements }
    }
}

impl AchievementSource for StaticAchievementRepository {
    async fn fetch_achievements(&self) -> Result<Vec<Achievement>, StoreError> {
        Ok(self.achievements.clone())
    }
}
