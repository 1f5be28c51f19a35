//! Seeding each user's default categories.
//!
//! Runs before the first category read of a session, on every launch. Nothing is
//! written once the user has at least as many categories as there are defaults.
//! A failed existence check counts as "needs seeding". Partial seeds are never
//! rolled back; the next launch either sees enough categories or writes more.
//!
//! The user is resolved once per run, and every read and write of that run
//! targets that user even if the signed-in identity changes midway.
//!
//! Known race: two devices that pass the check at the same moment both seed.
//! Generated keys keep the records distinct, so the user ends up with duplicate
//! defaults rather than a corrupt collection.
//!
//! Known gap: the check counts category nodes, not decodable categories. A user
//! whose nodes are all malformed counts as satisfied, and their category fetch
//! comes back empty until the nodes are repaired.

use std::sync::Arc;

use tether::{StoreError, UserScope};

use crate::config::SyncConfig;
use crate::model::CategoryItem;
use crate::stores::CategoryStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BootstrapOutcome {
    AlreadySatisfied { existing: usize },
    Seeded { created: Vec<CategoryItem> },
}

#[derive(Clone)]
pub struct BootstrapPolicy {
    categories: CategoryStore,
    defaults: Arc<[String]>,
}

impl BootstrapPolicy {
    pub fn new(categories: CategoryStore, config: &SyncConfig) -> Self {
        Self {
            categories,
            defaults: config.default_categories.clone().into(),
        }
    }

    pub fn required(&self) -> usize {
        self.defaults.len()
    }

    pub(crate) fn user_scope(&self) -> Result<UserScope, StoreError> {
        self.categories.client().user_scope()
    }

    /// `false` means the defaults can't be assumed to exist; the caller should
    /// offer a retry.
    pub async fn run(&self) -> bool {
        self.ensure_defaults()
            .await
            .inspect_err(|e| log::error!("Creating default categories failed: {e}"))
            .is_ok()
    }

    pub async fn ensure_defaults(&self) -> Result<BootstrapOutcome, StoreError> {
        self.ensure_defaults_in(&self.user_scope()?).await
    }

    pub async fn ensure_defaults_in(&self, scope: &UserScope) -> Result<BootstrapOutcome, StoreError> {
        let required = self.required();
        match self.categories.count_existing_in(scope).await {
            Ok(existing) if existing >= required => {
                log::debug!("Default categories already present ({existing} >= {required})");
                return Ok(BootstrapOutcome::AlreadySatisfied { existing });
            }
            Ok(existing) => log::info!("Seeding default categories for {} ({existing} < {required})", scope.user_id()),
            Err(e) => log::warn!("Could not count categories ({e}); seeding defaults anyway"),
        }

        let mut created = Vec::with_capacity(required);
        for name in self.defaults.iter() {
            match self.categories.add_in(scope, name).await {
                Ok(item) => created.push(item),
                Err(cause) => {
                    return Err(StoreError::BootstrapIncomplete {
                        seeded: created.len(),
                        required,
                        cause: Box::new(cause),
                    });
                }
            }
        }

        log::info!("Seeded {} default categories", created.len());
        Ok(BootstrapOutcome::Seeded { created })
    }
}
