//! The per-screen load protocol.
//!
//! A load runs two independent branches concurrently. Categories are
//! bootstrapped (once per user per session) and then fetched. Achievements
//! are fetched on their own. Each branch publishes as soon as it finishes, so
//! there is no ordering between them. A failed fetch publishes an empty
//! collection plus a `Failed` status instead of propagating.
//!
//! Every load takes a generation number. A branch whose load has been
//! superseded by a newer one drops its result instead of publishing it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether::{RemoteStoreClient, StoreError};

use crate::bootstrap::BootstrapPolicy;
use crate::config::SyncConfig;
use crate::fallback::{StaticAchievementRepository, StaticCategoryRepository};
use crate::gate::SessionBootstrap;
use crate::model::{Achievement, CategoryItem};
use crate::publisher::Publisher;
use crate::stores::{AchievementSource, AchievementStore, CategorySource, CategoryStore};

/// How the last fetch of one collection went. Sent after the collection itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    Loaded { count: usize },
    /// The fetch worked but the user has no categories. Not used for
    /// achievements, where empty is a normal state.
    NoCategories,
    Failed(StoreError),
}

/// Channels the presentation layer listens on. The orchestrator is the only
/// writer.
#[derive(Default)]
pub struct Output {
    pub categories: Publisher<Vec<CategoryItem>>,
    pub achievements: Publisher<Vec<Achievement>>,
    pub selected_category: Publisher<usize>,
    pub category_added: Publisher<bool>,
    pub category_status: Publisher<FetchStatus>,
    pub achievement_status: Publisher<FetchStatus>,
}

pub struct SyncOrchestrator<C, A> {
    categories: C,
    achievements: A,
    bootstrap: Option<SessionBootstrap>,
    generation: AtomicU64,
    output: Arc<Output>,
}

impl SyncOrchestrator<CategoryStore, AchievementStore> {
    /// Wire the remote stores and the per-session bootstrap to one client.
    pub fn remote(client: Arc<RemoteStoreClient>, config: &SyncConfig) -> Self {
        let categories = CategoryStore::new(Arc::clone(&client));
        let bootstrap = SessionBootstrap::new(BootstrapPolicy::new(categories.clone(), config));
        Self::new(categories, AchievementStore::new(client)).with_bootstrap(bootstrap)
    }
}

impl SyncOrchestrator<StaticCategoryRepository, StaticAchievementRepository> {
    pub fn offline() -> Self {
        Self::new(
            StaticCategoryRepository::default(),
            StaticAchievementRepository::default(),
        )
    }
}

impl<C: CategorySource, A: AchievementSource> SyncOrchestrator<C, A> {
    pub fn new(categories: C, achievements: A) -> Self {
        Self {
            categories,
            achievements,
            bootstrap: None,
            generation: AtomicU64::new(0),
            output: Arc::new(Output::default()),
        }
    }

    pub fn with_bootstrap(mut self, bootstrap: SessionBootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn output(&self) -> &Arc<Output> {
        &self.output
    }

    pub fn bootstrap(&self) -> Option<&SessionBootstrap> {
        self.bootstrap.as_ref()
    }

    /// Run one load cycle. Overlapping calls are allowed; only the newest one
    /// publishes.
    pub async fn load(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("Starting load {generation}");
        futures::join!(
            self.load_categories(generation),
            self.load_achievements(generation)
        );
    }

    async fn load_categories(&self, generation: u64) {
        if let Some(bootstrap) = &self.bootstrap {
            if let Err(e) = bootstrap.ensure().await {
                log::error!("Default categories unavailable, skipping category fetch: {e}");
                if self.is_current(generation, "category bootstrap failure") {
                    self.output.categories.send(Vec::new());
                    self.output.category_status.send(FetchStatus::Failed(e));
                }
                return;
            }
        }

        let result = self.categories.fetch_categories().await;
        if !self.is_current(generation, "categories") {
            return;
        }
        match result {
            Ok(categories) if categories.is_empty() => {
                log::warn!("User has no categories");
                self.output.categories.send(Vec::new());
                self.output.category_status.send(FetchStatus::NoCategories);
            }
            Ok(categories) => {
                let count = categories.len();
                self.output.categories.send(categories);
                self.output.category_status.send(FetchStatus::Loaded { count });
                self.output.selected_category.send(0);
            }
            Err(e) => {
                log::error!("Fetching categories failed: {e}");
                self.output.categories.send(Vec::new());
                self.output.category_status.send(FetchStatus::Failed(e));
            }
        }
    }

    async fn load_achievements(&self, generation: u64) {
        let result = self.achievements.fetch_achievements().await;
        if !self.is_current(generation, "achievements") {
            return;
        }
        let (achievements, status) = match result {
            Ok(achievements) => {
                let count = achievements.len();
                (achievements, FetchStatus::Loaded { count })
            }
            Err(e) => {
                log::error!("Fetching achievements failed: {e}");
                (Vec::new(), FetchStatus::Failed(e))
            }
        };
        self.output.achievements.send(achievements);
        self.output.achievement_status.send(status);
    }

    fn is_current(&self, generation: u64, what: &str) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            log::debug!("Dropping stale {what} from load {generation}, load {current} is newer");
        }
        current == generation
    }

    /// Create a category and report the outcome on `category_added`. Blank
    /// names are refused without touching the store.
    pub async fn add_category(&self, name: &str) -> bool {
        let name = name.trim();
        let added = if name.is_empty() {
            log::warn!("Refusing to add a category with a blank name");
            false
        } else {
            match self.categories.add_category(name).await {
                Ok(item) => {
                    log::info!("Added category {:?} ({})", item.name, item.id);
                    true
                }
                Err(e) => {
                    log::error!("Adding category {name:?} failed: {e}");
                    false
                }
            }
        };
        self.output.category_added.send(added);
        added
    }

    /// Publish `index` as the selected category if it is in range of the
    /// categories last published.
    pub fn select_category(&self, index: usize) -> bool {
        let count = self.output.categories.latest().map_or(0, |c| c.len());
        if index >= count {
            log::debug!("Ignoring selection {index} of {count} categories");
            return false;
        }
        self.output.selected_category.send(index);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryId;
    use futures::channel::oneshot;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Reply = Result<Vec<CategoryItem>, StoreError>;

    /// Each fetch waits on the next scripted reply.
    #[derive(Default)]
    struct ScriptedCategories {
        replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    }

    impl ScriptedCategories {
        fn script(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }
    }

    impl CategorySource for ScriptedCategories {
        async fn fetch_categories(&self) -> Result<Vec<CategoryItem>, StoreError> {
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(reply) => reply.await.unwrap_or(Err(StoreError::NotConnected)),
                None => Ok(Vec::new()),
            }
        }

        async fn add_category(&self, name: &str) -> Result<CategoryItem, StoreError> {
            Ok(CategoryItem::new(CategoryId::Index(99), name))
        }
    }

    fn named(names: &[&str]) -> Vec<CategoryItem> {
        names
            .iter()
            .zip(0u64..)
            .map(|(name, index)| CategoryItem::new(CategoryId::Index(index), *name))
            .collect()
    }

    #[tokio::test]
    async fn offline_load_publishes_and_selects_the_first_category() {
        let orchestrator = SyncOrchestrator::offline();
        orchestrator.load().await;

        let output = orchestrator.output();
        assert_eq!(output.categories.latest().map(|c| c.len()), Some(5));
        assert_eq!(output.category_status.latest(), Some(FetchStatus::Loaded { count: 5 }));
        assert_eq!(output.selected_category.latest(), Some(0));
        assert_eq!(output.achievements.latest(), Some(Vec::new()));
        assert_eq!(output.achievement_status.latest(), Some(FetchStatus::Loaded { count: 0 }));
    }

    #[tokio::test]
    async fn empty_categories_signal_instead_of_selecting() {
        let orchestrator =
            SyncOrchestrator::new(ScriptedCategories::default(), StaticAchievementRepository::default());
        orchestrator.load().await;

        let output = orchestrator.output();
        assert_eq!(output.categories.latest(), Some(Vec::new()));
        assert_eq!(output.category_status.latest(), Some(FetchStatus::NoCategories));
        assert_eq!(output.selected_category.latest(), None);
    }

    #[tokio::test]
    async fn stale_loads_do_not_publish() {
        let categories = ScriptedCategories::default();
        let first = categories.script();
        let second = categories.script();
        let orchestrator = SyncOrchestrator::new(categories, StaticAchievementRepository::default());

        let answer = async {
            // the newer load answers first, then the older one lands late
            let _ = second.send(Ok(named(&["all", "uncategorized"])));
            let _ = first.send(Ok(named(&["stale"])));
        };
        futures::join!(orchestrator.load(), orchestrator.load(), answer);

        let names: Vec<String> = orchestrator
            .output()
            .categories
            .latest()
            .unwrap_or_default()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["all", "uncategorized"]);
    }

    #[tokio::test]
    async fn selection_is_bounded_by_published_categories() {
        let orchestrator = SyncOrchestrator::offline();
        assert!(!orchestrator.select_category(0));

        orchestrator.load().await;
        assert!(orchestrator.select_category(4));
        assert!(!orchestrator.select_category(5));
        assert_eq!(orchestrator.output().selected_category.latest(), Some(4));
    }

    #[tokio::test]
    async fn blank_category_names_are_refused() {
        let orchestrator = SyncOrchestrator::offline();
        assert!(!orchestrator.add_category("   ").await);
        assert_eq!(orchestrator.output().category_added.latest(), Some(false));

        assert!(orchestrator.add_category(" reading ").await);
        assert_eq!(orchestrator.output().category_added.latest(), Some(true));
        orchestrator.load().await;
        let categories = orchestrator.output().categories.latest().unwrap_or_default();
        assert_eq!(categories.last().map(|c| c.name.as_str()), Some("reading"));
    }
}
