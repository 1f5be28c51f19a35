//! Category and achievement sync for Moti.
//!
//! [`SyncOrchestrator`] drives a screen load: it makes sure the signed-in user
//! has their default categories, fetches categories and achievements
//! concurrently, and publishes the results on the channels in [`Output`].
//! Everything remote goes through a [`tether::RemoteStoreClient`] that the
//! composition root builds once and shares.

mod bootstrap;
mod config;
mod fallback;
mod gate;
mod model;
mod orchestrator;
mod publisher;
mod stores;
mod version;

use std::sync::LazyLock;

pub use bootstrap::{BootstrapOutcome, BootstrapPolicy};
pub use config::{SyncConfig, paths};
pub use fallback::{StaticAchievementRepository, StaticCategoryRepository};
pub use gate::{BootstrapGate, SessionBootstrap};
pub use model::{Achievement, CategoryId, CategoryItem, NewAchievement, Record};
pub use orchestrator::{FetchStatus, Output, SyncOrchestrator};
pub use publisher::{ListenerKey, Publisher};
pub use stores::{AchievementSource, AchievementStore, CategorySource, CategoryStore};
pub use version::{VersionInfo, fetch_version};

// installs the logger at most once per process
static LOGGER: LazyLock<()> = LazyLock::new(|| {
    #[cfg(not(target_arch = "wasm32"))]
    {
        // the host may already have installed a logger
        let _ = env_logger::try_init();
    }
    #[cfg(target_arch = "wasm32")]
    wasm_logger::init(wasm_logger::Config::default());

    log::info!("Logging initialized");
});

pub fn init_logging() {
    LazyLock::force(&LOGGER);
}
