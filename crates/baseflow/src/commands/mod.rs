pub mod build;
pub mod publish;
pub mod status;

use baseflow_build::{
    BaseImageManager, CommitSource, ContainerEngine, GitCommitSource, JsonFileStore,
    ManagerConfig, StaticCommit,
};
use baseflow_config::Settings;
use std::sync::Arc;

pub fn tracking_store(settings: &Settings) -> JsonFileStore {
    JsonFileStore::new(&settings.tracking_file)
}

/// Wire the manager to the tracking file and the repository at `settings.root`
pub fn manager(
    settings: &Settings,
    engine: Arc<dyn ContainerEngine>,
    commit_override: Option<String>,
) -> BaseImageManager {
    let commits: Arc<dyn CommitSource> = match commit_override {
        Some(hash) => Arc::new(StaticCommit(hash)),
        None => Arc::new(GitCommitSource::new(&settings.root)),
    };

    BaseImageManager::new(
        ManagerConfig {
            organization: settings.organization.clone(),
            images_dir: settings.images_dir.clone(),
        },
        engine,
        commits,
        Arc::new(tracking_store(settings)),
    )
}
