//! Container engine abstraction
//!
//! The manager only needs four engine operations. [`crate::DockerEngine`]
//! implements them against the Docker Engine API.

use crate::error::BuildResult;
use async_trait::async_trait;
use std::path::PathBuf;

/// Parameters for a single image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// Directory containing the Dockerfile, sent as the build context
    pub context_dir: PathBuf,
    /// Full tag to apply (`repo:tag`)
    pub tag: String,
    /// Pull newer versions of `FROM` images
    pub pull: bool,
    pub no_cache: bool,
    /// Stream engine output to the console
    pub verbose: bool,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build an image from `request.context_dir`
    async fn build(&self, request: &BuildRequest) -> BuildResult<()>;

    /// Add `repository:tag` to an existing image
    async fn tag(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()>;

    /// Whether an image with this reference exists locally
    async fn image_exists(&self, image: &str) -> BuildResult<bool>;

    /// Push `repository:tag` to its registry
    async fn push(&self, repository: &str, tag: &str, verbose: bool) -> BuildResult<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use crate::error::BuildError;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Build(BuildRequest),
        Tag { source: String, target: String },
        Exists(String),
        Push { repository: String, tag: String },
    }

    /// In-memory engine that records calls
    #[derive(Debug, Default)]
    pub struct FakeEngine {
        pub calls: Mutex<Vec<Call>>,
        pub images: Mutex<BTreeSet<String>>,
        /// Tags whose build reports an engine error
        pub fail_build: Mutex<BTreeSet<String>>,
        /// Tags whose build "succeeds" without producing an image
        pub drop_build: Mutex<BTreeSet<String>>,
        /// `repo:tag` references whose push fails
        pub fail_push: Mutex<BTreeSet<String>>,
    }

    impl FakeEngine {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn builds(&self) -> Vec<BuildRequest> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Build(r) => Some(r),
                    _ => None,
                })
                .collect()
        }

        pub fn pushes(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Push { repository, tag } => Some(format!("{}:{}", repository, tag)),
                    _ => None,
                })
                .collect()
        }

        pub fn has_image(&self, image: &str) -> bool {
            self.images.lock().unwrap().contains(image)
        }
    }

    #[async_trait]
    impl ContainerEngine for FakeEngine {
        async fn build(&self, request: &BuildRequest) -> BuildResult<()> {
            self.calls.lock().unwrap().push(Call::Build(request.clone()));
            if self.fail_build.lock().unwrap().contains(&request.tag) {
                return Err(BuildError::BuildFailed(format!(
                    "The command '/bin/sh -c false' returned a non-zero code: 1 ({})",
                    request.tag
                )));
            }
            if !self.drop_build.lock().unwrap().contains(&request.tag) {
                self.images.lock().unwrap().insert(request.tag.clone());
            }
            Ok(())
        }

        async fn tag(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()> {
            let target = format!("{}:{}", repository, tag);
            self.calls.lock().unwrap().push(Call::Tag {
                source: source.to_string(),
                target: target.clone(),
            });
            let mut images = self.images.lock().unwrap();
            if !images.contains(source) {
                return Err(BuildError::BuildFailed(format!(
                    "No such image: {}",
                    source
                )));
            }
            images.insert(target);
            Ok(())
        }

        async fn image_exists(&self, image: &str) -> BuildResult<bool> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Exists(image.to_string()));
            Ok(self.has_image(image))
        }

        async fn push(&self, repository: &str, tag: &str, _verbose: bool) -> BuildResult<()> {
            self.calls.lock().unwrap().push(Call::Push {
                repository: repository.to_string(),
                tag: tag.to_string(),
            });
            let reference = format!("{}:{}", repository, tag);
            if self.fail_push.lock().unwrap().contains(&reference) {
                return Err(BuildError::PushFailed {
                    message: format!("denied: requested access to {} is denied", reference),
                });
            }
            Ok(())
        }
    }
}
