//! Base image build and publish workflow
//!
//! Images are built one at a time in discovery order (minimal images first),
//! each build is recorded in the tracking store, and publishing pushes every
//! tag the store still lists as unpublished.

use crate::commit::CommitSource;
use crate::discovery::{self, ImageDefinition};
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::{BuildError, BuildResult};
use crate::tag::{self, Clock, ImageTags, SystemClock};
use crate::tracking::TrackingStore;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

/// Where images live and how they are named
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub organization: String,
    pub images_dir: PathBuf,
}

/// Per-invocation build flags
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub verbose: bool,
    pub no_cache: bool,
}

pub struct BaseImageManager {
    config: ManagerConfig,
    engine: Arc<dyn ContainerEngine>,
    commits: Arc<dyn CommitSource>,
    store: Arc<dyn TrackingStore>,
    clock: Arc<dyn Clock>,
}

impl BaseImageManager {
    pub fn new(
        config: ManagerConfig,
        engine: Arc<dyn ContainerEngine>,
        commits: Arc<dyn CommitSource>,
        store: Arc<dyn TrackingStore>,
    ) -> Self {
        Self {
            config,
            engine,
            commits,
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Image definitions in build order
    pub fn discover(&self, image_name: Option<&str>) -> BuildResult<Vec<ImageDefinition>> {
        discovery::discover(&self.config.images_dir, image_name)
    }

    /// `<hash10>-<YYYY-MM-DD>` for the current commit and UTC date
    pub fn tag_suffix(&self) -> BuildResult<String> {
        let hash = self.commits.current_commit_hash()?;
        Ok(tag::tag_suffix(&hash, self.clock.now().date_naive()))
    }

    /// Build one image, or all of them when `image_name` is `None`
    ///
    /// Returns the named tags in build order. The first failure stops the run.
    pub async fn build(
        &self,
        image_name: Option<&str>,
        options: BuildOptions,
    ) -> BuildResult<Vec<String>> {
        let definitions = self.discover(image_name)?;
        let suffix = self.tag_suffix()?;
        let total = definitions.len();
        tracing::debug!("Building {} image(s) with suffix {}", total, suffix);

        let mut built = Vec::with_capacity(total);
        for (i, definition) in definitions.iter().enumerate() {
            println!(
                "({}/{}) Building Base Image: {}",
                i + 1,
                total,
                definition.name.cyan()
            );

            let named_tag = self.build_image(definition, &suffix, options).await?;

            println!("  {} Complete", "✓".green());
            println!("  - Tag: {}", named_tag.cyan());
            built.push(named_tag);
        }

        Ok(built)
    }

    /// Build a single image definition and record it as built
    pub async fn build_image(
        &self,
        definition: &ImageDefinition,
        suffix: &str,
        options: BuildOptions,
    ) -> BuildResult<String> {
        let tags = ImageTags::new(&self.config.organization, &definition.name, suffix);
        let named_tag = tags.named();

        let request = BuildRequest {
            context_dir: definition.path.clone(),
            tag: named_tag.clone(),
            pull: tags.is_minimal(),
            no_cache: options.no_cache,
            verbose: options.verbose,
        };
        self.engine.build(&request).await?;

        if !self.engine.image_exists(&named_tag).await? {
            return Err(BuildError::ImageMissingAfterBuild(named_tag));
        }

        // Local alias for Dockerfiles that build FROM another base image; never published
        self.engine
            .tag(&named_tag, &tags.repository, "latest")
            .await?;
        tracing::debug!("Tagged {}", tags.latest());

        self.record_build(&named_tag).await?;
        Ok(named_tag)
    }

    async fn record_build(&self, named_tag: &str) -> BuildResult<()> {
        let mut data = self.store.load().await?.unwrap_or_default();
        data.record_build(named_tag, self.clock.now());
        self.store.save(&data).await
    }

    /// Push unpublished tags, or only `image_tag` when given
    ///
    /// Each successful push is saved before the next one starts, so a failure
    /// part way keeps the earlier images marked as published.
    pub async fn publish(&self, image_tag: Option<&str>, verbose: bool) -> BuildResult<Vec<String>> {
        let mut data = match self.store.load().await? {
            Some(data) if !data.is_empty() => data,
            _ => return Err(BuildError::NothingBuilt),
        };

        let mut to_push = data.unpublished();
        if let Some(requested) = image_tag {
            if !to_push.iter().any(|t| t == requested) {
                return Err(BuildError::TagNotFound(requested.to_string()));
            }
            to_push = vec![requested.to_string()];
        }

        if to_push.is_empty() {
            println!("{}", "All built images are already published".yellow());
            return Ok(to_push);
        }

        let total = to_push.len();
        for (i, image_tag) in to_push.iter().enumerate() {
            println!(
                "({}/{}) Publishing Base Image: {}",
                i + 1,
                total,
                image_tag.cyan()
            );

            let (repository, tag) = tag::split_image_tag(image_tag);
            self.engine.push(&repository, &tag, verbose).await?;

            data.mark_published(image_tag)?;
            self.store.save(&data).await?;

            println!("  {} Complete", "✓".green());
            println!("  - Tag: {}", image_tag.cyan());
        }

        Ok(to_push)
    }
}
