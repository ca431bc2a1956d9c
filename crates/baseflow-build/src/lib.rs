//! Base image build functionality for baseflow
//!
//! Discovers image directories, builds them through a [`ContainerEngine`]
//! (minimal images first), tracks every built tag in a JSON file, and pushes
//! unpublished tags to their registry.

pub mod auth;
pub mod commit;
pub mod context;
pub mod discovery;
pub mod docker;
pub mod engine;
pub mod error;
pub mod manager;
pub mod progress;
pub mod tag;
pub mod tracking;

pub use auth::RegistryAuth;
pub use commit::{CommitSource, GitCommitSource, StaticCommit};
pub use context::ContextBuilder;
pub use discovery::{ImageDefinition, build_order, discover};
pub use docker::DockerEngine;
pub use engine::{BuildRequest, ContainerEngine};
pub use error::{BuildError, BuildResult};
pub use manager::{BaseImageManager, BuildOptions, ManagerConfig};
pub use progress::StreamProgress;
pub use tag::{Clock, FixedClock, ImageTags, SystemClock, split_image_tag, tag_suffix};
pub use tracking::{JsonFileStore, MemoryStore, TrackingData, TrackingRecord, TrackingStore};
