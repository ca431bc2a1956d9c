use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Image `{0}` not found.")]
    ImageNotFound(String),

    #[error("Tag `{0}` not found or already published.")]
    TagNotFound(String),

    #[error("No images to build in {0}")]
    NoImages(PathBuf),

    #[error("You must first build images locally before publishing")]
    NothingBuilt,

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Image Build Failed! `{0}` does not exist after building")]
    ImageMissingAfterBuild(String),

    #[error("Dockerfile not found: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid image tag: {tag}")]
    InvalidTag { tag: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Could not read commit hash: {0}")]
    CommitUnavailable(String),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Tracking file error: {0}")]
    Tracking(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// The requested image, tag, or image set does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BuildError::ImageNotFound(_) | BuildError::TagNotFound(_) | BuildError::NoImages(_)
        )
    }

    /// The operation was attempted before its prerequisites were met
    pub fn is_precondition(&self) -> bool {
        matches!(self, BuildError::NothingBuilt)
    }

    /// The engine failed to produce the image
    pub fn is_build_failure(&self) -> bool {
        matches!(
            self,
            BuildError::BuildFailed(_) | BuildError::ImageMissingAfterBuild(_)
        )
    }

    /// Multi-line message with a hint for the user
    pub fn user_message(&self) -> String {
        match self {
            BuildError::ImageNotFound(name) => {
                format!(
                    "Image `{}` not found.\n\
                     \n\
                     Each base image is a subdirectory of the images directory.\n\
                     Run `baseflow build` without a name to build all of them.",
                    name
                )
            }
            BuildError::NothingBuilt => "You must first build images locally before publishing.\n\
                 \n\
                 Run `baseflow build` first, then `baseflow publish`."
                .to_string(),
            BuildError::DockerfileNotFound(path) => {
                format!(
                    "Dockerfile not found: {}\n\
                     \n\
                     Every image directory needs a Dockerfile at its top level.",
                    path.display()
                )
            }
            BuildError::CommitUnavailable(msg) => {
                format!(
                    "Could not read commit hash: {}\n\
                     \n\
                     Run inside a git checkout, or pass --commit <HASH>.",
                    msg
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
