//! Image definition discovery
//!
//! Each subdirectory of the images directory is one buildable image.

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// A directory holding a Dockerfile and its build context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefinition {
    pub name: String,
    pub path: PathBuf,
}

impl ImageDefinition {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Minimal images have no dependencies on other base images
    pub fn is_minimal(&self) -> bool {
        self.name.contains("minimal")
    }
}

/// List image definitions under `images_dir`
///
/// With `image_name` the single matching subdirectory is returned, otherwise
/// every subdirectory, sorted by name. The result is in build order.
pub fn discover(images_dir: &Path, image_name: Option<&str>) -> BuildResult<Vec<ImageDefinition>> {
    let definitions = match image_name {
        Some(name) => {
            let path = images_dir.join(name);
            if !is_single_component(name) || !path.is_dir() {
                return Err(BuildError::ImageNotFound(name.to_string()));
            }
            vec![ImageDefinition::from_path(path)]
        }
        None => list_image_dirs(images_dir)?,
    };

    if definitions.is_empty() {
        return Err(BuildError::NoImages(images_dir.to_path_buf()));
    }

    Ok(build_order(definitions))
}

fn is_single_component(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn list_image_dirs(images_dir: &Path) -> BuildResult<Vec<ImageDefinition>> {
    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&images_dir.to_string_lossy())
    );
    tracing::debug!("Scanning for images: {}", pattern);

    // Hidden directories such as `.github` are not images
    let options = glob::MatchOptions {
        require_literal_leading_dot: true,
        ..glob::MatchOptions::new()
    };
    let entries = glob::glob_with(&pattern, options).map_err(|e| {
        BuildError::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    })?;

    let mut definitions = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BuildError::Io(e.into_error()))?;
        if path.is_dir() {
            definitions.push(ImageDefinition::from_path(path));
        }
    }
    definitions.sort_by(|a, b| a.name.cmp(&b.name));

    tracing::debug!("Found {} image directories", definitions.len());
    Ok(definitions)
}

/// Move minimal images to the front, keeping relative order within each group
pub fn build_order(definitions: Vec<ImageDefinition>) -> Vec<ImageDefinition> {
    let (mut minimal, rest): (Vec<_>, Vec<_>) =
        definitions.into_iter().partition(ImageDefinition::is_minimal);
    minimal.extend(rest);
    minimal
}
