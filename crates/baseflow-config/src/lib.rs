//! Settings for baseflow
//!
//! Settings are read from an optional YAML file. When no file exists the
//! built-in defaults apply, so a bare checkout of the base-images repository
//! works without any configuration.

pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Organization prefix used for image repositories (`<org>/<name>`)
pub const DEFAULT_ORGANIZATION: &str = "gigantum";

/// Directory holding one subdirectory per base image, relative to the root
pub const DEFAULT_IMAGES_DIR: &str = "resources/submodules/base-images";

/// Tracking file path, relative to the root
pub const DEFAULT_TRACKING_FILE: &str = ".image-build-status.json";

/// Environment variable pointing directly at a settings file
pub const CONFIG_ENV: &str = "BASEFLOW_CONFIG";

const CANDIDATES: [&str; 2] = ["baseflow.local.yaml", "baseflow.yaml"];

/// Raw contents of a settings file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    organization: Option<String>,
    images_dir: Option<PathBuf>,
    tracking_file: Option<PathBuf>,
}

/// Resolved settings. All paths are absolute or root-relative joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub organization: String,
    pub images_dir: PathBuf,
    pub tracking_file: PathBuf,
    /// Settings file the values came from, if any
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Defaults for the given root, without reading any file
    pub fn defaults(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            images_dir: root.join(DEFAULT_IMAGES_DIR),
            tracking_file: root.join(DEFAULT_TRACKING_FILE),
            organization: DEFAULT_ORGANIZATION.to_string(),
            source: None,
            root,
        }
    }

    /// Load settings for `root`, falling back to defaults when no file is found
    pub fn load(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound(root.to_path_buf()));
        }

        let mut settings = Self::defaults(root);

        let Some(path) = find_settings_file(root) else {
            tracing::debug!("No settings file found, using defaults");
            return Ok(settings);
        };

        tracing::debug!("Loading settings from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        let file: SettingsFile = if content.trim().is_empty() {
            SettingsFile::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        };

        if let Some(org) = file.organization {
            settings = settings.with_organization(org)?;
        }
        if let Some(dir) = file.images_dir {
            settings.images_dir = root.join(dir);
        }
        if let Some(tracking) = file.tracking_file {
            settings.tracking_file = root.join(tracking);
        }
        settings.source = Some(path);

        Ok(settings)
    }

    /// Override the organization after validating it as a repository prefix
    pub fn with_organization(mut self, organization: impl Into<String>) -> Result<Self> {
        let organization = organization.into();
        validate_organization(&organization)?;
        self.organization = organization;
        Ok(self)
    }
}

/// Docker repository names are lowercase; the organization becomes their prefix.
fn validate_organization(org: &str) -> Result<()> {
    if org.is_empty() {
        return Err(ConfigError::Invalid {
            field: "organization",
            message: "must not be empty".to_string(),
        });
    }

    if let Some(c) = org
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(*c)))
    {
        return Err(ConfigError::Invalid {
            field: "organization",
            message: format!("invalid character '{}' in '{}'", c, org),
        });
    }

    if org.starts_with('/') || org.ends_with('/') {
        return Err(ConfigError::Invalid {
            field: "organization",
            message: format!("'{}' must not start or end with '/'", org),
        });
    }

    Ok(())
}

/// Find the settings file for `root`
///
/// Lookup order:
/// 1. `BASEFLOW_CONFIG` environment variable (direct path)
/// 2. `<root>/baseflow.local.yaml`, `<root>/baseflow.yaml`
/// 3. `<root>/.baseflow/` with the same names
/// 4. `~/.config/baseflow/baseflow.yaml`
pub fn find_settings_file(root: &Path) -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_ENV) {
        let path = PathBuf::from(config_path);
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!("{} points to a missing file: {}", CONFIG_ENV, path.display());
    }

    let dirs_to_search = [root.to_path_buf(), root.join(".baseflow")];
    for dir in &dirs_to_search {
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.is_file() {
                return Some(path);
            }
        }
    }

    dirs::config_dir()
        .map(|d| d.join("baseflow").join("baseflow.yaml"))
        .filter(|p| p.is_file())
}
