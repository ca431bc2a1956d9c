//! Registry credentials for pushes
//!
//! Credentials come from the Docker CLI's `config.json`: inline `auths`
//! entries first, then the configured `credsStore` helper.

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Registry used when an image reference names none
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Keys under which the Docker CLI stores Docker Hub logins
const DOCKER_HUB_KEYS: [&str; 3] = [
    "https://index.docker.io/v1/",
    "index.docker.io",
    "docker.io",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// base64 of `username:password`
    auth: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// Registry host of an image reference
///
/// The first path segment is a registry only when it looks like a host
/// (`ghcr.io/org/app`, `localhost:5000/app`); `gigantum/python3-minimal`
/// lives on Docker Hub.
pub fn registry_host(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') || first == "localhost" => {
            first
        }
        _ => DEFAULT_REGISTRY,
    }
}

/// Looks up credentials in a Docker `config.json`
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::from_env()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`, or `~/.docker/config.json`
    pub fn from_env() -> Self {
        let dir = std::env::var_os("DOCKER_CONFIG")
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".docker")))
            .unwrap_or_else(|| PathBuf::from(".docker"));
        Self::with_config_path(dir.join("config.json"))
    }

    pub fn with_config_path(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Credentials for pushing `image`, or `None` to push anonymously
    pub fn credentials_for(&self, image: &str) -> BuildResult<Option<DockerCredentials>> {
        let registry = registry_host(image);

        if !self.config_path.is_file() {
            tracing::debug!("Docker config not found at {}", self.config_path.display());
            return Ok(None);
        }
        let config = self.read_config()?;

        let keys: Vec<&str> = if registry == DEFAULT_REGISTRY {
            DOCKER_HUB_KEYS.to_vec()
        } else {
            vec![registry]
        };

        for key in &keys {
            if let Some(encoded) = config.auths.get(*key).and_then(|e| e.auth.as_deref())
                && let Some(creds) = decode_auth(encoded, key)?
            {
                tracing::debug!("Using stored credentials for {}", key);
                return Ok(Some(creds));
            }
        }

        if let Some(helper) = config.creds_store.as_deref() {
            for key in &keys {
                match run_helper(helper, key) {
                    Ok(Some(creds)) => return Ok(Some(creds)),
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Credential helper {} failed: {}", helper, e),
                }
            }
        }

        tracing::debug!("No credentials for {}", registry);
        Ok(None)
    }

    fn read_config(&self) -> BuildResult<DockerConfigFile> {
        let auth_err = |message: String| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| auth_err(format!("cannot read config.json: {}", e)))?;
        serde_json::from_str(&content).map_err(|e| auth_err(format!("invalid config.json: {}", e)))
    }
}

fn decode_auth(encoded: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let auth_err = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| auth_err(format!("invalid base64 in auth: {}", e)))?;
    let pair = String::from_utf8(decoded).map_err(|e| auth_err(format!("auth is not UTF-8: {}", e)))?;

    Ok(pair.split_once(':').map(|(user, pass)| DockerCredentials {
        username: Some(user.to_string()),
        password: Some(pass.to_string()),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }))
}

/// Ask `docker-credential-<helper>` for the registry's secret
fn run_helper(helper: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
    let program = format!("docker-credential-{}", helper);
    let auth_err = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| auth_err(format!("failed to run {}: {}", program, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        // The helper exits non-zero when it has nothing stored for this registry
        return Ok(None);
    }

    let response: HelperResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| auth_err(format!("unexpected {} output: {}", program, e)))?;

    Ok(Some(DockerCredentials {
        username: Some(response.username),
        password: Some(response.secret),
        serveraddress: Some(registry.to_string()),
        ..Default::default()
    }))
}
