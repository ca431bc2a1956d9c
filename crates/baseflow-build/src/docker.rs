//! Docker Engine API adapter

use crate::auth::RegistryAuth;
use crate::context::ContextBuilder;
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::{BuildError, BuildResult};
use crate::progress::StreamProgress;
use crate::tag::validate_tag;
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{BuildInfo, PushImageInfo};
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};

/// [`ContainerEngine`] backed by a local Docker daemon
pub struct DockerEngine {
    docker: Docker,
    auth: RegistryAuth,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            auth: RegistryAuth::from_env(),
        }
    }

    pub fn with_auth(docker: Docker, auth: RegistryAuth) -> Self {
        Self { docker, auth }
    }

    /// Connect with the local defaults (`DOCKER_HOST` or the default socket) and ping
    pub async fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        tracing::debug!("Connected to Docker daemon");
        Ok(Self::new(docker))
    }

    fn handle_build_output(&self, output: BuildInfo, progress: &StreamProgress) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            progress.stream(&stream);
        }

        if let Some(error_detail) = output.error_detail {
            let message = error_detail
                .message
                .or(output.error)
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(message));
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(status) = output.status {
            progress.status(&status, output.progress.as_deref());
        }

        Ok(())
    }
}

/// Line to show for one push message, if any
///
/// Verbose output keeps every status line. The spinner skips layer
/// bookkeeping and repeats of the previous status.
fn push_status_line(info: &PushImageInfo, verbose: bool, last_status: &mut String) -> Option<String> {
    let status = info.status.as_deref()?;
    let line = match info.progress.as_deref() {
        Some(p) if !p.is_empty() => format!("{} {}", status, p),
        _ => status.to_string(),
    };

    if verbose {
        return Some(line);
    }

    match status {
        "Pushing" => Some(line),
        "Preparing" | "Waiting" => None,
        _ if status != last_status => {
            *last_status = status.to_string();
            Some(status.to_string())
        }
        _ => None,
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build(&self, request: &BuildRequest) -> BuildResult<()> {
        tracing::info!("Building image: {}", request.tag);

        let context_dir = request.context_dir.clone();
        let context = tokio::task::spawn_blocking(move || ContextBuilder::create_context(&context_dir))
            .await
            .map_err(|e| BuildError::Io(std::io::Error::other(e)))??;

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: request.tag.as_str(),
            nocache: request.no_cache,
            pull: request.pull,
            rm: true,
            forcerm: true,
            ..Default::default()
        };
        tracing::debug!("Build options: {:?}", options);

        let body = Full::new(Bytes::from(context));
        #[allow(deprecated)]
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        let progress = StreamProgress::new(request.verbose, &format!("Building {}...", request.tag));
        let mut result = Ok(());
        while let Some(msg) = stream.next().await {
            let step = match msg {
                Ok(output) => self.handle_build_output(output, &progress),
                Err(e) => Err(BuildError::DockerConnection(e)),
            };
            if let Err(e) = step {
                result = Err(e);
                break;
            }
        }
        progress.finish();

        if result.is_ok() {
            tracing::info!("Successfully built: {}", request.tag);
        }
        result
    }

    async fn tag(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()> {
        tracing::debug!("Tagging {} as {}:{}", source, repository, tag);

        #[allow(deprecated)]
        let options = bollard::image::TagImageOptions {
            repo: repository,
            tag,
        };
        #[allow(deprecated)]
        self.docker.tag_image(source, Some(options)).await?;
        Ok(())
    }

    async fn image_exists(&self, image: &str) -> BuildResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }

    async fn push(&self, repository: &str, tag: &str, verbose: bool) -> BuildResult<()> {
        validate_tag(tag)?;
        let full_image = format!("{}:{}", repository, tag);
        tracing::info!("Pushing image: {}", full_image);

        let credentials = self.auth.credentials_for(&full_image)?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };
        #[allow(deprecated)]
        let mut stream = self.docker.push_image(repository, Some(options), credentials);

        let progress = StreamProgress::new(verbose, &format!("Pushing {}...", full_image));
        let mut last_status = String::new();
        let mut error_message = None;

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => match info.error {
                    Some(err) => error_message = Some(err),
                    None => {
                        if let Some(line) = push_status_line(&info, verbose, &mut last_status) {
                            progress.status(&line, None);
                        }
                    }
                },
                Err(e) => {
                    progress.finish();
                    return Err(BuildError::PushFailed {
                        message: e.to_string(),
                    });
                }
            }
        }
        progress.finish();

        if let Some(message) = error_message {
            return Err(BuildError::PushFailed { message });
        }

        tracing::info!("Pushed: {}", full_image);
        Ok(())
    }
}
