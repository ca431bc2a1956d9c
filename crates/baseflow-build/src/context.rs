use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use glob::{MatchOptions, Pattern};
use std::fs;
use std::io::Write;
use std::path::Path;
use tar::Builder;

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;
const DOCKERIGNORE: &str = ".dockerignore";

/// Packs an image directory into the tar.gz body the engine expects
pub struct ContextBuilder;

impl ContextBuilder {
    /// Archive `context_dir`; it must hold a `Dockerfile` at the top level.
    /// Entries matched by `<context_dir>/.dockerignore` are left out.
    pub fn create_context(context_dir: &Path) -> BuildResult<Vec<u8>> {
        let dockerfile = context_dir.join("Dockerfile");
        if !dockerfile.is_file() {
            return Err(BuildError::DockerfileNotFound(dockerfile));
        }

        tracing::debug!("Creating build context from: {}", context_dir.display());
        let ignore = IgnoreRules::load(context_dir)?;

        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);
            append_tree(&mut tar, context_dir, context_dir, &ignore)?;
            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        if archive_data.len() > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context for {} is {}MB; consider a .dockerignore",
                context_dir.display(),
                archive_data.len() / 1024 / 1024
            );
        }

        Ok(archive_data)
    }
}

fn append_tree<W: Write>(
    tar: &mut Builder<W>,
    root: &Path,
    dir: &Path,
    ignore: &IgnoreRules,
) -> BuildResult<()> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = path.strip_prefix(root).map_err(std::io::Error::other)?;
        let name = relative.to_string_lossy().replace('\\', "/");
        let excluded = ignore.is_excluded(&name);

        if entry.file_type()?.is_dir() {
            if !excluded {
                tar.append_dir(relative, &path)?;
            }
            // Exceptions can re-include files below an excluded directory
            if !excluded || ignore.has_exceptions() {
                append_tree(tar, root, &path, ignore)?;
            }
        } else if excluded {
            tracing::trace!("Skipping ignored file: {}", name);
        } else {
            tar.append_path_with_name(&path, relative)?;
        }
    }

    Ok(())
}

/// Exclusion patterns read from a `.dockerignore` file
///
/// Patterns match paths relative to the context root; `*` does not cross
/// `/`, a leading `!` re-includes, and the last matching line wins. A pattern
/// that matches a directory excludes everything below it. `Dockerfile` and
/// `.dockerignore` are always sent.
#[derive(Debug, Default)]
struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

#[derive(Debug)]
struct IgnoreRule {
    pattern: Pattern,
    exception: bool,
}

impl IgnoreRules {
    fn load(context_dir: &Path) -> BuildResult<Self> {
        let path = context_dir.join(DOCKERIGNORE);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let rules = Self::parse(&fs::read_to_string(&path)?)?;
        tracing::debug!("Loaded {} ignore patterns from {}", rules.rules.len(), path.display());
        Ok(rules)
    }

    fn parse(content: &str) -> BuildResult<Self> {
        let mut rules = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (exception, raw) = match line.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, line),
            };
            let raw = raw.trim_start_matches("./").trim_matches('/');
            if raw.is_empty() {
                continue;
            }

            let pattern = Pattern::new(raw).map_err(|e| {
                BuildError::BuildFailed(format!("Invalid {} pattern `{}`: {}", DOCKERIGNORE, line, e))
            })?;
            rules.push(IgnoreRule { pattern, exception });
        }
        Ok(Self { rules })
    }

    fn has_exceptions(&self) -> bool {
        self.rules.iter().any(|r| r.exception)
    }

    fn is_excluded(&self, relative: &str) -> bool {
        if relative == "Dockerfile" || relative == DOCKERIGNORE {
            return false;
        }

        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        // The path itself and each of its parent directories
        let candidates: Vec<&str> = relative
            .match_indices('/')
            .map(|(i, _)| &relative[..i])
            .chain(std::iter::once(relative))
            .collect();

        let mut excluded = false;
        for rule in &self.rules {
            if candidates.iter().any(|c| rule.pattern.matches_with(c, options)) {
                excluded = !rule.exception;
            }
        }
        excluded
    }
}
