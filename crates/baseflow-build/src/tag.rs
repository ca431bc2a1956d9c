//! Image tag generation
//!
//! Every build is tagged `<org>/<name>:<hash10>-<YYYY-MM-DD>` plus a local
//! `<org>/<name>:latest` alias that dependent Dockerfiles can refer to.

use crate::error::{BuildError, BuildResult};
use chrono::{DateTime, NaiveDate, Utc};

/// Number of commit hash characters kept in a tag suffix
pub const COMMIT_PREFIX_LEN: usize = 10;

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Build the `<hash10>-<YYYY-MM-DD>` suffix
pub fn tag_suffix(commit_hash: &str, date: NaiveDate) -> String {
    let prefix: String = commit_hash.chars().take(COMMIT_PREFIX_LEN).collect();
    format!("{}-{}", prefix, date.format("%Y-%m-%d"))
}

/// Tags produced for one image build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTags {
    /// `<org>/<name>`
    pub repository: String,
    /// Suffix part of the named tag
    pub suffix: String,
}

impl ImageTags {
    pub fn new(organization: &str, image_name: &str, suffix: impl Into<String>) -> Self {
        Self {
            repository: format!("{}/{}", organization, image_name),
            suffix: suffix.into(),
        }
    }

    /// `<org>/<name>:<suffix>`, the tag that gets tracked and published
    pub fn named(&self) -> String {
        format!("{}:{}", self.repository, self.suffix)
    }

    /// `<org>/<name>:latest`, local only
    pub fn latest(&self) -> String {
        format!("{}:latest", self.repository)
    }

    /// Minimal images pull their upstream layers on build
    pub fn is_minimal(&self) -> bool {
        self.repository.contains("minimal")
    }
}

/// Split an image reference into repository and tag
///
/// # Examples
/// - `gigantum/python3-minimal:abc-2024-01-01` -> `("gigantum/python3-minimal", "abc-2024-01-01")`
/// - `gigantum/python3-minimal` -> `("gigantum/python3-minimal", "latest")`
/// - `localhost:5000/app` -> `("localhost:5000/app", "latest")`
/// - `org/x:123` -> `("org/x", "123")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let tag = &image[pos + 1..];
        // A colon before the last `/` is the registry port
        if !tag.contains('/') {
            return (image[..pos].to_string(), tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}

/// Check a tag against Docker's rules: 1-128 chars of `[A-Za-z0-9_.-]`,
/// not starting with `.` or `-`
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_tag_suffix_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let hash = "0123456789abcdef0123456789abcdef01234567";

        assert_eq!(tag_suffix(hash, date), "0123456789-2024-01-01");
        assert_eq!(tag_suffix(hash, date), tag_suffix(hash, date));
    }

    #[test]
    fn test_tag_suffix_short_hash() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 5).unwrap();
        assert_eq!(tag_suffix("abc", date), "abc-2023-12-05");
    }

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 0).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), at);
        assert_eq!(
            tag_suffix("ffffffffffff", clock.now().date_naive()),
            "ffffffffff-2024-02-29"
        );
    }

    #[test]
    fn test_image_tags() {
        let tags = ImageTags::new("gigantum", "python3-minimal", "abc-2024-01-01");
        assert_eq!(tags.named(), "gigantum/python3-minimal:abc-2024-01-01");
        assert_eq!(tags.latest(), "gigantum/python3-minimal:latest");
        assert!(tags.is_minimal());

        let tags = ImageTags::new("gigantum", "r-tidyverse", "abc-2024-01-01");
        assert!(!tags.is_minimal());
    }

    #[test]
    fn test_split_image_tag() {
        assert_eq!(
            split_image_tag("org/x:abc-2024-01-01"),
            ("org/x".to_string(), "abc-2024-01-01".to_string())
        );
        assert_eq!(
            split_image_tag("org/x"),
            ("org/x".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/org/x"),
            ("localhost:5000/org/x".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/org/x:dev"),
            ("localhost:5000/org/x".to_string(), "dev".to_string())
        );
    }

    #[test]
    fn test_split_image_tag_numeric_tag() {
        assert_eq!(
            split_image_tag("org/x:123"),
            ("org/x".to_string(), "123".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/org/x:20240101"),
            ("localhost:5000/org/x".to_string(), "20240101".to_string())
        );
    }

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("0123456789-2024-01-01").is_ok());
        assert!(validate_tag("latest").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("-dash").is_err());
        assert!(validate_tag(".dot").is_err());
        assert!(validate_tag("has space").is_err());
        assert!(validate_tag(&"a".repeat(129)).is_err());
        assert!(validate_tag(&"a".repeat(128)).is_ok());
    }
}
