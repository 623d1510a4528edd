//! The unified post abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{Md5, Rating, TagSet};

/// Single booru image post.
///
/// Accessors returning `Result` may need network I/O the first time they are
/// called. Their results are cached on the post, so later calls are cheap and
/// return the same values. Concurrent first calls from several tasks are
/// allowed; only one of them performs the I/O.
#[async_trait]
pub trait Post: Send + Sync + std::fmt::Debug {
    /// Explicitness rating.
    async fn rating(&self) -> Result<Rating>;

    /// MD5 hash of the source file.
    fn md5(&self) -> Result<Md5>;

    /// Source file URL.
    fn file_url(&self) -> &str;

    /// Sample image URL, or the file URL if no sample exists.
    fn sample_url(&self) -> &str;

    /// Where the image was originally published, if known.
    fn source_url(&self) -> Option<&str>;

    /// Source file width.
    fn width(&self) -> u64;

    /// Source file height.
    fn height(&self) -> u64;

    /// Tags applied to the post.
    async fn tags(&self) -> Result<Arc<TagSet>>;

    /// Last modification time, UTC with second resolution.
    async fn updated_on(&self) -> Result<DateTime<Utc>>;

    /// Creation time, UTC with second resolution.
    fn created_on(&self) -> Result<DateTime<Utc>>;
}

/// Which upstream a query goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Upstream {
    Danbooru,
    Gelbooru,
}

impl Upstream {
    pub fn as_str(self) -> &'static str {
        match self {
            Upstream::Danbooru => "danbooru",
            Upstream::Gelbooru => "gelbooru",
        }
    }
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Upstream {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "danbooru" => Ok(Upstream::Danbooru),
            "gelbooru" => Ok(Upstream::Gelbooru),
            other => Err(crate::error::AppError::validation(format!(
                "unknown upstream `{other}`"
            ))),
        }
    }
}
