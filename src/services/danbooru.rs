// src/services/danbooru.rs

//! Danbooru upstream.
//!
//! Listing entries already carry everything a post exposes, so no accessor
//! performs network I/O. Tags arrive as per-category strings and are split on
//! first access; the raw strings are released afterwards.

use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{Md5, Post, Rating, TagSet};
use crate::services::dispatcher::Dispatcher;
use crate::services::read_body;
use crate::services::tags::TagFields;
use crate::utils::de::{flexible_bool, nullable};
use crate::utils::{build_url, time};

/// Raw listing entry.
#[derive(Debug, Default, Deserialize)]
pub struct DanbooruEntry {
    #[serde(default, deserialize_with = "nullable")]
    pub md5: String,
    #[serde(default, deserialize_with = "nullable")]
    pub rating: String,
    #[serde(default, deserialize_with = "nullable")]
    pub file_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub large_file_url: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub has_large: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub image_width: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub image_height: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: String,
    #[serde(default, deserialize_with = "nullable")]
    pub updated_at: String,
    #[serde(flatten)]
    pub tags: TagFields,
}

/// A Danbooru post.
#[derive(Debug)]
pub struct DanbooruPost {
    md5: String,
    rating: String,
    file_url: String,
    sample_url: String,
    source: String,
    width: u64,
    height: u64,
    created_at: String,
    updated_at: String,
    raw_tags: Mutex<Option<TagFields>>,
    tags: OnceLock<Arc<TagSet>>,
}

impl From<DanbooruEntry> for DanbooruPost {
    fn from(entry: DanbooruEntry) -> Self {
        let sample_url = if entry.has_large && !entry.large_file_url.is_empty() {
            entry.large_file_url
        } else {
            entry.file_url.clone()
        };

        Self {
            md5: entry.md5,
            rating: entry.rating,
            file_url: entry.file_url,
            sample_url,
            source: entry.source,
            width: entry.image_width,
            height: entry.image_height,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            raw_tags: Mutex::new(Some(entry.tags)),
            tags: OnceLock::new(),
        }
    }
}

impl DanbooruPost {
    fn cached_tags(&self) -> Arc<TagSet> {
        Arc::clone(self.tags.get_or_init(|| {
            let fields = self.raw_tags.lock().ok().and_then(|mut raw| raw.take());
            Arc::new(fields.map(|f| f.parse()).unwrap_or_default())
        }))
    }
}

#[async_trait]
impl Post for DanbooruPost {
    async fn rating(&self) -> Result<Rating> {
        Rating::parse(&self.rating)
    }

    fn md5(&self) -> Result<Md5> {
        Md5::parse(&self.md5)
    }

    fn file_url(&self) -> &str {
        &self.file_url
    }

    fn sample_url(&self) -> &str {
        &self.sample_url
    }

    fn source_url(&self) -> Option<&str> {
        Some(self.source.as_str()).filter(|s| !s.is_empty())
    }

    fn width(&self) -> u64 {
        self.width
    }

    fn height(&self) -> u64 {
        self.height
    }

    async fn tags(&self) -> Result<Arc<TagSet>> {
        Ok(self.cached_tags())
    }

    async fn updated_on(&self) -> Result<DateTime<Utc>> {
        if self.updated_at.trim().is_empty() {
            return self.created_on();
        }
        time::parse_rfc3339(&self.updated_at)
    }

    fn created_on(&self) -> Result<DateTime<Utc>> {
        time::parse_rfc3339(&self.created_at)
    }
}

/// Client for one Danbooru instance.
#[derive(Debug, Clone)]
pub struct DanbooruClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
    log_requests: bool,
}

impl DanbooruClient {
    pub fn new(dispatcher: Arc<Dispatcher>, base_url: impl Into<String>, log_requests: bool) -> Self {
        Self {
            dispatcher,
            base_url: base_url.into(),
            log_requests,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of a tag search. Danbooru allows at most two tags per query for
    /// anonymous users; that limit is enforced upstream.
    pub fn listing_url(&self, tags: &str, page: u32, limit: u32) -> Result<String> {
        build_url(
            &self.base_url,
            "/posts.json",
            &[
                ("tags", tags.to_string()),
                ("page", page.to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    pub fn lookup_url(&self, hash: &Md5) -> Result<String> {
        build_url(&self.base_url, "/posts.json", &[("md5", hash.to_hex())])
    }

    /// Fetch one page of posts matching `tags`.
    pub async fn query_by_tags(&self, tags: &str, page: u32, limit: u32) -> Result<Vec<DanbooruPost>> {
        let url = self.listing_url(tags, page, limit)?;
        let body = read_body(&self.dispatcher, &url, self.log_requests).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let entries: Vec<DanbooruEntry> = serde_json::from_slice(&body)?;
        log::debug!("Danbooru returned {} posts for `{}`", entries.len(), tags);
        Ok(entries.into_iter().map(DanbooruPost::from).collect())
    }

    /// Fetch the post with the given hash, or `None` if there is none.
    pub async fn lookup_by_hash(&self, hash: &Md5) -> Result<Option<DanbooruPost>> {
        let url = self.lookup_url(hash)?;
        let body = match read_body(&self.dispatcher, &url, self.log_requests).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let entry = match serde_json::from_slice::<Value>(&body)? {
            Value::Null => None,
            Value::Array(items) => items.into_iter().next(),
            other => Some(other),
        };
        let Some(entry) = entry else {
            return Ok(None);
        };

        let entry: DanbooruEntry = serde_json::from_value(entry)?;
        if entry.file_url.is_empty() {
            return Ok(None);
        }
        Ok(Some(entry.into()))
    }
}
