// src/services/gelbooru.rs

//! Gelbooru upstream.
//!
//! The JSON listing lacks categorized tags, so tags are resolved lazily on
//! first access by scraping the tag sidebar of the Gelbooru post page. Posts
//! whose source is Danbooru are instead resolved from Danbooru by hash, which
//! also supplies a fresher rating and modification time. Other posts answer
//! rating and modification time straight from the listing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio::sync::OnceCell;

use crate::error::{AppError, Result};
use crate::models::{GelbooruConfig, Md5, Post, Rating, TagSet};
use crate::services::danbooru::{DanbooruClient, DanbooruPost};
use crate::services::dispatcher::Dispatcher;
use crate::services::{read_body, tags};
use crate::utils::de::{flexible_bool, nullable};
use crate::utils::{build_url, get_domain, time};

/// Raw listing entry.
#[derive(Debug, Default, Deserialize)]
pub struct GelbooruEntry {
    #[serde(default, alias = "hash", deserialize_with = "nullable")]
    pub md5: String,
    #[serde(default, deserialize_with = "nullable")]
    pub rating: String,
    #[serde(default, deserialize_with = "nullable")]
    pub file_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub sample_url: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    pub sample: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub directory: String,
    #[serde(default, deserialize_with = "nullable")]
    pub source: String,
    #[serde(default, deserialize_with = "nullable")]
    pub width: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub height: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub created_at: String,
    /// Epoch seconds of the last change
    #[serde(default, deserialize_with = "nullable")]
    pub change: i64,
}

/// The dapi answers either with a bare array or with an envelope. Errors come
/// back as an object carrying a message, often with status 200.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing {
    Bare(Vec<GelbooruEntry>),
    Envelope {
        #[serde(rename = "@attributes")]
        _attributes: IgnoredAny,
        #[serde(default)]
        post: Vec<GelbooruEntry>,
    },
    Failure {
        #[serde(alias = "reason")]
        message: String,
    },
}

impl Listing {
    fn into_entries(self, url: &str) -> Result<Vec<GelbooruEntry>> {
        match self {
            Listing::Bare(entries) | Listing::Envelope { post: entries, .. } => Ok(entries),
            Listing::Failure { message } => Err(AppError::Upstream {
                url: url.to_string(),
                message,
            }),
        }
    }
}

/// Result of the one-time resolution.
///
/// Holds only what took I/O to get. Field decoding happens at access time, so
/// a malformed value never poisons the fetched tags.
#[derive(Debug)]
struct Resolved {
    tags: Arc<TagSet>,
    /// Set when Danbooru had the post
    danbooru: Option<DanbooruPost>,
}

/// A Gelbooru post.
#[derive(Debug)]
pub struct GelbooruPost {
    md5: String,
    rating: String,
    file_url: String,
    sample_url: String,
    source: String,
    width: u64,
    height: u64,
    created_at: String,
    change: i64,
    client: GelbooruClient,
    resolved: OnceCell<Resolved>,
}

impl GelbooruPost {
    fn new(entry: GelbooruEntry, client: GelbooruClient) -> Self {
        let sample_url = client.sample_url_for(&entry);
        Self {
            md5: entry.md5,
            rating: entry.rating,
            file_url: entry.file_url,
            sample_url,
            source: entry.source,
            width: entry.width,
            height: entry.height,
            created_at: entry.created_at,
            change: entry.change,
            client,
            resolved: OnceCell::new(),
        }
    }

    /// Whether gated fields come from Danbooru rather than from Gelbooru.
    pub fn is_cross_referenced(&self) -> bool {
        self.cross_reference().is_some()
    }

    fn cross_reference(&self) -> Option<&DanbooruClient> {
        self.client
            .danbooru
            .as_ref()
            .filter(|_| is_danbooru_source(&self.source))
    }

    /// Runs the resolution at most once; a failed attempt is retried on the
    /// next access.
    async fn resolved(&self) -> Result<&Resolved> {
        self.resolved.get_or_try_init(|| self.resolve()).await
    }

    async fn resolve(&self) -> Result<Resolved> {
        let hash = self.md5()?;

        if let Some(danbooru) = self.cross_reference() {
            match danbooru.lookup_by_hash(&hash).await? {
                Some(post) => {
                    log::debug!("Resolved {} from Danbooru", hash);
                    return Ok(Resolved {
                        tags: post.tags().await?,
                        danbooru: Some(post),
                    });
                }
                None => log::debug!("{} not found on Danbooru; scraping Gelbooru", hash),
            }
        }

        let tags = self.client.fetch_tags(&hash).await?;
        Ok(Resolved {
            tags: Arc::new(tags),
            danbooru: None,
        })
    }

    /// Danbooru's values if this post resolves through Danbooru and was found
    /// there. Posts that never cross-reference skip resolution entirely.
    async fn danbooru_post(&self) -> Result<Option<&DanbooruPost>> {
        if !self.is_cross_referenced() {
            return Ok(None);
        }
        Ok(self.resolved().await?.danbooru.as_ref())
    }

    fn local_updated_on(&self) -> Result<DateTime<Utc>> {
        if self.change > 0 {
            time::from_epoch(self.change)
        } else {
            self.created_on()
        }
    }
}

#[async_trait]
impl Post for GelbooruPost {
    async fn rating(&self) -> Result<Rating> {
        match self.danbooru_post().await? {
            Some(post) => post.rating().await,
            None => Rating::parse(&self.rating),
        }
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
        Ok(Arc::clone(&self.resolved().await?.tags))
    }

    async fn updated_on(&self) -> Result<DateTime<Utc>> {
        match self.danbooru_post().await? {
            Some(post) => post.updated_on().await,
            None => self.local_updated_on(),
        }
    }

    fn created_on(&self) -> Result<DateTime<Utc>> {
        time::parse_ruby_date(&self.created_at)
    }
}

fn is_danbooru_source(source: &str) -> bool {
    get_domain(source).is_some_and(|host| host == "donmai.us" || host.ends_with(".donmai.us"))
}

/// Client for one Gelbooru instance.
#[derive(Debug, Clone)]
pub struct GelbooruClient {
    dispatcher: Arc<Dispatcher>,
    base_url: String,
    sample_base_url: String,
    danbooru: Option<DanbooruClient>,
    log_requests: bool,
}

impl GelbooruClient {
    /// `danbooru` enables backfilling Danbooru-sourced posts.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        config: &GelbooruConfig,
        danbooru: Option<DanbooruClient>,
        log_requests: bool,
    ) -> Self {
        Self {
            dispatcher,
            base_url: config.base_url.clone(),
            sample_base_url: config.sample_base_url.trim_end_matches('/').to_string(),
            danbooru,
            log_requests,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether Danbooru-sourced posts are resolved from Danbooru.
    pub fn cross_references(&self) -> bool {
        self.danbooru.is_some()
    }

    pub fn listing_url(&self, tags: &str, page: u32, limit: u32) -> Result<String> {
        build_url(
            &self.base_url,
            "/index.php",
            &[
                ("page", "dapi".to_string()),
                ("s", "post".to_string()),
                ("q", "index".to_string()),
                ("json", "1".to_string()),
                ("tags", tags.to_string()),
                ("pid", page.to_string()),
                ("limit", limit.to_string()),
            ],
        )
    }

    /// HTML page of the post with the given hash.
    pub fn post_page_url(&self, hash: &Md5) -> Result<String> {
        build_url(
            &self.base_url,
            "/index.php",
            &[
                ("page", "post".to_string()),
                ("s", "list".to_string()),
                ("tags", format!("md5:{hash}")),
            ],
        )
    }

    /// Fetch one page of posts matching `tags`.
    pub async fn query_by_tags(&self, tags: &str, page: u32, limit: u32) -> Result<Vec<GelbooruPost>> {
        let url = self.listing_url(tags, page, limit)?;
        let body = read_body(&self.dispatcher, &url, self.log_requests).await?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        let entries = serde_json::from_slice::<Listing>(&body)?.into_entries(&url)?;
        log::debug!("Gelbooru returned {} posts for `{}`", entries.len(), tags);
        Ok(entries
            .into_iter()
            .map(|entry| GelbooruPost::new(entry, self.clone()))
            .collect())
    }

    /// Fetch the post with the given hash, or `None` if there is none.
    pub async fn lookup_by_hash(&self, hash: &Md5) -> Result<Option<GelbooruPost>> {
        let posts = self.query_by_tags(&format!("md5:{hash}"), 0, 1).await?;
        Ok(posts.into_iter().next())
    }

    /// Scrape categorized tags from the post page.
    pub async fn fetch_tags(&self, hash: &Md5) -> Result<TagSet> {
        let url = self.post_page_url(hash)?;
        tags::fetch_scraped(&self.dispatcher, &url).await
    }

    fn sample_url_for(&self, entry: &GelbooruEntry) -> String {
        if !entry.sample {
            return entry.file_url.clone();
        }
        if !entry.sample_url.is_empty() {
            return entry.sample_url.clone();
        }
        if entry.directory.is_empty() || entry.md5.is_empty() {
            return entry.file_url.clone();
        }
        format!(
            "{}/samples/{}/sample_{}.jpg",
            self.sample_base_url, entry.directory, entry.md5
        )
    }
}
