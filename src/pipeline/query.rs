// src/pipeline/query.rs

//! Query and lookup runs that fully resolve each post.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Post, Rating, TagSet, Upstream};
use crate::services::Booru;

/// Every field of a post, resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    pub upstream: Upstream,
    pub md5: String,
    pub rating: Rating,
    pub file_url: String,
    pub sample_url: String,
    pub source_url: Option<String>,
    pub width: u64,
    pub height: u64,
    pub tags: TagSet,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl PostSummary {
    /// Read every accessor of `post`, performing any deferred I/O.
    pub async fn resolve(upstream: Upstream, post: &dyn Post) -> Result<Self> {
        Ok(Self {
            upstream,
            md5: post.md5()?.to_hex(),
            rating: post.rating().await?,
            file_url: post.file_url().to_string(),
            sample_url: post.sample_url().to_string(),
            source_url: post.source_url().map(str::to_string),
            width: post.width(),
            height: post.height(),
            tags: post.tags().await?.as_ref().clone(),
            created_on: post.created_on()?,
            updated_on: post.updated_on().await?,
        })
    }
}

/// Fetch one page of posts and resolve all of them concurrently.
pub async fn run_query(
    booru: &Booru,
    upstream: Upstream,
    tags: &str,
    page: u32,
    limit: u32,
) -> Result<Vec<PostSummary>> {
    let posts = booru.query_by_tags(upstream, tags, page, limit).await?;
    log::info!("Fetched {} posts from {}", posts.len(), upstream);

    let summaries =
        try_join_all(posts.iter().map(|post| PostSummary::resolve(upstream, post.as_ref()))).await?;

    log::info!("Resolved {} posts", summaries.len());
    Ok(summaries)
}

/// Look a post up by hash and resolve it.
pub async fn run_lookup(booru: &Booru, upstream: Upstream, hash: &str) -> Result<Option<PostSummary>> {
    match booru.lookup_by_hash(upstream, hash).await? {
        Some(post) => Ok(Some(PostSummary::resolve(upstream, post.as_ref()).await?)),
        None => Ok(None),
    }
}
