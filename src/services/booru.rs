// src/services/booru.rs

//! Entry point tying the upstream clients to their dispatchers.

use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{Config, Md5, Post, Upstream};
use crate::services::danbooru::DanbooruClient;
use crate::services::dispatcher::Dispatcher;
use crate::services::gelbooru::GelbooruClient;
use crate::services::transport::{HttpTransport, Transport};
use crate::utils::{get_domain, http};

/// Both upstreams behind one interface.
///
/// Every upstream host gets exactly one [`Dispatcher`], shared by all
/// requests and posts going to that host.
#[derive(Debug)]
pub struct Booru {
    danbooru: DanbooruClient,
    gelbooru: GelbooruClient,
    dispatchers: Vec<Arc<Dispatcher>>,
}

impl Booru {
    /// Build clients talking HTTP. Must be called within a tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        let client = http::create_async_client(&config.dispatcher)?;
        Self::with_transport(config, Arc::new(HttpTransport::new(client)))
    }

    /// Build clients on top of an arbitrary transport.
    pub fn with_transport(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;

        let mut dispatchers: Vec<Arc<Dispatcher>> = Vec::new();
        let mut dispatcher_for = |base_url: &str| -> Result<Arc<Dispatcher>> {
            let host = get_domain(base_url)
                .ok_or_else(|| AppError::config(format!("no host in `{base_url}`")))?;
            if let Some(existing) = dispatchers.iter().find(|d| d.host() == host) {
                return Ok(Arc::clone(existing));
            }
            let dispatcher = Arc::new(Dispatcher::from_config(
                host,
                Arc::clone(&transport),
                &config.dispatcher,
            ));
            dispatchers.push(Arc::clone(&dispatcher));
            Ok(dispatcher)
        };

        let danbooru = DanbooruClient::new(
            dispatcher_for(&config.danbooru.base_url)?,
            config.danbooru.base_url.clone(),
            config.log_requests,
        );
        let gelbooru = GelbooruClient::new(
            dispatcher_for(&config.gelbooru.base_url)?,
            &config.gelbooru,
            config.gelbooru.cross_reference.then(|| danbooru.clone()),
            config.log_requests,
        );

        Ok(Self {
            danbooru,
            gelbooru,
            dispatchers,
        })
    }

    pub fn danbooru(&self) -> &DanbooruClient {
        &self.danbooru
    }

    pub fn gelbooru(&self) -> &GelbooruClient {
        &self.gelbooru
    }

    /// Fetch one page of posts matching `tags` from `upstream`.
    pub async fn query_by_tags(
        &self,
        upstream: Upstream,
        tags: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Box<dyn Post>>> {
        log::debug!("Querying {} for `{}` (page {}, limit {})", upstream, tags, page, limit);
        let posts: Vec<Box<dyn Post>> = match upstream {
            Upstream::Danbooru => self
                .danbooru
                .query_by_tags(tags, page, limit)
                .await?
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn Post>)
                .collect(),
            Upstream::Gelbooru => self
                .gelbooru
                .query_by_tags(tags, page, limit)
                .await?
                .into_iter()
                .map(|p| Box::new(p) as Box<dyn Post>)
                .collect(),
        };
        Ok(posts)
    }

    /// Fetch the post whose file hashes to `hash` (32 hex characters).
    ///
    /// A malformed hash fails before any request is made.
    pub async fn lookup_by_hash(&self, upstream: Upstream, hash: &str) -> Result<Option<Box<dyn Post>>> {
        let hash = Md5::parse(hash)?;
        let post = match upstream {
            Upstream::Danbooru => self
                .danbooru
                .lookup_by_hash(&hash)
                .await?
                .map(|p| Box::new(p) as Box<dyn Post>),
            Upstream::Gelbooru => self
                .gelbooru
                .lookup_by_hash(&hash)
                .await?
                .map(|p| Box::new(p) as Box<dyn Post>),
        };
        if post.is_none() {
            log::debug!("No post with hash {} on {}", hash, upstream);
        }
        Ok(post)
    }

    /// Stop every dispatcher after its queue drains.
    pub async fn shutdown(&self) {
        for dispatcher in &self.dispatchers {
            dispatcher.shutdown().await;
        }
    }
}
