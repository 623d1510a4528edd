//! Service layer.
//!
//! This module contains:
//! - The per-host fetch queue (`Dispatcher`) and its transport
//! - Tag resolution strategies (`tags`)
//! - One client per upstream (`DanbooruClient`, `GelbooruClient`)
//! - The composition root tying them together (`Booru`)

mod booru;
mod danbooru;
pub mod dispatcher;
mod gelbooru;
pub mod tags;
pub mod transport;

pub use booru::Booru;
pub use danbooru::{DanbooruClient, DanbooruEntry, DanbooruPost};
pub use dispatcher::{Dispatcher, RetryPolicy, StatusClass};
pub use gelbooru::{GelbooruClient, GelbooruEntry, GelbooruPost};
pub use transport::{Body, HttpTransport, Response, Transport};

use crate::error::Result;

/// Submit `url` and read the whole body, echoing it when request logging is on.
pub(crate) async fn read_body(dispatcher: &Dispatcher, url: &str, log_requests: bool) -> Result<Vec<u8>> {
    let body = dispatcher.submit(url).await?.bytes().await?;
    if log_requests {
        log::info!("fetched from {}: {}", url, String::from_utf8_lossy(&body));
    }
    Ok(body)
}
