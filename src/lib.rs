// src/lib.rs

//! boorufetch Library
//!
//! Fetches image posts from Danbooru and Gelbooru behind one [`Post`] contract.
//! Requests to each upstream host go through a bounded worker pool with retry
//! on transient statuses.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use error::{AppError, Result};
pub use models::{Config, Md5, Post, Rating, Tag, TagCategory, TagSet, Upstream};
pub use services::Booru;
