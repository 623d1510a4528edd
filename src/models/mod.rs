// src/models/mod.rs

//! Domain models shared by every upstream.
//!
//! This module contains the unified post contract and the value types it
//! exposes, plus the application configuration.

mod config;
mod hash;
mod post;
mod rating;
mod tag;

// Re-export all public types
pub use config::{Config, DanbooruConfig, DispatcherConfig, GelbooruConfig};
pub use hash::Md5;
pub use post::{Post, Upstream};
pub use rating::Rating;
pub use tag::{Tag, TagCategory, TagSet};
