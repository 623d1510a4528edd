// src/services/tags.rs

//! Tag resolution.
//!
//! Two strategies:
//! - structured: per-category, space-delimited tag strings from a JSON record
//! - scraped: the tag sidebar of an HTML post page

use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::{Tag, TagCategory, TagSet};
use crate::services::dispatcher::Dispatcher;
use crate::utils::de::nullable;

/// Ids of the tag sidebar container, current markup first.
const CONTAINER_SELECTOR: &str = "#tag-list, #searchTags";

/// Class prefix carrying the tag category on sidebar list items.
const CATEGORY_CLASS_PREFIX: &str = "tag-type-";

/// Per-category tag strings of a structured record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TagFields {
    #[serde(default, deserialize_with = "nullable")]
    pub tag_string_artist: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_string_character: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_string_copyright: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_string_general: String,
    #[serde(default, deserialize_with = "nullable")]
    pub tag_string_meta: String,
}

impl TagFields {
    /// Split every category string into tags.
    pub fn parse(&self) -> TagSet {
        let mut tags = TagSet::new();
        for (category, s) in [
            (TagCategory::Author, &self.tag_string_artist),
            (TagCategory::Character, &self.tag_string_character),
            (TagCategory::Series, &self.tag_string_copyright),
            (TagCategory::Unclassified, &self.tag_string_general),
            (TagCategory::Meta, &self.tag_string_meta),
        ] {
            tags.extend(s.split_whitespace().map(|t| Tag::new(category, t)));
        }
        tags
    }
}

/// Fetch a post page and scrape its tag sidebar.
///
/// An empty page or one without a sidebar yields an empty set.
pub async fn fetch_scraped(dispatcher: &Dispatcher, url: &str) -> Result<TagSet> {
    let page = dispatcher.submit(url).await?.text().await?;
    if page.trim().is_empty() {
        return Ok(TagSet::new());
    }
    scrape(&page)
}

/// Extract tags from the sidebar of a post page.
pub fn scrape(page: &str) -> Result<TagSet> {
    let document = Html::parse_document(page);
    let container_sel = parse_selector(CONTAINER_SELECTOR)?;

    let Some(container) = document.select(&container_sel).next() else {
        log::debug!("No tag container in page; treating as untagged");
        return Ok(TagSet::new());
    };

    Ok(container
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .filter_map(|item| scrape_item(&item))
        .collect())
}

fn scrape_item(item: &ElementRef) -> Option<Tag> {
    let category = item
        .value()
        .classes()
        .find_map(|class| class.strip_prefix(CATEGORY_CLASS_PREFIX))
        .map(category_from_class)?;

    let anchor = item
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "a")
        .last()?;

    let text: String = anchor.text().collect();
    let text = unescape(text.trim());
    if text.is_empty() {
        return None;
    }

    Some(Tag::new(category, text.replace(' ', "_")))
}

fn category_from_class(suffix: &str) -> TagCategory {
    match suffix {
        "artist" => TagCategory::Author,
        "character" => TagCategory::Character,
        "copyright" => TagCategory::Series,
        "metadata" | "meta" => TagCategory::Meta,
        _ => TagCategory::Unclassified,
    }
}

/// Decode entities that survive markup parsing because the upstream escapes
/// tag names twice.
fn unescape(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
