//! Utility functions and helpers.

pub mod de;
pub mod http;
pub mod time;

use url::Url;

use crate::error::Result;

/// Build `{base}{path}?{params}` with proper query encoding.
pub fn build_url(base: &str, path: &str, params: &[(&str, String)]) -> Result<String> {
    let base = Url::parse(base)?;
    let mut url = base.join(path)?;
    url.query_pairs_mut()
        .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
    Ok(url.to_string())
}

/// Extract the host from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}
