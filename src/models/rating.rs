//! Explicitness rating.
//!
//! The unified model uses the four-level scheme (`g`, `s`, `q`, `e`). Older
//! listings use a three-level scheme whose lowest level is `safe` (code `s`).
//! Both spellings of that level map onto [`Rating::Sensitive`], so a rating
//! decodes the same whether it arrives as a word or as a code.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// Explicitness rating of a post, ordered from least to most explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    General,
    Sensitive,
    Questionable,
    Explicit,
}

impl Rating {
    /// All ratings in ascending order.
    pub const ALL: [Rating; 4] = [
        Rating::General,
        Rating::Sensitive,
        Rating::Questionable,
        Rating::Explicit,
    ];

    /// Single-character wire code.
    pub fn code(self) -> char {
        match self {
            Rating::General => 'g',
            Rating::Sensitive => 's',
            Rating::Questionable => 'q',
            Rating::Explicit => 'e',
        }
    }

    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Rating::General => "general",
            Rating::Sensitive => "sensitive",
            Rating::Questionable => "questionable",
            Rating::Explicit => "explicit",
        }
    }

    /// Decode a single-character wire code.
    pub fn from_code(code: char) -> Result<Self, AppError> {
        match code {
            'g' => Ok(Rating::General),
            's' => Ok(Rating::Sensitive),
            'q' => Ok(Rating::Questionable),
            'e' => Ok(Rating::Explicit),
            other => Err(AppError::UnknownRating(other.to_string())),
        }
    }

    /// Decode either a wire code or a full rating word.
    ///
    /// Accepts the legacy three-level word `safe`, which maps to
    /// [`Rating::Sensitive`] like its code `s`.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "general" => Ok(Rating::General),
            "sensitive" => Ok(Rating::Sensitive),
            "questionable" => Ok(Rating::Questionable),
            "explicit" => Ok(Rating::Explicit),
            "safe" => {
                log::debug!("Mapping legacy rating `safe` onto `sensitive`");
                Ok(Rating::Sensitive)
            }
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Rating::from_code(c).map_err(|_| AppError::UnknownRating(s.into())),
                    _ => Err(AppError::UnknownRating(s.into())),
                }
            }
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rating::parse(s)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.code())
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rating::parse(&s).map_err(serde::de::Error::custom)
    }
}
