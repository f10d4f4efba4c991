//! Topic and mode taxonomy entries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned for colors that are not `#RRGGBB`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHexColor {
    /// Raw input that failed validation.
    pub input: String,
}

impl fmt::Display for InvalidHexColor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "color `{}` must be `#` followed by exactly 6 hex digits",
            self.input
        )
    }
}

impl std::error::Error for InvalidHexColor {}

/// Display color in `#RRGGBB` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(Box<str>);

impl HexColor {
    /// Parse a `#RRGGBB` color. Case is preserved.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, InvalidHexColor> {
        let raw = input.as_ref();
        if !is_hex_color(raw) {
            return Err(InvalidHexColor {
                input: raw.to_string(),
            });
        }
        Ok(Self(raw.into()))
    }

    /// Access the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Returns true for exactly `#` plus 6 ASCII hex digits.
#[must_use]
pub fn is_hex_color(raw: &str) -> bool {
    raw.strip_prefix('#')
        .is_some_and(|digits| digits.len() == 6 && digits.chars().all(|ch| ch.is_ascii_hexdigit()))
}

impl TryFrom<String> for HexColor {
    type Error = InvalidHexColor;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0.into_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Entry of the topics or modes taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxonomyEntry {
    /// Identifier, unique within a document.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Short description.
    pub description: String,
    /// Badge color.
    pub color: HexColor,
    /// Keywords used for matching conversations to this entry.
    pub keywords: Vec<String>,
    /// System prompt applied when the entry is selected.
    #[serde(default)]
    pub system_prompt: String,
}

impl TaxonomyEntry {
    /// Case-insensitive keyword match against free text.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| !keyword.trim().is_empty())
            .any(|keyword| haystack.contains(&keyword.to_lowercase()))
    }
}
