//! Configuration domains kept by the loader.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every persisted cache key.
const CACHE_KEY_PREFIX: &str = "polychat.config";

/// One externally-editable configuration category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigDomain {
    /// Provider catalog.
    Providers,
    /// Conversation topic taxonomy.
    Topics,
    /// Assistant mode taxonomy.
    Modes,
}

impl ConfigDomain {
    /// Every domain, in load order.
    pub const ALL: [Self; 3] = [Self::Providers, Self::Topics, Self::Modes];

    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Providers => "providers",
            Self::Topics => "topics",
            Self::Modes => "modes",
        }
    }

    /// Returns true for the two taxonomy domains.
    #[must_use]
    pub const fn is_taxonomy(self) -> bool {
        matches!(self, Self::Topics | Self::Modes)
    }

    /// Cache key holding the serialized document.
    #[must_use]
    pub fn document_cache_key(self) -> String {
        format!("{CACHE_KEY_PREFIX}.{}.document", self.as_str())
    }

    /// Cache key holding the document's version string.
    #[must_use]
    pub fn version_cache_key(self) -> String {
        format!("{CACHE_KEY_PREFIX}.{}.version", self.as_str())
    }
}

impl fmt::Display for ConfigDomain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error returned for unknown domain labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownConfigDomain {
    /// Label that was not recognized.
    pub input: String,
}

impl fmt::Display for UnknownConfigDomain {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "unknown config domain `{}` (expected providers, topics or modes)",
            self.input
        )
    }
}

impl std::error::Error for UnknownConfigDomain {}

impl FromStr for ConfigDomain {
    type Err = UnknownConfigDomain;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "providers" => Ok(Self::Providers),
            "topics" => Ok(Self::Topics),
            "modes" => Ok(Self::Modes),
            _ => Err(UnknownConfigDomain {
                input: input.to_string(),
            }),
        }
    }
}
