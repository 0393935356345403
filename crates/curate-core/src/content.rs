//! Content type enumeration

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseContentTypeError;

/// A closed category of curated content.
///
/// Every content type maps to exactly one document collection whose name is
/// the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentType {
    Reels,
    Screenshots,
    Greetings,
}

impl ContentType {
    /// All content types, in dashboard order
    pub const ALL: [ContentType; 3] = [
        ContentType::Reels,
        ContentType::Screenshots,
        ContentType::Greetings,
    ];

    /// Name of the backing document collection (also the blob path prefix)
    pub fn collection(&self) -> &'static str {
        match self {
            ContentType::Reels => "Reels",
            ContentType::Screenshots => "Screenshots",
            ContentType::Greetings => "Greetings",
        }
    }

    /// Human-readable name used in type pickers
    pub fn display_label(&self) -> &'static str {
        match self {
            ContentType::Reels => "Social Media Reels",
            ContentType::Screenshots => "Screenshots / Covers",
            ContentType::Greetings => "Greetings / Messages",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

impl FromStr for ContentType {
    type Err = ParseContentTypeError;

    /// Accepts the collection name in any letter case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentType::ALL
            .into_iter()
            .find(|t| t.collection().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseContentTypeError(s.to_string()))
    }
}
