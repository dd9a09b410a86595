//! Context retrieval: routes a query to the matching stores and assembles a
//! bounded context text with attributed sources

mod assemble;
mod engine;
mod paths;

pub use engine::{RetrievalEngine, Snapshots};

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::geo::{BBox, GeoScope};
use crate::incident::IncidentBoard;
use crate::router::Intent;

/// Store a piece of context came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceGroup {
    Geo,
    Knowledge,
    Session,
}

impl SourceGroup {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Geo => "geo",
            Self::Knowledge => "knowledge",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for SourceGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceGroup {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geo" => Ok(Self::Geo),
            "knowledge" | "rag" => Ok(Self::Knowledge),
            "session" => Ok(Self::Session),
            _ => Err(()),
        }
    }
}

/// Attribution for one entry of the assembled context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    pub group: SourceGroup,
    pub label: String,

    /// Relevance on a 0–1 scale
    pub score: f32,
    pub preview: String,
}

/// Caller-side state of the exercise
#[derive(Debug, Clone, Default)]
pub struct RetrievalContext {
    pub incidents: IncidentBoard,

    /// Area the caller is looking at, e.g. the map viewport
    pub request_bbox: Option<BBox>,
}

/// Limits for one retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    /// Maximum length of the context text in characters
    pub max_chars: usize,

    /// Deadline for the query embedding
    pub timeout: Option<Duration>,
}

impl Budget {
    #[must_use]
    pub const fn chars(max_chars: usize) -> Self {
        Self {
            max_chars,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Assembled context for a prompt
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub text: String,
    pub sources: Vec<Source>,

    /// Classification the retrieval was dispatched on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<GeoScope>,
}

impl RetrievedContext {
    /// Context with no text and no sources
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_group_parsing() {
        assert_eq!("Knowledge".parse::<SourceGroup>(), Ok(SourceGroup::Knowledge));
        assert_eq!(" geo ".parse::<SourceGroup>(), Ok(SourceGroup::Geo));
        assert!("weather".parse::<SourceGroup>().is_err());
        assert_eq!(SourceGroup::Session.to_string(), "session");
    }

    #[test]
    fn test_budget() {
        let budget = Budget::chars(100).with_timeout(Duration::from_secs(2));
        assert_eq!(budget.max_chars, 100);
        assert_eq!(budget.timeout, Some(Duration::from_secs(2)));
        assert!(RetrievedContext::empty().is_empty());
    }
}
