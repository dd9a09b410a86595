//! Duplicate detection for location records

use std::collections::HashSet;

use super::LocationRecord;
use super::record::normalize_street;

/// Identity of a record for duplicate detection
///
/// A record duplicates another when either its stable id or its composite of
/// normalized title, address and rounded coordinates has been seen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey {
    pub doc_id: Option<String>,
    pub composite: Option<String>,
}

impl DedupeKey {
    #[must_use]
    pub fn from_record(record: &LocationRecord) -> Self {
        let doc_id = record.stable_id.then(|| record.doc_id.clone());

        let address = normalize_street(&record.address.line());
        let geo = record
            .geo
            .map(|p| format!("{:.5},{:.5}", p.lat, p.lon))
            .unwrap_or_default();

        // Title alone is too weak an identity
        let composite = (!address.is_empty() || !geo.is_empty())
            .then(|| format!("{}|{address}|{geo}", normalize_street(&record.title)));

        Self { doc_id, composite }
    }
}

/// First-wins duplicate filter
#[derive(Debug, Default)]
pub struct Deduper {
    ids: HashSet<String>,
    composites: HashSet<String>,
}

impl Deduper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the key, returning `false` if it duplicates an earlier one
    pub fn admit(&mut self, key: &DedupeKey) -> bool {
        let seen_id = key.doc_id.as_ref().is_some_and(|id| self.ids.contains(id));
        let seen_composite = key
            .composite
            .as_ref()
            .is_some_and(|c| self.composites.contains(c));
        if seen_id || seen_composite {
            return false;
        }

        if let Some(id) = &key.doc_id {
            self.ids.insert(id.clone());
        }
        if let Some(c) = &key.composite {
            self.composites.insert(c.clone());
        }
        true
    }
}
