//! Pre-filters applied to chunks before similarity scoring

use super::Chunk;
use crate::geo::{BBox, DocType};
use crate::text::fold;

/// Constraints on which chunks a vector search may return
///
/// Spatial constraints (municipality, fence) only restrict location chunks
/// whose doc type is listed in `fence_doc_types`; general documents pass.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    /// Allowed raw doc types, empty allows all
    pub doc_types: Vec<String>,

    /// Allowed category norms, empty allows all
    pub category_norms: Vec<String>,

    pub municipality: Option<String>,
    pub fence: Option<BBox>,

    /// Location doc types the spatial constraints apply to
    pub fence_doc_types: Vec<DocType>,

    /// With both municipality and fence set, either one suffices
    pub municipality_or_fence: bool,
}

impl ChunkFilter {
    /// Filter that accepts everything
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether any constraint is set
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.doc_types.is_empty()
            || !self.category_norms.is_empty()
            || self.municipality.is_some()
            || self.fence.is_some()
    }

    #[must_use]
    pub fn accepts(&self, chunk: &Chunk) -> bool {
        if !self.doc_types.is_empty() {
            let Some(doc_type) = chunk.meta.doc_type.as_deref() else {
                return false;
            };
            if !self.doc_types.iter().any(|t| t.eq_ignore_ascii_case(doc_type)) {
                return false;
            }
        }

        if !self.category_norms.is_empty() {
            let norm = chunk.meta.category_norm.as_deref().map(str::to_lowercase);
            let class = chunk.meta.poi_class.as_deref().map(str::to_lowercase);
            let matched = self.category_norms.iter().any(|wanted| {
                let wanted = wanted.to_lowercase();
                norm.as_deref() == Some(wanted.as_str())
                    || class.as_deref() == wanted.split_once(':').map(|(_, v)| v)
            });
            if !matched {
                return false;
            }
        }

        if self.municipality.is_none() && self.fence.is_none() {
            return true;
        }
        let fenced_type = chunk
            .location_type()
            .is_some_and(|t| self.fence_doc_types.contains(&t));
        if !fenced_type {
            return true;
        }

        let municipality_match = self.municipality.as_deref().map(|wanted| {
            chunk
                .municipality()
                .is_some_and(|m| fold(m.trim()) == fold(wanted.trim()))
        });
        let fence_match = self.fence.map(|fence| {
            chunk.point().map_or_else(
                || chunk.meta.geo.as_ref().and_then(|g| g.bbox).is_some_and(|b| fence.intersects(&b)),
                |p| fence.contains(p),
            )
        });

        match (municipality_match, fence_match) {
            (Some(m), Some(f)) if self.municipality_or_fence => m || f,
            (Some(m), Some(f)) => m && f,
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => true,
        }
    }
}
