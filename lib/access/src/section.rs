//! Section-ID mapping between the legacy and the current numbering scheme.
//!
//! The identity provider still reports section memberships with the legacy
//! numeric layer-group ids, while the application works with the current
//! section ids. The mapping table translates one-directionally; ids without
//! an entry pass through unchanged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One-directional mapping from legacy section ids to current section ids.
///
/// The mapping is not idempotent: `map(map(x))` is not guaranteed to equal
/// `map(x)`. It is applied exactly once, when section memberships are
/// derived from the provider claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionIdMap(HashMap<u32, u32>);

impl SectionIdMap {
    /// Creates an empty map (every id passes through unchanged).
    #[must_use]
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Translates a legacy section id, falling back to the input when no
    /// entry exists.
    #[must_use]
    pub fn map(&self, section_id: u32) -> u32 {
        self.0.get(&section_id).copied().unwrap_or(section_id)
    }

    /// Returns the number of mapped ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map carries no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<u32, u32>> for SectionIdMap {
    fn from(map: HashMap<u32, u32>) -> Self {
        Self(map)
    }
}

impl FromIterator<(u32, u32)> for SectionIdMap {
    fn from_iter<I: IntoIterator<Item = (u32, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_map() -> SectionIdMap {
        [(1415, 4250), (1420, 4251), (1425, 4252)]
            .into_iter()
            .collect()
    }

    #[test]
    fn mapped_id_is_translated() {
        assert_eq!(legacy_map().map(1415), 4250);
    }

    #[test]
    fn unmapped_id_passes_through() {
        assert_eq!(legacy_map().map(9999), 9999);
    }

    #[test]
    fn mapping_is_not_idempotent() {
        // 4250 has no entry, so a second application keeps it. A map that
        // chains entries would move it again; the contract only promises a
        // single application.
        let map: SectionIdMap = [(1415, 4250), (4250, 17)].into_iter().collect();
        let once = map.map(1415);
        assert_eq!(once, 4250);
        assert_ne!(map.map(once), once);
    }

    #[test]
    fn empty_map_is_identity() {
        assert_eq!(SectionIdMap::empty().map(1415), 1415);
    }

    #[test]
    fn deserializes_from_plain_object() {
        let map: SectionIdMap =
            serde_json::from_str(r#"{"1415":4250,"1420":4251}"#).expect("deserialize");
        assert_eq!(map.map(1420), 4251);
    }
}
