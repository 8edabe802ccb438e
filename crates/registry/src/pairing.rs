use std::collections::{BTreeMap, BTreeSet};

use crate::ids::{OverlayId, RegionId};
use crate::overlay::OverlayStore;

/// Derived region → overlays index plus the per-region active overlay.
///
/// Never a source of truth: the overlay store owns the entities, and the
/// lifecycle controller is the only writer. `rebuild_from` exists so the
/// consistency verifier can detect drift between this index and the store.
///
/// Ordering contract:
/// - `overlays(region)` yields overlay ids in ascending order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PairingIndex {
    by_region: BTreeMap<RegionId, BTreeSet<OverlayId>>,
    active: BTreeMap<RegionId, OverlayId>,
}

impl PairingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the pairing was not already present.
    pub fn insert(&mut self, region: RegionId, overlay: OverlayId) -> bool {
        self.by_region.entry(region).or_default().insert(overlay)
    }

    /// Removes one pairing; clears the active slot if it pointed at `overlay`.
    pub fn remove(&mut self, region: &RegionId, overlay: &OverlayId) -> bool {
        let Some(set) = self.by_region.get_mut(region) else {
            return false;
        };
        let removed = set.remove(overlay);
        if set.is_empty() {
            self.by_region.remove(region);
        }
        if removed && self.active.get(region) == Some(overlay) {
            self.active.remove(region);
        }
        removed
    }

    /// Drops a region's entry entirely, returning its overlay ids in
    /// ascending order.
    pub fn remove_region(&mut self, region: &RegionId) -> Vec<OverlayId> {
        self.active.remove(region);
        self.by_region
            .remove(region)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    /// Marks `overlay` active for `region`. The caller guarantees the
    /// pairing exists; an unknown pairing is ignored.
    pub fn set_active(&mut self, region: &RegionId, overlay: &OverlayId) {
        if self.contains(region, overlay) {
            self.active.insert(region.clone(), overlay.clone());
        }
    }

    pub fn clear_active(&mut self, region: &RegionId) -> Option<OverlayId> {
        self.active.remove(region)
    }

    pub fn active(&self, region: &RegionId) -> Option<&OverlayId> {
        self.active.get(region)
    }

    pub fn contains(&self, region: &RegionId, overlay: &OverlayId) -> bool {
        self.by_region
            .get(region)
            .is_some_and(|set| set.contains(overlay))
    }

    /// Overlay ids paired with `region`, ascending.
    pub fn overlays(&self, region: &RegionId) -> Vec<OverlayId> {
        self.by_region
            .get(region)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of pairings across all regions.
    pub fn len(&self) -> usize {
        self.by_region.values().map(|set| set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_region.is_empty()
    }

    /// Reconstructs the pairing sets and active slots from the store.
    ///
    /// The result is what the incrementally-maintained index *should* equal;
    /// the verifier compares the two to catch drift.
    pub fn rebuild_from(store: &OverlayStore) -> Self {
        let mut index = PairingIndex::new();
        for overlay in store.iter() {
            index.insert(overlay.region_id.clone(), overlay.id.clone());
            if overlay.is_active {
                index
                    .active
                    .insert(overlay.region_id.clone(), overlay.id.clone());
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::PairingIndex;
    use crate::geometry::{ImageRef, OverlayBounds};
    use crate::ids::{OverlayId, RegionId};
    use crate::overlay::OverlayStore;

    fn r(id: &str) -> RegionId {
        RegionId::new(id)
    }

    fn o(id: &str) -> OverlayId {
        OverlayId::new(id)
    }

    #[test]
    fn insert_remove_and_active_slot() {
        let mut index = PairingIndex::new();
        assert!(index.insert(r("r1"), o("o1")));
        assert!(!index.insert(r("r1"), o("o1")));
        index.set_active(&r("r1"), &o("o1"));
        assert_eq!(index.active(&r("r1")), Some(&o("o1")));

        assert!(index.remove(&r("r1"), &o("o1")));
        assert_eq!(index.active(&r("r1")), None);
        assert!(index.is_empty());
    }

    #[test]
    fn set_active_ignores_unknown_pairing() {
        let mut index = PairingIndex::new();
        index.insert(r("r1"), o("o1"));
        index.set_active(&r("r1"), &o("stranger"));
        assert_eq!(index.active(&r("r1")), None);
    }

    #[test]
    fn remove_region_returns_sorted_overlays() {
        let mut index = PairingIndex::new();
        index.insert(r("r1"), o("b"));
        index.insert(r("r1"), o("a"));
        index.insert(r("r2"), o("c"));
        index.set_active(&r("r1"), &o("b"));

        assert_eq!(index.remove_region(&r("r1")), vec![o("a"), o("b")]);
        assert_eq!(index.active(&r("r1")), None);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rebuild_matches_incremental_maintenance() {
        let bounds = OverlayBounds::new(0.0, 0.0, 1.0, 1.0);
        let mut store = OverlayStore::new();
        store.create(o("o1"), r("r1"), ImageRef::new("u"), bounds, None, 0);
        store.create(o("o2"), r("r1"), ImageRef::new("u"), bounds, None, 1);
        store.set_active(&o("o2"), true);

        let mut incremental = PairingIndex::new();
        incremental.insert(r("r1"), o("o1"));
        incremental.insert(r("r1"), o("o2"));
        incremental.set_active(&r("r1"), &o("o2"));

        assert_eq!(PairingIndex::rebuild_from(&store), incremental);
    }
}
