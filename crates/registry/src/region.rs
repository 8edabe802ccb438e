use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::RegistryError;
use crate::geometry::{ContentHash, Geometry};
use crate::ids::RegionId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Drawn,
    Uploaded,
    Base,
}

impl RegionKind {
    /// Stable tag mixed into the content hash.
    pub fn tag(&self) -> &'static str {
        match self {
            RegionKind::Drawn => "drawn",
            RegionKind::Uploaded => "uploaded",
            RegionKind::Base => "base",
        }
    }
}

/// A user- or system-defined area of interest. Plain data; all bookkeeping
/// lives in the stores and the pairing index, never on render-layer objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub geometry: Geometry,
    pub content_hash: ContentHash,
    pub kind: RegionKind,
    /// True only for the single base region; once true, never false.
    pub locked: bool,
}

impl Region {
    pub fn new(id: RegionId, geometry: Geometry, kind: RegionKind) -> Self {
        let content_hash = ContentHash::of(kind.tag(), &geometry);
        Self {
            id,
            geometry,
            content_hash,
            kind,
            locked: kind == RegionKind::Base,
        }
    }
}

/// Owned set of regions.
///
/// Key properties:
/// - Deterministic iteration (`BTreeMap`).
/// - At most one base (locked) region.
/// - No two regions share a content hash: the lifecycle controller resolves
///   a re-upsert with identical content to the existing entity (via
///   `find_by_hash`) instead of installing a duplicate.
#[derive(Debug, Default)]
pub struct RegionStore {
    regions: BTreeMap<RegionId, Region>,
    base: Option<RegionId>,
}

impl RegionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn get(&self, id: &RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn contains(&self, id: &RegionId) -> bool {
        self.regions.contains_key(id)
    }

    pub fn base_id(&self) -> Option<&RegionId> {
        self.base.as_ref()
    }

    pub fn find_by_hash(&self, hash: &ContentHash) -> Option<&Region> {
        self.regions.values().find(|r| &r.content_hash == hash)
    }

    /// Installs a region under its id.
    ///
    /// Rejects a second base region under a different id. The caller is
    /// expected to have resolved hash collisions and id replacement first
    /// (that orchestration belongs to the lifecycle controller).
    pub fn install(&mut self, region: Region) -> Result<(), RegistryError> {
        if region.kind == RegionKind::Base {
            if let Some(existing) = &self.base
                && existing != &region.id
            {
                return Err(RegistryError::DuplicateBaseRegion {
                    existing: existing.clone(),
                    rejected: region.id.clone(),
                });
            }
            self.base = Some(region.id.clone());
        }
        self.regions.insert(region.id.clone(), region);
        Ok(())
    }

    /// Removes a region.
    ///
    /// Returns the removed region, `Ok(None)` for unknown ids, and an
    /// explicit rejection for the locked base region — never silent success.
    pub fn remove(&mut self, id: &RegionId) -> Result<Option<Region>, RegistryError> {
        match self.regions.get(id) {
            None => Ok(None),
            Some(r) if r.locked => Err(RegistryError::LockedRegion(id.clone())),
            Some(_) => Ok(self.regions.remove(id)),
        }
    }

    /// In-place geometry swap for the locked base region, which cannot go
    /// through remove + reinstall.
    pub fn replace_geometry(&mut self, id: &RegionId, geometry: Geometry) -> bool {
        let Some(region) = self.regions.get_mut(id) else {
            return false;
        };
        region.content_hash = ContentHash::of(region.kind.tag(), &geometry);
        region.geometry = geometry;
        true
    }

    /// Region ids in ascending order.
    pub fn list_ids(&self) -> Vec<RegionId> {
        self.regions.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Region, RegionKind, RegionStore};
    use crate::geometry::Geometry;
    use crate::ids::RegionId;
    use crate::RegistryError;

    fn region(id: &str, geom: &str, kind: RegionKind) -> Region {
        Region::new(RegionId::new(id), Geometry::new(geom), kind)
    }

    #[test]
    fn install_and_get() {
        let mut store = RegionStore::new();
        store.install(region("r1", "g1", RegionKind::Drawn)).unwrap();
        assert!(store.contains(&RegionId::new("r1")));
        assert_eq!(store.get(&RegionId::new("r1")).unwrap().kind, RegionKind::Drawn);
        assert!(store.get(&RegionId::new("r2")).is_none());
    }

    #[test]
    fn base_region_is_locked_and_unique() {
        let mut store = RegionStore::new();
        store.install(region("base", "g", RegionKind::Base)).unwrap();
        assert!(store.get(&RegionId::new("base")).unwrap().locked);
        assert_eq!(store.base_id(), Some(&RegionId::new("base")));

        let err = store
            .install(region("base2", "g2", RegionKind::Base))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateBaseRegion {
                existing: RegionId::new("base"),
                rejected: RegionId::new("base2"),
            }
        );
    }

    #[test]
    fn remove_rejects_locked_region() {
        let mut store = RegionStore::new();
        store.install(region("base", "g", RegionKind::Base)).unwrap();
        let err = store.remove(&RegionId::new("base")).unwrap_err();
        assert_eq!(err, RegistryError::LockedRegion(RegionId::new("base")));
        assert!(store.contains(&RegionId::new("base")));
    }

    #[test]
    fn remove_unknown_is_quiet() {
        let mut store = RegionStore::new();
        assert_eq!(store.remove(&RegionId::new("missing")).unwrap(), None);
    }

    #[test]
    fn find_by_hash_matches_identical_content() {
        let mut store = RegionStore::new();
        let r = region("r1", "g1", RegionKind::Drawn);
        let hash = r.content_hash.clone();
        store.install(r).unwrap();

        let probe = region("other-id", "g1", RegionKind::Drawn);
        assert_eq!(probe.content_hash, hash);
        assert_eq!(
            store.find_by_hash(&probe.content_hash).unwrap().id,
            RegionId::new("r1")
        );
    }

    #[test]
    fn replace_geometry_updates_hash_in_place() {
        let mut store = RegionStore::new();
        store.install(region("base", "g1", RegionKind::Base)).unwrap();
        let before = store.get(&RegionId::new("base")).unwrap().content_hash.clone();

        assert!(store.replace_geometry(&RegionId::new("base"), Geometry::new("g2")));
        let after = store.get(&RegionId::new("base")).unwrap();
        assert_ne!(after.content_hash, before);
        assert!(after.locked);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_ids_is_sorted() {
        let mut store = RegionStore::new();
        store.install(region("b", "g1", RegionKind::Drawn)).unwrap();
        store.install(region("a", "g2", RegionKind::Drawn)).unwrap();
        assert_eq!(
            store.list_ids(),
            vec![RegionId::new("a"), RegionId::new("b")]
        );
    }
}
