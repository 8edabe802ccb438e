use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geometry::{ImageRef, OverlayBounds, OverlayStats};
use crate::ids::{OverlayId, RegionId};

/// A derived visual artifact (image + bounds) owned by exactly one region.
///
/// Overlays whose region has not registered yet live in the
/// `PendingAttachmentQueue`, not here, so every stored overlay references a
/// registered region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub region_id: RegionId,
    pub image: ImageRef,
    pub bounds: OverlayBounds,
    #[serde(default)]
    pub stats: Option<OverlayStats>,
    pub is_active: bool,
    /// Controller operation sequence at creation. Deterministic stand-in for
    /// a wall-clock timestamp; later overlays have larger ticks.
    pub created_tick: u64,
}

/// Owned set of overlays, keyed by id with deterministic iteration.
#[derive(Debug, Default)]
pub struct OverlayStore {
    overlays: BTreeMap<OverlayId, Overlay>,
}

impl OverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    pub fn get(&self, id: &OverlayId) -> Option<&Overlay> {
        self.overlays.get(id)
    }

    pub fn contains(&self, id: &OverlayId) -> bool {
        self.overlays.contains_key(id)
    }

    /// Installs an overlay, inactive, under its id.
    ///
    /// Idempotent: an existing id is returned unchanged.
    pub fn create(
        &mut self,
        id: OverlayId,
        region_id: RegionId,
        image: ImageRef,
        bounds: OverlayBounds,
        stats: Option<OverlayStats>,
        created_tick: u64,
    ) -> &Overlay {
        self.overlays.entry(id.clone()).or_insert(Overlay {
            id,
            region_id,
            image,
            bounds,
            stats,
            is_active: false,
            created_tick,
        })
    }

    /// Returns `true` if the overlay exists and its flag changed.
    pub fn set_active(&mut self, id: &OverlayId, active: bool) -> bool {
        let Some(overlay) = self.overlays.get_mut(id) else {
            return false;
        };
        if overlay.is_active == active {
            return false;
        }
        overlay.is_active = active;
        true
    }

    pub fn remove(&mut self, id: &OverlayId) -> Option<Overlay> {
        self.overlays.remove(id)
    }

    /// Overlays owned by `region_id`, ascending id order.
    pub fn overlays_for_region(&self, region_id: &RegionId) -> Vec<&Overlay> {
        self.overlays
            .values()
            .filter(|o| &o.region_id == region_id)
            .collect()
    }

    pub fn list_ids(&self) -> Vec<OverlayId> {
        self.overlays.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.values()
    }
}
