use registry::{
    ContentHash, Geometry, ImageRef, OverlayBounds, OverlayId, OverlayStats, OverlayStore,
    PairingIndex, PendingAttachment, PendingAttachmentQueue, Region, RegionId, RegionKind,
    RegionStore, RegistryError, RetryState,
};
use surface::{RenderSurface, SurfaceCommand};
use tracing::{debug, warn};

use crate::diagnostics::{DiagnosticKind, DiagnosticsLog};
use crate::verify::{self, Divergence};

/// Result of a region upsert.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// A region with this content already existed; nothing changed.
    Unchanged,
    /// New region installed.
    Created,
    /// Same id re-registered with different content; owned overlays were
    /// invalidated and the geometry replaced.
    Replaced,
}

/// Result of an overlay attachment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attach {
    /// Overlay installed; `active` is true when it was the region's first
    /// overlay and was auto-activated.
    Attached { active: bool },
    /// The overlay id was already attached; nothing changed.
    AlreadyAttached,
    /// The declared region is not registered yet; the request is queued.
    Queued,
    /// The overlay id was already queued; nothing changed.
    AlreadyQueued,
}

/// Result of an activation request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Activate {
    Activated,
    /// The overlay was already the active one; no commands issued.
    Unchanged,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub removed_regions: usize,
    pub removed_overlays: usize,
    pub discarded_pending: usize,
}

/// The single mutation entry point for the region/overlay registry.
///
/// Owns the stores, the pairing index, the pending queue, and the render
/// surface; nothing outside this type mutates any of them. Every operation
/// runs to completion within one single-threaded turn and issues the minimal
/// set of surface commands for its state transition.
///
/// Reentrancy defenses:
/// - Upserts are idempotent on content hash, so a reactive caller re-running
///   registration with stale data collapses to a no-op.
/// - Removal only ever happens through the explicit remove operations; a
///   transient empty input on the caller's side has no removal side channel
///   here.
#[derive(Debug)]
pub struct LifecycleController<S: RenderSurface> {
    regions: RegionStore,
    overlays: OverlayStore,
    pairing: PairingIndex,
    pending: PendingAttachmentQueue,
    diagnostics: DiagnosticsLog,
    surface: S,
    tick: u64,
}

impl<S: RenderSurface> LifecycleController<S> {
    pub fn new(surface: S) -> Self {
        Self {
            regions: RegionStore::new(),
            overlays: OverlayStore::new(),
            pairing: PairingIndex::new(),
            pending: PendingAttachmentQueue::new(),
            diagnostics: DiagnosticsLog::new(),
            surface,
            tick: 0,
        }
    }

    pub fn regions(&self) -> &RegionStore {
        &self.regions
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    pub fn pairing(&self) -> &PairingIndex {
        &self.pairing
    }

    pub fn pending(&self) -> &PendingAttachmentQueue {
        &self.pending
    }

    pub fn diagnostics(&self) -> &DiagnosticsLog {
        &self.diagnostics
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Direct surface access, for hosts that need to hand the display layer
    /// around and for fault injection in tests. State decisions still come
    /// only from the stores.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Registers or refreshes a region.
    ///
    /// Content-hash idempotence comes first: if any region (same or different
    /// id) already carries this content, that region's id is returned with
    /// `Upsert::Unchanged` and no commands are issued. Otherwise a same-id
    /// re-registration with new content invalidates the owned overlays and
    /// replaces the geometry; the locked base region is swapped in place and
    /// never leaves the store.
    pub fn upsert_region(
        &mut self,
        id: RegionId,
        geometry: Geometry,
        kind: RegionKind,
    ) -> Result<(RegionId, Upsert), RegistryError> {
        let tick = self.next_tick();
        let hash = ContentHash::of(kind.tag(), &geometry);

        if let Some(existing) = self.regions.find_by_hash(&hash) {
            let existing_id = existing.id.clone();
            debug!("upsert of {id} matched existing content of {existing_id}, no-op");
            return Ok((existing_id, Upsert::Unchanged));
        }

        if kind == RegionKind::Base
            && let Some(base) = self.regions.base_id()
            && base != &id
        {
            let err = RegistryError::DuplicateBaseRegion {
                existing: base.clone(),
                rejected: id,
            };
            warn!("{err}");
            return Err(err);
        }

        let prior_locked = self.regions.get(&id).map(|r| r.locked);
        let outcome = match prior_locked {
            Some(true) if kind != RegionKind::Base => {
                let err = RegistryError::LockedRegion(id);
                warn!("{err}");
                return Err(err);
            }
            Some(locked) => {
                // New hash under a known id: the owned overlays point at
                // stale geometry and must go before the region reappears.
                self.remove_owned_overlays(&id);
                self.surface
                    .apply(&SurfaceCommand::RemoveRegion { id: id.clone() });
                if locked {
                    self.regions.replace_geometry(&id, geometry.clone());
                } else {
                    self.regions.remove(&id)?;
                    self.regions
                        .install(Region::new(id.clone(), geometry.clone(), kind))?;
                }
                self.surface.apply(&SurfaceCommand::AddRegion {
                    id: id.clone(),
                    geometry,
                });
                debug!("region {id} replaced");
                Upsert::Replaced
            }
            None => {
                self.regions
                    .install(Region::new(id.clone(), geometry.clone(), kind))?;
                self.surface.apply(&SurfaceCommand::AddRegion {
                    id: id.clone(),
                    geometry,
                });
                debug!("region {id} installed");
                Upsert::Created
            }
        };

        self.resolve_pending_for(&id, tick);
        Ok((id, outcome))
    }

    /// Attaches an overlay to its declared region, or queues the request if
    /// the region has not registered yet.
    ///
    /// The first overlay a region receives is auto-activated; later ones
    /// start hidden and must be activated explicitly.
    pub fn attach_overlay(
        &mut self,
        id: OverlayId,
        region_id: RegionId,
        image: ImageRef,
        bounds: OverlayBounds,
        stats: Option<OverlayStats>,
    ) -> Attach {
        let tick = self.next_tick();

        if self.overlays.contains(&id) {
            debug!("overlay {id} already attached, no-op");
            return Attach::AlreadyAttached;
        }
        if self.pending.contains(&id) {
            debug!("overlay {id} already queued, no-op");
            return Attach::AlreadyQueued;
        }

        if self.regions.contains(&region_id) {
            let active = self.install_overlay(id, region_id, image, bounds, stats, tick);
            Attach::Attached { active }
        } else {
            debug!("overlay {id} queued: region {region_id} not registered yet");
            self.pending.enqueue(PendingAttachment {
                overlay: id,
                region: region_id,
                image,
                bounds,
                stats,
                retry: RetryState::Scheduled,
                enqueued_tick: tick,
            });
            Attach::Queued
        }
    }

    /// Makes `overlay_id` the region's single visible overlay.
    pub fn set_active_overlay(
        &mut self,
        region_id: RegionId,
        overlay_id: OverlayId,
    ) -> Result<Activate, RegistryError> {
        self.next_tick();

        if !self.pairing.contains(&region_id, &overlay_id) {
            let err = RegistryError::UnknownOverlay {
                region: region_id,
                overlay: overlay_id,
            };
            warn!("{err}");
            return Err(err);
        }
        if self.pairing.active(&region_id) == Some(&overlay_id) {
            return Ok(Activate::Unchanged);
        }

        if let Some(current) = self.pairing.clear_active(&region_id) {
            self.overlays.set_active(&current, false);
            self.surface.apply(&SurfaceCommand::SetOverlayVisibility {
                id: current,
                visible: false,
            });
        }
        self.overlays.set_active(&overlay_id, true);
        self.pairing.set_active(&region_id, &overlay_id);
        self.surface.apply(&SurfaceCommand::SetOverlayVisibility {
            id: overlay_id,
            visible: true,
        });
        Ok(Activate::Activated)
    }

    /// Deactivates the overlay if it is currently its region's active one.
    ///
    /// Returns `true` if a visibility change was issued.
    pub fn hide_overlay(&mut self, overlay_id: &OverlayId) -> bool {
        self.next_tick();

        let Some(overlay) = self.overlays.get(overlay_id) else {
            return false;
        };
        let region = overlay.region_id.clone();
        if self.pairing.active(&region) != Some(overlay_id) {
            return false;
        }

        self.pairing.clear_active(&region);
        self.overlays.set_active(overlay_id, false);
        self.surface.apply(&SurfaceCommand::SetOverlayVisibility {
            id: overlay_id.clone(),
            visible: false,
        });
        true
    }

    /// Removes an overlay (attached or still queued).
    ///
    /// Removing the active overlay selects no replacement: the region shows
    /// nothing until the caller activates or attaches another overlay.
    /// Returns `false` for unknown ids.
    pub fn remove_overlay(&mut self, overlay_id: &OverlayId) -> bool {
        self.next_tick();

        if self.pending.discard(overlay_id) {
            debug!("queued overlay {overlay_id} discarded by removal");
            return true;
        }
        let Some(overlay) = self.overlays.remove(overlay_id) else {
            return false;
        };
        self.pairing.remove(&overlay.region_id, overlay_id);
        self.surface.apply(&SurfaceCommand::RemoveOverlay {
            id: overlay_id.clone(),
        });
        debug!("overlay {overlay_id} removed");
        true
    }

    /// Removes a region together with every overlay it owns.
    ///
    /// Overlay removals are issued first so the region outline is the last
    /// thing to disappear. Returns `false` for unknown ids and rejects the
    /// locked base region.
    pub fn remove_region_cascade(&mut self, region_id: &RegionId) -> Result<bool, RegistryError> {
        self.next_tick();

        match self.regions.get(region_id) {
            None => return Ok(false),
            Some(r) if r.locked => {
                let err = RegistryError::LockedRegion(region_id.clone());
                warn!("{err}");
                return Err(err);
            }
            Some(_) => {}
        }

        let removed = self.remove_owned_overlays(region_id);
        self.regions.remove(region_id)?;
        self.surface.apply(&SurfaceCommand::RemoveRegion {
            id: region_id.clone(),
        });
        debug!("region {region_id} removed with {removed} overlays");
        Ok(true)
    }

    /// Cascades every non-locked region away. The base region survives but
    /// loses its overlays; pending attachments are discarded and reported.
    pub fn clear_all(&mut self) -> ClearSummary {
        let tick = self.next_tick();
        let mut summary = ClearSummary::default();

        for id in self.regions.list_ids() {
            let locked = self.regions.get(&id).is_some_and(|r| r.locked);
            summary.removed_overlays += self.remove_owned_overlays(&id);
            if !locked && self.regions.remove(&id).is_ok() {
                self.surface
                    .apply(&SurfaceCommand::RemoveRegion { id: id.clone() });
                summary.removed_regions += 1;
            }
        }

        for entry in self.pending.drain() {
            self.diagnostics.report(
                tick,
                DiagnosticKind::DiscardedPending,
                format!(
                    "pending overlay {} for region {} dropped by clear-all",
                    entry.overlay, entry.region
                ),
            );
            summary.discarded_pending += 1;
        }

        debug!(
            "clear-all removed {} regions, {} overlays",
            summary.removed_regions, summary.removed_overlays
        );
        summary
    }

    /// The single deferred retry pass for queued attachments.
    ///
    /// The host schedules this once, a bounded delay after enqueueing; the
    /// core owns no timers. Entries whose region is still missing are parked
    /// and reported as orphaned; they stay queued until the region registers
    /// or the entry is discarded. Returns the number of attachments resolved.
    pub fn retry_pending(&mut self) -> usize {
        let tick = self.next_tick();
        let mut resolved = 0;

        for overlay_id in self.pending.scheduled() {
            let Some(entry) = self
                .pending
                .entries()
                .iter()
                .find(|e| e.overlay == overlay_id)
                .cloned()
            else {
                continue;
            };
            if self.regions.contains(&entry.region) {
                self.pending.discard(&overlay_id);
                self.install_overlay(
                    entry.overlay,
                    entry.region,
                    entry.image,
                    entry.bounds,
                    entry.stats,
                    tick,
                );
                resolved += 1;
            } else {
                self.pending.park(&overlay_id);
                self.diagnostics.report(
                    tick,
                    DiagnosticKind::OrphanedOverlay,
                    format!(
                        "overlay {} still waiting for region {}",
                        entry.overlay, entry.region
                    ),
                );
            }
        }
        resolved
    }

    /// Explicitly cancels a queued attachment.
    pub fn discard_pending(&mut self, overlay_id: &OverlayId) -> bool {
        self.next_tick();
        let discarded = self.pending.discard(overlay_id);
        if discarded {
            debug!("pending overlay {overlay_id} discarded");
        }
        discarded
    }

    /// Diffs registry state against the render surface and the derived
    /// index. A clean system returns an empty list.
    pub fn verify(&self) -> Vec<Divergence> {
        verify::verify(&self.regions, &self.overlays, &self.pairing, &self.surface)
    }

    /// Runs `verify` and re-issues the minimal commands (or index rebuild)
    /// for every divergence found, reporting each as a diagnostic.
    pub fn verify_and_repair(&mut self) -> Vec<Divergence> {
        let tick = self.next_tick();
        let divergences = verify::verify(&self.regions, &self.overlays, &self.pairing, &self.surface);

        for divergence in &divergences {
            match divergence {
                Divergence::SurfaceRegionLeak(id) => {
                    self.surface
                        .apply(&SurfaceCommand::RemoveRegion { id: id.clone() });
                }
                Divergence::SurfaceOverlayLeak(id) => {
                    self.surface
                        .apply(&SurfaceCommand::RemoveOverlay { id: id.clone() });
                }
                Divergence::UnrenderedRegion(id) => {
                    if let Some(region) = self.regions.get(id) {
                        self.surface.apply(&SurfaceCommand::AddRegion {
                            id: id.clone(),
                            geometry: region.geometry.clone(),
                        });
                    }
                }
                Divergence::UnrenderedOverlay(id) => {
                    if let Some(overlay) = self.overlays.get(id) {
                        self.surface.apply(&SurfaceCommand::AddOverlay {
                            id: id.clone(),
                            image: overlay.image.clone(),
                            bounds: overlay.bounds,
                            visible: overlay.is_active,
                        });
                    }
                }
                Divergence::PairingDrift => {
                    self.pairing = PairingIndex::rebuild_from(&self.overlays);
                }
                Divergence::MultipleActive(region_id) => {
                    self.demote_extra_actives(region_id);
                }
            }
            let kind = match divergence {
                Divergence::PairingDrift => DiagnosticKind::IndexDrift,
                _ => DiagnosticKind::RenderDesync,
            };
            warn!("repairing divergence: {divergence}");
            self.diagnostics.report(tick, kind, divergence.to_string());
        }
        divergences
    }

    /// Shared attach path for direct and queue-resolved attachments.
    fn install_overlay(
        &mut self,
        id: OverlayId,
        region_id: RegionId,
        image: ImageRef,
        bounds: OverlayBounds,
        stats: Option<OverlayStats>,
        tick: u64,
    ) -> bool {
        let first = self.pairing.overlays(&region_id).is_empty();
        self.overlays.create(
            id.clone(),
            region_id.clone(),
            image.clone(),
            bounds,
            stats,
            tick,
        );
        self.pairing.insert(region_id.clone(), id.clone());
        if first {
            self.overlays.set_active(&id, true);
            self.pairing.set_active(&region_id, &id);
        }
        debug!(
            "overlay {id} attached to {region_id}{}",
            if first { " (auto-active)" } else { "" }
        );
        self.surface.apply(&SurfaceCommand::AddOverlay {
            id,
            image,
            bounds,
            visible: first,
        });
        first
    }

    /// Removes every overlay a region owns, one remove command each, in
    /// ascending overlay-id order. Returns how many were removed.
    fn remove_owned_overlays(&mut self, region_id: &RegionId) -> usize {
        let ids = self.pairing.remove_region(region_id);
        for overlay_id in &ids {
            self.overlays.remove(overlay_id);
            self.surface.apply(&SurfaceCommand::RemoveOverlay {
                id: overlay_id.clone(),
            });
        }
        ids.len()
    }

    /// Attaches queued overlays for a freshly registered region, in enqueue
    /// order.
    fn resolve_pending_for(&mut self, region_id: &RegionId, tick: u64) {
        for entry in self.pending.take_for_region(region_id) {
            debug!("resolving pending overlay {} for {region_id}", entry.overlay);
            self.install_overlay(
                entry.overlay,
                entry.region,
                entry.image,
                entry.bounds,
                entry.stats,
                tick,
            );
        }
    }

    /// Keeps the most recent active overlay, deactivates the rest.
    fn demote_extra_actives(&mut self, region_id: &RegionId) {
        let mut actives: Vec<(u64, OverlayId)> = self
            .overlays
            .overlays_for_region(region_id)
            .iter()
            .filter(|o| o.is_active)
            .map(|o| (o.created_tick, o.id.clone()))
            .collect();
        if actives.len() < 2 {
            return;
        }
        actives.sort();
        let keep = actives.pop().map(|(_, id)| id);
        for (_, overlay_id) in actives {
            self.overlays.set_active(&overlay_id, false);
            self.surface.apply(&SurfaceCommand::SetOverlayVisibility {
                id: overlay_id,
                visible: false,
            });
        }
        if let Some(keep) = keep {
            self.pairing.set_active(region_id, &keep);
        }
    }
}
