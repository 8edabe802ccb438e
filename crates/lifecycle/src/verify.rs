use std::collections::BTreeSet;

use registry::{OverlayId, OverlayStore, PairingIndex, RegionId, RegionStore};
use surface::RenderSurface;

/// One observed mismatch between the registry and the world derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// Region visible on the surface with no registry entry (a leak).
    SurfaceRegionLeak(RegionId),
    /// Overlay visible on the surface with no registry entry (a leak).
    SurfaceOverlayLeak(OverlayId),
    /// Registered region that never made it onto the surface.
    UnrenderedRegion(RegionId),
    /// Registered overlay that never made it onto the surface.
    UnrenderedOverlay(OverlayId),
    /// The incrementally maintained pairing index no longer matches a
    /// rebuild from the overlay store.
    PairingDrift,
    /// More than one overlay is flagged active for the region.
    MultipleActive(RegionId),
}

impl std::fmt::Display for Divergence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Divergence::SurfaceRegionLeak(id) => {
                write!(f, "region {id} visible on surface but not registered")
            }
            Divergence::SurfaceOverlayLeak(id) => {
                write!(f, "overlay {id} visible on surface but not registered")
            }
            Divergence::UnrenderedRegion(id) => {
                write!(f, "region {id} registered but never rendered")
            }
            Divergence::UnrenderedOverlay(id) => {
                write!(f, "overlay {id} registered but never rendered")
            }
            Divergence::PairingDrift => {
                write!(f, "pairing index drifted from the overlay store")
            }
            Divergence::MultipleActive(id) => {
                write!(f, "region {id} has more than one active overlay")
            }
        }
    }
}

/// Diffs registry contents against the render surface and the derived index.
///
/// Deterministic output order: surface leaks first (regions then overlays,
/// ascending), then unrendered entries, then index findings. A consistent
/// system returns an empty vector — the no-leak property tests rely on that.
pub fn verify(
    regions: &RegionStore,
    overlays: &OverlayStore,
    pairing: &PairingIndex,
    surface: &impl RenderSurface,
) -> Vec<Divergence> {
    let mut out = Vec::new();

    let known_regions: BTreeSet<RegionId> = regions.list_ids().into_iter().collect();
    let shown_regions: BTreeSet<RegionId> = surface.visible_region_ids().into_iter().collect();
    let known_overlays: BTreeSet<OverlayId> = overlays.list_ids().into_iter().collect();
    let shown_overlays: BTreeSet<OverlayId> = surface.visible_overlay_ids().into_iter().collect();

    for id in shown_regions.difference(&known_regions) {
        out.push(Divergence::SurfaceRegionLeak(id.clone()));
    }
    for id in shown_overlays.difference(&known_overlays) {
        out.push(Divergence::SurfaceOverlayLeak(id.clone()));
    }
    for id in known_regions.difference(&shown_regions) {
        out.push(Divergence::UnrenderedRegion(id.clone()));
    }
    for id in known_overlays.difference(&shown_overlays) {
        out.push(Divergence::UnrenderedOverlay(id.clone()));
    }

    if &PairingIndex::rebuild_from(overlays) != pairing {
        out.push(Divergence::PairingDrift);
    }

    for region_id in &known_regions {
        let active = overlays
            .overlays_for_region(region_id)
            .iter()
            .filter(|o| o.is_active)
            .count();
        if active > 1 {
            out.push(Divergence::MultipleActive(region_id.clone()));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use registry::{Geometry, ImageRef, OverlayBounds, OverlayId, RegionId, RegionKind};
    use surface::{RecordingSurface, RenderSurface, SurfaceCommand};

    use super::Divergence;
    use crate::controller::LifecycleController;
    use crate::diagnostics::DiagnosticKind;

    fn populated() -> LifecycleController<RecordingSurface> {
        let mut c = LifecycleController::new(RecordingSurface::new());
        c.upsert_region(RegionId::new("base"), Geometry::new("world"), RegionKind::Base)
            .unwrap();
        c.upsert_region(RegionId::new("r1"), Geometry::new("geomA"), RegionKind::Drawn)
            .unwrap();
        c.attach_overlay(
            OverlayId::new("o1"),
            RegionId::new("r1"),
            ImageRef::new("https://tiles.example/o1.png"),
            OverlayBounds::new(0.0, 0.0, 1.0, 1.0),
            None,
        );
        c
    }

    #[test]
    fn clean_state_has_no_divergence() {
        let c = populated();
        assert_eq!(c.verify(), vec![]);
    }

    #[test]
    fn still_clean_after_churn() {
        let mut c = populated();
        c.attach_overlay(
            OverlayId::new("o2"),
            RegionId::new("r1"),
            ImageRef::new("https://tiles.example/o2.png"),
            OverlayBounds::new(0.0, 0.0, 1.0, 1.0),
            None,
        );
        c.set_active_overlay(RegionId::new("r1"), OverlayId::new("o2"))
            .unwrap();
        c.remove_overlay(&OverlayId::new("o1"));
        c.remove_region_cascade(&RegionId::new("r1")).unwrap();
        c.clear_all();
        assert_eq!(c.verify(), vec![]);
    }

    #[test]
    fn repair_removes_injected_surface_leaks() {
        let mut c = populated();
        // Simulate the display layer keeping a ghost entry the registry
        // never heard of.
        c.surface_mut().inject_overlay(OverlayId::new("ghost"));

        let found = c.verify_and_repair();
        assert_eq!(
            found,
            vec![Divergence::SurfaceOverlayLeak(OverlayId::new("ghost"))]
        );
        assert_eq!(c.verify(), vec![]);
        assert_eq!(c.diagnostics().of_kind(DiagnosticKind::RenderDesync).len(), 1);
    }

    #[test]
    fn repair_reissues_commands_for_unrendered_overlay() {
        let mut c = populated();
        // Simulate the display layer dropping an overlay behind the
        // registry's back (e.g. a layer group wiped wholesale).
        c.surface_mut().apply(&SurfaceCommand::RemoveOverlay {
            id: OverlayId::new("o1"),
        });

        let found = c.verify_and_repair();
        assert_eq!(
            found,
            vec![Divergence::UnrenderedOverlay(OverlayId::new("o1"))]
        );
        assert_eq!(c.verify(), vec![]);
        // The re-issued add restores the active overlay as visible.
        assert_eq!(
            c.surface().log_lines().last().map(String::as_str),
            Some("add_overlay o1 (visible)")
        );
    }

    #[test]
    fn repair_removes_injected_region_leak() {
        let mut c = populated();
        c.surface_mut().inject_region(RegionId::new("phantom"));

        let found = c.verify_and_repair();
        assert_eq!(
            found,
            vec![Divergence::SurfaceRegionLeak(RegionId::new("phantom"))]
        );
        assert_eq!(c.verify(), vec![]);
    }
}
