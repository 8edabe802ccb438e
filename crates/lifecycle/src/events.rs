use registry::{
    ContentHash, Geometry, ImageRef, OverlayBounds, OverlayId, OverlayStats, RegionId, RegionKind,
    RegistryError,
};
use surface::RenderSurface;

use crate::controller::{Attach, LifecycleController};

/// Fixed id of the portal-wide base region installed at startup.
pub const BASE_REGION_ID: &str = "aoi-base";

/// Events emitted by the drawing tool.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawToolEvent {
    RegionCreated { geometry: Geometry },
    RegionEdited { id: RegionId, geometry: Geometry },
    RegionErased { id: RegionId },
}

/// Events emitted by the external overlay producer. Asynchronous and
/// possibly out of order with respect to region events.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    OverlayReady {
        overlay: OverlayId,
        region: RegionId,
        image: ImageRef,
        bounds: OverlayBounds,
        stats: Option<OverlayStats>,
    },
}

/// User actions from the portal UI; thin pass-throughs to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Show { region: RegionId, overlay: OverlayId },
    Hide { overlay: OverlayId },
    Remove { overlay: OverlayId },
    RemoveRegion { region: RegionId },
    ClearAll,
}

/// Content-derived id for a freshly drawn region.
///
/// Duplicate create events from the reactive draw layer hash to the same id
/// and collapse in the upsert.
pub fn drawn_region_id(geometry: &Geometry) -> RegionId {
    let hash = ContentHash::of(RegionKind::Drawn.tag(), geometry);
    RegionId::new(format!("drawn-{}", hash.short()))
}

/// Installs the portal-wide base region. Idempotent; returns the base id.
pub fn install_base_region<S: RenderSurface>(
    controller: &mut LifecycleController<S>,
    geometry: Geometry,
) -> Result<RegionId, RegistryError> {
    controller
        .upsert_region(RegionId::new(BASE_REGION_ID), geometry, RegionKind::Base)
        .map(|(id, _)| id)
}

/// Maps a draw-tool event onto the controller. Returns the affected region
/// id where one results.
pub fn apply_draw_event<S: RenderSurface>(
    controller: &mut LifecycleController<S>,
    event: DrawToolEvent,
) -> Result<Option<RegionId>, RegistryError> {
    match event {
        DrawToolEvent::RegionCreated { geometry } => {
            let id = drawn_region_id(&geometry);
            controller
                .upsert_region(id, geometry, RegionKind::Drawn)
                .map(|(id, _)| Some(id))
        }
        DrawToolEvent::RegionEdited { id, geometry } => {
            // Edits keep the region's registered kind; an edit event for an
            // unknown id registers it as drawn.
            let kind = controller
                .regions()
                .get(&id)
                .map(|r| r.kind)
                .unwrap_or(RegionKind::Drawn);
            controller
                .upsert_region(id, geometry, kind)
                .map(|(id, _)| Some(id))
        }
        DrawToolEvent::RegionErased { id } => {
            controller.remove_region_cascade(&id).map(|_| None)
        }
    }
}

/// Maps an overlay-producer event onto the controller.
pub fn apply_overlay_event<S: RenderSurface>(
    controller: &mut LifecycleController<S>,
    event: OverlayEvent,
) -> Attach {
    match event {
        OverlayEvent::OverlayReady {
            overlay,
            region,
            image,
            bounds,
            stats,
        } => controller.attach_overlay(overlay, region, image, bounds, stats),
    }
}

/// Maps a UI action onto the controller.
pub fn apply_ui_action<S: RenderSurface>(
    controller: &mut LifecycleController<S>,
    action: UiAction,
) -> Result<(), RegistryError> {
    match action {
        UiAction::Show { region, overlay } => {
            controller.set_active_overlay(region, overlay).map(|_| ())
        }
        UiAction::Hide { overlay } => {
            controller.hide_overlay(&overlay);
            Ok(())
        }
        UiAction::Remove { overlay } => {
            controller.remove_overlay(&overlay);
            Ok(())
        }
        UiAction::RemoveRegion { region } => {
            controller.remove_region_cascade(&region).map(|_| ())
        }
        UiAction::ClearAll => {
            controller.clear_all();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use registry::{Geometry, ImageRef, OverlayBounds, OverlayId, RegionId, RegionKind};
    use surface::RecordingSurface;

    use super::{
        apply_draw_event, apply_overlay_event, apply_ui_action, drawn_region_id,
        install_base_region, DrawToolEvent, OverlayEvent, UiAction, BASE_REGION_ID,
    };
    use crate::controller::{Attach, LifecycleController, Upsert};

    fn controller() -> LifecycleController<RecordingSurface> {
        LifecycleController::new(RecordingSurface::new())
    }

    fn ready(overlay: &str, region: &str) -> OverlayEvent {
        OverlayEvent::OverlayReady {
            overlay: OverlayId::new(overlay),
            region: RegionId::new(region),
            image: ImageRef::new(format!("https://tiles.example/{overlay}.png")),
            bounds: OverlayBounds::new(44.0, -124.5, 47.3, -121.0),
            stats: None,
        }
    }

    #[test]
    fn duplicate_create_events_collapse() {
        let mut c = controller();
        let g = Geometry::new("{\"type\":\"Polygon\"}");
        let first = apply_draw_event(&mut c, DrawToolEvent::RegionCreated { geometry: g.clone() })
            .unwrap()
            .unwrap();
        let second = apply_draw_event(&mut c, DrawToolEvent::RegionCreated { geometry: g })
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(c.regions().len(), 1);
        assert!(first.as_str().starts_with("drawn-"));
    }

    #[test]
    fn drawn_id_is_stable_for_content() {
        let g = Geometry::new("geom");
        assert_eq!(drawn_region_id(&g), drawn_region_id(&g));
    }

    #[test]
    fn edit_preserves_registered_kind() {
        let mut c = controller();
        c.upsert_region(
            RegionId::new("upload-1"),
            Geometry::new("v1"),
            RegionKind::Uploaded,
        )
        .unwrap();
        apply_draw_event(
            &mut c,
            DrawToolEvent::RegionEdited {
                id: RegionId::new("upload-1"),
                geometry: Geometry::new("v2"),
            },
        )
        .unwrap();
        assert_eq!(
            c.regions().get(&RegionId::new("upload-1")).unwrap().kind,
            RegionKind::Uploaded
        );
    }

    #[test]
    fn overlay_ready_before_region_queues_then_attaches() {
        let mut c = controller();
        assert_eq!(apply_overlay_event(&mut c, ready("o1", "r1")), Attach::Queued);

        let (_, outcome) = c
            .upsert_region(RegionId::new("r1"), Geometry::new("g"), RegionKind::Drawn)
            .unwrap();
        assert_eq!(outcome, Upsert::Created);
        assert!(c.overlays().contains(&OverlayId::new("o1")));
    }

    #[test]
    fn base_install_is_idempotent_and_survives_clear() {
        let mut c = controller();
        let id = install_base_region(&mut c, Geometry::new("world")).unwrap();
        assert_eq!(id, RegionId::new(BASE_REGION_ID));
        install_base_region(&mut c, Geometry::new("world")).unwrap();
        assert_eq!(c.regions().len(), 1);

        apply_ui_action(&mut c, UiAction::ClearAll).unwrap();
        assert_eq!(c.regions().list_ids(), vec![RegionId::new(BASE_REGION_ID)]);
    }

    #[test]
    fn erase_event_cascades() {
        let mut c = controller();
        c.upsert_region(RegionId::new("r1"), Geometry::new("g"), RegionKind::Drawn)
            .unwrap();
        apply_overlay_event(&mut c, ready("o1", "r1"));
        apply_draw_event(
            &mut c,
            DrawToolEvent::RegionErased {
                id: RegionId::new("r1"),
            },
        )
        .unwrap();
        assert!(c.regions().is_empty());
        assert!(c.overlays().is_empty());
        assert!(c.verify().is_empty());
    }
}
