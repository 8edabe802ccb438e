use registry::{Geometry, ImageRef, OverlayBounds, OverlayId, RegionId};
use serde::{Deserialize, Serialize};

/// Commands the lifecycle core issues to the display layer.
///
/// The core emits these as the *effects* of its state transitions and never
/// reads display state back (outside the verifier's diagnostic enumeration).
/// Plain data, serializable so replay logs can be exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum SurfaceCommand {
    AddRegion {
        id: RegionId,
        geometry: Geometry,
    },
    RemoveRegion {
        id: RegionId,
    },
    AddOverlay {
        id: OverlayId,
        image: ImageRef,
        bounds: OverlayBounds,
        visible: bool,
    },
    SetOverlayVisibility {
        id: OverlayId,
        visible: bool,
    },
    RemoveOverlay {
        id: OverlayId,
    },
}

impl std::fmt::Display for SurfaceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceCommand::AddRegion { id, .. } => write!(f, "add_region {id}"),
            SurfaceCommand::RemoveRegion { id } => write!(f, "remove_region {id}"),
            SurfaceCommand::AddOverlay { id, visible, .. } => {
                write!(
                    f,
                    "add_overlay {id} ({})",
                    if *visible { "visible" } else { "hidden" }
                )
            }
            SurfaceCommand::SetOverlayVisibility { id, visible } => {
                write!(f, "{} {id}", if *visible { "show_overlay" } else { "hide_overlay" })
            }
            SurfaceCommand::RemoveOverlay { id } => write!(f, "remove_overlay {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use registry::{Geometry, RegionId};

    use super::SurfaceCommand;

    #[test]
    fn display_is_compact() {
        let cmd = SurfaceCommand::AddRegion {
            id: RegionId::new("r1"),
            geometry: Geometry::new("{}"),
        };
        assert_eq!(cmd.to_string(), "add_region r1");
    }
}
