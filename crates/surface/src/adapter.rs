use std::collections::BTreeSet;

use registry::{OverlayId, RegionId};

use crate::command::SurfaceCommand;

/// Seam to the actual display layer.
///
/// The core addresses the surface purely by id and pushes commands one way;
/// display objects never carry bookkeeping state back into the registry.
/// `visible_region_ids`/`visible_overlay_ids` exist solely for the
/// consistency verifier's leak detection — decisions are never based on them.
pub trait RenderSurface {
    fn apply(&mut self, command: &SurfaceCommand);

    /// Region ids currently present on the display, ascending.
    fn visible_region_ids(&self) -> Vec<RegionId>;

    /// Overlay ids currently present on the display (visible or hidden),
    /// ascending.
    fn visible_overlay_ids(&self) -> Vec<OverlayId>;
}

/// Reference surface: keeps the ordered command log plus a mirror of the
/// present id sets. Used by tests, the verifier, and the replay CLI.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    log: Vec<SurfaceCommand>,
    regions: BTreeSet<RegionId>,
    overlays: BTreeSet<OverlayId>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.log
    }

    pub fn drain_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.log)
    }

    /// One compact line per command, in order. Convenient for test diffs.
    pub fn log_lines(&self) -> Vec<String> {
        self.log.iter().map(|c| c.to_string()).collect()
    }

    /// Injects a ghost overlay entry, bypassing the command path. Test hook
    /// for exercising leak detection.
    pub fn inject_overlay(&mut self, id: OverlayId) {
        self.overlays.insert(id);
    }

    /// Injects a ghost region entry, bypassing the command path.
    pub fn inject_region(&mut self, id: RegionId) {
        self.regions.insert(id);
    }
}

impl RenderSurface for RecordingSurface {
    fn apply(&mut self, command: &SurfaceCommand) {
        match command {
            SurfaceCommand::AddRegion { id, .. } => {
                self.regions.insert(id.clone());
            }
            SurfaceCommand::RemoveRegion { id } => {
                self.regions.remove(id);
            }
            SurfaceCommand::AddOverlay { id, .. } => {
                self.overlays.insert(id.clone());
            }
            SurfaceCommand::SetOverlayVisibility { .. } => {}
            SurfaceCommand::RemoveOverlay { id } => {
                self.overlays.remove(id);
            }
        }
        self.log.push(command.clone());
    }

    fn visible_region_ids(&self) -> Vec<RegionId> {
        self.regions.iter().cloned().collect()
    }

    fn visible_overlay_ids(&self) -> Vec<OverlayId> {
        self.overlays.iter().cloned().collect()
    }
}
