use crate::geometry::{ImageRef, OverlayBounds, OverlayStats};
use crate::ids::{OverlayId, RegionId};

/// Retry status of a queued attachment.
///
/// `Scheduled` entries get one deferred resolution attempt; after a second
/// miss they are `Parked` and stay queued until the region registers or the
/// entry is explicitly discarded. An orphaned overlay is a reportable
/// condition, not a transient error to clean up silently.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RetryState {
    Scheduled,
    Parked,
}

/// An attach request whose declared region is not registered yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAttachment {
    pub overlay: OverlayId,
    pub region: RegionId,
    pub image: ImageRef,
    pub bounds: OverlayBounds,
    pub stats: Option<OverlayStats>,
    pub retry: RetryState,
    pub enqueued_tick: u64,
}

/// Insertion-ordered queue of pending attachments.
///
/// Key properties:
/// - Entries for the same region resolve in enqueue order.
/// - Enqueue is idempotent per overlay id.
/// - No timers: the lifecycle controller drives the single retry pass.
#[derive(Debug, Default)]
pub struct PendingAttachmentQueue {
    entries: Vec<PendingAttachment>,
}

impl PendingAttachmentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, overlay: &OverlayId) -> bool {
        self.entries.iter().any(|e| &e.overlay == overlay)
    }

    /// Returns `false` (and changes nothing) if the overlay is already queued.
    pub fn enqueue(&mut self, entry: PendingAttachment) -> bool {
        if self.contains(&entry.overlay) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Removes and returns every entry targeting `region`, preserving
    /// enqueue order.
    pub fn take_for_region(&mut self, region: &RegionId) -> Vec<PendingAttachment> {
        let mut taken = Vec::new();
        self.entries.retain(|e| {
            if &e.region == region {
                taken.push(e.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Overlay ids still in `Scheduled` state, enqueue order.
    pub fn scheduled(&self) -> Vec<OverlayId> {
        self.entries
            .iter()
            .filter(|e| e.retry == RetryState::Scheduled)
            .map(|e| e.overlay.clone())
            .collect()
    }

    /// Marks an entry's single retry as spent. Returns `true` if the entry
    /// existed and was still scheduled.
    pub fn park(&mut self, overlay: &OverlayId) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| &e.overlay == overlay) else {
            return false;
        };
        if entry.retry == RetryState::Parked {
            return false;
        }
        entry.retry = RetryState::Parked;
        true
    }

    /// Explicit cancellation. Returns `true` if an entry was removed.
    pub fn discard(&mut self, overlay: &OverlayId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| &e.overlay != overlay);
        self.entries.len() != before
    }

    /// Removes and returns everything, enqueue order.
    pub fn drain(&mut self) -> Vec<PendingAttachment> {
        std::mem::take(&mut self.entries)
    }

    pub fn entries(&self) -> &[PendingAttachment] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{PendingAttachment, PendingAttachmentQueue, RetryState};
    use crate::geometry::{ImageRef, OverlayBounds};
    use crate::ids::{OverlayId, RegionId};

    fn entry(overlay: &str, region: &str, tick: u64) -> PendingAttachment {
        PendingAttachment {
            overlay: OverlayId::new(overlay),
            region: RegionId::new(region),
            image: ImageRef::new("u"),
            bounds: OverlayBounds::new(0.0, 0.0, 1.0, 1.0),
            stats: None,
            retry: RetryState::Scheduled,
            enqueued_tick: tick,
        }
    }

    #[test]
    fn enqueue_is_idempotent_per_overlay() {
        let mut q = PendingAttachmentQueue::new();
        assert!(q.enqueue(entry("o1", "r1", 0)));
        assert!(!q.enqueue(entry("o1", "r2", 1)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn take_for_region_preserves_enqueue_order() {
        let mut q = PendingAttachmentQueue::new();
        q.enqueue(entry("a", "r1", 0));
        q.enqueue(entry("x", "r2", 1));
        q.enqueue(entry("b", "r1", 2));

        let taken = q.take_for_region(&RegionId::new("r1"));
        let ids: Vec<_> = taken.iter().map(|e| e.overlay.clone()).collect();
        assert_eq!(ids, vec![OverlayId::new("a"), OverlayId::new("b")]);
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn park_spends_the_single_retry() {
        let mut q = PendingAttachmentQueue::new();
        q.enqueue(entry("o1", "r1", 0));
        assert_eq!(q.scheduled(), vec![OverlayId::new("o1")]);

        assert!(q.park(&OverlayId::new("o1")));
        assert!(!q.park(&OverlayId::new("o1")));
        assert!(q.scheduled().is_empty());
        // Parked entries stay queued until discard or resolution.
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn discard_removes_entry() {
        let mut q = PendingAttachmentQueue::new();
        q.enqueue(entry("o1", "r1", 0));
        assert!(q.discard(&OverlayId::new("o1")));
        assert!(!q.discard(&OverlayId::new("o1")));
        assert!(q.is_empty());
    }
}
