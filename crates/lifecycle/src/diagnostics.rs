/// Non-fatal conditions collected for later inspection.
///
/// Diagnostics never interrupt the operation that produced them; callers
/// query or drain the log when they want the picture.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A pending attachment missed its single retry and is parked.
    OrphanedOverlay,
    /// The render surface disagreed with the stores; a repair command may
    /// have been re-issued.
    RenderDesync,
    /// The pairing index drifted from the overlay store and was rebuilt.
    IndexDrift,
    /// A pending attachment was dropped by clear-all.
    DiscardedPending,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::OrphanedOverlay => "orphaned_overlay",
            DiagnosticKind::RenderDesync => "render_desync",
            DiagnosticKind::IndexDrift => "index_drift",
            DiagnosticKind::DiscardedPending => "discarded_pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Controller operation tick at which the condition was observed.
    pub tick: u64,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct DiagnosticsLog {
    entries: Vec<Diagnostic>,
}

impl DiagnosticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, tick: u64, kind: DiagnosticKind, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            tick,
            kind,
            message: message.into(),
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.entries.iter().filter(|d| d.kind == kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::{DiagnosticKind, DiagnosticsLog};

    #[test]
    fn records_with_tick_and_kind() {
        let mut log = DiagnosticsLog::new();
        log.report(3, DiagnosticKind::OrphanedOverlay, "o1 still unmatched");
        assert_eq!(log.entries().len(), 1);
        assert_eq!(log.entries()[0].tick, 3);
        assert_eq!(log.of_kind(DiagnosticKind::OrphanedOverlay).len(), 1);
        assert!(log.of_kind(DiagnosticKind::RenderDesync).is_empty());
    }

    #[test]
    fn drain_clears_entries() {
        let mut log = DiagnosticsLog::new();
        log.report(0, DiagnosticKind::DiscardedPending, "m");
        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert!(log.is_empty());
    }
}
