//! Per-stage in-flight tracking.

use crate::core::StageKind;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;

/// Set of stage identities with a generation call outstanding.
#[derive(Debug, Default, Clone)]
pub(crate) struct InFlight {
    stages: Arc<DashMap<StageKind, Instant>>,
}

impl InFlight {
    /// Marks `stage` as in flight. Returns `None` if it already is.
    pub(crate) fn acquire(&self, stage: StageKind) -> Option<InFlightGuard> {
        match self.stages.entry(stage) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                Some(InFlightGuard {
                    stages: Arc::clone(&self.stages),
                    stage,
                })
            }
        }
    }

    pub(crate) fn contains(&self, stage: StageKind) -> bool {
        self.stages.contains_key(&stage)
    }

    pub(crate) fn stages(&self) -> Vec<StageKind> {
        let mut stages: Vec<StageKind> = self.stages.iter().map(|e| *e.key()).collect();
        stages.sort();
        stages
    }
}

/// Clears the in-flight marker when dropped, including when the owning
/// future is dropped mid-call.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    stages: Arc<DashMap<StageKind, Instant>>,
    stage: StageKind,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.stages.remove(&self.stage);
    }
}
