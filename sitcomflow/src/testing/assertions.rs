//! Assertions over store snapshots and wizard errors.

use crate::core::{ArtifactKey, StageKind};
use crate::errors::WizardError;
use crate::store::ArtifactStore;

/// Asserts that the snapshot holds a usable value for `key`.
pub fn assert_present(store: &ArtifactStore, key: ArtifactKey) {
    assert!(
        store.is_present(key),
        "Expected {key} to be present. Stored keys: {:?}",
        store.keys().map(|k| k.to_string()).collect::<Vec<_>>()
    );
}

/// Asserts that the snapshot has no usable value for `key`.
pub fn assert_absent(store: &ArtifactStore, key: ArtifactKey) {
    assert!(
        !store.is_present(key),
        "Expected {key} to be absent, found {:?}",
        store.value(key)
    );
}

/// Asserts that `key` is at the given revision.
pub fn assert_revision(store: &ArtifactStore, key: ArtifactKey, expected: u32) {
    assert_eq!(
        store.revision(key),
        Some(expected),
        "Expected {key} at revision {expected}"
    );
}

/// Asserts that an error is a missing-dependency refusal for `stage`
/// naming exactly `missing`.
pub fn assert_missing_dependency(err: &WizardError, stage: StageKind, missing: &[ArtifactKey]) {
    match err {
        WizardError::MissingDependency {
            stage: actual,
            missing: actual_missing,
        } => {
            assert_eq!(*actual, stage, "MissingDependency for the wrong stage");
            assert_eq!(actual_missing.as_slice(), missing, "Unexpected missing keys");
        }
        other => panic!("Expected MissingDependency for {stage}, got {other:?}"),
    }
}

/// Asserts that an error is a generation failure for `stage`.
pub fn assert_generation_failure(err: &WizardError, stage: StageKind) {
    assert!(
        matches!(err, WizardError::GenerationFailure { stage: s, .. } if *s == stage),
        "Expected GenerationFailure for {stage}, got {err:?}"
    );
}
