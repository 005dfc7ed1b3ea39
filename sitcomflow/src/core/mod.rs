//! Core domain model types for sitcomflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage identities and scene indices
//! - Artifact keys and the values stored under them

mod artifact;
mod stage;

pub use artifact::{
    ArtifactKey, ArtifactValue, CritiqueResult, KeywordCategory, Keywords, SceneCritique,
    SceneMetadata,
};
pub use stage::{Phase, SceneIndex, StageKind, MAX_SCENES};
