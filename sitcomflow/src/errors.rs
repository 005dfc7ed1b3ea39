//! Error types for the sitcomflow wizard.
//!
//! Nothing here is fatal: every variant describes a refusal or a failed
//! generation that the caller can recover from by re-attempting the stage.

use crate::core::{ArtifactKey, StageKind};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type WizardResult<T> = Result<T, WizardError>;

/// The main error type for orchestration and navigation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    /// A stage was asked to run before its prerequisites exist.
    #[error("Missing dependency for {stage}: {}", join_keys(.missing))]
    MissingDependency {
        /// The stage that was refused.
        stage: StageKind,
        /// The absent artifacts.
        missing: Vec<ArtifactKey>,
    },

    /// A run for the same stage identity is already in flight.
    #[error("Stage {stage} is busy")]
    Busy {
        /// The busy stage.
        stage: StageKind,
    },

    /// The generation service failed or returned an unusable payload.
    #[error("Generation failed for {stage}: {reason}")]
    GenerationFailure {
        /// The stage that failed.
        stage: StageKind,
        /// What went wrong.
        reason: String,
    },

    /// Navigation targeted a stage that is not reachable yet.
    #[error("Stage {stage} is locked")]
    Locked {
        /// The unreachable stage.
        stage: StageKind,
    },

    /// `run` was called for a stage whose output already exists.
    #[error("Stage {stage} already has output; regenerate to overwrite")]
    AlreadyGenerated {
        /// The stage.
        stage: StageKind,
    },

    /// `run` was called for a stage the user fills in by hand.
    #[error("Stage {stage} is not generated")]
    NotGenerated {
        /// The stage.
        stage: StageKind,
    },

    /// A scene number beyond the configured episode length.
    #[error("Scene {index} is outside 1..={max}")]
    InvalidScene {
        /// The requested scene number.
        index: u8,
        /// The configured scene count.
        max: u8,
    },

    /// Manual retry budget for a stage is spent.
    #[error("Retry budget exhausted for {stage} after {attempts} attempts")]
    RetryExhausted {
        /// The stage.
        stage: StageKind,
        /// Retries performed.
        attempts: u32,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_keys(keys: &[ArtifactKey]) -> String {
    keys.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl WizardError {
    /// Creates a missing dependency error.
    #[must_use]
    pub fn missing(stage: StageKind, missing: Vec<ArtifactKey>) -> Self {
        Self::MissingDependency { stage, missing }
    }

    /// Creates a generation failure.
    #[must_use]
    pub fn generation(stage: StageKind, reason: impl Into<String>) -> Self {
        Self::GenerationFailure {
            stage,
            reason: reason.into(),
        }
    }

    /// Short machine-readable code for the variant.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingDependency { .. } => "missing_dependency",
            Self::Busy { .. } => "busy",
            Self::GenerationFailure { .. } => "generation_failure",
            Self::Locked { .. } => "locked",
            Self::AlreadyGenerated { .. } => "already_generated",
            Self::NotGenerated { .. } => "not_generated",
            Self::InvalidScene { .. } => "invalid_scene",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Config(_) => "config",
        }
    }

    /// The stage the error concerns, if any.
    #[must_use]
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::MissingDependency { stage, .. }
            | Self::Busy { stage }
            | Self::GenerationFailure { stage, .. }
            | Self::Locked { stage }
            | Self::AlreadyGenerated { stage }
            | Self::NotGenerated { stage }
            | Self::RetryExhausted { stage, .. } => Some(*stage),
            Self::InvalidScene { .. } | Self::Config(_) => None,
        }
    }

    /// True when re-invoking the same stage may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::GenerationFailure { .. } | Self::Busy { .. })
    }

    /// Converts to a dictionary representation for display.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(self.code()));
        map.insert("message".to_string(), json!(self.to_string()));
        map.insert("retryable".to_string(), json!(self.is_retryable()));
        if let Some(stage) = self.stage() {
            map.insert("stage".to_string(), json!(stage.to_string()));
        }
        if let Self::MissingDependency { missing, .. } = self {
            map.insert(
                "missing".to_string(),
                json!(missing.iter().map(ToString::to_string).collect::<Vec<_>>()),
            );
        }
        map
    }
}

/// Failures reported by a generation client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The service answered with an error message.
    #[error("rejected by service: {0}")]
    Rejected(String),

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// The answer did not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The call exceeded the configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    /// Attaches the stage and converts to a [`WizardError`].
    #[must_use]
    pub fn for_stage(self, stage: StageKind) -> WizardError {
        WizardError::generation(stage, self.to_string())
    }
}
