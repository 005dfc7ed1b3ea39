//! Tracing setup and span attributes for stage runs.

use crate::config::LogFormat;
use crate::core::StageKind;
use crate::errors::{WizardError, WizardResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and falls back to `info`.
///
/// # Errors
///
/// Returns [`WizardError::Config`] if a global subscriber is already set.
pub fn init_tracing(format: LogFormat) -> WizardResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| WizardError::Config(format!("tracing subscriber: {e}")))
}

/// Attributes describing one stage run, attached to events and log lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpanAttributes {
    /// The stage.
    pub stage: StageKind,
    /// Status label ("started", "completed", "failed", "busy").
    pub status: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Revision written on success.
    pub revision: Option<u32>,
    /// Whether the run overwrote existing output.
    pub regenerate: bool,
}

impl StageSpanAttributes {
    /// Creates attributes for a stage.
    #[must_use]
    pub fn new(stage: StageKind) -> Self {
        Self {
            stage,
            status: None,
            duration_ms: None,
            error: None,
            revision: None,
            regenerate: false,
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Sets the written revision.
    #[must_use]
    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Marks the run as a regeneration.
    #[must_use]
    pub fn regenerating(mut self, regenerate: bool) -> Self {
        self.regenerate = regenerate;
        self
    }

    /// Flattens to event fields, skipping unset values.
    #[must_use]
    pub fn to_fields(&self) -> Value {
        let mut fields = json!({
            "stage": self.stage.to_string(),
            "regenerate": self.regenerate,
        });
        if let Some(obj) = fields.as_object_mut() {
            if let Some(scene) = self.stage.scene() {
                obj.insert("scene".into(), json!(scene.get()));
            }
            if let Some(ref v) = self.status {
                obj.insert("status".into(), json!(v));
            }
            if let Some(v) = self.duration_ms {
                obj.insert("duration_ms".into(), json!(v));
            }
            if let Some(ref v) = self.error {
                obj.insert("error".into(), json!(v));
            }
            if let Some(v) = self.revision {
                obj.insert("revision".into(), json!(v));
            }
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SceneIndex;

    #[test]
    fn test_stage_span_fields() {
        let attrs = StageSpanAttributes::new(StageKind::SceneGeneration(SceneIndex::new(4).unwrap()))
            .with_status("completed")
            .with_duration_ms(12.5)
            .with_revision(2)
            .regenerating(true);

        let fields = attrs.to_fields();
        assert_eq!(fields["stage"], "scene_generation(4)");
        assert_eq!(fields["scene"], 4);
        assert_eq!(fields["status"], "completed");
        assert_eq!(fields["revision"], 2);
        assert_eq!(fields["regenerate"], true);
        assert!(fields.get("error").is_none());
    }

    #[test]
    fn test_phase_a_stage_has_no_scene_field() {
        let fields = StageSpanAttributes::new(StageKind::ConceptGeneration)
            .with_error("boom")
            .to_fields();
        assert!(fields.get("scene").is_none());
        assert_eq!(fields["error"], "boom");
    }
}
