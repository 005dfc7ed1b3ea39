//! Scripted generation client for tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::client::{GenerationClient, GenerationRequest, GenerationResponse, ResponseShape};
use crate::core::{CritiqueResult, SceneCritique, SceneMetadata, StageKind};
use crate::errors::GenerationError;

/// A client that answers every request with deterministic content, records
/// what it was asked, and can be told to fail or to wait.
///
/// Default answers:
/// - text stages get `"<stage> output"`, e.g. `"scene_generation(2) output"`;
/// - metadata stages get a record whose summary names the stage;
/// - critique stages get a record whose character explanation names the stage.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    requests: Mutex<Vec<GenerationRequest>>,
    failures: Mutex<HashMap<StageKind, u32>>,
    responses: Mutex<HashMap<StageKind, GenerationResponse>>,
    gates: Mutex<HashMap<StageKind, Arc<Notify>>>,
}

impl ScriptedClient {
    /// Creates a client with default answers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` requests for `stage` fail with a transport error.
    pub fn fail_on(&self, stage: StageKind, times: u32) {
        self.failures.lock().insert(stage, times);
    }

    /// Replaces the default answer for `stage`.
    pub fn respond_with(&self, stage: StageKind, response: GenerationResponse) {
        self.responses.lock().insert(stage, response);
    }

    /// Makes the next request for `stage` wait until the returned handle is
    /// notified.
    pub fn hold(&self, stage: StageKind) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(stage, Arc::clone(&gate));
        gate
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }

    /// Requests received for one stage.
    #[must_use]
    pub fn requests_for(&self, stage: StageKind) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.stage == stage)
            .cloned()
            .collect()
    }

    /// Stages requested so far, in arrival order.
    #[must_use]
    pub fn stages(&self) -> Vec<StageKind> {
        self.requests.lock().iter().map(|r| r.stage).collect()
    }

    /// Number of requests received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forgets recorded requests.
    pub fn reset(&self) {
        self.requests.lock().clear();
    }

    fn default_response(request: &GenerationRequest) -> GenerationResponse {
        let stage = request.stage;
        match request.kind.expected_shape() {
            ResponseShape::Text => GenerationResponse::Text(format!("{stage} output")),
            ResponseShape::Metadata => GenerationResponse::Metadata(SceneMetadata {
                summary: format!("summary of {stage}"),
                characters: "Ensemble".to_string(),
                location: "The apartment".to_string(),
                recurring_joke: "The broken buzzer".to_string(),
                emotional_tone: "Warm".to_string(),
            }),
            ResponseShape::Critique => GenerationResponse::Critique(SceneCritique {
                character: CritiqueResult {
                    is_consistent: Some(true),
                    explanation: format!("critique of {stage}"),
                    ..CritiqueResult::default()
                },
                comedic: CritiqueResult {
                    is_consistent: Some(false),
                    recommendations: "Land the button joke".to_string(),
                    ..CritiqueResult::default()
                },
                environment: CritiqueResult {
                    transition: Some("Cut to the stairwell".to_string()),
                    ..CritiqueResult::default()
                },
            }),
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let stage = request.stage;
        self.requests.lock().push(request.clone());

        let gate = self.gates.lock().remove(&stage);
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let fail = {
            let mut failures = self.failures.lock();
            match failures.get_mut(&stage) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(GenerationError::Transport(format!(
                "scripted failure for {stage}"
            )));
        }

        let scripted = self.responses.lock().get(&stage).cloned();
        Ok(scripted.unwrap_or_else(|| Self::default_response(&request)))
    }
}
