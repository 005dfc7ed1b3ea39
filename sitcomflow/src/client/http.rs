//! JSON-over-HTTP generation client for the wizard's backend.

use super::{GenerationClient, GenerationRequest, GenerationResponse, RequestKind};
use crate::core::{CritiqueResult, SceneCritique, SceneMetadata};
use crate::errors::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Base URL of the backend API, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_timeout() -> f64 {
    120.0
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl HttpClientConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Gets timeout as Duration, or `None` when it is not a positive,
    /// representable number of seconds.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .ok()
            .filter(|limit| !limit.is_zero())
    }

    /// Checks the base URL and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] describing the invalid value.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.base_url.trim().is_empty() {
            return Err(GenerationError::Transport("base_url must not be empty".into()));
        }
        if self.timeout().is_none() {
            return Err(GenerationError::Transport(format!(
                "timeout_seconds must be a positive duration, got {}",
                self.timeout_seconds
            )));
        }
        Ok(())
    }
}

/// Generation client posting JSON to the backend's per-stage endpoints.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    config: HttpClientConfig,
    http: reqwest::Client,
}

impl HttpGenerationClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] if the configuration is invalid
    /// or the HTTP client cannot be built.
    pub fn new(config: HttpClientConfig) -> Result<Self, GenerationError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn url(&self, kind: RequestKind) -> String {
        format!("{}/{}", self.config.base_url, endpoint(kind))
    }
}

fn endpoint(kind: RequestKind) -> &'static str {
    match kind {
        RequestKind::Concept => "generate-concept",
        RequestKind::Outline => "generate-outline",
        RequestKind::OutlineValidation => "validate-outline",
        RequestKind::OpeningScene => "generate-scene-1",
        RequestKind::Scene => "generate-scene",
        RequestKind::SceneMetadata => "scene-vector-info",
        RequestKind::OpeningCritique => "scene-1-writers-room",
        RequestKind::SceneCritique => "scene-writers-room",
    }
}

/// Builds the JSON body the backend expects for a request.
fn request_body(request: &GenerationRequest) -> Value {
    let ctx = &request.context;
    let mut body = Map::new();
    body.insert("apiKey".into(), json!(request.api_key));

    if let Some(keywords) = ctx.keywords() {
        let map: Map<String, Value> = keywords
            .iter()
            .map(|(category, text)| (category.to_string(), json!(text)))
            .collect();
        body.insert("keywords".into(), Value::Object(map));
    }
    if let Some(concept) = ctx.concept() {
        body.insert("concept".into(), json!(concept));
    }
    if let Some(outline) = ctx.outline() {
        body.insert("outline".into(), json!(outline));
    }
    if let Some(n) = request.scene() {
        body.insert("sceneNumber".into(), json!(n.get()));
        if let Some(script) = ctx.scene(n) {
            // The opening-scene endpoints predate the generic field name.
            let field = if n.is_first() { "scene1Script" } else { "sceneScript" };
            body.insert(field.into(), json!(script));
        }
        if let Some(prev) = n.prev() {
            if let Some(script) = ctx.scene(prev) {
                body.insert("previousScene".into(), json!(script));
            }
            if let Some(critique) = ctx.critique(prev) {
                body.insert("previousCritique".into(), json!(critique));
            }
        }
    }
    if let Some(guidance) = &request.guidance {
        body.insert("guidance".into(), json!(guidance));
    }
    Value::Object(body)
}

#[derive(Debug, Deserialize)]
struct CharacterWire {
    is_consistent: Option<bool>,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    recommendations: String,
    #[serde(default)]
    thoughts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ComedicWire {
    is_consistent: Option<bool>,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    recommendations: String,
    #[serde(default)]
    thoughts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EnvironmentWire {
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    transition: Option<String>,
    #[serde(default)]
    details_suggestions: String,
    #[serde(default)]
    thoughts: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WritersRoomWire {
    character: CharacterWire,
    comedic: ComedicWire,
    environment: EnvironmentWire,
}

impl From<WritersRoomWire> for SceneCritique {
    fn from(wire: WritersRoomWire) -> Self {
        Self {
            character: CritiqueResult {
                is_consistent: wire.character.is_consistent,
                explanation: wire.character.explanation,
                recommendations: wire.character.recommendations,
                thoughts: wire.character.thoughts,
                transition: None,
            },
            comedic: CritiqueResult {
                is_consistent: wire.comedic.is_consistent,
                explanation: wire.comedic.analysis,
                recommendations: wire.comedic.recommendations,
                thoughts: wire.comedic.thoughts,
                transition: None,
            },
            environment: CritiqueResult {
                is_consistent: None,
                explanation: wire.environment.analysis,
                recommendations: wire.environment.details_suggestions,
                thoughts: wire.environment.thoughts,
                transition: wire.environment.transition,
            },
        }
    }
}

/// Turns a decoded backend body into a response for `kind`.
fn parse_response(kind: RequestKind, body: Value) -> Result<GenerationResponse, GenerationError> {
    if let Some(error) = body.get("error").and_then(Value::as_str) {
        return Err(GenerationError::Rejected(error.to_string()));
    }

    let text_field = |field: &str| {
        body.get(field)
            .and_then(Value::as_str)
            .map(|s| GenerationResponse::Text(s.to_string()))
            .ok_or_else(|| GenerationError::MalformedPayload(format!("missing '{field}' in {kind} response")))
    };

    match kind {
        RequestKind::Concept => text_field("concept"),
        RequestKind::Outline => text_field("outline"),
        RequestKind::OutlineValidation => text_field("validation"),
        RequestKind::OpeningScene => text_field("scene1"),
        RequestKind::Scene => text_field("scene"),
        RequestKind::SceneMetadata => serde_json::from_value::<SceneMetadata>(body)
            .map(GenerationResponse::Metadata)
            .map_err(|e| GenerationError::MalformedPayload(e.to_string())),
        RequestKind::OpeningCritique | RequestKind::SceneCritique => {
            serde_json::from_value::<WritersRoomWire>(body)
                .map(|wire| GenerationResponse::Critique(wire.into()))
                .map_err(|e| GenerationError::MalformedPayload(e.to_string()))
        }
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let url = self.url(request.kind);
        debug!(url = %url, stage = %request.stage, "Posting generation request");

        let response = self
            .http
            .post(&url)
            .json(&request_body(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(self.config.timeout())
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedPayload(e.to_string()))?;

        parse_response(request.kind, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GenerationContext;
    use crate::core::{ArtifactKey, ArtifactValue, KeywordCategory, Keywords, SceneIndex, StageKind};

    fn request(stage: StageKind, context: GenerationContext) -> GenerationRequest {
        GenerationRequest {
            stage,
            kind: RequestKind::for_stage(stage).unwrap(),
            api_key: "sk-test".into(),
            context,
            guidance: None,
        }
    }

    #[test]
    fn test_concept_body_flattens_keywords() {
        let mut ctx = GenerationContext::new();
        ctx.insert(
            ArtifactKey::Keywords,
            ArtifactValue::Keywords(Keywords::new().with(KeywordCategory::ToneGenre, "farce")),
        );
        let body = request_body(&request(StageKind::ConceptGeneration, ctx));
        assert_eq!(body["apiKey"], "sk-test");
        assert_eq!(body["keywords"]["tone_genre"], "farce");
    }

    #[test]
    fn test_scene_body_carries_previous_scene() {
        let s2 = SceneIndex::new(2).unwrap();
        let mut ctx = GenerationContext::new();
        ctx.insert(ArtifactKey::Outline, ArtifactValue::Text("outline".into()));
        ctx.insert(ArtifactKey::Scene(SceneIndex::FIRST), ArtifactValue::Text("scene one".into()));
        let body = request_body(&request(StageKind::SceneGeneration(s2), ctx));
        assert_eq!(body["sceneNumber"], 2);
        assert_eq!(body["previousScene"], "scene one");
        assert!(body.get("previousCritique").is_none());
    }

    #[test]
    fn test_error_body_is_rejected() {
        let err = parse_response(RequestKind::Outline, json!({"error": "Missing required fields"}))
            .unwrap_err();
        assert_eq!(err, GenerationError::Rejected("Missing required fields".into()));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let err = parse_response(RequestKind::OpeningScene, json!({"scene": "wrong key"})).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedPayload(_)));
    }

    #[test]
    fn test_writers_room_maps_axes() {
        let body = json!({
            "character": {"is_consistent": true, "explanation": "1. fine", "recommendations": "- none", "thoughts": ["a"]},
            "comedic": {"is_consistent": false, "analysis": "flat", "recommendations": "- punch up", "thoughts": []},
            "environment": {"analysis": "- diner", "transition": "- smooth", "details_suggestions": "- neon sign", "thoughts": ["b"]}
        });
        let response = parse_response(RequestKind::OpeningCritique, body).unwrap();
        let GenerationResponse::Critique(critique) = response else {
            panic!("expected critique");
        };
        assert_eq!(critique.character.is_consistent, Some(true));
        assert_eq!(critique.comedic.explanation, "flat");
        assert_eq!(critique.environment.is_consistent, None);
        assert_eq!(critique.environment.transition.as_deref(), Some("- smooth"));
        assert_eq!(critique.environment.recommendations, "- neon sign");
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = HttpClientConfig::default().with_base_url("http://localhost:9000/api/");
        let client = HttpGenerationClient::new(config).unwrap();
        assert_eq!(client.url(RequestKind::Concept), "http://localhost:9000/api/generate-concept");
    }

    #[test]
    fn test_invalid_timeout_is_refused() {
        for seconds in [-1.0, 0.0, f64::NAN, 1e20] {
            let config = HttpClientConfig::default().with_timeout(seconds);
            assert_eq!(config.timeout(), None, "{seconds}");
            let err = HttpGenerationClient::new(config).unwrap_err();
            assert!(err.to_string().contains("timeout_seconds"), "{seconds}");
        }
        assert_eq!(
            HttpClientConfig::default().with_timeout(2.5).timeout(),
            Some(Duration::from_millis(2500))
        );
    }
}
