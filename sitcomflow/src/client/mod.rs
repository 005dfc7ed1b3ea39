//! Boundary to the remote generation service.
//!
//! The orchestrator talks to the service only through [`GenerationClient`].
//! A request carries the api key, the request kind derived from the stage,
//! and exactly the artifacts the stage depends on.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{HttpClientConfig, HttpGenerationClient};

use crate::core::{
    ArtifactKey, ArtifactValue, Keywords, SceneCritique, SceneIndex, SceneMetadata, StageKind,
};
use crate::errors::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The kind of call made to the service. One per generated stage kind;
/// scene 1 uses dedicated writing and critique variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Pitch a concept from keywords.
    Concept,
    /// Outline the pilot from the concept.
    Outline,
    /// Review the outline against the concept.
    OutlineValidation,
    /// Write scene 1 from the outline alone.
    OpeningScene,
    /// Write a later scene from the outline and the previous scene.
    Scene,
    /// Summarise a scene into a metadata record.
    SceneMetadata,
    /// Writer's room pass on scene 1.
    OpeningCritique,
    /// Writer's room pass on a later scene.
    SceneCritique,
}

impl RequestKind {
    /// Derives the request kind for a stage. User-entered stages have none.
    #[must_use]
    pub fn for_stage(stage: StageKind) -> Option<Self> {
        match stage {
            StageKind::ApiKeyEntry | StageKind::KeywordEntry => None,
            StageKind::ConceptGeneration => Some(Self::Concept),
            StageKind::OutlineGeneration => Some(Self::Outline),
            StageKind::OutlineValidation => Some(Self::OutlineValidation),
            StageKind::SceneGeneration(n) if n.is_first() => Some(Self::OpeningScene),
            StageKind::SceneGeneration(_) => Some(Self::Scene),
            StageKind::SceneMetadata(_) => Some(Self::SceneMetadata),
            StageKind::SceneCritique(n) if n.is_first() => Some(Self::OpeningCritique),
            StageKind::SceneCritique(_) => Some(Self::SceneCritique),
        }
    }

    /// The payload shape a successful answer must have.
    #[must_use]
    pub fn expected_shape(self) -> ResponseShape {
        match self {
            Self::SceneMetadata => ResponseShape::Metadata,
            Self::OpeningCritique | Self::SceneCritique => ResponseShape::Critique,
            _ => ResponseShape::Text,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Concept => "concept",
            Self::Outline => "outline",
            Self::OutlineValidation => "outline_validation",
            Self::OpeningScene => "opening_scene",
            Self::Scene => "scene",
            Self::SceneMetadata => "scene_metadata",
            Self::OpeningCritique => "opening_critique",
            Self::SceneCritique => "scene_critique",
        };
        f.write_str(name)
    }
}

/// Payload shapes a response can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Free text.
    Text,
    /// A scene metadata record.
    Metadata,
    /// A scene critique record.
    Critique,
}

/// Artifacts handed to the service, keyed like the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    artifacts: BTreeMap<ArtifactKey, ArtifactValue>,
}

impl GenerationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact.
    pub fn insert(&mut self, key: ArtifactKey, value: ArtifactValue) {
        self.artifacts.insert(key, value);
    }

    /// Returns an artifact value.
    #[must_use]
    pub fn get(&self, key: ArtifactKey) -> Option<&ArtifactValue> {
        self.artifacts.get(&key)
    }

    /// True when the context carries the key.
    #[must_use]
    pub fn contains(&self, key: ArtifactKey) -> bool {
        self.artifacts.contains_key(&key)
    }

    /// Keys carried, in order.
    pub fn keys(&self) -> impl Iterator<Item = ArtifactKey> + '_ {
        self.artifacts.keys().copied()
    }

    /// Keyword set.
    #[must_use]
    pub fn keywords(&self) -> Option<&Keywords> {
        self.get(ArtifactKey::Keywords).and_then(ArtifactValue::as_keywords)
    }

    /// Concept text.
    #[must_use]
    pub fn concept(&self) -> Option<&str> {
        self.get(ArtifactKey::Concept).and_then(ArtifactValue::as_text)
    }

    /// Outline text.
    #[must_use]
    pub fn outline(&self) -> Option<&str> {
        self.get(ArtifactKey::Outline).and_then(ArtifactValue::as_text)
    }

    /// Script of scene `n`.
    #[must_use]
    pub fn scene(&self, n: SceneIndex) -> Option<&str> {
        self.get(ArtifactKey::Scene(n)).and_then(ArtifactValue::as_text)
    }

    /// Critique of scene `n`.
    #[must_use]
    pub fn critique(&self, n: SceneIndex) -> Option<&SceneCritique> {
        self.get(ArtifactKey::SceneCritique(n))
            .and_then(ArtifactValue::as_critique)
    }
}

/// One call to the generation service.
#[derive(Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The stage being generated.
    pub stage: StageKind,
    /// What kind of call this is.
    pub kind: RequestKind,
    /// Service credential.
    pub api_key: String,
    /// Dependency artifacts, plus optional upstream critique.
    pub context: GenerationContext,
    /// Extra free-text direction from the user.
    pub guidance: Option<String>,
}

impl GenerationRequest {
    /// The scene this request concerns, if any.
    #[must_use]
    pub fn scene(&self) -> Option<SceneIndex> {
        self.stage.scene()
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("stage", &self.stage)
            .field("kind", &self.kind)
            .field("api_key", &"<redacted>")
            .field("context_keys", &self.context.keys().collect::<Vec<_>>())
            .field("guidance", &self.guidance)
            .finish()
    }
}

/// A successful answer from the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum GenerationResponse {
    /// Free text.
    Text(String),
    /// Scene metadata record.
    Metadata(SceneMetadata),
    /// Scene critique record.
    Critique(SceneCritique),
}

impl GenerationResponse {
    /// The shape of this payload.
    #[must_use]
    pub fn shape(&self) -> ResponseShape {
        match self {
            Self::Text(_) => ResponseShape::Text,
            Self::Metadata(_) => ResponseShape::Metadata,
            Self::Critique(_) => ResponseShape::Critique,
        }
    }

    /// Checks the payload against what `kind` expects and converts it into
    /// a storable value.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::MalformedPayload`] on a shape mismatch or
    /// an empty payload.
    pub fn into_artifact(self, kind: RequestKind) -> Result<ArtifactValue, GenerationError> {
        let expected = kind.expected_shape();
        if self.shape() != expected {
            return Err(GenerationError::MalformedPayload(format!(
                "{kind} expects {expected:?}, got {:?}",
                self.shape()
            )));
        }

        let value = match self {
            Self::Text(text) => ArtifactValue::Text(text),
            Self::Metadata(metadata) => ArtifactValue::Metadata(metadata),
            Self::Critique(critique) => ArtifactValue::Critique(critique),
        };
        if value.is_present() {
            Ok(value)
        } else {
            Err(GenerationError::MalformedPayload(format!("{kind} returned an empty payload")))
        }
    }
}

/// The remote generation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Performs one generation call.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(n: u8) -> SceneIndex {
        SceneIndex::new(n).unwrap()
    }

    #[test]
    fn test_request_kind_for_stage() {
        assert_eq!(RequestKind::for_stage(StageKind::KeywordEntry), None);
        assert_eq!(
            RequestKind::for_stage(StageKind::SceneGeneration(scene(1))),
            Some(RequestKind::OpeningScene)
        );
        assert_eq!(
            RequestKind::for_stage(StageKind::SceneGeneration(scene(2))),
            Some(RequestKind::Scene)
        );
        assert_eq!(
            RequestKind::for_stage(StageKind::SceneCritique(scene(1))),
            Some(RequestKind::OpeningCritique)
        );
        assert_eq!(
            RequestKind::for_stage(StageKind::SceneCritique(scene(6))),
            Some(RequestKind::SceneCritique)
        );
    }

    #[test]
    fn test_shape_mismatch_is_malformed() {
        let response = GenerationResponse::Text("not a record".into());
        let err = response.into_artifact(RequestKind::SceneMetadata).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedPayload(_)));
    }

    #[test]
    fn test_empty_text_is_malformed() {
        let err = GenerationResponse::Text("  ".into())
            .into_artifact(RequestKind::Concept)
            .unwrap_err();
        assert!(err.to_string().contains("empty payload"));
    }

    #[test]
    fn test_blank_critique_is_malformed() {
        let err = GenerationResponse::Critique(SceneCritique::default())
            .into_artifact(RequestKind::SceneCritique)
            .unwrap_err();
        assert!(matches!(err, GenerationError::MalformedPayload(_)));
    }

    #[test]
    fn test_matching_shape_converts() {
        let metadata = SceneMetadata {
            summary: "They argue about the lease.".into(),
            ..SceneMetadata::default()
        };
        let value = GenerationResponse::Metadata(metadata.clone())
            .into_artifact(RequestKind::SceneMetadata)
            .unwrap();
        assert_eq!(value.as_metadata(), Some(&metadata));
    }

    #[test]
    fn test_request_debug_redacts_key() {
        let request = GenerationRequest {
            stage: StageKind::ConceptGeneration,
            kind: RequestKind::Concept,
            api_key: "sk-secret".into(),
            context: GenerationContext::new(),
            guidance: None,
        };
        let debug = format!("{request:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_mock_client_returns_configured_response() {
        let mut mock = MockGenerationClient::new();
        mock.expect_generate()
            .withf(|req| req.kind == RequestKind::Concept)
            .times(1)
            .returning(|_| Ok(GenerationResponse::Text("A sitcom about tax auditors".into())));

        let request = GenerationRequest {
            stage: StageKind::ConceptGeneration,
            kind: RequestKind::Concept,
            api_key: "k".into(),
            context: GenerationContext::new(),
            guidance: None,
        };
        let response = mock.generate(request).await.unwrap();
        assert_eq!(response.shape(), ResponseShape::Text);
    }
}
