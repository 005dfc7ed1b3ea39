//! Artifact keys and the values stored under them.

use super::stage::SceneIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One of the four keyword categories the user fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordCategory {
    /// Settings and locations.
    Setting,
    /// Main characters.
    Characters,
    /// Themes and ideas.
    Themes,
    /// Tone or genre.
    ToneGenre,
}

impl KeywordCategory {
    /// All categories, in the order the wizard asks for them.
    pub const ALL: [Self; 4] = [Self::Setting, Self::Characters, Self::Themes, Self::ToneGenre];
}

impl fmt::Display for KeywordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setting => write!(f, "setting"),
            Self::Characters => write!(f, "characters"),
            Self::Themes => write!(f, "themes"),
            Self::ToneGenre => write!(f, "tone_genre"),
        }
    }
}

/// Keyword text per category. Values are free text (usually comma separated).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keywords(BTreeMap<KeywordCategory, String>);

impl Keywords {
    /// Creates an empty keyword set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one category, builder style.
    #[must_use]
    pub fn with(mut self, category: KeywordCategory, value: impl Into<String>) -> Self {
        self.set(category, value);
        self
    }

    /// Sets one category.
    pub fn set(&mut self, category: KeywordCategory, value: impl Into<String>) {
        self.0.insert(category, value.into());
    }

    /// Returns the text for a category.
    #[must_use]
    pub fn get(&self, category: KeywordCategory) -> Option<&str> {
        self.0.get(&category).map(String::as_str)
    }

    /// Categories that are missing or blank.
    #[must_use]
    pub fn missing(&self) -> Vec<KeywordCategory> {
        KeywordCategory::ALL
            .into_iter()
            .filter(|c| self.get(*c).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }

    /// True when every category has non-blank text.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Iterates the filled categories.
    pub fn iter(&self) -> impl Iterator<Item = (KeywordCategory, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }
}

/// Summary record extracted from a written scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneMetadata {
    /// Short prose summary.
    pub summary: String,
    /// Characters appearing in the scene.
    pub characters: String,
    /// Where the scene takes place.
    pub location: String,
    /// Running gag carried through the scene.
    pub recurring_joke: String,
    /// Dominant emotional tone.
    pub emotional_tone: String,
}

impl SceneMetadata {
    /// True when no field carries any text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        [
            &self.summary,
            &self.characters,
            &self.location,
            &self.recurring_joke,
            &self.emotional_tone,
        ]
        .iter()
        .all(|s| s.trim().is_empty())
    }
}

/// Feedback along one critique axis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritiqueResult {
    /// Consistency verdict. The environment axis does not give one.
    #[serde(default)]
    pub is_consistent: Option<bool>,
    /// Analysis or explanation text.
    #[serde(default)]
    pub explanation: String,
    /// Suggested changes.
    #[serde(default)]
    pub recommendations: String,
    /// Reasoning trace of the reviewer.
    #[serde(default)]
    pub thoughts: Vec<String>,
    /// Scene transition check (environment axis).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

impl CritiqueResult {
    /// True when the axis carries no verdict and no text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.is_consistent.is_none()
            && self.explanation.trim().is_empty()
            && self.recommendations.trim().is_empty()
            && self.thoughts.iter().all(|t| t.trim().is_empty())
            && !self.transition.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

/// Writer's room output for one scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneCritique {
    /// Character consistency.
    pub character: CritiqueResult,
    /// Comedic consistency.
    pub comedic: CritiqueResult,
    /// Setting and continuity.
    pub environment: CritiqueResult,
}

impl SceneCritique {
    /// True when all three axes are blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.character.is_blank() && self.comedic.is_blank() && self.environment.is_blank()
    }
}

/// The slot an artifact occupies in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKey {
    /// Credential for the generation service.
    ApiKey,
    /// The four keyword categories.
    Keywords,
    /// Sitcom concept text.
    Concept,
    /// Pilot episode outline text.
    Outline,
    /// Outline review text.
    Validation,
    /// Script for one scene.
    Scene(SceneIndex),
    /// Metadata for one scene.
    SceneMetadata(SceneIndex),
    /// Critique for one scene.
    SceneCritique(SceneIndex),
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey => write!(f, "api_key"),
            Self::Keywords => write!(f, "keywords"),
            Self::Concept => write!(f, "concept"),
            Self::Outline => write!(f, "outline"),
            Self::Validation => write!(f, "validation"),
            Self::Scene(n) => write!(f, "scenes[{n}]"),
            Self::SceneMetadata(n) => write!(f, "scene_metadata[{n}]"),
            Self::SceneCritique(n) => write!(f, "scene_critique[{n}]"),
        }
    }
}

/// A value held in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArtifactValue {
    /// Free text (api key, concept, outline, validation, scene script).
    Text(String),
    /// Keyword set.
    Keywords(Keywords),
    /// Scene metadata record.
    Metadata(SceneMetadata),
    /// Scene critique record.
    Critique(SceneCritique),
}

impl ArtifactValue {
    /// True when the value satisfies a dependency: non-blank text, a
    /// complete keyword set, or a record with content.
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            Self::Text(text) => !text.trim().is_empty(),
            Self::Keywords(keywords) => keywords.is_complete(),
            Self::Metadata(metadata) => !metadata.is_blank(),
            Self::Critique(critique) => !critique.is_blank(),
        }
    }

    /// Returns the text, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the keyword set, if this is one.
    #[must_use]
    pub fn as_keywords(&self) -> Option<&Keywords> {
        match self {
            Self::Keywords(keywords) => Some(keywords),
            _ => None,
        }
    }

    /// Returns the metadata record, if this is one.
    #[must_use]
    pub fn as_metadata(&self) -> Option<&SceneMetadata> {
        match self {
            Self::Metadata(metadata) => Some(metadata),
            _ => None,
        }
    }

    /// Returns the critique record, if this is one.
    #[must_use]
    pub fn as_critique(&self) -> Option<&SceneCritique> {
        match self {
            Self::Critique(critique) => Some(critique),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_completeness() {
        let mut keywords = Keywords::new()
            .with(KeywordCategory::Setting, "a lighthouse")
            .with(KeywordCategory::Characters, "two keepers")
            .with(KeywordCategory::Themes, "isolation");
        assert_eq!(keywords.missing(), vec![KeywordCategory::ToneGenre]);
        assert!(!keywords.is_complete());

        keywords.set(KeywordCategory::ToneGenre, "   ");
        assert!(!keywords.is_complete());

        keywords.set(KeywordCategory::ToneGenre, "deadpan");
        assert!(keywords.is_complete());
    }

    #[test]
    fn test_value_presence() {
        assert!(!ArtifactValue::Text("  \n".into()).is_present());
        assert!(ArtifactValue::Text("INT. DINER".into()).is_present());
        assert!(!ArtifactValue::Metadata(SceneMetadata::default()).is_present());
        assert!(!ArtifactValue::Critique(SceneCritique::default()).is_present());

        let critique = SceneCritique {
            comedic: CritiqueResult {
                is_consistent: Some(false),
                ..CritiqueResult::default()
            },
            ..SceneCritique::default()
        };
        assert!(ArtifactValue::Critique(critique).is_present());
    }

    #[test]
    fn test_critique_deserialize_without_verdict() {
        let json = r#"{"explanation": "walls move", "recommendations": "", "thoughts": ["t1"], "transition": "ok"}"#;
        let result: CritiqueResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.is_consistent, None);
        assert_eq!(result.transition.as_deref(), Some("ok"));
        assert_eq!(result.thoughts.len(), 1);
    }

    #[test]
    fn test_artifact_key_ordering_groups_by_kind() {
        let s1 = SceneIndex::FIRST;
        let s2 = SceneIndex::new(2).unwrap();
        assert!(ArtifactKey::Outline < ArtifactKey::Scene(s1));
        assert!(ArtifactKey::Scene(s1) < ArtifactKey::Scene(s2));
        assert_eq!(ArtifactKey::SceneMetadata(s2).to_string(), "scene_metadata[2]");
    }
}
