//! Stage identities and scene indices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard upper bound on the number of scenes in an episode.
pub const MAX_SCENES: u8 = 20;

/// A 1-based scene number in `1..=MAX_SCENES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SceneIndex(u8);

impl SceneIndex {
    /// The opening scene.
    pub const FIRST: Self = Self(1);

    /// The last scene an episode can have.
    pub const LAST: Self = Self(MAX_SCENES);

    /// Creates a scene index, returning `None` outside `1..=MAX_SCENES`.
    #[must_use]
    pub const fn new(n: u8) -> Option<Self> {
        if n >= 1 && n <= MAX_SCENES {
            Some(Self(n))
        } else {
            None
        }
    }

    /// Returns the scene number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns true for scene 1.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.0 == 1
    }

    /// The scene before this one, if any.
    #[must_use]
    pub const fn prev(self) -> Option<Self> {
        Self::new(self.0 - 1)
    }

    /// The scene after this one, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::new(self.0 + 1)
    }

    /// Iterates `1..=last`.
    pub fn up_to(last: Self) -> impl Iterator<Item = Self> {
        (1..=last.0).map(Self)
    }
}

impl TryFrom<u8> for SceneIndex {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| format!("scene index {n} outside 1..={MAX_SCENES}"))
    }
}

impl From<SceneIndex> for u8 {
    fn from(index: SceneIndex) -> Self {
        index.0
    }
}

impl fmt::Display for SceneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The phase a stage belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Api key, keywords, concept and outline.
    Concept,
    /// Scene scripts and their side passes.
    Scenes,
}

/// One step of the wizard.
///
/// Scene stages are parameterised by their [`SceneIndex`], so a stage value
/// is also the identity used for the one-in-flight rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// The user enters the credential for the generation service.
    ApiKeyEntry,
    /// The user fills in the four keyword categories.
    KeywordEntry,
    /// Pitch a sitcom concept from the keywords.
    ConceptGeneration,
    /// Outline the pilot episode from the concept.
    OutlineGeneration,
    /// Side pass reviewing the outline against the concept.
    OutlineValidation,
    /// Write the script for one scene.
    SceneGeneration(SceneIndex),
    /// Summarise a written scene into a metadata record.
    SceneMetadata(SceneIndex),
    /// Writer's room critique of a written scene.
    SceneCritique(SceneIndex),
}

impl StageKind {
    /// Returns the phase this stage belongs to.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        match self {
            Self::ApiKeyEntry
            | Self::KeywordEntry
            | Self::ConceptGeneration
            | Self::OutlineGeneration
            | Self::OutlineValidation => Phase::Concept,
            Self::SceneGeneration(_) | Self::SceneMetadata(_) | Self::SceneCritique(_) => {
                Phase::Scenes
            }
        }
    }

    /// Returns the scene index for per-scene stages.
    #[must_use]
    pub const fn scene(&self) -> Option<SceneIndex> {
        match self {
            Self::SceneGeneration(n) | Self::SceneMetadata(n) | Self::SceneCritique(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns true for stages whose content the user types in.
    #[must_use]
    pub const fn is_user_entered(&self) -> bool {
        matches!(self, Self::ApiKeyEntry | Self::KeywordEntry)
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKeyEntry => write!(f, "api_key_entry"),
            Self::KeywordEntry => write!(f, "keyword_entry"),
            Self::ConceptGeneration => write!(f, "concept_generation"),
            Self::OutlineGeneration => write!(f, "outline_generation"),
            Self::OutlineValidation => write!(f, "outline_validation"),
            Self::SceneGeneration(n) => write!(f, "scene_generation({n})"),
            Self::SceneMetadata(n) => write!(f, "scene_metadata({n})"),
            Self::SceneCritique(n) => write!(f, "scene_critique({n})"),
        }
    }
}
