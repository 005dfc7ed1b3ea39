//! The artifact store: every piece of content the wizard has collected.
//!
//! A single keyed map replaces per-stage slots. Each entry remembers a
//! revision number and the revisions of the artifacts it was built from, so
//! callers can see which downstream artifacts went stale after a
//! regeneration. Nothing is ever invalidated automatically.

use crate::core::{
    ArtifactKey, ArtifactValue, KeywordCategory, Keywords, SceneCritique, SceneIndex,
    SceneMetadata, StageKind,
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// An artifact together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// The content.
    pub value: ArtifactValue,
    /// Starts at 1 and increments on every overwrite.
    pub revision: u32,
    /// Revisions of the upstream artifacts this one was built from.
    pub built_from: BTreeMap<ArtifactKey, u32>,
}

/// Session state of the wizard.
///
/// Owned by the orchestrator; everything outside the crate sees it through
/// read-only snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    entries: BTreeMap<ArtifactKey, StoredArtifact>,
    position: StageKind,
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactStore {
    /// Creates an empty store positioned at the first stage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            position: StageKind::ApiKeyEntry,
        }
    }

    /// The stage the user is viewing.
    #[must_use]
    pub fn position(&self) -> StageKind {
        self.position
    }

    pub(crate) fn set_position(&mut self, stage: StageKind) {
        self.position = stage;
    }

    /// Returns the entry for a key.
    #[must_use]
    pub fn get(&self, key: ArtifactKey) -> Option<&StoredArtifact> {
        self.entries.get(&key)
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn value(&self, key: ArtifactKey) -> Option<&ArtifactValue> {
        self.entries.get(&key).map(|entry| &entry.value)
    }

    /// Current revision of a key.
    #[must_use]
    pub fn revision(&self, key: ArtifactKey) -> Option<u32> {
        self.entries.get(&key).map(|entry| entry.revision)
    }

    /// True when the key holds a usable (non-empty) value.
    #[must_use]
    pub fn is_present(&self, key: ArtifactKey) -> bool {
        self.value(key).is_some_and(ArtifactValue::is_present)
    }

    /// The subset of `keys` that are not present, in iteration order.
    #[must_use]
    pub fn missing<'a>(&self, keys: impl IntoIterator<Item = &'a ArtifactKey>) -> Vec<ArtifactKey> {
        keys.into_iter()
            .filter(|key| !self.is_present(**key))
            .copied()
            .collect()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates stored keys in order.
    pub fn keys(&self) -> impl Iterator<Item = ArtifactKey> + '_ {
        self.entries.keys().copied()
    }

    /// The service credential, if entered.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.value(ArtifactKey::ApiKey).and_then(ArtifactValue::as_text)
    }

    /// The keyword set, complete or not.
    #[must_use]
    pub fn keywords(&self) -> Option<&Keywords> {
        self.value(ArtifactKey::Keywords).and_then(ArtifactValue::as_keywords)
    }

    /// The sitcom concept.
    #[must_use]
    pub fn concept(&self) -> Option<&str> {
        self.value(ArtifactKey::Concept).and_then(ArtifactValue::as_text)
    }

    /// The pilot outline.
    #[must_use]
    pub fn outline(&self) -> Option<&str> {
        self.value(ArtifactKey::Outline).and_then(ArtifactValue::as_text)
    }

    /// The outline review.
    #[must_use]
    pub fn validation(&self) -> Option<&str> {
        self.value(ArtifactKey::Validation).and_then(ArtifactValue::as_text)
    }

    /// Script of scene `n`.
    #[must_use]
    pub fn scene(&self, n: SceneIndex) -> Option<&str> {
        self.value(ArtifactKey::Scene(n)).and_then(ArtifactValue::as_text)
    }

    /// Metadata of scene `n`.
    #[must_use]
    pub fn scene_metadata(&self, n: SceneIndex) -> Option<&SceneMetadata> {
        self.value(ArtifactKey::SceneMetadata(n))
            .and_then(ArtifactValue::as_metadata)
    }

    /// Critique of scene `n`.
    #[must_use]
    pub fn scene_critique(&self, n: SceneIndex) -> Option<&SceneCritique> {
        self.value(ArtifactKey::SceneCritique(n))
            .and_then(ArtifactValue::as_critique)
    }

    /// Number of written scenes. Scenes are contiguous from 1, so this is
    /// also the index of the last one.
    #[must_use]
    pub fn scene_count(&self) -> usize {
        self.entries
            .keys()
            .filter(|key| matches!(key, ArtifactKey::Scene(_)))
            .count()
    }

    /// Writes a value, bumping its revision. Returns the new revision.
    pub(crate) fn put(
        &mut self,
        key: ArtifactKey,
        value: ArtifactValue,
        built_from: BTreeMap<ArtifactKey, u32>,
    ) -> u32 {
        let revision = self.revision(key).map_or(1, |r| r + 1);
        debug!(key = %key, revision, "Storing artifact");
        self.entries.insert(
            key,
            StoredArtifact {
                value,
                revision,
                built_from,
            },
        );
        revision
    }

    /// Writes a user-entered value. An unchanged value keeps its revision.
    fn put_input(&mut self, key: ArtifactKey, value: ArtifactValue) -> u32 {
        match self.entries.get(&key) {
            Some(entry) if entry.value == value => entry.revision,
            _ => self.put(key, value, BTreeMap::new()),
        }
    }

    pub(crate) fn set_api_key(&mut self, api_key: String) -> u32 {
        self.put_input(ArtifactKey::ApiKey, ArtifactValue::Text(api_key))
    }

    pub(crate) fn set_keyword(&mut self, category: KeywordCategory, value: String) -> u32 {
        let mut keywords = self.keywords().cloned().unwrap_or_default();
        keywords.set(category, value);
        self.set_keywords(keywords)
    }

    pub(crate) fn set_keywords(&mut self, keywords: Keywords) -> u32 {
        self.put_input(ArtifactKey::Keywords, ArtifactValue::Keywords(keywords))
    }

    /// Keys whose upstream changed since they were generated, directly or
    /// through another stale artifact.
    #[must_use]
    pub fn stale_artifacts(&self) -> Vec<ArtifactKey> {
        let mut memo = HashMap::new();
        self.entries
            .keys()
            .filter(|key| self.is_stale(**key, &mut memo))
            .copied()
            .collect()
    }

    fn is_stale(&self, key: ArtifactKey, memo: &mut HashMap<ArtifactKey, bool>) -> bool {
        if let Some(known) = memo.get(&key) {
            return *known;
        }
        // Provisional answer guards against malformed self-references.
        memo.insert(key, false);

        let stale = self.entries.get(&key).is_some_and(|entry| {
            entry.built_from.iter().any(|(upstream, rev)| {
                self.revision(*upstream) != Some(*rev) || self.is_stale(*upstream, memo)
            })
        });
        memo.insert(key, stale);
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> ArtifactValue {
        ArtifactValue::Text(s.to_string())
    }

    fn deps(store: &ArtifactStore, keys: &[ArtifactKey]) -> BTreeMap<ArtifactKey, u32> {
        keys.iter()
            .filter_map(|k| store.revision(*k).map(|r| (*k, r)))
            .collect()
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ArtifactStore::new();
        assert!(store.is_empty());
        assert_eq!(store.position(), StageKind::ApiKeyEntry);
        assert_eq!(store.scene_count(), 0);
    }

    #[test]
    fn test_put_bumps_revision() {
        let mut store = ArtifactStore::new();
        assert_eq!(store.put(ArtifactKey::Concept, text("a"), BTreeMap::new()), 1);
        assert_eq!(store.put(ArtifactKey::Concept, text("b"), BTreeMap::new()), 2);
        assert_eq!(store.concept(), Some("b"));
    }

    #[test]
    fn test_blank_text_is_not_present() {
        let mut store = ArtifactStore::new();
        store.set_api_key("   ".to_string());
        assert!(!store.is_present(ArtifactKey::ApiKey));
        store.set_api_key("sk-test".to_string());
        assert!(store.is_present(ArtifactKey::ApiKey));
    }

    #[test]
    fn test_keywords_present_only_when_complete() {
        let mut store = ArtifactStore::new();
        store.set_keyword(KeywordCategory::Setting, "a ferry".into());
        store.set_keyword(KeywordCategory::Characters, "a captain".into());
        store.set_keyword(KeywordCategory::Themes, "routine".into());
        assert!(!store.is_present(ArtifactKey::Keywords));
        store.set_keyword(KeywordCategory::ToneGenre, "dry".into());
        assert!(store.is_present(ArtifactKey::Keywords));
        assert_eq!(store.keywords().unwrap().get(KeywordCategory::Setting), Some("a ferry"));
    }

    #[test]
    fn test_missing_preserves_order() {
        let mut store = ArtifactStore::new();
        store.put(ArtifactKey::Outline, text("o"), BTreeMap::new());
        let s1 = SceneIndex::FIRST;
        let keys = [ArtifactKey::Concept, ArtifactKey::Outline, ArtifactKey::Scene(s1)];
        assert_eq!(store.missing(&keys), vec![ArtifactKey::Concept, ArtifactKey::Scene(s1)]);
    }

    #[test]
    fn test_stale_propagates_transitively() {
        let mut store = ArtifactStore::new();
        store.put(ArtifactKey::Concept, text("c1"), BTreeMap::new());
        let d = deps(&store, &[ArtifactKey::Concept]);
        store.put(ArtifactKey::Outline, text("o1"), d);
        let d = deps(&store, &[ArtifactKey::Outline]);
        store.put(ArtifactKey::Scene(SceneIndex::FIRST), text("s1"), d);

        assert!(store.stale_artifacts().is_empty());

        store.put(ArtifactKey::Concept, text("c2"), BTreeMap::new());
        assert_eq!(
            store.stale_artifacts(),
            vec![ArtifactKey::Outline, ArtifactKey::Scene(SceneIndex::FIRST)]
        );
        // Content is kept as-is.
        assert_eq!(store.outline(), Some("o1"));
    }

    #[test]
    fn test_keyword_edit_marks_concept_stale() {
        let mut store = ArtifactStore::new();
        store.set_keywords(
            Keywords::new()
                .with(KeywordCategory::Setting, "s")
                .with(KeywordCategory::Characters, "c")
                .with(KeywordCategory::Themes, "t")
                .with(KeywordCategory::ToneGenre, "g"),
        );
        let d = deps(&store, &[ArtifactKey::Keywords]);
        store.put(ArtifactKey::Concept, text("c1"), d);
        assert!(store.stale_artifacts().is_empty());

        store.set_keyword(KeywordCategory::Themes, "change".into());
        assert_eq!(store.stale_artifacts(), vec![ArtifactKey::Concept]);
    }

    #[test]
    fn test_unchanged_input_keeps_revision() {
        let mut store = ArtifactStore::new();
        assert_eq!(store.set_api_key("sk-test".into()), 1);
        assert_eq!(store.set_api_key("sk-test".into()), 1);
        assert_eq!(store.set_keyword(KeywordCategory::Setting, "a ferry".into()), 1);
        assert_eq!(store.set_keyword(KeywordCategory::Setting, "a ferry".into()), 1);
        assert_eq!(store.set_keyword(KeywordCategory::Setting, "a barge".into()), 2);
        assert_eq!(store.set_api_key("sk-other".into()), 2);
    }

    #[test]
    fn test_retyped_keyword_leaves_concept_fresh() {
        let mut store = ArtifactStore::new();
        store.set_keywords(
            Keywords::new()
                .with(KeywordCategory::Setting, "s")
                .with(KeywordCategory::Characters, "c")
                .with(KeywordCategory::Themes, "t")
                .with(KeywordCategory::ToneGenre, "g"),
        );
        let d = deps(&store, &[ArtifactKey::Keywords]);
        store.put(ArtifactKey::Concept, text("c1"), d);

        store.set_keyword(KeywordCategory::Themes, "t".into());
        assert!(store.stale_artifacts().is_empty());
    }
}
