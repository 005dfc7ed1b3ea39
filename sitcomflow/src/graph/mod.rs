//! Declarative stage graph.
//!
//! The graph is pure: it knows which artifacts each stage needs, which stage
//! produces each artifact, and how stages link for linear navigation. It
//! never looks at content; callers pass a presence check when they need the
//! graph to reason about a concrete store.

use crate::core::{ArtifactKey, SceneIndex, StageKind};
use crate::errors::{WizardError, WizardResult};
use std::collections::{BTreeSet, HashSet};

/// The wizard's stage graph for an episode of `max_scenes` scenes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageGraph {
    max_scenes: SceneIndex,
}

impl Default for StageGraph {
    fn default() -> Self {
        Self {
            max_scenes: SceneIndex::LAST,
        }
    }
}

impl StageGraph {
    /// Creates a graph for episodes of `max_scenes` scenes.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::InvalidScene`] when `max_scenes` is zero or
    /// above [`crate::core::MAX_SCENES`].
    pub fn new(max_scenes: u8) -> WizardResult<Self> {
        let max_scenes = SceneIndex::new(max_scenes).ok_or(WizardError::InvalidScene {
            index: max_scenes,
            max: SceneIndex::LAST.get(),
        })?;
        Ok(Self { max_scenes })
    }

    /// The last scene of the episode.
    #[must_use]
    pub fn max_scenes(&self) -> SceneIndex {
        self.max_scenes
    }

    /// Resolves a raw scene number against this graph.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::InvalidScene`] outside `1..=max_scenes`.
    pub fn scene(&self, n: u8) -> WizardResult<SceneIndex> {
        SceneIndex::new(n)
            .filter(|index| *index <= self.max_scenes)
            .ok_or(WizardError::InvalidScene {
                index: n,
                max: self.max_scenes.get(),
            })
    }

    /// True when the stage exists in this graph.
    #[must_use]
    pub fn contains(&self, stage: StageKind) -> bool {
        stage.scene().map_or(true, |n| n <= self.max_scenes)
    }

    /// Every stage, in navigation order, with the outline review right after
    /// the outline.
    #[must_use]
    pub fn stages(&self) -> Vec<StageKind> {
        let mut stages = vec![
            StageKind::ApiKeyEntry,
            StageKind::KeywordEntry,
            StageKind::ConceptGeneration,
            StageKind::OutlineGeneration,
            StageKind::OutlineValidation,
        ];
        for n in SceneIndex::up_to(self.max_scenes) {
            stages.push(StageKind::SceneGeneration(n));
            stages.push(StageKind::SceneMetadata(n));
            stages.push(StageKind::SceneCritique(n));
        }
        stages
    }

    /// Artifacts that must be present before `stage` can run or be entered.
    #[must_use]
    pub fn dependencies(&self, stage: StageKind) -> BTreeSet<ArtifactKey> {
        use ArtifactKey as K;

        let keys: &[ArtifactKey] = match stage {
            StageKind::ApiKeyEntry => &[],
            StageKind::KeywordEntry => &[K::ApiKey],
            StageKind::ConceptGeneration => &[K::ApiKey, K::Keywords],
            StageKind::OutlineGeneration => &[K::ApiKey, K::Concept],
            StageKind::OutlineValidation => &[K::ApiKey, K::Concept, K::Outline],
            StageKind::SceneGeneration(n) => match n.prev() {
                Some(prev) => return [K::ApiKey, K::Outline, K::Scene(prev)].into(),
                None => &[K::ApiKey, K::Outline],
            },
            StageKind::SceneMetadata(n) | StageKind::SceneCritique(n) => {
                return [K::ApiKey, K::Outline, K::Scene(n)].into();
            }
        };
        keys.iter().copied().collect()
    }

    /// Context a stage uses when available but does not wait for: the
    /// previous scene's critique when writing scene `n > 1`.
    #[must_use]
    pub fn optional_context(&self, stage: StageKind) -> Option<ArtifactKey> {
        match stage {
            StageKind::SceneGeneration(n) => n.prev().map(ArtifactKey::SceneCritique),
            _ => None,
        }
    }

    /// The artifact slot a stage fills.
    #[must_use]
    pub fn output_key(&self, stage: StageKind) -> ArtifactKey {
        match stage {
            StageKind::ApiKeyEntry => ArtifactKey::ApiKey,
            StageKind::KeywordEntry => ArtifactKey::Keywords,
            StageKind::ConceptGeneration => ArtifactKey::Concept,
            StageKind::OutlineGeneration => ArtifactKey::Outline,
            StageKind::OutlineValidation => ArtifactKey::Validation,
            StageKind::SceneGeneration(n) => ArtifactKey::Scene(n),
            StageKind::SceneMetadata(n) => ArtifactKey::SceneMetadata(n),
            StageKind::SceneCritique(n) => ArtifactKey::SceneCritique(n),
        }
    }

    /// The stage that fills an artifact slot.
    #[must_use]
    pub fn producer(&self, key: ArtifactKey) -> StageKind {
        match key {
            ArtifactKey::ApiKey => StageKind::ApiKeyEntry,
            ArtifactKey::Keywords => StageKind::KeywordEntry,
            ArtifactKey::Concept => StageKind::ConceptGeneration,
            ArtifactKey::Outline => StageKind::OutlineGeneration,
            ArtifactKey::Validation => StageKind::OutlineValidation,
            ArtifactKey::Scene(n) => StageKind::SceneGeneration(n),
            ArtifactKey::SceneMetadata(n) => StageKind::SceneMetadata(n),
            ArtifactKey::SceneCritique(n) => StageKind::SceneCritique(n),
        }
    }

    /// True for stages dispatched to the generation client.
    #[must_use]
    pub fn is_generated(&self, stage: StageKind) -> bool {
        !stage.is_user_entered()
    }

    /// True for stages that generate on first entry when their output is
    /// absent. Everything else waits for an explicit request.
    #[must_use]
    pub fn is_auto_triggered(&self, stage: StageKind) -> bool {
        matches!(
            stage,
            StageKind::ConceptGeneration | StageKind::OutlineGeneration
        ) || stage == StageKind::SceneGeneration(SceneIndex::FIRST)
    }

    /// True for stages that can be the current position. The outline review
    /// is a side pass and never is.
    #[must_use]
    pub fn is_position(&self, stage: StageKind) -> bool {
        stage != StageKind::OutlineValidation && self.contains(stage)
    }

    /// The stage `next` moves to.
    ///
    /// The concept phase ends at the outline and branches into scene 1. Scene
    /// side passes continue to the following scene.
    #[must_use]
    pub fn successor(&self, stage: StageKind) -> Option<StageKind> {
        match stage {
            StageKind::ApiKeyEntry => Some(StageKind::KeywordEntry),
            StageKind::KeywordEntry => Some(StageKind::ConceptGeneration),
            StageKind::ConceptGeneration => Some(StageKind::OutlineGeneration),
            StageKind::OutlineGeneration => Some(StageKind::SceneGeneration(SceneIndex::FIRST)),
            StageKind::OutlineValidation => None,
            StageKind::SceneGeneration(n) | StageKind::SceneMetadata(n) | StageKind::SceneCritique(n) => n
                .next()
                .filter(|next| *next <= self.max_scenes)
                .map(StageKind::SceneGeneration),
        }
    }

    /// The stage `back` moves to. Scene 1 links back to the outline.
    #[must_use]
    pub fn predecessor(&self, stage: StageKind) -> Option<StageKind> {
        match stage {
            StageKind::ApiKeyEntry | StageKind::OutlineValidation => None,
            StageKind::KeywordEntry => Some(StageKind::ApiKeyEntry),
            StageKind::ConceptGeneration => Some(StageKind::KeywordEntry),
            StageKind::OutlineGeneration => Some(StageKind::ConceptGeneration),
            StageKind::SceneGeneration(n) => Some(
                n.prev()
                    .map_or(StageKind::OutlineGeneration, StageKind::SceneGeneration),
            ),
            StageKind::SceneMetadata(n) | StageKind::SceneCritique(n) => {
                Some(StageKind::SceneGeneration(n))
            }
        }
    }

    /// True when the stage has no successor.
    #[must_use]
    pub fn is_terminal(&self, stage: StageKind) -> bool {
        self.is_position(stage) && self.successor(stage).is_none()
    }

    /// Generated stages that must run, dependencies first, before `stage`
    /// can be entered. The chain is linear here, so this is a walk up the
    /// line rather than a full topological sort.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::MissingDependency`] listing user-entered
    /// artifacts that are absent, since no generation can supply those.
    pub fn dependency_chain(
        &self,
        stage: StageKind,
        is_present: impl Fn(ArtifactKey) -> bool,
    ) -> WizardResult<Vec<StageKind>> {
        let mut chain = Vec::new();
        let mut user_missing = Vec::new();
        self.collect_chain(stage, &is_present, &mut chain, &mut user_missing);

        if user_missing.is_empty() {
            Ok(chain)
        } else {
            Err(WizardError::missing(stage, user_missing))
        }
    }

    fn collect_chain(
        &self,
        stage: StageKind,
        is_present: &impl Fn(ArtifactKey) -> bool,
        chain: &mut Vec<StageKind>,
        user_missing: &mut Vec<ArtifactKey>,
    ) {
        for key in self.dependencies(stage) {
            if is_present(key) {
                continue;
            }
            let producer = self.producer(key);
            if producer.is_user_entered() {
                if !user_missing.contains(&key) {
                    user_missing.push(key);
                }
                continue;
            }
            if chain.contains(&producer) {
                continue;
            }
            self.collect_chain(producer, is_present, chain, user_missing);
            chain.push(producer);
        }
    }

    /// Checks that every dependency has a producing stage inside the graph
    /// and that no stage depends on itself, directly or through others.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] describing the first problem found.
    pub fn validate(&self) -> WizardResult<()> {
        let stages = self.stages();
        for stage in &stages {
            for key in self.dependencies(*stage) {
                let producer = self.producer(key);
                if !self.contains(producer) {
                    return Err(WizardError::Config(format!(
                        "{stage} depends on {key} which no stage in the graph produces"
                    )));
                }
            }
        }

        let mut done = HashSet::new();
        for stage in stages {
            let mut path = Vec::new();
            self.detect_cycle(stage, &mut path, &mut done)?;
        }
        Ok(())
    }

    fn detect_cycle(
        &self,
        stage: StageKind,
        path: &mut Vec<StageKind>,
        done: &mut HashSet<StageKind>,
    ) -> WizardResult<()> {
        if done.contains(&stage) {
            return Ok(());
        }
        if path.contains(&stage) {
            path.push(stage);
            let cycle: Vec<String> = path.iter().map(ToString::to_string).collect();
            return Err(WizardError::Config(format!(
                "Cycle detected in stage graph: {}",
                cycle.join(" -> ")
            )));
        }

        path.push(stage);
        for key in self.dependencies(stage) {
            self.detect_cycle(self.producer(key), path, done)?;
        }
        path.pop();
        done.insert(stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scene(n: u8) -> SceneIndex {
        SceneIndex::new(n).unwrap()
    }

    #[test]
    fn test_default_graph_validates() {
        let graph = StageGraph::default();
        assert_eq!(graph.max_scenes(), SceneIndex::LAST);
        assert!(graph.validate().is_ok());
        assert_eq!(graph.stages().len(), 5 + 3 * 20);
    }

    #[test]
    fn test_new_rejects_out_of_range() {
        assert!(StageGraph::new(0).is_err());
        assert!(StageGraph::new(21).is_err());
        assert_eq!(StageGraph::new(4).unwrap().max_scenes(), scene(4));
    }

    #[test]
    fn test_scene_dependencies() {
        let graph = StageGraph::default();
        assert_eq!(
            graph.dependencies(StageKind::SceneGeneration(scene(1))),
            BTreeSet::from([ArtifactKey::ApiKey, ArtifactKey::Outline])
        );
        assert_eq!(
            graph.dependencies(StageKind::SceneGeneration(scene(5))),
            BTreeSet::from([ArtifactKey::ApiKey, ArtifactKey::Outline, ArtifactKey::Scene(scene(4))])
        );
        assert!(graph
            .dependencies(StageKind::SceneCritique(scene(3)))
            .contains(&ArtifactKey::Scene(scene(3))));
    }

    #[test]
    fn test_auto_triggered_stages() {
        let graph = StageGraph::default();
        let auto: Vec<StageKind> = graph
            .stages()
            .into_iter()
            .filter(|s| graph.is_auto_triggered(*s))
            .collect();
        assert_eq!(
            auto,
            vec![
                StageKind::ConceptGeneration,
                StageKind::OutlineGeneration,
                StageKind::SceneGeneration(scene(1)),
            ]
        );
    }

    #[test]
    fn test_branch_link_between_phases() {
        let graph = StageGraph::default();
        assert_eq!(
            graph.successor(StageKind::OutlineGeneration),
            Some(StageKind::SceneGeneration(scene(1)))
        );
        assert_eq!(
            graph.predecessor(StageKind::SceneGeneration(scene(1))),
            Some(StageKind::OutlineGeneration)
        );
    }

    #[test]
    fn test_scene_side_passes_link() {
        let graph = StageGraph::default();
        assert_eq!(
            graph.successor(StageKind::SceneCritique(scene(2))),
            Some(StageKind::SceneGeneration(scene(3)))
        );
        assert_eq!(
            graph.predecessor(StageKind::SceneMetadata(scene(2))),
            Some(StageKind::SceneGeneration(scene(2)))
        );
    }

    #[test]
    fn test_terminal_respects_max_scenes() {
        let graph = StageGraph::new(3).unwrap();
        assert!(graph.is_terminal(StageKind::SceneGeneration(scene(3))));
        assert!(graph.is_terminal(StageKind::SceneCritique(scene(3))));
        assert!(!graph.is_terminal(StageKind::SceneGeneration(scene(2))));
        assert!(!graph.contains(StageKind::SceneGeneration(scene(4))));
        assert!(graph.scene(4).is_err());
    }

    #[test]
    fn test_dependency_chain_walks_back_to_first_missing() {
        let graph = StageGraph::default();
        let present = |key: ArtifactKey| {
            matches!(key, ArtifactKey::ApiKey | ArtifactKey::Keywords | ArtifactKey::Concept | ArtifactKey::Outline)
        };
        let chain = graph
            .dependency_chain(StageKind::SceneGeneration(scene(3)), present)
            .unwrap();
        assert_eq!(
            chain,
            vec![
                StageKind::SceneGeneration(scene(1)),
                StageKind::SceneGeneration(scene(2)),
            ]
        );
    }

    #[test]
    fn test_dependency_chain_reports_user_inputs() {
        let graph = StageGraph::default();
        let err = graph
            .dependency_chain(StageKind::OutlineGeneration, |key| key == ArtifactKey::ApiKey)
            .unwrap_err();
        assert_eq!(
            err,
            WizardError::missing(StageKind::OutlineGeneration, vec![ArtifactKey::Keywords])
        );
    }

    #[test]
    fn test_validation_is_not_a_position() {
        let graph = StageGraph::default();
        assert!(!graph.is_position(StageKind::OutlineValidation));
        assert_eq!(graph.successor(StageKind::OutlineValidation), None);
        assert_eq!(graph.output_key(StageKind::OutlineValidation), ArtifactKey::Validation);
    }
}
