//! Navigation over the stage graph.
//!
//! The controller turns user intent (next, back, jump) into orchestrator
//! calls. Moving forward runs whatever generated stages the target is
//! missing; moving back never generates anything.

use crate::core::{SceneIndex, StageKind};
use crate::errors::{WizardError, WizardResult};
use crate::events;
use crate::orchestrator::{EnterOutcome, Orchestrator, StageOutcome};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A completed forward move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Where the move started.
    pub from: StageKind,
    /// Where it ended.
    pub to: StageKind,
    /// Stages generated along the way, in run order.
    pub generated: Vec<StageKind>,
}

/// Result of [`NavigationController::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Position advanced.
    Moved(Transition),
    /// Already at the last stage; nothing changed.
    Terminal,
}

#[derive(Debug, Clone)]
struct FailedRun {
    stage: StageKind,
    guidance: Option<String>,
    regenerate: bool,
    retries: u32,
}

/// Drives the wizard position on behalf of the user.
#[derive(Debug)]
pub struct NavigationController {
    orchestrator: Arc<Orchestrator>,
    last_failure: Mutex<Option<FailedRun>>,
}

impl NavigationController {
    /// Creates a controller for an orchestrator.
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            last_failure: Mutex::new(None),
        }
    }

    /// The orchestrator being driven.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> StageKind {
        self.orchestrator.position()
    }

    /// Advances to the successor of the current stage, generating any
    /// missing upstream output first.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::MissingDependency`] with the position
    /// unchanged when user input is missing, and any failure from the
    /// generations it triggers.
    pub async fn next(&self) -> WizardResult<Step> {
        let from = self.orchestrator.position();
        let Some(target) = self.orchestrator.graph().successor(from) else {
            debug!(stage = %from, "Already at the last stage");
            return Ok(Step::Terminal);
        };

        let chain = self.orchestrator.missing_chain(target)?;
        let mut generated = Vec::with_capacity(chain.len() + 1);
        for stage in chain {
            debug!(stage = %stage, target = %target, "Generating missing dependency");
            let result = self.orchestrator.run(stage, None).await;
            self.record(stage, None, false, &result);
            result?;
            generated.push(stage);
        }

        let outcome = self.orchestrator.enter(target).await;
        if let Err(err) = &outcome {
            if matches!(err, WizardError::GenerationFailure { .. }) {
                self.record_failure(target, None, false);
            }
        }
        if let EnterOutcome::Generated(run) = outcome? {
            self.clear_if(run.stage);
            generated.push(run.stage);
        }

        Ok(Step::Moved(Transition {
            from,
            to: target,
            generated,
        }))
    }

    /// Moves to the predecessor of the current stage. Returns `false` at the
    /// first stage.
    ///
    /// # Errors
    ///
    /// Currently infallible; the result type matches the other moves.
    pub async fn back(&self) -> WizardResult<bool> {
        let from = self.orchestrator.position();
        let Some(target) = self.orchestrator.graph().predecessor(from) else {
            return Ok(false);
        };
        self.orchestrator.reposition(target).await;
        Ok(true)
    }

    /// Moves to scene `n` when its dependencies are present.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::InvalidScene`] outside the episode and
    /// [`WizardError::Locked`], with the position unchanged, when the scene
    /// cannot be entered yet.
    pub async fn jump_to_scene(&self, n: u8) -> WizardResult<EnterOutcome> {
        let index = self.orchestrator.graph().scene(n)?;
        self.gated_enter(StageKind::SceneGeneration(index)).await
    }

    /// Opens the metadata view of scene `n`.
    ///
    /// # Errors
    ///
    /// Same as [`jump_to_scene`](Self::jump_to_scene).
    pub async fn open_metadata(&self, n: u8) -> WizardResult<EnterOutcome> {
        let index = self.orchestrator.graph().scene(n)?;
        self.gated_enter(StageKind::SceneMetadata(index)).await
    }

    /// Opens the writer's room view of scene `n`.
    ///
    /// # Errors
    ///
    /// Same as [`jump_to_scene`](Self::jump_to_scene).
    pub async fn open_critique(&self, n: u8) -> WizardResult<EnterOutcome> {
        let index = self.orchestrator.graph().scene(n)?;
        self.gated_enter(StageKind::SceneCritique(index)).await
    }

    /// Which scenes can be entered right now, for the scene stepper.
    #[must_use]
    pub fn scene_availability(&self) -> Vec<(SceneIndex, bool)> {
        SceneIndex::up_to(self.orchestrator.graph().max_scenes())
            .map(|n| (n, self.orchestrator.can_enter(StageKind::SceneGeneration(n))))
            .collect()
    }

    /// Runs a stage on request, remembering a failure for [`retry`](Self::retry).
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run`].
    pub async fn run(&self, stage: StageKind, guidance: Option<String>) -> WizardResult<StageOutcome> {
        let result = self.orchestrator.run(stage, guidance.clone()).await;
        self.record(stage, guidance, false, &result);
        result
    }

    /// Regenerates a stage on request, remembering a failure for
    /// [`retry`](Self::retry).
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::regenerate`].
    pub async fn regenerate(
        &self,
        stage: StageKind,
        guidance: Option<String>,
    ) -> WizardResult<StageOutcome> {
        let result = self.orchestrator.regenerate(stage, guidance.clone()).await;
        self.record(stage, guidance, true, &result);
        result
    }

    /// The stage whose last generation failed, if any.
    #[must_use]
    pub fn last_failed_stage(&self) -> Option<StageKind> {
        self.last_failure.lock().as_ref().map(|f| f.stage)
    }

    /// Re-runs the last failed generation. Returns `Ok(None)` when nothing
    /// is waiting for a retry.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::RetryExhausted`] once the configured number
    /// of consecutive retries for the stage is spent, and otherwise whatever
    /// the re-run returns.
    pub async fn retry(&self) -> WizardResult<Option<StageOutcome>> {
        let last = self.last_failure.lock().clone();
        let Some(failed) = last else {
            return Ok(None);
        };

        let limit = self.orchestrator.config().max_manual_retries;
        if failed.retries >= limit {
            warn!(stage = %failed.stage, attempts = failed.retries, "Retry budget exhausted");
            return Err(WizardError::RetryExhausted {
                stage: failed.stage,
                attempts: failed.retries,
            });
        }

        info!(stage = %failed.stage, attempt = failed.retries + 1, "Retrying generation");
        let result = if failed.regenerate {
            self.orchestrator
                .regenerate(failed.stage, failed.guidance.clone())
                .await
        } else {
            self.orchestrator.run(failed.stage, failed.guidance.clone()).await
        };

        match result {
            Ok(outcome) => {
                self.clear_if(failed.stage);
                Ok(Some(outcome))
            }
            // Output appeared through another path in the meantime.
            Err(WizardError::AlreadyGenerated { .. }) => {
                self.clear_if(failed.stage);
                Ok(None)
            }
            Err(err) => {
                *self.last_failure.lock() = Some(FailedRun {
                    retries: failed.retries + 1,
                    ..failed
                });
                Err(err)
            }
        }
    }

    async fn gated_enter(&self, stage: StageKind) -> WizardResult<EnterOutcome> {
        if !self.orchestrator.can_enter(stage) {
            info!(stage = %stage, "Navigation target is locked");
            self.orchestrator
                .emit(
                    events::NAVIGATION_LOCKED,
                    json!({
                        "from": self.orchestrator.position().to_string(),
                        "to": stage.to_string(),
                    }),
                )
                .await;
            return Err(WizardError::Locked { stage });
        }

        let result = self.orchestrator.enter(stage).await;
        match &result {
            Ok(EnterOutcome::Generated(run)) => self.clear_if(run.stage),
            Err(WizardError::GenerationFailure { .. }) => self.record_failure(stage, None, false),
            _ => {}
        }
        result
    }

    fn record(
        &self,
        stage: StageKind,
        guidance: Option<String>,
        regenerate: bool,
        result: &WizardResult<StageOutcome>,
    ) {
        match result {
            Ok(_) => self.clear_if(stage),
            Err(WizardError::GenerationFailure { .. }) => {
                self.record_failure(stage, guidance, regenerate);
            }
            Err(_) => {}
        }
    }

    fn record_failure(&self, stage: StageKind, guidance: Option<String>, regenerate: bool) {
        let mut last = self.last_failure.lock();
        // A fresh failure of the same stage keeps its retry count.
        let retries = last
            .as_ref()
            .filter(|f| f.stage == stage)
            .map_or(0, |f| f.retries);
        *last = Some(FailedRun {
            stage,
            guidance,
            regenerate,
            retries,
        });
    }

    fn clear_if(&self, stage: StageKind) {
        let mut last = self.last_failure.lock();
        if last.as_ref().is_some_and(|f| f.stage == stage) {
            *last = None;
        }
    }
}
