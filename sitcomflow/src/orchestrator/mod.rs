//! The orchestrator: owns the artifact store and runs stages.
//!
//! Every generation goes through [`Orchestrator::run`] or
//! [`Orchestrator::regenerate`]. Both build the request from exactly the
//! artifacts the stage depends on, refuse duplicates of a stage that is
//! already in flight, and only touch the store after a successful call.

mod inflight;

use crate::client::{
    GenerationClient, GenerationContext, GenerationRequest, GenerationResponse, RequestKind,
};
use crate::config::WizardConfig;
use crate::core::{ArtifactKey, KeywordCategory, Keywords, StageKind};
use crate::errors::{GenerationError, WizardError, WizardResult};
use crate::events::{self, EventSink, NoOpEventSink};
use crate::graph::StageGraph;
use crate::observability::StageSpanAttributes;
use crate::store::ArtifactStore;
use crate::utils::elapsed_ms;
use inflight::InFlight;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Result of a successful generation.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutcome {
    /// The stage that ran.
    pub stage: StageKind,
    /// The slot that was written.
    pub key: ArtifactKey,
    /// Revision of the written artifact.
    pub revision: u32,
    /// True when existing output was overwritten.
    pub regenerated: bool,
    /// Wall time of the generation call.
    pub duration_ms: f64,
}

/// What happened when a stage was entered.
#[derive(Debug, Clone, PartialEq)]
pub enum EnterOutcome {
    /// Position moved; nothing was generated.
    Entered,
    /// Position moved and the stage generated its output.
    Generated(StageOutcome),
    /// Position moved; the stage's generation was already running elsewhere.
    InFlight,
}

impl EnterOutcome {
    /// The generation outcome, if one ran.
    #[must_use]
    pub fn generated(&self) -> Option<&StageOutcome> {
        match self {
            Self::Generated(outcome) => Some(outcome),
            Self::Entered | Self::InFlight => None,
        }
    }
}

/// Prepared call, built under the store's read lock.
struct PreparedRun {
    request: GenerationRequest,
    required: BTreeSet<ArtifactKey>,
    built_from: BTreeMap<ArtifactKey, u32>,
}

/// Coordinates stage runs against a single artifact store.
pub struct Orchestrator {
    graph: StageGraph,
    store: RwLock<ArtifactStore>,
    in_flight: InFlight,
    client: Arc<dyn GenerationClient>,
    events: Arc<dyn EventSink>,
    config: WizardConfig,
    session_id: Uuid,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("session_id", &self.session_id)
            .field("graph", &self.graph)
            .field("position", &self.position())
            .field("in_flight", &self.in_flight.stages())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::Config`] or [`WizardError::InvalidScene`] when
    /// the configuration is invalid.
    pub fn new(client: Arc<dyn GenerationClient>, config: WizardConfig) -> WizardResult<Self> {
        config.validate()?;
        let graph = StageGraph::new(config.max_scenes)?;
        graph.validate()?;

        let session_id = Uuid::new_v4();
        debug!(%session_id, max_scenes = config.max_scenes, "Orchestrator created");

        Ok(Self {
            graph,
            store: RwLock::new(ArtifactStore::new()),
            in_flight: InFlight::default(),
            client,
            events: Arc::new(NoOpEventSink),
            config,
            session_id,
        })
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Session identifier attached to spans and events.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The stage graph.
    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    /// The stage the user is viewing.
    #[must_use]
    pub fn position(&self) -> StageKind {
        self.store.read().position()
    }

    /// A copy of the whole store.
    #[must_use]
    pub fn snapshot(&self) -> ArtifactStore {
        self.store.read().clone()
    }

    /// Artifacts whose inputs changed since they were generated.
    #[must_use]
    pub fn stale_artifacts(&self) -> Vec<ArtifactKey> {
        self.store.read().stale_artifacts()
    }

    /// True while a generation call for `stage` is outstanding.
    #[must_use]
    pub fn is_in_flight(&self, stage: StageKind) -> bool {
        self.in_flight.contains(stage)
    }

    /// True when every dependency of `stage` is present.
    #[must_use]
    pub fn can_enter(&self, stage: StageKind) -> bool {
        if !self.graph.contains(stage) {
            return false;
        }
        let store = self.store.read();
        self.graph
            .dependencies(stage)
            .iter()
            .all(|key| store.is_present(*key))
    }

    /// Generated stages that must run before `stage` can be entered,
    /// dependencies first.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::MissingDependency`] when user input is missing.
    pub fn missing_chain(&self, stage: StageKind) -> WizardResult<Vec<StageKind>> {
        let store = self.store.read();
        self.graph
            .dependency_chain(stage, |key| store.is_present(key))
    }

    /// Moves to `stage`, generating its output first-time when the stage is
    /// auto-triggered.
    ///
    /// A generation failure leaves the position at `stage` with its output
    /// still absent.
    ///
    /// # Errors
    ///
    /// Returns [`WizardError::MissingDependency`] without moving when a
    /// dependency is absent, [`WizardError::Locked`] for stages that cannot
    /// be a position, and whatever the auto-triggered run returns.
    pub async fn enter(&self, stage: StageKind) -> WizardResult<EnterOutcome> {
        self.check_in_graph(stage)?;
        if !self.graph.is_position(stage) {
            return Err(WizardError::Locked { stage });
        }

        let from = {
            let mut store = self.store.write();
            let missing = store.missing(&self.graph.dependencies(stage));
            if !missing.is_empty() {
                return Err(WizardError::missing(stage, missing));
            }
            let from = store.position();
            store.set_position(stage);
            from
        };
        self.emit_moved(from, stage).await;

        let needs_generation = self.graph.is_auto_triggered(stage)
            && !self.store.read().is_present(self.graph.output_key(stage));
        if !needs_generation {
            return Ok(EnterOutcome::Entered);
        }
        match self.run(stage, None).await {
            Ok(outcome) => Ok(EnterOutcome::Generated(outcome)),
            Err(WizardError::Busy { .. }) => Ok(EnterOutcome::InFlight),
            Err(err) => Err(err),
        }
    }

    /// Moves to `stage` without dependency checks or generation.
    pub(crate) async fn reposition(&self, stage: StageKind) {
        let from = {
            let mut store = self.store.write();
            let from = store.position();
            store.set_position(stage);
            from
        };
        self.emit_moved(from, stage).await;
    }

    /// Generates the output of `stage`. `guidance` is appended to the request
    /// as free text.
    ///
    /// # Errors
    ///
    /// - [`WizardError::NotGenerated`] for user-entered stages.
    /// - [`WizardError::Busy`] when the same stage is already in flight.
    /// - [`WizardError::MissingDependency`] when a dependency is absent.
    /// - [`WizardError::AlreadyGenerated`] when the output exists.
    /// - [`WizardError::GenerationFailure`] when the call fails; the store is
    ///   unchanged.
    pub async fn run(&self, stage: StageKind, guidance: Option<String>) -> WizardResult<StageOutcome> {
        self.execute(stage, guidance, false).await
    }

    /// Like [`run`](Self::run) but overwrites existing output. Downstream
    /// artifacts are kept and show up in [`stale_artifacts`](Self::stale_artifacts).
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run), minus [`WizardError::AlreadyGenerated`].
    pub async fn regenerate(
        &self,
        stage: StageKind,
        guidance: Option<String>,
    ) -> WizardResult<StageOutcome> {
        self.execute(stage, guidance, true).await
    }

    /// Stores the service credential. Returns the new revision.
    pub fn set_api_key(&self, api_key: impl Into<String>) -> u32 {
        let revision = self.store.write().set_api_key(api_key.into());
        debug!(revision, "API key updated");
        revision
    }

    /// Stores one keyword. Returns the new revision of the keyword set.
    pub fn set_keyword(&self, category: KeywordCategory, value: impl Into<String>) -> u32 {
        let revision = self.store.write().set_keyword(category, value.into());
        debug!(%category, revision, "Keyword updated");
        revision
    }

    /// Replaces the whole keyword set. Returns the new revision.
    pub fn set_keywords(&self, keywords: Keywords) -> u32 {
        let revision = self.store.write().set_keywords(keywords);
        debug!(revision, "Keywords replaced");
        revision
    }

    pub(crate) async fn emit(&self, event_type: &str, fields: Value) {
        self.events
            .emit(event_type, Some(events::payload(self.session_id, fields)))
            .await;
    }

    async fn emit_moved(&self, from: StageKind, to: StageKind) {
        if from == to {
            return;
        }
        info!(from = %from, to = %to, "Position moved");
        self.emit(
            events::NAVIGATION_MOVED,
            json!({"from": from.to_string(), "to": to.to_string()}),
        )
        .await;
    }

    fn check_in_graph(&self, stage: StageKind) -> WizardResult<()> {
        match stage.scene() {
            Some(n) if !self.graph.contains(stage) => Err(WizardError::InvalidScene {
                index: n.get(),
                max: self.graph.max_scenes().get(),
            }),
            _ => Ok(()),
        }
    }

    async fn execute(
        &self,
        stage: StageKind,
        guidance: Option<String>,
        regenerate: bool,
    ) -> WizardResult<StageOutcome> {
        self.check_in_graph(stage)?;
        let kind = RequestKind::for_stage(stage).ok_or(WizardError::NotGenerated { stage })?;

        let Some(_guard) = self.in_flight.acquire(stage) else {
            warn!(stage = %stage, "Refused duplicate run");
            let attrs = StageSpanAttributes::new(stage)
                .with_status("busy")
                .regenerating(regenerate);
            self.emit(events::STAGE_BUSY, attrs.to_fields()).await;
            return Err(WizardError::Busy { stage });
        };

        let span = info_span!(
            "stage_run",
            stage = %stage,
            kind = %kind,
            session_id = %self.session_id,
            regenerate
        );
        self.generate(stage, kind, guidance, regenerate)
            .instrument(span)
            .await
    }

    async fn generate(
        &self,
        stage: StageKind,
        kind: RequestKind,
        guidance: Option<String>,
        regenerate: bool,
    ) -> WizardResult<StageOutcome> {
        let prepared = self.prepare(stage, kind, guidance, regenerate)?;
        let attrs = StageSpanAttributes::new(stage).regenerating(regenerate);

        debug!("Dispatching generation request");
        self.emit(events::STAGE_STARTED, attrs.clone().with_status("started").to_fields())
            .await;

        let started = Instant::now();
        let result = self.call_client(prepared.request).await;
        let duration_ms = elapsed_ms(started);

        let value = match result.and_then(|response| response.into_artifact(kind)) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, duration_ms, "Generation failed");
                let fields = attrs
                    .with_status("failed")
                    .with_duration_ms(duration_ms)
                    .with_error(err.to_string())
                    .to_fields();
                self.emit(events::STAGE_FAILED, fields).await;
                return Err(err.for_stage(stage));
            }
        };

        let key = self.graph.output_key(stage);
        let written = {
            let mut store = self.store.write();
            let missing = store.missing(&prepared.required);
            if missing.is_empty() {
                Ok(store.put(key, value, prepared.built_from))
            } else {
                Err(format!(
                    "inputs were cleared during generation: {}",
                    missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                ))
            }
        };
        let revision = match written {
            Ok(revision) => revision,
            Err(reason) => {
                warn!(%reason, "Discarding generation result");
                let fields = attrs
                    .with_status("failed")
                    .with_duration_ms(duration_ms)
                    .with_error(reason.clone())
                    .to_fields();
                self.emit(events::STAGE_FAILED, fields).await;
                return Err(WizardError::generation(stage, reason));
            }
        };

        info!(revision, duration_ms, "Stage completed");
        let fields = attrs
            .with_status("completed")
            .with_duration_ms(duration_ms)
            .with_revision(revision)
            .to_fields();
        self.emit(events::STAGE_COMPLETED, fields).await;

        Ok(StageOutcome {
            stage,
            key,
            revision,
            regenerated: regenerate,
            duration_ms,
        })
    }

    fn prepare(
        &self,
        stage: StageKind,
        kind: RequestKind,
        guidance: Option<String>,
        regenerate: bool,
    ) -> WizardResult<PreparedRun> {
        let store = self.store.read();
        let dependencies = self.graph.dependencies(stage);

        let missing = store.missing(&dependencies);
        if !missing.is_empty() {
            return Err(WizardError::missing(stage, missing));
        }
        if !regenerate && store.is_present(self.graph.output_key(stage)) {
            return Err(WizardError::AlreadyGenerated { stage });
        }

        let mut context = GenerationContext::new();
        let mut built_from = BTreeMap::new();
        let optional = self
            .graph
            .optional_context(stage)
            .filter(|key| store.is_present(*key));

        // The api key is a credential and is never recorded as provenance.
        for key in dependencies.iter().copied().chain(optional) {
            if key == ArtifactKey::ApiKey {
                continue;
            }
            let Some(entry) = store.get(key) else {
                continue;
            };
            built_from.insert(key, entry.revision);
            context.insert(key, entry.value.clone());
        }

        let api_key = store.api_key().unwrap_or_default().to_string();
        Ok(PreparedRun {
            request: GenerationRequest {
                stage,
                kind,
                api_key,
                context,
                guidance: guidance.filter(|g| !g.trim().is_empty()),
            },
            required: dependencies,
            built_from,
        })
    }

    async fn call_client(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let call = self.client.generate(request);
        match self.config.generation_timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(GenerationError::Timeout(limit))),
            None => call.await,
        }
    }
}
