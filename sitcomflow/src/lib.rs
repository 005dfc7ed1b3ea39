//! # Sitcomflow
//!
//! Stage orchestration for a sitcom-script generation wizard.
//!
//! The wizard collects an API key and keywords, then asks a remote service
//! for a concept, a pilot outline and up to twenty dependent scenes, each
//! with optional metadata and writer's room passes. This crate owns:
//!
//! - **Stage graph**: which artifacts each stage needs and how stages link
//! - **Artifact store**: one keyed map of everything generated so far
//! - **Orchestration**: dependency-checked runs with per-stage exclusion
//! - **Navigation**: next, back and jump semantics over the graph
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sitcomflow::prelude::*;
//!
//! let orchestrator = Arc::new(Orchestrator::new(client, WizardConfig::default())?);
//! orchestrator.set_api_key(api_key);
//! orchestrator.set_keywords(keywords);
//!
//! let nav = NavigationController::new(orchestrator.clone());
//! while let Step::Moved(transition) = nav.next().await? {
//!     println!("{} -> {}", transition.from, transition.to);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod client;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod graph;
pub mod navigation;
pub mod observability;
pub mod orchestrator;
pub mod store;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{
        GenerationClient, GenerationContext, GenerationRequest, GenerationResponse, RequestKind,
    };
    pub use crate::config::{LogFormat, WizardConfig};
    pub use crate::core::{
        ArtifactKey, ArtifactValue, CritiqueResult, KeywordCategory, Keywords, Phase,
        SceneCritique, SceneIndex, SceneMetadata, StageKind,
    };
    pub use crate::errors::{GenerationError, WizardError, WizardResult};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::StageGraph;
    pub use crate::navigation::{NavigationController, Step, Transition};
    pub use crate::observability::init_tracing;
    pub use crate::orchestrator::{EnterOutcome, Orchestrator, StageOutcome};
    pub use crate::store::{ArtifactStore, StoredArtifact};
}
