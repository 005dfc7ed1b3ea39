//! Ready-made inputs and orchestrators for tests.

use std::sync::Arc;

use crate::config::WizardConfig;
use crate::core::{KeywordCategory, Keywords, SceneIndex};
use crate::errors::WizardResult;
use crate::events::CollectingEventSink;
use crate::orchestrator::Orchestrator;

use super::ScriptedClient;

/// API key used by fixtures.
pub const TEST_API_KEY: &str = "sk-test-key";

/// A keyword set with every category filled.
#[must_use]
pub fn complete_keywords() -> Keywords {
    Keywords::new()
        .with(KeywordCategory::Setting, "a failing bowling alley")
        .with(KeywordCategory::Characters, "an overconfident manager, his sister")
        .with(KeywordCategory::Themes, "family business, small victories")
        .with(KeywordCategory::ToneGenre, "warm workplace comedy")
}

/// Shorthand for scene `n`. Panics outside `1..=20`.
#[must_use]
pub fn scene(n: u8) -> SceneIndex {
    match SceneIndex::new(n) {
        Some(index) => index,
        None => panic!("scene {n} is out of range"),
    }
}

/// An orchestrator wired to a scripted client and a collecting sink.
pub struct TestFixture {
    /// The orchestrator under test.
    pub orchestrator: Arc<Orchestrator>,
    /// The scripted client it calls.
    pub client: Arc<ScriptedClient>,
    /// Events it emitted.
    pub events: Arc<CollectingEventSink>,
}

impl TestFixture {
    /// Creates a fixture with default configuration and an empty store.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn with_config(config: WizardConfig) -> WizardResult<Self> {
        let client = Arc::new(ScriptedClient::new());
        let events = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::new(client.clone(), config)?
            .with_event_sink(events.clone());
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            client,
            events,
        })
    }

    /// Creates a fixture with default configuration.
    ///
    /// # Errors
    ///
    /// Never fails with the default configuration.
    pub fn new() -> WizardResult<Self> {
        Self::with_config(WizardConfig::default())
    }

    /// Creates a fixture with the api key and all keywords already entered.
    ///
    /// # Errors
    ///
    /// Never fails with the default configuration.
    pub fn with_inputs() -> WizardResult<Self> {
        let fixture = Self::new()?;
        fixture.orchestrator.set_api_key(TEST_API_KEY);
        fixture.orchestrator.set_keywords(complete_keywords());
        Ok(fixture)
    }
}
