//! Testing utilities for sitcomflow sessions.
//!
//! This module provides:
//! - A scripted generation client with failure injection and gating
//! - Fixtures for keyword sets and wired-up orchestrators
//! - Assertions over store snapshots and errors

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_absent, assert_generation_failure, assert_missing_dependency, assert_present,
    assert_revision,
};
pub use fixtures::{complete_keywords, scene, TestFixture, TEST_API_KEY};
pub use mocks::ScriptedClient;
