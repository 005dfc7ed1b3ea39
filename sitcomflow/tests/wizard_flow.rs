//! End-to-end wizard scenarios through the public API.

use pretty_assertions::assert_eq;
use sitcomflow::events;
use sitcomflow::prelude::*;
use sitcomflow::testing::{assert_present, complete_keywords, scene, TestFixture, TEST_API_KEY};

#[tokio::test]
async fn next_walks_from_api_key_to_first_scene() {
    let fixture = TestFixture::new().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());

    fixture.orchestrator.set_api_key(TEST_API_KEY);
    let step = nav.next().await.unwrap();
    assert_eq!(
        step,
        Step::Moved(Transition {
            from: StageKind::ApiKeyEntry,
            to: StageKind::KeywordEntry,
            generated: vec![],
        })
    );

    fixture.orchestrator.set_keywords(complete_keywords());
    let mut generated = Vec::new();
    for _ in 0..3 {
        match nav.next().await.unwrap() {
            Step::Moved(transition) => generated.extend(transition.generated),
            Step::Terminal => panic!("episode ended early"),
        }
    }

    assert_eq!(nav.position(), StageKind::SceneGeneration(scene(1)));
    assert_eq!(
        generated,
        vec![
            StageKind::ConceptGeneration,
            StageKind::OutlineGeneration,
            StageKind::SceneGeneration(scene(1)),
        ]
    );

    let snapshot = fixture.orchestrator.snapshot();
    assert_present(&snapshot, ArtifactKey::Concept);
    assert_present(&snapshot, ArtifactKey::Outline);
    assert_present(&snapshot, ArtifactKey::Scene(scene(1)));
    assert_eq!(snapshot.scene_count(), 1);
    assert_eq!(
        fixture.client.stages(),
        vec![
            StageKind::ConceptGeneration,
            StageKind::OutlineGeneration,
            StageKind::SceneGeneration(scene(1)),
        ]
    );
}

#[tokio::test]
async fn next_generates_missing_upstream_after_failed_auto_trigger() {
    let fixture = TestFixture::with_inputs().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());
    fixture.client.fail_on(StageKind::ConceptGeneration, 1);

    nav.next().await.unwrap();
    let err = nav.next().await.unwrap_err();
    assert_eq!(err.code(), "generation_failure");
    assert_eq!(nav.position(), StageKind::ConceptGeneration);

    let Step::Moved(transition) = nav.next().await.unwrap() else {
        panic!("expected a move");
    };
    assert_eq!(transition.to, StageKind::OutlineGeneration);
    assert_eq!(
        transition.generated,
        vec![StageKind::ConceptGeneration, StageKind::OutlineGeneration]
    );
}

#[tokio::test]
async fn jump_past_written_scenes_is_locked() {
    let fixture = TestFixture::with_inputs().unwrap();
    let orch = &fixture.orchestrator;
    orch.run(StageKind::ConceptGeneration, None).await.unwrap();
    orch.run(StageKind::OutlineGeneration, None).await.unwrap();
    for n in 1..=3 {
        orch.run(StageKind::SceneGeneration(scene(n)), None).await.unwrap();
    }

    let nav = NavigationController::new(orch.clone());
    orch.enter(StageKind::SceneGeneration(scene(2))).await.unwrap();

    let err = nav.jump_to_scene(5).await.unwrap_err();
    assert_eq!(err, WizardError::Locked { stage: StageKind::SceneGeneration(scene(5)) });
    assert_eq!(nav.position(), StageKind::SceneGeneration(scene(2)));

    assert_eq!(nav.jump_to_scene(4).await.unwrap(), EnterOutcome::Entered);
    assert_eq!(nav.position(), StageKind::SceneGeneration(scene(4)));
    assert_eq!(fixture.events.events_of_type(events::NAVIGATION_LOCKED).len(), 1);
}

#[tokio::test]
async fn critique_of_scene_one_reaches_scene_two_request() {
    let fixture = TestFixture::with_inputs().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());
    for _ in 0..4 {
        nav.next().await.unwrap();
    }

    nav.open_critique(1).await.unwrap();
    nav.run(StageKind::SceneCritique(scene(1)), None).await.unwrap();
    let Step::Moved(transition) = nav.next().await.unwrap() else {
        panic!("expected a move");
    };
    assert_eq!(transition.to, StageKind::SceneGeneration(scene(2)));
    // Scene 2 is not auto-triggered.
    assert!(transition.generated.is_empty());

    nav.run(StageKind::SceneGeneration(scene(2)), None).await.unwrap();
    let request = fixture
        .client
        .requests_for(StageKind::SceneGeneration(scene(2)))
        .pop()
        .unwrap();
    assert_eq!(request.kind, RequestKind::Scene);
    assert!(request.context.critique(scene(1)).is_some());
    assert_eq!(request.context.scene(scene(1)), Some("scene_generation(1) output"));
}

#[tokio::test]
async fn regenerating_concept_keeps_downstream_and_marks_it_stale() {
    let fixture = TestFixture::with_inputs().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());
    for _ in 0..4 {
        nav.next().await.unwrap();
    }
    let before = fixture.orchestrator.snapshot();

    nav.regenerate(StageKind::ConceptGeneration, Some("Set it on a cruise ship".into()))
        .await
        .unwrap();

    let after = fixture.orchestrator.snapshot();
    assert_eq!(after.outline(), before.outline());
    assert_eq!(after.scene(scene(1)), before.scene(scene(1)));
    assert_eq!(after.revision(ArtifactKey::Concept), Some(2));
    assert_eq!(
        fixture.orchestrator.stale_artifacts(),
        vec![ArtifactKey::Outline, ArtifactKey::Scene(scene(1))]
    );
}

#[tokio::test]
async fn back_walks_the_branch_link_without_generating() {
    let fixture = TestFixture::with_inputs().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());
    for _ in 0..4 {
        nav.next().await.unwrap();
    }
    let calls = fixture.client.call_count();

    let mut visited = vec![nav.position()];
    while nav.back().await.unwrap() {
        visited.push(nav.position());
    }
    assert_eq!(
        visited,
        vec![
            StageKind::SceneGeneration(scene(1)),
            StageKind::OutlineGeneration,
            StageKind::ConceptGeneration,
            StageKind::KeywordEntry,
            StageKind::ApiKeyEntry,
        ]
    );
    assert_eq!(fixture.client.call_count(), calls);
}

#[tokio::test]
async fn run_left_behind_by_back_still_stores_its_result() {
    let fixture = TestFixture::with_inputs().unwrap();
    let nav = NavigationController::new(fixture.orchestrator.clone());
    for _ in 0..4 {
        nav.next().await.unwrap();
    }

    let metadata = StageKind::SceneMetadata(scene(1));
    let gate = fixture.client.hold(metadata);
    let orchestrator = fixture.orchestrator.clone();
    let pending = tokio::spawn(async move { orchestrator.run(metadata, None).await });
    while fixture.client.requests_for(metadata).is_empty() {
        tokio::task::yield_now().await;
    }

    assert!(nav.back().await.unwrap());
    assert_eq!(nav.position(), StageKind::OutlineGeneration);

    gate.notify_one();
    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome.key, ArtifactKey::SceneMetadata(scene(1)));

    assert_present(&fixture.orchestrator.snapshot(), ArtifactKey::SceneMetadata(scene(1)));
    assert_eq!(nav.position(), StageKind::OutlineGeneration);
}
