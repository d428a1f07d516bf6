//! End-to-end session tests: routing, position persistence and the
//! reconciliation engine lifecycle, all against in-memory doubles.

mod common;

use common::{demo_api, eventually, resolved, submit, within, Harness};
use courseware::adapters::mock::{MockProgress, RecordingCoursewareApi};
use courseware::domain::models::{
    CompletionDisplay, CourseRef, ExternalReason, NavigationPhase, NavigationTarget,
    ProgressSnapshot, Redirect, RouteDecision, SequenceRef, UnitRef,
};
use courseware::DomainError;

fn c1() -> CourseRef {
    CourseRef::new("c1")
}

fn at(sequence: &str, unit: &str) -> NavigationTarget {
    NavigationTarget::unit(c1(), SequenceRef::new(sequence), UnitRef::new(unit))
}

#[tokio::test]
async fn test_course_route_resolves_to_saved_unit() {
    let api = demo_api();
    api.update_sequence(&SequenceRef::new("s1"), |metadata| {
        metadata.sequence.position = Some(1);
    });
    let harness = Harness::new(api);
    let mut session = harness.session();

    let outcome = session
        .route_changed(NavigationTarget::course(c1()))
        .await
        .unwrap();

    assert_eq!(outcome.decision, RouteDecision::Display(UnitRef::new("u2")));
    assert_eq!(outcome.target, at("s1", "u2"));
    assert_eq!(
        harness.navigator.locations(),
        vec!["/course/c1/s1".to_string(), "/course/c1/s1/u2".to_string()]
    );
    assert_eq!(
        session.phase().await,
        Some(NavigationPhase::UnitResolved {
            unit: UnitRef::new("u2")
        })
    );

    eventually(|| !harness.api.saved_positions().is_empty()).await;
    assert_eq!(
        harness.api.saved_positions(),
        vec![(c1(), SequenceRef::new("s1"), 1)]
    );
}

#[tokio::test]
async fn test_stale_saved_position_is_clamped() {
    let api = demo_api();
    api.update_sequence(&SequenceRef::new("s3"), |metadata| {
        metadata.sequence.position = Some(9);
    });
    let harness = Harness::new(api);
    let mut session = harness.session();

    let outcome = session
        .route_changed(NavigationTarget::sequence(c1(), SequenceRef::new("s3")))
        .await
        .unwrap();

    assert_eq!(outcome.displayed_unit(), Some(&UnitRef::new("u6")));
}

#[tokio::test]
async fn test_access_denied_leaves_the_app() {
    let api = demo_api();
    api.update_course(&c1(), |course| course.user_has_access = false);
    let harness = Harness::new(api);
    let mut session = harness.session();

    let outcome = session.route_changed(at("s1", "u1")).await.unwrap();

    let expected = Redirect::External {
        url: "http://localhost:18000/courses/c1/course/".to_string(),
        reason: ExternalReason::AccessDenied,
    };
    assert_eq!(outcome.decision, RouteDecision::Redirect(expected.clone()));
    assert_eq!(harness.navigator.redirects(), vec![expected]);
    assert_eq!(harness.api.sequence_fetches(), 0);
}

#[tokio::test]
async fn test_time_limited_sequence_redirects_before_unit_entry() {
    let api = demo_api();
    api.update_sequence(&SequenceRef::new("s2"), |metadata| {
        metadata.sequence.is_time_limited = true;
        metadata.sequence.lms_web_url = Some("https://lms.example.com/exam/s2".to_string());
    });
    let harness = Harness::new(api);
    let mut session = harness.session();

    let outcome = session
        .route_changed(NavigationTarget::sequence(c1(), SequenceRef::new("s2")))
        .await
        .unwrap();

    assert_eq!(outcome.redirects.len(), 1);
    assert!(outcome.redirects[0].is_terminal());
    assert_eq!(
        harness.navigator.locations(),
        vec!["https://lms.example.com/exam/s2".to_string()]
    );
}

#[tokio::test]
async fn test_empty_course_and_unknown_routes() {
    let api = demo_api();
    api.add_course("c2", &[]);
    api.add_course("c3", &[("empty", &[])]);
    let harness = Harness::new(api);
    let mut session = harness.session();

    let empty = session
        .route_changed(NavigationTarget::course(CourseRef::new("c2")))
        .await
        .unwrap();
    assert_eq!(empty.decision, RouteDecision::EmptyCourse);

    let empty_sequence = session
        .route_changed(NavigationTarget::sequence(
            CourseRef::new("c3"),
            SequenceRef::new("empty"),
        ))
        .await
        .unwrap();
    assert_eq!(empty_sequence.decision, RouteDecision::EmptySequence);

    let unknown_unit = session.route_changed(at("s1", "nope")).await.unwrap();
    assert_eq!(unknown_unit.decision, RouteDecision::NotFound);

    let unknown_sequence = session.route_changed(at("s9", "u1")).await.unwrap();
    assert_eq!(unknown_sequence.decision, RouteDecision::NotFound);

    let unknown_course = session
        .route_changed(NavigationTarget::course(CourseRef::new("missing")))
        .await
        .unwrap();
    assert_eq!(unknown_course.decision, RouteDecision::LoadFailed);
}

#[tokio::test]
async fn test_failed_sequence_load() {
    let api = demo_api();
    api.fail_sequence(&SequenceRef::new("s2"));
    let harness = Harness::new(api);
    let mut session = harness.session();

    let outcome = session.route_changed(at("s2", "u4")).await.unwrap();

    assert_eq!(outcome.decision, RouteDecision::LoadFailed);
    assert_eq!(session.phase().await, Some(NavigationPhase::SequenceFailed));
}

#[tokio::test]
async fn test_unit_change_checks_completion_and_saves_destination() {
    let harness = Harness::new(demo_api());
    harness.api.set_completion(&UnitRef::new("u1"), true);
    let mut session = harness.session();
    session.route_changed(at("s1", "u1")).await.unwrap();

    let outcome = session.on_unit_change(UnitRef::new("u3")).await.unwrap();

    assert_eq!(outcome.displayed_unit(), Some(&UnitRef::new("u3")));
    assert_eq!(harness.api.completion_checks(), 1);
    let state = session.store().snapshot().await;
    assert!(state.unit(&UnitRef::new("u1")).unwrap().complete);
    assert_eq!(state.sequence(&SequenceRef::new("s1")).unwrap().position, Some(2));
    assert_eq!(
        harness.navigator.locations().last(),
        Some(&"/course/c1/s1/u3".to_string())
    );

    eventually(|| harness.api.saved_positions().len() == 2).await;
    assert_eq!(
        harness.api.saved_positions(),
        vec![
            (c1(), SequenceRef::new("s1"), 0),
            (c1(), SequenceRef::new("s1"), 2)
        ]
    );
}

#[tokio::test]
async fn test_redisplaying_a_unit_does_not_save_again() {
    let harness = Harness::new(demo_api());
    let mut session = harness.session();

    session.route_changed(at("s1", "u2")).await.unwrap();
    session.route_changed(at("s1", "u2")).await.unwrap();

    eventually(|| !harness.api.saved_positions().is_empty()).await;
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(harness.api.saved_positions().len(), 1);
}

#[tokio::test]
async fn test_sequence_neighbours() {
    let harness = Harness::new(demo_api());
    let mut session = harness.session();
    session.route_changed(at("s2", "u4")).await.unwrap();

    let next = session.next_sequence().await.unwrap().unwrap();
    assert_eq!(next.target, at("s3", "u5"));

    let back = session.previous_sequence().await.unwrap().unwrap();
    assert_eq!(back.target, at("s2", "u4"));

    let first = session.previous_sequence().await.unwrap().unwrap();
    // Previous lands on the last unit of the preceding sequence
    assert_eq!(first.target, at("s1", "u3"));
    assert!(session.previous_sequence().await.unwrap().is_none());
}

#[tokio::test]
async fn test_next_sequence_is_none_on_last_sequence() {
    let harness = Harness::new(demo_api());
    let mut session = harness.session();
    session.route_changed(at("s3", "u6")).await.unwrap();

    assert!(session.next_sequence().await.unwrap().is_none());
}

#[tokio::test]
async fn test_navigation_without_route_is_rejected() {
    let harness = Harness::new(demo_api());
    let mut session = harness.session();

    assert!(matches!(
        session.next_sequence().await,
        Err(DomainError::NavigationBlocked(_))
    ));
}

#[tokio::test]
async fn test_blocked_redirect_is_surfaced_not_retried() {
    let harness = Harness::new(demo_api());
    harness.navigator.block("navigation cancelled");
    let mut session = harness.session();

    let result = session.route_changed(NavigationTarget::course(c1())).await;

    assert!(matches!(result, Err(DomainError::NavigationBlocked(_))));
    assert!(harness.navigator.redirects().is_empty());
    assert_eq!(harness.api.course_fetches(), 1);
}

#[tokio::test]
async fn test_gated_unit_gets_reconciliation_engine() {
    let harness = Harness::new(demo_api());
    harness.api.gate_unit(&UnitRef::new("u2"));
    harness.progress.set_fallback(MockProgress::passing());
    let mut session = harness.session();

    session.route_changed(at("s1", "u1")).await.unwrap();
    assert!(session.completion_handle().is_none());
    assert_eq!(session.bus().listener_count(), 0);

    session.route_changed(at("s1", "u2")).await.unwrap();
    assert_eq!(session.bus().listener_count(), 1);
    assert_eq!(session.completion_display(), CompletionDisplay::None);

    session.bus().publish(submit(1, true));
    let handle = session.completion_handle().unwrap();
    resolved(handle).await;
    assert_eq!(session.completion_display(), CompletionDisplay::Success);

    session.route_changed(at("s1", "u3")).await.unwrap();
    assert!(session.completion_handle().is_none());
    assert_eq!(session.bus().listener_count(), 0);
    assert_eq!(session.bus().detached_count(), 1);
    assert_eq!(session.completion_display(), CompletionDisplay::None);
}

#[tokio::test]
async fn test_leaving_mid_poll_stops_reconciliation() {
    let harness = Harness::new(demo_api());
    harness.api.gate_unit(&UnitRef::new("u2"));
    let mut session = harness.manual_session();

    session.route_changed(at("s1", "u2")).await.unwrap();
    session.bus().publish(submit(1, true));
    within(harness.manual.wait_for_pending(1)).await;
    let calls = harness.progress.calls();

    session.route_changed(at("s1", "u3")).await.unwrap();
    assert_eq!(harness.manual.pending(), 0);

    harness.manual.release(10);
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(harness.progress.calls(), calls);
}

#[tokio::test]
async fn test_final_exam_title_is_gated() {
    let api = RecordingCoursewareApi::with_course("c1", &[("s1", &["u1"])]);
    api.update_sequence(&SequenceRef::new("s1"), |metadata| {
        metadata.units[0].title = "Final Exam".to_string();
    });
    let harness = Harness::new(api);
    let mut session = harness.session();

    session.route_changed(at("s1", "u1")).await.unwrap();
    assert!(session.completion_handle().is_some());
    session.close().await;
    assert!(session.completion_handle().is_none());
}

#[tokio::test]
async fn test_issued_certificate_shows_success_immediately() {
    let api = demo_api();
    api.update_course(&c1(), |course| course.certificate_available = true);
    api.gate_unit(&UnitRef::new("u1"));
    let harness = Harness::new(api);
    let mut session = harness.session();

    session.route_changed(at("s1", "u1")).await.unwrap();

    assert_eq!(session.completion_display(), CompletionDisplay::Success);
    assert_eq!(
        session.completion_status().unwrap().snapshot,
        Some(ProgressSnapshot::new(false, true))
    );
    assert_eq!(harness.progress.calls(), 0);
}
