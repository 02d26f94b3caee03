//! Integration tests for the bulk orchestrator run loop.
//!
//! Every test drives a real run against the mock platform and asserts on
//! the final report, the recorded client calls, and the event stream.

mod mocks;

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use tokio::sync::broadcast;

use roster_core::client::{GrantError, PlatformClient};
use roster_core::events::{PublishedEvent, RunEvent};
use roster_core::orchestration::{
    ActionResult, BulkOrchestrator, PacingPolicy, RunOutcome, RunRegistry, SpawnError, Target,
};
use roster_core::session::{AuthorizationState, SessionStore};

use mocks::mock_platform::{test_identity, MockPlatform};

fn targets(names: &[&str]) -> Vec<Target> {
    names.iter().map(|name| Target::new(*name)).collect()
}

fn drain_events(rx: &mut broadcast::Receiver<PublishedEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(published) = rx.try_recv() {
        events.push(published.event);
    }
    events
}

fn store_with_session(label: &str) -> (tempfile::TempDir, Arc<SessionStore>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
    std::fs::write(
        dir.path().join("sessions").join(format!("{label}.session")),
        b"opaque",
    )
    .unwrap();
    let store = Arc::new(SessionStore::new(dir.path()));
    (dir, store)
}

#[tokio::test]
async fn test_run_skips_existing_members_and_grants_the_rest() {
    let mock = Arc::new(MockPlatform::new().with_members(&["a"]));
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);
    let mut rx = orchestrator.subscribe();

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c"]),
            PacingPolicy::immediate(2),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.tally.successful, 2);
    assert_eq!(report.tally.skipped, 1);
    assert_eq!(report.tally.failed, 0);

    // The existing member never reaches the platform
    assert_eq!(mock.get_state().grant_calls, vec!["b", "c"]);

    let events = drain_events(&mut rx);
    let skips: Vec<_> = events
        .iter()
        .filter(|event| {
            matches!(
                event,
                RunEvent::TargetProcessed {
                    result: ActionResult::SkippedAlreadyMember,
                    ..
                }
            )
        })
        .collect();
    assert_eq!(skips.len(), 1);
    assert!(matches!(
        skips[0],
        RunEvent::TargetProcessed { target, .. } if target.as_str() == "a"
    ));
}

#[tokio::test]
async fn test_membership_comparison_is_case_insensitive() {
    let mock = Arc::new(MockPlatform::new().with_members(&["@SomeUser"]));
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["someuser", "other"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.tally.skipped, 1);
    assert_eq!(report.tally.successful, 1);
    assert_eq!(mock.get_state().grant_calls, vec!["other"]);
}

#[tokio::test]
async fn test_fatal_failure_halts_the_run() {
    let mock = Arc::new(
        MockPlatform::new()
            .with_members(&["a"])
            .with_grant_failure(
                "b",
                GrantError::InsufficientPrivilege("cannot assign roles".to_string()),
            ),
    );
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c"]),
            PacingPolicy::immediate(2),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByFatalError);
    assert_eq!(report.tally.successful, 0);
    assert_eq!(report.tally.skipped, 1);
    assert_eq!(report.tally.failed, 1);

    // Target after the fatal failure is never attempted
    assert_eq!(mock.get_state().grant_calls, vec!["b"]);
}

#[tokio::test]
async fn test_cool_down_signal_is_fatal() {
    let mock = Arc::new(MockPlatform::new().with_grant_failure(
        "a",
        GrantError::Rpc("user was recently authorized, wait of 86400 seconds".to_string()),
    ));
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByFatalError);
    assert_eq!(report.tally.failed, 1);
    assert_eq!(mock.get_state().grant_calls, vec!["a"]);
}

#[tokio::test]
async fn test_recoverable_failures_do_not_halt_the_run() {
    let mock = Arc::new(MockPlatform::new().with_grant_failure(
        "b",
        GrantError::TargetRejected("privacy settings forbid invites".to_string()),
    ));
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.tally.successful, 2);
    assert_eq!(report.tally.failed, 1);
    assert_eq!(mock.get_state().grant_calls, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_resolution_failure_aborts_before_any_target() {
    let mock = Arc::new(MockPlatform::new().with_resolution_failure());
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "https://t.me/nowhere",
            &targets(&["a", "b"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByFatalError);
    assert_eq!(report.tally, Default::default());

    let state = mock.get_state();
    assert_eq!(state.list_calls, 0);
    assert!(state.grant_calls.is_empty());
}

#[tokio::test]
async fn test_listing_failure_aborts_before_any_target() {
    let mock = Arc::new(MockPlatform::new().with_listing_failure());
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByFatalError);
    assert_eq!(report.tally, Default::default());
    assert!(mock.get_state().grant_calls.is_empty());
}

#[tokio::test]
async fn test_stop_before_processing_yields_empty_tally() {
    let mock = Arc::new(MockPlatform::new());
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);
    orchestrator.stop_token().request_stop();

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByCaller);
    assert_eq!(report.tally, Default::default());

    // Not even destination resolution is attempted
    let state = mock.get_state();
    assert!(state.resolve_calls.is_empty());
    assert!(state.grant_calls.is_empty());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_reaches_100_on_completion() {
    let mock = Arc::new(MockPlatform::new());
    let orchestrator = BulkOrchestrator::new(mock as Arc<dyn PlatformClient>);
    let mut rx = orchestrator.subscribe();

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c", "d"]),
            PacingPolicy::immediate(10),
        )
        .await;
    assert_eq!(report.outcome, RunOutcome::Completed);

    let percents: Vec<u8> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            RunEvent::Progress { percent } => Some(percent),
            _ => None,
        })
        .collect();

    assert_eq!(percents.len(), 4);
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(*percents.last().unwrap(), 100);
}

#[tokio::test]
async fn test_batch_pause_fires_on_every_boundary_with_targets_remaining() {
    let mock = Arc::new(MockPlatform::new());
    let orchestrator = BulkOrchestrator::new(mock as Arc<dyn PlatformClient>);
    let mut rx = orchestrator.subscribe();

    orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c", "d", "e"]),
            PacingPolicy::immediate(2),
        )
        .await;

    let boundaries: Vec<usize> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            RunEvent::BatchPause {
                after_processed, ..
            } => Some(after_processed),
            _ => None,
        })
        .collect();

    assert_eq!(boundaries, vec![2, 4]);
}

#[tokio::test]
async fn test_skipped_targets_count_toward_the_batch_boundary() {
    let mock = Arc::new(MockPlatform::new().with_members(&["a", "b"]));
    let orchestrator = BulkOrchestrator::new(mock as Arc<dyn PlatformClient>);
    let mut rx = orchestrator.subscribe();

    orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &targets(&["a", "b", "c", "d"]),
            PacingPolicy::immediate(2),
        )
        .await;

    let boundaries: Vec<usize> = drain_events(&mut rx)
        .into_iter()
        .filter_map(|event| match event {
            RunEvent::BatchPause {
                after_processed, ..
            } => Some(after_processed),
            _ => None,
        })
        .collect();

    // Two skips land exactly on the first boundary; the final target closes
    // the run so no pause follows it
    assert_eq!(boundaries, vec![2]);
}

#[tokio::test]
async fn test_empty_target_list_completes_immediately() {
    let mock = Arc::new(MockPlatform::new());
    let orchestrator = BulkOrchestrator::new(mock as Arc<dyn PlatformClient>);

    let report = orchestrator
        .run(
            &test_identity("acct"),
            "@mychannel",
            &[],
            PacingPolicy::immediate(10),
        )
        .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.tally, Default::default());
}

#[tokio::test]
async fn test_spawn_enforces_one_run_per_identity() {
    let (_dir, store) = store_with_session("acct");
    let registry = Arc::new(RunRegistry::new());
    let mock = Arc::new(MockPlatform::new());

    let slow_policy = PacingPolicy {
        per_item_delay: Duration::from_millis(20),
        batch_size: 100,
        inter_batch_delay: Duration::ZERO,
    };
    let many_targets = targets(&["a"; 50]);

    let first = Arc::new(BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>))
        .spawn(
            registry.clone(),
            store.clone(),
            test_identity("acct"),
            "@mychannel".to_string(),
            many_targets.clone(),
            slow_policy,
        )
        .await
        .unwrap();
    assert!(registry.is_active("acct"));

    // Pre-flight connect recorded the session as authorized
    assert_eq!(store.authorization("acct"), AuthorizationState::Authorized);

    let second = Arc::new(BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>))
        .spawn(
            registry.clone(),
            store.clone(),
            test_identity("acct"),
            "@mychannel".to_string(),
            many_targets.clone(),
            slow_policy,
        )
        .await;
    assert!(matches!(second, Err(SpawnError::AlreadyRunning(_))));

    first.request_stop();
    let report = first.wait().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::StoppedByCaller);
    assert!(!registry.is_active("acct"));

    // The slot is free again
    let third = Arc::new(BulkOrchestrator::new(mock as Arc<dyn PlatformClient>))
        .spawn(
            registry.clone(),
            store,
            test_identity("acct"),
            "@mychannel".to_string(),
            targets(&["x"]),
            PacingPolicy::immediate(10),
        )
        .await
        .unwrap();
    let report = third.wait().await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Completed);
}

#[tokio::test]
async fn test_spawn_refuses_unauthorized_session() {
    let (_dir, store) = store_with_session("acct");
    let registry = Arc::new(RunRegistry::new());
    let mock =
        Arc::new(MockPlatform::new().with_authorization(AuthorizationState::Unauthorized));

    let result = Arc::new(BulkOrchestrator::new(mock as Arc<dyn PlatformClient>))
        .spawn(
            registry.clone(),
            store.clone(),
            test_identity("acct"),
            "@mychannel".to_string(),
            targets(&["a"]),
            PacingPolicy::immediate(10),
        )
        .await;

    assert!(matches!(result, Err(SpawnError::SessionUnauthorized(_))));
    assert!(!registry.is_active("acct"));
    assert_eq!(
        store.authorization("acct"),
        AuthorizationState::Unauthorized
    );
}

#[tokio::test]
async fn test_invalid_pacing_policy_is_fatal_before_any_target() {
    let mock = Arc::new(MockPlatform::new());
    let orchestrator = BulkOrchestrator::new(mock.clone() as Arc<dyn PlatformClient>);

    let mut policy = PacingPolicy::immediate(1);
    policy.batch_size = 0;

    let report = orchestrator
        .run(&test_identity("acct"), "@mychannel", &targets(&["a"]), policy)
        .await;

    assert_eq!(report.outcome, RunOutcome::StoppedByFatalError);
    assert_eq!(report.tally, Default::default());
    assert!(mock.get_state().resolve_calls.is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every target is accounted for exactly once when a run completes
    #[test]
    fn prop_completed_tally_accounts_for_every_target(
        plan in proptest::collection::vec((any::<bool>(), any::<bool>()), 0..12)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mut mock = MockPlatform::new();
            let mut member_handles = Vec::new();
            let mut expected = (0u64, 0u64, 0u64);

            for (i, (is_member, fails)) in plan.iter().enumerate() {
                let name = format!("user{i}");
                if *is_member {
                    member_handles.push(name.clone());
                    expected.1 += 1;
                } else if *fails {
                    mock = mock.with_grant_failure(
                        &name,
                        GrantError::TargetRejected("rejected".to_string()),
                    );
                    expected.2 += 1;
                } else {
                    expected.0 += 1;
                }
            }
            let member_refs: Vec<&str> =
                member_handles.iter().map(String::as_str).collect();
            mock = mock.with_members(&member_refs);

            let target_names: Vec<String> =
                (0..plan.len()).map(|i| format!("user{i}")).collect();
            let target_list: Vec<Target> =
                target_names.iter().map(|name| Target::new(name.as_str())).collect();

            let orchestrator =
                BulkOrchestrator::new(Arc::new(mock) as Arc<dyn PlatformClient>);
            let report = orchestrator
                .run(
                    &test_identity("acct"),
                    "@mychannel",
                    &target_list,
                    PacingPolicy::immediate(3),
                )
                .await;

            assert_eq!(report.outcome, RunOutcome::Completed);
            assert_eq!(report.tally.processed(), plan.len() as u64);
            assert_eq!(
                (
                    report.tally.successful,
                    report.tally.skipped,
                    report.tally.failed
                ),
                expected
            );
        });
    }
}
