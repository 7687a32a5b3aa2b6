//! Architectural Contract Test: Apply Suppression
//!
//! Verifies the two guards in front of the provider write path: the
//! exponential backoff after a failed apply, and the min-change-interval
//! suppression of plans identical to the previous submission.

mod common;

use common::*;
use std::time::Duration;
use zonesync_core::endpoint::RecordType;
use zonesync_core::registry::NoopRegistry;
use zonesync_core::Controller;

#[tokio::test(start_paused = true)]
async fn failed_apply_backs_off_before_retrying() {
    let provider = RecordingProvider::new(Vec::new())
        .converging()
        .fail_next_applies(1);
    let provider_handle = RecordingProvider::sharing_state_with(&provider);

    let source = MockSource::new(vec![ep("foo", &["1.1.1.1"], RecordType::A)]);
    let (mut controller, _event_rx) = Controller::new(
        Box::new(source),
        Box::new(NoopRegistry::new(Box::new(provider))),
        &controller_config(60),
    )
    .unwrap();

    // First tick: the apply is attempted and fails.
    assert!(controller.run_once().await.is_err());
    assert_eq!(provider_handle.apply_call_count(), 1);

    // Immediately after, the same plan is not retried.
    controller.run_once().await.expect("tick succeeds without applying");
    assert_eq!(provider_handle.apply_call_count(), 1);

    // Once the 5s backoff has elapsed the apply runs again and succeeds.
    tokio::time::advance(Duration::from_secs(6)).await;
    controller.run_once().await.expect("retry succeeds");
    assert_eq!(provider_handle.apply_call_count(), 2);

    // The zone converged; further ticks are clean.
    controller.run_once().await.unwrap();
    assert_eq!(provider_handle.apply_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn identical_plan_is_suppressed_within_the_min_change_interval() {
    // A provider that accepts writes but never converges: the same plan
    // comes back every tick.
    let provider = RecordingProvider::new(Vec::new());
    let provider_handle = RecordingProvider::sharing_state_with(&provider);

    let source = MockSource::new(vec![ep("foo", &["1.1.1.1"], RecordType::A)]);
    let mut config = controller_config(60);
    config.min_change_interval_secs = 300;
    let (mut controller, _event_rx) = Controller::new(
        Box::new(source),
        Box::new(NoopRegistry::new(Box::new(provider))),
        &config,
    )
    .unwrap();

    controller.run_once().await.unwrap();
    assert_eq!(provider_handle.apply_call_count(), 1);

    controller.run_once().await.unwrap();
    assert_eq!(
        provider_handle.apply_call_count(),
        1,
        "an identical plan is not resubmitted within the interval"
    );

    tokio::time::advance(Duration::from_secs(301)).await;
    controller.run_once().await.unwrap();
    assert_eq!(provider_handle.apply_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn a_changed_plan_bypasses_the_suppression() {
    let provider = RecordingProvider::new(Vec::new());
    let provider_handle = RecordingProvider::sharing_state_with(&provider);

    let source = MockSource::new(vec![ep("foo", &["1.1.1.1"], RecordType::A)]);
    let source_handle = MockSource::sharing_state_with(&source);

    let mut config = controller_config(60);
    config.min_change_interval_secs = 300;
    let (mut controller, _event_rx) = Controller::new(
        Box::new(source),
        Box::new(NoopRegistry::new(Box::new(provider))),
        &config,
    )
    .unwrap();

    controller.run_once().await.unwrap();
    assert_eq!(provider_handle.apply_call_count(), 1);

    // Desired state moves; the new plan goes straight through.
    source_handle.set_endpoints(vec![ep("foo", &["9.9.9.9"], RecordType::A)]);
    controller.run_once().await.unwrap();
    assert_eq!(provider_handle.apply_call_count(), 2);
}
