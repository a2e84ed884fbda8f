//! Counter group enable/attach/disable against the simulated dataplane.

mod common;

use std::panic::AssertUnwindSafe;

use dash_converge::domain::models::{CounterGroup, CounterState, RealizedTable};
use dash_converge::domain::ports::CounterStore;
use dash_converge::HarnessError;
use futures::FutureExt;

const POLICY: &str = "245bde4f-3a25-4f3f-9d4a-7e5b1f8c2a01";

async fn eni_realized(harness: &dash_converge::Harness) -> String {
    common::provision_eni(&harness.intents, POLICY).await;
    let keys = harness
        .realized
        .wait_for_keys(RealizedTable::Eni.exactly(1), &harness.profiles.creation)
        .await
        .unwrap();
    keys.into_iter().next().unwrap().to_string()
}

#[tokio::test(start_paused = true)]
async fn test_wait_attached_requires_enable() {
    let (_dataplane, mut harness) = common::setup();

    let err = harness
        .counters
        .wait_attached(CounterGroup::Eni)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HarnessError::InvalidCounterTransition {
            from: CounterState::Uninitialized,
            to: CounterState::Attached,
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_enable_attach_disable_cycle() {
    let (dataplane, mut harness) = common::setup();
    let eni_key = eni_realized(&harness).await;

    harness.counters.enable(CounterGroup::Eni).await.unwrap();
    assert_eq!(harness.counters.state(CounterGroup::Eni), CounterState::Enabled);

    let bindings = harness.counters.wait_attached(CounterGroup::Eni).await.unwrap();
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].object_name, common::ENI);
    assert_eq!(bindings[0].object_key, eni_key);
    assert!(bindings[0]
        .id_list
        .iter()
        .any(|id| id == "SAI_ENI_STAT_RX_BYTES"));
    assert_eq!(harness.counters.state(CounterGroup::Eni), CounterState::Attached);

    harness.counters.disable(CounterGroup::Eni).await.unwrap();
    assert_eq!(harness.counters.state(CounterGroup::Eni), CounterState::Detached);
    assert!(dataplane.is_empty(CounterGroup::Eni.name_map()).await.unwrap());
    assert!(!dataplane
        .has_id_list(CounterGroup::Eni, &eni_key)
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_disable_is_harmless() {
    let (dataplane, mut harness) = common::setup();
    let eni_key = eni_realized(&harness).await;

    harness.counters.enable(CounterGroup::Meter).await.unwrap();
    harness.counters.wait_attached(CounterGroup::Meter).await.unwrap();

    for _ in 0..2 {
        harness.counters.disable(CounterGroup::Meter).await.unwrap();
        assert_eq!(harness.counters.state(CounterGroup::Meter), CounterState::Detached);
        assert!(dataplane
            .list_id_list(CounterGroup::Meter, &eni_key)
            .await
            .unwrap()
            .is_empty());
        assert!(dataplane.is_empty(CounterGroup::Meter.name_map()).await.unwrap());
    }
}

#[tokio::test(start_paused = true)]
async fn test_groups_are_tracked_independently() {
    let (dataplane, mut harness) = common::setup();
    let eni_key = eni_realized(&harness).await;

    harness.counters.enable(CounterGroup::Meter).await.unwrap();
    harness.counters.wait_attached(CounterGroup::Meter).await.unwrap();

    assert_eq!(
        harness.counters.state(CounterGroup::Eni),
        CounterState::Uninitialized
    );
    assert!(dataplane
        .has_id_list(CounterGroup::Meter, &eni_key)
        .await
        .unwrap());
    assert!(!dataplane
        .has_id_list(CounterGroup::Eni, &eni_key)
        .await
        .unwrap());

    harness.counters.disable(CounterGroup::Meter).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_with_attached_releases_on_body_error() {
    let (dataplane, mut harness) = common::setup();
    eni_realized(&harness).await;

    let result: Result<(), _> = harness
        .counters
        .with_attached(CounterGroup::Eni, |bindings| async move {
            assert_eq!(bindings.len(), 1);
            Err(HarnessError::InvalidValue("counter read failed".to_string()))
        })
        .await;

    assert!(matches!(result, Err(HarnessError::InvalidValue(_))));
    assert_eq!(harness.counters.state(CounterGroup::Eni), CounterState::Detached);
    assert!(dataplane.is_empty(CounterGroup::Eni.name_map()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_with_attached_releases_on_panic() {
    let (dataplane, mut harness) = common::setup();
    eni_realized(&harness).await;

    let outcome = AssertUnwindSafe(harness.counters.with_attached(
        CounterGroup::Meter,
        |_bindings| async move {
            if true {
                panic!("assertion inside counter scope");
            }
            Ok(())
        },
    ))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(
        harness.counters.state(CounterGroup::Meter),
        CounterState::Detached
    );
    assert!(dataplane.is_empty(CounterGroup::Meter.name_map()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_with_attached_returns_body_value() {
    let (_dataplane, mut harness) = common::setup();
    eni_realized(&harness).await;

    let objects = harness
        .counters
        .with_attached(CounterGroup::Meter, |bindings| async move {
            Ok(bindings.len())
        })
        .await
        .unwrap();

    assert_eq!(objects, 1);
}
