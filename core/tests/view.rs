mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, SlowDecryptor};
use privdock_core::{DockError, ErrorKind, RevealConfig, RevealState, RevealTrigger};

fn slow(h: &Harness, delay: Duration) -> Arc<SlowDecryptor> {
    Arc::new(SlowDecryptor {
        inner: h.fhe.clone(),
        delay,
    })
}

#[tokio::test]
async fn second_trigger_joins_the_running_attempt() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let view = h.view_with(slow(&h, Duration::from_millis(200)), RevealConfig::default());
    view.load(h.owner(), h.contract).await.unwrap();

    assert!(matches!(
        view.reveal(0).await.unwrap(),
        RevealTrigger::Started(_)
    ));
    assert_eq!(view.get(0).await.unwrap().state, RevealState::Revealing);
    assert_eq!(view.reveal(0).await.unwrap(), RevealTrigger::InFlight);

    assert!(matches!(
        view.wait(0).await.unwrap(),
        RevealState::Revealed { .. }
    ));
}

#[tokio::test]
async fn revealing_is_observed_before_the_result() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let view = h.view_with(slow(&h, Duration::from_millis(50)), RevealConfig::default());
    view.load(h.owner(), h.contract).await.unwrap();

    let mut states = view.subscribe(0).await.unwrap();
    assert_eq!(*states.borrow_and_update(), RevealState::Hidden);

    view.reveal(0).await.unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), RevealState::Revealing);

    states.changed().await.unwrap();
    assert!(matches!(
        *states.borrow_and_update(),
        RevealState::Revealed { .. }
    ));
}

#[tokio::test]
async fn stuck_round_trip_times_out_to_failed() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let config = RevealConfig {
        timeout: Duration::from_millis(50),
        ..RevealConfig::default()
    };
    let view = h.view_with(slow(&h, Duration::from_secs(10)), config);
    view.load(h.owner(), h.contract).await.unwrap();

    view.reveal(0).await.unwrap();
    assert!(matches!(
        view.wait(0).await.unwrap(),
        RevealState::Failed {
            kind: ErrorKind::Timeout,
            ..
        }
    ));
}

#[tokio::test]
async fn reload_discards_in_flight_results() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let view = h.view_with(slow(&h, Duration::from_millis(100)), RevealConfig::default());
    view.load(h.owner(), h.contract).await.unwrap();
    view.reveal(0).await.unwrap();

    // Re-fetch while the first attempt is still running
    view.load(h.owner(), h.contract).await.unwrap();
    assert_eq!(view.get(0).await.unwrap().state, RevealState::Hidden);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(view.get(0).await.unwrap().state, RevealState::Hidden);
}

#[tokio::test]
async fn failed_fetch_keeps_previous_view() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let view = h.view();
    view.load(h.owner(), h.contract).await.unwrap();
    view.reveal(0).await.unwrap();
    view.wait(0).await.unwrap();

    h.ledger.set_offline(true);
    let err = view.load(h.owner(), h.contract).await.unwrap_err();
    assert!(matches!(err, DockError::FetchError(_)));
    assert!(err.is_retryable());

    assert_eq!(view.len().await, 1);
    assert!(matches!(
        view.get(0).await.unwrap().state,
        RevealState::Revealed { .. }
    ));
}

#[tokio::test]
async fn out_of_range_and_cleared_views() {
    let h = Harness::new();
    h.store("a.txt", "bafy-a").await;

    let view = h.view();
    assert!(matches!(
        view.reveal(0).await,
        Err(DockError::PreconditionFailed(_))
    ));

    view.load(h.owner(), h.contract).await.unwrap();
    assert!(matches!(
        view.get(1).await,
        Err(DockError::PreconditionFailed(_))
    ));
    assert!(matches!(
        view.reveal(7).await,
        Err(DockError::PreconditionFailed(_))
    ));

    view.clear().await;
    assert!(view.is_empty().await);
    assert!(view.scope().await.is_none());
}

#[tokio::test]
async fn reveal_all_reveals_every_slot() {
    let h = Harness::new();
    for (name, locator) in [("a", "bafy-a"), ("b", "bafy-b"), ("c", "bafy-c")] {
        h.store(name, locator).await;
    }

    let view = h.view();
    view.load(h.owner(), h.contract).await.unwrap();
    let triggers = view.reveal_all().await;
    assert_eq!(triggers.len(), 3);

    for (index, expected) in ["bafy-a", "bafy-b", "bafy-c"].iter().enumerate() {
        match view.wait(index).await.unwrap() {
            RevealState::Revealed { locator, .. } => assert_eq!(&locator, expected),
            other => panic!("unexpected state {:?}", other),
        }
    }
}
