use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use url::Url;

use positron::updater::mock::MockConnector;
use positron::updater::{
    ConnectionConfig, ConnectionManager, Topic, TopicRegistry, Updater,
};

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A cell whose n-th fetch (0-based) resolves to `values[n]`, or to the
/// last entry once the script runs out.
fn scripted(
    registry: &Arc<TopicRegistry>,
    topic: Topic,
    values: &[Option<&'static str>],
) -> (Updater<String>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let values: Vec<Option<String>> = values.iter().map(|v| v.map(String::from)).collect();
    let cell = Updater::new(Arc::clone(registry), topic, move || {
        let n = c.fetch_add(1, Ordering::SeqCst);
        let value = values.get(n).or(values.last()).cloned().flatten();
        async move { value }
    });
    (cell, calls)
}

// ── Observers ─────────────────────────────────────────────────────

#[tokio::test]
async fn first_observer_registers_and_fetches_once() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::User, &[Some("a")]);

    let mut first = cell.observe();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(Topic::User), 1);
    assert_eq!(first.changed().await.as_deref(), Some("a"));

    let second = cell.observe();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(registry.len(Topic::User), 1);
    assert_eq!(cell.observers(), 2);
    assert_eq!(second.value().as_deref(), Some("a"));
}

#[tokio::test]
async fn last_observer_leaving_unregisters() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::Group, &[Some("a")]);

    let first = cell.observe();
    let second = cell.observe();
    drop(first);
    assert_eq!(registry.len(Topic::Group), 1);

    drop(second);
    assert_eq!(cell.observers(), 0);
    assert!(registry.is_empty());

    assert_eq!(registry.notify(Topic::Group), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reobserving_registers_again() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::Passkey, &[Some("a")]);

    drop(cell.observe());
    let _again = cell.observe();

    assert_eq!(registry.len(Topic::Passkey), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn notification_refetches() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::Settings, &[Some("a"), Some("b")]);

    let mut observer = cell.observe();
    assert_eq!(observer.changed().await.as_deref(), Some("a"));

    registry.notify(Topic::Settings);
    assert_eq!(observer.changed().await.as_deref(), Some("b"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn other_topics_do_not_refetch() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::User, &[Some("a")]);

    let _observer = cell.observe();
    registry.notify(Topic::Group);
    registry.notify(Topic::Apod);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ── Update ────────────────────────────────────────────────────────

#[tokio::test]
async fn update_stores_latest_value() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, _) = scripted(&registry, Topic::User, &[Some("a"), Some("b")]);

    let mut observer = cell.observe();
    assert_eq!(observer.changed().await.as_deref(), Some("a"));

    cell.update().await;
    assert_eq!(cell.value().as_deref(), Some("b"));
    assert_eq!(observer.value().as_deref(), Some("b"));
}

#[tokio::test]
async fn update_works_without_observers() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, calls) = scripted(&registry, Topic::User, &[Some("a")]);

    cell.update().await;

    assert_eq!(cell.value().as_deref(), Some("a"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn failed_fetch_keeps_previous_value() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, _) = scripted(&registry, Topic::User, &[Some("a"), None]);

    cell.update().await;
    cell.update().await;

    assert_eq!(cell.value().as_deref(), Some("a"));
}

#[tokio::test]
async fn value_is_none_before_first_fetch_resolves() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, _) = scripted(&registry, Topic::User, &[None]);

    let observer = cell.observe();
    assert!(observer.value().is_none());
    cell.update().await;
    assert!(cell.value().is_none());
}

// ── Stale results ─────────────────────────────────────────────────

/// First fetch answers after `slow`, later ones immediately.
fn slow_then_fast(
    registry: &Arc<TopicRegistry>,
    slow: Duration,
    aborting: bool,
) -> (Updater<String>, Arc<AtomicUsize>) {
    let finished = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&finished);
    let fetch = move || {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        let finished = Arc::clone(&f);
        async move {
            if n == 0 {
                tokio::time::sleep(slow).await;
            }
            finished.fetch_add(1, Ordering::SeqCst);
            Some(if n == 0 { "stale" } else { "fresh" }.to_string())
        }
    };
    let cell = if aborting {
        Updater::aborting(Arc::clone(registry), Topic::Apod, fetch)
    } else {
        Updater::new(Arc::clone(registry), Topic::Apod, fetch)
    };
    (cell, finished)
}

#[tokio::test(start_paused = true)]
async fn superseded_fetch_result_is_discarded() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, finished) = slow_then_fast(&registry, Duration::from_secs(5), false);

    let _observer = cell.observe();
    cell.update().await;
    assert_eq!(cell.value().as_deref(), Some("fresh"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(finished.load(Ordering::SeqCst), 2);
    assert_eq!(cell.value().as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn aborting_cell_cancels_superseded_fetch() {
    let registry = Arc::new(TopicRegistry::new());
    let (cell, finished) = slow_then_fast(&registry, Duration::from_secs(5), true);

    let _observer = cell.observe();
    cell.update().await;

    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;

    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(cell.value().as_deref(), Some("fresh"));
}

/// Each fetch yields once and then answers with its own issue number.
fn numbered(registry: &Arc<TopicRegistry>, aborting: bool) -> Updater<usize> {
    let issued = Arc::new(AtomicUsize::new(0));
    let fetch = move || {
        let n = issued.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            tokio::task::yield_now().await;
            Some(n)
        }
    };
    if aborting {
        Updater::aborting(Arc::clone(registry), Topic::Apod, fetch)
    } else {
        Updater::new(Arc::clone(registry), Topic::Apod, fetch)
    }
}

async fn concurrent_updates_keep_newest(aborting: bool) {
    let registry = Arc::new(TopicRegistry::new());
    let cell = numbered(&registry, aborting);

    for round in 1..=500 {
        let a = cell.clone();
        let b = cell.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.update().await }),
            tokio::spawn(async move { b.update().await }),
        );
        ra.unwrap();
        rb.unwrap();

        // Both updates have returned, so the newest fetch has finished.
        assert_eq!(cell.value(), Some(round * 2), "round {round}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_store_newest_result() {
    concurrent_updates_keep_newest(false).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_updates_on_aborting_cell_never_lose_newest() {
    concurrent_updates_keep_newest(true).await;
}

// ── End to end ────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn pushed_topic_refreshes_observed_cell() {
    let registry = Arc::new(TopicRegistry::new());
    let mock = MockConnector::new();
    let manager = ConnectionManager::new(
        Arc::clone(&registry),
        Arc::new(mock.clone()),
        Url::parse("ws://localhost:8000/ws/updater").unwrap(),
        ConnectionConfig::default(),
    );
    let (cell, calls) = scripted(&registry, Topic::OAuthScope, &[Some("v1"), Some("v2"), Some("v3")]);

    let mut observer = cell.observe();
    assert_eq!(observer.changed().await.as_deref(), Some("v1"));

    manager.connect();
    settle().await;
    // Opening the socket replays every registered topic.
    assert_eq!(observer.changed().await.as_deref(), Some("v2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    mock.push("\"OAuthScope\"");
    assert_eq!(observer.changed().await.as_deref(), Some("v3"));

    drop(observer);
    mock.push("\"OAuthScope\"");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    manager.dispose().await;
}
