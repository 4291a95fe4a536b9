use boardlens_dom::{shared, Document, NodeSpec, Rect, Selector, SharedDocument};
use boardlens_engine::fixture::{BoardFixture, CardOwner};
use boardlens_engine::{
    resolve_owner_id, save_settings, BoardEngine, EngineConfig, MemoryStore, PassOutcome,
    SettingsStore,
};
use boardlens_protocol::{BoardSettings, OwnerLimit, OwnerLimitSettings};
use boardlens_watcher::{BoardWatcher, BoardWatcherConfig, LoopState, PassUpdate, RetryPolicy};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

fn board() -> BoardFixture {
    BoardFixture::new()
        .column(Some("To Do"))
        .card("K-0", 10.0, CardOwner::named("Bob"))
        .card("K-1", 14.0, CardOwner::named("Alice"))
        .column(Some("Done"))
        .card("K-2", 300.0, CardOwner::named("Alice"))
        .card("K-3", 304.0, CardOwner::named("Alice"))
}

fn alice_id() -> String {
    resolve_owner_id(None, "Alice")
}

fn alice_over_limit() -> BoardSettings {
    BoardSettings {
        personal_wip_limits: OwnerLimitSettings {
            enabled: true,
            limits: vec![OwnerLimit {
                id: "alice".into(),
                user_id: alice_id(),
                user_name: "Alice".into(),
                column_ids: vec!["column-1".into()],
                limit: 1,
                ..OwnerLimit::default()
            }],
        },
        ..BoardSettings::default()
    }
}

fn card_spec(key: &str, left: f64) -> NodeSpec {
    NodeSpec::new("div")
        .attr("data-testid", "platform-board-kit.ui.card.card")
        .attr("id", format!("card-{key}"))
        .rect(Rect::new(left, 600.0, 200.0, 80.0))
}

fn start(
    document: &SharedDocument,
    store: Arc<dyn SettingsStore>,
    config: BoardWatcherConfig,
) -> BoardWatcher {
    let engine = BoardEngine::new(EngineConfig::default()).unwrap();
    BoardWatcher::start(Arc::clone(document), engine, store, config).unwrap()
}

async fn next_update(updates: &mut broadcast::Receiver<PassUpdate>) -> Option<PassUpdate> {
    time::timeout(Duration::from_secs(10), updates.recv())
        .await
        .ok()
        .and_then(Result::ok)
}

fn append_card(document: &SharedDocument, key: &str, left: f64) {
    let mut doc = document.lock().unwrap();
    let cards = doc
        .query(doc.root(), &Selector::attr_contains("data-testid", "column-cards"))
        .unwrap();
    doc.append_spec(cards, &card_spec(key, left)).unwrap();
}

#[tokio::test(start_paused = true)]
async fn initial_pass_runs_once_observing() {
    let document = shared(board().document());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();

    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.reason, "initial");
    assert_eq!(update.outcome(), Some(PassOutcome::Applied));
    assert_eq!(update.report.as_ref().unwrap().columns.len(), 2);

    assert!(next_update(&mut updates).await.is_none());
    let health = watcher.health_snapshot();
    assert_eq!(health.passes, 1);
    assert!(health.observing);
    assert_eq!(health.state, LoopState::Idle);
    assert_eq!(document.lock().unwrap().observer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_is_debounced_into_one_pass() {
    let document = shared(board().document());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();
    next_update(&mut updates).await.unwrap();
    time::sleep(Duration::from_millis(200)).await;

    for n in 0..5 {
        append_card(&document, &format!("N-{n}"), 12.0);
        time::sleep(Duration::from_millis(50)).await;
    }

    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.reason, "mutation");
    assert_eq!(update.report.unwrap().columns[0].card_count, 7);
    assert!(next_update(&mut updates).await.is_none());
    assert_eq!(watcher.health_snapshot().passes, 2);
}

#[tokio::test(start_paused = true)]
async fn own_writes_do_not_trigger_another_pass() {
    let document = shared(board().document());
    let store = Arc::new(MemoryStore::new());
    save_settings(store.as_ref(), &alice_over_limit()).unwrap();
    let watcher = start(&document, store, BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();

    let update = next_update(&mut updates).await.unwrap();
    let report = update.report.unwrap();
    assert!(report.is_owner_over_limit(&alice_id()));
    assert_eq!(report.annotations.highlighted_cards, 2);

    assert!(next_update(&mut updates).await.is_none());
    let health = watcher.health_snapshot();
    assert_eq!(health.passes, 1);
    assert!(health.discarded_mutations > 0);
}

#[tokio::test(start_paused = true)]
async fn settings_are_reread_before_each_pass() {
    let document = shared(board().document());
    let store = Arc::new(MemoryStore::new());
    let shared_store: Arc<dyn SettingsStore> = Arc::clone(&store) as Arc<dyn SettingsStore>;
    let watcher = start(&document, shared_store, BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();

    let first = next_update(&mut updates).await.unwrap().report.unwrap();
    assert!(first.owner_limits.is_empty());

    save_settings(store.as_ref(), &alice_over_limit()).unwrap();
    watcher.trigger("settings-changed").await.unwrap();

    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.reason, "settings-changed");
    assert!(update.report.unwrap().is_owner_over_limit(&alice_id()));
}

#[tokio::test(start_paused = true)]
async fn empty_board_is_retried_then_left_alone() {
    let document = shared(BoardFixture::new().document());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();

    let mut reasons = Vec::new();
    while let Some(update) = next_update(&mut updates).await {
        assert_eq!(update.outcome(), Some(PassOutcome::BoardNotReady));
        reasons.push(update.reason);
    }
    assert_eq!(reasons.len(), 6);
    assert_eq!(reasons[0], "initial");
    assert!(reasons[1..].iter().all(|r| r == "board-not-ready"));

    {
        let mut doc = document.lock().unwrap();
        let container = doc
            .query(doc.root(), &Selector::attr_eq("data-testid", "software-board.board"))
            .unwrap();
        doc.append_spec(container, &card_spec("LATE-1", 40.0)).unwrap();
    }
    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.reason, "mutation");
    assert_eq!(update.outcome(), Some(PassOutcome::Applied));
}

#[tokio::test(start_paused = true)]
async fn waits_for_container_to_appear() {
    let document = shared(Document::new());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();

    time::sleep(Duration::from_millis(600)).await;
    assert!(!watcher.health_snapshot().observing);
    {
        let mut doc = document.lock().unwrap();
        let root = doc.root();
        doc.append_spec(root, &board().build()).unwrap();
    }

    let update = next_update(&mut updates).await.unwrap();
    assert_eq!(update.outcome(), Some(PassOutcome::Applied));
    assert!(watcher.health_snapshot().observing);
}

#[tokio::test(start_paused = true)]
async fn gives_up_when_container_never_appears() {
    let document = shared(Document::new());
    let config = BoardWatcherConfig {
        container_retry: RetryPolicy {
            attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        },
        ..BoardWatcherConfig::default()
    };
    let watcher = start(&document, Arc::new(MemoryStore::new()), config);

    let mut health = watcher.health_stream();
    let stopped = health.wait_for(|h| h.stopped).await.unwrap().clone();
    assert_eq!(stopped.passes, 0);
    assert!(!stopped.observing);
    assert!(stopped.last_error.unwrap().contains("not found after 3 attempts"));
    assert_eq!(document.lock().unwrap().observer_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_disconnects_observer_and_cancels_pending_pass() {
    let document = shared(board().document());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut updates = watcher.subscribe_updates();
    next_update(&mut updates).await.unwrap();
    time::sleep(Duration::from_millis(200)).await;

    append_card(&document, "N-1", 12.0);
    watcher.stop().await.unwrap();

    assert_eq!(document.lock().unwrap().observer_count(), 0);
    assert!(next_update(&mut updates).await.is_none());
    let health = watcher.health_snapshot();
    assert!(health.stopped);
    assert_eq!(health.passes, 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_stops_the_loop() {
    let document = shared(board().document());
    let watcher = start(&document, Arc::new(MemoryStore::new()), BoardWatcherConfig::default());
    let mut health = watcher.health_stream();
    let clone = watcher.clone();
    drop(watcher);
    assert!(!clone.health_snapshot().stopped);

    drop(clone);
    health.wait_for(|h| h.stopped).await.unwrap();
    assert_eq!(document.lock().unwrap().observer_count(), 0);
}
