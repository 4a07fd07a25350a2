//! End-to-end behaviour of a game session against in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use regrow_progress::PartialProgress;
use regrow_sync::{
    ActionError, ActionGate, GameHandle, GameSession, Identity, LocalCache, MemoryCache,
    MemoryProgressStore, NoCache, ProgressEvent, ProgressState, SyncConfig, SyncMode, UserKey,
};
use tokio::time::sleep;
use tokio_test::{assert_err, assert_ok};

const SAVE_DELAY: Duration = Duration::from_millis(500);

fn spawn(store: &MemoryProgressStore) -> GameHandle {
    GameSession::spawn(
        Arc::new(store.clone()),
        Arc::new(NoCache),
        SyncConfig::default(),
    )
}

fn spawn_with_cache(store: &MemoryProgressStore, cache: &MemoryCache) -> GameHandle {
    GameSession::spawn(
        Arc::new(store.clone()),
        Arc::new(cache.clone()),
        SyncConfig::default(),
    )
}

async fn login(game: &GameHandle, user: &str) {
    assert_ok!(game.set_identity(Identity::user(user)).await);
    assert_ok!(game.loaded().await);
}

fn state(currency: u64, level: u32, progress_pct: f64, trees_grown: u64) -> ProgressState {
    ProgressState {
        currency,
        level,
        progress_pct,
        last_collect_at: None,
        trees_grown,
    }
}

#[tokio::test(start_paused = true)]
async fn unknown_identity_changes_nothing() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);

    assert_ok!(game.set_identity(Identity::Unknown).await);

    assert_eq!(game.state(), ProgressState::guest());
    assert_eq!(game.snapshot().mode, SyncMode::Idle);
    assert_eq!(game.gate(), ActionGate::LoginRequired);
    assert_eq!(store.fetch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn guest_actions_are_blocked() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    assert_ok!(game.set_identity(Identity::Anonymous).await);

    let err = assert_err!(game.water().await);
    assert!(matches!(err, ActionError::LoginRequired));
    assert_eq!(game.state(), ProgressState::guest());

    sleep(Duration::from_secs(1)).await;
    assert!(store.upserts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn login_without_record_uses_account_defaults() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);

    login(&game, "kim").await;

    assert_eq!(game.state(), ProgressState::new_account());
    assert_eq!(game.gate(), ActionGate::Allowed);
    assert!(!game.is_loading());

    // Loading alone never writes anything back.
    sleep(Duration::from_secs(1)).await;
    assert!(store.upserts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn partial_record_defaults_each_missing_field() {
    let store = MemoryProgressStore::new();
    store.insert(
        &UserKey::new("kim"),
        PartialProgress {
            level: Some(3),
            trees_grown: Some(2),
            ..Default::default()
        },
    );
    let game = spawn(&store);

    login(&game, "kim").await;

    assert_eq!(game.state(), state(200, 3, 0.0, 2));
}

#[tokio::test(start_paused = true)]
async fn rapid_actions_produce_one_save_with_latest_state() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    login(&game, "kim").await;

    assert_ok!(game.water().await);
    sleep(Duration::from_millis(100)).await;
    assert_ok!(game.water().await);

    sleep(SAVE_DELAY - Duration::from_millis(1)).await;
    assert!(store.upserts().is_empty());

    sleep(Duration::from_millis(200)).await;
    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].0, UserKey::new("kim"));
    assert_eq!(upserts[0].1, state(190, 1, 20.0, 0));
}

#[tokio::test(start_paused = true)]
async fn changes_while_loading_are_not_saved() {
    let store = MemoryProgressStore::new().with_latency(Duration::from_secs(1));
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(50, 2, 30.0, 1)),
    );
    let game = spawn(&store);

    assert_ok!(game.set_identity(Identity::user("kim")).await);
    assert!(game.is_loading());

    // Actions are not blocked by the load, but nothing is saved.
    assert_ok!(game.fertilize().await);
    sleep(Duration::from_millis(600)).await;
    assert!(store.upserts().is_empty());

    // The remote record wins over the local change.
    let snapshot = assert_ok!(game.loaded().await);
    assert_eq!(snapshot.state, state(50, 2, 30.0, 1));

    sleep(Duration::from_secs(1)).await;
    assert!(store.upserts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn logout_mid_fetch_discards_the_result() {
    let store = MemoryProgressStore::new().with_latency(Duration::from_secs(1));
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(999, 3, 50.0, 7)),
    );
    let game = spawn(&store);

    assert_ok!(game.set_identity(Identity::user("kim")).await);
    assert_ok!(game.set_identity(Identity::Anonymous).await);

    sleep(Duration::from_secs(2)).await;

    assert_eq!(game.state(), ProgressState::guest());
    assert_eq!(game.snapshot().mode, SyncMode::Guest);
    assert_eq!(store.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn switching_users_mid_fetch_keeps_only_the_latest() {
    let store = MemoryProgressStore::new().with_latency(Duration::from_secs(1));
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(999, 3, 50.0, 7)),
    );
    let game = spawn(&store);

    assert_ok!(game.set_identity(Identity::user("kim")).await);
    assert_ok!(game.set_identity(Identity::user("lee")).await);
    let snapshot = assert_ok!(game.loaded().await);

    // Let any straggling result for kim arrive.
    sleep(Duration::from_secs(2)).await;

    assert_eq!(snapshot.identity, Identity::user("lee"));
    assert_eq!(game.state(), ProgressState::new_account());
}

#[tokio::test(start_paused = true)]
async fn failed_load_keeps_defaults_and_later_changes_save() {
    let store = MemoryProgressStore::new();
    store.set_fail_fetch(true);
    let game = spawn(&store);

    login(&game, "kim").await;
    assert_eq!(game.state(), ProgressState::new_account());

    assert_ok!(game.fertilize().await);
    sleep(Duration::from_secs(1)).await;

    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].1, state(190, 1, 20.0, 0));
}

#[tokio::test(start_paused = true)]
async fn save_failure_is_swallowed_and_next_change_retries() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    login(&game, "kim").await;

    store.set_fail_upsert(true);
    assert_ok!(game.water().await);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(store.upserts().len(), 1);
    assert!(store.record(&UserKey::new("kim")).is_none());

    // No retry on its own.
    sleep(Duration::from_secs(5)).await;
    assert_eq!(store.upserts().len(), 1);

    store.set_fail_upsert(false);
    assert_ok!(game.water().await);
    sleep(Duration::from_secs(1)).await;

    assert_eq!(store.upserts().len(), 2);
    let saved = store.record(&UserKey::new("kim")).unwrap();
    assert_eq!(saved.resolve(&ProgressState::guest()), state(190, 1, 20.0, 0));
}

#[tokio::test(start_paused = true)]
async fn logout_cancels_pending_save() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    login(&game, "kim").await;

    assert_ok!(game.water().await);
    sleep(Duration::from_millis(200)).await;
    assert_ok!(game.set_identity(Identity::Anonymous).await);

    sleep(Duration::from_secs(1)).await;
    assert!(store.upserts().is_empty());
    assert_eq!(game.state(), ProgressState::guest());
}

#[tokio::test(start_paused = true)]
async fn shutdown_flushes_pending_save() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    login(&game, "kim").await;

    assert_ok!(game.fertilize().await);
    assert_ok!(game.shutdown().await);

    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].1, state(190, 1, 20.0, 0));
}

#[tokio::test(start_paused = true)]
async fn insufficient_funds_is_reported_and_nothing_changes() {
    let store = MemoryProgressStore::new();
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(7, 2, 60.0, 0)),
    );
    let game = spawn(&store);
    login(&game, "kim").await;

    let err = assert_err!(game.fertilize().await);
    assert!(err.is_insufficient_funds());
    assert_eq!(game.state(), state(7, 2, 60.0, 0));

    sleep(Duration::from_secs(1)).await;
    assert!(store.upserts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cycle_completion_is_announced_once_and_dismissed() {
    let store = MemoryProgressStore::new();
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(100, 3, 90.0, 4)),
    );
    let game = spawn(&store);
    login(&game, "kim").await;
    let mut events = game.events();

    let after = assert_ok!(game.fertilize().await);
    assert_eq!(after, state(90, 1, 0.0, 5));

    let mut completions = 0;
    while let Ok(event) = events.try_recv() {
        if let ProgressEvent::CycleCompleted(notice) = event {
            assert_eq!(notice.trees_grown, 5);
            assert_eq!(notice.reward, 500);
            completions += 1;
        }
    }
    assert_eq!(completions, 1);

    let notice = game.completion_notice().unwrap();
    assert_eq!(notice.trees_grown, 5);
    assert_ok!(game.dismiss_completion().await);
    assert_eq!(game.completion_notice(), None);
    assert_ok!(game.dismiss_completion().await);
    assert_eq!(game.completion_notice(), None);
}

#[tokio::test(start_paused = true)]
async fn reset_is_persisted() {
    let store = MemoryProgressStore::new();
    store.insert(
        &UserKey::new("kim"),
        PartialProgress::from(&state(3, 3, 70.0, 9)),
    );
    let game = spawn(&store);
    login(&game, "kim").await;

    let after = assert_ok!(game.reset().await);
    assert_eq!(after, ProgressState::restart());

    sleep(Duration::from_secs(1)).await;
    let upserts = store.upserts();
    assert_eq!(upserts.len(), 1);
    assert_eq!(upserts[0].1, ProgressState::restart());
}

#[tokio::test(start_paused = true)]
async fn cached_state_paints_while_remote_loads() {
    let kim = UserKey::new("kim");
    let store = MemoryProgressStore::new().with_latency(Duration::from_secs(1));
    store.insert(&kim, PartialProgress::from(&state(120, 2, 10.0, 1)));
    let cache = MemoryCache::new();
    cache.write(&kim, &state(130, 1, 80.0, 1)).unwrap();
    let game = spawn_with_cache(&store, &cache);

    assert_ok!(game.set_identity(Identity::user("kim")).await);
    assert!(game.is_loading());
    assert_eq!(game.state(), state(130, 1, 80.0, 1));

    assert_ok!(game.loaded().await);
    assert_eq!(game.state(), state(120, 2, 10.0, 1));
    assert_eq!(cache.read(&kim).unwrap(), Some(state(120, 2, 10.0, 1)));
}

#[tokio::test(start_paused = true)]
async fn cache_is_written_on_every_change_and_ignored_for_guests() {
    let kim = UserKey::new("kim");
    let store = MemoryProgressStore::new();
    let cache = MemoryCache::new();
    let game = spawn_with_cache(&store, &cache);
    login(&game, "kim").await;

    assert_ok!(game.water().await);
    // Written synchronously, before the remote save is due.
    assert_eq!(cache.read(&kim).unwrap(), Some(state(195, 1, 10.0, 0)));
    assert!(store.upserts().is_empty());

    assert_ok!(game.set_identity(Identity::Anonymous).await);
    assert_eq!(game.state(), ProgressState::guest());
    assert_eq!(cache.read(&kim).unwrap(), Some(state(195, 1, 10.0, 0)));
}

#[tokio::test(start_paused = true)]
async fn reward_can_be_credited_externally() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    login(&game, "kim").await;

    let after = assert_ok!(game.add_currency(500).await);
    assert_eq!(after.currency, 700);
}

#[tokio::test(start_paused = true)]
async fn guest_plays_logs_in_and_progress_survives_reload() {
    let store = MemoryProgressStore::new();

    // First visit: guest is blocked, then signs in.
    let game = spawn(&store);
    assert_ok!(game.set_identity(Identity::Anonymous).await);
    assert!(matches!(game.water().await, Err(ActionError::LoginRequired)));

    login(&game, "kim").await;
    assert_eq!(game.state(), state(200, 1, 0.0, 0));

    let first = assert_ok!(game.fertilize().await);
    assert_eq!(first, state(190, 1, 20.0, 0));
    let second = assert_ok!(game.fertilize().await);
    assert_eq!(second, state(180, 1, 40.0, 0));

    sleep(Duration::from_secs(1)).await;
    assert_ok!(game.shutdown().await);

    // Reload: a fresh session re-fetches the same values.
    let reloaded = spawn(&store);
    login(&reloaded, "kim").await;
    assert_eq!(reloaded.state(), state(180, 1, 40.0, 0));
    assert_eq!(store.upserts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn requests_after_shutdown_report_closed_session() {
    let store = MemoryProgressStore::new();
    let game = spawn(&store);
    let other = game.clone();

    assert_ok!(game.shutdown().await);
    sleep(Duration::from_millis(10)).await;

    assert!(matches!(other.water().await, Err(ActionError::SessionClosed)));
}
