#![cfg(feature = "imap")]

mod common;

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use himalaya_cache::{
    refresh, CacheConfig, CacheSession, Flag, Flags, FolderHandle, RefreshState, Token,
};

use common::{inbox, message, session, settle, tokens, Call, Events, FakeRemote, Phase};

#[tokio::test]
async fn test_orphans_are_expunged() {
    common::init_logger();

    let cached = vec![message(1, ""), message(2, ""), message(3, "")];
    let (session, _) = session(CacheConfig::new("account"), cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap().with_messages([message(1, ""), message(2, "")]));

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(true).unwrap();
    settle(&handle).await;

    // checking that only the confirmed messages remain
    let messages = handle.get_cached_messages().unwrap();
    assert_eq!(vec![1, 2], tokens(&messages));

    // checking that the orphan has been reported
    assert_eq!(vec![vec![3]], events.expunged());
    assert_eq!(vec![true], events.completions());
}

#[tokio::test]
async fn test_refresh_scenario() {
    common::init_logger();

    let cached = vec![message(1, "seen"), message(2, ""), message(3, "seen")];
    let (session, _) = session(CacheConfig::new("account"), cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(
        FakeRemote::imap().with_messages([message(1, "seen flagged"), message(3, "seen")]),
    );

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    // checking the phases
    assert_eq!(
        vec![
            Call::Recent(25),
            Call::ByTokens(vec![2], true),
            Call::ByTokens(vec![2], false),
        ],
        remote.calls()
    );

    // checking that the vanished message has been evicted
    let messages = handle.get_cached_messages().unwrap();
    assert_eq!(vec![1, 3], tokens(&messages));
    assert_eq!(vec![vec![2]], events.expunged());

    // checking that only the actually changed flags were notified
    assert_eq!(vec![1], events.flag_changes());
    let first = session
        .cache()
        .get_folder_message(&inbox(), &Token(1))
        .unwrap()
        .unwrap();
    assert_eq!(Flags::from_iter([Flag::Seen, Flag::Flagged]), first.flags);

    let state = handle.state().await.unwrap();
    assert_eq!(RefreshState::Idle, state.state);
    assert!(state.flags.initial_refresh_complete);
}

#[tokio::test]
async fn test_retention_cap() {
    common::init_logger();

    let config = CacheConfig {
        initial_folder_messages: Some(10),
        maximum_folder_messages: Some(15),
        ..CacheConfig::new("account")
    };
    let cached = (1..=20).map(|token| message(token, "")).collect();
    let (session, _) = session(config, cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap().with_messages((1..=30).map(|t| message(t, ""))));

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    // checking that every older message was checked
    assert_eq!(
        vec![
            Call::Recent(10),
            Call::ByTokens((1..=20).rev().collect(), true),
        ],
        remote.calls()
    );

    // checking that the oldest messages were discarded
    let messages = handle.get_cached_messages().unwrap();
    assert_eq!((16..=30).collect::<Vec<_>>(), tokens(&messages));
    assert_eq!(vec![(1..=15).collect::<Vec<_>>()], events.expunged());
}

#[tokio::test]
async fn test_retention_cap_skips_deleted_messages() {
    common::init_logger();

    let config = CacheConfig {
        initial_folder_messages: Some(10),
        maximum_folder_messages: Some(15),
        ..CacheConfig::new("account")
    };
    let cached = (1..=20).map(|token| message(token, "")).collect();
    let (session, _) = session(config, cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(
        FakeRemote::imap().with_messages((1..=15).chain(21..=30).map(|t| message(t, ""))),
    );

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    assert_eq!(
        vec![
            Call::Recent(10),
            Call::ByTokens((1..=20).rev().collect(), true),
            Call::ByTokens(vec![20, 19, 18, 17, 16], false),
        ],
        remote.calls()
    );

    // checking that the budget was filled with existing messages
    let messages = handle.get_cached_messages().unwrap();
    let expected: Vec<u64> = (11..=15).chain(21..=30).collect();
    assert_eq!(expected, tokens(&messages));
    assert_eq!(15, session.cache().folder_len(&inbox()).unwrap());

    let expunged: Vec<u64> = (1..=10).chain(16..=20).collect();
    assert_eq!(vec![expunged], events.expunged());
}

#[tokio::test]
async fn test_at_most_one_refresh() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![message(1, "")]);
    let remote = Arc::new(FakeRemote::imap().with_messages([message(1, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    let gate = remote.hold();
    let requests: Vec<_> = (0..10)
        .map(|i| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.request_folder_refresh(i % 2 == 0).unwrap() })
        })
        .collect();
    for request in requests {
        request.await.unwrap();
    }
    remote.started().await;

    // checking that the requests collapsed into one refresh
    let state = handle.state().await.unwrap();
    assert!(state.is_refreshing());
    assert!(state.flags.refresh_required);

    gate.send(()).unwrap();
    settle(&handle).await;

    let recent = remote
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::Recent(_)))
        .count();
    assert_eq!(1, recent);
    assert_eq!(RefreshState::Idle, handle.state().await.unwrap().state);
}

#[tokio::test]
async fn test_failed_refresh_completes() {
    common::init_logger();

    let cached = vec![message(1, ""), message(2, "")];
    let (session, _) = session(CacheConfig::new("account"), cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap().with_messages([message(2, "")]));
    remote.fail(Phase::Flags);

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(true).unwrap();
    settle(&handle).await;

    // checking that the failure cleared the in-progress state
    let state = handle.state().await.unwrap();
    assert_eq!(RefreshState::Idle, state.state);
    assert!(state.flags.refresh_required);
    assert!(!state.flags.initial_refresh_complete);
    assert_eq!(vec![false], events.completions());

    // checking that nothing has been pruned
    assert!(events.expunged().is_empty());
    assert_eq!(vec![1, 2], tokens(&handle.get_cached_messages().unwrap()));

    // checking that the next refresh recovers
    remote.heal(Phase::Flags);
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;
    assert_eq!(vec![false, true], events.completions());
    assert_eq!(vec![2], tokens(&handle.get_cached_messages().unwrap()));
}

#[tokio::test]
async fn test_full_fetch_failure_keeps_queued_messages() {
    common::init_logger();

    let cached = vec![message(1, ""), message(2, ""), message(3, "")];
    let (session, _) = session(CacheConfig::new("account"), cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap().with_messages([message(1, ""), message(3, "")]));
    remote.fail(Phase::Full);

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    // checking that the unchecked message is kept
    assert_eq!(vec![1, 2, 3], tokens(&handle.get_cached_messages().unwrap()));
    assert_eq!(vec![false], events.completions());

    let state = handle.state().await.unwrap();
    assert!(state.flags.initial_refresh_complete);
    assert!(state.flags.refresh_required);
}

#[tokio::test]
async fn test_deferred_tasks_run_after_commit() {
    common::init_logger();

    let (session, store) = session(CacheConfig::new("account"), vec![]);
    let remote = Arc::new(FakeRemote::imap().with_messages([message(1, ""), message(2, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    let gate = remote.hold();
    handle.request_folder_refresh(true).unwrap();
    remote.started().await;

    let order = Arc::new(Mutex::new(Vec::new()));
    let first = order.clone();
    handle
        .invoke_after_refresh(move || first.lock().unwrap().push("first"), false)
        .unwrap();

    let second = order.clone();
    let (tx, committed) = oneshot::channel();
    handle
        .invoke_after_refresh(
            move || {
                second.lock().unwrap().push("second");
                let _ = tx.send(store.snapshot().unwrap());
            },
            false,
        )
        .unwrap();

    // checking that the tasks wait for the refresh
    assert_eq!(2, handle.state().await.unwrap().deferred_tasks);
    assert!(order.lock().unwrap().is_empty());

    gate.send(()).unwrap();
    let snapshot = committed.await.unwrap();

    // checking that the tasks ran in order, after the commit
    assert_eq!(vec!["first", "second"], *order.lock().unwrap());
    assert_eq!(vec![1, 2], tokens(&snapshot[&inbox()]));
}

#[tokio::test]
async fn test_failed_recent_fetch_prunes_nothing() {
    common::init_logger();

    let cached = vec![message(1, ""), message(2, "")];
    let (session, _) = session(CacheConfig::new("account"), cached);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap());
    remote.fail(Phase::Recent);

    let handle = session.open_folder(inbox(), remote.clone()).unwrap();
    handle.request_folder_refresh(true).unwrap();
    settle(&handle).await;

    // checking that the pass stopped at the first phase
    assert_eq!(vec![Call::Recent(25)], remote.calls());
    assert_eq!(vec![false], events.completions());

    // checking that the cached messages survived
    assert!(events.expunged().is_empty());
    assert_eq!(vec![1, 2], tokens(&handle.get_cached_messages().unwrap()));

    let state = handle.state().await.unwrap();
    assert_eq!(RefreshState::Idle, state.state);
    assert!(state.flags.refresh_required);
    assert!(!state.flags.initial_refresh_complete);
}

/// Refreshes a folder holding 1, 2 and 3 once, then makes 3 disappear
/// from the recent messages of the server while it still exists.
async fn refreshed_with_unlisted_message() -> (CacheSession, Arc<FakeRemote>, FolderHandle) {
    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let remote = Arc::new(
        FakeRemote::imap().with_messages([message(1, ""), message(2, ""), message(3, "")]),
    );
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;
    assert_eq!(vec![1, 2, 3], tokens(&handle.get_cached_messages().unwrap()));

    remote.unlist(3);
    remote.clear_calls();
    (session, remote, handle)
}

#[tokio::test]
async fn test_newer_orphans_are_skipped_by_default() {
    common::init_logger();

    let (session, remote, handle) = refreshed_with_unlisted_message().await;
    let events = Events::subscribe(session.notifier());

    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    // checking that the incremental pass did not look past the newest
    // recent message
    assert_eq!(vec![Call::Recent(25)], remote.calls());
    assert_eq!(vec![vec![3]], events.expunged());
}

#[tokio::test]
async fn test_check_all_tokens_applies_to_next_pass() {
    common::init_logger();

    let (session, remote, handle) = refreshed_with_unlisted_message().await;
    let events = Events::subscribe(session.notifier());

    handle.check_all_tokens().unwrap();
    assert!(handle.state().await.unwrap().flags.check_all_tokens);

    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    // checking that the newer orphan has been checked and kept
    assert_eq!(
        vec![Call::Recent(25), Call::ByTokens(vec![3], true)],
        remote.calls()
    );
    assert_eq!(vec![1, 2, 3], tokens(&handle.get_cached_messages().unwrap()));
    assert!(events.expunged().is_empty());
    assert!(!handle.state().await.unwrap().flags.check_all_tokens);
}

#[tokio::test]
async fn test_reconnection_checks_all_tokens() {
    common::init_logger();

    let (session, remote, handle) = refreshed_with_unlisted_message().await;
    let events = Events::subscribe(session.notifier());

    handle.disconnected().unwrap();
    handle.prepare_for_use().unwrap();

    // checking that the reconnection forgot the server state
    let state = handle.state().await.unwrap();
    assert!(state.flags.check_all_tokens);
    assert!(!state.flags.initial_refresh_complete);

    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    assert_eq!(
        vec![Call::Recent(25), Call::ByTokens(vec![3], true)],
        remote.calls()
    );
    assert_eq!(vec![1, 2, 3], tokens(&handle.get_cached_messages().unwrap()));
    assert!(events.expunged().is_empty());
}

#[tokio::test]
async fn test_panicking_task_keeps_folder_usable() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::imap().with_messages([message(1, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(false).unwrap();
    let result = handle
        .run_after_refresh::<_, ()>(|| panic!("task failure"), false)
        .await;
    assert!(matches!(result, Err(refresh::Error::DeferredTaskDroppedError)));

    // checking that the folder handler survived the task
    assert!(!handle.is_closed());
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;
    assert_eq!(vec![true, true], events.completions());
    assert_eq!(vec![1], tokens(&handle.get_cached_messages().unwrap()));
}
