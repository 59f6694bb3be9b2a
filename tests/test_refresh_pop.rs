#![cfg(feature = "pop")]

mod common;

use std::sync::Arc;

use himalaya_cache::{CacheConfig, RefreshState, Token};

use common::{date, inbox, message, session, settle, tokens, Call, Events, FakeRemote};

#[tokio::test]
async fn test_pop_refreshes_once_per_connection() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::pop().with_messages((1..=3).map(|t| message(t, ""))));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(true).unwrap();
    settle(&handle).await;

    // checking the two phases
    assert_eq!(
        vec![Call::IndexMap, Call::ByTokens(vec![3, 2, 1], false)],
        remote.calls()
    );
    assert_eq!(vec![1, 2, 3], tokens(&handle.get_cached_messages().unwrap()));

    // checking that a refresh within the same connection is a no-op
    remote.clear_calls();
    handle.request_folder_refresh(true).unwrap();
    settle(&handle).await;
    assert!(remote.calls().is_empty());

    // checking that a reconnection reconciles again
    remote.remove(2);
    remote.insert(message(4, ""));
    handle.disconnected().unwrap();
    handle.prepare_for_use().unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    assert_eq!(
        vec![Call::IndexMap, Call::ByTokens(vec![4], false)],
        remote.calls()
    );
    assert_eq!(vec![1, 3, 4], tokens(&handle.get_cached_messages().unwrap()));

    // checking that the vanished message is reported by its index
    assert_eq!(vec![vec![2]], events.expunged_indexes());
    assert!(events.expunged().is_empty());
}

#[tokio::test]
async fn test_refresh_pending_while_disconnected() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::pop().with_messages([message(1, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.disconnected().unwrap();
    handle.request_folder_refresh(true).unwrap();

    // checking that the refresh waits for the connection
    let state = handle.state().await.unwrap();
    assert_eq!(RefreshState::RefreshPending, state.state);
    assert!(state.flags.deliberate);
    assert!(remote.calls().is_empty());

    handle.prepare_for_use().unwrap();
    settle(&handle).await;

    assert_eq!(
        vec![Call::IndexMap, Call::ByTokens(vec![1], false)],
        remote.calls()
    );
    assert_eq!(vec![true], events.completions());
    assert_eq!(RefreshState::Idle, handle.state().await.unwrap().state);
}

#[tokio::test]
async fn test_mark_messages_seen_before() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let events = Events::subscribe(session.notifier());
    let remote = Arc::new(FakeRemote::pop().with_messages((1..=4).map(|t| message(t, ""))));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(false).unwrap();
    let marked = handle.mark_messages_seen_before(date(3)).await.unwrap();

    // checking that only the older messages were marked
    assert_eq!(2, marked);
    let seen: Vec<u64> = handle
        .get_cached_messages()
        .unwrap()
        .into_iter()
        .filter(|message| message.flags.is_seen())
        .map(|message| message.token.as_u64())
        .collect();
    assert_eq!(vec![2, 1], seen);

    let mut changes = events.flag_changes();
    changes.sort();
    assert_eq!(vec![1, 2], changes);

    // checking that the server was not involved
    assert!(!remote
        .calls()
        .iter()
        .any(|call| matches!(call, Call::StoreSeen(_))));
}

#[tokio::test]
async fn test_pop_keeps_local_flags() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let remote = Arc::new(FakeRemote::pop().with_messages([message(1, ""), message(2, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    assert!(handle
        .set_folder_message_seen_cache_only(Token(1))
        .await
        .unwrap());
    assert!(!handle
        .set_folder_message_seen_cache_only(Token(1))
        .await
        .unwrap());

    // checking that the seen flag survives a reconciliation
    handle.disconnected().unwrap();
    handle.prepare_for_use().unwrap();
    handle.request_folder_refresh(false).unwrap();
    settle(&handle).await;

    let first = session
        .cache()
        .get_folder_message(&inbox(), &Token(1))
        .unwrap()
        .unwrap();
    assert!(first.flags.is_seen());
    assert_eq!(2, remote.calls().iter().filter(|c| **c == Call::IndexMap).count());
}

#[tokio::test]
async fn test_seen_flag_stays_local() {
    common::init_logger();

    let (session, _) = session(CacheConfig::new("account"), vec![]);
    let remote = Arc::new(FakeRemote::pop().with_messages([message(1, "")]));
    let handle = session.open_folder(inbox(), remote.clone()).unwrap();

    handle.request_folder_refresh(false).unwrap();
    assert!(handle.set_folder_message_seen(Token(1)).await.unwrap());

    // checking that the server, unable to store flags, was not asked to
    assert!(handle.get_cached_messages().unwrap()[0].flags.is_seen());
    assert!(!remote
        .calls()
        .iter()
        .any(|call| matches!(call, Call::StoreSeen(_))));
}
