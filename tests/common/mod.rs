#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::{
    collections::{BTreeMap, HashSet},
    sync::{Arc, Mutex},
};
use tokio::sync::{oneshot, Notify};

use himalaya_cache::{
    backend,
    notify::{Expunged, FolderEvent, MessageEvent, Notifier},
    store::MemoryStore,
    CacheConfig, CacheSession, CachedMessage, Capabilities, Envelope, FolderHandle, FolderId,
    Mailbox, MessageStructure, RemoteFolder, Token,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn inbox() -> FolderId {
    FolderId::new("account:INBOX", "INBOX")
}

pub fn date(token: u64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_600_000_000 + token as i64 * 86_400, 0)
        .unwrap()
}

/// Builds a fully fetched message, dated one day after the previous
/// token.
pub fn message(token: u64, flags: &str) -> CachedMessage {
    CachedMessage::new(token, token as u32)
        .with_flags(flags)
        .with_envelope(
            Envelope::new(
                format!("<{token}@localhost>"),
                Mailbox::new_nameless("alice@localhost"),
                format!("message {token}"),
            )
            .with_date(date(token)),
        )
        .with_structure(MessageStructure::new("text/plain", 42))
}

pub fn tokens(messages: &[CachedMessage]) -> Vec<u64> {
    let mut tokens: Vec<u64> = messages.iter().map(|m| m.token.as_u64()).collect();
    tokens.sort();
    tokens
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    Recent(usize),
    ByTokens(Vec<u64>, bool),
    IndexMap,
    StoreSeen(Vec<u64>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Phase {
    Recent,
    Flags,
    Full,
    IndexMap,
    StoreSeen,
}

#[derive(Default)]
struct State {
    messages: BTreeMap<Token, CachedMessage>,
    calls: Vec<Call>,
    failing: HashSet<Phase>,
    unlisted: HashSet<Token>,
}

/// A scripted remote folder.
pub struct FakeRemote {
    capabilities: Capabilities,
    state: Mutex<State>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    started: Notify,
}

impl FakeRemote {
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            state: Mutex::default(),
            gate: Mutex::default(),
            started: Notify::new(),
        }
    }

    pub fn imap() -> Self {
        Self::new(Capabilities::imap())
    }

    pub fn pop() -> Self {
        Self::new(Capabilities::pop())
    }

    pub fn with_messages<I: IntoIterator<Item = CachedMessage>>(self, messages: I) -> Self {
        for message in messages {
            self.insert(message);
        }
        self
    }

    pub fn insert(&self, message: CachedMessage) {
        let mut state = self.state.lock().unwrap();
        state.messages.insert(message.token, message);
    }

    pub fn remove(&self, token: u64) {
        self.state.lock().unwrap().messages.remove(&Token(token));
    }

    /// Leaves the message out of the recent messages, as a server
    /// would for a message it does not consider recent.
    pub fn unlist(&self, token: u64) {
        self.state.lock().unwrap().unlisted.insert(Token(token));
    }

    pub fn fail(&self, phase: Phase) {
        self.state.lock().unwrap().failing.insert(phase);
    }

    pub fn heal(&self, phase: Phase) {
        self.state.lock().unwrap().failing.remove(&phase);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Holds the next first-phase fetch open until the returned sender
    /// is used or dropped.
    pub fn hold(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    /// Waits for a first-phase fetch to start.
    pub async fn started(&self) {
        self.started.notified().await
    }

    fn record(&self, call: Call, phase: Phase) -> backend::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.failing.contains(&phase) {
            Err(backend::Error::FetchError(format!("{phase:?} failed")))
        } else {
            Ok(())
        }
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().take();
        self.started.notify_one();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
    }
}

fn flags_only(message: &CachedMessage) -> CachedMessage {
    CachedMessage::new(message.token, message.index).with_flags(message.flags.clone())
}

#[async_trait]
impl RemoteFolder for FakeRemote {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn fetch_recent_messages(&self, limit: usize) -> backend::Result<Vec<CachedMessage>> {
        self.wait_gate().await;
        self.record(Call::Recent(limit), Phase::Recent)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .values()
            .rev()
            .filter(|message| !state.unlisted.contains(&message.token))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn fetch_messages_by_tokens(
        &self,
        tokens: &[Token],
        flags: bool,
    ) -> backend::Result<Vec<CachedMessage>> {
        let call = Call::ByTokens(tokens.iter().map(Token::as_u64).collect(), flags);
        let phase = if flags { Phase::Flags } else { Phase::Full };
        self.record(call, phase)?;

        let state = self.state.lock().unwrap();
        Ok(tokens
            .iter()
            .filter_map(|token| state.messages.get(token))
            .map(|message| {
                if flags {
                    flags_only(message)
                } else {
                    message.clone()
                }
            })
            .collect())
    }

    async fn fetch_index_map(&self) -> backend::Result<Vec<CachedMessage>> {
        self.wait_gate().await;
        self.record(Call::IndexMap, Phase::IndexMap)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .messages
            .values()
            .map(|m| CachedMessage::new(m.token, m.index))
            .collect())
    }

    async fn store_seen(&self, tokens: &[Token]) -> backend::Result<()> {
        let call = Call::StoreSeen(tokens.iter().map(Token::as_u64).collect());
        self.record(call, Phase::StoreSeen)
    }
}

/// Collects the events of a notifier.
#[derive(Clone, Default)]
pub struct Events {
    folder: Arc<Mutex<Vec<FolderEvent>>>,
    message: Arc<Mutex<Vec<MessageEvent>>>,
}

impl Events {
    pub fn subscribe(notifier: &Notifier) -> Self {
        let events = Self::default();

        let folder = events.folder.clone();
        notifier.subscribe_folder_events(move |event: &FolderEvent| {
            folder.lock().unwrap().push(event.clone())
        });

        let message = events.message.clone();
        notifier.subscribe_message_events(move |event: &MessageEvent| {
            message.lock().unwrap().push(event.clone())
        });

        events
    }

    pub fn folder_events(&self) -> Vec<FolderEvent> {
        self.folder.lock().unwrap().clone()
    }

    pub fn expunged(&self) -> Vec<Vec<u64>> {
        self.folder_events()
            .into_iter()
            .filter_map(|event| match event {
                FolderEvent::Expunged {
                    expunged: Expunged::Tokens(tokens),
                    ..
                } => Some(tokens.iter().map(Token::as_u64).collect()),
                _ => None,
            })
            .collect()
    }

    pub fn expunged_indexes(&self) -> Vec<Vec<u32>> {
        self.folder_events()
            .into_iter()
            .filter_map(|event| match event {
                FolderEvent::Expunged {
                    expunged: Expunged::Indexes(indexes),
                    ..
                } => Some(indexes),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<bool> {
        self.folder_events()
            .into_iter()
            .filter_map(|event| match event {
                FolderEvent::RefreshCompleted { success, .. } => Some(success),
                _ => None,
            })
            .collect()
    }

    pub fn flag_changes(&self) -> Vec<u64> {
        self.message
            .lock()
            .unwrap()
            .iter()
            .map(|MessageEvent::FlagsChanged { token, .. }| token.as_u64())
            .collect()
    }
}

/// Waits for the running refresh of the folder, if any.
pub async fn settle(handle: &FolderHandle) {
    handle.run_after_refresh(|| (), false).await.unwrap()
}

/// Opens a session over a memory store holding the given cached
/// messages of the inbox.
pub fn session(config: CacheConfig, cached: Vec<CachedMessage>) -> (CacheSession, MemoryStore) {
    let store = MemoryStore::new();
    let session = CacheSession::open(config, store.clone()).unwrap();
    for message in cached {
        session.cache().add_folder_message(&inbox(), message).unwrap();
    }
    session.cache().commit().unwrap();
    (session, store)
}
