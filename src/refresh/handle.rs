// himalaya-cache, a Rust library for email folder caching.
// Copyright (C) 2022  soywod <clement.douin@posteo.net>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::{
    cache,
    notify::{MessageEvent, Notifier},
    CacheConfig, CachedMessage, Flag, FolderId, FolderMessageCache, MessageStructure,
    RemoteFolder, Token,
};

use super::{
    actor::{Command, FolderActor},
    reconciler_for, Error, RefreshSnapshot, Result,
};

/// Marks as seen the cached messages matching the predicate, then
/// commits and notifies. Returns the tokens of the marked messages.
fn mark_seen<P>(
    cache: &FolderMessageCache,
    notifier: &Notifier,
    folder: &FolderId,
    predicate: P,
) -> cache::Result<Vec<Token>>
where
    P: Fn(&CachedMessage) -> bool,
{
    let mut marked = Vec::new();

    for mut message in cache.get_folder_messages(folder)? {
        if message.flags.is_seen() || !predicate(&message) {
            continue;
        }

        message.flags.insert(Flag::Seen);
        if cache.update_folder_message(folder, &message)? {
            marked.push(message);
        }
    }

    if marked.is_empty() {
        return Ok(Vec::new());
    }

    cache.commit()?;

    Ok(marked
        .into_iter()
        .map(|message| {
            notifier.emit_message(MessageEvent::FlagsChanged {
                folder: folder.clone(),
                token: message.token,
                flags: message.flags,
            });
            message.token
        })
        .collect())
}

/// The handle of a folder actor.
///
/// Cloning a handle is cheap, every clone drives the same actor. The
/// actor stops once closed or once every handle is dropped.
#[derive(Clone)]
pub struct FolderHandle {
    folder: FolderId,
    tx: mpsc::UnboundedSender<Command>,
    cache: Arc<FolderMessageCache>,
    notifier: Notifier,
    remote: Arc<dyn RemoteFolder>,
}

impl FolderHandle {
    /// Spawns the actor of the given folder on the current tokio
    /// runtime. The reconciler is selected from the remote
    /// capabilities.
    pub fn spawn(
        folder: FolderId,
        cache: Arc<FolderMessageCache>,
        notifier: Notifier,
        config: Arc<CacheConfig>,
        remote: Arc<dyn RemoteFolder>,
    ) -> Result<Self> {
        let reconciler = reconciler_for(remote.clone())?;
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = FolderActor::new(
            folder.clone(),
            cache.clone(),
            notifier.clone(),
            config,
            reconciler,
            rx,
        );
        tokio::spawn(actor.run());

        Ok(Self {
            folder,
            tx,
            cache,
            notifier,
            remote,
        })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.tx
            .send(cmd)
            .map_err(|_| Error::FolderHandlerClosedError(self.folder.clone()))
    }

    pub fn folder(&self) -> &FolderId {
        &self.folder
    }

    /// Whether the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Requests a refresh. Requests received while a refresh is
    /// running are collapsed into a required refresh.
    pub fn request_folder_refresh(&self, deliberate: bool) -> Result<()> {
        self.send(Command::RequestRefresh { deliberate })
    }

    /// Marks the folder as needing a refresh, without starting one.
    pub fn request_folder_refresh_required(&self) -> Result<()> {
        self.send(Command::RequestRefreshRequired)
    }

    /// Makes the next pass check every cached token.
    pub fn check_all_tokens(&self) -> Result<()> {
        self.send(Command::CheckAllTokens)
    }

    /// Runs the task once the folder state is up to date: after the
    /// running refresh if any, after a new one if one is needed and
    /// `trigger_refresh` is set, right away otherwise.
    ///
    /// The task runs on the folder actor, it must not block. A panicking
    /// task is logged and skipped, the actor keeps serving the folder.
    pub fn invoke_after_refresh<F>(&self, task: F, trigger_refresh: bool) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Command::InvokeAfterRefresh {
            task: Box::new(task),
            trigger_refresh,
        })
    }

    /// Same as [`FolderHandle::invoke_after_refresh`], resolving to
    /// the result of the task.
    pub async fn run_after_refresh<F, T>(&self, task: F, trigger_refresh: bool) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.invoke_after_refresh(
            move || {
                let _ = tx.send(task());
            },
            trigger_refresh,
        )?;
        rx.await.map_err(|_| Error::DeferredTaskDroppedError)
    }

    /// Tells the folder that the connection has been lost.
    pub fn disconnected(&self) -> Result<()> {
        self.send(Command::Disconnected)
    }

    /// Tells the folder that the connection is back. Starts the
    /// refresh requested while disconnected, if any.
    pub fn prepare_for_use(&self) -> Result<()> {
        self.send(Command::PrepareForUse)
    }

    pub async fn state(&self) -> Result<RefreshSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply })?;
        rx.await.map_err(|_| Error::ReceiveReplyError)
    }

    /// Stops the actor, once the running refresh completes.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Close { reply })?;
        rx.await.map_err(|_| Error::ReceiveReplyError)
    }

    pub fn get_cached_messages(&self) -> Result<Vec<CachedMessage>> {
        Ok(self.cache.get_folder_messages(&self.folder)?)
    }

    pub fn get_cached_message_structure(&self, token: &Token) -> Result<Option<MessageStructure>> {
        Ok(self
            .cache
            .get_folder_message(&self.folder, token)?
            .and_then(|message| message.structure))
    }

    async fn mark_seen_after_refresh<P>(&self, predicate: P) -> Result<Vec<Token>>
    where
        P: Fn(&CachedMessage) -> bool + Send + 'static,
    {
        let cache = self.cache.clone();
        let notifier = self.notifier.clone();
        let folder = self.folder.clone();

        let marked = self
            .run_after_refresh(move || mark_seen(&cache, &notifier, &folder, predicate), true)
            .await??;

        debug!("marked {} message(s) of {} as seen", marked.len(), self.folder);
        Ok(marked)
    }

    /// Marks the message as seen in the cache, then on the server when
    /// it can store flags. Returns `false` if the message was already
    /// seen or is unknown.
    ///
    /// A failure to store the flag on the server is logged only, the
    /// cache stays marked.
    pub async fn set_folder_message_seen(&self, token: Token) -> Result<bool> {
        let marked = self
            .mark_seen_after_refresh(move |message| message.token == token)
            .await?;

        if marked.is_empty() {
            return Ok(false);
        }

        if !self.remote.capabilities().has_flags {
            debug!("server of folder {} cannot store flags, keeping seen flag local", self.folder);
        } else if let Err(err) = self.remote.store_seen(&marked).await {
            warn!("cannot store seen flag of message {token} on server: {err}");
        }

        Ok(true)
    }

    /// Marks the message as seen in the cache only.
    pub async fn set_folder_message_seen_cache_only(&self, token: Token) -> Result<bool> {
        let marked = self
            .mark_seen_after_refresh(move |message| message.token == token)
            .await?;
        Ok(!marked.is_empty())
    }

    /// Marks as seen, in the cache only, the messages sent before the
    /// given date. Returns the number of marked messages.
    pub async fn mark_messages_seen_before(&self, date: DateTime<Utc>) -> Result<usize> {
        let marked = self
            .mark_seen_after_refresh(move |message| {
                message
                    .envelope
                    .as_ref()
                    .map(|envelope| envelope.is_before(&date))
                    .unwrap_or(false)
            })
            .await?;
        Ok(marked.len())
    }
}
