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

//! Session module.
//!
//! This module contains the [`CacheSession`], the owner of the cache
//! of an account, of its notifier and of its folder handlers.

use futures::{stream::FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::{
    collections::HashMap,
    result,
    sync::{Arc, Mutex, MutexGuard},
};
use thiserror::Error;

use crate::{
    cache,
    notify::{FolderSubscriber, MessageSubscriber, Notifier, SubscriptionId},
    refresh,
    store::{self, FolderCacheStore, SqliteStore},
    CacheConfig, FolderHandle, FolderId, FolderIds, FolderMessageCache, RemoteFolder,
};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot lock folder handlers: {0}")]
    LockHandlersError(String),

    #[error(transparent)]
    CacheError(#[from] cache::Error),
    #[error(transparent)]
    StoreError(#[from] store::Error),
    #[error(transparent)]
    RefreshError(#[from] refresh::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the cache session of an account.
///
/// The session is explicitly constructed and owned by the caller,
/// dropping it drops every folder handle it holds.
pub struct CacheSession {
    config: Arc<CacheConfig>,
    cache: Arc<FolderMessageCache>,
    notifier: Notifier,
    handles: Mutex<HashMap<FolderId, FolderHandle>>,
}

impl CacheSession {
    /// Opens a session over the given store, restoring the known
    /// folders.
    pub fn open<S>(config: CacheConfig, store: S) -> Result<Self>
    where
        S: FolderCacheStore + 'static,
    {
        let cache = FolderMessageCache::new(store, config.sort_order);
        cache.restore()?;

        info!("cache session of account {} opened", config.name);

        Ok(Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            notifier: Notifier::new(),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Opens a session over the sqlite database of the sync
    /// directory.
    pub fn open_sqlite(config: CacheConfig) -> Result<Self> {
        let store = SqliteStore::from_config(&config)?;
        Self::open(config, store)
    }

    fn handles(&self) -> Result<MutexGuard<'_, HashMap<FolderId, FolderHandle>>> {
        self.handles
            .lock()
            .map_err(|err| Error::LockHandlersError(err.to_string()))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<FolderMessageCache> {
        &self.cache
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Lists the cached folders.
    pub fn folders(&self) -> Result<FolderIds> {
        Ok(self.cache.get_folders()?)
    }

    pub fn subscribe_folder_events<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: FolderSubscriber + 'static,
    {
        self.notifier.subscribe_folder_events(subscriber)
    }

    pub fn subscribe_message_events<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: MessageSubscriber + 'static,
    {
        self.notifier.subscribe_message_events(subscriber)
    }

    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Returns the handle of the folder, spawning its actor if not
    /// running yet. Must be called within a tokio runtime.
    pub fn open_folder(
        &self,
        folder: FolderId,
        remote: Arc<dyn RemoteFolder>,
    ) -> Result<FolderHandle> {
        let mut handles = self.handles()?;

        if let Some(handle) = handles.get(&folder) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        debug!("opening folder {folder}");
        let handle = FolderHandle::spawn(
            folder.clone(),
            self.cache.clone(),
            self.notifier.clone(),
            self.config.clone(),
            remote,
        )?;
        handles.insert(folder, handle.clone());

        Ok(handle)
    }

    pub fn folder(&self, folder: &FolderId) -> Result<Option<FolderHandle>> {
        Ok(self.handles()?.get(folder).cloned())
    }

    fn open_handles(&self) -> Result<Vec<FolderHandle>> {
        Ok(self.handles()?.values().cloned().collect())
    }

    /// Tells every open folder that the connection has been lost.
    pub fn disconnect_all(&self) -> Result<()> {
        for handle in self.open_handles()? {
            if let Err(err) = handle.disconnected() {
                warn!("cannot disconnect folder {}: {err}", handle.folder());
            }
        }
        Ok(())
    }

    /// Tells every open folder that the connection is back.
    pub fn reconnect_all(&self) -> Result<()> {
        for handle in self.open_handles()? {
            if let Err(err) = handle.prepare_for_use() {
                warn!("cannot prepare folder {} for use: {err}", handle.folder());
            }
        }
        Ok(())
    }

    /// Closes the folder handler, then purges the folder from the
    /// cache. Returns `false` if the folder was not cached.
    pub async fn remove_folder(&self, folder: &FolderId) -> Result<bool> {
        let handle = self.handles()?.remove(folder);

        if let Some(handle) = handle {
            if let Err(err) = handle.close().await {
                warn!("cannot close folder {folder}: {err}");
            }
        }

        let removed = self.cache.remove_folder(folder)?;
        self.cache.commit()?;

        debug!("folder {folder} removed");
        Ok(removed)
    }

    /// Closes every folder handler, waiting for running refreshes,
    /// then commits the cache.
    pub async fn close(&self) -> Result<()> {
        let handles: Vec<FolderHandle> = self.handles()?.drain().map(|(_, h)| h).collect();

        let mut closing = FuturesUnordered::from_iter(handles.into_iter().map(|handle| async move {
            if let Err(err) = handle.close().await {
                warn!("cannot close folder {}: {err}", handle.folder());
            }
        }));
        while closing.next().await.is_some() {}

        self.cache.commit()?;

        info!("cache session of account {} closed", self.config.name);
        Ok(())
    }
}
