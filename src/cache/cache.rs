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

use log::{debug, trace, warn};
use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use crate::{
    store::{CommitBatch, FolderCacheStore},
    CachedMessage, FolderId, FolderIds, SortOrder, Token,
};

use super::{Error, FolderEntry, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Status {
    Created,
    Restored,
    Destroyed,
}

struct CacheState {
    store: Box<dyn FolderCacheStore>,
    status: Status,
    /// Known folders, `None` until materialized from the store.
    folders: HashMap<FolderId, Option<FolderEntry>>,
    dirty: HashSet<FolderId>,
    removed: HashSet<FolderId>,
}

impl CacheState {
    fn check_usable(&self) -> Result<()> {
        match self.status {
            Status::Restored => Ok(()),
            Status::Created => Err(Error::NotRestoredError),
            Status::Destroyed => Err(Error::DestroyedError),
        }
    }

    /// Gets the entry of a known folder, loading it from the store on
    /// first touch. A folder that cannot be loaded starts empty.
    fn entry(&mut self, folder: &FolderId, order: SortOrder) -> Option<&mut FolderEntry> {
        let store = &mut self.store;
        let slot = self.folders.get_mut(folder)?;

        if slot.is_none() {
            let messages = store.load_messages(folder).unwrap_or_else(|err| {
                warn!("cannot load folder {folder}, considering it empty: {err}");
                Vec::new()
            });
            debug!("materialized folder {folder} with {} messages", messages.len());
            *slot = Some(FolderEntry::from_messages(folder.clone(), order, messages));
        }

        slot.as_mut()
    }

    fn entry_or_create(&mut self, folder: &FolderId, order: SortOrder) -> &mut FolderEntry {
        self.removed.remove(folder);

        if self.folders.contains_key(folder) {
            // materializes the known folder before touching it
            self.entry(folder, order);
        } else {
            debug!("creating cache entry for folder {folder}");
        }

        self.folders
            .entry(folder.clone())
            .or_insert(None)
            .get_or_insert_with(|| FolderEntry::new(folder.clone(), order))
    }

    fn drop_folder(&mut self, folder: &FolderId) -> bool {
        self.dirty.remove(folder);
        if self.folders.remove(folder).is_some() {
            self.removed.insert(folder.clone());
            true
        } else {
            false
        }
    }
}

/// The folder message cache.
///
/// Every operation is serialized against a single lock, so readers
/// never observe a half-updated folder. Mutations are visible
/// immediately but only durable after [`FolderMessageCache::commit`].
pub struct FolderMessageCache {
    order: SortOrder,
    state: Mutex<CacheState>,
}

impl FolderMessageCache {
    pub fn new<S>(store: S, order: SortOrder) -> Self
    where
        S: FolderCacheStore + 'static,
    {
        Self {
            order,
            state: Mutex::new(CacheState {
                store: Box::new(store),
                status: Status::Created,
                folders: HashMap::new(),
                dirty: HashSet::new(),
                removed: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, CacheState>> {
        self.state
            .lock()
            .map_err(|err| Error::LockCacheError(err.to_string()))
    }

    fn lock_usable(&self) -> Result<MutexGuard<'_, CacheState>> {
        let state = self.lock()?;
        state.check_usable()?;
        Ok(state)
    }

    /// Learns which folders exist from the store, without
    /// materializing their messages. Must be called once, before any
    /// other operation.
    pub fn restore(&self) -> Result<()> {
        let mut state = self.lock()?;

        match state.status {
            Status::Destroyed => return Err(Error::DestroyedError),
            Status::Restored => {
                warn!("folder cache already restored, skipping it");
                return Ok(());
            }
            Status::Created => (),
        }

        let folders = state.store.load_folders().unwrap_or_else(|err| {
            warn!("cannot restore folder cache, starting from scratch: {err}");
            Vec::new()
        });

        debug!("restored {} folder(s)", folders.len());
        trace!("restored folders: {:#?}", folders);

        state.folders = folders.into_iter().map(|f| (f, None)).collect();
        state.status = Status::Restored;

        Ok(())
    }

    /// Returns the snapshot of the known folders.
    pub fn get_folders(&self) -> Result<FolderIds> {
        let state = self.lock_usable()?;
        Ok(state.folders.keys().cloned().collect())
    }

    pub fn contains_folder(&self, folder: &FolderId) -> Result<bool> {
        Ok(self.lock_usable()?.folders.contains_key(folder))
    }

    /// Returns the snapshot of the records of the given folder, in
    /// the cache sort order.
    pub fn get_folder_messages(&self, folder: &FolderId) -> Result<Vec<CachedMessage>> {
        let mut state = self.lock_usable()?;
        Ok(state
            .entry(folder, self.order)
            .map(|entry| entry.messages())
            .unwrap_or_default())
    }

    pub fn get_folder_message(
        &self,
        folder: &FolderId,
        token: &Token,
    ) -> Result<Option<CachedMessage>> {
        let mut state = self.lock_usable()?;
        Ok(state
            .entry(folder, self.order)
            .and_then(|entry| entry.get(token))
            .cloned())
    }

    pub fn folder_len(&self, folder: &FolderId) -> Result<usize> {
        let mut state = self.lock_usable()?;
        Ok(state
            .entry(folder, self.order)
            .map(|entry| entry.len())
            .unwrap_or_default())
    }

    /// Adds the record to the folder, creating the folder if needed.
    /// Adding a known token is a no-op and returns `false`.
    pub fn add_folder_message(&self, folder: &FolderId, message: CachedMessage) -> Result<bool> {
        let mut state = self.lock_usable()?;
        let inserted = state.entry_or_create(folder, self.order).insert(message);
        if inserted {
            state.dirty.insert(folder.clone());
        }
        Ok(inserted)
    }

    /// Updates the ordering index and the flags of a known record.
    /// Returns `false` if the token is unknown, meaning that the
    /// message needs to be fetched rather than updated.
    pub fn update_folder_message(&self, folder: &FolderId, message: &CachedMessage) -> Result<bool> {
        let mut state = self.lock_usable()?;
        let updated = match state.entry(folder, self.order) {
            Some(entry) => entry.update(message),
            None => false,
        };
        if updated {
            state.dirty.insert(folder.clone());
        }
        Ok(updated)
    }

    /// Replaces a record with a freshly fetched one (metadata
    /// included), inserting it if unknown.
    pub fn populate_folder_message(&self, folder: &FolderId, message: CachedMessage) -> Result<()> {
        let mut state = self.lock_usable()?;
        state.entry_or_create(folder, self.order).populate(message);
        state.dirty.insert(folder.clone());
        Ok(())
    }

    /// Removes the record matching the given token. Removing the last
    /// record of a folder drops the folder itself.
    pub fn remove_folder_message(
        &self,
        folder: &FolderId,
        token: &Token,
    ) -> Result<Option<CachedMessage>> {
        let mut state = self.lock_usable()?;

        let (removed, empty) = match state.entry(folder, self.order) {
            Some(entry) => {
                let removed = entry.remove(token);
                (removed, entry.is_empty())
            }
            None => (None, false),
        };

        if removed.is_some() {
            if empty {
                debug!("folder {folder} is now empty, dropping it");
                state.drop_folder(folder);
            } else {
                state.dirty.insert(folder.clone());
            }
        }

        Ok(removed)
    }

    /// Removes the folder and all its records.
    pub fn remove_folder(&self, folder: &FolderId) -> Result<bool> {
        let mut state = self.lock_usable()?;
        Ok(state.drop_folder(folder))
    }

    /// Flushes the pending mutations to the store.
    ///
    /// A store failure is logged and swallowed, the mutations stay
    /// pending and the next commit tries again.
    pub fn commit(&self) -> Result<()> {
        let mut state = self.lock_usable()?;

        let mut batch = CommitBatch::default();
        batch.removals.extend(state.removed.iter().cloned());

        for folder in state.dirty.iter() {
            match state.folders.get(folder) {
                Some(Some(entry)) if entry.is_empty() => {
                    batch.removals.push(folder.clone());
                }
                Some(Some(entry)) => {
                    batch.upserts.push((folder.clone(), entry.messages()));
                }
                _ => (),
            }
        }

        if batch.is_empty() {
            trace!("nothing to commit");
            return Ok(());
        }

        match state.store.commit(batch) {
            Ok(()) => {
                state.dirty.clear();
                state.removed.clear();
            }
            Err(err) => {
                warn!("cannot commit folder cache, keeping changes pending: {err}");
            }
        }

        Ok(())
    }

    /// Destroys the cache and its persisted data, irreversibly. The
    /// cache cannot be used anymore afterwards.
    pub fn destroy(&self) -> Result<()> {
        let mut state = self.lock()?;

        if let Err(err) = state.store.destroy() {
            warn!("cannot destroy persisted folder cache: {err}");
        }

        state.folders.clear();
        state.dirty.clear();
        state.removed.clear();
        state.status = Status::Destroyed;

        Ok(())
    }
}
