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

//! Memory store module.
//!
//! This module contains an in-process implementation of the
//! persisted folder cache store. Clones share the same storage, which
//! lets a new cache instance be opened over what a previous one
//! committed.

use log::debug;
use std::sync::{Arc, Mutex};

use crate::{CachedMessage, FolderId};

use super::{CommitBatch, Error, FolderCacheStore, Result, StoreSnapshot};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<StoreSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything committed so far.
    pub fn snapshot(&self) -> Result<StoreSnapshot> {
        self.data
            .lock()
            .map(|data| data.clone())
            .map_err(|err| Error::LockMemoryStoreError(err.to_string()))
    }

    fn with_data<T>(&self, f: impl FnOnce(&mut StoreSnapshot) -> T) -> Result<T> {
        let mut data = self
            .data
            .lock()
            .map_err(|err| Error::LockMemoryStoreError(err.to_string()))?;
        Ok(f(&mut data))
    }
}

impl FolderCacheStore for MemoryStore {
    fn load_folders(&mut self) -> Result<Vec<FolderId>> {
        self.with_data(|data| data.keys().cloned().collect())
    }

    fn load_messages(&mut self, folder: &FolderId) -> Result<Vec<CachedMessage>> {
        self.with_data(|data| data.get(folder).cloned().unwrap_or_default())
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<()> {
        debug!(
            "committing {} folder(s), removing {} folder(s)",
            batch.upserts.len(),
            batch.removals.len()
        );

        // the batch is applied under one lock, readers never see half
        // of it
        self.with_data(|data| {
            for folder in batch.removals {
                data.remove(&folder);
            }
            for (folder, messages) in batch.upserts {
                data.insert(folder, messages);
            }
        })
    }

    fn destroy(&mut self) -> Result<()> {
        self.with_data(|data| data.clear())
    }
}
