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

//! Store module.
//!
//! This module contains the persisted folder cache store: the
//! durable key to blob storage behind the folder message cache. A
//! store is opaque to the cache, it only needs to give back what
//! has been committed, and to commit atomically.

pub mod memory;
pub mod sqlite;

use log::warn;
use std::{collections::BTreeMap, io, path::PathBuf, result};
use thiserror::Error;

use crate::{account, CachedMessage, FolderId, Token};

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot create sync directory {1}")]
    CreateSyncDirError(#[source] io::Error, PathBuf),
    #[error("cannot serialize message {2} of folder {1}")]
    SerializeMessageError(#[source] serde_json::Error, FolderId, Token),
    #[error("cannot deserialize message {2} of folder {1}")]
    DeserializeMessageError(#[source] serde_json::Error, FolderId, Token),
    #[error("cannot load folder {0}: message {1} is stored under token {2}")]
    MismatchTokenError(FolderId, Token, Token),
    #[error("cannot lock memory store: {0}")]
    LockMemoryStoreError(String),

    #[error(transparent)]
    ConfigError(#[from] account::config::Error),
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the full content of a store: every folder with its
/// records.
pub type StoreSnapshot = BTreeMap<FolderId, Vec<CachedMessage>>;

/// Represents the mutations flushed by a cache commit.
///
/// Every upserted folder is written as a whole, replacing what the
/// store held for it before.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommitBatch {
    pub upserts: Vec<(FolderId, Vec<CachedMessage>)>,
    pub removals: Vec<FolderId>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}

/// The persisted folder cache store.
pub trait FolderCacheStore: Send {
    /// Lists the identities of the committed folders.
    fn load_folders(&mut self) -> Result<Vec<FolderId>>;

    /// Loads the committed records of the given folder.
    fn load_messages(&mut self, folder: &FolderId) -> Result<Vec<CachedMessage>>;

    /// Persists the given batch. Either the whole batch is visible
    /// on the next load, or none of it.
    fn commit(&mut self, batch: CommitBatch) -> Result<()>;

    /// Removes all the persisted data, irrecoverably.
    fn destroy(&mut self) -> Result<()>;

    /// Loads everything. A folder that cannot be loaded is considered
    /// empty rather than failing the whole store.
    fn load(&mut self) -> Result<StoreSnapshot> {
        let mut snapshot = StoreSnapshot::new();

        for folder in self.load_folders()? {
            let messages = self.load_messages(&folder).unwrap_or_else(|err| {
                warn!("cannot load folder {folder}, considering it empty: {err}");
                Vec::new()
            });
            snapshot.insert(folder, messages);
        }

        Ok(snapshot)
    }
}

impl<S: FolderCacheStore + ?Sized> FolderCacheStore for Box<S> {
    fn load_folders(&mut self) -> Result<Vec<FolderId>> {
        (**self).load_folders()
    }

    fn load_messages(&mut self, folder: &FolderId) -> Result<Vec<CachedMessage>> {
        (**self).load_messages(folder)
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<()> {
        (**self).commit(batch)
    }

    fn destroy(&mut self) -> Result<()> {
        (**self).destroy()
    }
}
