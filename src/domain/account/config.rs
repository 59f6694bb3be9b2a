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

//! Config module.
//!
//! This module contains the representation of the cache
//! configuration of the user account.

use dirs::data_dir;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf, result};
use thiserror::Error;

pub const DEFAULT_INITIAL_FOLDER_MESSAGES: usize = 25;
pub const DEFAULT_SYNC_DIR_NAME: &str = "himalaya";

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot get XDG_DATA_HOME directory")]
    GetXdgDataDirError,
    #[error("cannot expand sync directory {1}")]
    ExpandSyncDirError(#[source] shellexpand::LookupError<env::VarError>, String),
}

pub type Result<T> = result::Result<T, Error>;

/// Represents the order of the messages of a folder cache entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Oldest arrival first.
    Ascending,
    /// Newest arrival first.
    #[default]
    Descending,
}

/// Represents the cache configuration of the user account.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Represents the name of the account. It namespaces the
    /// persisted store, so two accounts can share a database.
    pub name: String,
    /// Represents the directory holding the cache database.
    pub sync_dir: Option<PathBuf>,
    /// Represents the number of recent messages fetched by the first
    /// refresh phase.
    pub initial_folder_messages: Option<usize>,
    /// Represents the maximum number of messages kept per folder.
    pub maximum_folder_messages: Option<usize>,
    /// Represents the order of the cached folder messages.
    pub sort_order: SortOrder,
}

impl CacheConfig {
    pub fn new<N: ToString>(name: N) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn initial_folder_messages(&self) -> usize {
        self.initial_folder_messages
            .unwrap_or(DEFAULT_INITIAL_FOLDER_MESSAGES)
    }

    pub fn maximum_folder_messages(&self) -> Option<usize> {
        self.maximum_folder_messages
    }

    /// Number of messages older than the recent ones that a folder
    /// may keep, `None` meaning unbounded.
    pub fn secondary_messages_budget(&self) -> Option<usize> {
        self.maximum_folder_messages
            .map(|max| max.saturating_sub(self.initial_folder_messages()))
    }

    /// Gets the sync directory, expanding shell variables. Falls back
    /// to `$XDG_DATA_HOME/himalaya` when not set or invalid.
    pub fn sync_dir(&self) -> Result<PathBuf> {
        let dir = match self.sync_dir.as_ref().and_then(|dir| dir.to_str()) {
            Some(dir) => Some(
                shellexpand::full(dir)
                    .map(|dir| PathBuf::from(dir.to_string()))
                    .map_err(|err| Error::ExpandSyncDirError(err, dir.to_owned()))?,
            ),
            None => None,
        };

        match dir.filter(|dir| !dir.is_file()) {
            Some(dir) => Ok(dir),
            None => {
                warn!("sync dir not set or invalid, falling back to $XDG_DATA_HOME/himalaya");
                data_dir()
                    .map(|dir| dir.join(DEFAULT_SYNC_DIR_NAME))
                    .ok_or(Error::GetXdgDataDirError)
            }
        }
    }
}
