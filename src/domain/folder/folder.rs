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

//! Folder module.
//!
//! This module contains the representation of the folder identity.

use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

pub const DEFAULT_FOLDER_DELIM: &str = "/";

/// Represents the identity of a remote folder.
///
/// The identity is made of a unique id (stable across reconnects,
/// for example the account name joined with the IMAP mailbox name)
/// and the hierarchical path of the folder. Both are part of the
/// equality, so a renamed folder is a different folder. The delimiter
/// is not.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FolderId {
    /// Represents the unique identifier of the folder.
    pub id: String,
    /// Represents the folder path, segments joined by `delim`.
    pub path: String,
    /// Represents the folder hierarchy delimiter.
    pub delim: String,
}

impl FolderId {
    pub fn new<I, P>(id: I, path: P) -> Self
    where
        I: ToString,
        P: ToString,
    {
        Self {
            id: id.to_string(),
            path: path.to_string(),
            delim: DEFAULT_FOLDER_DELIM.into(),
        }
    }

    pub fn with_delim<D: ToString>(mut self, delim: D) -> Self {
        self.delim = delim.to_string();
        self
    }

    fn key(&self) -> (&str, &str) {
        (self.id.as_str(), self.path.as_str())
    }
}

impl PartialEq for FolderId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for FolderId {}

impl Hash for FolderId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl PartialOrd for FolderId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FolderId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}
