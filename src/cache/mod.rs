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

//! Cache module.
//!
//! This module contains the folder message cache: the in-memory
//! index of the cached message records of every folder, backed by a
//! persisted store.

pub mod cache;
pub mod entry;

use std::result;
use thiserror::Error;

pub use self::cache::FolderMessageCache;
pub use self::entry::FolderEntry;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot use folder cache: cache not restored")]
    NotRestoredError,
    #[error("cannot use folder cache: cache destroyed")]
    DestroyedError,
    #[error("cannot lock folder cache: {0}")]
    LockCacheError(String),
}

pub type Result<T> = result::Result<T, Error>;
