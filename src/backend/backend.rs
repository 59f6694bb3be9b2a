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

use async_trait::async_trait;
use std::{cmp::Ordering, result};
use thiserror::Error;

use crate::{CachedMessage, Token};

use super::Capabilities;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot fetch messages: {0}")]
    FetchError(String),
    #[error("cannot store flags: {0}")]
    StoreFlagsError(String),
    #[error("connection lost")]
    ConnectionLostError,
}

pub type Result<T> = result::Result<T, Error>;

/// Represents one folder of a remote mail store, as exposed by the
/// protocol layer.
///
/// Fetched records carry the token, the ordering index and the flags.
/// Records returned by a full fetch also carry the envelope and the
/// structure.
#[async_trait]
pub trait RemoteFolder: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Compares two tokens by arrival order, oldest first.
    fn compare_tokens(&self, a: &Token, b: &Token) -> Ordering {
        a.cmp(b)
    }

    /// Fetches the `limit` most recent messages, envelope included.
    async fn fetch_recent_messages(&self, limit: usize) -> Result<Vec<CachedMessage>>;

    /// Fetches the given messages. Tokens that do not exist anymore
    /// are missing from the result.
    async fn fetch_messages_by_tokens(
        &self,
        tokens: &[Token],
        flags_only: bool,
    ) -> Result<Vec<CachedMessage>>;

    /// Fetches the index map of the folder: token and ordering index of
    /// every message, without metadata.
    async fn fetch_index_map(&self) -> Result<Vec<CachedMessage>> {
        self.fetch_recent_messages(usize::MAX).await
    }

    /// Adds the seen flag to the given messages.
    async fn store_seen(&self, _tokens: &[Token]) -> Result<()> {
        Ok(())
    }
}
