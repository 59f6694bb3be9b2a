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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the identity of a message within a folder.
///
/// A token is opaque to the cache: for IMAP it holds the UID, for
/// POP it is derived from the UIDL. Tokens are only ordered through
/// the comparator of the protocol reconciler, never through `Ord`
/// directly, except as a tie breaker.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub u64);

impl Token {
    pub fn new(token: u64) -> Self {
        Self(token)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Derives a stable token from a POP UIDL string.
    #[cfg(feature = "pop")]
    pub fn from_uidl<U: AsRef<str>>(uidl: U) -> Self {
        let digest = md5::compute(uidl.as_ref().as_bytes());
        let mut bytes = [0; 8];
        bytes.copy_from_slice(&digest.0[..8]);
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for Token {
    fn from(token: u64) -> Self {
        Self(token)
    }
}

impl From<u32> for Token {
    fn from(token: u32) -> Self {
        Self(token as u64)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
