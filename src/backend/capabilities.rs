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

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Imap,
    Pop,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Imap => write!(f, "IMAP"),
            Self::Pop => write!(f, "POP"),
        }
    }
}

/// Represents what the remote store is able to do.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    pub protocol: Protocol,
    /// Flags can be stored on the server.
    pub has_flags: bool,
    /// The server reports expunged messages by token.
    pub has_expunge: bool,
}

impl Capabilities {
    pub fn imap() -> Self {
        Self {
            protocol: Protocol::Imap,
            has_flags: true,
            has_expunge: true,
        }
    }

    pub fn pop() -> Self {
        Self {
            protocol: Protocol::Pop,
            has_flags: false,
            has_expunge: false,
        }
    }
}
