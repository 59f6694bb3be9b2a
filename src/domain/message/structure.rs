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

/// Represents the MIME structure of a message, as returned by an IMAP
/// `BODYSTRUCTURE` fetch or computed from POP headers.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct MessageStructure {
    /// Represents the MIME type, for example `text/plain`.
    pub mime_type: String,
    /// Represents the size of the part in bytes.
    pub size: u64,
    /// Represents the sub-parts of a multipart.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MessageStructure>,
}

impl MessageStructure {
    pub fn new<M: ToString>(mime_type: M, size: u64) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            size,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<MessageStructure>) -> Self {
        self.children = children;
        self
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type.to_lowercase().starts_with("multipart/")
    }

    /// Counts the leaf parts of the structure.
    pub fn leaves_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(Self::leaves_count).sum()
        }
    }

    /// Finds the first part matching the given MIME type, depth
    /// first.
    pub fn find<M: AsRef<str>>(&self, mime_type: M) -> Option<&MessageStructure> {
        let mime_type = mime_type.as_ref();

        if self.mime_type.eq_ignore_ascii_case(mime_type) {
            return Some(self);
        }

        self.children.iter().find_map(|part| part.find(mime_type))
    }
}

/// Represents the reference to a raw message content cached outside
/// of the folder cache (the message content file store).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContentRef {
    pub key: String,
    pub len: u64,
}
