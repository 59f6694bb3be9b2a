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

use crate::{ContentRef, Envelope, Flags, MessageStructure, Token};

/// Represents the cached record of a message.
///
/// One record exists per folder and token, as long as the message
/// is known to exist on the server or has not been reconciled yet.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CachedMessage {
    /// Represents the message identity.
    pub token: Token,
    /// Represents the ordering index (arrival order).
    pub index: u32,
    /// Represents the flags.
    pub flags: Flags,
    /// Represents the header metadata, absent until a full fetch.
    #[serde(default)]
    pub envelope: Option<Envelope>,
    /// Represents the MIME structure, absent until a full fetch.
    #[serde(default)]
    pub structure: Option<MessageStructure>,
    /// Represents the raw content reference, if downloaded.
    #[serde(default)]
    pub content: Option<ContentRef>,
}

impl CachedMessage {
    pub fn new<T: Into<Token>>(token: T, index: u32) -> Self {
        Self {
            token: token.into(),
            index,
            ..Default::default()
        }
    }

    pub fn with_flags<F: Into<Flags>>(mut self, flags: F) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn with_envelope(mut self, envelope: Envelope) -> Self {
        self.envelope = Some(envelope);
        self
    }

    pub fn with_structure(mut self, structure: MessageStructure) -> Self {
        self.structure = Some(structure);
        self
    }

    pub fn with_content(mut self, content: ContentRef) -> Self {
        self.content = Some(content);
        self
    }

    /// A record is populated once its header metadata has been
    /// fetched. Flags-only fetches never populate a record.
    pub fn is_populated(&self) -> bool {
        self.envelope.is_some()
    }

    /// Merges the mutable state (ordering index and flags) of the
    /// given record into this one. Metadata and content are kept.
    pub fn merge_state(&mut self, other: &CachedMessage) {
        self.index = other.index;
        self.flags = other.flags.clone();
    }
}
