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

use std::fmt;

use crate::{CachedMessage, Flags, FolderId, Token};

/// Where the records of a [`FolderEvent::MessagesAvailable`] event
/// come from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    /// Records restored from the cache, not confirmed yet.
    Cache,
    /// Records fetched from the server, metadata included.
    Server,
    /// Records whose flags only were fetched from the server.
    ServerFlagsOnly,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Server => write!(f, "server"),
            Self::ServerFlagsOnly => write!(f, "server (flags only)"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expunged {
    Indexes(Vec<u32>),
    Tokens(Vec<Token>),
}

impl Expunged {
    pub fn len(&self) -> usize {
        match self {
            Self::Indexes(indexes) => indexes.len(),
            Self::Tokens(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FolderEvent {
    MessagesAvailable {
        folder: FolderId,
        messages: Vec<CachedMessage>,
        origin: Origin,
    },
    Expunged {
        folder: FolderId,
        expunged: Expunged,
    },
    RefreshStarted {
        folder: FolderId,
        deliberate: bool,
    },
    RefreshCompleted {
        folder: FolderId,
        success: bool,
        deliberate: bool,
    },
}

impl FolderEvent {
    pub fn folder(&self) -> &FolderId {
        match self {
            Self::MessagesAvailable { folder, .. } => folder,
            Self::Expunged { folder, .. } => folder,
            Self::RefreshStarted { folder, .. } => folder,
            Self::RefreshCompleted { folder, .. } => folder,
        }
    }
}

impl fmt::Display for FolderEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::MessagesAvailable {
                folder,
                messages,
                origin,
            } => write!(
                f,
                "{} message(s) available in {folder} from {origin}",
                messages.len()
            ),
            Self::Expunged { folder, expunged } => {
                write!(f, "{} message(s) expunged from {folder}", expunged.len())
            }
            Self::RefreshStarted { folder, deliberate } => {
                let kind = if *deliberate { "deliberate" } else { "automatic" };
                write!(f, "{kind} refresh of {folder} started")
            }
            Self::RefreshCompleted {
                folder, success, ..
            } => {
                let status = if *success { "succeeded" } else { "failed" };
                write!(f, "refresh of {folder} {status}")
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MessageEvent {
    FlagsChanged {
        folder: FolderId,
        token: Token,
        flags: Flags,
    },
}

impl fmt::Display for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FlagsChanged {
                folder,
                token,
                flags,
            } => write!(f, "flags of message {token} in {folder} changed to [{flags}]"),
        }
    }
}
