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

//! Refresh module.
//!
//! This module contains the refresh orchestrator. Every folder is
//! owned by one actor task, driven through a cloneable
//! [`FolderHandle`]. The actor enforces at most one refresh pass at a
//! time, defers dependent work until the pass completes, and delegates
//! the reconciliation itself to a protocol-specific
//! [`FolderReconciler`].

mod actor;
mod handle;
#[cfg(feature = "imap")]
mod imap;
mod pass;
#[cfg(feature = "pop")]
mod pop;
mod reconciler;
mod state;

use std::result;
use thiserror::Error;

use crate::{backend, cache, FolderId, Protocol};

pub use self::handle::FolderHandle;
#[cfg(feature = "imap")]
pub use self::imap::ImapReconciler;
pub use self::pass::{Merge, PassOutcome, RefreshPass};
#[cfg(feature = "pop")]
pub use self::pop::PopReconciler;
pub use self::reconciler::{reconciler_for, FolderReconciler};
pub use self::state::{RefreshFlags, RefreshSnapshot, RefreshState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot send command to folder {0}: folder handler closed")]
    FolderHandlerClosedError(FolderId),
    #[error("cannot receive reply from folder handler")]
    ReceiveReplyError,
    #[error("cannot get deferred task result: task dropped before running")]
    DeferredTaskDroppedError,
    #[error("cannot reconcile folder: protocol {0} not supported")]
    UnsupportedProtocolError(Protocol),

    #[error("cannot fetch recent messages of folder {1}")]
    FetchRecentMessagesError(#[source] backend::Error, FolderId),
    #[error("cannot fetch flags of {2} message(s) of folder {1}")]
    FetchFlagsError(#[source] backend::Error, FolderId, usize),
    #[error("cannot fetch {2} message(s) of folder {1}")]
    FetchMessagesError(#[source] backend::Error, FolderId, usize),
    #[error("cannot fetch index map of folder {1}")]
    FetchIndexMapError(#[source] backend::Error, FolderId),

    #[error(transparent)]
    CacheError(#[from] cache::Error),
}

pub type Result<T> = result::Result<T, Error>;
