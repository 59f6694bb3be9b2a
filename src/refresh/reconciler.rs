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
use std::{cmp::Ordering, sync::Arc};

use crate::{CachedMessage, Protocol, RemoteFolder};

use super::{Error, RefreshPass, Result};

#[cfg(feature = "imap")]
use super::ImapReconciler;
#[cfg(feature = "pop")]
use super::PopReconciler;

/// Reconciles the cache of a folder with its remote state, the way
/// the remote protocol allows it.
#[async_trait]
pub trait FolderReconciler: Send + Sync {
    fn protocol(&self) -> Protocol;

    /// Compares two records by arrival order, oldest first.
    fn compare(&self, a: &CachedMessage, b: &CachedMessage) -> Ordering;

    /// Whether a new pass can learn anything within the same
    /// connection.
    fn refreshes_within_connection(&self) -> bool {
        true
    }

    /// Whether expunged messages are reported by their cached index
    /// rather than by token.
    fn expunges_by_index(&self) -> bool {
        false
    }

    /// Runs the phases of a pass. Results are applied to the pass as
    /// they come, an error ends the pass with what has been applied
    /// so far.
    async fn reconcile(&self, pass: &mut RefreshPass) -> Result<()>;
}

/// Selects the reconciler matching the capabilities of the remote
/// folder.
pub fn reconciler_for(remote: Arc<dyn RemoteFolder>) -> Result<Arc<dyn FolderReconciler>> {
    match remote.capabilities().protocol {
        #[cfg(feature = "imap")]
        Protocol::Imap => Ok(Arc::new(ImapReconciler::new(remote))),
        #[cfg(feature = "pop")]
        Protocol::Pop => Ok(Arc::new(PopReconciler::new(remote))),
        #[allow(unreachable_patterns)]
        protocol => Err(Error::UnsupportedProtocolError(protocol)),
    }
}
