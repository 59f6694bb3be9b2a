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
use log::{debug, trace};
use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use crate::{CachedMessage, Flags, Protocol, RemoteFolder, Token};

use super::{Error, FolderReconciler, RefreshPass, Result};

/// Reconciles POP folders in two phases.
///
/// 1. The index map establishes which messages exist and their
///    order. Cached records are re-indexed, keeping their local
///    flags since POP does not store any.
/// 2. The headers of the messages that are not cached yet are
///    fetched.
///
/// A POP folder does not change during a connection, so a single
/// pass per connection is enough.
pub struct PopReconciler {
    remote: Arc<dyn RemoteFolder>,
}

impl PopReconciler {
    pub fn new(remote: Arc<dyn RemoteFolder>) -> Self {
        Self { remote }
    }

    /// Re-indexes the cached record of the given token, if any.
    /// Returns the local flags of the record when it still needs its
    /// headers.
    fn reindex(&self, pass: &mut RefreshPass, entry: &CachedMessage) -> Result<Option<Flags>> {
        let cached = match pass.cached(&entry.token)? {
            Some(cached) => cached,
            None => return Ok(Some(Flags::default())),
        };

        let record = CachedMessage::new(entry.token, entry.index).with_flags(cached.flags.clone());
        pass.merge(record)?;

        if cached.is_populated() {
            Ok(None)
        } else {
            Ok(Some(cached.flags))
        }
    }
}

#[async_trait]
impl FolderReconciler for PopReconciler {
    fn protocol(&self) -> Protocol {
        Protocol::Pop
    }

    fn compare(&self, a: &CachedMessage, b: &CachedMessage) -> Ordering {
        a.index.cmp(&b.index)
    }

    fn refreshes_within_connection(&self) -> bool {
        false
    }

    fn expunges_by_index(&self) -> bool {
        !self.remote.capabilities().has_expunge
    }

    async fn reconcile(&self, pass: &mut RefreshPass) -> Result<()> {
        debug!("fetching index map of {}", pass.folder());

        let mut map = self
            .remote
            .fetch_index_map()
            .await
            .map_err(|err| Error::FetchIndexMapError(err, pass.folder().clone()))?;
        debug!("fetched {} index(es)", map.len());

        map.sort_by(|a, b| self.compare(b, a));
        if let Some(max) = pass.config().maximum_folder_messages() {
            if map.len() > max {
                debug!("keeping the {max} newest message(s) out of {}", map.len());
                map.truncate(max);
            }
        }

        let mut unresolved: HashMap<Token, Flags> = HashMap::new();
        for entry in &map {
            if let Some(flags) = self.reindex(pass, entry)? {
                unresolved.insert(entry.token, flags);
            }
        }
        pass.flush();

        // the index map is exhaustive
        pass.set_prunable();

        if !unresolved.is_empty() {
            let tokens: Vec<Token> = map
                .iter()
                .map(|entry| entry.token)
                .filter(|token| unresolved.contains_key(token))
                .collect();
            debug!("fetching headers of {} message(s)", tokens.len());
            trace!("unresolved messages: {:#?}", tokens);

            let records = self
                .remote
                .fetch_messages_by_tokens(&tokens, false)
                .await
                .map_err(|err| Error::FetchMessagesError(err, pass.folder().clone(), tokens.len()))?;

            for mut record in records {
                if let Some(flags) = unresolved.remove(&record.token) {
                    record.flags.extend(flags.iter().cloned());
                }
                pass.store(record)?;
            }
            pass.flush();
        }

        pass.set_initially_complete();
        Ok(())
    }
}
