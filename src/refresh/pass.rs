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

use log::{debug, trace};
use std::{
    collections::{HashMap, HashSet},
    mem,
    sync::Arc,
};

use crate::{
    notify::{Expunged, FolderEvent, MessageEvent, Notifier, Origin},
    CacheConfig, CachedMessage, Flags, FolderId, FolderMessageCache, Token,
};

use super::Result;

/// Tells what merging a fetched record did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Merge {
    /// The record has been stored with its metadata.
    Stored,
    /// The flags and the index of a populated record have been
    /// updated.
    Updated,
    /// The record cannot be updated in place, it needs a full fetch.
    NeedsFullFetch,
}

/// Represents the result of a pass, handed back to the folder actor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PassOutcome {
    /// Orphans to remove from the cache and report as expunged.
    pub evicted: Vec<Token>,
    /// Cached indexes of the evicted orphans.
    pub evicted_indexes: Vec<u32>,
    pub success: bool,
    pub deliberate: bool,
    pub initially_complete: bool,
    pub check_all_tokens: bool,
}

impl PassOutcome {
    /// Builds the expunge notification of the evicted orphans, by
    /// cached index or by token.
    pub fn expunged(&self, by_index: bool) -> Option<Expunged> {
        if self.evicted.is_empty() {
            None
        } else if by_index {
            Some(Expunged::Indexes(self.evicted_indexes.clone()))
        } else {
            Some(Expunged::Tokens(self.evicted.clone()))
        }
    }
}

/// Represents one refresh pass over a folder.
///
/// The pass owns the orphan set: every record cached when the pass
/// began, minus the ones the server confirmed since. Mutations are
/// applied to the cache right away, while their events are batched
/// and emitted on [`RefreshPass::flush`].
pub struct RefreshPass {
    folder: FolderId,
    cache: Arc<FolderMessageCache>,
    notifier: Notifier,
    config: Arc<CacheConfig>,
    deliberate: bool,
    check_all_tokens: bool,
    first_load: bool,
    orphans: HashMap<Token, CachedMessage>,
    kept: HashSet<Token>,
    prunable: bool,
    initially_complete: bool,
    stored: Vec<CachedMessage>,
    updated: Vec<CachedMessage>,
    flag_changes: Vec<(Token, Flags)>,
}

impl RefreshPass {
    pub fn new(
        folder: FolderId,
        cache: Arc<FolderMessageCache>,
        notifier: Notifier,
        config: Arc<CacheConfig>,
        deliberate: bool,
        check_all_tokens: bool,
        first_load: bool,
    ) -> Self {
        Self {
            folder,
            cache,
            notifier,
            config,
            deliberate,
            check_all_tokens,
            first_load,
            orphans: HashMap::new(),
            kept: HashSet::new(),
            prunable: false,
            initially_complete: false,
            stored: Vec::new(),
            updated: Vec::new(),
            flag_changes: Vec::new(),
        }
    }

    /// Seeds the orphan set with every cached record of the folder.
    /// On first load, the cached records are announced as
    /// provisionally available.
    pub fn begin(&mut self) -> Result<()> {
        let cached = self.cache.get_folder_messages(&self.folder)?;
        debug!("{} cached message(s) in {}", cached.len(), self.folder);

        if self.first_load && !cached.is_empty() {
            self.notifier.emit_folder(FolderEvent::MessagesAvailable {
                folder: self.folder.clone(),
                messages: cached.clone(),
                origin: Origin::Cache,
            });
        }

        self.orphans = cached.into_iter().map(|m| (m.token, m)).collect();
        Ok(())
    }

    pub fn folder(&self) -> &FolderId {
        &self.folder
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_deliberate(&self) -> bool {
        self.deliberate
    }

    pub fn check_all_tokens(&self) -> bool {
        self.check_all_tokens
    }

    pub fn orphans(&self) -> &HashMap<Token, CachedMessage> {
        &self.orphans
    }

    pub fn is_orphan(&self, token: &Token) -> bool {
        self.orphans.contains_key(token)
    }

    /// Gets the cached record of the given token.
    pub fn cached(&self, token: &Token) -> Result<Option<CachedMessage>> {
        Ok(self.cache.get_folder_message(&self.folder, token)?)
    }

    /// Marks the token as still existing on the server.
    pub fn confirm(&mut self, token: &Token) {
        self.orphans.remove(token);
    }

    /// Protects the given orphans from pruning: their existence could
    /// not be checked during this pass.
    pub fn keep<I: IntoIterator<Item = Token>>(&mut self, tokens: I) {
        self.kept.extend(tokens)
    }

    /// Allows the remaining orphans to be pruned at the end of the
    /// pass.
    pub fn set_prunable(&mut self) {
        self.prunable = true;
    }

    pub fn set_initially_complete(&mut self) {
        self.initially_complete = true;
    }

    fn track_flags(&mut self, cached: &CachedMessage, fetched: &CachedMessage) {
        if cached.flags != fetched.flags {
            self.flag_changes
                .push((fetched.token, fetched.flags.clone()));
        }
    }

    /// Merges a fetched record into the cache.
    ///
    /// A record carrying metadata is stored. A flags-only record
    /// updates the flags and the index of the cached one, which is
    /// possible only if the cached record has been populated before.
    pub fn merge(&mut self, record: CachedMessage) -> Result<Merge> {
        if record.is_populated() {
            self.store(record)?;
            return Ok(Merge::Stored);
        }

        let cached = match self.cached(&record.token)? {
            Some(cached) => cached,
            None => return Ok(Merge::NeedsFullFetch),
        };

        self.cache.update_folder_message(&self.folder, &record)?;
        self.confirm(&record.token);
        self.track_flags(&cached, &record);

        if cached.is_populated() {
            let mut merged = cached;
            merged.merge_state(&record);
            self.updated.push(merged);
            Ok(Merge::Updated)
        } else {
            Ok(Merge::NeedsFullFetch)
        }
    }

    /// Stores a fully fetched record, replacing the cached one.
    pub fn store(&mut self, record: CachedMessage) -> Result<()> {
        if let Some(cached) = self.cached(&record.token)? {
            self.track_flags(&cached, &record);
        }

        self.confirm(&record.token);
        self.cache
            .populate_folder_message(&self.folder, record.clone())?;
        self.stored.push(record);
        Ok(())
    }

    /// Emits the events of the mutations applied since the last
    /// flush.
    pub fn flush(&mut self) {
        let stored = mem::take(&mut self.stored);
        if !stored.is_empty() {
            self.notifier.emit_folder(FolderEvent::MessagesAvailable {
                folder: self.folder.clone(),
                messages: stored,
                origin: Origin::Server,
            });
        }

        let updated = mem::take(&mut self.updated);
        if !updated.is_empty() {
            self.notifier.emit_folder(FolderEvent::MessagesAvailable {
                folder: self.folder.clone(),
                messages: updated,
                origin: Origin::ServerFlagsOnly,
            });
        }

        for (token, flags) in mem::take(&mut self.flag_changes) {
            self.notifier.emit_message(MessageEvent::FlagsChanged {
                folder: self.folder.clone(),
                token,
                flags,
            });
        }
    }

    /// Ends the pass, flushing the pending events and collecting the
    /// orphans to evict.
    pub fn finish(mut self, success: bool) -> PassOutcome {
        self.flush();

        let mut evicted: Vec<&CachedMessage> = if self.prunable {
            self.orphans
                .values()
                .filter(|orphan| !self.kept.contains(&orphan.token))
                .collect()
        } else {
            Vec::new()
        };
        evicted.sort_by_key(|orphan| orphan.token);

        let evicted_indexes = evicted.iter().map(|orphan| orphan.index).collect();
        let evicted: Vec<Token> = evicted.iter().map(|orphan| orphan.token).collect();

        trace!("orphans evicted from {}: {:#?}", self.folder, evicted);

        PassOutcome {
            evicted,
            evicted_indexes,
            success,
            deliberate: self.deliberate,
            initially_complete: self.initially_complete,
            check_all_tokens: self.check_all_tokens,
        }
    }
}
