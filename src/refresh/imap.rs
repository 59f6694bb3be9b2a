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
use log::{debug, trace, warn};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    sync::Arc,
};

use crate::{CachedMessage, Protocol, RemoteFolder, Token};

use super::{Error, FolderReconciler, Merge, RefreshPass, Result};

/// Reconciles IMAP folders in three phases.
///
/// 1. The recent messages are fetched and merged.
/// 2. The flags of the remaining orphans older than the newest recent
///    message (or of every orphan when a full check is requested) are
///    fetched. The confirmed ones are capped by the secondary messages
///    budget, the oldest excess being left as orphans.
/// 3. The records that could not be updated in place, and the
///    candidates the server did not return, are fully fetched.
///
/// Orphans remaining after the third phase are evicted.
pub struct ImapReconciler {
    remote: Arc<dyn RemoteFolder>,
}

impl ImapReconciler {
    pub fn new(remote: Arc<dyn RemoteFolder>) -> Self {
        Self { remote }
    }

    /// Fetches the recent messages. Returns the newest token seen and
    /// the tokens that need a full fetch.
    async fn fetch_recent(&self, pass: &mut RefreshPass) -> Result<(Option<Token>, Vec<Token>)> {
        let limit = pass.config().initial_folder_messages();
        debug!("fetching {limit} recent message(s) of {}", pass.folder());

        let recent = self
            .remote
            .fetch_recent_messages(limit)
            .await
            .map_err(|err| Error::FetchRecentMessagesError(err, pass.folder().clone()))?;
        debug!("fetched {} recent message(s)", recent.len());

        let mut newest: Option<Token> = None;
        let mut queue = Vec::new();

        for record in recent {
            let token = record.token;
            newest = match newest {
                Some(newest) if self.remote.compare_tokens(&newest, &token) != Ordering::Less => {
                    Some(newest)
                }
                _ => Some(token),
            };
            if pass.merge(record)? == Merge::NeedsFullFetch {
                queue.push(token);
            }
        }

        pass.flush();
        Ok((newest, queue))
    }

    /// Selects the orphans to check, newest first.
    fn secondary_candidates(&self, pass: &RefreshPass, newest: Option<Token>) -> Vec<Token> {
        let mut candidates: Vec<Token> = pass
            .orphans()
            .keys()
            .filter(|token| match newest {
                Some(newest) if !pass.check_all_tokens() => {
                    self.remote.compare_tokens(token, &newest) == Ordering::Less
                }
                _ => true,
            })
            .cloned()
            .collect();

        candidates.sort_by(|a, b| self.remote.compare_tokens(b, a));
        candidates
    }

    /// Fetches the flags of the candidates, then merges the confirmed
    /// ones, newest first, until the secondary budget is filled. The
    /// excess stays in the orphan set.
    async fn fetch_secondary(
        &self,
        pass: &mut RefreshPass,
        candidates: Vec<Token>,
    ) -> Result<Secondary> {
        let mut secondary = Secondary {
            room: pass.config().secondary_messages_budget(),
            ..Secondary::default()
        };

        if candidates.is_empty() {
            return Ok(secondary);
        }

        debug!("fetching flags of {} older message(s)", candidates.len());
        trace!("older messages: {:#?}", candidates);

        let records = self
            .remote
            .fetch_messages_by_tokens(&candidates, true)
            .await
            .map_err(|err| Error::FetchFlagsError(err, pass.folder().clone(), candidates.len()))?;
        let mut records: HashMap<Token, CachedMessage> =
            records.into_iter().map(|r| (r.token, r)).collect();

        let mut excess = 0;
        for token in candidates {
            match records.remove(&token) {
                Some(_) if secondary.room == Some(0) => excess += 1,
                Some(record) => {
                    if let Some(room) = secondary.room.as_mut() {
                        *room -= 1;
                    }
                    if pass.merge(record)? == Merge::NeedsFullFetch {
                        secondary.queue.push(token);
                    }
                }
                None => secondary.unconfirmed.push(token),
            }
        }

        if excess > 0 {
            debug!("secondary budget exceeded, evicting {excess} older message(s)");
        }

        pass.flush();
        Ok(secondary)
    }

    /// Fully fetches the queued tokens. The unconfirmed tokens found
    /// on the server are stored newest first, within the room left by
    /// the secondary phase.
    async fn fetch_full(
        &self,
        pass: &mut RefreshPass,
        mut queue: Vec<Token>,
        secondary: Secondary,
    ) -> Result<()> {
        let unconfirmed: HashSet<Token> = secondary.unconfirmed.iter().cloned().collect();
        queue.extend(secondary.queue);
        queue.extend(secondary.unconfirmed);

        if queue.is_empty() {
            return Ok(());
        }

        debug!("fully fetching {} message(s)", queue.len());
        trace!("fully fetched messages: {:#?}", queue);

        let records = match self.remote.fetch_messages_by_tokens(&queue, false).await {
            Ok(records) => records,
            Err(err) => {
                warn!("cannot fully fetch messages, keeping them until next refresh");
                let len = queue.len();
                pass.keep(queue);
                return Err(Error::FetchMessagesError(err, pass.folder().clone(), len));
            }
        };

        let (mut older, records): (Vec<CachedMessage>, Vec<CachedMessage>) = records
            .into_iter()
            .partition(|record| unconfirmed.contains(&record.token));

        if let Some(room) = secondary.room {
            older.sort_by(|a, b| self.remote.compare_tokens(&b.token, &a.token));
            older.truncate(room);
        }

        for record in records.into_iter().chain(older) {
            pass.store(record)?;
        }

        pass.flush();
        Ok(())
    }
}

/// Represents the result of the secondary phase.
#[derive(Debug, Default)]
struct Secondary {
    /// Confirmed tokens that need a full fetch.
    queue: Vec<Token>,
    /// Candidates the server returned no flags for.
    unconfirmed: Vec<Token>,
    /// Records the budget still allows, `None` when unbounded.
    room: Option<usize>,
}

#[async_trait]
impl FolderReconciler for ImapReconciler {
    fn protocol(&self) -> Protocol {
        Protocol::Imap
    }

    fn compare(&self, a: &CachedMessage, b: &CachedMessage) -> Ordering {
        self.remote.compare_tokens(&a.token, &b.token)
    }

    async fn reconcile(&self, pass: &mut RefreshPass) -> Result<()> {
        let (newest, queue) = self.fetch_recent(pass).await?;

        let candidates = self.secondary_candidates(pass, newest);
        let secondary = self.fetch_secondary(pass, candidates).await?;

        // from here the orphans left are known to be gone
        pass.set_prunable();

        let result = self.fetch_full(pass, queue, secondary).await;
        pass.set_initially_complete();
        result
    }
}
