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

use std::{cmp::Ordering, collections::HashMap};

use crate::{CachedMessage, FolderId, SortOrder, Token};

/// Represents the in-memory cache entry of a folder: the records
/// sorted by arrival plus a token index.
#[derive(Clone, Debug)]
pub struct FolderEntry {
    folder: FolderId,
    order: SortOrder,
    tokens: Vec<Token>,
    records: HashMap<Token, CachedMessage>,
}

impl FolderEntry {
    pub fn new(folder: FolderId, order: SortOrder) -> Self {
        Self {
            folder,
            order,
            tokens: Vec::new(),
            records: HashMap::new(),
        }
    }

    pub fn from_messages<I>(folder: FolderId, order: SortOrder, messages: I) -> Self
    where
        I: IntoIterator<Item = CachedMessage>,
    {
        let mut entry = Self::new(folder, order);
        for message in messages {
            entry.insert(message);
        }
        entry
    }

    pub fn folder(&self) -> &FolderId {
        &self.folder
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.records.contains_key(token)
    }

    pub fn get(&self, token: &Token) -> Option<&CachedMessage> {
        self.records.get(token)
    }

    /// Returns the records, in the entry order.
    pub fn messages(&self) -> Vec<CachedMessage> {
        self.tokens
            .iter()
            .filter_map(|token| self.records.get(token))
            .cloned()
            .collect()
    }

    fn compare(order: SortOrder, a: &CachedMessage, b: &CachedMessage) -> Ordering {
        let ord = a.index.cmp(&b.index).then_with(|| a.token.cmp(&b.token));
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }

    fn position(&self, message: &CachedMessage) -> usize {
        let order = self.order;
        let records = &self.records;

        self.tokens
            .binary_search_by(|token| match records.get(token) {
                Some(record) => Self::compare(order, record, message),
                None => Ordering::Less,
            })
            .unwrap_or_else(|pos| pos)
    }

    /// Inserts the record at its sorted position. Returns `false`
    /// without touching anything if the token is already known.
    pub fn insert(&mut self, message: CachedMessage) -> bool {
        if self.records.contains_key(&message.token) {
            return false;
        }

        let pos = self.position(&message);
        self.tokens.insert(pos, message.token);
        self.records.insert(message.token, message);
        true
    }

    fn unlink(&mut self, token: &Token) {
        if let Some(pos) = self.tokens.iter().position(|t| t == token) {
            self.tokens.remove(pos);
        }
    }

    /// Updates the ordering index and the flags of a known record.
    pub fn update(&mut self, message: &CachedMessage) -> bool {
        let mut record = match self.records.remove(&message.token) {
            Some(record) => record,
            None => return false,
        };

        if record.index != message.index {
            self.unlink(&message.token);
            record.merge_state(message);
            let pos = self.position(&record);
            self.tokens.insert(pos, record.token);
        } else {
            record.merge_state(message);
        }

        self.records.insert(record.token, record);
        true
    }

    /// Replaces the metadata of a record with freshly fetched one,
    /// inserting it if unknown. The content reference is kept when
    /// the fetched record does not carry one.
    pub fn populate(&mut self, mut message: CachedMessage) {
        match self.records.get(&message.token) {
            None => {
                self.insert(message);
            }
            Some(record) => {
                if message.content.is_none() {
                    message.content = record.content.clone();
                }
                self.remove(&message.token);
                self.insert(message);
            }
        }
    }

    pub fn remove(&mut self, token: &Token) -> Option<CachedMessage> {
        let record = self.records.remove(token)?;
        self.unlink(token);
        Some(record)
    }
}
