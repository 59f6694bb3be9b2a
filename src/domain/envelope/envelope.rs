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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    pub name: Option<String>,
    pub addr: String,
}

impl PartialEq for Mailbox {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Mailbox {
    pub fn new<N, A>(name: Option<N>, address: A) -> Self
    where
        N: ToString,
        A: ToString,
    {
        Self {
            name: name.map(|name| name.to_string()),
            addr: address.to_string(),
        }
    }

    pub fn new_nameless<A>(address: A) -> Self
    where
        A: ToString,
    {
        Self {
            name: None,
            addr: address.to_string(),
        }
    }
}

/// Represents the message envelope. The envelope is the header
/// subset kept in the folder cache, mostly used for listings.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Represents the Message-ID header.
    pub message_id: String,
    /// Represents the first sender.
    pub from: Mailbox,
    /// Represents the Subject header.
    pub subject: String,
    /// Represents the Date header.
    pub date: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new<I, S>(message_id: I, from: Mailbox, subject: S) -> Self
    where
        I: ToString,
        S: ToString,
    {
        Self {
            message_id: message_id.to_string(),
            from,
            subject: subject.to_string(),
            date: None,
        }
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Tells if the envelope is dated strictly before the given date.
    /// Undated envelopes are never considered older.
    pub fn is_before(&self, date: &DateTime<Utc>) -> bool {
        matches!(&self.date, Some(d) if d < date)
    }
}
