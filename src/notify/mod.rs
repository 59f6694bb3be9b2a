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

//! Notify module.
//!
//! This module contains the events emitted once the cache state has
//! been updated, and the registry delivering them to subscribers.

mod event;
mod notifier;

pub use self::event::{Expunged, FolderEvent, MessageEvent, Origin};
pub use self::notifier::{FolderSubscriber, MessageSubscriber, Notifier, SubscriptionId};
