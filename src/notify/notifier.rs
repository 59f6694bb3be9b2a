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

use log::{trace, warn};
use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use uuid::Uuid;

use super::{FolderEvent, MessageEvent};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(Uuid);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait FolderSubscriber: Send + Sync {
    fn on_folder_event(&self, event: &FolderEvent);
}

impl<F: Fn(&FolderEvent) + Send + Sync> FolderSubscriber for F {
    fn on_folder_event(&self, event: &FolderEvent) {
        self(event)
    }
}

pub trait MessageSubscriber: Send + Sync {
    fn on_message_event(&self, event: &MessageEvent);
}

impl<F: Fn(&MessageEvent) + Send + Sync> MessageSubscriber for F {
    fn on_message_event(&self, event: &MessageEvent) {
        self(event)
    }
}

#[derive(Default)]
struct Subscribers {
    folder: HashMap<SubscriptionId, Arc<dyn FolderSubscriber>>,
    message: HashMap<SubscriptionId, Arc<dyn MessageSubscriber>>,
}

/// The subscriber registry.
///
/// Cloning a notifier shares the same registry. Subscribers are
/// called outside of the registry lock, so they may subscribe or
/// unsubscribe from within a callback.
///
/// Subscribers run on the task emitting the event, usually a folder
/// handler: they must not block. A panicking subscriber is logged and
/// skipped.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Arc<RwLock<Subscribers>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    // a panicking subscriber must not disable the whole fan-out
    fn read(&self) -> RwLockReadGuard<'_, Subscribers> {
        self.subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Subscribers> {
        self.subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Subscribes to folder events. The subscriber is called inline by
    /// the folder handlers, see [`Notifier`].
    pub fn subscribe_folder_events<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: FolderSubscriber + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.write().folder.insert(id, Arc::new(subscriber));
        id
    }

    /// Subscribes to message events. The subscriber is called inline
    /// by the folder handlers, see [`Notifier`].
    pub fn subscribe_message_events<S>(&self, subscriber: S) -> SubscriptionId
    where
        S: MessageSubscriber + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.write().message.insert(id, Arc::new(subscriber));
        id
    }

    /// Removes the subscription. Returns `false` if it was unknown.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        let mut subscribers = self.write();
        let folder = subscribers.folder.remove(id).is_some();
        let message = subscribers.message.remove(id).is_some();
        folder || message
    }

    pub fn emit_folder(&self, event: FolderEvent) {
        trace!("emitting folder event: {event}");
        let subscribers: Vec<_> = self.read().folder.values().cloned().collect();
        for subscriber in subscribers {
            let call = AssertUnwindSafe(|| subscriber.on_folder_event(&event));
            if panic::catch_unwind(call).is_err() {
                warn!("folder subscriber panicked on event: {event}");
            }
        }
    }

    pub fn emit_message(&self, event: MessageEvent) {
        trace!("emitting message event: {event}");
        let subscribers: Vec<_> = self.read().message.values().cloned().collect();
        for subscriber in subscribers {
            let call = AssertUnwindSafe(|| subscriber.on_message_event(&event));
            if panic::catch_unwind(call).is_err() {
                warn!("message subscriber panicked on event: {event}");
            }
        }
    }
}
