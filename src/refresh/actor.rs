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

use log::{debug, info, warn};
use std::{
    collections::VecDeque,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::Arc,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    notify::{FolderEvent, Notifier},
    CacheConfig, FolderId, FolderMessageCache,
};

use super::{
    FolderReconciler, PassOutcome, RefreshFlags, RefreshPass, RefreshSnapshot, RefreshState,
};

pub(crate) type DeferredTask = Box<dyn FnOnce() + Send + 'static>;

type PassFuture = Pin<Box<dyn Future<Output = PassOutcome> + Send>>;

pub(crate) enum Command {
    RequestRefresh {
        deliberate: bool,
    },
    RequestRefreshRequired,
    CheckAllTokens,
    InvokeAfterRefresh {
        task: DeferredTask,
        trigger_refresh: bool,
    },
    Disconnected,
    PrepareForUse,
    State {
        reply: oneshot::Sender<RefreshSnapshot>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

enum Step {
    Command(Option<Command>),
    Completed(PassOutcome),
}

/// Owns the refresh state of one folder.
///
/// The actor processes commands one at a time and keeps polling the
/// running pass in between, so commands received during a pass are
/// handled without waiting for it.
pub(crate) struct FolderActor {
    folder: FolderId,
    cache: Arc<FolderMessageCache>,
    notifier: Notifier,
    config: Arc<CacheConfig>,
    reconciler: Arc<dyn FolderReconciler>,
    rx: mpsc::UnboundedReceiver<Command>,
    state: RefreshState,
    flags: RefreshFlags,
    deferred: VecDeque<DeferredTask>,
}

impl FolderActor {
    pub fn new(
        folder: FolderId,
        cache: Arc<FolderMessageCache>,
        notifier: Notifier,
        config: Arc<CacheConfig>,
        reconciler: Arc<dyn FolderReconciler>,
        rx: mpsc::UnboundedReceiver<Command>,
    ) -> Self {
        Self {
            folder,
            cache,
            notifier,
            config,
            reconciler,
            rx,
            state: RefreshState::Idle,
            flags: RefreshFlags::default(),
            deferred: VecDeque::new(),
        }
    }

    pub async fn run(mut self) {
        debug!("starting {} handler of folder {}", self.reconciler.protocol(), self.folder);

        let mut pass: Option<PassFuture> = None;
        let mut closing: Option<oneshot::Sender<()>> = None;

        loop {
            if pass.is_none() {
                if let Some(reply) = closing.take() {
                    let _ = reply.send(());
                    break;
                }
            }

            let step = match pass.as_mut() {
                Some(fut) => tokio::select! {
                    outcome = fut => Step::Completed(outcome),
                    cmd = self.rx.recv() => Step::Command(cmd),
                },
                None => Step::Command(self.rx.recv().await),
            };

            match step {
                Step::Completed(outcome) => {
                    pass = None;
                    self.complete_refresh(outcome);
                }
                Step::Command(None) => {
                    // every handle is gone, the running pass still
                    // needs to reach completion
                    if let Some(fut) = pass.take() {
                        let outcome = fut.await;
                        self.complete_refresh(outcome);
                    }
                    break;
                }
                Step::Command(Some(Command::Close { reply })) => {
                    closing = Some(reply);
                }
                Step::Command(Some(cmd)) => {
                    if let Some(fut) = self.handle(cmd) {
                        pass = Some(fut);
                    }
                }
            }
        }

        if !self.deferred.is_empty() {
            debug!("dropping {} deferred task(s)", self.deferred.len());
        }

        debug!("handler of folder {} stopped", self.folder);
    }

    fn snapshot(&self) -> RefreshSnapshot {
        RefreshSnapshot {
            state: self.state,
            flags: self.flags,
            deferred_tasks: self.deferred.len(),
        }
    }

    /// Handles the given command. Returns the pass to drive if the
    /// command started one.
    fn handle(&mut self, cmd: Command) -> Option<PassFuture> {
        match cmd {
            Command::RequestRefresh { deliberate } => self.request_refresh(deliberate),
            Command::RequestRefreshRequired => {
                debug!("refresh of folder {} required", self.folder);
                self.flags.refresh_required = true;
                None
            }
            Command::CheckAllTokens => {
                self.flags.check_all_tokens = true;
                None
            }
            Command::InvokeAfterRefresh {
                task,
                trigger_refresh,
            } => self.invoke_after_refresh(task, trigger_refresh),
            Command::Disconnected => {
                debug!("folder {} disconnected", self.folder);
                self.flags.connected = false;
                self.flags.clean_prior_to_use = true;
                None
            }
            Command::PrepareForUse => self.prepare_for_use(),
            Command::State { reply } => {
                let _ = reply.send(self.snapshot());
                None
            }
            Command::Close { .. } => None,
        }
    }

    fn request_refresh(&mut self, deliberate: bool) -> Option<PassFuture> {
        match self.state {
            RefreshState::Refreshing | RefreshState::PostRefreshTasksRunning => {
                debug!("folder {} already refreshing, recording request", self.folder);
                self.flags.refresh_required = true;
                None
            }
            RefreshState::RefreshPending => {
                self.flags.deliberate |= deliberate;
                None
            }
            RefreshState::Idle if !self.flags.connected => {
                debug!("folder {} disconnected, delaying refresh", self.folder);
                self.flags.deliberate = deliberate;
                self.state = RefreshState::RefreshPending;
                None
            }
            RefreshState::Idle
                if self.flags.initial_refresh_complete
                    && !self.reconciler.refreshes_within_connection() =>
            {
                debug!(
                    "folder {} cannot change within a {} connection, skipping refresh",
                    self.folder,
                    self.reconciler.protocol()
                );
                self.flags.refresh_required = false;
                None
            }
            RefreshState::Idle => Some(self.start_refresh(deliberate)),
        }
    }

    fn invoke_after_refresh(
        &mut self,
        task: DeferredTask,
        trigger_refresh: bool,
    ) -> Option<PassFuture> {
        match self.state {
            RefreshState::Refreshing
            | RefreshState::PostRefreshTasksRunning
            | RefreshState::RefreshPending => {
                self.deferred.push_back(task);
                None
            }
            RefreshState::Idle if trigger_refresh && self.flags.is_refresh_needed() => {
                self.deferred.push_back(task);
                let pass = self.request_refresh(false);
                if self.state == RefreshState::Idle {
                    self.run_deferred();
                }
                pass
            }
            RefreshState::Idle => {
                self.deferred.push_back(task);
                self.run_deferred();
                None
            }
        }
    }

    fn prepare_for_use(&mut self) -> Option<PassFuture> {
        self.flags.connected = true;

        if self.state == RefreshState::Refreshing {
            // the clean is applied once the running pass completes
            self.flags.refresh_required = true;
            return None;
        }

        if self.flags.clean_prior_to_use {
            debug!("cleaning folder {} before use", self.folder);
            self.flags.clean();
        }

        if self.state == RefreshState::RefreshPending {
            self.state = RefreshState::Idle;
            let deliberate = self.flags.deliberate;
            return Some(self.start_refresh(deliberate));
        }

        None
    }

    fn start_refresh(&mut self, deliberate: bool) -> PassFuture {
        let check_all_tokens = self.flags.check_all_tokens;
        let first_load = !self.flags.initial_refresh_complete;

        info!(
            "starting {} refresh of folder {}",
            if deliberate { "deliberate" } else { "automatic" },
            self.folder
        );

        self.state = RefreshState::Refreshing;
        self.flags.deliberate = deliberate;
        self.flags.refresh_required = false;
        self.flags.check_all_tokens = false;

        self.notifier.emit_folder(FolderEvent::RefreshStarted {
            folder: self.folder.clone(),
            deliberate,
        });

        let mut pass = RefreshPass::new(
            self.folder.clone(),
            self.cache.clone(),
            self.notifier.clone(),
            self.config.clone(),
            deliberate,
            check_all_tokens,
            first_load,
        );
        let reconciler = self.reconciler.clone();

        Box::pin(async move {
            let result = match pass.begin() {
                Ok(()) => reconciler.reconcile(&mut pass).await,
                Err(err) => Err(err),
            };

            let success = match result {
                Ok(()) => true,
                Err(err) => {
                    warn!("cannot refresh folder {}: {err}", pass.folder());
                    false
                }
            };

            pass.finish(success)
        })
    }

    fn complete_refresh(&mut self, outcome: PassOutcome) {
        self.state = RefreshState::PostRefreshTasksRunning;

        for token in &outcome.evicted {
            if let Err(err) = self.cache.remove_folder_message(&self.folder, token) {
                warn!("cannot remove message {token} from folder {}: {err}", self.folder);
            }
        }

        if let Some(expunged) = outcome.expunged(self.reconciler.expunges_by_index()) {
            debug!("{} message(s) expunged from {}", expunged.len(), self.folder);
            self.notifier.emit_folder(FolderEvent::Expunged {
                folder: self.folder.clone(),
                expunged,
            });
        }

        if let Err(err) = self.cache.commit() {
            warn!("cannot commit folder {}: {err}", self.folder);
        }

        if outcome.initially_complete {
            self.flags.initial_refresh_complete = true;
        }

        if !outcome.success {
            self.flags.refresh_required = true;
            self.flags.check_all_tokens |= outcome.check_all_tokens;
        }

        info!(
            "refresh of folder {} {}",
            self.folder,
            if outcome.success { "succeeded" } else { "failed" }
        );

        self.notifier.emit_folder(FolderEvent::RefreshCompleted {
            folder: self.folder.clone(),
            success: outcome.success,
            deliberate: outcome.deliberate,
        });

        self.run_deferred();
        self.state = RefreshState::Idle;

        if self.flags.clean_prior_to_use && self.flags.connected {
            debug!("cleaning folder {} before use", self.folder);
            self.flags.clean();
        }
    }

    fn run_deferred(&mut self) {
        if !self.deferred.is_empty() {
            debug!("running {} deferred task(s)", self.deferred.len());
        }

        while let Some(task) = self.deferred.pop_front() {
            if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                warn!("deferred task of folder {} panicked", self.folder);
            }
        }
    }
}
