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

use std::fmt;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RefreshState {
    #[default]
    Idle,
    /// A refresh has been requested while disconnected, it starts on
    /// the next preparation for use.
    RefreshPending,
    Refreshing,
    PostRefreshTasksRunning,
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::RefreshPending => write!(f, "refresh pending"),
            Self::Refreshing => write!(f, "refreshing"),
            Self::PostRefreshTasksRunning => write!(f, "running post-refresh tasks"),
        }
    }
}

/// Represents the refresh state flags of a folder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RefreshFlags {
    /// The current or last pass was requested by a user action.
    pub deliberate: bool,
    /// A pass reached its last phase since the last clean.
    pub initial_refresh_complete: bool,
    /// The connection has been lost, assumptions about the server
    /// state are stale.
    pub clean_prior_to_use: bool,
    /// A refresh has been requested while one was running, or the
    /// last one failed.
    pub refresh_required: bool,
    /// The next pass must check every cached token.
    pub check_all_tokens: bool,
    pub connected: bool,
}

impl Default for RefreshFlags {
    fn default() -> Self {
        Self {
            deliberate: false,
            initial_refresh_complete: false,
            clean_prior_to_use: false,
            refresh_required: false,
            check_all_tokens: false,
            connected: true,
        }
    }
}

impl RefreshFlags {
    /// Whether a pass is needed before the folder state can be
    /// trusted.
    pub fn is_refresh_needed(&self) -> bool {
        self.refresh_required || !self.initial_refresh_complete
    }

    /// Forgets everything assumed about the server state, so the next
    /// pass reconciles the whole folder.
    pub fn clean(&mut self) {
        self.clean_prior_to_use = false;
        self.initial_refresh_complete = false;
        self.check_all_tokens = true;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RefreshSnapshot {
    pub state: RefreshState,
    pub flags: RefreshFlags,
    pub deferred_tasks: usize,
}

impl RefreshSnapshot {
    pub fn is_refreshing(&self) -> bool {
        self.state == RefreshState::Refreshing
    }
}

impl fmt::Display for RefreshSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} deferred task(s))", self.state, self.deferred_tasks)
    }
}
