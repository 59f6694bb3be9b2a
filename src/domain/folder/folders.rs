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

//! Folders module.
//!
//! This module contains the representation of a set of folder
//! identities.

use serde::Serialize;
use std::{collections::BTreeSet, ops};

use crate::FolderId;

/// Represents the set of known folder identities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FolderIds(pub BTreeSet<FolderId>);

impl ops::Deref for FolderIds {
    type Target = BTreeSet<FolderId>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for FolderIds {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl FromIterator<FolderId> for FolderIds {
    fn from_iter<T: IntoIterator<Item = FolderId>>(iter: T) -> Self {
        Self(BTreeSet::from_iter(iter))
    }
}
