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

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the flag variants.
#[derive(Debug, Clone, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Recent,
    Forwarded,
    Junk,
    Custom(String),
}

impl Flag {
    pub fn custom<F: ToString>(flag: F) -> Self {
        Self::Custom(flag.to_string())
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        match s.trim().trim_start_matches('\\').to_lowercase().as_str() {
            "seen" => Flag::Seen,
            "answered" | "replied" => Flag::Answered,
            "flagged" => Flag::Flagged,
            "deleted" | "trashed" => Flag::Deleted,
            "draft" => Flag::Draft,
            "recent" => Flag::Recent,
            "forwarded" | "$forwarded" | "passed" => Flag::Forwarded,
            "junk" | "$junk" | "spam" => Flag::Junk,
            _ => Flag::Custom(s.trim().into()),
        }
    }
}

impl From<String> for Flag {
    fn from(s: String) -> Self {
        s.as_str().into()
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Seen => write!(f, "seen"),
            Flag::Answered => write!(f, "answered"),
            Flag::Flagged => write!(f, "flagged"),
            Flag::Deleted => write!(f, "deleted"),
            Flag::Draft => write!(f, "draft"),
            Flag::Recent => write!(f, "recent"),
            Flag::Forwarded => write!(f, "forwarded"),
            Flag::Junk => write!(f, "junk"),
            Flag::Custom(flag) => write!(f, "{flag}"),
        }
    }
}
