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
use std::{collections::BTreeSet, fmt, ops};

use crate::Flag;

/// Represents the list of flags.
///
/// Flags are kept in a sorted set so that two records carrying the
/// same flags always compare and serialize the same way.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Flags(pub BTreeSet<Flag>);

impl Flags {
    pub fn is_seen(&self) -> bool {
        self.contains(&Flag::Seen)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut glue = "";

        for flag in &self.0 {
            write!(f, "{glue}{flag}")?;
            glue = " ";
        }

        Ok(())
    }
}

impl ops::Deref for Flags {
    type Target = BTreeSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl ops::DerefMut for Flags {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<&str> for Flags {
    fn from(flags: &str) -> Self {
        Flags(flags.split_whitespace().map(Flag::from).collect())
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        let mut flags = Flags::default();
        flags.extend(iter);
        flags
    }
}

#[cfg(test)]
mod tests {
    use crate::{Flag, Flags};

    #[test]
    fn flags_string_round_trip() {
        let flags = Flags::from("seen \\Flagged $Junk");
        assert_eq!(
            Flags::from_iter([Flag::Seen, Flag::Flagged, Flag::Junk]),
            flags
        );
        assert_eq!(flags, Flags::from(flags.to_string().as_str()));
    }
}
