use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static allow-list of administrator ids provided at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminDirectory {
    ids: BTreeSet<UserId>,
}

impl AdminDirectory {
    pub fn new(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self { ids: ids.into_iter().collect() }
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.ids.contains(&user_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
