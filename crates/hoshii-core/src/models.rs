use std::fmt;

use serde::{Deserialize, Serialize};

/// Catalog identifier of one anime, as assigned by AniList.
///
/// Opaque to this crate: it is only compared, hashed, and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimeId(pub u64);

impl AnimeId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for AnimeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AnimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
