//! Guard level - paid subscription tier of a room

use serde::{Deserialize, Serialize};
use std::fmt;

/// Guard subscription tier
///
/// The wire value ranks tiers 1 (highest) to 3 (lowest). Any other value is
/// reported as [`GuardLevel::Crew`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardLevel {
    /// 总督 (level 1)
    Governor,
    /// 提督 (level 2)
    Admiral,
    /// 舰长 (level 3)
    Captain,
    /// 船员 (unknown level)
    Crew,
}

impl GuardLevel {
    /// Map a wire level to a tier
    #[must_use]
    pub const fn from_level(level: i64) -> Self {
        match level {
            1 => Self::Governor,
            2 => Self::Admiral,
            3 => Self::Captain,
            _ => Self::Crew,
        }
    }

    /// Get the display name used in chat notices
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Governor => "总督",
            Self::Admiral => "提督",
            Self::Captain => "舰长",
            Self::Crew => "船员",
        }
    }
}

impl fmt::Display for GuardLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
