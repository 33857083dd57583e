use std::fmt;

use serde::{Deserialize, Serialize};

/// Subscription level; decides how many profile imports a user gets per UTC day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Tier {
    #[serde(alias = "free")]
    Free,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "premium")]
    Premium,
}

impl Tier {
    /// Daily import allowance. `None` means unlimited.
    pub fn daily_import_limit(&self) -> Option<u32> {
        match self {
            Tier::Free => Some(2),
            Tier::Medium => Some(5),
            Tier::Premium => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Medium => "Medium",
            Tier::Premium => "Premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
