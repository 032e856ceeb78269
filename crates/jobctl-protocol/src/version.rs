//! Wire protocol version marker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the two incompatible jobs API shapes a request is addressed to.
///
/// Never persisted on its own; callers derive it from the settings being
/// sent or read on every call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiVersion {
    /// Single-task jobs (API 2.0). The default.
    #[default]
    Legacy,
    /// Jobs carrying a list of tasks (API 2.1).
    MultiTask,
}

impl ApiVersion {
    /// Path segment used in the versioned API root.
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::Legacy => "2.0",
            ApiVersion::MultiTask => "2.1",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
