// Free tier quota defaults
// Used when a FREE tier record is materialized or reset without explicit ceilings

use serde::{Deserialize, Serialize};

use crate::models::{Ceiling, TierCeilings};

/// Default per-window ceilings for FREE users
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FreeTierDefaults {
    /// PYQ views per day
    pub daily_pyq: u32,

    /// Mock tests per Monday-anchored week
    pub weekly_mock_test: u32,

    /// Reel scrolls per day
    pub daily_reel_scroll: u32,

    /// AI chat messages per day
    pub daily_ai_chat: u32,
}

impl Default for FreeTierDefaults {
    fn default() -> Self {
        Self {
            daily_pyq: 10,
            weekly_mock_test: 1,
            daily_reel_scroll: 10,
            daily_ai_chat: 5,
        }
    }
}

impl FreeTierDefaults {
    /// Defaults taken from the process configuration
    pub fn from_config() -> Self {
        let config = crate::app_config::config();
        Self {
            daily_pyq: config.free_daily_pyq_limit,
            weekly_mock_test: config.free_weekly_mock_limit,
            daily_reel_scroll: config.free_daily_reel_limit,
            daily_ai_chat: config.free_daily_ai_chat_limit,
        }
    }

    pub fn ceilings(&self) -> TierCeilings {
        TierCeilings {
            daily_pyq: Ceiling::Limited(self.daily_pyq),
            weekly_mock_test: Ceiling::Limited(self.weekly_mock_test),
            daily_reel_scroll: Ceiling::Limited(self.daily_reel_scroll),
            daily_ai_chat: Ceiling::Limited(self.daily_ai_chat),
        }
    }
}
