// Tier records and metered feature definitions
// A tier record carries the plan label plus the four per-feature quota ceilings

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::schema::user_tiers;

/// Database value used for an unlimited ceiling
pub const UNLIMITED_SENTINEL: i32 = -1;

/// Plan tier. PRO is derived from subscription state, FREE is the fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Pro => "PRO",
        }
    }

    pub fn is_pro(&self) -> bool {
        matches!(self, Tier::Pro)
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(Tier::Free),
            "PRO" => Ok(Tier::Pro),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counting window for a metered feature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageWindow {
    /// Calendar day
    Daily,
    /// Monday-anchored calendar week
    Weekly,
}

impl UsageWindow {
    pub fn unit(&self) -> &'static str {
        match self {
            UsageWindow::Daily => "day",
            UsageWindow::Weekly => "week",
        }
    }
}

/// Metered feature kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureKind {
    Pyq,
    MockTest,
    ReelScroll,
    AiChat,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Pyq,
        FeatureKind::MockTest,
        FeatureKind::ReelScroll,
        FeatureKind::AiChat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Pyq => "PYQ",
            FeatureKind::MockTest => "MOCK_TEST",
            FeatureKind::ReelScroll => "REEL_SCROLL",
            FeatureKind::AiChat => "AI_CHAT",
        }
    }

    pub fn window(&self) -> UsageWindow {
        match self {
            FeatureKind::MockTest => UsageWindow::Weekly,
            FeatureKind::Pyq | FeatureKind::ReelScroll | FeatureKind::AiChat => UsageWindow::Daily,
        }
    }

    /// Human readable quota name used in denial messages
    pub fn quota_label(&self) -> &'static str {
        match self {
            FeatureKind::Pyq => "Daily PYQ",
            FeatureKind::MockTest => "Weekly mock test",
            FeatureKind::ReelScroll => "Daily reel",
            FeatureKind::AiChat => "Daily AI chat",
        }
    }
}

impl FromStr for FeatureKind {
    type Err = String;

    /// Case-insensitive, accepts both `ai_chat` and `AI_CHAT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PYQ" => Ok(FeatureKind::Pyq),
            "MOCK_TEST" => Ok(FeatureKind::MockTest),
            "REEL_SCROLL" => Ok(FeatureKind::ReelScroll),
            "AI_CHAT" => Ok(FeatureKind::AiChat),
            _ => Err(format!("Invalid usage type: {}", s)),
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota ceiling. Serialized as an integer where -1 means unlimited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "i64", into = "i64")]
pub enum Ceiling {
    Limited(u32),
    Unlimited,
}

impl Ceiling {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Ceiling::Unlimited)
    }

    /// Remaining allowance after `used` units, floored at zero
    pub fn remaining_after(&self, used: u32) -> Ceiling {
        match self {
            Ceiling::Limited(limit) => Ceiling::Limited(limit.saturating_sub(used)),
            Ceiling::Unlimited => Ceiling::Unlimited,
        }
    }

    /// Whether one more unit fits under this ceiling
    pub fn admits(&self, used: u32) -> bool {
        match self {
            Ceiling::Limited(limit) => used < *limit,
            Ceiling::Unlimited => true,
        }
    }

    pub fn to_db(&self) -> i32 {
        match self {
            Ceiling::Limited(limit) => i32::try_from(*limit).unwrap_or(i32::MAX),
            Ceiling::Unlimited => UNLIMITED_SENTINEL,
        }
    }

    pub fn from_db(value: i32) -> Self {
        if value < 0 {
            Ceiling::Unlimited
        } else {
            Ceiling::Limited(value as u32)
        }
    }
}

impl From<i64> for Ceiling {
    fn from(value: i64) -> Self {
        if value < 0 {
            Ceiling::Unlimited
        } else {
            Ceiling::Limited(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

impl From<Ceiling> for i64 {
    fn from(value: Ceiling) -> Self {
        match value {
            Ceiling::Limited(limit) => i64::from(limit),
            Ceiling::Unlimited => i64::from(UNLIMITED_SENTINEL),
        }
    }
}

impl fmt::Display for Ceiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ceiling::Limited(limit) => write!(f, "{}", limit),
            Ceiling::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// The four per-feature ceilings of a tier record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierCeilings {
    pub daily_pyq: Ceiling,
    pub weekly_mock_test: Ceiling,
    pub daily_reel_scroll: Ceiling,
    pub daily_ai_chat: Ceiling,
}

impl TierCeilings {
    pub fn unlimited() -> Self {
        Self {
            daily_pyq: Ceiling::Unlimited,
            weekly_mock_test: Ceiling::Unlimited,
            daily_reel_scroll: Ceiling::Unlimited,
            daily_ai_chat: Ceiling::Unlimited,
        }
    }

    pub fn for_feature(&self, feature: FeatureKind) -> Ceiling {
        match feature {
            FeatureKind::Pyq => self.daily_pyq,
            FeatureKind::MockTest => self.weekly_mock_test,
            FeatureKind::ReelScroll => self.daily_reel_scroll,
            FeatureKind::AiChat => self.daily_ai_chat,
        }
    }

    /// FREE ceilings must all be finite and positive
    pub fn validate_free(&self) -> Result<(), String> {
        for feature in FeatureKind::ALL {
            match self.for_feature(feature) {
                Ceiling::Limited(0) => {
                    return Err(format!("{} ceiling must be positive", feature));
                },
                Ceiling::Unlimited => {
                    return Err(format!("{} ceiling must be finite for FREE tier", feature));
                },
                Ceiling::Limited(_) => {},
            }
        }
        Ok(())
    }
}

/// Stored tier record, one per user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: Tier,
    pub ceilings: TierCeilings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tier record to be inserted or overwritten
#[derive(Debug, Clone, PartialEq)]
pub struct NewTierRecord {
    pub user_id: Uuid,
    pub tier: Tier,
    pub ceilings: TierCeilings,
    pub now: DateTime<Utc>,
}

impl NewTierRecord {
    /// PRO records always carry unlimited ceilings regardless of what was supplied
    pub fn new(user_id: Uuid, tier: Tier, ceilings: TierCeilings, now: DateTime<Utc>) -> Self {
        let ceilings = match tier {
            Tier::Pro => TierCeilings::unlimited(),
            Tier::Free => ceilings,
        };
        Self {
            user_id,
            tier,
            ceilings,
            now,
        }
    }

    pub fn into_row(self) -> NewTierRecordRow {
        NewTierRecordRow {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            tier: self.tier.as_str().to_string(),
            daily_pyq_limit: self.ceilings.daily_pyq.to_db(),
            weekly_mock_limit: self.ceilings.weekly_mock_test.to_db(),
            daily_reel_limit: self.ceilings.daily_reel_scroll.to_db(),
            ai_chat_limit: self.ceilings.daily_ai_chat.to_db(),
            created_at: self.now,
            updated_at: self.now,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = user_tiers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TierRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub daily_pyq_limit: i32,
    pub weekly_mock_limit: i32,
    pub daily_reel_limit: i32,
    pub ai_chat_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_tiers)]
pub struct NewTierRecordRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tier: String,
    pub daily_pyq_limit: i32,
    pub weekly_mock_limit: i32,
    pub daily_reel_limit: i32,
    pub ai_chat_limit: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TierRecordRow> for TierRecord {
    type Error = String;

    fn try_from(row: TierRecordRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            tier: row.tier.parse()?,
            ceilings: TierCeilings {
                daily_pyq: Ceiling::from_db(row.daily_pyq_limit),
                weekly_mock_test: Ceiling::from_db(row.weekly_mock_limit),
                daily_reel_scroll: Ceiling::from_db(row.daily_reel_limit),
                daily_ai_chat: Ceiling::from_db(row.ai_chat_limit),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_kind_parsing() {
        assert_eq!("ai_chat".parse::<FeatureKind>(), Ok(FeatureKind::AiChat));
        assert_eq!("MOCK_TEST".parse::<FeatureKind>(), Ok(FeatureKind::MockTest));
        assert_eq!("reel-scroll".parse::<FeatureKind>(), Ok(FeatureKind::ReelScroll));
        assert!("video".parse::<FeatureKind>().is_err());
    }

    #[test]
    fn test_only_mock_tests_are_weekly() {
        for feature in FeatureKind::ALL {
            let expected = if feature == FeatureKind::MockTest {
                UsageWindow::Weekly
            } else {
                UsageWindow::Daily
            };
            assert_eq!(feature.window(), expected, "{}", feature);
        }
    }

    #[test]
    fn test_ceiling_arithmetic() {
        let ceiling = Ceiling::Limited(5);
        assert!(ceiling.admits(4));
        assert!(!ceiling.admits(5));
        assert_eq!(ceiling.remaining_after(3), Ceiling::Limited(2));
        assert_eq!(ceiling.remaining_after(9), Ceiling::Limited(0));
        assert!(Ceiling::Unlimited.admits(u32::MAX));
        assert_eq!(Ceiling::Unlimited.remaining_after(100), Ceiling::Unlimited);
    }

    #[test]
    fn test_ceiling_sentinel_mapping() {
        assert_eq!(Ceiling::Unlimited.to_db(), -1);
        assert_eq!(Ceiling::from_db(-1), Ceiling::Unlimited);
        assert_eq!(Ceiling::from_db(7), Ceiling::Limited(7));
        assert_eq!(serde_json::to_string(&Ceiling::Unlimited).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&Ceiling::Limited(3)).unwrap(), "3");
        assert_eq!(serde_json::from_str::<Ceiling>("-1").unwrap(), Ceiling::Unlimited);
    }

    #[test]
    fn test_pro_record_forces_unlimited_ceilings() {
        let supplied = TierCeilings {
            daily_pyq: Ceiling::Limited(1),
            weekly_mock_test: Ceiling::Limited(1),
            daily_reel_scroll: Ceiling::Limited(1),
            daily_ai_chat: Ceiling::Limited(1),
        };
        let record = NewTierRecord::new(Uuid::new_v4(), Tier::Pro, supplied, Utc::now());
        assert_eq!(record.ceilings, TierCeilings::unlimited());

        let record = NewTierRecord::new(Uuid::new_v4(), Tier::Free, supplied, Utc::now());
        assert_eq!(record.ceilings, supplied);
    }

    #[test]
    fn test_free_ceiling_validation() {
        let mut ceilings = TierCeilings {
            daily_pyq: Ceiling::Limited(10),
            weekly_mock_test: Ceiling::Limited(1),
            daily_reel_scroll: Ceiling::Limited(10),
            daily_ai_chat: Ceiling::Limited(5),
        };
        assert!(ceilings.validate_free().is_ok());

        ceilings.daily_ai_chat = Ceiling::Limited(0);
        assert!(ceilings.validate_free().is_err());

        ceilings.daily_ai_chat = Ceiling::Unlimited;
        assert!(ceilings.validate_free().is_err());
    }
}
