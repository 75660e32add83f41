pub mod auth;
pub mod payment;
pub mod plan;
pub mod subscription;
pub mod tier;
pub mod usage;
pub mod user;

// Re-export common types
pub use auth::{AccessTokenClaims, ADMIN_SCOPE};
pub use payment::{NewPayment, Payment, PaymentSettlement, PaymentStatus};
pub use plan::{NewPaymentPlan, PaymentPlan};
pub use subscription::{NewSubscription, Subscription, SubscriptionView};
pub use tier::{
    Ceiling, FeatureKind, NewTierRecord, Tier, TierCeilings, TierRecord, UsageWindow,
    UNLIMITED_SENTINEL,
};
pub use usage::{UsageKey, UsageRecord};
pub use user::{CreateUserRequest, NewUser, User};
