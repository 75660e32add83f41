// Services module for the Aspirant backend
// Business logic layer: quota decisions, subscriptions and payment settlement

pub mod background_tasks;
pub mod clock;
pub mod jwt;
pub mod payment;
pub mod razorpay;
pub mod signature;
pub mod subscription;
pub mod tier_store;
pub mod usage_ledger;
pub mod usage_limits;
pub mod user;

// Re-export commonly used services
pub use background_tasks::{initialize_background_tasks, BackgroundTaskManager};
pub use clock::{Clock, ManualClock, SystemClock};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use payment::{
    OrderSummary, PaymentError, PaymentService, PaymentSettings, PlanSummary, RetryPolicy,
};
pub use razorpay::{GatewayError, GatewayOrder, PaymentGateway, RazorpayClient, RazorpayConfig};
pub use signature::SignatureVerifier;
pub use subscription::{SubscriptionError, SubscriptionManager};
pub use tier_store::{TierError, TierStatistics, TierStore};
pub use usage_ledger::UsageLedger;
pub use usage_limits::{
    DenialReason, FeatureStatus, LimitError, LimitsStatus, UsageDecision, UsageLimitService,
};
pub use user::{UserError, UserService};
