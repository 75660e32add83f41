// Application state and router assembly
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::FreeTierDefaults,
    handlers,
    middleware::auth_middleware,
    services::{
        Clock, JwtService, PaymentGateway, PaymentService, PaymentSettings, SignatureVerifier,
        SubscriptionManager, TierStore, UsageLedger, UsageLimitService, UserService,
    },
    store::Store,
};

/// Everything the service graph needs besides its collaborators
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub free_tier: FreeTierDefaults,
    pub payment: PaymentSettings,
    /// Gateway key secret used for settlement signatures
    pub signature_secret: String,
    pub subscription_sweep_interval_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl AppSettings {
    pub fn from_config() -> Self {
        let config = crate::app_config::config();
        Self {
            free_tier: FreeTierDefaults::from_config(),
            payment: PaymentSettings::from_config(),
            signature_secret: config.razorpay_key_secret.clone(),
            subscription_sweep_interval_secs: config.subscription_sweep_interval_secs,
            cors_allowed_origins: config.cors_allowed_origins.clone(),
        }
    }
}

// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub jwt_service: Arc<JwtService>,
    pub user_service: Arc<UserService>,
    pub subscription_manager: Arc<SubscriptionManager>,
    pub tier_store: Arc<TierStore>,
    pub usage_limits: Arc<UsageLimitService>,
    pub payment_service: Arc<PaymentService>,
    pub settings: Arc<AppSettings>,
}

impl AppState {
    /// Wires the service graph over one store, one gateway and one clock
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        jwt_service: Arc<JwtService>,
        settings: AppSettings,
    ) -> Self {
        let subscription_manager = Arc::new(SubscriptionManager::new(store.clone(), clock.clone()));
        let tier_store = Arc::new(TierStore::new(
            store.clone(),
            clock.clone(),
            subscription_manager.clone(),
            settings.free_tier,
        ));
        let ledger = Arc::new(UsageLedger::new(store.clone(), clock.clone()));
        let usage_limits = Arc::new(UsageLimitService::new(
            tier_store.clone(),
            ledger,
            subscription_manager.clone(),
            clock.clone(),
        ));
        let payment_service = Arc::new(PaymentService::new(
            store.clone(),
            gateway,
            SignatureVerifier::new(&settings.signature_secret),
            subscription_manager.clone(),
            clock.clone(),
            settings.payment.clone(),
        ));
        let user_service = Arc::new(UserService::new(store.clone(), clock));

        Self {
            store,
            jwt_service,
            user_service,
            subscription_manager,
            tier_store,
            usage_limits,
            payment_service,
            settings: Arc::new(settings),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        layer.allow_origin(origins)
    }
}

/// Full HTTP surface: public routes plus the bearer-authenticated API
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/user", handlers::limits_routes())
        .nest("/payment", handlers::payment_routes())
        .nest("/admin", handlers::admin_routes())
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(handlers::public_routes())
        .merge(protected);

    Router::new()
        .route("/health", get(crate::health_check))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.settings.cors_allowed_origins))
        .with_state(state)
}
