// Common test utilities shared across the integration suites
// Everything runs against the in-memory store and a manual clock; no database or network
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use aspirant_backend_core::{
    app::{build_router, AppSettings, AppState},
    config::FreeTierDefaults,
    models::{NewPaymentPlan, NewUser, PaymentPlan, User},
    services::{
        Clock, GatewayError, GatewayOrder, JwtConfig, JwtService, ManualClock, PaymentGateway,
        PaymentSettings, RetryPolicy, SignatureVerifier,
    },
    store::{InMemoryStore, Store},
};
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

pub const TEST_GATEWAY_SECRET: &str = "test_razorpay_key_secret";
pub const TEST_GATEWAY_KEY_ID: &str = "rzp_test_key";

/// Midnight UTC on the given date
pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn at_time(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, min, 0).unwrap()
}

/// Gateway double that hands out sequential order ids and can be told to fail first
#[derive(Default)]
pub struct FakeGateway {
    calls: AtomicUsize,
    failures: Mutex<VecDeque<GatewayError>>,
}

impl FakeGateway {
    /// Queue errors returned by the next calls, in order
    pub fn fail_next(&self, errors: Vec<GatewayError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(GatewayOrder {
            id: format!("order_test_{}", call),
            amount,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
            status: "created".to_string(),
        })
    }

    fn key_id(&self) -> &str {
        TEST_GATEWAY_KEY_ID
    }
}

pub fn server_error() -> GatewayError {
    GatewayError::Api {
        status: 502,
        code: "SERVER_ERROR".to_string(),
        description: "upstream unavailable".to_string(),
    }
}

pub fn test_settings() -> AppSettings {
    AppSettings {
        free_tier: FreeTierDefaults::default(),
        payment: PaymentSettings {
            currency: "INR".to_string(),
            retry: RetryPolicy {
                retry_attempts: 3,
                retry_delay: Duration::from_millis(1),
            },
        },
        signature_secret: TEST_GATEWAY_SECRET.to_string(),
        subscription_sweep_interval_secs: 0,
        cors_allowed_origins: vec!["*".to_string()],
    }
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
    pub gateway: Arc<FakeGateway>,
    pub jwt_service: Arc<JwtService>,
    pub verifier: SignatureVerifier,
}

/// Full service graph over fresh in-memory state, with the clock at `now`
pub fn setup_test_app_at(now: DateTime<Utc>) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(ManualClock::new(now));
    let gateway = Arc::new(FakeGateway::default());
    let jwt_service = Arc::new(JwtService::new(JwtConfig::for_test()));

    let state = AppState::new(
        store.clone() as Arc<dyn Store>,
        gateway.clone() as Arc<dyn PaymentGateway>,
        clock.clone() as Arc<dyn Clock>,
        jwt_service.clone(),
        test_settings(),
    );

    TestApp {
        app: build_router(state.clone()),
        state,
        store,
        clock,
        gateway,
        jwt_service,
        verifier: SignatureVerifier::new(TEST_GATEWAY_SECRET),
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_at(at_time(2024, 1, 1, 9, 0))
}

impl TestApp {
    pub async fn create_user(&self, username: &str) -> User {
        self.store
            .insert_user(NewUser::new(
                &format!("{}@example.com", username),
                username,
                self.clock.now(),
            ))
            .await
            .unwrap()
    }

    /// `price` in paise
    pub async fn create_plan(&self, name: &str, price: i32, duration_days: i32) -> PaymentPlan {
        self.state
            .payment_service
            .create_plan(NewPaymentPlan {
                name: name.to_string(),
                description: Some(format!("{} access", name)),
                price,
                duration_days,
                features: vec!["Unlimited AI chat".to_string()],
                is_active: true,
            })
            .await
            .unwrap()
    }

    /// Creates an order for the plan and settles it with a valid signature
    pub async fn buy_plan(&self, user: &User, plan: &PaymentPlan) -> String {
        let order = self
            .state
            .payment_service
            .create_order(user.id, plan.id)
            .await
            .unwrap();
        let payment_id = format!("pay_{}", order.order_id);
        let signature = self.verifier.sign(&order.order_id, &payment_id);
        self.state
            .payment_service
            .settle_payment(&order.order_id, &payment_id, &signature, Some("upi".to_string()))
            .await
            .unwrap();
        order.order_id
    }

    pub fn token_for(&self, user: &User, scopes: &[&str]) -> String {
        self.jwt_service
            .generate_access_token(
                &user.id.to_string(),
                &user.email,
                scopes.iter().map(|s| s.to_string()).collect(),
            )
            .unwrap()
    }

    pub fn get(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "GET", uri)
    }

    pub fn post(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "POST", uri)
    }

    pub fn put(&self, uri: &str) -> TestRequest<'_> {
        TestRequest::new(self, "PUT", uri)
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: &'static str,
    uri: String,
    token: Option<String>,
    body: Option<Vec<u8>>,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &'static str, uri: &str) -> Self {
        Self {
            app,
            method,
            uri: uri.to_string(),
            token: None,
            body: None,
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self
    }

    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(&self.uri);
        if let Some(token) = &self.token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match self.body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.app.clone().oneshot(request).await.unwrap();
        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}
