#![allow(dead_code)]

//! Shared in-memory test doubles for the checkout flow. The repositories
//! and the payment provider are replaced by deterministic fakes so the
//! full HTTP surface can be exercised without a database or network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use storefront_checkout as api;

use api::config::AppConfig;
use api::entities::{coupon, order, product};
use api::errors::ServiceError;
use api::events::EventSender;
use api::payments::{
    CreateSessionRequest, PaymentProvider, ProviderError, ProviderSession, SessionStatus,
};
use api::repositories::{
    CartRepository, CatalogRepository, CouponConsumption, CouponRepository, NewOrder, OrderInsert,
    OrderRepository,
};
use api::services::checkout::{CheckoutService, CheckoutSettings};
use api::{AppServices, AppState};

pub struct InMemoryCatalog {
    products: Vec<product::Model>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<product::Model>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn get_products(&self, ids: &[Uuid]) -> Result<Vec<product::Model>, ServiceError> {
        Ok(self
            .products
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }
}

pub struct InMemoryCoupons {
    coupons: Mutex<Vec<coupon::Model>>,
}

impl InMemoryCoupons {
    pub fn new(coupons: Vec<coupon::Model>) -> Self {
        Self {
            coupons: Mutex::new(coupons),
        }
    }

    pub fn is_active(&self, coupon_id: Uuid) -> bool {
        self.coupons
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == coupon_id)
            .map(|c| c.is_active)
            .unwrap_or(false)
    }
}

#[async_trait]
impl CouponRepository for InMemoryCoupons {
    async fn find_by_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<Option<coupon::Model>, ServiceError> {
        Ok(self
            .coupons
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.user_id == user_id && c.code == code)
            .cloned())
    }

    async fn consume(&self, coupon_id: Uuid) -> Result<CouponConsumption, ServiceError> {
        let mut coupons = self.coupons.lock().unwrap();
        match coupons.iter_mut().find(|c| c.id == coupon_id) {
            Some(coupon) if coupon.is_active => {
                coupon.is_active = false;
                Ok(CouponConsumption::Consumed)
            }
            _ => Ok(CouponConsumption::AlreadyUsed),
        }
    }
}

pub struct InMemoryOrders {
    orders: Mutex<Vec<order::Model>>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn create_if_absent(&self, new_order: NewOrder) -> Result<OrderInsert, ServiceError> {
        let mut orders = self.orders.lock().unwrap();
        if let Some(existing) = orders
            .iter()
            .find(|o| o.provider_reference == new_order.provider_reference)
        {
            return Ok(OrderInsert::AlreadyExists(existing.clone()));
        }

        let order = order::Model {
            id: Uuid::new_v4(),
            user_id: new_order.user_id,
            total_amount: new_order.total_amount,
            currency: new_order.currency,
            provider_reference: new_order.provider_reference,
            created_at: Utc::now(),
        };
        orders.push(order.clone());
        Ok(OrderInsert::Created(order))
    }

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.provider_reference == reference)
            .cloned())
    }
}

pub struct InMemoryCarts {
    cleared: Mutex<Vec<Uuid>>,
}

impl InMemoryCarts {
    pub fn new() -> Self {
        Self {
            cleared: Mutex::new(Vec::new()),
        }
    }

    pub fn cleared_for(&self, user_id: Uuid) -> usize {
        self.cleared
            .lock()
            .unwrap()
            .iter()
            .filter(|id| **id == user_id)
            .count()
    }
}

#[async_trait]
impl CartRepository for InMemoryCarts {
    async fn clear_cart(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        self.cleared.lock().unwrap().push(user_id);
        Ok(1)
    }
}

/// Fake hosted-payment provider. Sessions created through it are retrieved
/// as paid, with the total derived from the line items and discount the
/// same way the real provider would charge them.
pub struct FakeProvider {
    sessions: Mutex<HashMap<String, CreateSessionRequest>>,
    counter: AtomicU64,
    paid: Mutex<bool>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(0),
            paid: Mutex::new(true),
        }
    }

    pub fn set_paid(&self, paid: bool) {
        *self.paid.lock().unwrap() = paid;
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn session(&self, session_id: &str) -> Option<CreateSessionRequest> {
        self.sessions.lock().unwrap().get(session_id).cloned()
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_session(
        &self,
        request: CreateSessionRequest,
    ) -> Result<ProviderSession, ProviderError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{}", n);
        self.sessions.lock().unwrap().insert(id.clone(), request);
        Ok(ProviderSession {
            url: format!("https://pay.test/{}", id),
            id,
        })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus, ProviderError> {
        let sessions = self.sessions.lock().unwrap();
        let request = sessions
            .get(session_id)
            .ok_or_else(|| ProviderError::Api {
                status: 404,
                message: "no such session".to_string(),
            })?;

        let gross_minor: i64 = request
            .line_items
            .iter()
            .map(|l| l.unit_amount_minor * l.quantity)
            .sum();
        let discount = request.discount_percentage.unwrap_or(0);
        let net = Decimal::new(gross_minor, 2)
            * (Decimal::ONE - Decimal::from(discount) / Decimal::ONE_HUNDRED);
        let amount_total = net.round_dp(2);

        Ok(SessionStatus {
            paid: *self.paid.lock().unwrap(),
            reference: format!("pi_{}", session_id),
            amount_total,
            metadata: request.metadata.clone(),
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "debug".to_string(),
        log_json: false,
        auto_migrate: false,
        currency: "usd".to_string(),
        provider_api_base: "http://provider.test".to_string(),
        provider_secret_key: "sk_test_fake".to_string(),
        checkout_success_url: "http://shop.test/purchase-success".to_string(),
        checkout_cancel_url: "http://shop.test/purchase-cancel".to_string(),
        payment_webhook_secret: None,
        payment_webhook_tolerance_secs: Some(300),
        cors_allowed_origins: None,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 1,
        db_idle_timeout_secs: 1,
    }
}

pub fn sample_product(id: Uuid, name: &str, price: Decimal) -> product::Model {
    product::Model {
        id,
        name: name.to_string(),
        price,
        category: "general".to_string(),
        is_featured: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_coupon(user_id: Uuid, code: &str, percent: i32) -> coupon::Model {
    coupon::Model {
        id: Uuid::new_v4(),
        code: code.to_string(),
        user_id,
        discount_percentage: percent,
        expiration_date: Utc::now() + Duration::days(30),
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// Full application wired against in-memory fakes.
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    pub coupons: Arc<InMemoryCoupons>,
    pub orders: Arc<InMemoryOrders>,
    pub carts: Arc<InMemoryCarts>,
}

impl TestApp {
    pub fn new(products: Vec<product::Model>, coupons: Vec<coupon::Model>) -> Self {
        let provider = Arc::new(FakeProvider::new());
        let coupons = Arc::new(InMemoryCoupons::new(coupons));
        let orders = Arc::new(InMemoryOrders::new());
        let carts = Arc::new(InMemoryCarts::new());

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        tokio::spawn(api::events::process_events(event_rx));

        let config = test_config();
        let checkout = Arc::new(CheckoutService::new(
            Arc::new(InMemoryCatalog::new(products)),
            coupons.clone(),
            orders.clone(),
            carts.clone(),
            provider.clone(),
            event_sender.clone(),
            CheckoutSettings {
                currency: config.currency.clone(),
                success_url: config.checkout_success_url.clone(),
                cancel_url: config.checkout_cancel_url.clone(),
            },
        ));

        let state = AppState {
            db: Arc::new(DatabaseConnection::default()),
            config,
            event_sender,
            services: AppServices { checkout },
        };

        Self {
            state,
            provider,
            coupons,
            orders,
            carts,
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .nest("/api/v1", api::api_v1_routes())
            .layer(axum::middleware::from_fn(
                api::request_id::request_id_middleware,
            ))
            .with_state(self.state.clone())
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        user_id: Option<Uuid>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user_id) = user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }

        let request = builder
            .body(Body::from(
                body.map(|b| b.to_string()).unwrap_or_default(),
            ))
            .expect("request builds");

        self.router().oneshot(request).await.expect("router responds")
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
