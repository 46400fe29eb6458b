//! Shared setup for API tests
//!
//! Every test gets a fresh router over a seeded in-memory store with one
//! customer, one admin, and two drivers, plus access tokens for each.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use medemede_api::app::{build_router, AppState};
use medemede_api::config::Config;
use medemede_shared::auth::jwt::{create_token, Claims, TokenType};
use medemede_shared::auth::password::hash_password;
use medemede_shared::models::product::Product;
use medemede_shared::models::user::{CreateUser, User, UserRole};
use medemede_shared::services::payments::MockGateway;
use medemede_shared::storage::{MemoryStorage, Storage};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const PASSWORD: &str = "Kwacha2024";

pub struct TestContext {
    pub storage: Arc<MemoryStorage>,
    pub app: Router,
    pub config: Config,
    pub customer: User,
    pub admin: User,
    pub driver: User,
    pub other_driver: User,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }
}

async fn create_user(
    storage: &MemoryStorage,
    email: &str,
    role: UserRole,
    password_hash: &str,
) -> anyhow::Result<User> {
    Ok(storage
        .create_user(CreateUser {
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some(role.as_str().to_string()),
            phone_number: Some("+265991000001".to_string()),
            role,
            vehicle_number: (role == UserRole::Driver).then(|| "BT 1234".to_string()),
            driver_license_number: None,
        })
        .await?)
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_config(Config::default()).await
    }

    pub async fn with_config(config: Config) -> anyhow::Result<Self> {
        let storage = Arc::new(MemoryStorage::seeded());
        let hash = hash_password(PASSWORD)?;

        let customer = create_user(&storage, "customer@test.mw", UserRole::Customer, &hash).await?;
        let admin = create_user(&storage, "admin@test.mw", UserRole::Admin, &hash).await?;
        let driver = create_user(&storage, "driver@test.mw", UserRole::Driver, &hash).await?;
        let other_driver = create_user(&storage, "driver2@test.mw", UserRole::Driver, &hash).await?;

        let state = AppState::new(storage.clone(), Arc::new(MockGateway), config.clone());
        let app = build_router(state);

        Ok(TestContext {
            storage,
            app,
            config,
            customer,
            admin,
            driver,
            other_driver,
        })
    }

    pub fn token_for(&self, user: &User) -> String {
        let claims = Claims::new(user.id, user.role, TokenType::Access);
        create_token(&claims, &self.config.jwt.secret).unwrap()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, user: &User) -> TestResponse {
        self.send(Method::GET, uri, Some(&self.token_for(user)), None).await
    }

    pub async fn post(&self, uri: &str, user: &User, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(&self.token_for(user)), Some(body))
            .await
    }

    pub async fn patch(&self, uri: &str, user: &User, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, Some(&self.token_for(user)), Some(body))
            .await
    }

    pub async fn product(&self, name: &str) -> Product {
        self.storage
            .list_products(true)
            .await
            .unwrap()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    /// Puts `quantity` of a product in the customer's cart and checks out
    pub async fn place_order(&self, product: &str, quantity: i32) -> Value {
        let product = self.product(product).await;
        let added = self
            .post(
                "/api/cart",
                &self.customer,
                serde_json::json!({ "productId": product.id, "quantity": quantity }),
            )
            .await;
        assert_eq!(added.status, StatusCode::CREATED, "{:?}", added.body);

        let order = self
            .post(
                "/api/orders",
                &self.customer,
                serde_json::json!({ "deliveryLocation": "Area 47, Lilongwe" }),
            )
            .await;
        assert_eq!(order.status, StatusCode::CREATED, "{:?}", order.body);
        order.body
    }
}
