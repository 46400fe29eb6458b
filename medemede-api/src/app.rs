//! Application state and router builder
//!
//! # Example
//!
//! ```no_run
//! use medemede_api::{app::{build_router, AppState}, config::Config};
//! use medemede_shared::services::payments::MockGateway;
//! use medemede_shared::storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let state = AppState::new(
//!     Arc::new(MemoryStorage::seeded()),
//!     Arc::new(MockGateway),
//!     Config::default(),
//! );
//! let app = build_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::middleware::{
    auth::{admin_only, authenticated, driver_only},
    rate_limit::{auth_rate_limit, RateLimit, RateLimiter},
    security::SecurityHeadersLayer,
};
use crate::routes;
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use medemede_shared::services::payments::PaymentGateway;
use medemede_shared::storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,

    pub payments: Arc<dyn PaymentGateway>,

    pub config: Arc<Config>,

    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    /// State with an in-process auth rate limiter
    pub fn new(storage: Arc<dyn Storage>, payments: Arc<dyn PaymentGateway>, config: Config) -> Self {
        let limiter = RateLimiter::new(RateLimit::per_minute(config.rate_limit.auth_per_minute));
        Self {
            storage,
            payments,
            config: Arc::new(config),
            rate_limiter: Arc::new(limiter),
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Arc::new(limiter);
        self
    }

    pub fn store(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.payments.as_ref()
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete router
///
/// ```text
/// /health
/// /api
/// ├── /auth          register, login, refresh (rate limited), logout, user
/// ├── /users/me      profile edits
/// ├── /products      catalogue; writes are admin only
/// ├── /cart          the caller's cart
/// ├── /orders        checkout, order history, admin status changes
/// ├── /delivery      live tracking
/// ├── /admin         console: orders, drivers, stock, analytics, staff
/// ├── /driver        delivery app
/// ├── /payment       Stripe intents and refunds
/// ├── /loyalty
/// ├── /events
/// └── /chat
/// ```
///
/// Layers, outermost first: security headers, CORS, compression, tracing.
pub fn build_router(state: AppState) -> Router {
    let authed = || from_fn_with_state(state.clone(), authenticated);
    let admin = || from_fn_with_state(state.clone(), admin_only);
    let driver = || from_fn_with_state(state.clone(), driver_only);

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route_layer(from_fn_with_state(state.clone(), auth_rate_limit))
        .route("/logout", post(routes::auth::logout))
        .route("/user", get(routes::auth::current_user).layer(authed()));

    let user_routes = Router::new()
        .route("/me", patch(routes::users::update_me))
        .route_layer(authed());

    let product_routes = Router::new()
        .route(
            "/",
            get(routes::products::list_products)
                .merge(post(routes::products::create_product).layer(admin())),
        )
        .route(
            "/:id",
            get(routes::products::get_product)
                .merge(patch(routes::products::update_product).layer(admin())),
        );

    let cart_routes = Router::new()
        .route(
            "/",
            get(routes::cart::get_cart)
                .post(routes::cart::add_item)
                .delete(routes::cart::clear_cart),
        )
        .route(
            "/:id",
            patch(routes::cart::update_item).delete(routes::cart::remove_item),
        )
        .route_layer(authed());

    let order_routes = Router::new()
        .route(
            "/",
            get(routes::orders::list_orders)
                .post(routes::orders::checkout)
                .layer(authed()),
        )
        .route(
            "/:id",
            get(routes::orders::get_order)
                .layer(authed())
                .merge(patch(routes::orders::update_status).layer(admin())),
        );

    let delivery_routes = Router::new()
        .route("/:order_id/tracking", get(routes::delivery::tracking))
        .route_layer(authed());

    let admin_routes = Router::new()
        .route("/orders", get(routes::admin::orders))
        .route("/orders/:id/assign", post(routes::admin::assign_driver))
        .route("/drivers", get(routes::admin::drivers))
        .route("/inventory-alerts", get(routes::admin::inventory_alerts))
        .route("/analytics", get(routes::admin::analytics))
        .route("/notifications", get(routes::admin::notifications))
        .route("/users", post(routes::admin::create_user))
        .route("/products", get(routes::admin::products))
        .route(
            "/products/:id/toggle-availability",
            post(routes::admin::toggle_availability),
        )
        .route_layer(admin());

    let driver_routes = Router::new()
        .route("/available", get(routes::driver::available_drivers))
        .route_layer(admin())
        .merge(
            Router::new()
                .route("/stats", get(routes::driver::stats))
                .route("/deliveries", get(routes::driver::deliveries))
                .route("/history", get(routes::driver::history))
                .route("/open", get(routes::driver::open_deliveries))
                .route("/location", post(routes::driver::update_location))
                .route("/accept/:id", post(routes::driver::accept))
                .route("/start/:id", post(routes::driver::start))
                .route("/complete/:id", post(routes::driver::complete))
                .route("/availability", patch(routes::driver::set_availability))
                .route_layer(driver()),
        );

    let payment_routes = Router::new()
        .route("/create-intent", post(routes::payment::create_intent))
        .route("/confirm", post(routes::payment::confirm))
        .route_layer(authed())
        .route("/refund", post(routes::payment::refund).layer(admin()));

    let event_routes = Router::new().route(
        "/",
        get(routes::events::list_events).merge(post(routes::events::create_event).layer(admin())),
    );

    let chat_routes = Router::new()
        .route(
            "/",
            get(routes::chat::list_messages).post(routes::chat::post_message),
        )
        .route_layer(authed());

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/products", product_routes)
        .nest("/cart", cart_routes)
        .nest("/orders", order_routes)
        .nest("/delivery", delivery_routes)
        .nest("/admin", admin_routes)
        .nest("/driver", driver_routes)
        .nest("/payment", payment_routes)
        .route("/loyalty", get(routes::loyalty::get_loyalty).layer(authed()))
        .nest("/events", event_routes)
        .nest("/chat", chat_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    // Credentials are needed for the session cookie
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
