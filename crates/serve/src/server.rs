//! Server module for the Sitepulse serve crate

use crate::dashboard::{dashboard_routes, DashboardController, DashboardState};
use crate::ServerConfig;
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    routing::get,
    Router,
};
use sitepulse_core::{
    AnalyticsAggregator, AuthClient, EventStore, Readiness, ReadinessSignal, Result,
    SitepulseError,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Sitepulse dashboard HTTP server
pub struct DashboardServer {
    config: ServerConfig,
    app: Router,
    readiness: ReadinessSignal,
}

impl DashboardServer {
    /// Create a new server instance over an event store
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn EventStore>,
        auth: Option<Arc<AuthClient>>,
    ) -> Self {
        let (signal, readiness) = sitepulse_core::readiness();
        let app = create_app(&config, store, auth, readiness);
        Self {
            config,
            app,
            readiness: signal,
        }
    }

    /// Start the server.
    ///
    /// The store is marked ready once the listener is bound; tracking
    /// requests accepted before that point are dropped, not queued.
    pub async fn start(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| SitepulseError::validation(format!("Invalid address {}: {}", addr, e)))?;

        tracing::info!("Starting Sitepulse dashboard server on {}", addr);

        let listener = tokio::net::TcpListener::bind(socket_addr)
            .await
            .map_err(|e| SitepulseError::network(format!("Failed to bind to {}: {}", addr, e)))?;

        self.readiness.set_ready();

        axum::serve(listener, self.app)
            .await
            .map_err(|e| SitepulseError::network(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Create the Axum application with middleware
fn create_app(
    config: &ServerConfig,
    store: Arc<dyn EventStore>,
    auth: Option<Arc<AuthClient>>,
    readiness: Readiness,
) -> Router {
    let controller = Arc::new(DashboardController::new(
        AnalyticsAggregator::with_defaults(store.clone()),
        config.default_range_days,
    ));
    controller.spawn_active_refresh(std::time::Duration::from_secs(config.active_refresh_secs));

    let state = DashboardState {
        store,
        readiness,
        controller,
        auth,
        sign_in_path: config.sign_in_path.clone(),
    };

    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api/analytics", dashboard_routes(state));

    // Add middleware layers
    app = app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(RequestBodyLimitLayer::new(config.max_request_size)),
    );

    // Add CORS if enabled
    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().unwrap())
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE]);

        app = app.layer(cors);
    }

    app
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Server builder for configuration
pub struct ServerBuilder {
    config: ServerConfig,
    auth: Option<Arc<AuthClient>>,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            auth: None,
        }
    }

    /// Set the host address
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the default report range
    pub fn default_range_days(mut self, days: i64) -> Self {
        self.config.default_range_days = days;
        self
    }

    /// Set the sign-in redirect path
    pub fn sign_in_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.sign_in_path = path.into();
        self
    }

    /// Enable or disable CORS
    pub fn cors(mut self, enabled: bool) -> Self {
        self.config.cors_enabled = enabled;
        self
    }

    /// Set maximum request size
    pub fn max_request_size(mut self, size: usize) -> Self {
        self.config.max_request_size = size;
        self
    }

    /// Gate the reporting endpoints behind this auth client
    pub fn auth(mut self, auth: Arc<AuthClient>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Build the server
    pub fn build(self, store: Arc<dyn EventStore>) -> DashboardServer {
        DashboardServer::new(self.config, store, self.auth)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
