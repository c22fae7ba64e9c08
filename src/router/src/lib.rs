use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
};
use common::config::UpstreamConfig;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use url::Url;

pub mod endpoints;
pub mod error;

pub use error::ProxyError;

pub trait RouterState: std::fmt::Debug + Clone + Send + Sync + 'static {
    /// Base URL that `/api/v1/*` requests are forwarded to
    fn upstream(&self) -> &Url;
    /// Shared HTTP client used for upstream requests
    fn http_client(&self) -> &reqwest::Client;
}

/// ProxyStateImpl holds the immutable state shared by all route handlers
#[derive(Clone)]
pub struct ProxyStateImpl {
    upstream: Arc<Url>,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for ProxyStateImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyStateImpl")
            .field("upstream", &self.upstream.as_str())
            .field("http_client", &"reqwest::Client")
            .finish()
    }
}

impl ProxyStateImpl {
    /// Create the router state from the upstream configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self, ProxyError> {
        let upstream = common::config::parse_upstream_url(&config.url)?;

        // Redirects are relayed to the caller, never followed
        let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(ProxyError::Client)?;

        Ok(Self {
            upstream: Arc::new(upstream),
            http_client,
        })
    }
}

impl RouterState for ProxyStateImpl {
    fn upstream(&self) -> &Url {
        &self.upstream
    }

    fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

/// Create a new router instance with all routes configured
pub fn create_router<S: RouterState>(state: S) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/parse",
            get(endpoints::parse::parse_expr)
                .post(endpoints::parse::parse_expr)
                .layer(endpoints::parse::cors_layer()),
        )
        // Everything under the API prefix goes to the upstream untouched
        .route("/api/v1", any(endpoints::proxy::redirect_to_api_root))
        .route("/api/v1/", any(endpoints::proxy::proxy::<S>))
        .route("/api/v1/{*path}", any(endpoints::proxy::proxy::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
