use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::config::ConfigError;

/// Errors raised while setting up or performing an upstream proxy request
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid upstream: {0}")]
    InvalidUpstream(#[from] ConfigError),
    #[error("failed to build upstream HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),
    #[error("failed to build proxied response: {0}")]
    Response(#[from] axum::http::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidUpstream(_) | Self::Client(_) | Self::Response(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}
