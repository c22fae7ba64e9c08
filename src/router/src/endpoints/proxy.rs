//! Reverse proxy for the upstream Prometheus HTTP API
//!
//! Requests are forwarded with their method, headers and body; the upstream's
//! status, headers and body are relayed back unchanged. Both bodies are streamed.
//! There are no retries. Dropping the client connection drops the in-flight
//! upstream request with it.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode, Uri,
        header::{
            CONNECTION, HOST, LOCATION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
            TRANSFER_ENCODING, UPGRADE,
        },
    },
    response::{IntoResponse, Response},
};
use url::Url;

use crate::{RouterState, error::ProxyError};

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Connection-scoped headers that must not be forwarded by a proxy
const HOP_BY_HOP: [HeaderName; 7] = [
    CONNECTION,
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

const HOP_BY_HOP_LEGACY: &[&str] = &["keep-alive", "proxy-connection"];

/// ANY /api/v1/*
#[tracing::instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub async fn proxy<S: RouterState>(State(state): State<S>, request: Request) -> Response {
    match forward(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            log::error!("Proxying to {} failed: {e}", state.upstream());
            e.into_response()
        }
    }
}

/// ANY /api/v1
///
/// Redirects to the subtree root, keeping the query string.
pub async fn redirect_to_api_root(uri: Uri) -> Response {
    let location = match uri.query() {
        Some(query) => format!("/api/v1/?{query}"),
        None => "/api/v1/".to_string(),
    };
    match HeaderValue::from_str(&location) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(LOCATION, location)]).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn forward<S: RouterState>(state: &S, request: Request) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();

    let target = upstream_target(state.upstream(), &parts.uri);
    let client_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let headers = forwarded_request_headers(&parts.headers, client_ip);

    log::debug!("Forwarding {} {} to {target}", parts.method, parts.uri);

    let mut upstream_request = state
        .http_client()
        .request(parts.method, target)
        .headers(headers);
    if body.size_hint().exact() != Some(0) {
        upstream_request =
            upstream_request.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let upstream_response = upstream_request.send().await.map_err(ProxyError::Upstream)?;

    let status = upstream_response.status();
    let headers = strip_hop_by_hop(upstream_response.headers());
    log::debug!("Upstream answered with {status}");

    let mut response = Response::builder()
        .status(status)
        .body(Body::from_stream(upstream_response.bytes_stream()))?;
    *response.headers_mut() = headers;

    Ok(response)
}

/// Build the upstream URL for a request
///
/// The request path is appended to the base path with exactly one slash
/// between them, and the base query (if any) is kept in front of the request
/// query.
pub fn upstream_target(base: &Url, uri: &Uri) -> Url {
    let mut target = base.clone();
    target.set_path(&join_paths(base.path(), uri.path()));

    let base_query = base.query().filter(|q| !q.is_empty());
    let request_query = uri.query().filter(|q| !q.is_empty());
    let query = match (base_query, request_query) {
        (Some(b), Some(r)) => Some(format!("{b}&{r}")),
        (Some(q), None) | (None, Some(q)) => Some(q.to_string()),
        (None, None) => None,
    };
    target.set_query(query.as_deref());
    target
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Copy request headers for the upstream, dropping `Host` and hop-by-hop headers
/// and recording the client address in `X-Forwarded-For`
pub fn forwarded_request_headers(headers: &HeaderMap, client_ip: Option<IpAddr>) -> HeaderMap {
    let mut forwarded = strip_hop_by_hop(headers);
    forwarded.remove(HOST);

    if let Some(ip) = client_ip {
        let prior: Vec<&str> = headers
            .get_all(X_FORWARDED_FOR)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let value = if prior.is_empty() {
            ip.to_string()
        } else {
            format!("{}, {ip}", prior.join(", "))
        };
        if let Ok(value) = HeaderValue::from_str(&value) {
            forwarded.insert(X_FORWARDED_FOR, value);
        }
    }

    forwarded
}

/// Remove hop-by-hop headers, including any named in the `Connection` header
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut stripped = headers.clone();

    for value in headers.get_all(CONNECTION) {
        if let Ok(value) = value.to_str() {
            for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                stripped.remove(name);
            }
        }
    }
    for name in &HOP_BY_HOP {
        stripped.remove(name);
    }
    for name in HOP_BY_HOP_LEGACY {
        stripped.remove(*name);
    }

    stripped
}
