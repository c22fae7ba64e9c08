use axum::{
    extract::RawQuery,
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, DATE, ORIGIN},
    },
    response::{IntoResponse, Response},
};
use ast::AstError;
use bytes::Bytes;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use url::form_urlencoded;

/// Name of the form value holding the PromQL expression
pub const EXPR_PARAM: &str = "expr";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Error envelope returned for expressions that fail to parse
#[derive(Debug, Serialize)]
pub struct ParseErrorResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: String,
}

impl ParseErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error",
            message: message.into(),
        }
    }
}

/// CORS policy for the parse endpoint: any origin may read the response
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN])
        .expose_headers([DATE])
}

/// GET|POST /parse?expr=<promql>
///
/// Parses the expression and returns its AST as JSON.
#[tracing::instrument(skip_all)]
pub async fn parse_expr(
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let expr = form_value(&method, query.as_deref(), &headers, &body, EXPR_PARAM)
        .unwrap_or_default();
    render_expr(&expr)
}

/// Look up a form value the way browsers submit forms
///
/// A url-encoded body of a POST, PUT or PATCH request takes precedence over the
/// query string.
pub fn form_value(
    method: &Method,
    query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
    key: &str,
) -> Option<String> {
    let has_form_body = matches!(*method, Method::POST | Method::PUT | Method::PATCH)
        && headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with(FORM_CONTENT_TYPE));

    if has_form_body && let Some(value) = lookup(body, key) {
        return Some(value);
    }

    query.and_then(|q| lookup(q.as_bytes(), key))
}

fn lookup(input: &[u8], key: &str) -> Option<String> {
    form_urlencoded::parse(input)
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Parse and translate an expression into the HTTP response sent to the caller
pub fn render_expr(text: &str) -> Response {
    let value = match ast::parse_and_translate(text) {
        Ok(value) => value,
        Err(e) => return render_error(text, &e),
    };

    match serde_json::to_vec(&value) {
        Ok(buf) => json_response(StatusCode::OK, buf),
        Err(e) => {
            log::error!("Failed to encode AST for {text:?}: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error marshaling AST: {e}"),
            )
                .into_response()
        }
    }
}

/// Map a translation error to the HTTP response sent to the caller
///
/// Input errors get the 400 JSON envelope; anything else is a server fault.
fn render_error(text: &str, err: &AstError) -> Response {
    if !err.is_user_error() {
        log::error!("Failed to translate AST for {text:?}: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error translating AST: {err}"),
        )
            .into_response();
    }

    log::debug!("Rejecting unparseable expression {text:?}: {err}");
    let payload = ParseErrorResponse::new(format!("Expression incomplete or buggy: {err}"));
    match serde_json::to_vec(&payload) {
        Ok(buf) => json_response(StatusCode::BAD_REQUEST, buf),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error marshaling error JSON: {e}"),
        )
            .into_response(),
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [(CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}
