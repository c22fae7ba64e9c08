//! PromQL expression to JSON AST translation
//!
//! This crate turns PromQL text into a JSON-friendly tree that mirrors the
//! abstract syntax tree produced by the promql-parser crate.
//!
//! ```text
//! PromQL String → Parser → AST (Expr) → Translator → AstValue → JSON
//! ```
//!
//! # Modules
//!
//! - [`parser`] - PromQL parsing using the promql-parser crate
//! - [`translator`] - AST to [`AstValue`] translation
//! - [`value`] - the JSON-shaped output type
//! - [`error`] - Error types for parsing and translation
//!
//! # Example
//!
//! ```
//! let value = ast::parse_and_translate("sum(rate(http_requests_total[5m]))").unwrap();
//! assert_eq!(value.node_type(), Some("aggregation"));
//! ```

pub mod error;
pub mod parser;
pub mod translator;
pub mod value;

pub use error::AstError;
pub use translator::{translate, translate_expr};
pub use value::AstValue;

/// Parse PromQL text and translate the resulting tree in one step
///
/// Use [`AstError::is_user_error`] to tell bad input apart from translator defects.
pub fn parse_and_translate(query: &str) -> Result<AstValue, AstError> {
    let expr = parser::parse(query)?;
    log::debug!(
        "Parsed expression selecting metrics {:?}",
        parser::extract_metric_names(&expr)
    );
    translate_expr(&expr)
}
