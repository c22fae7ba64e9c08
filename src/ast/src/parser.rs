//! PromQL parser wrapper
//!
//! Thin layer over the promql-parser crate that maps its string errors into
//! [`AstError`] and offers a few helpers for inspecting the resulting tree.

use promql_parser::label::MatchOp;
use promql_parser::parser::{self, Expr, VectorSelector};

use crate::error::AstError;

/// Parse a PromQL query string into an AST expression
///
/// # Examples
/// ```
/// let expr = ast::parser::parse("rate(http_requests_total[5m])").unwrap();
/// assert!(matches!(expr, promql_parser::parser::Expr::Call(_)));
/// ```
pub fn parse(query: &str) -> Result<Expr, AstError> {
    parser::parse(query).map_err(AstError::Parse)
}

/// Extract the metric name from a vector selector
///
/// Falls back to an exact `__name__` matcher when the selector has no bare name.
pub fn get_metric_name(vs: &VectorSelector) -> Option<&str> {
    if let Some(name) = vs.name.as_deref() {
        return Some(name);
    }
    vs.matchers
        .matchers
        .iter()
        .find(|m| m.name == "__name__" && matches!(m.op, MatchOp::Equal))
        .map(|m| m.value.as_str())
}

/// Extract all metric names referenced in an expression, in source order
pub fn extract_metric_names(expr: &Expr) -> Vec<String> {
    let mut names = Vec::new();
    collect_metric_names_recursive(expr, &mut names);
    names
}

fn collect_metric_names_recursive(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::VectorSelector(vs) => {
            if let Some(name) = get_metric_name(vs) {
                names.push(name.to_string());
            }
        }
        Expr::MatrixSelector(ms) => {
            if let Some(name) = get_metric_name(&ms.vs) {
                names.push(name.to_string());
            }
        }
        Expr::Call(call) => {
            for arg in &call.args.args {
                collect_metric_names_recursive(arg, names);
            }
        }
        Expr::Aggregate(agg) => {
            if let Some(param) = &agg.param {
                collect_metric_names_recursive(param, names);
            }
            collect_metric_names_recursive(&agg.expr, names);
        }
        Expr::Binary(bin) => {
            collect_metric_names_recursive(&bin.lhs, names);
            collect_metric_names_recursive(&bin.rhs, names);
        }
        Expr::Paren(paren) => collect_metric_names_recursive(&paren.expr, names),
        Expr::Unary(unary) => collect_metric_names_recursive(&unary.expr, names),
        Expr::Subquery(sq) => collect_metric_names_recursive(&sq.expr, names),
        Expr::Extension(_) | Expr::NumberLiteral(_) | Expr::StringLiteral(_) => {}
    }
}
