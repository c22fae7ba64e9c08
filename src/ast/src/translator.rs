//! PromQL AST to JSON-shaped value translation
//!
//! Walks a parsed [`Expr`] tree and produces an [`AstValue`] that mirrors it node
//! for node. Every node becomes an object whose first key is `type`:
//!
//! | Node | `type` |
//! |---|---|
//! | aggregation (`sum by (job) (...)`) | `aggregation` |
//! | binary operation (`a / b`) | `binaryExpr` |
//! | function call (`rate(...)`) | `call` |
//! | range selector (`x[5m]`) | `matrixSelector` |
//! | subquery (`x[30m:1m]`) | `subquery` |
//! | number literal | `numberLiteral` |
//! | parenthesized expression | `parenExpr` |
//! | string literal | `stringLiteral` |
//! | unary minus | `unaryExpr` |
//! | instant selector (`x{job="api"}`) | `vectorSelector` |
//!
//! All durations are reported in milliseconds. Label lists that are absent in
//! the source are reported as empty lists, never `null`.
//!
//! A binary operation between two instant vectors always carries a `matching`
//! descriptor, defaulting to one-to-one (many-to-many for `and`, `or` and
//! `unless`). Any operation involving a scalar has `matching: null`.

use std::time::Duration;

use promql_parser::label::{MatchOp, Matcher, Matchers};
use promql_parser::parser::value::ValueType;
use promql_parser::parser::{
    AggregateExpr, BinaryExpr, Call, Expr, LabelModifier, MatrixSelector, Offset, SubqueryExpr,
    VectorMatchCardinality, VectorSelector,
};

use crate::error::AstError;
use crate::value::AstValue;

/// Translate an expression tree (or its absence) into an [`AstValue`]
///
/// `None` translates to [`AstValue::Null`]. The only failure is a node kind
/// that has no encoding, which indicates a grammar library mismatch.
pub fn translate(node: Option<&Expr>) -> Result<AstValue, AstError> {
    let Some(expr) = node else {
        return Ok(AstValue::Null);
    };

    let value = match expr {
        Expr::Aggregate(agg) => translate_aggregate(agg)?,
        Expr::Binary(bin) => translate_binary(bin)?,
        Expr::Call(call) => translate_call(call)?,
        Expr::MatrixSelector(ms) => translate_matrix_selector(ms),
        Expr::Subquery(sq) => translate_subquery(sq)?,
        Expr::NumberLiteral(num) => AstValue::Object(vec![
            ("type", "numberLiteral".into()),
            ("val", format_float(num.val).into()),
        ]),
        Expr::Paren(paren) => AstValue::Object(vec![
            ("type", "parenExpr".into()),
            ("expr", translate_expr(&paren.expr)?),
        ]),
        Expr::StringLiteral(s) => AstValue::Object(vec![
            ("type", "stringLiteral".into()),
            ("val", s.val.as_str().into()),
        ]),
        // the grammar only produces unary minus; unary plus is folded away
        Expr::Unary(unary) => AstValue::Object(vec![
            ("type", "unaryExpr".into()),
            ("op", "-".into()),
            ("expr", translate_expr(&unary.expr)?),
        ]),
        Expr::VectorSelector(vs) => translate_vector_selector(vs),
        Expr::Extension(_) => {
            log::error!("Encountered extension node while translating PromQL AST");
            return Err(AstError::UnsupportedNode("extension"));
        }
    };

    Ok(value)
}

/// Translate a node that is known to be present
pub fn translate_expr(expr: &Expr) -> Result<AstValue, AstError> {
    translate(Some(expr))
}

fn translate_aggregate(agg: &AggregateExpr) -> Result<AstValue, AstError> {
    let (grouping, without) = match &agg.modifier {
        Some(LabelModifier::Include(labels)) => (labels.labels.clone(), false),
        Some(LabelModifier::Exclude(labels)) => (labels.labels.clone(), true),
        None => (Vec::new(), false),
    };

    Ok(AstValue::Object(vec![
        ("type", "aggregation".into()),
        ("op", agg.op.to_string().into()),
        ("expr", translate_expr(&agg.expr)?),
        ("param", translate(agg.param.as_deref())?),
        ("grouping", grouping.into()),
        ("without", without.into()),
    ]))
}

fn translate_binary(bin: &BinaryExpr) -> Result<AstValue, AstError> {
    let matching = if is_vector(&bin.lhs) && is_vector(&bin.rhs) {
        let modifier = bin.modifier.as_ref();
        let (card, include) = match modifier.map(|m| &m.card) {
            Some(VectorMatchCardinality::OneToOne) => ("one-to-one", Vec::new()),
            Some(VectorMatchCardinality::ManyToOne(labels)) => {
                ("many-to-one", labels.labels.clone())
            }
            Some(VectorMatchCardinality::OneToMany(labels)) => {
                ("one-to-many", labels.labels.clone())
            }
            Some(VectorMatchCardinality::ManyToMany) => ("many-to-many", Vec::new()),
            None if is_set_operator(bin) => ("many-to-many", Vec::new()),
            None => ("one-to-one", Vec::new()),
        };
        let (labels, on) = match modifier.and_then(|m| m.matching.as_ref()) {
            Some(LabelModifier::Include(labels)) => (labels.labels.clone(), true),
            Some(LabelModifier::Exclude(labels)) => (labels.labels.clone(), false),
            None => (Vec::new(), false),
        };
        AstValue::Object(vec![
            ("card", card.into()),
            ("labels", labels.into()),
            ("on", on.into()),
            ("include", include.into()),
        ])
    } else {
        // vector matching only applies between two instant vectors
        AstValue::Null
    };

    Ok(AstValue::Object(vec![
        ("type", "binaryExpr".into()),
        ("op", bin.op.to_string().into()),
        ("lhs", translate_expr(&bin.lhs)?),
        ("rhs", translate_expr(&bin.rhs)?),
        ("matching", matching),
        ("bool", bin.return_bool().into()),
    ]))
}

fn is_vector(expr: &Expr) -> bool {
    expr.value_type() == ValueType::Vector
}

fn is_set_operator(bin: &BinaryExpr) -> bool {
    matches!(bin.op.to_string().as_str(), "and" | "or" | "unless")
}

fn translate_call(call: &Call) -> Result<AstValue, AstError> {
    let args = call
        .args
        .args
        .iter()
        .map(|arg| translate_expr(arg))
        .collect::<Result<Vec<_>, _>>()?;

    let arg_types: Vec<String> = call.func.arg_types.iter().map(|t| t.to_string()).collect();

    Ok(AstValue::Object(vec![
        ("type", "call".into()),
        (
            "func",
            AstValue::Object(vec![
                ("name", call.func.name.to_string().into()),
                ("argTypes", arg_types.into()),
                ("variadic", call.func.variadic.into()),
                ("returnType", call.func.return_type.to_string().into()),
            ]),
        ),
        ("args", AstValue::List(args)),
    ]))
}

fn translate_matrix_selector(ms: &MatrixSelector) -> AstValue {
    let mut fields = vec![
        ("type", "matrixSelector".into()),
        ("name", selector_name(&ms.vs).into()),
        ("range", millis(&ms.range).into()),
        ("offset", offset_millis(ms.vs.offset.as_ref()).into()),
        ("matchers", translate_matchers(&ms.vs.matchers)),
    ];
    fields.extend(translate_or_matchers(&ms.vs.matchers));
    AstValue::Object(fields)
}

fn translate_subquery(sq: &SubqueryExpr) -> Result<AstValue, AstError> {
    Ok(AstValue::Object(vec![
        ("type", "subquery".into()),
        ("expr", translate_expr(&sq.expr)?),
        ("range", millis(&sq.range).into()),
        ("offset", offset_millis(sq.offset.as_ref()).into()),
        ("step", sq.step.as_ref().map_or(0, millis).into()),
    ]))
}

fn translate_vector_selector(vs: &VectorSelector) -> AstValue {
    let mut fields = vec![
        ("type", "vectorSelector".into()),
        ("name", selector_name(vs).into()),
        ("offset", offset_millis(vs.offset.as_ref()).into()),
        ("matchers", translate_matchers(&vs.matchers)),
    ];
    fields.extend(translate_or_matchers(&vs.matchers));
    AstValue::Object(fields)
}

fn translate_matchers(matchers: &Matchers) -> AstValue {
    AstValue::List(matchers.matchers.iter().map(translate_matcher).collect())
}

/// `{a="b" or c="d"}` alternatives, one matcher list per group.
///
/// Only present when the selector uses `or`.
fn translate_or_matchers(matchers: &Matchers) -> Option<(&'static str, AstValue)> {
    if matchers.or_matchers.is_empty() {
        return None;
    }
    let groups = matchers
        .or_matchers
        .iter()
        .map(|group| AstValue::List(group.iter().map(translate_matcher).collect()))
        .collect();
    Some(("or", AstValue::List(groups)))
}

fn translate_matcher(matcher: &Matcher) -> AstValue {
    AstValue::Object(vec![
        ("name", matcher.name.as_str().into()),
        ("value", matcher.value.as_str().into()),
        ("type", match_op_symbol(&matcher.op).into()),
    ])
}

fn match_op_symbol(op: &MatchOp) -> &'static str {
    match op {
        MatchOp::Equal => "=",
        MatchOp::NotEqual => "!=",
        MatchOp::Re(_) => "=~",
        MatchOp::NotRe(_) => "!~",
    }
}

fn selector_name(vs: &VectorSelector) -> &str {
    vs.name.as_deref().unwrap_or_default()
}

fn millis(d: &Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn offset_millis(offset: Option<&Offset>) -> i64 {
    match offset {
        Some(Offset::Pos(d)) => millis(d),
        Some(Offset::Neg(d)) => -millis(d),
        None => 0,
    }
}

/// Format a float as the shortest decimal string that parses back to the same value
///
/// Never uses exponent notation: `1e21` formats as `1000000000000000000000`.
pub fn format_float(val: f64) -> String {
    if val.is_nan() {
        "NaN".to_string()
    } else if val.is_infinite() {
        if val > 0.0 { "+Inf" } else { "-Inf" }.to_string()
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn translate_query(query: &str) -> AstValue {
        let expr = parse(query).unwrap();
        translate_expr(&expr).unwrap()
    }

    fn string_list(value: &AstValue) -> Vec<&str> {
        value
            .as_list()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_none_translates_to_null() {
        assert_eq!(translate(None).unwrap(), AstValue::Null);
    }

    #[test]
    fn test_type_tags() {
        let cases = [
            ("sum(up)", "aggregation"),
            ("up + 1", "binaryExpr"),
            ("time()", "call"),
            ("up[5m]", "matrixSelector"),
            ("up[30m:1m]", "subquery"),
            ("42", "numberLiteral"),
            ("(up)", "parenExpr"),
            (r#""hello""#, "stringLiteral"),
            ("-up", "unaryExpr"),
            ("up", "vectorSelector"),
        ];

        for (query, expected) in cases {
            let value = translate_query(query);
            assert_eq!(value.node_type(), Some(expected), "query: {query}");
        }
    }

    #[test]
    fn test_vector_selector() {
        let value = translate_query("up");
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "vectorSelector",
                "name": "up",
                "offset": 0,
                "matchers": [],
            })
        );
    }

    #[test]
    fn test_vector_selector_matchers_and_offset() {
        let value =
            translate_query(r#"http_requests_total{job="api", code!="200", path=~"/v1.*", env!~"dev|test"} offset 1h"#);
        assert_eq!(value.get("offset").and_then(AstValue::as_i64), Some(3_600_000));

        let matchers = value.get("matchers").and_then(AstValue::as_list).unwrap();
        let ops: Vec<(&str, &str, &str)> = matchers
            .iter()
            .map(|m| {
                (
                    m.get("name").and_then(AstValue::as_str).unwrap(),
                    m.get("type").and_then(AstValue::as_str).unwrap(),
                    m.get("value").and_then(AstValue::as_str).unwrap(),
                )
            })
            .collect();
        assert!(ops.contains(&("job", "=", "api")));
        assert!(ops.contains(&("code", "!=", "200")));
        assert!(ops.contains(&("path", "=~", "/v1.*")));
        assert!(ops.contains(&("env", "!~", "dev|test")));
    }

    #[test]
    fn test_negative_offset() {
        let value = translate_query("up offset -5m");
        assert_eq!(value.get("offset").and_then(AstValue::as_i64), Some(-300_000));
    }

    #[test]
    fn test_selector_without_metric_name() {
        let value = translate_query(r#"{job="api"}"#);
        assert_eq!(value.get("name").and_then(AstValue::as_str), Some(""));
    }

    #[test]
    fn test_aggregation_without_grouping() {
        let value = translate_query("sum(rate(http_requests_total[5m]))");
        assert_eq!(value.node_type(), Some("aggregation"));
        assert_eq!(value.get("op").and_then(AstValue::as_str), Some("sum"));
        assert!(value.get("param").unwrap().is_null());
        assert_eq!(value.get("grouping"), Some(&AstValue::List(vec![])));
        assert_eq!(value.get("without").and_then(AstValue::as_bool), Some(false));

        let call = value.get("expr").unwrap();
        assert_eq!(call.node_type(), Some("call"));
        let args = call.get("args").and_then(AstValue::as_list).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].node_type(), Some("matrixSelector"));
        assert_eq!(args[0].get("range").and_then(AstValue::as_i64), Some(300_000));
        assert_eq!(
            args[0].get("name").and_then(AstValue::as_str),
            Some("http_requests_total")
        );
    }

    #[test]
    fn test_aggregation_by_and_without() {
        let by = translate_query("sum by (job, instance) (up)");
        let mut grouping = string_list(by.get("grouping").unwrap());
        grouping.sort_unstable();
        assert_eq!(grouping, vec!["instance", "job"]);
        assert_eq!(by.get("without").and_then(AstValue::as_bool), Some(false));

        let without = translate_query("avg without (pod) (up)");
        assert_eq!(without.get("op").and_then(AstValue::as_str), Some("avg"));
        assert_eq!(string_list(without.get("grouping").unwrap()), vec!["pod"]);
        assert_eq!(without.get("without").and_then(AstValue::as_bool), Some(true));
    }

    #[test]
    fn test_aggregation_param() {
        let value = translate_query("topk(5, up)");
        assert_eq!(value.get("op").and_then(AstValue::as_str), Some("topk"));
        let param = value.get("param").unwrap();
        assert_eq!(param.node_type(), Some("numberLiteral"));
        assert_eq!(param.get("val").and_then(AstValue::as_str), Some("5"));
    }

    #[test]
    fn test_binary_matching() {
        let value = translate_query("a / on(job) group_left(team) b");
        assert_eq!(value.get("op").and_then(AstValue::as_str), Some("/"));
        assert_eq!(value.get("lhs").unwrap().get("name").and_then(AstValue::as_str), Some("a"));
        assert_eq!(value.get("rhs").unwrap().get("name").and_then(AstValue::as_str), Some("b"));

        let matching = value.get("matching").unwrap();
        assert_eq!(matching.get("card").and_then(AstValue::as_str), Some("many-to-one"));
        assert_eq!(string_list(matching.get("labels").unwrap()), vec!["job"]);
        assert_eq!(matching.get("on").and_then(AstValue::as_bool), Some(true));
        assert_eq!(string_list(matching.get("include").unwrap()), vec!["team"]);
        assert_eq!(value.get("bool").and_then(AstValue::as_bool), Some(false));
    }

    #[test]
    fn test_binary_ignoring_lists_never_null() {
        let value = translate_query("a - ignoring(instance) b");
        let matching = value.get("matching").unwrap();
        assert_eq!(matching.get("on").and_then(AstValue::as_bool), Some(false));
        assert_eq!(string_list(matching.get("labels").unwrap()), vec!["instance"]);
        assert_eq!(matching.get("include"), Some(&AstValue::List(vec![])));
    }

    #[test]
    fn test_binary_return_bool() {
        let value = translate_query("up == bool 1");
        assert_eq!(value.get("op").and_then(AstValue::as_str), Some("=="));
        assert_eq!(value.get("bool").and_then(AstValue::as_bool), Some(true));
    }

    #[test]
    fn test_binary_default_matching_between_vectors() {
        let value = translate_query("a + b");
        let matching = value.get("matching").unwrap();
        assert_eq!(matching.get("card").and_then(AstValue::as_str), Some("one-to-one"));
        assert_eq!(matching.get("labels"), Some(&AstValue::List(vec![])));
        assert_eq!(matching.get("on").and_then(AstValue::as_bool), Some(false));
        assert_eq!(matching.get("include"), Some(&AstValue::List(vec![])));

        let value = translate_query("a and b");
        let matching = value.get("matching").unwrap();
        assert_eq!(matching.get("card").and_then(AstValue::as_str), Some("many-to-many"));
    }

    #[test]
    fn test_binary_with_scalar_has_no_matching() {
        let value = translate_query("up == bool 1");
        assert!(value.get("matching").unwrap().is_null());
        assert_eq!(value.get("bool").and_then(AstValue::as_bool), Some(true));

        let value = translate_query("1 + 2");
        assert!(value.get("matching").unwrap().is_null());

        let value = translate_query("2 * rate(x[5m])");
        assert!(value.get("matching").unwrap().is_null());
    }

    #[test]
    fn test_or_matchers_are_kept() {
        let value = translate_query(r#"{a="b" or c=~"d.+"}"#);
        let groups = value.get("or").and_then(AstValue::as_list).unwrap();
        assert_eq!(groups.len(), 2);

        let first = &groups[0].as_list().unwrap()[0];
        assert_eq!(first.get("name").and_then(AstValue::as_str), Some("a"));
        assert_eq!(first.get("value").and_then(AstValue::as_str), Some("b"));
        assert_eq!(first.get("type").and_then(AstValue::as_str), Some("="));

        let second = &groups[1].as_list().unwrap()[0];
        assert_eq!(second.get("name").and_then(AstValue::as_str), Some("c"));
        assert_eq!(second.get("type").and_then(AstValue::as_str), Some("=~"));
    }

    #[test]
    fn test_plain_selector_has_no_or_key() {
        let value = translate_query(r#"up{job="api"}"#);
        assert!(value.get("or").is_none());
        let value = translate_query(r#"up{job="api"}[5m]"#);
        assert!(value.get("or").is_none());
    }

    #[test]
    fn test_call_function_descriptor() {
        let value = translate_query("rate(http_requests_total[5m])");
        let func = value.get("func").unwrap();
        assert_eq!(func.get("name").and_then(AstValue::as_str), Some("rate"));
        assert_eq!(string_list(func.get("argTypes").unwrap()), vec!["matrix"]);
        assert_eq!(func.get("returnType").and_then(AstValue::as_str), Some("vector"));
        assert!(!func.get("variadic").unwrap().is_null());
    }

    #[test]
    fn test_call_without_args() {
        let value = translate_query("time()");
        assert_eq!(value.get("args"), Some(&AstValue::List(vec![])));
    }

    #[test]
    fn test_subquery_durations() {
        let value = translate_query("rate(up[5m])[30m:1m] offset 10m");
        assert_eq!(value.get("range").and_then(AstValue::as_i64), Some(1_800_000));
        assert_eq!(value.get("step").and_then(AstValue::as_i64), Some(60_000));
        assert_eq!(value.get("offset").and_then(AstValue::as_i64), Some(600_000));
        assert_eq!(value.get("expr").unwrap().node_type(), Some("call"));
    }

    #[test]
    fn test_subquery_default_step() {
        let value = translate_query("up[30m:]");
        assert_eq!(value.get("step").and_then(AstValue::as_i64), Some(0));
        assert_eq!(value.get("offset").and_then(AstValue::as_i64), Some(0));
    }

    #[test]
    fn test_string_literal_verbatim() {
        let value = translate_query(r#"label_replace(up, "dst", "$1", "src", "(.*)")"#);
        let args = value.get("args").and_then(AstValue::as_list).unwrap();
        assert_eq!(args.len(), 5);
        assert_eq!(args[1].node_type(), Some("stringLiteral"));
        assert_eq!(args[1].get("val").and_then(AstValue::as_str), Some("dst"));
        assert_eq!(args[2].get("val").and_then(AstValue::as_str), Some("$1"));
        assert_eq!(args[4].get("val").and_then(AstValue::as_str), Some("(.*)"));
    }

    #[test]
    fn test_unary_and_paren() {
        let value = translate_query("-(up)");
        assert_eq!(value.get("op").and_then(AstValue::as_str), Some("-"));
        let inner = value.get("expr").unwrap();
        assert_eq!(inner.node_type(), Some("parenExpr"));
        assert_eq!(inner.get("expr").unwrap().node_type(), Some("vectorSelector"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(0.0), "0");
        assert_eq!(format_float(42.0), "42");
        assert_eq!(format_float(1e21), "1000000000000000000000");
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::INFINITY), "+Inf");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");

        for val in [0.1, 1.5, 3.141592653589793, 1e-7, 123456789.125, f64::MAX] {
            let formatted = format_float(val);
            assert_eq!(formatted.parse::<f64>().unwrap(), val, "value: {formatted}");
        }
    }

    #[test]
    fn test_number_literal_value() {
        let value = translate_query("1.5");
        assert_eq!(value.get("val").and_then(AstValue::as_str), Some("1.5"));
        let value = translate_query("0");
        assert_eq!(value.get("val").and_then(AstValue::as_str), Some("0"));
    }

    #[test]
    fn test_nested_shape_is_preserved() {
        let value = translate_query(
            "histogram_quantile(0.95, sum by (le) (rate(http_request_duration_seconds_bucket{job=\"api\"}[5m])))",
        );
        let args = value.get("args").and_then(AstValue::as_list).unwrap();
        assert_eq!(args[0].get("val").and_then(AstValue::as_str), Some("0.95"));
        let agg = &args[1];
        assert_eq!(string_list(agg.get("grouping").unwrap()), vec!["le"]);
        let rate = agg.get("expr").unwrap();
        let selector = &rate.get("args").and_then(AstValue::as_list).unwrap()[0];
        assert_eq!(selector.get("matchers").and_then(AstValue::as_list).map(<[_]>::len), Some(1));
    }
}
