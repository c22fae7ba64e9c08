//! Error types for PromQL parsing and AST translation

/// Errors that can occur while turning expression text into an [`AstValue`](crate::AstValue)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AstError {
    /// The expression text is not valid PromQL
    #[error("{0}")]
    Parse(String),
    /// The parser produced a node kind the translator has no encoding for.
    ///
    /// This points at a version mismatch with the grammar library, never at bad input.
    #[error("unsupported node type: {0}")]
    UnsupportedNode(&'static str),
}

impl AstError {
    /// Whether this error was caused by the caller's input
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
