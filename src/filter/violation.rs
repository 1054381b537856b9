//! Reasons a request is blocked

use super::BoxError;

/// Why a request failed the filter.
///
/// The message is meant for operators. Clients only ever see `403 Forbidden`.
#[derive(Debug, thiserror::Error)]
pub enum Violation {
    #[error("no rule found for {uri}")]
    NoMatchingRule { uri: String },

    #[error("request method {method} violates defined method {expected}")]
    Method { method: String, expected: String },

    #[error("request body {body} violates defined body {expected}")]
    Body { body: String, expected: String },

    #[error("request body exceeds the {limit} byte limit")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    #[error("request header {name} violates defined header {expected}")]
    HeaderName { name: String, expected: String },

    #[error("request header {name}: {value} violates defined header value {expected}")]
    HeaderValue {
        name: String,
        value: String,
        expected: String,
    },
}

impl Violation {
    /// Stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Violation::NoMatchingRule { .. } => "no_matching_rule",
            Violation::Method { .. } => "method",
            Violation::Body { .. } => "body",
            Violation::BodyTooLarge { .. } => "body_too_large",
            Violation::BodyRead(_) => "body_read",
            Violation::HeaderName { .. } => "header_name",
            Violation::HeaderValue { .. } => "header_value",
        }
    }
}
