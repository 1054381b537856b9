//! Rule selection and validation combined into a single verdict

use hyper::Request;
use std::sync::Arc;

use super::validator::buffer_body;
use super::{RequestBody, RequestValidator, RuleSet, Violation};

/// Outcome of filtering one request
#[derive(Debug)]
pub enum Verdict {
    /// Forward the request. `rule` is the index of the governing rule.
    Allow { rule: usize },
    /// Reject the request with 403
    Block(Violation),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow { .. })
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            Verdict::Allow { .. } => None,
            Verdict::Block(v) => Some(v),
        }
    }
}

/// Decides whether a request may be forwarded.
///
/// Stateless between requests; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct FilterGate {
    rules: Arc<RuleSet>,
    validator: RequestValidator,
}

impl FilterGate {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self {
            rules,
            validator: RequestValidator::new(),
        }
    }

    pub fn with_validator(mut self, validator: RequestValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Evaluate a request.
    ///
    /// Whatever the verdict, the request body is left readable: either the
    /// original stream (never touched) or an in-memory copy of it.
    pub async fn evaluate(&self, req: &mut Request<RequestBody>) -> Verdict {
        let uri = request_uri(req);

        let Some(rule) = self.rules.select(&uri) else {
            tracing::error!(uri = %uri, "Request blocked. No rule found");
            self.drain(req).await;
            return Verdict::Block(Violation::NoMatchingRule { uri });
        };

        tracing::debug!(rule = rule.index(), pattern = %rule.source().uri, uri = %uri, "Rule selected");

        match self.validator.validate(req, rule).await {
            Ok(()) => {
                tracing::debug!(rule = rule.index(), uri = %uri, "Request allowed");
                Verdict::Allow { rule: rule.index() }
            }
            Err(violation) => {
                tracing::debug!(
                    rule = rule.index(),
                    uri = %uri,
                    reason = violation.kind(),
                    "Request blocked"
                );
                self.drain(req).await;
                Verdict::Block(violation)
            }
        }
    }

    /// Read whatever is left of the client body so the connection is not
    /// left with unread data. The bytes stay available on the request.
    async fn drain(&self, req: &mut Request<RequestBody>) {
        match buffer_body(req, self.validator.max_body_bytes()).await {
            Ok(_) => {}
            Err(Violation::BodyTooLarge { limit }) => {
                tracing::debug!(limit, "Request body over the cap left partially read");
            }
            Err(e) => tracing::error!(error = %e, "Error discarding request body"),
        }
    }
}

/// Path and query of the request, as the client sent it
fn request_uri<B>(req: &Request<B>) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}
