//! HTTP request handler for the proxy

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use hyper::{Request, Response};
use std::net::IpAddr;
use std::sync::Arc;

use super::response::{error_response, forbidden_response};
use super::upstream::Upstream;
use crate::filter::{FilterGate, RequestBody, Verdict};

/// Per-request handler: filter, then forward or reject
pub struct ProxyHandler {
    gate: Arc<FilterGate>,
    upstream: Arc<Upstream>,
    client_ip: Option<IpAddr>,
    log_allowed_requests: bool,
    log_blocked_requests: bool,
}

impl ProxyHandler {
    pub fn new(gate: Arc<FilterGate>, upstream: Arc<Upstream>) -> Self {
        Self {
            gate,
            upstream,
            client_ip: None,
            log_allowed_requests: true,
            log_blocked_requests: true,
        }
    }

    pub fn with_request_logging(mut self, log_allowed: bool, log_blocked: bool) -> Self {
        self.log_allowed_requests = log_allowed;
        self.log_blocked_requests = log_blocked;
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<IpAddr>) -> Self {
        self.client_ip = client_ip;
        self
    }

    /// Handle an incoming request
    pub async fn handle(
        self,
        req: Request<Incoming>,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>, hyper::Error> {
        let mut req: Request<RequestBody> = req.map(|body| body.map_err(Into::into).boxed());
        let method = req.method().to_string();
        let uri = req.uri().to_string();

        match self.gate.evaluate(&mut req).await {
            Verdict::Block(violation) => {
                if self.log_blocked_requests {
                    tracing::warn!(
                        method = %method,
                        uri = %uri,
                        reason = violation.kind(),
                        detail = %violation,
                        "BLOCKED"
                    );
                }
                return Ok(forbidden_response());
            }
            Verdict::Allow { rule } => {
                if self.log_allowed_requests {
                    tracing::info!(method = %method, uri = %uri, rule = rule, "ALLOWED");
                }
            }
        }

        match self.upstream.forward(req, self.client_ip).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                tracing::error!(
                    upstream = %self.upstream.authority(),
                    error = %e,
                    "Forwarding error"
                );
                Ok(error_response())
            }
        }
    }
}
