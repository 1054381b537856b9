//! Method, body and header checks against a selected rule

use bytes::{Bytes, BytesMut};
use http_body_util::BodyExt;
use hyper::header::{HeaderMap, HOST};
use hyper::Request;

use super::{full_body, CompiledRule, RequestBody, Violation};

/// Checks a request against the rule that governs it.
///
/// Checks run in a fixed order (method, body, headers) and stop at the
/// first failure.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    max_body_bytes: Option<usize>,
}

impl RequestValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of body bytes buffered per request
    pub fn with_max_body_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn max_body_bytes(&self) -> Option<usize> {
        self.max_body_bytes
    }

    /// Validate `req` against `rule`.
    ///
    /// If the body is read, it is put back as an in-memory copy so the
    /// request can still be forwarded.
    pub async fn validate(
        &self,
        req: &mut Request<RequestBody>,
        rule: &CompiledRule,
    ) -> Result<(), Violation> {
        check_method(req.method().as_str(), rule)?;
        tracing::debug!(rule = rule.index(), "method check passed");

        let body = buffer_body(req, self.max_body_bytes).await?;
        check_body(&body, rule)?;
        tracing::debug!(rule = rule.index(), bytes = body.len(), "body check passed");

        check_headers(req.headers(), rule)?;
        tracing::debug!(rule = rule.index(), "header check passed");

        Ok(())
    }
}

/// Read the whole body and replace it with a replayable copy.
///
/// Calling this again on an already buffered request returns the same bytes.
/// On failure the bytes read so far are put back; the unread remainder of
/// the stream is dropped.
pub async fn buffer_body(
    req: &mut Request<RequestBody>,
    limit: Option<usize>,
) -> Result<Bytes, Violation> {
    let mut body = std::mem::replace(req.body_mut(), full_body(Bytes::new()));
    let mut buf = BytesMut::new();

    let result = loop {
        let frame = match body.frame().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break Err(Violation::BodyRead(e)),
            None => break Ok(()),
        };
        let Ok(data) = frame.into_data() else {
            continue;
        };
        buf.extend_from_slice(&data);
        if let Some(limit) = limit {
            if buf.len() > limit {
                break Err(Violation::BodyTooLarge { limit });
            }
        }
    };

    let bytes = buf.freeze();
    *req.body_mut() = full_body(bytes.clone());
    result.map(|()| bytes)
}

fn check_method(method: &str, rule: &CompiledRule) -> Result<(), Violation> {
    if rule.matches_method(method) {
        return Ok(());
    }
    Err(Violation::Method {
        method: method.to_string(),
        expected: rule.source().method.clone(),
    })
}

fn check_body(body: &[u8], rule: &CompiledRule) -> Result<(), Violation> {
    let text = String::from_utf8_lossy(body);
    if rule.matches_body(&text) {
        return Ok(());
    }
    Err(Violation::Body {
        body: text.into_owned(),
        expected: rule.source().body.clone(),
    })
}

/// Header names are checked in canonical form (`Content-Type`). `Host` is
/// skipped. Repeated headers are joined with `,` before the value is checked.
fn check_headers(headers: &HeaderMap, rule: &CompiledRule) -> Result<(), Violation> {
    for name in headers.keys() {
        if *name == HOST {
            continue;
        }

        let canonical = canonical_header_name(name.as_str());
        if !rule.matches_header_key(&canonical) {
            return Err(Violation::HeaderName {
                name: canonical,
                expected: rule.source().headers.key.clone(),
            });
        }

        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
            .collect::<Vec<_>>()
            .join(",");

        if !rule.matches_header_value(&value) {
            return Err(Violation::HeaderValue {
                name: canonical,
                value,
                expected: rule.source().headers.value.clone(),
            });
        }
    }
    Ok(())
}

/// Upper-case the first letter and every letter following a `-`
fn canonical_header_name(name: &str) -> String {
    let mut upper = true;
    name.chars()
        .map(|c| {
            let c = if upper { c.to_ascii_uppercase() } else { c };
            upper = c == '-';
            c
        })
        .collect()
}
