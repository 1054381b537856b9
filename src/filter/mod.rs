//! Request filtering: rule selection, validation and verdicts

mod gate;
mod rules;
mod validator;
mod violation;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};

pub use gate::{FilterGate, Verdict};
pub use rules::{CompiledRule, RuleSet};
pub use validator::{buffer_body, RequestValidator};
pub use violation::Violation;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Request body as seen by the filter. Once validated it holds a replayable
/// in-memory copy of the bytes read from the client.
pub type RequestBody = BoxBody<Bytes, BoxError>;

/// Wrap already-read bytes as a request body
pub fn full_body(bytes: impl Into<Bytes>) -> RequestBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}
