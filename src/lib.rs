//! rulegate - a reverse proxy that filters requests against allow rules
//!
//! Every request is matched against an ordered list of rules. The first rule
//! whose `uri` pattern matches the request's path governs it; the request
//! must then satisfy that rule's method, body and header patterns to be
//! forwarded to the upstream target. Anything else gets `403 Forbidden`.
//!
//! # Features
//!
//! - **Default-deny**: a request that matches no rule is blocked
//! - **First-match-wins**: rule order in the configuration is significant
//! - **Regex patterns**: compiled once at startup, never per request
//! - **Body inspection**: the body is buffered, checked, and replayed upstream
//!
//! # Example
//!
//! ```no_run
//! use rulegate::{Config, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("rules.yaml")?;
//!     let server = ProxyServer::new(config)?;
//!     let (_tx, rx) = tokio::sync::oneshot::channel();
//!     server.run_until_shutdown(rx).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;

#[cfg(test)]
pub mod test_support;

pub use config::{Config, HeaderRule, Rule};
pub use error::{Error, Result};
pub use filter::{FilterGate, RequestValidator, RuleSet, Verdict, Violation};
pub use proxy::ProxyServer;
