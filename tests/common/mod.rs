//! Test infrastructure for end-to-end proxy tests.

#![allow(dead_code)]

use rulegate::config::Rule;
use rulegate::{Config, ProxyServer};
use std::net::SocketAddr;

// ---------------------------------------------------------------------------
// TestProxy — wraps ProxyServer with bind + spawn
// ---------------------------------------------------------------------------

pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl TestProxy {
    /// Start a proxy in front of `target_url` with the given rules.
    pub async fn start(target_url: &str, rules: Vec<Rule>) -> Self {
        let mut config = Config::minimal("127.0.0.1:0".to_string(), target_url.to_string());
        config.rules = rules;
        Self::start_with_config(config).await
    }

    pub async fn start_with_config(mut config: Config) -> Self {
        config.logging.log_allowed_requests = false;
        config.logging.log_blocked_requests = false;

        let mut server = ProxyServer::new(config).unwrap();
        let addr = server.bind().await.unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let _ = server.serve(shutdown_rx).await;
        });

        Self { addr, shutdown_tx }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

// ---------------------------------------------------------------------------
// Rule helpers
// ---------------------------------------------------------------------------

/// Rule from the four patterns, header key and value given as a pair
pub fn rule(uri: &str, method: &str, body: &str, header: (&str, &str)) -> Rule {
    Rule::new(uri)
        .with_method(method)
        .with_body(body)
        .with_headers(header.0, header.1)
}

/// `^/api/.*` GET-only rule with an empty body and any headers
pub fn api_get_rule() -> Rule {
    rule("^/api/.*", "^GET$", "^$", (".*", ".*"))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
