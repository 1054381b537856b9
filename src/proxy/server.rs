//! Main proxy server

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use super::handler::ProxyHandler;
use super::upstream::Upstream;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{FilterGate, RequestValidator, RuleSet};

/// The main proxy server
pub struct ProxyServer {
    config: Config,
    gate: Arc<FilterGate>,
    upstream: Arc<Upstream>,
    listener: Option<TcpListener>,
}

impl ProxyServer {
    /// Create a new proxy server from configuration.
    ///
    /// Compiles every rule up front; an invalid pattern fails here.
    pub fn new(config: Config) -> Result<Self> {
        let rules = Arc::new(RuleSet::new(&config.rules)?);
        let validator = RequestValidator::new().with_max_body_bytes(config.proxy.max_body_bytes);
        let gate = Arc::new(FilterGate::new(rules).with_validator(validator));
        let upstream = Arc::new(Upstream::new(&config.proxy.target_url)?);

        tracing::info!(
            rules = gate.rules().len(),
            target = %config.proxy.target_url,
            max_body_bytes = ?config.proxy.max_body_bytes,
            "Filter initialized"
        );

        Ok(Self {
            config,
            gate,
            upstream,
            listener: None,
        })
    }

    /// Run the proxy server with graceful shutdown
    pub async fn run_until_shutdown(
        mut self,
        shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        let local_addr = self.bind().await?;
        tracing::info!(address = %local_addr, "Proxy server listening");
        self.serve(shutdown).await
    }

    /// Bind the server to its configured address and return the local address.
    ///
    /// Useful when binding to port 0 to discover the assigned port.
    /// Call `serve()` afterwards to start accepting connections.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let bind_address = &self.config.proxy.bind_address;
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            Error::config(format!("Invalid bind address '{}': {}", bind_address, e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::proxy(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::proxy(format!("Failed to get local address: {}", e)))?;

        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Serve connections on the bound listener until `shutdown` fires
    pub async fn serve(mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::proxy("serve() called before bind()"))?;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    return Ok(());
                }
                result = listener.accept() => {
                    let (stream, client_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    tracing::debug!(client = %client_addr, "New connection");
                    self.spawn_connection(stream, client_addr);
                }
            }
        }
    }

    /// Spawn a task to handle a single connection.
    fn spawn_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        let gate = self.gate.clone();
        let upstream = self.upstream.clone();
        let log_allowed = self.config.logging.log_allowed_requests;
        let log_blocked = self.config.logging.log_blocked_requests;

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let handler = ProxyHandler::new(gate.clone(), upstream.clone())
                    .with_request_logging(log_allowed, log_blocked)
                    .with_client_ip(Some(client_addr.ip()));
                async move { handler.handle(req).await }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service)
                .await
            {
                if !e.to_string().contains("connection closed") {
                    tracing::debug!(client = %client_addr, error = %e, "Connection error");
                }
            }
        });
    }

    /// Get the bind address
    pub fn bind_address(&self) -> &str {
        &self.config.proxy.bind_address
    }

    /// Get the filter gate
    pub fn gate(&self) -> &Arc<FilterGate> {
        &self.gate
    }
}
