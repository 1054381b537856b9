//! The single upstream target that allowed requests are forwarded to

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, HOST};
use hyper::{Request, Response, Uri};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Result};
use crate::filter::RequestBody;

/// Hop-by-hop headers that must not be forwarded (RFC 7230 §6.1).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Where allowed requests go
#[derive(Debug, Clone)]
pub struct Upstream {
    host: String,
    port: u16,
    /// `host` or `host:port` when the port is not the scheme default
    authority: String,
    base_path: String,
    base_query: Option<String>,
    /// Present for https targets
    tls: Option<Arc<ClientConfig>>,
}

impl Upstream {
    /// Parse a target URL such as `https://httpbin.org/` or
    /// `http://127.0.0.1:9000/prefix`
    pub fn new(target: &str) -> Result<Self> {
        let uri: Uri = target
            .parse()
            .map_err(|e| Error::invalid_url(format!("{}: {}", target, e)))?;

        let (tls, default_port) = match uri.scheme_str() {
            Some("http") => (None, 80),
            Some("https") => (Some(default_tls_config()), 443),
            _ => {
                return Err(Error::invalid_url(format!(
                    "{}: scheme must be http or https",
                    target
                )))
            }
        };

        let host = uri
            .host()
            .ok_or_else(|| Error::invalid_url(format!("{}: missing host", target)))?
            .to_string();
        let port = uri.port_u16().unwrap_or(default_port);
        let authority = if port == default_port {
            host.clone()
        } else {
            format!("{}:{}", host, port)
        };

        Ok(Self {
            host,
            port,
            authority,
            base_path: uri.path().to_string(),
            base_query: uri.query().map(str::to_string),
            tls,
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Map a client path-and-query onto the target
    pub fn target_path(&self, uri: &Uri) -> String {
        let path = join_paths(&self.base_path, uri.path());
        match (self.base_query.as_deref(), uri.query()) {
            (Some(base), Some(query)) => format!("{}?{}&{}", path, base, query),
            (Some(q), None) | (None, Some(q)) => format!("{}?{}", path, q),
            (None, None) => path,
        }
    }

    /// Forward a request and return the upstream response.
    /// Opens a fresh connection for every request.
    pub async fn forward(
        &self,
        req: Request<RequestBody>,
        client_ip: Option<IpAddr>,
    ) -> Result<Response<BoxBody<Bytes, hyper::Error>>> {
        let upstream_req = self.rewrite(req, client_ip)?;

        let tcp = TcpStream::connect((self.host.clone(), self.port))
            .await
            .map_err(|e| {
                Error::proxy(format!(
                    "Failed to connect to {}:{}: {}",
                    self.host, self.port, e
                ))
            })?;

        let resp = match &self.tls {
            Some(config) => {
                let server_name = rustls::pki_types::ServerName::try_from(self.host.clone())
                    .map_err(|e| {
                        Error::tls(format!("Invalid server name '{}': {}", self.host, e))
                    })?;
                let tls = TlsConnector::from(config.clone())
                    .connect(server_name, tcp)
                    .await
                    .map_err(|e| {
                        Error::tls(format!("TLS connection to {} failed: {}", self.host, e))
                    })?;
                send_request(tls, upstream_req).await?
            }
            None => send_request(tcp, upstream_req).await?,
        };

        Ok(resp.map(|b| b.boxed()))
    }

    /// Rebuild the request for the target: relative URI, hop-by-hop headers
    /// stripped, Host set to the target, client appended to X-Forwarded-For.
    fn rewrite(
        &self,
        req: Request<RequestBody>,
        client_ip: Option<IpAddr>,
    ) -> Result<Request<RequestBody>> {
        let (parts, body) = req.into_parts();

        let path = self.target_path(&parts.uri);
        let uri: Uri = path
            .parse()
            .map_err(|e| Error::invalid_url(format!("{}: {}", path, e)))?;

        let mut builder = Request::builder().method(parts.method).uri(uri);

        let mut forwarded_for: Option<String> = None;
        for (name, value) in &parts.headers {
            let name_str = name.as_str();
            if HOP_BY_HOP_HEADERS.contains(&name_str) || *name == HOST {
                continue;
            }
            if name_str == X_FORWARDED_FOR {
                let value = String::from_utf8_lossy(value.as_bytes());
                forwarded_for = Some(match forwarded_for {
                    Some(prior) => format!("{}, {}", prior, value),
                    None => value.into_owned(),
                });
                continue;
            }
            builder = builder.header(name, value);
        }

        if let Some(ip) = client_ip {
            forwarded_for = Some(match forwarded_for {
                Some(prior) => format!("{}, {}", prior, ip),
                None => ip.to_string(),
            });
        }
        if let Some(chain) = forwarded_for {
            let value = HeaderValue::from_str(&chain)
                .map_err(|e| Error::proxy(format!("Invalid X-Forwarded-For: {}", e)))?;
            builder = builder.header(X_FORWARDED_FOR, value);
        }

        builder = builder.header(HOST, self.authority.as_str());

        builder
            .body(body)
            .map_err(|e| Error::proxy(format!("Failed to build upstream request: {}", e)))
    }
}

async fn send_request<S>(
    stream: S,
    req: Request<RequestBody>,
) -> Result<Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            let err_str = e.to_string();
            if !err_str.contains("connection closed") && !err_str.contains("early eof") {
                tracing::error!(error = %e, "Upstream connection error");
            }
        }
    });

    Ok(sender.send_request(req).await?)
}

fn default_tls_config() -> Arc<ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let mut config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Arc::new(config)
}

/// Join two paths with exactly one slash between them
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}
