//! Reverse proxy server: accepts clients, filters, forwards to the target

mod handler;
mod response;
mod server;
mod upstream;

pub use handler::ProxyHandler;
pub use response::{error_response, forbidden_response};
pub use server::ProxyServer;
pub use upstream::Upstream;
