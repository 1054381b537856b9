//! Shared HTTP response helpers for blocked/error responses

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Response, StatusCode};

fn text_response(status: StatusCode, body: &'static str) -> Response<BoxBody<Bytes, hyper::Error>> {
    let mut resp = Response::new(
        Full::new(Bytes::from_static(body.as_bytes()))
            .map_err(|e| match e {})
            .boxed(),
    );
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain"),
    );
    resp
}

/// 403 for blocked requests. The reason is never sent to the client.
pub fn forbidden_response() -> Response<BoxBody<Bytes, hyper::Error>> {
    text_response(StatusCode::FORBIDDEN, "Forbidden")
}

/// 502 when the upstream could not be reached
pub fn error_response() -> Response<BoxBody<Bytes, hyper::Error>> {
    text_response(StatusCode::BAD_GATEWAY, "Bad Gateway")
}
