//! HTTP response building module
//!
//! Builders for the handful of responses the webhook endpoint returns.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Build 200 response acknowledging an update
pub fn build_ack_response(server_name: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Server", server_name)
        .body(Full::new(Bytes::from_static(b"{}")))
        .unwrap_or_else(|e| {
            log_build_error("200", &e);
            Response::new(Full::new(Bytes::from_static(b"{}")))
        })
}

/// Build health check response
pub fn build_health_response(status: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from_static(status.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            Response::new(Full::new(Bytes::from_static(status.as_bytes())))
        })
}

/// Build 401 Unauthorized response (secret token mismatch)
pub fn build_401_response() -> Response<Full<Bytes>> {
    build_plain_response(StatusCode::UNAUTHORIZED, "401 Unauthorized")
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_plain_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response listing the methods `allow`ed on the path
pub fn build_405_response(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response =
        build_plain_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    response
        .headers_mut()
        .insert("Allow", hyper::header::HeaderValue::from_static(allow));
    response
}

/// Build 408 Request Timeout response (body not received in time)
pub fn build_408_response() -> Response<Full<Bytes>> {
    build_plain_response(StatusCode::REQUEST_TIMEOUT, "408 Request Timeout")
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Full<Bytes>> {
    build_plain_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build 400 Bad Request response (unreadable body)
pub fn build_400_response() -> Response<Full<Bytes>> {
    build_plain_response(StatusCode::BAD_REQUEST, "400 Bad Request")
}

fn build_plain_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from_static(body.as_bytes())))
        })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
