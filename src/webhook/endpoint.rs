//! Webhook request dispatch module
//!
//! Entry point for HTTP request processing: path and method routing, secret
//! token and body size checks, update decoding and handler dispatch.

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppState;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::telegram::{Context, Update};

/// Header Telegram uses to echo the secret given to `setWebhook`
pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

pub const HEALTH_PATH: &str = "/healthz";

const WEBHOOK_METHODS: &str = "POST";
const HEALTH_METHODS: &str = "GET, HEAD";

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let started = Instant::now();
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.http_version = version_label(req.version()).to_string();
    entry.user_agent = req
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    let response = route_request(req, &state, &mut entry).await;

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    let path = req.uri().path();

    if path == HEALTH_PATH {
        return match *req.method() {
            Method::GET | Method::HEAD => http::build_health_response("ok"),
            _ => http::build_405_response(HEALTH_METHODS),
        };
    }

    if path != state.config.webhook.path {
        return http::build_404_response();
    }

    if req.method() != Method::POST {
        logger::log_warning(&format!("Method not allowed on webhook: {}", req.method()));
        return http::build_405_response(WEBHOOK_METHODS);
    }

    handle_update(req, state, entry).await
}

/// Read, decode and dispatch one update
async fn handle_update<B>(
    req: Request<B>,
    state: &Arc<AppState>,
    entry: &mut AccessLogEntry,
) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<Box<dyn Error + Send + Sync>>,
{
    // 1. Check secret token
    if let Some(resp) = check_secret_token(&req, state.config.webhook.secret_token.as_deref()) {
        return resp;
    }

    // 2. Check declared body size
    let max_body_size = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(&req, max_body_size) {
        return resp;
    }

    // 3. Collect body, enforcing the limit on what is actually sent
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let read_timeout = Duration::from_secs(state.config.performance.read_timeout);
    let collected =
        tokio::time::timeout(read_timeout, Limited::new(req.into_body(), limit).collect()).await;
    let body = match collected {
        Err(_) => {
            logger::log_warning(&format!(
                "Request body not received within {} seconds",
                read_timeout.as_secs()
            ));
            return http::build_408_response();
        }
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
            logger::log_error(&format!("Request body exceeds {max_body_size} bytes"));
            return http::build_413_response();
        }
        Ok(Err(e)) => {
            logger::log_warning(&format!("Failed to read request body: {e}"));
            return http::build_400_response();
        }
    };
    entry.body_bytes = body.len();

    // 4. Decode and dispatch
    let update = Update::from_slice(&body);
    if update.is_empty() {
        logger::log_warning("Webhook body is not a JSON object, dispatching empty update");
    }
    let update_id = update.update_id();
    entry.update_id = update_id;
    logger::log_update_received(update_id, update.kind());

    let ctx = Context::new(Arc::clone(&state.api), update);
    match state.router.dispatch(&ctx).await {
        Ok(dispatch) => logger::log_update_dispatched(update_id, &dispatch),
        // Telegram redelivers on non-2xx, so a failed handler is still acknowledged
        Err(e) => logger::log_handler_failed(update_id, &e),
    }

    http::build_ack_response(&state.config.http.server_name)
}

/// Reject the request when a secret token is configured and the header does not match
fn check_secret_token<B>(req: &Request<B>, expected: Option<&str>) -> Option<Response<Full<Bytes>>> {
    let expected = expected?;
    let provided = req
        .headers()
        .get(SECRET_TOKEN_HEADER)
        .map(hyper::header::HeaderValue::as_bytes);
    match provided {
        Some(value) if constant_time_eq(value, expected.as_bytes()) => None,
        _ => {
            logger::log_warning("Rejected webhook request with missing or wrong secret token");
            Some(http::build_401_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

const fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
}
