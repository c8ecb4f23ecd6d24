// Connection handling module
// Accepts and serves a single TCP connection

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::config::{AppState, PerformanceConfig};
use crate::logger;
use crate::webhook;

/// Accept a connection, enforcing the connection limit.
///
/// Returns `false` when the connection was rejected.
pub fn accept_connection(stream: TcpStream, peer_addr: SocketAddr, state: &Arc<AppState>) -> bool {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = state.active_connections.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            state.active_connections.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection rejected."
            ));
            drop(stream);
            return false;
        }
    }

    logger::log_connection_accepted(&peer_addr);
    handle_connection(stream, peer_addr, Arc::clone(state));
    true
}

/// Connection timeouts derived from `[performance]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timeouts {
    /// Limit for receiving request headers
    header_read: Duration,
    /// Limit between requests while nothing is in flight
    idle: Duration,
    /// Limit for flushing what is left once the connection is closing
    drain: Duration,
}

impl Timeouts {
    fn from_config(performance: &PerformanceConfig) -> Self {
        let read = Duration::from_secs(performance.read_timeout);
        let idle = if performance.keep_alive_timeout > 0 {
            Duration::from_secs(performance.keep_alive_timeout)
        } else {
            read
        };
        Self {
            header_read: read,
            idle,
            drain: Duration::from_secs(performance.write_timeout),
        }
    }
}

/// Request activity on one connection, shared with its service
#[derive(Debug)]
struct Activity {
    opened: Instant,
    in_flight: AtomicUsize,
    /// Milliseconds after `opened` at which the last request finished
    last_active_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            opened: Instant::now(),
            in_flight: AtomicUsize::new(0),
            last_active_ms: AtomicU64::new(0),
        }
    }

    fn begin(self: &Arc<Self>) -> InFlight {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(Arc::clone(self))
    }

    fn last_active(&self) -> Instant {
        self.opened + Duration::from_millis(self.last_active_ms.load(Ordering::SeqCst))
    }

    /// When the connection becomes idle for `limit` if nothing else happens
    fn idle_deadline(&self, limit: Duration) -> Instant {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            Instant::now() + limit
        } else {
            self.last_active() + limit
        }
    }

    fn is_idle(&self, limit: Duration) -> bool {
        self.in_flight.load(Ordering::SeqCst) == 0 && self.last_active().elapsed() >= limit
    }
}

/// Marks one request as in flight until dropped
struct InFlight(Arc<Activity>);

impl Drop for InFlight {
    fn drop(&mut self) {
        let elapsed = u64::try_from(self.0.opened.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.0.last_active_ms.store(elapsed, Ordering::SeqCst);
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Serve one connection in a spawned task.
///
/// HTTP/1.1 with keep-alive when configured. Timeouts apply per request and
/// between requests, never to a request whose handlers are still running:
/// an idle connection is shut down gracefully and given `write_timeout` to
/// flush. Decrements the connection counter when done.
fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, state: Arc<AppState>) {
    tokio::spawn(async move {
        let io = TokioIo::new(stream);
        let timeouts = Timeouts::from_config(&state.config.performance);
        let activity = Arc::new(Activity::new());

        let mut builder = http1::Builder::new();
        builder
            .timer(TokioTimer::new())
            .header_read_timeout(timeouts.header_read)
            .keep_alive(state.config.performance.keep_alive_timeout > 0);

        let service_state = Arc::clone(&state);
        let service_activity = Arc::clone(&activity);
        let conn = builder.serve_connection(
            io,
            service_fn(move |req| {
                let in_flight = service_activity.begin();
                let state = Arc::clone(&service_state);
                async move {
                    let response = webhook::handle_request(req, peer_addr, state).await;
                    drop(in_flight);
                    response
                }
            }),
        );
        tokio::pin!(conn);

        let finished = loop {
            tokio::select! {
                result = conn.as_mut() => break Some(result),
                () = tokio::time::sleep_until(activity.idle_deadline(timeouts.idle)) => {
                    if activity.is_idle(timeouts.idle) {
                        conn.as_mut().graceful_shutdown();
                        break None;
                    }
                }
            }
        };

        let result = match finished {
            Some(result) => result,
            None => match tokio::time::timeout(timeouts.drain, conn.as_mut()).await {
                Ok(result) => result,
                Err(_) => {
                    logger::log_warning(&format!(
                        "Connection from {peer_addr} did not close within {} seconds",
                        timeouts.drain.as_secs()
                    ));
                    Ok(())
                }
            },
        };
        if let Err(err) = result {
            logger::log_connection_error(&err);
        }

        state.active_connections.fetch_sub(1, Ordering::SeqCst);
    });
}
