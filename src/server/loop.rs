// Server loop module
// Accepts connections until shutdown is requested

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// How long in-flight connections get to finish after shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Accept connections until `state.shutdown` is notified, then wait up to
/// [`SHUTDOWN_GRACE`] for open connections to drain.
pub async fn start_server_loop(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    let shutdown = Arc::clone(&state.shutdown);
    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            () = shutdown.notified() => {
                break;
            }
        }
    }

    drop(listener);
    logger::log_shutdown(state.active_connections.load(Ordering::SeqCst));
    drain_connections(&state).await;
    Ok(())
}

async fn drain_connections(state: &AppState) {
    let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
    while state.active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutting down with {} connection(s) still open",
                state.active_connections.load(Ordering::SeqCst)
            ));
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::routing::Router;
    use crate::server::create_listener;
    use crate::telegram::{ApiClient, BotError};
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn serve_state(config: &str, router: Router) -> Arc<AppState> {
        let config = Config::from_toml_str(config).unwrap();
        let api = ApiClient::new("tok", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        Arc::new(AppState::with_api(config, router, Arc::new(api)))
    }

    fn slow_update_request(update_id: i64) -> Vec<u8> {
        let body = json!({
            "update_id": update_id,
            "message": {
                "message_id": update_id,
                "chat": {"id": 5},
                "text": "/slow",
                "entities": [{"type": "bot_command", "offset": 0, "length": 5}]
            }
        })
        .to_string();
        format!(
            "POST /webhook HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .into_bytes()
    }

    /// Read one response from a kept-alive connection, up to the end of `body`
    async fn read_response(stream: &mut TcpStream, body: &[u8]) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.ends_with(body) {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        String::from_utf8(buf).unwrap()
    }

    #[tokio::test]
    async fn test_serves_health_check_then_shuts_down() {
        let config = Config::from_toml_str("[telegram]\ntoken = \"tok\"\n[logging]\naccess_log = false").unwrap();
        let api = ApiClient::new("tok", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let state = Arc::new(AppState::with_api(config, Router::new(), Arc::new(api)));

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("ok"));

        state.shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_connection_serves_updates_past_read_timeout() {
        let completed = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        let counter = Arc::clone(&completed);
        router.command("/slow", move |_ctx, _message| {
            let counter = Arc::clone(&counter);
            async move {
                tokio::time::sleep(Duration::from_millis(800)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), BotError>(())
            }
        });
        let state = serve_state(
            "[telegram]\ntoken = \"tok\"\n[logging]\naccess_log = false\n[performance]\nread_timeout = 2\nwrite_timeout = 2",
            router,
        );

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&slow_update_request(1)).await.unwrap();
        let first = tokio::time::timeout(Duration::from_secs(5), read_response(&mut stream, b"{}"))
            .await
            .unwrap();
        assert!(first.starts_with("HTTP/1.1 200 OK"));

        // With both handlers the connection stays open well past read_timeout
        tokio::time::sleep(Duration::from_millis(1500)).await;

        stream.write_all(&slow_update_request(2)).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(5), read_response(&mut stream, b"{}"))
            .await
            .unwrap();
        assert!(second.starts_with("HTTP/1.1 200 OK"), "second response: {second:?}");
        assert_eq!(completed.load(Ordering::SeqCst), 2);

        drop(stream);
        state.shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_is_closed() {
        let state = serve_state(
            "[telegram]\ntoken = \"tok\"\n[logging]\naccess_log = false\n[performance]\nkeep_alive_timeout = 1",
            Router::new(),
        );

        let listener = create_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(start_server_loop(listener, Arc::clone(&state)));

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let response = tokio::time::timeout(Duration::from_secs(5), read_response(&mut stream, b"ok"))
            .await
            .unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read, 0);

        state.shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
