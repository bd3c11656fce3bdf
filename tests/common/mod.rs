//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hubgate::config::ProxyConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A mock upstream host bound to an ephemeral port.
pub struct MockUpstream {
    pub addr: SocketAddr,
    calls: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// How many requests the upstream has served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Start a programmable mock upstream. The responder maps a request path to
/// `(status, content_type, body)`.
pub async fn start_mock_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&str) -> (u16, String, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let respond = Arc::new(respond);

    let task_calls = calls.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let respond = respond.clone();
                    let calls = task_calls.clone();
                    tokio::spawn(async move {
                        let path = match read_request_path(&mut socket).await {
                            Some(p) => p,
                            None => return,
                        };
                        calls.fetch_add(1, Ordering::SeqCst);

                        let (status, content_type, body) = respond(&path);
                        let response_str = format!(
                            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            status_text(status),
                            content_type,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockUpstream { addr, calls }
}

/// Read the request head and return the path from the request line.
async fn read_request_path(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 512];
    loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// A config pointing every upstream surface at unroutable addresses, with
/// fast retry delays and the blacklist file kept out of the working
/// directory. Tests override the surfaces they exercise.
#[allow(dead_code)]
pub fn base_config(dir: &tempfile::TempDir) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.blacklist.path = dir
        .path()
        .join("blacklist.json")
        .to_string_lossy()
        .into_owned();
    config.observability.metrics_enabled = false;

    // Connection-refused addresses: nothing leaves the loopback interface.
    config.upstreams.site = "http://127.0.0.1:1".to_string();
    config.upstreams.api = "http://127.0.0.1:1".to_string();
    config.upstreams.raw = "http://127.0.0.1:1".to_string();
    config.upstreams.assets = "http://127.0.0.1:1".to_string();
    config.upstreams.releases = "http://127.0.0.1:1".to_string();
    config.upstreams.codeload = "http://127.0.0.1:1".to_string();

    for profile in [
        &mut config.profiles.default,
        &mut config.profiles.bulk,
        &mut config.profiles.r#static,
    ] {
        profile.base_delay_ms = 1;
        profile.max_delay_ms = 5;
    }
    config
}
