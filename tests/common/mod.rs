//! Shared utilities for integration tests.
//!
//! Raw `TcpListener` mocks on ephemeral ports: a fixed-response backend,
//! a scripted CONNECT proxy, and an address nothing listens on.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read a request or response head, up to the blank line.
pub async fn read_head<S: AsyncRead + Unpin>(stream: &mut S) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => head.push(byte[0]),
        }
    }
    String::from_utf8(head).ok()
}

/// Value of a header in a raw head, case-insensitive name.
pub fn header(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim().to_string())
    })
}

/// Answer one HTTP/1.1 request on `stream` with `200 OK` and `body`.
pub async fn respond<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, body: &str) {
    if read_head(stream).await.is_none() {
        return;
    }
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Start a backend answering every request with `200 OK` and `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                respond(&mut socket, body).await;
            });
        }
    });

    addr
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    addr
}

/// An address with nothing listening on it.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// How the scripted proxy treats CONNECT requests.
#[derive(Debug, Clone)]
pub enum ProxyBehavior {
    /// Tunnel everything.
    Open,
    /// Tunnel only requests carrying exactly this `Proxy-Authorization`;
    /// answer others with `407`.
    RequireAuth(String),
    /// Answer every CONNECT with this status line, e.g. `403 Forbidden`.
    Refuse(&'static str),
}

/// What the scripted proxy saw: the `Proxy-Authorization` of each CONNECT.
#[derive(Debug, Clone, Default)]
pub struct ProxyLog {
    attempts: Arc<Mutex<Vec<Option<String>>>>,
}

impl ProxyLog {
    pub fn attempts(&self) -> Vec<Option<String>> {
        self.attempts.lock().unwrap().clone()
    }

    fn record(&self, auth: Option<String>) {
        self.attempts.lock().unwrap().push(auth);
    }
}

/// Start a CONNECT proxy following `behavior`.
pub async fn start_scripted_proxy(behavior: ProxyBehavior) -> (SocketAddr, ProxyLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log = ProxyLog::default();

    let server_log = log.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let log = server_log.clone();
            tokio::spawn(async move {
                handle_connect(socket, behavior, log).await;
            });
        }
    });

    (addr, log)
}

async fn handle_connect(mut client: TcpStream, behavior: ProxyBehavior, log: ProxyLog) {
    let Some(head) = read_head(&mut client).await else {
        return;
    };

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let mut parts = request_line.split_whitespace();
    if parts.next() != Some("CONNECT") {
        let _ = client.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n").await;
        return;
    }
    let target = parts.next().unwrap_or_default().to_string();

    let auth = header(&head, "Proxy-Authorization");
    log.record(auth.clone());

    match behavior {
        ProxyBehavior::Open => {}
        ProxyBehavior::RequireAuth(expected) => {
            if auth.as_deref() != Some(expected.as_str()) {
                let _ = client
                    .write_all(
                        b"HTTP/1.1 407 Proxy Authentication Required\r\n\
                          Proxy-Authenticate: Basic realm=\"test\"\r\n\
                          Content-Length: 0\r\n\r\n",
                    )
                    .await;
                return;
            }
        }
        ProxyBehavior::Refuse(status) => {
            let _ = client
                .write_all(format!("HTTP/1.1 {status}\r\nContent-Length: 0\r\n\r\n").as_bytes())
                .await;
            return;
        }
    }

    let Ok(mut upstream) = TcpStream::connect(target.as_str()).await else {
        let _ = client.write_all(b"HTTP/1.1 502 Bad Gateway\r\n\r\n").await;
        return;
    };

    if client
        .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
        .await
        .is_err()
    {
        return;
    }
    let _ = tokio::io::copy_bidirectional(&mut client, &mut upstream).await;
}
