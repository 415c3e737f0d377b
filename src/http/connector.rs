//! Proxy-aware connector for the hyper client.
//!
//! # Responsibilities
//! - Walk the selector's route chain until one route connects
//! - Open CONNECT tunnels through proxies, answering `407` once
//! - Wrap `https` targets in TLS
//! - Enforce the connect timeout and a per-read socket timeout
//!
//! # Data Flow
//! ```text
//! Uri
//!     → ProxySelector::select (route chain)
//!     → for each route: TCP connect (direct, or to the proxy)
//!         → CONNECT host:port  (proxy routes)
//!             → 407: authenticate(proxy, had_auth) → retry once on a new connection
//!     → TLS handshake (https targets)
//!     → ProxyStream
//! ```

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::Uri;
use hyper_util::client::legacy::connect::{Connected, Connection};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::Sleep;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::auth::{ProxyAuthenticator, ProxyCredentials};
use crate::routing::{ProxyEndpoint, ProxySelector, Route};

/// Largest CONNECT response head accepted from a proxy.
const MAX_RESPONSE_HEAD: usize = 8 * 1024;

/// Connection failures.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("invalid target uri '{0}'")]
    InvalidUri(Uri),

    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },

    #[error("connect to {addr} failed: {source}")]
    Io {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("proxy {proxy} requires authentication")]
    ProxyAuthentication { proxy: ProxyEndpoint },

    #[error("proxy {proxy} refused tunnel: {status}")]
    Tunnel { proxy: ProxyEndpoint, status: String },

    #[error("TLS handshake with {host} failed: {source}")]
    Tls {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no route to {0}")]
    NoRoute(Uri),
}

/// Connection settings shared by every clone of the connector.
struct Settings {
    selector: Option<Arc<ProxySelector>>,
    authenticator: Option<Arc<ProxyAuthenticator>>,
    tls: Option<TlsConnector>,
    connect_timeout: Option<Duration>,
    socket_timeout: Option<Duration>,
}

/// A `tower::Service<Uri>` usable as a hyper-util legacy client connector.
#[derive(Clone)]
pub struct ProxyConnector {
    settings: Arc<Settings>,
}

impl ProxyConnector {
    pub fn new(
        selector: Option<Arc<ProxySelector>>,
        authenticator: Option<Arc<ProxyAuthenticator>>,
        tls: Option<TlsConnector>,
        connect_timeout: Option<Duration>,
        socket_timeout: Option<Duration>,
    ) -> Self {
        Self {
            settings: Arc::new(Settings {
                selector,
                authenticator,
                tls,
                connect_timeout,
                socket_timeout,
            }),
        }
    }
}

impl std::fmt::Debug for ProxyConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConnector")
            .field("routing", &self.settings.selector.is_some())
            .field("authentication", &self.settings.authenticator.is_some())
            .field("connect_timeout", &self.settings.connect_timeout)
            .field("socket_timeout", &self.settings.socket_timeout)
            .finish()
    }
}

impl tower::Service<Uri> for ProxyConnector {
    type Response = ProxyStream;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<ProxyStream, ConnectError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let settings = self.settings.clone();
        Box::pin(async move { settings.connect(dst).await })
    }
}

impl Settings {
    async fn connect(&self, dst: Uri) -> Result<ProxyStream, ConnectError> {
        let host = match dst.host() {
            Some(host) if !host.is_empty() => host.trim_start_matches('[').trim_end_matches(']').to_string(),
            _ => return Err(ConnectError::InvalidUri(dst)),
        };
        let https = dst.scheme_str() == Some("https");
        let port = dst.port_u16().unwrap_or(if https { 443 } else { 80 });

        let routes = match &self.selector {
            Some(selector) => selector.select(&dst),
            None => vec![Route::Direct],
        };

        let mut last_error = None;
        for route in routes {
            match self.open(&route, &host, port).await {
                Ok(tcp) => {
                    tracing::debug!(uri = %dst, route = %route, "Connected");
                    let transport = if https {
                        self.handshake(tcp, &host).await?
                    } else {
                        Transport::Plain(tcp)
                    };
                    return Ok(ProxyStream::new(transport, route, self.socket_timeout));
                }
                Err(e) => {
                    tracing::warn!(uri = %dst, route = %route, error = %e, "Route failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ConnectError::NoRoute(dst)))
    }

    async fn open(&self, route: &Route, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        match route {
            Route::Direct => self.tcp_connect(host, port).await,
            Route::Proxy(proxy) => self.tunnel(proxy, host, port).await,
        }
    }

    async fn tcp_connect(&self, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        let addr = authority(host, port);
        let connect = TcpStream::connect((host, port));

        let stream = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| ConnectError::ConnectTimeout { addr: addr.clone() })?,
            None => connect.await,
        }
        .map_err(|source| ConnectError::Io {
            addr: addr.clone(),
            source,
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(addr = %addr, error = %e, "Failed to set TCP_NODELAY");
        }
        Ok(stream)
    }

    /// Open a CONNECT tunnel to `host:port` through `proxy`.
    ///
    /// A `407` is answered with the authenticator's credentials on a new
    /// connection. A second `407` is final.
    async fn tunnel(&self, proxy: &ProxyEndpoint, host: &str, port: u16) -> Result<TcpStream, ConnectError> {
        let target = authority(host, port);
        let mut credentials: Option<ProxyCredentials> = None;

        loop {
            let mut stream = self.tcp_connect(proxy.host(), proxy.port()).await?;
            let status = self
                .send_connect(&mut stream, &target, credentials.as_ref())
                .await
                .map_err(|source| ConnectError::Io {
                    addr: proxy.authority(),
                    source,
                })?;

            match status.code {
                200..=299 => return Ok(stream),
                407 => {
                    let had_auth = credentials.is_some();
                    let retry = self
                        .authenticator
                        .as_ref()
                        .and_then(|authenticator| authenticator.authenticate(proxy, had_auth));

                    match retry {
                        Some(next) => {
                            tracing::debug!(proxy = %proxy, user = %next.user(), "Proxy challenged, retrying with credentials");
                            credentials = Some(next);
                        }
                        None => {
                            return Err(ConnectError::ProxyAuthentication { proxy: proxy.clone() });
                        }
                    }
                }
                _ => {
                    return Err(ConnectError::Tunnel {
                        proxy: proxy.clone(),
                        status: status.line,
                    })
                }
            }
        }
    }

    async fn send_connect(
        &self,
        stream: &mut TcpStream,
        target: &str,
        credentials: Option<&ProxyCredentials>,
    ) -> io::Result<StatusLine> {
        let mut request = format!("CONNECT {target} HTTP/1.1\r\nHost: {target}\r\n").into_bytes();
        if let Some(credentials) = credentials {
            request.extend_from_slice(b"Proxy-Authorization: ");
            request.extend_from_slice(credentials.header_value().as_bytes());
            request.extend_from_slice(b"\r\n");
        }
        request.extend_from_slice(b"\r\n");
        stream.write_all(&request).await?;

        let head = match self.socket_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read_response_head(stream))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "proxy response timed out"))??,
            None => read_response_head(stream).await?,
        };

        parse_status_line(&head)
    }

    async fn handshake(&self, tcp: TcpStream, host: &str) -> Result<Transport, ConnectError> {
        let tls_error = |source| ConnectError::Tls {
            host: host.to_string(),
            source,
        };

        let Some(tls) = &self.tls else {
            return Err(tls_error(io::Error::new(io::ErrorKind::Unsupported, "no TLS configuration")));
        };

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| tls_error(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

        let handshake = tls.connect(server_name, tcp);
        let stream = match self.socket_timeout {
            Some(timeout) => tokio::time::timeout(timeout, handshake)
                .await
                .map_err(|_| tls_error(io::Error::new(io::ErrorKind::TimedOut, "handshake timed out")))?,
            None => handshake.await,
        }
        .map_err(tls_error)?;

        Ok(Transport::Tls(Box::new(stream)))
    }
}

fn authority(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Read up to and including the blank line ending a response head.
async fn read_response_head(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];

    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "proxy response head too large"));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "proxy closed connection"));
        }
        head.push(byte[0]);
    }

    Ok(head)
}

#[derive(Debug, PartialEq, Eq)]
struct StatusLine {
    code: u16,
    line: String,
}

fn parse_status_line(head: &[u8]) -> io::Result<StatusLine> {
    let invalid = || io::Error::new(io::ErrorKind::InvalidData, "malformed proxy response");

    let text = std::str::from_utf8(head).map_err(|_| invalid())?;
    let line = text.lines().next().ok_or_else(invalid)?.trim();

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(invalid)?;
    if !version.starts_with("HTTP/1.") {
        return Err(invalid());
    }
    let code = parts.next().and_then(|c| c.parse().ok()).ok_or_else(invalid)?;

    Ok(StatusLine {
        code,
        line: line.to_string(),
    })
}

/// The socket under a connection: plain TCP or TLS over TCP.
enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Applies the socket timeout to each read.
struct TimedTransport {
    inner: Transport,
    read_timeout: Option<Duration>,
    read_deadline: Option<Pin<Box<Sleep>>>,
}

impl AsyncRead for TimedTransport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.read_deadline = None;
                Poll::Ready(result)
            }
            Poll::Pending => {
                let Some(timeout) = this.read_timeout else {
                    return Poll::Pending;
                };
                let deadline = this
                    .read_deadline
                    .get_or_insert_with(|| Box::pin(tokio::time::sleep(timeout)));
                if deadline.as_mut().poll(cx).is_ready() {
                    this.read_deadline = None;
                    return Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, "socket read timed out")));
                }
                Poll::Pending
            }
        }
    }
}

impl AsyncWrite for TimedTransport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// A connection produced by [`ProxyConnector`].
pub struct ProxyStream {
    io: TokioIo<TimedTransport>,
    route: Route,
}

impl ProxyStream {
    fn new(inner: Transport, route: Route, read_timeout: Option<Duration>) -> Self {
        Self {
            io: TokioIo::new(TimedTransport {
                inner,
                read_timeout,
                read_deadline: None,
            }),
            route,
        }
    }

    /// The route this connection took.
    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn is_tls(&self) -> bool {
        matches!(self.io.inner().inner, Transport::Tls(_))
    }
}

impl std::fmt::Debug for ProxyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyStream")
            .field("route", &self.route)
            .field("is_tls", &self.is_tls())
            .finish_non_exhaustive()
    }
}

impl hyper::rt::Read for ProxyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_read(cx, buf)
    }
}

impl hyper::rt::Write for ProxyStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl Connection for ProxyStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}
