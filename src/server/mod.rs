//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler function.
//! Connections are persistent (keep-alive) unless the client asks otherwise,
//! and are closed after sitting idle for the read timeout.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::ErrorRecord;
use crate::http::{
    StatusCode,
    request::{Request, RequestError},
    response::Response,
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    read: Duration,
    write: Duration,
}

/// The citaty HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use citaty::server::Server;
/// use citaty::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server
///         .run_until_shutdown(
///             |_req: Request| async { Response::new(StatusCode::Ok).body("Hello!") },
///             async {
///                 let _ = tokio::signal::ctrl_c().await;
///             },
///         )
///         .await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    timeouts: Timeouts,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            timeouts: Timeouts {
                read: DEFAULT_READ_TIMEOUT,
                write: DEFAULT_WRITE_TIMEOUT,
            },
        })
    }

    /// How long a connection may wait for request bytes.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.read = timeout;
        self
    }

    /// How long writing one response may take.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.write = timeout;
        self
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the process is terminated.
    ///
    /// # Errors
    ///
    /// See [`Server::run_until_shutdown`].
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until_shutdown(handler, std::future::pending::<()>())
            .await
    }

    /// Accepts connections and dispatches requests to `handler` until
    /// `shutdown` resolves.
    ///
    /// On shutdown the listener stops accepting, idle connections are closed,
    /// and requests already being handled run to completion before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run_until_shutdown<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()> + Send,
    {
        let handler = Arc::new(handler);
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        info!(address = %self.local_addr, "citaty listening");

        tokio::pin!(shutdown);
        loop {
            let (stream, peer_addr) = tokio::select! {
                () = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
                // Reap finished connection tasks as we go.
                Some(_) = connections.join_next(), if !connections.is_empty() => continue,
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);
            let stop_rx = stop_rx.clone();
            let timeouts = self.timeouts;

            connections.spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler, timeouts, stop_rx).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }

        info!(open_connections = connections.len(), "shutting down");
        let _ = stop_tx.send(true);
        while connections.join_next().await.is_some() {}
        info!("server stopped");
        Ok(())
    }
}

fn protocol_error(status: StatusCode) -> Response {
    let record = ErrorRecord {
        code: status.as_u16(),
        message: status.canonical_reason().to_owned(),
    };
    Response::json(status, &record).keep_alive(false)
}

async fn write_response(
    stream: &mut TcpStream,
    response: Response,
    timeout: Duration,
) -> Result<(), std::io::Error> {
    let bytes = response.into_bytes();
    let write = async {
        stream.write_all(&bytes).await?;
        stream.flush().await
    };
    match tokio::time::timeout(timeout, write).await {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "response write timed out",
        )),
    }
}

/// Offset one past the last byte of the request whose head ends at
/// `body_offset`, or `None` when its `Content-Length` is unparseable or would
/// take the request past [`MAX_REQUEST_SIZE`].
fn request_end(request: &Request, body_offset: usize) -> Option<usize> {
    let declared = match request.headers().get("content-length") {
        None => 0,
        Some(raw) => raw.trim().parse::<usize>().ok()?,
    };
    body_offset
        .checked_add(declared)
        .filter(|&end| end <= MAX_REQUEST_SIZE)
}

/// Status for a request rejected by [`request_end`]: digits too large to
/// represent are an oversized body, anything else is malformed.
fn declared_length_status(request: &Request) -> StatusCode {
    match request.headers().get("content-length").map(str::trim) {
        Some(raw) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
            StatusCode::PayloadTooLarge
        }
        _ => StatusCode::BadRequest,
    }
}

/// Handles a single TCP connection over its lifetime.
///
/// HTTP/1.1 connections are persistent by default: we loop, reading one
/// request per iteration, until the peer closes the connection, signals
/// `Connection: close`, goes quiet for the read timeout, or the server stops.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
    timeouts: Timeouts,
    mut stop: watch::Receiver<bool>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered; only read when the
        // buffer holds neither a complete request nor a malformed one.
        let ready = match Request::parse(&buf) {
            Ok((req, offset)) => request_end(&req, offset).is_none_or(|end| buf.len() >= end),
            Err(RequestError::Incomplete) => false,
            Err(_) => true,
        };

        if !ready {
            if *stop.borrow() && buf.is_empty() {
                debug!(peer = %peer_addr, "closing idle connection for shutdown");
                break;
            }

            let read = tokio::select! {
                read = tokio::time::timeout(timeouts.read, stream.read_buf(&mut buf)) => read,
                _ = stop.changed(), if buf.is_empty() => {
                    debug!(peer = %peer_addr, "closing idle connection for shutdown");
                    break;
                }
            };

            let bytes_read = match read {
                Ok(result) => result?,
                Err(_) if buf.is_empty() => {
                    debug!(peer = %peer_addr, "idle connection timed out");
                    break;
                }
                Err(_) => {
                    warn!(peer = %peer_addr, "request read timed out, sending 408");
                    write_response(&mut stream, protocol_error(StatusCode::RequestTimeout), timeouts.write)
                        .await?;
                    break;
                }
            };

            if bytes_read == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
        }

        // Guard against excessively large requests.
        if buf.len() > MAX_REQUEST_SIZE {
            warn!(peer = %peer_addr, "request too large, sending 413");
            write_response(&mut stream, protocol_error(StatusCode::PayloadTooLarge), timeouts.write)
                .await?;
            break;
        }

        let (request, body_offset) = match Request::parse(&buf) {
            Ok(pair) => pair,
            Err(RequestError::Incomplete) => continue,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                write_response(&mut stream, protocol_error(StatusCode::BadRequest), timeouts.write)
                    .await?;
                break;
            }
        };

        let Some(total_needed) = request_end(&request, body_offset) else {
            let status = declared_length_status(&request);
            warn!(
                peer = %peer_addr,
                content_length = request.headers().get("content-length").unwrap_or_default(),
                "unacceptable Content-Length, sending {}",
                status.as_u16()
            );
            write_response(&mut stream, protocol_error(status), timeouts.write).await?;
            break;
        };

        // Wait for the full body to arrive if Content-Length is set.
        if buf.len() < total_needed {
            continue;
        }

        // Drop the consumed bytes and re-parse the exact request so the body
        // never includes a pipelined successor.
        let raw = buf.split_to(total_needed);
        let (request, _) = match Request::parse(&raw) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                write_response(&mut stream, protocol_error(StatusCode::BadRequest), timeouts.write)
                    .await?;
                break;
            }
        };

        let keep_alive = request.is_keep_alive() && !*stop.borrow();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let response = handler(request).await.keep_alive(keep_alive);
        write_response(&mut stream, response, timeouts.write).await?;

        if !keep_alive {
            debug!(peer = %peer_addr, "connection not kept alive, closing");
            break;
        }
    }

    Ok(())
}
