use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use std::{future::Future, io, net::SocketAddr, sync::Arc};

use crate::http::codec::ConnectionCodec;
use crate::http::{IntoResponse, Request, Response};
use futures_util::{SinkExt, StreamExt};
use http::header::USER_AGENT;
use http::{header::CONNECTION, HeaderValue, StatusCode};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::OwnedSemaphorePermit;
use tokio::{net::TcpStream, sync::Semaphore};
use tokio_util::codec::Decoder;

type Handler<A, F> = fn(Request, A) -> F;

/// Connection-per-request HTTP/1.x server: one request is read, dispatched
/// to `handler` and answered before the socket is closed. `timeout` bounds
/// reading plus handling; the reply gets its own `timeout` to be written.
pub struct Server<A, F> {
    state: A,
    handler: Handler<A, F>,
    semaphore: Arc<Semaphore>,
    permits: usize,
    timeout: Duration,
}

const PERMITS: usize = 1_000;
const TIMEOUT_DURATION: Duration = Duration::from_secs(15);

impl<S, F> Server<S, F>
where
    S: Clone + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    pub fn new(state: S, handler: Handler<S, F>) -> Self {
        Self {
            state,
            handler,
            semaphore: Arc::new(Semaphore::new(PERMITS)),
            permits: PERMITS,
            timeout: TIMEOUT_DURATION,
        }
    }

    pub fn with_max_connections(mut self, permits: usize) -> Self {
        let permits = permits.max(1);
        self.semaphore = Arc::new(Semaphore::new(permits));
        self.permits = permits;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn bind<A: ToSocketAddrs>(self, addr: A) -> io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    pub async fn serve(self, listener: TcpListener) -> io::Result<()> {
        let server = Arc::new(self);

        let addr = listener.local_addr()?;
        tracing::info!(target: "listener", ?addr, "server is running");

        let (tx, mut rx) = tokio::sync::mpsc::channel(10_000);
        let pending = Arc::new(AtomicUsize::new(0));
        tokio::spawn({
            let pending = Arc::clone(&pending);
            async move {
                loop {
                    let (socket, addr) = match listener.accept().await {
                        Ok(conn) => conn,
                        Err(err) => {
                            tracing::warn!(target: "listener", %err, "failed to accept connection");
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            continue;
                        }
                    };
                    pending.fetch_add(1, Ordering::Relaxed);
                    if tx.send((socket, addr)).await.is_err() {
                        break;
                    }
                }
            }
        });

        let mut now = Instant::now();
        let mut connections = 0usize;

        while let Some((socket, addr)) = rx.recv().await {
            let permit = server.acquire_permit().await;

            connections += 1;
            let pending = pending.fetch_sub(1, Ordering::Relaxed) - 1;
            if now.elapsed() > Duration::from_secs(1) {
                tracing::debug!(
                    target: "listener",
                    "{connections}/s with {} tasks running, pending connections: {pending}",
                    server.permits - server.semaphore.available_permits()
                );
                now = Instant::now();
                connections = 0;
            }

            let server = server.clone();
            tokio::spawn(server.handle_request(socket, addr, permit));
        }

        Ok(())
    }

    /// Reads one request and always answers it, unless the peer hung up
    /// first. Decode failures get a 400/413, and a request that is not read
    /// and handled within `timeout` gets a 408/504.
    #[tracing::instrument(skip(self, socket, permit))]
    async fn handle_request(
        self: Arc<Self>,
        socket: TcpStream,
        addr: SocketAddr,
        permit: OwnedSemaphorePermit,
    ) {
        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut codec = ConnectionCodec::default().framed(socket);

        let mut resp = match tokio::time::timeout_at(deadline, codec.next()).await {
            Ok(Some(Ok(req))) => {
                tracing::debug!(?req, "received request");
                self.dispatch(req, deadline).await
            }
            Ok(Some(Err(err))) => {
                tracing::warn!(%err, "failed to read request");
                err.into_response()
            }
            Ok(None) => {
                tracing::error!("connection ended before request");
                return;
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "timed out reading request");
                (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
            }
        };

        const CLOSE: HeaderValue = HeaderValue::from_static("close");
        resp.headers_mut().insert(CONNECTION, CLOSE);

        drop(permit);

        match tokio::time::timeout(self.timeout, codec.send(resp)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(%err, "failed to send response"),
            Err(_) => tracing::warn!(timeout = ?self.timeout, "timed out sending response"),
        }
    }

    async fn dispatch(&self, req: Request, deadline: tokio::time::Instant) -> Response {
        let user = req.headers().get(USER_AGENT).unwrap_or_else(|| {
            static UNKNOWN_AGENT: HeaderValue = HeaderValue::from_static("Unknown");
            &UNKNOWN_AGENT
        });

        let path = req.uri().to_string();
        tracing::info!(
            target: "requests",
            method = %req.method(),
            %path,
            ?user,
            r#""{} {path}" by {user:?}"#, req.method()
        );

        let now = Instant::now();
        let handled = (self.handler)(req, self.state.clone());
        match tokio::time::timeout_at(deadline, handled).await {
            Ok(resp) => {
                tracing::debug!(?resp, "handled in {:?}, sending response", now.elapsed());
                resp
            }
            Err(_) => {
                tracing::warn!(%path, timeout = ?self.timeout, "handler timed out");
                (StatusCode::GATEWAY_TIMEOUT, "Function timed out").into_response()
            }
        }
    }

    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        loop {
            if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
                break permit;
            }

            let mut factor = 1;
            loop {
                const BACKOFF: Duration = Duration::from_millis(50);
                tokio::time::sleep(factor * BACKOFF).await;
                factor *= 2;
                let available_permits = self.semaphore.available_permits();
                if available_permits >= (self.permits / 100).max(1) {
                    break;
                }
            }
        }
    }
}
