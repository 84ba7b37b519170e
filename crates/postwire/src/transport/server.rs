//! Server side of the HTTP POST stream.
//!
//! [`ServerConn::new`] returns two halves joined by a bounded channel:
//!
//! - [`Listener`]: the axum router. Each POST handler sends its body plus a
//!   one-shot reply slot into the channel, then waits on the slot.
//! - [`ServerConn`]: owned by the serving loop. `read_request` takes the next
//!   body, `Read` drains it, `write` fills the reply slot.
//!
//! The channel holds one queued exchange, so extra concurrent requests wait
//! in their handlers until the loop gets to them.

use crate::config::{RpcConfig, TransportConfig};
use crate::error::TransportError;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Buf;
use serde_json::json;
use std::future::Future;
use std::io::Read;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// One request body and the slot its reply goes into.
#[derive(Debug)]
struct Exchange {
    body: Bytes,
    reply: oneshot::Sender<Bytes>,
}

/// Serving-loop half of the server stream.
#[derive(Debug)]
pub struct ServerConn {
    inbound: mpsc::Receiver<Exchange>,
    /// Unread part of the current request body.
    request: Bytes,
    /// Reply slot of the current request, until it is answered.
    reply: Option<oneshot::Sender<Bytes>>,
}

/// HTTP half of the server stream.
#[derive(Debug)]
pub struct Listener {
    config: TransportConfig,
    inbound: mpsc::Sender<Exchange>,
}

/// A listener bound to its socket, ready to serve.
pub struct BoundListener {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl ServerConn {
    /// Create the connected serving-loop and listener halves.
    pub fn new(config: TransportConfig) -> Result<(ServerConn, Listener), TransportError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel(RpcConfig::INBOUND_CAPACITY);
        let conn = ServerConn {
            inbound: rx,
            request: Bytes::new(),
            reply: None,
        };
        let listener = Listener {
            config,
            inbound: tx,
        };
        Ok((conn, listener))
    }

    /// Wait for the next request and make its body readable.
    ///
    /// Returns the body length, or [`TransportError::Closed`] once every
    /// listener handle is gone.
    pub async fn read_request(&mut self) -> Result<usize, TransportError> {
        if self.reply.take().is_some() {
            warn!("Dropping a request that was read but never answered");
        }
        self.request.clear();

        let exchange = self.inbound.recv().await.ok_or(TransportError::Closed)?;
        self.request = exchange.body;
        self.reply = Some(exchange.reply);
        Ok(self.request.len())
    }

    /// Whether a request is waiting for its reply.
    pub fn has_pending_request(&self) -> bool {
        self.reply.is_some()
    }

    /// Answer the current request with `body`.
    pub fn write(&mut self, body: Bytes) -> Result<usize, TransportError> {
        let reply = self.reply.take().ok_or(TransportError::NoPendingRequest)?;
        if !self.request.is_empty() {
            debug!("Discarding {} unread request bytes", self.request.len());
            self.request.clear();
        }

        let len = body.len();
        if reply.send(body).is_err() {
            // The HTTP client hung up; the loop itself is fine.
            warn!("Requester went away before its reply was ready");
        }
        Ok(len)
    }
}

impl Read for ServerConn {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.request.len());
        self.request.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl Listener {
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Build the router serving the RPC route and the health check.
    pub fn router(&self) -> Result<Router, TransportError> {
        let router = Router::new()
            .route(RpcConfig::HEALTH_PATH, get(handle_health))
            .route(&self.config.path, post(handle_call))
            .with_state(self.inbound.clone());

        let router = match &self.config.allowed_origin {
            Some(origin) => router.layer(cors_layer(origin)?),
            None => router,
        };

        Ok(router.layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(self.config.max_body_bytes)),
        ))
    }

    /// Bind the configured address.
    pub async fn bind(self) -> Result<BoundListener, TransportError> {
        let router = self.router()?;
        let listener = TcpListener::bind(self.config.addr.as_str())
            .await
            .map_err(|source| TransportError::Bind {
                addr: self.config.addr.clone(),
                source,
            })?;
        let addr = listener.local_addr().map_err(TransportError::Serve)?;

        info!("RPC listener bound to {}{}", addr, self.config.path);

        Ok(BoundListener {
            listener,
            router,
            addr,
        })
    }
}

impl BoundListener {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the listener fails.
    pub async fn serve(self) -> Result<(), TransportError> {
        axum::serve(self.listener, self.router)
            .await
            .map_err(TransportError::Serve)
    }

    /// Serve until `signal` resolves or the listener fails.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), TransportError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(TransportError::Serve)
    }
}

fn cors_layer(origin: &str) -> Result<CorsLayer, TransportError> {
    let origin = HeaderValue::from_str(origin).map_err(|e| TransportError::InvalidConfig {
        message: format!("invalid allowed origin '{}': {}", origin, e),
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Liveness endpoint.
async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Hand the body to the serving loop and answer with its reply.
async fn handle_call(State(inbound): State<mpsc::Sender<Exchange>>, body: Bytes) -> Response {
    let (reply_tx, reply_rx) = oneshot::channel();
    let exchange = Exchange {
        body,
        reply: reply_tx,
    };

    if inbound.send(exchange).await.is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, "rpc loop is not running").into_response();
    }

    match reply_rx.await {
        Ok(reply) => ([(header::CONTENT_TYPE, RpcConfig::CONTENT_TYPE)], reply).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "request dropped without a reply",
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn rpc_request(body: &'static [u8]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/rpc")
            .header(header::CONTENT_TYPE, RpcConfig::CONTENT_TYPE)
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_reply_lockstep() {
        let (mut conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();

        let call = tokio::spawn(router.oneshot(rpc_request(b"ping")));

        assert_eq!(conn.read_request().await.unwrap(), 4);
        assert!(conn.has_pending_request());
        let mut buf = Vec::new();
        conn.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"ping");

        conn.write(Bytes::from_static(b"pong")).unwrap();
        assert!(!conn.has_pending_request());

        let response = call.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            RpcConfig::CONTENT_TYPE
        );
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"pong"));
    }

    #[tokio::test]
    async fn test_write_without_request_fails() {
        let (mut conn, _listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let result = conn.write(Bytes::from_static(b"orphan"));
        assert!(matches!(result, Err(TransportError::NoPendingRequest)));
    }

    #[tokio::test]
    async fn test_second_write_fails() {
        let (mut conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();
        let call = tokio::spawn(router.oneshot(rpc_request(b"a")));

        conn.read_request().await.unwrap();
        conn.write(Bytes::from_static(b"first")).unwrap();
        assert!(matches!(
            conn.write(Bytes::from_static(b"second")),
            Err(TransportError::NoPendingRequest)
        ));

        let response = call.await.unwrap().unwrap();
        assert_eq!(body_bytes(response).await, Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn test_unanswered_request_is_dropped_on_next_read() {
        let (mut conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();

        let first = tokio::spawn(router.clone().oneshot(rpc_request(b"one")));
        conn.read_request().await.unwrap();

        let second = tokio::spawn(router.oneshot(rpc_request(b"two")));
        conn.read_request().await.unwrap();
        conn.write(Bytes::from_static(b"reply-two")).unwrap();

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let second = second.await.unwrap().unwrap();
        assert_eq!(body_bytes(second).await, Bytes::from_static(b"reply-two"));
    }

    #[tokio::test]
    async fn test_stopped_loop_answers_unavailable() {
        let (conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();
        drop(conn);

        let response = router.oneshot(rpc_request(b"x")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_read_request_after_listener_gone_is_closed() {
        let (mut conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        drop(listener);
        assert!(matches!(
            conn.read_request().await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_health_route() {
        let (_conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();

        let request = Request::builder()
            .uri(RpcConfig::HEALTH_PATH)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_cors_preflight_answered_directly() {
        let config = TransportConfig::default().with_allowed_origin("http://app.local");
        let (_conn, listener) = ServerConn::new(config).unwrap();
        let router = listener.router().unwrap();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/rpc")
            .header(header::ORIGIN, "http://app.local")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert!(response.status().is_success());
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://app.local"
        );
        assert!(headers[header::ACCESS_CONTROL_ALLOW_METHODS]
            .to_str()
            .unwrap()
            .contains("POST"));
    }

    #[tokio::test]
    async fn test_cors_origin_added_to_calls() {
        let config = TransportConfig::default().with_allowed_origin("http://app.local");
        let (mut conn, listener) = ServerConn::new(config).unwrap();
        let router = listener.router().unwrap();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/rpc")
            .header(header::ORIGIN, "http://app.local")
            .body(Body::from("hi"))
            .unwrap();
        let call = tokio::spawn(router.oneshot(request));

        conn.read_request().await.unwrap();
        conn.write(Bytes::from_static(b"ok")).unwrap();

        let response = call.await.unwrap().unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://app.local"
        );
    }

    #[tokio::test]
    async fn test_no_cors_headers_without_origin_config() {
        let (_conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let router = listener.router().unwrap();

        let request = Request::builder()
            .uri(RpcConfig::HEALTH_PATH)
            .header(header::ORIGIN, "http://app.local")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let config = TransportConfig::default().with_allowed_origin("bad\norigin");
        let (_conn, listener) = ServerConn::new(config).unwrap();
        assert!(matches!(
            listener.router(),
            Err(TransportError::InvalidConfig { .. })
        ));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let config = TransportConfig::default().with_max_body_bytes(4);
        let (_conn, listener) = ServerConn::new(config).unwrap();
        let router = listener.router().unwrap();

        let response = router
            .oneshot(rpc_request(b"way too long"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_bind_error() {
        let (_conn, listener) = ServerConn::new(TransportConfig::default()).unwrap();
        let bound = listener.bind().await.unwrap();

        let taken = TransportConfig::new(bound.local_addr().to_string());
        let (_conn2, listener2) = ServerConn::new(taken).unwrap();
        assert!(matches!(
            listener2.bind().await,
            Err(TransportError::Bind { .. })
        ));
    }
}
