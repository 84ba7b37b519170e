//! Serving side of the RPC layer.
//!
//! # Concurrency
//!
//! The listener accepts HTTP connections concurrently, but every request
//! funnels through the transport's bounded channel into a single serving
//! loop. Each call is decoded, executed and answered before the next one is
//! dequeued, so procedures never run in parallel.

use super::procedure::{Handler, Procedure, Signature};
use super::stage_message;
use crate::config::TransportConfig;
use crate::error::{Result, RpcError};
use crate::transport::{Listener, ServerConn};
use crate::wire::Decoder;
use axum::Router;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Procedure registry plus the serving-loop half of the transport.
struct Dispatcher {
    registry: HashMap<String, Procedure>,
    conn: ServerConn,
    staging: BytesMut,
}

/// RPC server.
///
/// Register procedures first, then either drive the loop yourself with
/// [`Server::serve`] or hand the server to [`Server::listen_and_serve`] or
/// [`Server::start`]. The latter two take the server by value, so the
/// registry cannot change once serving begins.
pub struct Server {
    dispatcher: Dispatcher,
    listener: Listener,
}

impl Server {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let (conn, listener) = ServerConn::new(config)?;
        Ok(Self {
            dispatcher: Dispatcher {
                registry: HashMap::new(),
                conn,
                staging: BytesMut::new(),
            },
            listener,
        })
    }

    pub fn config(&self) -> &TransportConfig {
        self.listener.config()
    }

    /// Register `handler` under `name`, replacing any earlier registration.
    pub fn register<H, P>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: Handler<P>,
        P: 'static,
    {
        let name = name.into();
        let procedure = Procedure::new(handler);
        debug!("Registering {} {}", name, procedure.signature());

        if self
            .dispatcher
            .registry
            .insert(name.clone(), procedure)
            .is_some()
        {
            warn!("Procedure {} was already registered; replacing it", name);
        }
        self
    }

    /// Registered procedures, sorted by name.
    pub fn procedures(&self) -> Vec<(&str, &Signature)> {
        let mut procedures: Vec<_> = self
            .dispatcher
            .registry
            .iter()
            .map(|(name, procedure)| (name.as_str(), procedure.signature()))
            .collect();
        procedures.sort_by(|a, b| a.0.cmp(b.0));
        procedures
    }

    /// Router feeding this server's loop, for mounting into another axum
    /// application. The loop still has to be driven with [`Server::serve`].
    pub fn router(&self) -> Result<Router> {
        Ok(self.listener.router()?)
    }

    /// Serve exactly one request.
    ///
    /// Once a request has been read it is always answered: when decoding or
    /// lookup fails, the reply carries the error text as the failure string
    /// and the error is also returned here.
    pub async fn serve(&mut self) -> Result<()> {
        self.dispatcher.serve().await
    }

    /// Bind the listener, run the serving loop in the background and serve
    /// HTTP in the foreground.
    ///
    /// Errors from individual calls are logged and the loop keeps going.
    /// Returns only when the listener fails, including failing to bind.
    pub async fn listen_and_serve(self) -> Result<()> {
        let Server {
            dispatcher,
            listener,
        } = self;
        let bound = listener.bind().await?;

        let loop_task = tokio::spawn(dispatcher.run());
        let result = bound.serve().await;
        loop_task.abort();

        if let Err(e) = &result {
            error!("RPC listener failed: {}", e);
        }
        Ok(result?)
    }

    /// Bind the listener and run both halves in the background.
    pub async fn start(self) -> Result<ServerHandle> {
        let Server {
            dispatcher,
            listener,
        } = self;
        let path = listener.config().path.clone();
        let bound = listener.bind().await?;
        let addr = bound.local_addr();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let listener_task = tokio::spawn(async move {
            let signal = async {
                let _ = shutdown_rx.await;
            };
            match bound.serve_with_shutdown(signal).await {
                Ok(()) => info!("RPC server on {} shut down", addr),
                Err(e) => error!("RPC listener on {} failed: {}", addr, e),
            }
        });
        let loop_task = tokio::spawn(dispatcher.run());

        Ok(ServerHandle {
            addr,
            path,
            shutdown_tx: Some(shutdown_tx),
            listener_task,
            loop_task,
        })
    }
}

impl Dispatcher {
    async fn serve(&mut self) -> Result<()> {
        self.conn.read_request().await?;

        match self.dispatch() {
            Ok(reply) => {
                self.conn.write(reply)?;
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                let reply = stage_message(&mut self.staging, |enc| enc.encode(message.as_str()))?;
                self.conn.write(reply)?;
                Err(err)
            }
        }
    }

    /// Decode the name and arguments of the pending request and run it.
    fn dispatch(&mut self) -> Result<Bytes> {
        let mut dec = Decoder::new(&mut self.conn);

        let mut name = String::new();
        dec.decode(&mut name)?;

        let procedure = self
            .registry
            .get(&name)
            .ok_or_else(|| RpcError::InvalidName { name: name.clone() })?;

        let staging = &mut self.staging;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            stage_message(staging, |enc| procedure.call(&mut dec, enc))
        }));
        let reply = match outcome {
            Ok(reply) => reply?,
            Err(_) => {
                error!("Procedure {} panicked", name);
                return Err(RpcError::Panicked { name });
            }
        };
        debug!("Served {} ({} reply bytes)", name, reply.len());
        Ok(reply)
    }

    async fn run(mut self) {
        loop {
            match self.serve().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    debug!("RPC serving loop stopped: {}", e);
                    break;
                }
                Err(e) => warn!("RPC call failed: {}", e),
            }
        }
    }
}

/// Handle to a server started with [`Server::start`]. Dropping it shuts the
/// server down.
pub struct ServerHandle {
    addr: SocketAddr,
    path: String,
    shutdown_tx: Option<oneshot::Sender<()>>,
    listener_task: JoinHandle<()>,
    loop_task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL clients should post to.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, self.path)
    }

    /// Wait until the listener stops on its own.
    pub async fn wait(&mut self) {
        if !self.listener_task.is_finished() {
            let _ = (&mut self.listener_task).await;
        }
    }

    /// Stop accepting requests and wait for the listener to wind down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.wait().await;
        self.loop_task.abort();
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.listener_task.abort();
        self.loop_task.abort();
    }
}
