//! Calling side of the RPC layer.

use super::procedure::{Args, Returns};
use super::stage_message;
use crate::config::TransportConfig;
use crate::error::{Result, RpcError};
use crate::transport::ClientConn;
use crate::wire::{Decode, Decoder, Encode};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::marker::PhantomData;
use tracing::debug;

/// RPC client over one [`ClientConn`].
///
/// Calls take `&mut self`, so one client runs one call at a time. Use one
/// client per task for parallel callers; the server serializes them anyway.
#[derive(Debug)]
pub struct Client {
    conn: ClientConn,
    staging: BytesMut,
}

impl Client {
    /// Create a client posting to `url`, e.g. `http://127.0.0.1:8080/rpc`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Ok(Self::from_conn(ClientConn::new(url)?))
    }

    /// Create a client for the server a [`TransportConfig`] describes.
    pub fn with_config(config: &TransportConfig) -> Result<Self> {
        config.validate()?;
        Self::new(format!("http://{}{}", config.addr, config.path))
    }

    pub fn from_conn(conn: ClientConn) -> Self {
        Self {
            conn,
            staging: BytesMut::new(),
        }
    }

    pub fn url(&self) -> &str {
        self.conn.url()
    }

    /// Call `name` with positional `args`, decoding results into `outputs`.
    ///
    /// A non-empty failure string from the server is returned as
    /// [`RpcError::Remote`] and `outputs` are left untouched.
    pub async fn invoke(
        &mut self,
        name: &str,
        args: &[&(dyn Encode + Sync)],
        outputs: &mut [&mut (dyn Decode + Send)],
    ) -> Result<()> {
        let request = self.stage(name, args)?;
        self.exchange(name, request).await?;
        self.read_reply(outputs)
    }

    /// Call `name` with a tuple of arguments and decode the outputs as `O`.
    ///
    /// ```no_run
    /// # async fn demo(client: &mut postwire::Client) -> postwire::Result<()> {
    /// let (mean, max): (f64, f64) = client.call("Stats", (vec![1.0f64, 4.0],)).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<A, O>(&mut self, name: &str, args: A) -> Result<O>
    where
        A: Args,
        O: Returns + Default,
    {
        let request = self.stage(name, args.values().as_slice())?;
        self.exchange(name, request).await?;

        let mut outputs = O::default();
        self.read_reply(outputs.outputs_mut().as_mut_slice())?;
        Ok(outputs)
    }

    /// Bind `name` to a typed stub.
    pub fn bind<A, O>(&self, name: impl Into<String>) -> Stub<A, O> {
        Stub {
            name: name.into(),
            _signature: PhantomData,
        }
    }

    /// Consume the client and close its HTTP connections. Stubs stay
    /// usable with other clients.
    pub fn close(self) {
        self.conn.close();
    }

    fn stage<E: Encode + ?Sized>(&mut self, name: &str, args: &[&E]) -> Result<Bytes> {
        let request = stage_message(&mut self.staging, |enc| {
            enc.encode(name)?;
            for arg in args {
                enc.encode(*arg)?;
            }
            Ok(())
        })?;
        Ok(request)
    }

    async fn exchange(&mut self, name: &str, request: Bytes) -> Result<()> {
        debug!("Calling {} ({} request bytes)", name, request.len());
        self.conn.write(request).await?;
        Ok(())
    }

    fn read_reply<D: Decode + ?Sized>(&mut self, outputs: &mut [&mut D]) -> Result<()> {
        let mut dec = Decoder::new(&mut self.conn);

        let mut failure = String::new();
        dec.decode(&mut failure)?;
        if !failure.is_empty() {
            return Err(RpcError::Remote { message: failure });
        }

        for output in outputs.iter_mut() {
            dec.decode(&mut **output)?;
        }
        Ok(())
    }
}

/// A procedure name bound to its argument and output types.
///
/// ```no_run
/// # async fn demo(client: &mut postwire::Client) -> postwire::Result<()> {
/// let add = client.bind::<(i64, i64), i64>("Add");
/// assert_eq!(add.call(client, (2, 3)).await?, 5);
/// # Ok(())
/// # }
/// ```
pub struct Stub<A, O> {
    name: String,
    _signature: PhantomData<fn(A) -> O>,
}

impl<A, O> Stub<A, O>
where
    A: Args,
    O: Returns + Default,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn call(&self, client: &mut Client, args: A) -> Result<O> {
        client.call(&self.name, args).await
    }
}

impl<A, O> Clone for Stub<A, O> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _signature: PhantomData,
        }
    }
}

impl<A, O> fmt::Debug for Stub<A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stub").field("name", &self.name).finish()
    }
}
