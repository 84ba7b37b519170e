//! Remote procedure calls over the wire encoding and the HTTP stream.
//!
//! A request is the procedure name followed by its arguments:
//!
//! ```text
//! request:  encode(name) encode(arg1) .. encode(argN)
//! response: encode(failure) [encode(out1) .. encode(outM)]
//! ```
//!
//! The outputs are present only when the failure string is empty.
//!
//! ```no_run
//! use postwire::{Client, Server, TransportConfig};
//!
//! # async fn demo() -> postwire::Result<()> {
//! let mut server = Server::new(TransportConfig::default())?;
//! server.register("Add", |a: i64, b: i64| a + b);
//! let handle = server.start().await?;
//!
//! let mut client = Client::new(handle.url())?;
//! let sum: i64 = client.call("Add", (2i64, 3i64)).await?;
//! assert_eq!(sum, 5);
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod procedure;
mod server;

pub use client::{Client, Stub};
pub use procedure::{Args, Handler, IntoOutcome, Returns, Signature};
pub use server::{Server, ServerHandle};

use crate::error::WireError;
use crate::wire::Encoder;
use bytes::{BufMut, Bytes, BytesMut};

/// Run `write` against an encoder over `staging` and take the result out as
/// one message.
///
/// `staging` is cleared first, so a message abandoned halfway by an earlier
/// error never leaks into the next one.
pub(crate) fn stage_message<F>(staging: &mut BytesMut, write: F) -> Result<Bytes, WireError>
where
    F: FnOnce(&mut Encoder<'_>) -> Result<(), WireError>,
{
    staging.clear();
    {
        let mut writer = (&mut *staging).writer();
        write(&mut Encoder::new(&mut writer))?;
    }
    Ok(staging.split().freeze())
}
