//! postwire: a self-describing binary encoding and an RPC layer that carries
//! it over plain HTTP POST.
//!
//! # Architecture
//!
//! - [`wire`]: tagged binary encoding of scalars, strings, sequences, maps
//!   and records, decoded into caller-supplied destinations.
//! - [`transport`]: adapts HTTP request/response exchanges into ordered byte
//!   streams on both sides.
//! - [`rpc`]: named procedures called with positional arguments, served one
//!   at a time.
//!
//! # Example
//!
//! ```no_run
//! use postwire::{Client, Server, TransportConfig};
//!
//! #[tokio::main]
//! async fn main() -> postwire::Result<()> {
//!     let mut server = Server::new(TransportConfig::new("127.0.0.1:8080"))?;
//!     server.register("Echo", |text: String| text);
//!     let handle = server.start().await?;
//!
//!     let mut client = Client::new(handle.url())?;
//!     let reply: String = client.call("Echo", ("hello",)).await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod rpc;
pub mod transport;
pub mod wire;

pub use config::{RpcConfig, TransportConfig, WireConfig};
pub use error::{Result, RpcError, TransportError, WireError};
pub use rpc::{Client, Server, ServerHandle, Signature, Stub};
pub use wire::{Complex128, Complex64, Decode, Encode, Kind};
