//! Request/response exchanges adapted into ordered byte streams.
//!
//! HTTP gives us one request body in, one response body out. The RPC layer
//! wants to write a whole message and then read values back one at a time.
//! The adapters here bridge the two:
//!
//! - **Client** ([`ClientConn`]): `write` performs one POST and buffers the
//!   response body; `Read` drains it.
//! - **Server** ([`ServerConn`] + [`Listener`]): the listener's handlers hand
//!   each request body to the serving loop through a rendezvous channel and
//!   wait for the loop's reply. The loop reads one request, writes one reply,
//!   in strict lockstep.

pub mod client;
pub mod server;

pub use client::ClientConn;
pub use server::{BoundListener, Listener, ServerConn};
