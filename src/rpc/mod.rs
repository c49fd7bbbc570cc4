//! Boundary to the backend process.
//!
//! Every backend command is reached through a [`Transport`], which moves
//! JSON arguments and results. [`RpcClient`] names the commands, shapes their
//! arguments and validates responses.

mod client;
#[cfg(test)]
pub(crate) mod mock;
mod transport;

pub use client::RpcClient;
pub use transport::{HttpTransport, Transport};
