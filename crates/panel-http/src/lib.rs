//! HTTP transport for the node admin panel.
//!
//! [`HttpClient`] issues authenticated calls against a payment node's REST
//! API, optionally through a same-origin relay, and normalizes every failure
//! into [`panel_core::Error::RemoteCallFailed`]. Higher layers talk to it
//! through the [`Transport`] trait so tests can substitute a scripted node.
//!
//! [`BitcoinRpc`] is a small JSON-RPC client for the block-chain node, used
//! only to mine confirmation blocks in development setups.

mod bitcoin;
mod client;
mod transport;

pub use bitcoin::BitcoinRpc;
pub use client::{HttpClient, extract_error_message, request_url};
pub use transport::{DynTransport, Method, Transport};
