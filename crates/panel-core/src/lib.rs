//! Core types and configuration for the node admin panel.
//!
//! This crate provides the node endpoint identity, the domain model returned
//! by node queries, configuration management and the shared error type used
//! across the panel workspace.

mod config;
mod endpoint;
mod error;
mod model;

pub use config::{BitcoinRpcConfig, Config};
pub use endpoint::{ChannelPoint, EndpointKey, NodeEndpoint, PeerAddress};
pub use error::{Error, Result};
pub use model::{
    Balances, Channel, ChannelEvent, ChannelStatus, NodeInfo, OpenChannelOptions, PaymentReceipt,
    PaymentRequest, Peer,
};
