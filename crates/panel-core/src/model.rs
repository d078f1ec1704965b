//! Domain model returned by node queries.
//!
//! None of these are cached; each value is derived from a single query
//! against the remote node, which stays the source of truth.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Summary information about a payment node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Identity public key.
    pub pubkey: String,
    /// Node alias.
    pub alias: String,
    /// Is synced to chain.
    pub synced_to_chain: bool,
    /// Best block height.
    pub block_height: u64,
    /// Number of channels not yet ready.
    pub num_pending_channels: usize,
    /// Number of ready channels.
    pub num_active_channels: usize,
    /// Always zero; the node API does not report inactive channels.
    pub num_inactive_channels: usize,
    /// `pubkey@name`, the address peers dial.
    pub rpc_url: String,
}

/// On-chain wallet balances in satoshis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Total on-chain balance.
    pub total: u64,
    /// Spendable (confirmed) balance.
    pub confirmed: u64,
    /// `total - confirmed`, floored at zero.
    pub unconfirmed: u64,
}

impl Balances {
    /// Derive balances from the two amounts the node reports.
    pub const fn from_onchain(total: u64, confirmed: u64) -> Self {
        Self {
            total,
            confirmed,
            unconfirmed: total.saturating_sub(confirmed),
        }
    }
}

/// A connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Peer public key.
    pub pubkey: String,
    /// Network address.
    pub address: String,
}

/// Channel status.
///
/// Only `Open` and `Opening` are produced today; the rest are accepted on
/// input so richer node APIs do not break parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelStatus {
    /// Channel is ready for payments.
    Open,
    /// Funding not yet confirmed.
    Opening,
    /// Cooperative close in progress.
    Closing,
    /// Unilateral close in progress.
    #[serde(rename = "Force Closing")]
    ForceClosing,
    /// Close transaction broadcast, waiting for confirmation.
    #[serde(rename = "Waiting to Close")]
    WaitingToClose,
    /// Channel is closed.
    Closed,
    /// Channel is in an error state.
    Error,
}

impl ChannelStatus {
    /// Status derived from the readiness flag.
    pub const fn from_ready(ready: bool) -> Self {
        if ready { Self::Open } else { Self::Opening }
    }

    /// Display label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Opening => "Opening",
            Self::Closing => "Closing",
            Self::ForceClosing => "Force Closing",
            Self::WaitingToClose => "Waiting to Close",
            Self::Closed => "Closed",
            Self::Error => "Error",
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ChannelStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Open,
            Self::Opening,
            Self::Closing,
            Self::ForceClosing,
            Self::WaitingToClose,
            Self::Closed,
            Self::Error,
        ]
        .into_iter()
        .find(|status| status.label().eq_ignore_ascii_case(s))
        .ok_or_else(|| Error::InvalidChannelStatus(s.to_string()))
    }
}

/// A payment channel as seen by the local node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Not yet ready.
    pub pending: bool,
    /// Short display id: last 12 chars of the funding txid, else of the channel id.
    pub unique_id: String,
    /// Funding outpoint `txid:vout`, unknown while the open is in progress.
    pub channel_point: Option<String>,
    /// Counterparty public key.
    pub pubkey: String,
    /// Capacity in satoshis.
    pub capacity: u64,
    /// Local spendable balance in satoshis.
    pub local_balance: u64,
    /// Remote spendable balance in satoshis.
    pub remote_balance: u64,
    /// Channel status.
    pub status: ChannelStatus,
    /// Not announced to the network.
    pub is_private: bool,
    /// Node-internal channel id.
    pub channel_id: String,
    /// Correlation id handed out when the open was requested.
    pub user_channel_id: String,
}

impl Channel {
    /// Funding transaction id, if the funding point is known.
    pub fn funding_txid(&self) -> Option<&str> {
        self.channel_point
            .as_deref()
            .map(|point| point.split(':').next().unwrap_or(point))
    }
}

/// Parameters for opening a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChannelOptions {
    /// Counterparty `pubkey@host`.
    pub to_rpc_url: String,
    /// Channel capacity in satoshis.
    pub amount_sats: u64,
    /// Do not announce the channel.
    pub is_private: bool,
}

/// A decoded BOLT11 invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Payment hash.
    pub payment_hash: String,
    /// Payee public key.
    pub destination: String,
    /// Requested amount; zero when the invoice carries none.
    pub amount_msat: u64,
    /// Expiry in seconds.
    pub expiry_secs: u64,
}

/// Result of a completed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Payment preimage.
    pub preimage: String,
    /// Settled amount in satoshis.
    pub amount_sats: u64,
    /// Payee public key.
    pub destination: String,
}

/// Channel lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelEvent {
    /// Funding transaction broadcast.
    Pending,
    /// Channel ready.
    Open,
    /// Channel closed.
    Closed,
    /// Any other node event.
    Unknown,
}

impl ChannelEvent {
    /// Map a node event discriminant; anything unrecognized is `Unknown`.
    pub fn from_discriminant(kind: &str) -> Self {
        match kind {
            "ChannelPending" => Self::Pending,
            "ChannelReady" => Self::Open,
            "ChannelClosed" => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ChannelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
