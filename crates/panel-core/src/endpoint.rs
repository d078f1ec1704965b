//! Node endpoint identity and address types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A remote payment node the panel talks to.
///
/// Selected explicitly by the caller and passed to each client at
/// construction; there is no ambient "current node".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Network identifier (e.g. "regtest").
    pub network: String,
    /// Symbolic node name, also the host peers use to reach it.
    pub name: String,
    /// Base URL of the node's REST API.
    pub base_url: String,
    /// Bearer credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Same-origin relay URL; when set every call is forwarded through it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relay: Option<String>,
}

impl NodeEndpoint {
    /// Create an endpoint without credential or relay.
    pub fn new(
        network: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            name: name.into(),
            base_url: base_url.into(),
            token: None,
            relay: None,
        }
    }

    /// Set the bearer credential.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Route calls through a relay.
    #[must_use]
    pub fn with_relay(mut self, relay: impl Into<String>) -> Self {
        self.relay = Some(relay.into());
        self
    }

    /// Identity used to de-duplicate event subscriptions.
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            network: self.network.clone(),
            name: self.name.clone(),
        }
    }
}

/// `(network, name)` pair identifying a node for subscription purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Network identifier.
    pub network: String,
    /// Node name.
    pub name: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.network, self.name)
    }
}

/// A `pubkey@host` peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    /// Node public key.
    pub pubkey: String,
    /// `host:port` the peer listens on.
    pub host: String,
}

impl FromStr for PeerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('@') {
            Some((pubkey, host)) if !pubkey.is_empty() && !host.is_empty() => Ok(Self {
                pubkey: pubkey.to_string(),
                host: host.to_string(),
            }),
            _ => Err(Error::InvalidAddress(s.to_string())),
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.pubkey, self.host)
    }
}

/// A funding transaction outpoint, `txid:vout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPoint {
    /// Funding transaction id.
    pub txid: String,
    /// Output index within the funding transaction.
    pub index: u32,
}

impl FromStr for ChannelPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (txid, vout) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidChannelPoint(s.to_string()))?;
        if txid.is_empty() {
            return Err(Error::InvalidChannelPoint(s.to_string()));
        }
        let index = vout
            .parse()
            .map_err(|_| Error::InvalidChannelPoint(s.to_string()))?;
        Ok(Self {
            txid: txid.to_string(),
            index,
        })
    }
}

impl fmt::Display for ChannelPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}
