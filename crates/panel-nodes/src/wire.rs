//! Wire shapes of the payment node REST API.

use panel_core::{Balances, Channel, ChannelStatus, PaymentReceipt, PaymentRequest, Peer};
use serde::Deserialize;

use crate::channels::id_suffix;

#[derive(Debug, Deserialize)]
pub(crate) struct NodeIdResponse {
    pub node_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusDto {
    pub is_running: bool,
    pub best_block_height: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BalancesDto {
    pub total_onchain_balance_sats: u64,
    pub spendable_onchain_balance_sats: u64,
}

impl From<BalancesDto> for Balances {
    fn from(dto: BalancesDto) -> Self {
        Self::from_onchain(
            dto.total_onchain_balance_sats,
            dto.spendable_onchain_balance_sats,
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewAddressResponse {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PeerDetailsDto {
    pub node_id: String,
    pub address: String,
}

impl From<PeerDetailsDto> for Peer {
    fn from(dto: PeerDetailsDto) -> Self {
        Self {
            pubkey: dto.node_id,
            address: dto.address,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChannelDetailsDto {
    pub channel_id: String,
    pub user_channel_id: String,
    pub counterparty_node_id: String,
    #[serde(default)]
    pub channel_point: Option<String>,
    pub channel_value_sats: u64,
    #[serde(default)]
    pub outbound_capacity_msat: u64,
    #[serde(default)]
    pub inbound_capacity_msat: u64,
    pub is_channel_ready: bool,
    #[serde(default)]
    pub is_announced: bool,
}

impl ChannelDetailsDto {
    /// Funding point, treating an empty string as unknown.
    pub fn funding_point(&self) -> Option<&str> {
        self.channel_point.as_deref().filter(|p| !p.is_empty())
    }
}

impl From<ChannelDetailsDto> for Channel {
    fn from(dto: ChannelDetailsDto) -> Self {
        let channel_point = dto.funding_point().map(str::to_string);
        let unique_id = match &channel_point {
            Some(point) => id_suffix(point.split(':').next().unwrap_or(point)),
            None => id_suffix(&dto.channel_id),
        }
        .to_string();

        Self {
            pending: !dto.is_channel_ready,
            unique_id,
            channel_point,
            pubkey: dto.counterparty_node_id,
            capacity: dto.channel_value_sats,
            local_balance: dto.outbound_capacity_msat / 1000,
            remote_balance: dto.inbound_capacity_msat / 1000,
            status: ChannelStatus::from_ready(dto.is_channel_ready),
            is_private: !dto.is_announced,
            channel_id: dto.channel_id,
            user_channel_id: dto.user_channel_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenChannelResponse {
    pub user_channel_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bolt11ReceiveResponse {
    pub invoice: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bolt11DecodeResponse {
    pub payment_hash: String,
    pub destination: String,
    #[serde(default)]
    pub amount_msat: Option<u64>,
    pub expiry_secs: u64,
}

impl From<Bolt11DecodeResponse> for PaymentRequest {
    fn from(dto: Bolt11DecodeResponse) -> Self {
        Self {
            payment_hash: dto.payment_hash,
            destination: dto.destination,
            amount_msat: dto.amount_msat.unwrap_or(0),
            expiry_secs: dto.expiry_secs,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Bolt11PayResponse {
    pub preimage: String,
    pub amount_sats: u64,
    pub destination: String,
}

impl From<Bolt11PayResponse> for PaymentReceipt {
    fn from(dto: Bolt11PayResponse) -> Self {
        Self {
            preimage: dto.preimage,
            amount_sats: dto.amount_sats,
            destination: dto.destination,
        }
    }
}
