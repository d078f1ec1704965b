//! Typed queries against a payment node.

use std::sync::Arc;
use std::time::Duration;

use panel_core::{
    Balances, Channel, Error, NodeEndpoint, NodeInfo, PaymentReceipt, PaymentRequest, Peer,
    PeerAddress, Result,
};
use panel_http::{DynTransport, HttpClient, Method};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::wait_for;
use crate::wire::{
    BalancesDto, Bolt11DecodeResponse, Bolt11PayResponse, Bolt11ReceiveResponse,
    ChannelDetailsDto, NewAddressResponse, NodeIdResponse, PeerDetailsDto, StatusDto,
};

/// Default interval between reachability probes.
pub const ONLINE_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Default deadline for a node to become reachable.
pub const ONLINE_TIMEOUT: Duration = Duration::from_secs(120);

/// Invoice expiry requested from the node.
const INVOICE_EXPIRY_SECS: u64 = 3600;

/// Client for one payment node.
///
/// Stateless: every query goes to the node and nothing is cached. Cloning is
/// cheap and clones share the underlying transport.
#[derive(Clone)]
pub struct NodeClient {
    transport: DynTransport,
}

impl NodeClient {
    /// Create a client over an existing transport.
    pub fn new(transport: DynTransport) -> Self {
        Self { transport }
    }

    /// Create a client talking HTTP to `endpoint`.
    pub fn http(endpoint: NodeEndpoint) -> Self {
        Self::new(Arc::new(HttpClient::new(endpoint)))
    }

    /// The node this client talks to.
    pub fn endpoint(&self) -> &NodeEndpoint {
        self.transport.endpoint()
    }

    pub(crate) fn transport(&self) -> &DynTransport {
        &self.transport
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.transport.call(Method::Get, path, None).await?;
        decode(Method::Get, path, value)
    }

    pub(crate) async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let value = self.transport.call(Method::Post, path, Some(body)).await?;
        decode(Method::Post, path, value)
    }

    pub(crate) async fn post_unit(&self, path: &str, body: Value) -> Result<()> {
        self.transport.call(Method::Post, path, Some(body)).await?;
        Ok(())
    }

    pub(crate) async fn list_channel_details(&self) -> Result<Vec<ChannelDetailsDto>> {
        self.get("/channels").await
    }

    /// Wait until the node answers [`NodeClient::get_info`].
    pub async fn wait_until_online(&self, interval: Duration, timeout: Duration) -> Result<()> {
        wait_for(move || self.get_info(), interval, timeout).await?;
        tracing::info!(node = %self.endpoint().key(), "node is online");
        Ok(())
    }

    /// Node identity, sync state and channel counts.
    ///
    /// The three underlying reads run concurrently; any one failing fails
    /// the whole query.
    pub async fn get_info(&self) -> Result<NodeInfo> {
        let (id, status, channels) = futures::try_join!(
            self.get::<NodeIdResponse>("/node_id"),
            self.get::<StatusDto>("/status"),
            self.list_channel_details(),
        )?;

        let active = channels.iter().filter(|c| c.is_channel_ready).count();
        let pending = channels.len() - active;
        let name = &self.endpoint().name;

        Ok(NodeInfo {
            rpc_url: format!("{}@{name}", id.node_id),
            pubkey: id.node_id,
            alias: name.clone(),
            synced_to_chain: status.is_running,
            block_height: status.best_block_height,
            num_pending_channels: pending,
            num_active_channels: active,
            num_inactive_channels: 0,
        })
    }

    /// On-chain balances.
    pub async fn get_balances(&self) -> Result<Balances> {
        let dto: BalancesDto = self.get("/balances").await?;
        Ok(dto.into())
    }

    /// Generate a new on-chain address.
    pub async fn get_new_address(&self) -> Result<String> {
        let res: NewAddressResponse = self.post("/wallet/new_address", json!({})).await?;
        Ok(res.address)
    }

    /// Connected peers.
    pub async fn get_peers(&self) -> Result<Vec<Peer>> {
        let peers: Vec<PeerDetailsDto> = self.get("/peers").await?;
        Ok(peers.into_iter().map(Peer::from).collect())
    }

    /// Connect to each `pubkey@host` in turn.
    ///
    /// Best effort: malformed entries are skipped and failed connections are
    /// logged and ignored, so one bad peer never aborts the batch.
    pub async fn connect_peers<S: AsRef<str>>(&self, rpc_urls: &[S]) {
        for rpc_url in rpc_urls {
            let rpc_url = rpc_url.as_ref();
            let peer: PeerAddress = match rpc_url.parse() {
                Ok(peer) => peer,
                Err(e) => {
                    tracing::warn!("skipping peer: {e}");
                    continue;
                }
            };

            let body = json!({
                "node_id": peer.pubkey,
                "address": peer.host,
                "persist": false,
            });
            if let Err(e) = self.post_unit("/peers/connect", body).await {
                tracing::warn!(node = %self.endpoint().key(), "connecting to {rpc_url}: {e}");
            }
        }
    }

    /// Channels known to the node.
    pub async fn get_channels(&self) -> Result<Vec<Channel>> {
        let channels = self.list_channel_details().await?;
        Ok(channels.into_iter().map(Channel::from).collect())
    }

    /// Create a BOLT11 invoice for `amount_sats`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAmount`] if the amount overflows in millisatoshis; no
    /// request is made in that case.
    pub async fn create_invoice(&self, amount_sats: u64, memo: Option<&str>) -> Result<String> {
        let amount_msat = to_msat(amount_sats)?;
        let description = memo
            .filter(|m| !m.is_empty())
            .map_or_else(|| format!("Payment to {}", self.endpoint().name), str::to_string);
        let res: Bolt11ReceiveResponse = self
            .post(
                "/bolt11/receive",
                json!({
                    "amount_msat": amount_msat,
                    "description": description,
                    "expiry_secs": INVOICE_EXPIRY_SECS,
                }),
            )
            .await?;
        Ok(res.invoice)
    }

    /// Pay a BOLT11 invoice, optionally overriding its amount.
    ///
    /// An oversized override fails with [`Error::InvalidAmount`] before any
    /// request is made.
    pub async fn pay_invoice(
        &self,
        invoice: &str,
        amount_sats: Option<u64>,
    ) -> Result<PaymentReceipt> {
        let mut body = json!({ "invoice": invoice });
        if let Some(amount) = amount_sats.filter(|a| *a > 0) {
            body["amount_msat"] = json!(to_msat(amount)?);
        }
        let res: Bolt11PayResponse = self.post("/bolt11/pay", body).await?;
        tracing::info!(node = %self.endpoint().key(), "paid {} sats to {}", res.amount_sats, res.destination);
        Ok(res.into())
    }

    /// Pay an invoice and return once the node reports completion.
    ///
    /// The node's pay call only returns after the payment completes, so this
    /// is [`NodeClient::pay_invoice`] under a name that says so.
    pub async fn pay_invoice_and_wait(
        &self,
        invoice: &str,
        amount_sats: Option<u64>,
    ) -> Result<PaymentReceipt> {
        self.pay_invoice(invoice, amount_sats).await
    }

    /// Decode a BOLT11 invoice.
    pub async fn decode_invoice(&self, invoice: &str) -> Result<PaymentRequest> {
        let res: Bolt11DecodeResponse = self
            .post("/bolt11/decode", json!({ "invoice": invoice }))
            .await?;
        Ok(res.into())
    }
}

fn to_msat(amount_sats: u64) -> Result<u64> {
    amount_sats
        .checked_mul(1000)
        .ok_or(Error::InvalidAmount(amount_sats))
}

fn decode<T: DeserializeOwned>(method: Method, path: &str, value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| Error::remote(method.as_str(), path, format!("unexpected response: {e}")))
}
