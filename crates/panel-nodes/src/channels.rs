//! Channel open/close workflows.
//!
//! The node acknowledges an open request long before the channel exists in a
//! usable form: first only a correlation id (`user_channel_id`) is known,
//! then the funding outpoint shows up in the channel list, and finally the
//! channel turns ready once the funding transaction confirms. The methods
//! here poll the channel list through [`wait_for`] to bridge those steps.
//!
//! Channels are matched by the last 12 characters of an identifier. Two
//! channels sharing a suffix would be confused; that matches the display id
//! the panel shows and is kept as is.

use std::time::Duration;

use panel_core::{Channel, ChannelPoint, ChannelStatus, Error, OpenChannelOptions, PeerAddress, Result};
use serde_json::json;

use crate::wire::OpenChannelResponse;
use crate::{NodeClient, wait_for};

/// Interval between channel list polls while waiting for the funding point.
pub const OPEN_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Deadline for the funding point to appear after an open request.
pub const OPEN_TIMEOUT: Duration = Duration::from_secs(60);
/// Interval between readiness checks.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default deadline for a channel to become ready.
pub const READY_TIMEOUT: Duration = Duration::from_secs(300);
/// Interval between lookups of a channel by id.
pub const LOOKUP_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Deadline of a single lookup inside a readiness check.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);
/// Default deadline for open-then-wait-ready.
pub const OPEN_AND_WAIT_TIMEOUT: Duration = Duration::from_secs(360);

const SUFFIX_LEN: usize = 12;

/// Last 12 characters of `id`, or all of it if shorter.
pub fn id_suffix(id: &str) -> &str {
    id.char_indices()
        .rev()
        .nth(SUFFIX_LEN - 1)
        .map_or(id, |(start, _)| &id[start..])
}

fn matches_id(channel: &Channel, suffix: &str) -> bool {
    channel.funding_txid().is_some_and(|txid| id_suffix(txid) == suffix)
        || channel.unique_id == suffix
        || id_suffix(&channel.user_channel_id) == suffix
}

impl NodeClient {
    /// Request a channel and wait for its funding outpoint.
    ///
    /// Returns once the node lists a channel for this request with a known
    /// funding point. A [`Error::Timeout`] does not mean the open was
    /// abandoned; the node may still complete it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidAddress`] for a malformed `pubkey@host` (no request
    /// is made), [`Error::RemoteCallFailed`] if the open request fails and
    /// [`Error::Timeout`] if no funding point shows up within
    /// [`OPEN_TIMEOUT`].
    pub async fn open_channel(&self, options: &OpenChannelOptions) -> Result<ChannelPoint> {
        let peer: PeerAddress = options.to_rpc_url.parse()?;

        let res: OpenChannelResponse = self
            .post(
                "/channel/open",
                json!({
                    "node_id": peer.pubkey,
                    "address": peer.host,
                    "channel_amount_sats": options.amount_sats,
                    "announce": !options.is_private,
                }),
            )
            .await?;
        let user_channel_id = res.user_channel_id.as_str();
        tracing::info!(
            node = %self.endpoint().key(),
            user_channel_id,
            "requested {} sat channel to {peer}",
            options.amount_sats
        );

        let channel_point = wait_for(
            move || self.funding_point_of(user_channel_id),
            OPEN_POLL_INTERVAL,
            OPEN_TIMEOUT,
        )
        .await?;

        tracing::info!(node = %self.endpoint().key(), "channel {user_channel_id} funded at {channel_point}");
        channel_point.parse()
    }

    async fn funding_point_of(&self, user_channel_id: &str) -> Result<String> {
        self.list_channel_details()
            .await?
            .into_iter()
            .find(|c| c.user_channel_id == user_channel_id && c.funding_point().is_some())
            .and_then(|c| c.channel_point)
            .ok_or_else(|| Error::NotReady("waiting for funding outpoint".to_string()))
    }

    async fn find_channel(&self, id: &str) -> Result<Channel> {
        let suffix = id_suffix(id);
        self.get_channels()
            .await?
            .into_iter()
            .find(|c| matches_id(c, suffix))
            .ok_or_else(|| Error::ChannelNotFound(id.to_string()))
    }

    /// Wait until a channel matching `id` appears in the channel list.
    ///
    /// `id` may be a funding txid or a correlation id; both are compared by
    /// their last 12 characters.
    pub async fn wait_for_channel(&self, id: &str, timeout: Duration) -> Result<Channel> {
        wait_for(move || self.find_channel(id), LOOKUP_POLL_INTERVAL, timeout).await
    }

    /// Wait until the channel matching `id` is [`ChannelStatus::Open`].
    ///
    /// Every check performs its own lookup bounded by [`LOOKUP_TIMEOUT`],
    /// repeated every [`READY_POLL_INTERVAL`] until `timeout`.
    pub async fn wait_for_channel_ready(&self, id: &str, timeout: Duration) -> Result<Channel> {
        wait_for(
            move || async move {
                let channel = self.wait_for_channel(id, LOOKUP_TIMEOUT).await?;
                if channel.status == ChannelStatus::Open {
                    Ok(channel)
                } else {
                    Err(Error::NotReady(format!("channel {} not ready", channel.unique_id)))
                }
            },
            READY_POLL_INTERVAL,
            timeout,
        )
        .await
    }

    /// Open a channel and wait until it is ready.
    pub async fn open_channel_and_wait(
        &self,
        options: &OpenChannelOptions,
        timeout: Duration,
    ) -> Result<Channel> {
        let point = self.open_channel(options).await?;
        self.wait_for_channel_ready(&point.txid, timeout).await
    }

    /// Whether the channel at `channel_point` is open.
    ///
    /// Never fails: lookup errors read as "not ready", which is what a
    /// polling caller would do with them anyway.
    pub async fn is_channel_ready(&self, channel_point: &str) -> bool {
        match self.get_channels().await {
            Ok(channels) => channels.iter().any(|c| {
                c.status == ChannelStatus::Open && c.channel_point.as_deref() == Some(channel_point)
            }),
            Err(e) => {
                tracing::debug!(node = %self.endpoint().key(), "readiness check for {channel_point}: {e}");
                false
            }
        }
    }

    /// Close the channel funded at exactly `channel_point`.
    ///
    /// The close request is keyed by the channel's correlation id and
    /// counterparty. Closing a channel that is already closing is left to
    /// the node to handle.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelNotFound`] if no live channel has that funding point;
    /// no close request is sent in that case.
    pub async fn close_channel(&self, channel_point: &str) -> Result<()> {
        let channel = self
            .list_channel_details()
            .await?
            .into_iter()
            .find(|c| c.funding_point() == Some(channel_point))
            .ok_or_else(|| Error::ChannelNotFound(channel_point.to_string()))?;

        self.post_unit(
            "/channel/close",
            json!({
                "user_channel_id": channel.user_channel_id,
                "counterparty_node_id": channel.counterparty_node_id,
            }),
        )
        .await?;

        tracing::info!(node = %self.endpoint().key(), "closing channel {channel_point}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_suffix() {
        assert_eq!(id_suffix("0123456789abcdef"), "456789abcdef");
        assert_eq!(id_suffix("456789abcdef"), "456789abcdef");
        assert_eq!(id_suffix("short"), "short");
        assert_eq!(id_suffix(""), "");
    }

    #[test]
    fn test_matches_by_txid_or_correlation_suffix() {
        let channel = Channel {
            pending: true,
            unique_id: "111111111111".into(),
            channel_point: Some("ffffffffffff111111111111:0".into()),
            pubkey: "02ab".into(),
            capacity: 0,
            local_balance: 0,
            remote_balance: 0,
            status: ChannelStatus::Opening,
            is_private: false,
            channel_id: "000000000abc".into(),
            user_channel_id: "99999999999922222222222".into(),
        };

        assert!(matches_id(&channel, id_suffix("aaaaffffffffffff111111111111")));
        assert!(matches_id(&channel, id_suffix("111111111111")));
        assert!(matches_id(&channel, id_suffix("99999999999922222222222")));
        assert!(!matches_id(&channel, id_suffix("deadbeef")));
    }
}
