//! Channel event subscriptions over long-poll.
//!
//! The node exposes no push transport, only a blocking "wait for next event"
//! call and a matching "event handled" acknowledgement. [`EventPoller`] runs
//! that pair in a background task per node and re-arms it on a fixed delay.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use panel_core::{ChannelEvent, EndpointKey, NodeEndpoint, Result};
use panel_http::{DynTransport, Method};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::NodeClient;

/// Callback invoked for each delivered event.
pub type EventCallback = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Delays used by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTiming {
    /// Pause before the next cycle.
    pub rearm_delay: Duration,
    /// Extra pause after a failed cycle.
    pub failure_backoff: Duration,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            rearm_delay: Duration::from_secs(1),
            failure_backoff: Duration::from_secs(1),
        }
    }
}

struct Subscription {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Registry of per-node event subscriptions.
///
/// At most one subscription runs per `(network, name)`. Clones share the
/// registry.
#[derive(Clone, Default)]
pub struct EventPoller {
    registry: Arc<Mutex<HashMap<EndpointKey, Subscription>>>,
    timing: PollTiming,
}

impl EventPoller {
    /// Create a poller with the default 1 s re-arm and backoff delays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a poller with custom delays.
    pub fn with_timing(timing: PollTiming) -> Self {
        Self {
            registry: Arc::default(),
            timing,
        }
    }

    /// Start delivering `client`'s channel events to `callback`.
    ///
    /// Returns `false` and does nothing if the node already has a
    /// subscription; [`EventPoller::unsubscribe`] first to replace the
    /// callback.
    pub fn subscribe<F>(&self, client: &NodeClient, callback: F) -> bool
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        let key = client.endpoint().key();
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        if registry.contains_key(&key) {
            tracing::debug!(node = %key, "already subscribed to channel events");
            return false;
        }

        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            Arc::clone(client.transport()),
            stopped,
            Arc::new(callback),
            self.timing,
        ));
        tracing::info!(node = %key, "subscribed to channel events");
        registry.insert(key, Subscription { stop, task });
        true
    }

    /// Like [`EventPoller::subscribe`], delivering events through a stream.
    ///
    /// Returns `None` if the node already has a subscription. The stream ends
    /// once the subscription is stopped.
    pub fn subscribe_stream(
        &self,
        client: &NodeClient,
    ) -> Option<UnboundedReceiverStream<ChannelEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(client, move |event| {
            let _ = tx.send(event);
        })
        .then(|| UnboundedReceiverStream::new(rx))
    }

    /// Stop and remove the subscription for `endpoint`.
    ///
    /// A pending "wait for next event" call is abandoned at once, so a new
    /// subscription for the same node never overlaps it. An acknowledgement
    /// already sent is allowed to finish, but its event is not delivered.
    /// Returns whether a subscription existed.
    pub fn unsubscribe(&self, endpoint: &NodeEndpoint) -> bool {
        let key = endpoint.key();
        let removed = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);

        match removed {
            Some(sub) => {
                sub.stop.send_replace(true);
                tracing::info!(node = %key, "unsubscribed from channel events");
                true
            }
            None => false,
        }
    }

    /// Whether `endpoint` has a running subscription.
    pub fn is_subscribed(&self, endpoint: &NodeEndpoint) -> bool {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&endpoint.key())
    }

    /// Stop every subscription and wait for their tasks to finish.
    ///
    /// Unlike [`EventPoller::unsubscribe`], acknowledgements in flight are
    /// cancelled too.
    pub async fn shutdown(&self) {
        let subs: Vec<Subscription> = self
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, sub)| sub)
            .collect();

        for sub in &subs {
            sub.stop.send_replace(true);
            sub.task.abort();
        }
        for sub in subs {
            match sub.task.await {
                Err(e) if !e.is_cancelled() => {
                    tracing::warn!("event poll task ended abnormally: {e}");
                }
                _ => {}
            }
        }
    }
}

async fn poll_loop(
    transport: DynTransport,
    mut stopped: watch::Receiver<bool>,
    callback: EventCallback,
    timing: PollTiming,
) {
    let key = transport.endpoint().key();

    loop {
        if *stopped.borrow() {
            break;
        }

        tracing::trace!(node = %key, "waiting for next event");
        let outcome = poll_once(&transport, &mut stopped).await;
        match outcome {
            Ok(Some(event)) => {
                if *stopped.borrow() {
                    break;
                }
                tracing::debug!(node = %key, "channel event: {event}");
                callback(event);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(node = %key, "event poll failed: {e}");
                if !pause(&mut stopped, timing.failure_backoff).await {
                    break;
                }
            }
        }

        if !pause(&mut stopped, timing.rearm_delay).await {
            break;
        }
    }

    tracing::trace!(node = %key, "event poll loop stopped");
}

/// One wait/acknowledge round-trip. `Ok(None)` if stopped before acknowledging.
async fn poll_once(
    transport: &DynTransport,
    stopped: &mut watch::Receiver<bool>,
) -> Result<Option<ChannelEvent>> {
    let event = tokio::select! {
        res = transport.call(Method::Post, "/events/wait_next", Some(json!({}))) => res?,
        _ = stopped.wait_for(|stop| *stop) => return Ok(None),
    };

    if *stopped.borrow() {
        return Ok(None);
    }

    transport
        .call(Method::Post, "/events/handled", Some(json!({})))
        .await?;

    let kind = event.get("type").and_then(Value::as_str).unwrap_or_default();
    Ok(Some(ChannelEvent::from_discriminant(kind)))
}

/// Sleep for `delay` unless stopped first. Returns whether to keep going.
async fn pause(stopped: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => {}
        _ = stopped.wait_for(|stop| *stop) => return false,
    }
    !*stopped.borrow()
}
