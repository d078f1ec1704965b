//! Test support for the panel integration tests.
//!
//! [`MockTransport`] stands in for a payment node: replies are scripted per
//! `(method, path)` and every call is recorded for later assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use panel_core::{Error, NodeEndpoint, Result};
use panel_http::{Method, Transport};
use serde_json::{Value, json};
use tokio::sync::Notify;

/// A scripted reply.
#[derive(Clone)]
pub enum Reply {
    /// Respond with this JSON value.
    Json(Value),
    /// Fail with [`Error::RemoteCallFailed`] carrying this message.
    Fail(String),
    /// Wait for the gate to be opened, then apply the inner reply.
    Gated(Arc<Notify>, Box<Reply>),
}

#[derive(Default)]
struct Route {
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Value>,
}

/// In-memory node for tests.
pub struct MockTransport {
    endpoint: NodeEndpoint,
    routes: Mutex<HashMap<(Method, String), Route>>,
    calls: Mutex<Vec<Call>>,
    in_flight: Mutex<HashMap<(Method, String), usize>>,
}

/// Counts a call as in flight until dropped, whether it completes or is
/// cancelled.
struct InFlight<'a> {
    mock: &'a MockTransport,
    key: (Method, String),
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(n) = lock(&self.mock.in_flight).get_mut(&self.key) {
            *n = n.saturating_sub(1);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTransport {
    /// Create a mock node named `name` on regtest.
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: NodeEndpoint::new("regtest", name, format!("http://{name}:3001")),
            routes: Mutex::default(),
            calls: Mutex::default(),
            in_flight: Mutex::default(),
        })
    }

    /// Reply to every `method path` with `reply` once queued replies run out.
    pub fn on(&self, method: Method, path: &str, reply: Reply) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .fallback = Some(reply);
        self
    }

    /// Queue a one-off reply used before the fallback.
    pub fn push(&self, method: Method, path: &str, reply: Reply) -> &Self {
        lock(&self.routes)
            .entry((method, path.to_string()))
            .or_default()
            .queue
            .push_back(reply);
        self
    }

    /// Shorthand for `on(GET, path, Json(value))`.
    pub fn get(&self, path: &str, value: Value) -> &Self {
        self.on(Method::Get, path, Reply::Json(value))
    }

    /// Shorthand for `on(POST, path, Json(value))`.
    pub fn post(&self, path: &str, value: Value) -> &Self {
        self.on(Method::Post, path, Reply::Json(value))
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Number of calls to `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Body of the last call to `method path`.
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        lock(&self.calls)
            .iter()
            .rev()
            .find(|c| c.method == method && c.path == path)
            .and_then(|c| c.body.clone())
    }

    /// Number of calls to `method path` that have started but not yet
    /// returned or been dropped.
    pub fn in_flight(&self, method: Method, path: &str) -> usize {
        lock(&self.in_flight)
            .get(&(method, path.to_string()))
            .copied()
            .unwrap_or(0)
    }

    fn track(&self, method: Method, path: &str) -> InFlight<'_> {
        let key = (method, path.to_string());
        *lock(&self.in_flight).entry(key.clone()).or_default() += 1;
        InFlight { mock: self, key }
    }

    fn next_reply(&self, method: Method, path: &str) -> Option<Reply> {
        let mut routes = lock(&self.routes);
        let route = routes.get_mut(&(method, path.to_string()))?;
        route.queue.pop_front().or_else(|| route.fallback.clone())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        lock(&self.calls).push(Call {
            method,
            path: path.to_string(),
            body,
        });
        let _in_flight = self.track(method, path);

        let mut reply = self
            .next_reply(method, path)
            .unwrap_or_else(|| Reply::Fail(format!("no route for {method} {path}")));

        loop {
            match reply {
                Reply::Json(value) => return Ok(value),
                Reply::Fail(message) => return Err(Error::remote(method.as_str(), path, message)),
                Reply::Gated(gate, inner) => {
                    gate.notified().await;
                    reply = *inner;
                }
            }
        }
    }

    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }
}

/// A channel record as the node's `/channels` endpoint returns it.
pub fn channel_json(
    user_channel_id: &str,
    channel_point: Option<&str>,
    ready: bool,
) -> Value {
    json!({
        "channel_id": format!("{user_channel_id:0>64}"),
        "user_channel_id": user_channel_id,
        "counterparty_node_id": "02bob",
        "channel_point": channel_point,
        "channel_value_sats": 50_000,
        "outbound_capacity_msat": 40_000_000,
        "inbound_capacity_msat": 9_000_000,
        "is_channel_ready": ready,
        "is_usable": ready,
        "is_announced": true,
    })
}
