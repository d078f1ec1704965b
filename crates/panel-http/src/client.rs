//! reqwest-backed [`Transport`] for a payment node's REST API.

use async_trait::async_trait;
use panel_core::{Error, NodeEndpoint, Result};
use reqwest::Url;
use serde_json::Value;

use crate::{Method, Transport};

/// HTTP client bound to a single [`NodeEndpoint`].
///
/// Each call carries the endpoint's bearer credential. When the endpoint
/// declares a relay, the request goes to the relay instead, with the real
/// target passed in the `api` query parameter and the `Authorization`
/// header left as-is for the relay to forward.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    endpoint: NodeEndpoint,
}

impl HttpClient {
    /// Create a client for `endpoint`.
    pub fn new(endpoint: NodeEndpoint) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Create a client reusing an existing connection pool.
    pub fn with_client(client: reqwest::Client, endpoint: NodeEndpoint) -> Self {
        tracing::trace!(
            node = %endpoint.key(),
            relay = endpoint.relay.is_some(),
            "initializing HTTP client for {}",
            endpoint.base_url
        );
        Self { client, endpoint }
    }
}

/// Resolve the URL a call to `path` is sent to.
///
/// # Errors
///
/// Returns a message describing the malformed base or relay URL.
pub fn request_url(endpoint: &NodeEndpoint, path: &str) -> std::result::Result<Url, String> {
    let target = format!("{}{}", endpoint.base_url.trim_end_matches('/'), path);
    match &endpoint.relay {
        Some(relay) => Url::parse_with_params(relay, &[("api", target.as_str())])
            .map_err(|e| format!("invalid relay URL {relay}: {e}")),
        None => Url::parse(&target).map_err(|e| format!("invalid URL {target}: {e}")),
    }
}

/// Pick the best human-readable message from an error response.
///
/// Priority: a `message` field, then an `error` field, then `fallback`.
pub fn extract_error_message(body: Option<&Value>, fallback: &str) -> String {
    let field = |name: &str| {
        body.and_then(|b| b.get(name)).and_then(|v| match v {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    };

    field("message")
        .or_else(|| field("error"))
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl Transport for HttpClient {
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let fail = |message: String| Error::remote(method.as_str(), path, message);

        let url = request_url(&self.endpoint, path).map_err(fail)?;
        tracing::debug!(node = %self.endpoint.key(), "→ {method} {path}");

        let mut req = match method {
            Method::Get => self.client.get(url),
            Method::Post => self
                .client
                .post(url)
                .json(&body.unwrap_or_else(|| Value::Object(serde_json::Map::new()))),
        };
        if let Some(token) = &self.endpoint.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::error!(node = %self.endpoint.key(), "{method} {path} request failed: {e}");
            fail(e.to_string())
        })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| fail(e.to_string()))?;
        let parsed = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str::<Value>(&text).ok()
        };

        if !status.is_success() {
            let message = extract_error_message(
                parsed.as_ref(),
                &format!("request failed with status code {}", status.as_u16()),
            );
            tracing::debug!(node = %self.endpoint.key(), "← {method} {path} {status}: {message}");
            return Err(fail(message));
        }

        parsed.ok_or_else(|| fail(format!("invalid JSON response: {text}")))
    }

    fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }
}
