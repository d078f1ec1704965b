//! Transport abstraction between node operations and the wire.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use panel_core::{NodeEndpoint, Result};
use serde_json::Value;

/// HTTP method used by the node API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Upper-case method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A channel to one payment node.
///
/// Implementations perform exactly one request per call; retrying is left
/// to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue `method path` with an optional JSON body and return the decoded response.
    ///
    /// # Errors
    ///
    /// Returns [`panel_core::Error::RemoteCallFailed`] on transport failure or
    /// an error response from the node.
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;

    /// The node this transport talks to.
    fn endpoint(&self) -> &NodeEndpoint;
}

/// Shared, type-erased transport.
pub type DynTransport = Arc<dyn Transport>;
