//! Node operations for the admin panel.
//!
//! This crate turns a payment node's eventually-consistent REST endpoints
//! into higher-level operations: typed queries ([`NodeClient`]), channel
//! open/close workflows that wait for the node to catch up, a deadline-bound
//! retry primitive ([`wait_for`]) and a polling stand-in for channel event
//! subscriptions ([`EventPoller`]).

mod channels;
mod events;
mod node;
mod retry;
mod wire;

pub use channels::{
    LOOKUP_POLL_INTERVAL, LOOKUP_TIMEOUT, OPEN_AND_WAIT_TIMEOUT, OPEN_POLL_INTERVAL, OPEN_TIMEOUT,
    READY_POLL_INTERVAL, READY_TIMEOUT, id_suffix,
};
pub use events::{EventCallback, EventPoller, PollTiming};
pub use node::{NodeClient, ONLINE_POLL_INTERVAL, ONLINE_TIMEOUT};
pub use retry::wait_for;
