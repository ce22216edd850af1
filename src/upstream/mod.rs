//! Collaborators outside the feed core.
//!
//! - [`backend`]: REST bulk listing and status persistence
//! - [`channel`]: STOMP-over-WebSocket push subscription
//! - [`stomp`]: the frame codec the channel speaks

pub mod backend;
pub mod channel;
pub mod stomp;

pub use backend::{HttpBackend, JobBackend};
pub use channel::{ChannelEvent, LinkState, RealtimeChannel};
