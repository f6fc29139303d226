//! Real-time notification delivery over server-sent events
//!
//! Three pieces, leaves first: the connection registry (user id to open
//! channel), the stream session (long-lived response body with heartbeat
//! and teardown), and the broadcast API everything else calls.

pub mod broadcast;
pub mod events;
pub mod registry;
pub mod session;

pub use broadcast::Broadcaster;
pub use events::StreamEvent;
pub use registry::{ConnectionId, ConnectionRegistry, DispatchOutcome, EventSender};
pub use session::{open, EventStream};
