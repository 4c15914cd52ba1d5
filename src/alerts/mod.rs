//! Alert routing and delivery
//!
//! Escalated alerts are formatted once, routed by priority and fanned out
//! to the notification channels, with a local fallback when none succeeds.

pub mod channels;
mod dispatch;
mod fallback;
mod message;
mod router;

pub use channels::{build_sender, senders_from_config, ChannelId, ChannelSender};
pub use dispatch::{DispatchReport, Dispatcher};
pub use fallback::{FallbackRecord, FallbackSink, JsonlFallback, MemoryFallback};
pub use message::{AlertMessage, Marker};
pub use router::RoutingTable;
