/*
[INPUT]:  Relay URL, idle timeout and subscription channels
[OUTPUT]: Real-time market events and per-frame errors
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new control frames or changing connection logic
*/

pub mod client;
pub mod message;

pub use client::{STREAM_URL, StreamConfig, StreamConnection, StreamState};
pub use message::Event;
