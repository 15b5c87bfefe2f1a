//! Frame channels between the client bridge and the executor
//!
//! Frames are encoded JSON strings. Nothing but strings crosses the boundary,
//! so the executor could equally live in another process.

use crate::config::ChannelConfig;

/// One encoded wire message
pub type Frame = String;

pub type FrameSender = tokio::sync::mpsc::Sender<Frame>;
pub type FrameReceiver = tokio::sync::mpsc::Receiver<Frame>;

/// Create bounded request channel (bridge → executor)
pub fn create_request_channel(config: &ChannelConfig) -> (FrameSender, FrameReceiver) {
    tokio::sync::mpsc::channel(config.request_buffer_size)
}

/// Create bounded response channel (executor → bridge)
pub fn create_response_channel(config: &ChannelConfig) -> (FrameSender, FrameReceiver) {
    tokio::sync::mpsc::channel(config.response_buffer_size)
}
