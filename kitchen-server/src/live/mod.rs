//! 实时推送
//!
//! - [`LiveHub`] - 在线查看端注册与广播
//! - [`ws`] - WebSocket 端点

pub mod hub;
pub mod ws;

pub use hub::{ChannelViewer, LiveHub, ViewerConnection};
