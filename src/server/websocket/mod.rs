//! WebSocket transport for the notification feed and queue control.

pub mod handler;
pub mod messages;

pub use handler::ws_handler;
