//! Realtime notifications over websockets.
//!
//! Clients connect to `/ws`, authenticate with their session token and then
//! receive every notification addressed to them as it is created.

mod hub;
mod messages;
mod session;

pub use hub::{NotificationHub, PushSink};
pub use messages::{ClientMessage, Push, ServerMessage};
pub use session::{websocket_route, WebSocketSession};
