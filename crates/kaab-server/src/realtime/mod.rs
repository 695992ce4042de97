//! Realtime layer: presence, rooms, and the per-connection WebSocket session.

pub mod broker;
pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod session;

pub use broker::RoomBroker;
pub use connection::ClientConnection;
pub use dispatcher::{ChannelContext, ConnectionState, Dispatcher};
pub use registry::ConnectionRegistry;
pub use session::{SessionLimits, run_ws_session};
