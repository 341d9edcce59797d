/// x11session - A minimal X11 client session
///
/// This library opens a connection to an X11 display server, creates a
/// window with a graphics context, and runs a blocking loop dispatching the
/// events the window selected. Display servers are reached through
/// interchangeable backends (the built-in wire codec, `x11rb`, or an
/// in-memory mock).

pub mod backend;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod session;

pub use backend::{Connector, DisplayServer};
pub use error::{ConnectError, DisconnectError, ProtocolError, SessionError, SetupError};
pub use protocol::{Event, EventMask, GContext, Rectangle, Window};
pub use session::{
    ClientWindow, Connection, ControlFlow, DisplaySession, EventHandler, EventLoop,
    GraphicsContext, SessionConfig, SessionState, WindowSpec,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version
pub const PROTOCOL_MAJOR: u16 = protocol::PROTOCOL_MAJOR_VERSION;
pub const PROTOCOL_MINOR: u16 = protocol::PROTOCOL_MINOR_VERSION;
