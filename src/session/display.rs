//! The demo session: connect, configure one window, run the loop, tear down

use super::{Connection, ErrorHandler, EventHandler, EventLoop, WindowSpec};
use crate::backend::{Connector, DisplayServer};
use crate::error::{ConnectError, SessionError, SessionResult};
use crate::protocol::{EventMask, Rectangle};
use std::thread;
use std::time::Duration;

/// Session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Display name, `$DISPLAY` when `None`
    pub display: Option<String>,
    pub geometry: Rectangle,
    pub border_width: u16,
    pub title: Option<String>,
    pub event_mask: EventMask,
    /// Total connection attempts, at least one is always made
    pub connect_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            display: None,
            geometry: Rectangle::new(200, 300, 350, 250),
            border_width: 5,
            title: Some("Hello X11".to_string()),
            event_mask: EventMask::BUTTON_PRESS | EventMask::KEY_PRESS | EventMask::EXPOSURE,
            connect_attempts: 1,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connected,
    Configured,
    Running,
    Terminated,
}

/// Drives one connection through its whole lifecycle
pub struct DisplaySession<C: Connector> {
    connector: C,
    config: SessionConfig,
    state: SessionState,
    error_handler: Option<ErrorHandler>,
    dispatched: u64,
}

impl<C: Connector> DisplaySession<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        DisplaySession {
            connector,
            config,
            state: SessionState::Idle,
            error_handler: None,
            dispatched: 0,
        }
    }

    /// Install the error handler the next connection will use
    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Events dispatched by the last run
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    fn enter(&mut self, state: SessionState) {
        log::debug!("Session {} -> {}", self.state.name(), state.name());
        self.state = state;
    }

    /// Connect, retrying up to the configured number of attempts
    pub fn connect(&mut self) -> Result<Connection<C::Server>, ConnectError> {
        let attempts = self.config.connect_attempts.max(1);
        let display = self.config.display.as_deref();
        let mut attempt = 1;

        let server = loop {
            log::info!("Opening display (attempt {}/{})", attempt, attempts);
            match self.connector.connect(display) {
                Ok(server) => break server,
                Err(e) if attempt < attempts && is_transient(&e) => {
                    log::warn!("{}; retrying in {:?}", e, self.config.retry_delay);
                    thread::sleep(self.config.retry_delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        };

        let mut conn = Connection::new(server);
        if let Some(handler) = self.error_handler.take() {
            conn = conn.with_error_handler(handler);
        }
        self.enter(SessionState::Connected);
        Ok(conn)
    }

    /// Run the whole session with `handler` receiving events.
    ///
    /// Window and context are released before the connection is closed,
    /// whether the loop ends normally or not.
    pub fn run<H: EventHandler + ?Sized>(&mut self, handler: &mut H) -> SessionResult<()> {
        let conn = match self.connect() {
            Ok(conn) => conn,
            Err(e) => {
                self.enter(SessionState::Terminated);
                return Err(e.into());
            }
        };
        let outcome = self.configure_and_loop(&conn, handler);
        self.enter(SessionState::Terminated);

        let closed = conn.disconnect();
        match (outcome, closed) {
            (Err(e), Err(close)) => {
                log::warn!("Disconnect after failure also failed: {}", close);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(close)) => Err(close.into()),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    fn configure_and_loop<S, H>(&mut self, conn: &Connection<S>, handler: &mut H) -> SessionResult<()>
    where
        S: DisplayServer,
        H: EventHandler + ?Sized,
    {
        let screen = conn.screen().clone();
        log::info!(
            "Proto version {}.{}, screen {} ({}x{}), black=0x{:x} white=0x{:x}",
            conn.info().protocol_major_version,
            conn.info().protocol_minor_version,
            conn.info().screen_number,
            screen.width_in_pixels,
            screen.height_in_pixels,
            screen.black_pixel,
            screen.white_pixel
        );

        let mut spec = WindowSpec::new(self.config.geometry, self.config.border_width)
            .colors(screen.black_pixel, screen.white_pixel);
        spec.title = self.config.title.clone();

        let window = conn.create_window(&spec)?;
        let _gc = window.create_gc(screen.black_pixel, screen.white_pixel)?;
        window.select_events(self.config.event_mask)?;
        window.map_and_raise()?;
        conn.flush()?;
        self.enter(SessionState::Configured);

        let mut events = EventLoop::new(conn);
        self.enter(SessionState::Running);
        let result = events.run(handler);
        self.dispatched = events.dispatched();
        result
    }
}

/// Whether another attempt could succeed
fn is_transient(err: &ConnectError) -> bool {
    matches!(
        err,
        ConnectError::Unreachable { .. } | ConnectError::Refused { .. }
    )
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connected => "connected",
            SessionState::Configured => "configured",
            SessionState::Running => "running",
            SessionState::Terminated => "terminated",
        }
    }
}
