//! Session core
//!
//! A [`Connection`] owns the display-server link. Windows and graphics
//! contexts are guards that borrow it, so they are released before the
//! connection can be closed, and a context before the window it draws on.

mod dispatch;
mod display;
mod hints;

pub use dispatch::*;
pub use display::*;
pub use hints::*;

use crate::backend::{Connector, DisplayServer, Incoming, RequestError, ScreenInfo, ServerInfo, WindowParams};
use crate::error::{ConnectError, DisconnectError, SetupError};
use crate::protocol::*;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::io;

/// What an error handler is told about an asynchronous error
#[derive(Debug)]
pub struct ErrorContext<'a> {
    pub display: &'a str,
    pub error: &'a X11Error,
}

/// Receives asynchronous errors reported by the server
pub type ErrorHandler = Box<dyn FnMut(&ErrorContext<'_>, &str)>;

impl RequestError {
    fn into_setup(self, operation: &'static str) -> SetupError {
        match self {
            RequestError::Rejected(error) => SetupError::rejected(operation, error),
            RequestError::IdsExhausted => SetupError::IdsExhausted,
            RequestError::Io(source) => SetupError::transport(operation, source),
        }
    }
}

/// An open link to a display server
pub struct Connection<S: DisplayServer> {
    server: RefCell<S>,
    info: ServerInfo,
    error_handler: RefCell<Option<ErrorHandler>>,
    async_errors: Cell<usize>,
    closed: Cell<bool>,
}

impl<S: DisplayServer> Connection<S> {
    pub fn new(server: S) -> Self {
        let info = server.info().clone();
        log::info!(
            "Connected to {} via {} backend (protocol {}.{}, vendor {:?})",
            info.display,
            server.backend_name(),
            info.protocol_major_version,
            info.protocol_minor_version,
            info.vendor
        );
        Connection {
            server: RefCell::new(server),
            info,
            error_handler: RefCell::new(None),
            async_errors: Cell::new(0),
            closed: Cell::new(false),
        }
    }

    pub fn connect<C>(connector: &C, display: Option<&str>) -> Result<Self, ConnectError>
    where
        C: Connector<Server = S>,
    {
        connector.connect(display).map(Connection::new)
    }

    /// Route asynchronous errors to `handler`, replacing any previous one
    pub fn set_error_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&ErrorContext<'_>, &str) + 'static,
    {
        *self.error_handler.get_mut() = Some(Box::new(handler));
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        *self.error_handler.get_mut() = Some(handler);
        self
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Protocol version and revision the server speaks
    pub fn protocol_version(&self) -> (u16, u16) {
        (
            self.info.protocol_major_version,
            self.info.protocol_minor_version,
        )
    }

    pub fn screen(&self) -> &ScreenInfo {
        &self.info.screen
    }

    pub fn backend_name(&self) -> &'static str {
        self.server.borrow().backend_name()
    }

    /// Asynchronous errors seen so far
    pub fn async_errors(&self) -> usize {
        self.async_errors.get()
    }

    /// Create a window. The window is destroyed when the guard drops.
    pub fn create_window(&self, spec: &WindowSpec) -> Result<ClientWindow<'_, S>, SetupError> {
        let params = WindowParams {
            parent: spec.parent.unwrap_or(self.info.screen.root),
            geometry: spec.geometry,
            border_width: spec.border_width,
            border_pixel: spec.border_pixel.unwrap_or(self.info.screen.black_pixel),
            background_pixel: spec
                .background_pixel
                .unwrap_or(self.info.screen.white_pixel),
            event_mask: EventMask::empty(),
        };
        let id = self
            .server
            .borrow_mut()
            .create_window(&params)
            .map_err(|e| e.into_setup("CreateWindow"))?;
        log::info!("Created window {} at {}", id, spec.geometry);

        let window = ClientWindow {
            conn: self,
            id,
            geometry: spec.geometry,
            event_mask: Cell::new(EventMask::empty()),
        };
        window.set_size_hints(&SizeHints::program(spec.geometry))?;
        if let Some(title) = &spec.title {
            window.set_title(title)?;
        }
        Ok(window)
    }

    pub fn flush(&self) -> io::Result<()> {
        self.server.borrow_mut().flush()
    }

    /// Block until the server sends something
    pub(crate) fn next_incoming(&self) -> io::Result<Incoming> {
        self.server.borrow_mut().wait_for_incoming()
    }

    /// Hand an asynchronous error to the handler.
    ///
    /// Without a handler the error is logged and the session continues.
    pub fn report_error(&self, error: &X11Error) {
        self.async_errors.set(self.async_errors.get() + 1);
        let message = error.to_string();
        match self.error_handler.borrow_mut().as_mut() {
            Some(handler) => handler(
                &ErrorContext {
                    display: &self.info.display,
                    error,
                },
                &message,
            ),
            None => log::error!("{}: {}", self.info.display, message),
        }
    }

    /// Close the link.
    ///
    /// Takes the connection by value, so no window or context borrowed from
    /// it can still be alive.
    pub fn disconnect(self) -> Result<(), DisconnectError> {
        self.closed.set(true);
        let result = self.server.borrow_mut().close();
        match &result {
            Ok(()) => log::info!("Disconnected from {}", self.info.display),
            Err(e) => log::error!("Disconnect from {} failed: {}", self.info.display, e),
        }
        result
    }

    fn with_server<F>(&self, what: &str, f: F)
    where
        F: FnOnce(&mut S) -> io::Result<()>,
    {
        match self.server.try_borrow_mut() {
            Ok(mut server) => {
                if let Err(e) = f(&mut *server) {
                    log::warn!("{} failed: {}", what, e);
                }
            }
            Err(_) => log::warn!("{} skipped: connection busy", what),
        }
    }
}

impl<S: DisplayServer> Drop for Connection<S> {
    fn drop(&mut self) {
        if !self.closed.get() {
            if let Err(e) = self.server.get_mut().close() {
                log::warn!("Closing {} on drop failed: {}", self.info.display, e);
            }
        }
    }
}

impl<S: DisplayServer> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("info", &self.info)
            .field("async_errors", &self.async_errors.get())
            .finish()
    }
}

/// How to create a window.
///
/// Geometry is a request; the window manager may place or size the window
/// differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    /// Parent window, the screen's root when `None`
    pub parent: Option<Window>,
    pub geometry: Rectangle,
    pub border_width: u16,
    /// Border colour, the screen's black pixel when `None`
    pub border_pixel: Option<u32>,
    /// Background colour, the screen's white pixel when `None`
    pub background_pixel: Option<u32>,
    pub title: Option<String>,
}

impl WindowSpec {
    pub fn new(geometry: Rectangle, border_width: u16) -> Self {
        WindowSpec {
            parent: None,
            geometry,
            border_width,
            border_pixel: None,
            background_pixel: None,
            title: None,
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn parent(mut self, parent: Window) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn colors(mut self, border_pixel: u32, background_pixel: u32) -> Self {
        self.border_pixel = Some(border_pixel);
        self.background_pixel = Some(background_pixel);
        self
    }
}

/// A window owned by this client; destroyed on drop
pub struct ClientWindow<'c, S: DisplayServer> {
    conn: &'c Connection<S>,
    id: Window,
    geometry: Rectangle,
    event_mask: Cell<EventMask>,
}

impl<'c, S: DisplayServer> ClientWindow<'c, S> {
    pub fn id(&self) -> Window {
        self.id
    }

    /// Geometry that was requested at creation
    pub fn requested_geometry(&self) -> Rectangle {
        self.geometry
    }

    pub fn event_mask(&self) -> EventMask {
        self.event_mask.get()
    }

    pub fn connection(&self) -> &'c Connection<S> {
        self.conn
    }

    /// Replace the set of events delivered for this window
    pub fn select_events(&self, mask: EventMask) -> Result<(), SetupError> {
        self.conn
            .server
            .borrow_mut()
            .select_input(self.id, mask)
            .map_err(|e| e.into_setup("ChangeWindowAttributes"))?;
        self.event_mask.set(mask);
        log::debug!("Window {} selects {:?}", self.id, mask);
        Ok(())
    }

    /// Ask for the window to be shown on top.
    ///
    /// Visibility is only confirmed by a later Expose event.
    pub fn map_and_raise(&self) -> Result<(), SetupError> {
        self.conn
            .server
            .borrow_mut()
            .map_raised(self.id)
            .map_err(|e| e.into_setup("MapWindow"))?;
        log::info!("Mapped window {}", self.id);
        Ok(())
    }

    pub fn set_title(&self, title: &str) -> Result<(), SetupError> {
        self.conn
            .server
            .borrow_mut()
            .change_property(self.id, Atom::WM_NAME, Atom::STRING, 8, title.as_bytes())
            .map_err(|e| e.into_setup("ChangeProperty"))
    }

    pub fn set_size_hints(&self, hints: &SizeHints) -> Result<(), SetupError> {
        self.conn
            .server
            .borrow_mut()
            .change_property(
                self.id,
                Atom::WM_NORMAL_HINTS,
                Atom::WM_SIZE_HINTS,
                32,
                &hints.to_property(),
            )
            .map_err(|e| e.into_setup("ChangeProperty"))
    }

    /// Create a graphics context drawing on this window, freed on drop
    pub fn create_gc(
        &self,
        foreground: u32,
        background: u32,
    ) -> Result<GraphicsContext<'_, 'c, S>, SetupError> {
        let id = self
            .conn
            .server
            .borrow_mut()
            .create_gc(self.id, foreground, background)
            .map_err(|e| e.into_setup("CreateGC"))?;
        log::debug!("Created GC {} for window {}", id, self.id);
        Ok(GraphicsContext { window: self, id })
    }
}

impl<S: DisplayServer> Drop for ClientWindow<'_, S> {
    fn drop(&mut self) {
        let id = self.id;
        log::debug!("Destroying window {}", id);
        self.conn
            .with_server("DestroyWindow", |server| server.destroy_window(id));
    }
}

impl<S: DisplayServer> fmt::Debug for ClientWindow<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientWindow")
            .field("id", &self.id)
            .field("geometry", &self.geometry)
            .field("event_mask", &self.event_mask.get())
            .finish()
    }
}

/// Drawing state bound to one window; freed on drop
pub struct GraphicsContext<'w, 'c, S: DisplayServer> {
    window: &'w ClientWindow<'c, S>,
    id: GContext,
}

impl<S: DisplayServer> GraphicsContext<'_, '_, S> {
    pub fn id(&self) -> GContext {
        self.id
    }

    pub fn window(&self) -> Window {
        self.window.id
    }
}

impl<S: DisplayServer> Drop for GraphicsContext<'_, '_, S> {
    fn drop(&mut self) {
        let id = self.id;
        log::debug!("Freeing GC {}", id);
        self.window
            .conn
            .with_server("FreeGC", |server| server.free_gc(id));
    }
}

impl<S: DisplayServer> fmt::Debug for GraphicsContext<'_, '_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsContext")
            .field("id", &self.id)
            .field("window", &self.window.id)
            .finish()
    }
}
