//! Backend trait definition
//!
//! This module defines the traits every display-server backend implements.
//! The session core only talks to a server through [`DisplayServer`].

use crate::error::{ConnectError, DisconnectError};
use crate::protocol::*;
use std::io;
use thiserror::Error;

/// Why a checked request did not complete
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{0}")]
    Rejected(X11Error),

    #[error("resource ids exhausted")]
    IdsExhausted,

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type RequestResult<T> = Result<T, RequestError>;

/// Attributes of the screen a connection uses, fixed at connect time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenInfo {
    pub root: Window,
    pub root_visual: VisualID,
    pub root_depth: u8,
    pub default_colormap: Colormap,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
}

impl ScreenInfo {
    pub fn from_setup(screen: &Screen) -> Self {
        ScreenInfo {
            root: screen.root,
            root_visual: screen.root_visual,
            root_depth: screen.root_depth,
            default_colormap: screen.default_colormap,
            white_pixel: screen.white_pixel,
            black_pixel: screen.black_pixel,
            width_in_pixels: screen.width_in_pixels,
            height_in_pixels: screen.height_in_pixels,
        }
    }
}

/// What the server told us during setup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub display: String,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub vendor: String,
    pub screen_number: usize,
    pub screen: ScreenInfo,
}

impl ServerInfo {
    pub fn from_setup(display: &str, setup: &SetupSuccess, screen_number: usize) -> Option<Self> {
        let screen = setup.screen(screen_number)?;
        Some(ServerInfo {
            display: display.to_string(),
            protocol_major_version: setup.protocol_major_version,
            protocol_minor_version: setup.protocol_minor_version,
            release_number: setup.release_number,
            vendor: setup.vendor.clone(),
            screen_number,
            screen: ScreenInfo::from_setup(screen),
        })
    }
}

/// Parameters for creating a top-level window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowParams {
    pub parent: Window,
    pub geometry: Rectangle,
    pub border_width: u16,
    pub border_pixel: u32,
    pub background_pixel: u32,
    /// Initial event mask; `select_input` replaces it later
    pub event_mask: EventMask,
}

/// Something the server sent without being asked
#[derive(Debug, Clone)]
pub enum Incoming {
    Event(Event),
    Error(X11Error),
}

/// A live connection to a display server.
///
/// Setup requests are checked: they either complete or return the error the
/// server produced for them. Teardown requests are not; any error they cause
/// arrives later through [`DisplayServer::wait_for_incoming`].
pub trait DisplayServer {
    /// Short name of the backend, for logging
    fn backend_name(&self) -> &'static str;

    fn info(&self) -> &ServerInfo;

    fn create_window(&mut self, params: &WindowParams) -> RequestResult<Window>;

    fn create_gc(
        &mut self,
        drawable: Window,
        foreground: u32,
        background: u32,
    ) -> RequestResult<GContext>;

    /// Replace a property; `data` holds `format`-bit items in native order
    fn change_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: &[u8],
    ) -> RequestResult<()>;

    /// Replace the window's event mask
    fn select_input(&mut self, window: Window, mask: EventMask) -> RequestResult<()>;

    /// Raise the window to the top of the stack and map it
    fn map_raised(&mut self, window: Window) -> RequestResult<()>;

    fn destroy_window(&mut self, window: Window) -> io::Result<()>;

    fn free_gc(&mut self, gc: GContext) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;

    /// Block until the next event or asynchronous error arrives
    fn wait_for_incoming(&mut self) -> io::Result<Incoming>;

    /// Close the link. The server is unusable afterwards.
    fn close(&mut self) -> Result<(), DisconnectError>;
}

/// Opens connections for a backend
pub trait Connector {
    type Server: DisplayServer;

    /// Connect to `display`, or to `$DISPLAY` when `None`
    fn connect(&self, display: Option<&str>) -> Result<Self::Server, ConnectError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_info_from_setup() {
        let setup = sample_setup(11, 0);
        let info = ServerInfo::from_setup(":1", &setup, 0).unwrap();
        assert_eq!(info.protocol_major_version, 11);
        assert_eq!(info.protocol_minor_version, 0);
        assert_eq!(info.screen.root, Window::new(0x1e1));
        assert_eq!(info.screen.black_pixel, 0);
        assert!(ServerInfo::from_setup(":1", &setup, 1).is_none());
    }
}
