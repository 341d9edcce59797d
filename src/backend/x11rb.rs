//! x11rb backend - transport, authorization and id allocation from `x11rb`
//!
//! Raw events are handed to this crate's own decoder, so dispatch behaves
//! exactly as with the wire backend.

use super::*;
use crate::error::{ConnectError, DisconnectError};
use crate::protocol::{Atom, Event, EventMask, GContext, Window, X11Error};
use std::io;
use ::x11rb::connection::Connection as _;
use ::x11rb::cookie::VoidCookie;
use ::x11rb::errors::{ConnectionError, ReplyError, ReplyOrIdError};
use ::x11rb::protocol::xproto::{self, ConnectionExt as _};
use ::x11rb::rust_connection::RustConnection;
use ::x11rb::wrapper::ConnectionExt as _;

pub struct X11rbServer {
    conn: RustConnection,
    info: ServerInfo,
}

fn io_error(err: ConnectionError) -> io::Error {
    match err {
        ConnectionError::IoError(err) => err,
        other => io::Error::new(io::ErrorKind::Other, other),
    }
}

fn convert_error(err: ::x11rb::x11_utils::X11Error) -> X11Error {
    X11Error {
        code: err.error_code,
        sequence: err.sequence,
        bad_value: err.bad_value,
        minor_opcode: err.minor_opcode,
        major_opcode: err.major_opcode,
    }
}

impl From<ReplyError> for RequestError {
    fn from(err: ReplyError) -> Self {
        match err {
            ReplyError::X11Error(err) => RequestError::Rejected(convert_error(err)),
            ReplyError::ConnectionError(err) => RequestError::Io(io_error(err)),
        }
    }
}

impl From<ReplyOrIdError> for RequestError {
    fn from(err: ReplyOrIdError) -> Self {
        match err {
            ReplyOrIdError::IdsExhausted => RequestError::IdsExhausted,
            ReplyOrIdError::X11Error(err) => RequestError::Rejected(convert_error(err)),
            ReplyOrIdError::ConnectionError(err) => RequestError::Io(io_error(err)),
        }
    }
}

impl From<ConnectionError> for RequestError {
    fn from(err: ConnectionError) -> Self {
        RequestError::Io(io_error(err))
    }
}

fn check(cookie: Result<VoidCookie<'_, RustConnection>, ConnectionError>) -> RequestResult<()> {
    cookie?.check()?;
    Ok(())
}

impl X11rbServer {
    pub fn connect(display: Option<&str>) -> Result<Self, ConnectError> {
        let name = display
            .map(str::to_string)
            .or_else(|| std::env::var("DISPLAY").ok())
            .filter(|name| !name.is_empty())
            .ok_or(ConnectError::NoDisplay)?;

        let (conn, screen_number) =
            RustConnection::connect(Some(&name)).map_err(|err| connect_error(&name, err))?;

        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_number)
            .ok_or_else(|| ConnectError::NoSuchScreen {
                display: name.clone(),
                screen: screen_number,
            })?;
        let info = ServerInfo {
            display: name.clone(),
            protocol_major_version: setup.protocol_major_version,
            protocol_minor_version: setup.protocol_minor_version,
            release_number: setup.release_number,
            vendor: String::from_utf8_lossy(&setup.vendor).to_string(),
            screen_number,
            screen: ScreenInfo {
                root: Window::new(screen.root),
                root_visual: crate::protocol::VisualID::new(screen.root_visual),
                root_depth: screen.root_depth,
                default_colormap: crate::protocol::Colormap::new(screen.default_colormap),
                white_pixel: screen.white_pixel,
                black_pixel: screen.black_pixel,
                width_in_pixels: screen.width_in_pixels,
                height_in_pixels: screen.height_in_pixels,
            },
        };
        log::debug!("x11rb connected to {} (screen {})", name, screen_number);

        Ok(X11rbServer { conn, info })
    }
}

fn connect_error(display: &str, err: ::x11rb::errors::ConnectError) -> ConnectError {
    use ::x11rb::errors::ConnectError as E;
    match err {
        E::DisplayParsingError(_) => ConnectError::InvalidDisplay(display.to_string()),
        E::SetupFailed(failed) => ConnectError::Refused {
            display: display.to_string(),
            reason: String::from_utf8_lossy(&failed.reason).trim_end().to_string(),
        },
        E::SetupAuthenticate(auth) => ConnectError::AuthenticationRequired {
            display: display.to_string(),
            reason: String::from_utf8_lossy(&auth.reason).trim_end().to_string(),
        },
        E::IoError(source) => ConnectError::Unreachable {
            display: display.to_string(),
            source,
        },
        other => ConnectError::Unreachable {
            display: display.to_string(),
            source: io::Error::new(io::ErrorKind::Other, other.to_string()),
        },
    }
}

impl DisplayServer for X11rbServer {
    fn backend_name(&self) -> &'static str {
        "x11rb"
    }

    fn info(&self) -> &ServerInfo {
        &self.info
    }

    fn create_window(&mut self, params: &WindowParams) -> RequestResult<Window> {
        let window = self.conn.generate_id()?;
        let mut aux = xproto::CreateWindowAux::new()
            .background_pixel(params.background_pixel)
            .border_pixel(params.border_pixel);
        if !params.event_mask.is_empty() {
            aux = aux.event_mask(xproto::EventMask::from(params.event_mask.bits()));
        }
        check(self.conn.create_window(
            ::x11rb::COPY_DEPTH_FROM_PARENT,
            window,
            params.parent.id().get(),
            params.geometry.x,
            params.geometry.y,
            params.geometry.width,
            params.geometry.height,
            params.border_width,
            xproto::WindowClass::INPUT_OUTPUT,
            ::x11rb::COPY_FROM_PARENT,
            &aux,
        ))?;
        Ok(Window::new(window))
    }

    fn create_gc(
        &mut self,
        drawable: Window,
        foreground: u32,
        background: u32,
    ) -> RequestResult<GContext> {
        let gc = self.conn.generate_id()?;
        let aux = xproto::CreateGCAux::new()
            .foreground(foreground)
            .background(background);
        check(self.conn.create_gc(gc, drawable.id().get(), &aux))?;
        Ok(GContext::new(gc))
    }

    fn change_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: &[u8],
    ) -> RequestResult<()> {
        let window = window.id().get();
        match format {
            32 => {
                let items: Vec<u32> = data
                    .chunks_exact(4)
                    .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                check(self.conn.change_property32(
                    xproto::PropMode::REPLACE,
                    window,
                    property.get(),
                    type_.get(),
                    &items,
                ))
            }
            16 => {
                let items: Vec<u16> = data
                    .chunks_exact(2)
                    .map(|c| u16::from_ne_bytes([c[0], c[1]]))
                    .collect();
                check(self.conn.change_property16(
                    xproto::PropMode::REPLACE,
                    window,
                    property.get(),
                    type_.get(),
                    &items,
                ))
            }
            _ => check(self.conn.change_property8(
                xproto::PropMode::REPLACE,
                window,
                property.get(),
                type_.get(),
                data,
            )),
        }
    }

    fn select_input(&mut self, window: Window, mask: EventMask) -> RequestResult<()> {
        let aux =
            xproto::ChangeWindowAttributesAux::new().event_mask(xproto::EventMask::from(mask.bits()));
        check(self.conn.change_window_attributes(window.id().get(), &aux))
    }

    fn map_raised(&mut self, window: Window) -> RequestResult<()> {
        let window = window.id().get();
        let aux = xproto::ConfigureWindowAux::new().stack_mode(xproto::StackMode::ABOVE);
        let restack = self.conn.configure_window(window, &aux)?;
        let map = self.conn.map_window(window)?;
        restack.check()?;
        map.check()?;
        Ok(())
    }

    fn destroy_window(&mut self, window: Window) -> io::Result<()> {
        // Dropping the cookie routes any error to the event queue
        self.conn.destroy_window(window.id().get()).map_err(io_error)?;
        Ok(())
    }

    fn free_gc(&mut self, gc: GContext) -> io::Result<()> {
        self.conn.free_gc(gc.id().get()).map_err(io_error)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.conn.flush().map_err(io_error)
    }

    fn wait_for_incoming(&mut self) -> io::Result<Incoming> {
        let packet = self.conn.wait_for_raw_event().map_err(io_error)?;
        if packet.first() == Some(&0) {
            Ok(Incoming::Error(X11Error::parse(&packet)?))
        } else {
            Ok(Incoming::Event(Event::parse(&packet)?))
        }
    }

    fn close(&mut self) -> Result<(), DisconnectError> {
        self.conn.flush().map_err(|err| DisconnectError::from_io(&io_error(err)))
    }
}

/// Connects through `x11rb`
#[derive(Debug, Clone, Copy, Default)]
pub struct X11rbConnector;

impl Connector for X11rbConnector {
    type Server = X11rbServer;

    fn connect(&self, display: Option<&str>) -> Result<X11rbServer, ConnectError> {
        X11rbServer::connect(display)
    }
}
