//! Mock backend - an in-memory display server
//!
//! Incoming items are scripted through a [`MockHandle`], which shares state
//! with every server its connector hands out. Delivery honours each window's
//! selected event mask the way a real server does, and every request is
//! recorded for inspection. An empty queue behaves like a closed transport.

use super::*;
use crate::error::{ConnectError, DisconnectError};
use crate::protocol::*;
use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::rc::Rc;

/// A request the mock server received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    CreateWindow {
        window: Window,
        params: WindowParams,
    },
    CreateGC {
        gc: GContext,
        drawable: Window,
        foreground: u32,
        background: u32,
    },
    ChangeProperty {
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: Vec<u8>,
    },
    SelectInput {
        window: Window,
        mask: EventMask,
    },
    MapRaised(Window),
    DestroyWindow(Window),
    FreeGC(GContext),
    Close,
}

impl Recorded {
    /// Core request this corresponds to, used for rejection rules
    pub fn opcode(&self) -> Option<RequestOpcode> {
        Some(match self {
            Recorded::CreateWindow { .. } => RequestOpcode::CreateWindow,
            Recorded::CreateGC { .. } => RequestOpcode::CreateGC,
            Recorded::ChangeProperty { .. } => RequestOpcode::ChangeProperty,
            Recorded::SelectInput { .. } => RequestOpcode::ChangeWindowAttributes,
            Recorded::MapRaised(_) => RequestOpcode::MapWindow,
            Recorded::DestroyWindow(_) => RequestOpcode::DestroyWindow,
            Recorded::FreeGC(_) => RequestOpcode::FreeGC,
            Recorded::Close => return None,
        })
    }
}

#[derive(Debug)]
struct MockState {
    info: ServerInfo,
    ids: IdAllocator,
    sequence: u16,
    windows: HashMap<Window, EventMask>,
    gcs: Vec<GContext>,
    queue: VecDeque<Incoming>,
    requests: Vec<Recorded>,
    reject: HashMap<RequestOpcode, ErrorCode>,
    close_failure: Option<(u8, Option<i32>)>,
    refuse_connects: u32,
    connects: u32,
    filtered: usize,
}

/// Scripting side of the mock server
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Rc<RefCell<MockState>>,
}

impl MockHandle {
    /// Mock server announcing protocol `major.minor` with one screen
    pub fn new(major: u16, minor: u16) -> Self {
        let setup = sample_setup(major, minor);
        let info = ServerInfo {
            display: ":0".to_string(),
            protocol_major_version: major,
            protocol_minor_version: minor,
            release_number: setup.release_number,
            vendor: setup.vendor.clone(),
            screen_number: 0,
            screen: ScreenInfo::from_setup(&sample_screen()),
        };
        MockHandle {
            state: Rc::new(RefCell::new(MockState {
                info,
                ids: IdAllocator::new(setup.resource_id_base, setup.resource_id_mask),
                sequence: 0,
                windows: HashMap::new(),
                gcs: Vec::new(),
                queue: VecDeque::new(),
                requests: Vec::new(),
                reject: HashMap::new(),
                close_failure: None,
                refuse_connects: 0,
                connects: 0,
                filtered: 0,
            })),
        }
    }

    /// Queue an event for delivery
    pub fn push_event(&self, event: Event) {
        self.state.borrow_mut().queue.push_back(Incoming::Event(event));
    }

    /// Queue an asynchronous error for delivery
    pub fn push_error(&self, error: X11Error) {
        self.state.borrow_mut().queue.push_back(Incoming::Error(error));
    }

    /// Reject every future request with `opcode` using `code`
    pub fn reject(&self, opcode: RequestOpcode, code: ErrorCode) {
        self.state.borrow_mut().reject.insert(opcode, code);
    }

    /// Make the close handshake fail with the given status and errno
    pub fn fail_close(&self, status: u8, os_error: Option<i32>) {
        self.state.borrow_mut().close_failure = Some((status, os_error));
    }

    /// Refuse the next `count` connection attempts
    pub fn refuse_connects(&self, count: u32) {
        self.state.borrow_mut().refuse_connects = count;
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.borrow().requests.clone()
    }

    /// Successful connection attempts so far
    pub fn connects(&self) -> u32 {
        self.state.borrow().connects
    }

    /// Current event mask of `window`, if it exists
    pub fn event_mask(&self, window: Window) -> Option<EventMask> {
        self.state.borrow().windows.get(&window).copied()
    }

    /// Windows that are still alive on the server
    pub fn live_windows(&self) -> usize {
        self.state.borrow().windows.len()
    }

    /// GCs that are still alive on the server
    pub fn live_gcs(&self) -> usize {
        self.state.borrow().gcs.len()
    }

    /// Events dropped because no window selected them
    pub fn filtered(&self) -> usize {
        self.state.borrow().filtered
    }

    pub fn queued(&self) -> usize {
        self.state.borrow().queue.len()
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            handle: self.clone(),
        }
    }

    pub fn server(&self) -> MockServer {
        MockServer {
            handle: self.clone(),
            info: self.state.borrow().info.clone(),
            open: true,
        }
    }
}

impl MockState {
    /// Record a request; a rejection rule turns it into an X11 error
    fn record(&mut self, request: Recorded, bad_value: u32) -> RequestResult<()> {
        self.sequence = self.sequence.wrapping_add(1);
        let opcode = request.opcode();
        self.requests.push(request);
        match opcode.and_then(|op| self.reject.get(&op).map(|code| (op, *code))) {
            Some((op, code)) => Err(RequestError::Rejected(X11Error::new(
                code,
                self.sequence,
                bad_value,
                op as u8,
            ))),
            None => Ok(()),
        }
    }

    fn window_exists(&self, window: Window) -> RequestResult<()> {
        if self.windows.contains_key(&window) || window == self.info.screen.root {
            Ok(())
        } else {
            Err(RequestError::Rejected(X11Error::new(
                ErrorCode::Window,
                self.sequence,
                window.id().get(),
                0,
            )))
        }
    }

    /// Whether the server would deliver `event` to this client
    fn selected(&self, event: &Event) -> bool {
        let mask = match event.event_type().and_then(|kind| kind.selecting_mask()) {
            Some(mask) => mask,
            None => return true,
        };
        match event.window() {
            Some(window) => self
                .windows
                .get(&window)
                .map(|selected| selected.contains(mask))
                .unwrap_or(false),
            None => self.windows.values().any(|selected| selected.contains(mask)),
        }
    }
}

/// Server side of a mock connection
#[derive(Debug)]
pub struct MockServer {
    handle: MockHandle,
    info: ServerInfo,
    open: bool,
}

impl MockServer {
    pub fn handle(&self) -> &MockHandle {
        &self.handle
    }

    fn state(&self) -> RefMut<'_, MockState> {
        self.handle.state.borrow_mut()
    }

    fn ensure_open(&self) -> io::Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "connection closed"))
        }
    }
}

impl DisplayServer for MockServer {
    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn info(&self) -> &ServerInfo {
        &self.info
    }

    fn create_window(&mut self, params: &WindowParams) -> RequestResult<Window> {
        self.ensure_open()?;
        let mut state = self.state();
        state.window_exists(params.parent)?;
        let window = Window(state.ids.generate().ok_or(RequestError::IdsExhausted)?);
        state.record(
            Recorded::CreateWindow {
                window,
                params: params.clone(),
            },
            window.id().get(),
        )?;
        state.windows.insert(window, params.event_mask);
        Ok(window)
    }

    fn create_gc(
        &mut self,
        drawable: Window,
        foreground: u32,
        background: u32,
    ) -> RequestResult<GContext> {
        self.ensure_open()?;
        let mut state = self.state();
        state.window_exists(drawable)?;
        let gc = GContext(state.ids.generate().ok_or(RequestError::IdsExhausted)?);
        state.record(
            Recorded::CreateGC {
                gc,
                drawable,
                foreground,
                background,
            },
            gc.id().get(),
        )?;
        state.gcs.push(gc);
        Ok(gc)
    }

    fn change_property(
        &mut self,
        window: Window,
        property: Atom,
        type_: Atom,
        format: u8,
        data: &[u8],
    ) -> RequestResult<()> {
        self.ensure_open()?;
        let mut state = self.state();
        state.window_exists(window)?;
        state.record(
            Recorded::ChangeProperty {
                window,
                property,
                type_,
                format,
                data: data.to_vec(),
            },
            property.get(),
        )
    }

    fn select_input(&mut self, window: Window, mask: EventMask) -> RequestResult<()> {
        self.ensure_open()?;
        let mut state = self.state();
        state.window_exists(window)?;
        state.record(Recorded::SelectInput { window, mask }, window.id().get())?;
        state.windows.insert(window, mask);
        Ok(())
    }

    fn map_raised(&mut self, window: Window) -> RequestResult<()> {
        self.ensure_open()?;
        let mut state = self.state();
        state.window_exists(window)?;
        state.record(Recorded::MapRaised(window), window.id().get())
    }

    fn destroy_window(&mut self, window: Window) -> io::Result<()> {
        self.ensure_open()?;
        let mut state = self.state();
        let sequence = state.sequence.wrapping_add(1);
        if state.record(Recorded::DestroyWindow(window), window.id().get()).is_err()
            || state.windows.remove(&window).is_none()
        {
            let error = X11Error::new(
                ErrorCode::Window,
                sequence,
                window.id().get(),
                RequestOpcode::DestroyWindow as u8,
            );
            state.queue.push_back(Incoming::Error(error));
        }
        Ok(())
    }

    fn free_gc(&mut self, gc: GContext) -> io::Result<()> {
        self.ensure_open()?;
        let mut state = self.state();
        let sequence = state.sequence.wrapping_add(1);
        let known = state.gcs.iter().position(|g| *g == gc);
        if state.record(Recorded::FreeGC(gc), gc.id().get()).is_err() || known.is_none() {
            let error = X11Error::new(
                ErrorCode::GContext,
                sequence,
                gc.id().get(),
                RequestOpcode::FreeGC as u8,
            );
            state.queue.push_back(Incoming::Error(error));
        }
        if let Some(index) = known {
            state.gcs.remove(index);
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()
    }

    fn wait_for_incoming(&mut self) -> io::Result<Incoming> {
        self.ensure_open()?;
        let mut state = self.state();
        while let Some(item) = state.queue.pop_front() {
            match item {
                Incoming::Event(event) if !state.selected(&event) => {
                    log::debug!("Mock server dropping unselected {:?}", event.event_type());
                    state.filtered += 1;
                }
                item => return Ok(item),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "mock server has no more events",
        ))
    }

    fn close(&mut self) -> Result<(), DisconnectError> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut state = self.state();
        state.requests.push(Recorded::Close);
        match state.close_failure {
            Some((status, os_error)) => Err(DisconnectError {
                status,
                os_error,
                message: "close handshake rejected".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Hands out [`MockServer`]s sharing one [`MockHandle`]
#[derive(Debug, Clone)]
pub struct MockConnector {
    handle: MockHandle,
}

impl Connector for MockConnector {
    type Server = MockServer;

    fn connect(&self, display: Option<&str>) -> Result<MockServer, ConnectError> {
        let name = display.unwrap_or(":0");
        let mut state = self.handle.state.borrow_mut();
        if state.refuse_connects > 0 {
            state.refuse_connects -= 1;
            return Err(ConnectError::Unreachable {
                display: name.to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock refused"),
            });
        }
        state.connects += 1;
        state.info.display = name.to_string();
        drop(state);
        Ok(self.handle.server())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expose(window: Window) -> Event {
        Event::Expose(ExposeEvent {
            sequence: 0,
            send_event: false,
            window,
            x: 0,
            y: 0,
            width: 350,
            height: 250,
            count: 0,
        })
    }

    fn params(root: Window, mask: EventMask) -> WindowParams {
        WindowParams {
            parent: root,
            geometry: Rectangle::new(200, 300, 350, 250),
            border_width: 5,
            border_pixel: 0,
            background_pixel: 0xffffff,
            event_mask: mask,
        }
    }

    #[test]
    fn test_unselected_events_are_dropped() {
        let handle = MockHandle::new(11, 0);
        let mut server = handle.server();
        let root = server.info().screen.root;
        let window = server.create_window(&params(root, EventMask::empty())).unwrap();

        handle.push_event(expose(window));
        assert!(server.wait_for_incoming().is_err());
        assert_eq!(handle.filtered(), 1);

        server.select_input(window, EventMask::EXPOSURE).unwrap();
        handle.push_event(expose(window));
        assert!(matches!(
            server.wait_for_incoming().unwrap(),
            Incoming::Event(Event::Expose(_))
        ));
    }

    #[test]
    fn test_select_input_replaces_mask() {
        let handle = MockHandle::new(11, 0);
        let mut server = handle.server();
        let root = server.info().screen.root;
        let window = server
            .create_window(&params(root, EventMask::KEY_PRESS | EventMask::EXPOSURE))
            .unwrap();
        server.select_input(window, EventMask::BUTTON_PRESS).unwrap();
        assert_eq!(handle.event_mask(window), Some(EventMask::BUTTON_PRESS));
    }

    #[test]
    fn test_rejection_rule() {
        let handle = MockHandle::new(11, 0);
        handle.reject(RequestOpcode::CreateGC, ErrorCode::Alloc);
        let mut server = handle.server();
        let root = server.info().screen.root;
        let window = server.create_window(&params(root, EventMask::empty())).unwrap();
        let err = server.create_gc(window, 0, 1).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Rejected(ref e) if e.error_code() == Some(ErrorCode::Alloc)
        ));
        assert_eq!(handle.live_gcs(), 0);
    }

    #[test]
    fn test_destroying_unknown_window_reports_async_error() {
        let handle = MockHandle::new(11, 0);
        let mut server = handle.server();
        server.destroy_window(Window::new(0x1234)).unwrap();
        match server.wait_for_incoming().unwrap() {
            Incoming::Error(e) => {
                assert_eq!(e.error_code(), Some(ErrorCode::Window));
                assert_eq!(e.bad_value, 0x1234);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_closed_server_refuses_requests() {
        let handle = MockHandle::new(11, 0);
        let mut server = handle.server();
        server.close().unwrap();
        assert!(server.flush().is_err());
        assert_eq!(handle.requests(), vec![Recorded::Close]);
    }

    #[test]
    fn test_connector_refusals() {
        let handle = MockHandle::new(11, 0);
        handle.refuse_connects(1);
        let connector = handle.connector();
        assert!(connector.connect(Some(":3")).is_err());
        let server = connector.connect(Some(":3")).unwrap();
        assert_eq!(server.info().display, ":3");
        assert_eq!(handle.connects(), 1);
    }
}
