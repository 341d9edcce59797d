//! Wire backend - the crate's own protocol codec over a socket
//!
//! Requests are buffered and written out before any blocking read. Checked
//! requests are followed by a GetInputFocus round-trip: once its reply is in,
//! every error the server had for the requests before it has arrived too.

use super::*;
use crate::connection::{auth, DisplayTarget, Stream};
use crate::error::{ConnectError, DisconnectError};
use crate::protocol::*;
use byteorder::{ByteOrder as WireByteOrder, NativeEndian};
use std::collections::VecDeque;
use std::io::{self, Read, Write};

const REPLY: u8 = 1;
const ERROR: u8 = 0;
const GENERIC_EVENT: u8 = 35;

pub struct WireServer {
    stream: Stream,
    info: ServerInfo,
    ids: IdAllocator,
    out: Vec<u8>,
    sequence: u16,
    pending: VecDeque<Incoming>,
    closed: bool,
}

impl WireServer {
    /// Run the setup handshake on an open stream
    pub fn handshake(
        mut stream: Stream,
        display: &str,
        screen: usize,
        auth_name: &str,
        auth_data: &[u8],
    ) -> Result<Self, ConnectError> {
        let unreachable = |source: io::Error| ConnectError::Unreachable {
            display: display.to_string(),
            source,
        };

        let request = SetupRequest::new(auth_name, auth_data)
            .encode()
            .map_err(unreachable)?;
        stream.write_all(&request).map_err(unreachable)?;
        stream.flush().map_err(unreachable)?;
        log::debug!("Sent setup request ({} bytes)", request.len());

        let setup = match SetupResponse::read(&mut stream).map_err(unreachable)? {
            SetupResponse::Success(setup) => setup,
            SetupResponse::Failed(failed) => {
                return Err(ConnectError::Refused {
                    display: display.to_string(),
                    reason: failed.reason.trim_end().to_string(),
                })
            }
            SetupResponse::Authenticate(reason) => {
                return Err(ConnectError::AuthenticationRequired {
                    display: display.to_string(),
                    reason: reason.trim_end().to_string(),
                })
            }
        };

        log::debug!("Setup successful:");
        log::debug!("  Resource ID base: 0x{:08x}", setup.resource_id_base);
        log::debug!("  Resource ID mask: 0x{:08x}", setup.resource_id_mask);
        log::debug!("  Vendor: {}", setup.vendor);
        log::debug!("  Screens: {}", setup.roots.len());

        let info = ServerInfo::from_setup(display, &setup, screen).ok_or_else(|| {
            ConnectError::NoSuchScreen {
                display: display.to_string(),
                screen,
            }
        })?;

        Ok(WireServer {
            stream,
            info,
            ids: IdAllocator::new(setup.resource_id_base, setup.resource_id_mask),
            out: Vec::new(),
            sequence: 0,
            pending: VecDeque::new(),
            closed: false,
        })
    }

    /// Queue a request and return its sequence number
    fn send(&mut self, request: Vec<u8>) -> u16 {
        self.out.extend_from_slice(&request);
        self.sequence = self.sequence.wrapping_add(1);
        self.sequence
    }

    fn read_packet(&mut self) -> io::Result<Vec<u8>> {
        let mut packet = vec![0u8; 32];
        self.stream.read_exact(&mut packet)?;

        let extra = match packet[0] {
            REPLY => NativeEndian::read_u32(&packet[4..8]) as usize * 4,
            code if code & 0x7f == GENERIC_EVENT => {
                NativeEndian::read_u32(&packet[4..8]) as usize * 4
            }
            _ => 0,
        };
        if extra > 0 {
            packet.resize(32 + extra, 0);
            self.stream.read_exact(&mut packet[32..])?;
        }
        Ok(packet)
    }

    /// Send `requests`, then wait until the server has processed all of them.
    ///
    /// Events and unrelated errors seen meanwhile are queued in arrival order.
    fn checked(&mut self, requests: Vec<Vec<u8>>) -> RequestResult<()> {
        let sequences: Vec<u16> = requests.into_iter().map(|r| self.send(r)).collect();
        let sync = self.send(encode_get_input_focus());
        self.flush()?;

        let mut rejection = None;
        loop {
            let packet = self.read_packet()?;
            match packet[0] {
                ERROR => {
                    let error = X11Error::parse(&packet)?;
                    if rejection.is_none() && sequences.contains(&error.sequence) {
                        rejection = Some(error);
                    } else {
                        self.pending.push_back(Incoming::Error(error));
                    }
                }
                REPLY => {
                    let sequence = NativeEndian::read_u16(&packet[2..4]);
                    if sequence == sync {
                        break;
                    }
                    log::debug!("Discarding unexpected reply for sequence {}", sequence);
                }
                _ => self.pending.push_back(Incoming::Event(Event::parse(&packet)?)),
            }
        }

        match rejection {
            Some(error) => Err(RequestError::Rejected(error)),
            None => Ok(()),
        }
    }

    fn allocate(&mut self) -> RequestResult<XID> {
        self.ids.generate().ok_or(RequestError::IdsExhausted)
    }

    /// Number of incoming items read but not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl DisplayServer for WireServer {
    fn backend_name(&self) -> &'static str {
        "wire"
    }

    fn info(&self) -> &ServerInfo {
        &self.info
    }

    fn create_window(&mut self, params: &WindowParams) -> RequestResult<Window> {
        let window = Window(self.allocate()?);
        let request = CreateWindowRequest {
            depth: 0, // CopyFromParent
            wid: window,
            parent: params.parent,
            x: params.geometry.x,
            y: params.geometry.y,
            width: params.geometry.width,
            height: params.geometry.height,
            border_width: params.border_width,
            class: WindowClass::InputOutput,
            visual: VisualID::COPY_FROM_PARENT,
            background_pixel: Some(params.background_pixel),
            border_pixel: Some(params.border_pixel),
            event_mask: (!params.event_mask.is_empty()).then_some(params.event_mask),
        };
        self.checked(vec![request.encode()])?;
        Ok(window)
    }

    fn create_gc(
        &mut self,
        drawable: Window,
        foreground: u32,
        background: u32,
    ) -> RequestResult<GContext> {
        let gc = GContext(self.allocate()?);
        let request = CreateGCRequest {
            cid: gc,
            drawable,
            foreground: Some(foreground),
            background: Some(background),
        };
        self.checked(vec![request.encode()])?;
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
        let request = ChangePropertyRequest {
            mode: PropertyMode::Replace,
            window,
            property,
            type_,
            format,
            data: data.to_vec(),
        };
        self.checked(vec![request.encode()])
    }

    fn select_input(&mut self, window: Window, mask: EventMask) -> RequestResult<()> {
        let request = ChangeWindowAttributesRequest {
            window,
            background_pixel: None,
            event_mask: Some(mask),
        };
        self.checked(vec![request.encode()])
    }

    fn map_raised(&mut self, window: Window) -> RequestResult<()> {
        self.checked(vec![
            ConfigureWindowRequest::restack(window, StackMode::Above).encode(),
            encode_map_window(window),
        ])
    }

    fn destroy_window(&mut self, window: Window) -> io::Result<()> {
        self.send(encode_destroy_window(window));
        Ok(())
    }

    fn free_gc(&mut self, gc: GContext) -> io::Result<()> {
        self.send(encode_free_gc(gc));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.out.is_empty() {
            self.stream.write_all(&self.out)?;
            self.out.clear();
        }
        self.stream.flush()
    }

    fn wait_for_incoming(&mut self) -> io::Result<Incoming> {
        if let Some(item) = self.pending.pop_front() {
            return Ok(item);
        }
        self.flush()?;
        loop {
            let packet = self.read_packet()?;
            match packet[0] {
                ERROR => return Ok(Incoming::Error(X11Error::parse(&packet)?)),
                REPLY => log::debug!("Discarding reply outside a round-trip"),
                _ => return Ok(Incoming::Event(Event::parse(&packet)?)),
            }
        }
    }

    fn close(&mut self) -> Result<(), DisconnectError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.flush()
            .and_then(|_| self.stream.shutdown())
            .map_err(|e| DisconnectError::from_io(&e))
    }
}

/// Connects with the built-in codec
#[derive(Debug, Clone, Copy, Default)]
pub struct WireConnector;

impl Connector for WireConnector {
    type Server = WireServer;

    fn connect(&self, display: Option<&str>) -> Result<WireServer, ConnectError> {
        let target = DisplayTarget::resolve(display)?;
        let stream = target.open()?;
        let (auth_name, auth_data) = auth::lookup(&target, stream.peer_ipv4());
        WireServer::handshake(
            stream,
            &target.to_string(),
            target.screen,
            &auth_name,
            &auth_data,
        )
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;
    use std::thread;

    /// Minimal scripted server on the other end of a socket pair
    struct FakeServer {
        stream: UnixStream,
        sequence: u16,
    }

    impl FakeServer {
        fn accept_setup(&mut self, major: u16) {
            let mut header = [0u8; 12];
            self.stream.read_exact(&mut header).unwrap();
            let name_len = u16::from_ne_bytes([header[6], header[7]]) as usize;
            let data_len = u16::from_ne_bytes([header[8], header[9]]) as usize;
            let mut rest = vec![0u8; padded_len(name_len) + padded_len(data_len)];
            self.stream.read_exact(&mut rest).unwrap();
            sample_setup(major, 0).encode(&mut self.stream).unwrap();
        }

        fn read_request(&mut self) -> Vec<u8> {
            let mut header = [0u8; 4];
            self.stream.read_exact(&mut header).unwrap();
            let len = u16::from_ne_bytes([header[2], header[3]]) as usize * 4;
            let mut request = header.to_vec();
            request.resize(len, 0);
            self.stream.read_exact(&mut request[4..]).unwrap();
            self.sequence += 1;
            request
        }

        fn answer_sync(&mut self) {
            let request = self.read_request();
            assert_eq!(request[0], RequestOpcode::GetInputFocus as u8);
            let mut reply = [0u8; 32];
            reply[0] = REPLY;
            reply[2..4].copy_from_slice(&self.sequence.to_ne_bytes());
            self.stream.write_all(&reply).unwrap();
        }

        fn send_error(&mut self, code: ErrorCode, sequence: u16, major: u8) {
            let mut packet = [0u8; 32];
            packet[1] = code as u8;
            packet[2..4].copy_from_slice(&sequence.to_ne_bytes());
            packet[10] = major;
            self.stream.write_all(&packet).unwrap();
        }

        fn send_expose(&mut self, window: Window) {
            let mut packet = [0u8; 32];
            ExposeEvent {
                sequence: self.sequence,
                send_event: false,
                window,
                x: 0,
                y: 0,
                width: 350,
                height: 250,
                count: 0,
            }
            .encode(&mut packet);
            self.stream.write_all(&packet).unwrap();
        }
    }

    fn connect_pair() -> (WireServer, FakeServer) {
        let (client, server) = UnixStream::pair().unwrap();
        let mut fake = FakeServer {
            stream: server,
            sequence: 0,
        };
        let handle = thread::spawn(move || {
            fake.accept_setup(11);
            fake
        });
        let wire = WireServer::handshake(Stream::Unix(client), ":7", 0, "", &[]).unwrap();
        (wire, handle.join().unwrap())
    }

    #[test]
    fn test_handshake_reports_version_and_screen() {
        let (wire, _fake) = connect_pair();
        assert_eq!(wire.info().protocol_major_version, 11);
        assert_eq!(wire.info().protocol_minor_version, 0);
        assert_eq!(wire.info().screen.root, Window::new(0x1e1));
        assert_eq!(wire.backend_name(), "wire");
    }

    #[test]
    fn test_missing_screen_is_a_connect_error() {
        let (client, server) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let mut fake = FakeServer {
                stream: server,
                sequence: 0,
            };
            fake.accept_setup(11);
        });
        let result = WireServer::handshake(Stream::Unix(client), ":7.3", 3, "", &[]);
        handle.join().unwrap();
        assert!(matches!(
            result,
            Err(ConnectError::NoSuchScreen { screen: 3, .. })
        ));
    }

    #[test]
    fn test_checked_requests_queue_events_and_report_rejections() {
        let (mut wire, mut fake) = connect_pair();

        let server = thread::spawn(move || {
            // CreateWindow succeeds; an Expose arrives before the sync reply
            let create = fake.read_request();
            assert_eq!(create[0], RequestOpcode::CreateWindow as u8);
            let window = Window::new(u32::from_ne_bytes([create[4], create[5], create[6], create[7]]));
            fake.send_expose(window);
            fake.answer_sync();

            // CreateGC is rejected
            let gc = fake.read_request();
            assert_eq!(gc[0], RequestOpcode::CreateGC as u8);
            let rejected = fake.sequence;
            fake.send_error(ErrorCode::Drawable, rejected, RequestOpcode::CreateGC as u8);
            fake.answer_sync();
            window
        });

        let params = WindowParams {
            parent: wire.info().screen.root,
            geometry: Rectangle::new(200, 300, 350, 250),
            border_width: 5,
            border_pixel: 0,
            background_pixel: 0xffffff,
            event_mask: EventMask::empty(),
        };
        let window = wire.create_window(&params).unwrap();
        let err = wire.create_gc(window, 0, 0xffffff).unwrap_err();
        assert!(matches!(
            err,
            RequestError::Rejected(ref e) if e.error_code() == Some(ErrorCode::Drawable)
        ));

        assert_eq!(server.join().unwrap(), window);
        assert_eq!(wire.pending(), 1);
        match wire.wait_for_incoming().unwrap() {
            Incoming::Event(Event::Expose(e)) => assert_eq!(e.window, window),
            other => panic!("unexpected {:?}", other),
        }

        // The fake server has hung up
        assert!(wire.wait_for_incoming().is_err());
    }

    #[test]
    fn test_map_raised_sends_restack_then_map() {
        let (mut wire, mut fake) = connect_pair();
        let server = thread::spawn(move || {
            let configure = fake.read_request();
            let map = fake.read_request();
            fake.answer_sync();
            (configure[0], map[0])
        });

        wire.map_raised(Window::new(0x0040_0001)).unwrap();
        let (first, second) = server.join().unwrap();
        assert_eq!(first, RequestOpcode::ConfigureWindow as u8);
        assert_eq!(second, RequestOpcode::MapWindow as u8);
    }

    #[test]
    fn test_unrecognised_mapping_request_is_delivered() {
        let (mut wire, mut fake) = connect_pair();
        let mut packet = [0u8; 32];
        packet[0] = EventType::MappingNotify as u8;
        packet[4] = 7;
        fake.stream.write_all(&packet).unwrap();

        match wire.wait_for_incoming().unwrap() {
            Incoming::Event(Event::MappingNotify(e)) => assert_eq!(e.request, Mapping::Other(7)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut wire, _fake) = connect_pair();
        wire.close().unwrap();
        wire.close().unwrap();
    }
}
