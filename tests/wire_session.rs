//! A full session over the built-in codec against a scripted server
#![cfg(unix)]

use std::cell::RefCell;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread;

use x11session::backend::wire::WireServer;
use x11session::connection::Stream;
use x11session::protocol::*;
use x11session::{ConnectError, Connector, ControlFlow, DisplaySession, EventHandler, SessionConfig};

/// Hands out a server already connected over a socket pair
struct PairConnector {
    client: RefCell<Option<UnixStream>>,
}

impl Connector for PairConnector {
    type Server = WireServer;

    fn connect(&self, _display: Option<&str>) -> Result<WireServer, ConnectError> {
        let stream = self
            .client
            .borrow_mut()
            .take()
            .ok_or_else(|| ConnectError::InvalidDisplay("already used".to_string()))?;
        WireServer::handshake(Stream::Unix(stream), ":9", 0, "", &[])
    }
}

struct Script {
    stream: UnixStream,
    sequence: u16,
}

impl Script {
    fn accept_setup(&mut self) {
        let mut header = [0u8; 12];
        self.stream.read_exact(&mut header).unwrap();
        assert_eq!(header[0], ByteOrder::native().mark());
        let name_len = u16::from_ne_bytes([header[6], header[7]]) as usize;
        let data_len = u16::from_ne_bytes([header[8], header[9]]) as usize;
        let mut rest = vec![0u8; padded_len(name_len) + padded_len(data_len)];
        self.stream.read_exact(&mut rest).unwrap();
        sample_setup(11, 0).encode(&mut self.stream).unwrap();
    }

    /// Read one request, or `None` once the client hung up
    fn next_request(&mut self) -> Option<Vec<u8>> {
        let mut header = [0u8; 4];
        if self.stream.read_exact(&mut header).is_err() {
            return None;
        }
        let len = u16::from_ne_bytes([header[2], header[3]]) as usize * 4;
        let mut request = header.to_vec();
        request.resize(len, 0);
        self.stream.read_exact(&mut request[4..]).unwrap();
        self.sequence += 1;
        Some(request)
    }

    /// Read requests up to and including the next sync, answering it
    fn serve_checked(&mut self) -> Vec<u8> {
        let mut opcodes = Vec::new();
        loop {
            let request = self.next_request().expect("client hung up early");
            if request[0] == RequestOpcode::GetInputFocus as u8 {
                let mut reply = [0u8; 32];
                reply[0] = 1;
                reply[2..4].copy_from_slice(&self.sequence.to_ne_bytes());
                self.stream.write_all(&reply).unwrap();
                return opcodes;
            }
            opcodes.push(request[0]);
        }
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

struct StopOnExpose(Option<Window>);

impl EventHandler for StopOnExpose {
    fn expose(&mut self, event: &ExposeEvent) -> ControlFlow {
        self.0 = Some(event.window);
        ControlFlow::Stop
    }
}

#[test_log::test]
fn test_wire_session_configures_window_and_tears_down() {
    let (client, server) = UnixStream::pair().unwrap();
    let script = thread::spawn(move || {
        let mut script = Script {
            stream: server,
            sequence: 0,
        };
        script.accept_setup();

        let mut configured = Vec::new();
        for _ in 0..6 {
            configured.push(script.serve_checked());
        }

        script.send_expose(Window::new(0x0040_0001));

        let mut teardown = Vec::new();
        while let Some(request) = script.next_request() {
            teardown.push(request[0]);
        }
        (configured, teardown)
    });

    let connector = PairConnector {
        client: RefCell::new(Some(client)),
    };
    let mut session = DisplaySession::new(connector, SessionConfig::default());
    let mut handler = StopOnExpose(None);
    session.run(&mut handler).unwrap();
    assert_eq!(handler.0, Some(Window::new(0x0040_0001)));

    let (configured, teardown) = script.join().unwrap();
    let op = |o: RequestOpcode| o as u8;
    assert_eq!(
        configured,
        vec![
            vec![op(RequestOpcode::CreateWindow)],
            vec![op(RequestOpcode::ChangeProperty)],
            vec![op(RequestOpcode::ChangeProperty)],
            vec![op(RequestOpcode::CreateGC)],
            vec![op(RequestOpcode::ChangeWindowAttributes)],
            vec![
                op(RequestOpcode::ConfigureWindow),
                op(RequestOpcode::MapWindow)
            ],
        ]
    );
    assert_eq!(
        teardown,
        vec![op(RequestOpcode::FreeGC), op(RequestOpcode::DestroyWindow)]
    );
}

#[test_log::test]
fn test_wire_session_reports_refused_setup() {
    let (client, server) = UnixStream::pair().unwrap();
    let script = thread::spawn(move || {
        let mut stream = server;
        let mut header = [0u8; 12];
        stream.read_exact(&mut header).unwrap();

        let reason = b"No protocol specified";
        let padded = padded_len(reason.len());
        let mut reply = vec![0u8; 8 + padded];
        reply[0] = 0; // Failed
        reply[1] = reason.len() as u8;
        reply[2..4].copy_from_slice(&11u16.to_ne_bytes());
        reply[6..8].copy_from_slice(&((padded / 4) as u16).to_ne_bytes());
        reply[8..8 + reason.len()].copy_from_slice(reason);
        stream.write_all(&reply).unwrap();
    });

    let connector = PairConnector {
        client: RefCell::new(Some(client)),
    };
    let mut session = DisplaySession::new(connector, SessionConfig::default());
    let err = session.run(&mut StopOnExpose(None)).unwrap_err();
    script.join().unwrap();

    let message = err.to_string();
    assert!(message.contains("No protocol specified"), "{}", message);
    assert_eq!(err.exit_code(), 1);
}
