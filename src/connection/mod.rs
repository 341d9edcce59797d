//! Connection layer
//!
//! This module resolves display names and opens the transport to an X11
//! server via TCP or Unix sockets.

pub mod auth;

use crate::error::ConnectError;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, TcpStream};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Base TCP port, display `n` listens on `X_TCP_PORT + n`
pub const X_TCP_PORT: u16 = 6000;

/// Directory holding the local server sockets
pub const X11_UNIX_DIR: &str = "/tmp/.X11-unix";

/// A parsed display name: `[protocol/][host]:display[.screen]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTarget {
    pub protocol: Option<String>,
    pub host: String,
    pub display: u16,
    pub screen: usize,
}

impl DisplayTarget {
    pub fn parse(name: &str) -> Result<Self, ConnectError> {
        let invalid = || ConnectError::InvalidDisplay(name.to_string());

        let (protocol, rest) = match name.split_once('/') {
            Some((protocol, rest)) => (Some(protocol.to_string()), rest),
            None => (None, name),
        };
        let (host, number) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let (display, screen) = match number.split_once('.') {
            Some((display, screen)) => (display, screen.parse().map_err(|_| invalid())?),
            None => (number, 0),
        };
        let display = display.parse().map_err(|_| invalid())?;

        Ok(DisplayTarget {
            protocol,
            host: host.to_string(),
            display,
            screen,
        })
    }

    /// Resolve an explicit target, falling back to `$DISPLAY`
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConnectError> {
        match explicit {
            Some(name) => Self::parse(name),
            None => match std::env::var("DISPLAY") {
                Ok(name) if !name.is_empty() => Self::parse(&name),
                _ => Err(ConnectError::NoDisplay),
            },
        }
    }

    /// Whether the server is on this machine and reachable via a Unix socket
    pub fn is_local(&self) -> bool {
        match self.protocol.as_deref() {
            Some("unix") => true,
            Some("tcp") | Some("inet") => false,
            _ => self.host.is_empty() || self.host == "unix",
        }
    }

    /// Filesystem path of the local socket
    pub fn socket_path(&self) -> String {
        format!("{}/X{}", X11_UNIX_DIR, self.display)
    }

    /// TCP port of this display, `None` when `6000 + display` does not fit
    pub fn tcp_port(&self) -> Option<u16> {
        X_TCP_PORT.checked_add(self.display)
    }

    /// Open the transport to this display
    pub fn open(&self) -> Result<Stream, ConnectError> {
        let result = if self.is_local() && cfg!(unix) {
            self.open_local()
        } else {
            let port = self
                .tcp_port()
                .ok_or_else(|| ConnectError::InvalidDisplay(self.to_string()))?;
            self.open_tcp(port)
        };
        result.map_err(|source| ConnectError::Unreachable {
            display: self.to_string(),
            source,
        })
    }

    #[cfg(unix)]
    fn open_local(&self) -> io::Result<Stream> {
        #[cfg(target_os = "linux")]
        match connect_abstract(&self.socket_path()) {
            Ok(stream) => {
                log::debug!("Connected to abstract socket @{}", self.socket_path());
                return Ok(Stream::Unix(stream));
            }
            Err(e) => log::debug!("Abstract socket unavailable ({}), trying path", e),
        }

        let stream = UnixStream::connect(self.socket_path())?;
        log::debug!("Connected to {}", self.socket_path());
        Ok(Stream::Unix(stream))
    }

    #[cfg(not(unix))]
    fn open_local(&self) -> io::Result<Stream> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "local sockets need a unix platform",
        ))
    }

    fn open_tcp(&self, port: u16) -> io::Result<Stream> {
        let host = if self.host.is_empty() || self.host == "unix" {
            "localhost"
        } else {
            self.host.as_str()
        };
        let stream = TcpStream::connect((host, port))?;
        stream.set_nodelay(true)?;
        log::debug!("Connected to {}:{}", host, port);
        Ok(Stream::Tcp(stream))
    }
}

impl fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(protocol) = &self.protocol {
            write!(f, "{}/", protocol)?;
        }
        write!(f, "{}:{}", self.host, self.display)?;
        if self.screen != 0 {
            write!(f, ".{}", self.screen)?;
        }
        Ok(())
    }
}

/// Connect to a Linux abstract-namespace socket
#[cfg(target_os = "linux")]
fn connect_abstract(name: &str) -> io::Result<UnixStream> {
    use nix::sys::socket::{connect, socket, AddressFamily, SockFlag, SockType, UnixAddr};
    use std::os::fd::AsRawFd;

    let fd = socket(
        AddressFamily::Unix,
        SockType::Stream,
        SockFlag::SOCK_CLOEXEC,
        None,
    )?;
    let addr = UnixAddr::new_abstract(name.as_bytes())?;
    connect(fd.as_raw_fd(), &addr)?;
    Ok(UnixStream::from(fd))
}

/// Transport to the server
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// IPv4 address of the peer, used to pick an authorization entry
    pub fn peer_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            Stream::Tcp(stream) => match stream.peer_addr().ok()?.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(ip) => ip.to_ipv4_mapped(),
            },
            #[cfg(unix)]
            Stream::Unix(_) => None,
        }
    }

    /// Shut down both halves of the connection
    pub fn shutdown(&self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Tcp(stream) => write!(f, "Stream::Tcp({:?})", stream.peer_addr().ok()),
            #[cfg(unix)]
            Stream::Unix(_) => write!(f, "Stream::Unix"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_display() {
        let target = DisplayTarget::parse(":0").unwrap();
        assert_eq!(target.host, "");
        assert_eq!(target.display, 0);
        assert_eq!(target.screen, 0);
        assert!(target.is_local());
        assert_eq!(target.socket_path(), "/tmp/.X11-unix/X0");
    }

    #[test]
    fn test_parse_remote_display_with_screen() {
        let target = DisplayTarget::parse("example.org:10.1").unwrap();
        assert_eq!(target.host, "example.org");
        assert_eq!(target.display, 10);
        assert_eq!(target.screen, 1);
        assert!(!target.is_local());
        assert_eq!(target.to_string(), "example.org:10.1");
    }

    #[test]
    fn test_parse_protocol_prefix() {
        let target = DisplayTarget::parse("tcp/localhost:2").unwrap();
        assert_eq!(target.protocol.as_deref(), Some("tcp"));
        assert!(!target.is_local());

        let target = DisplayTarget::parse("unix/:3").unwrap();
        assert!(target.is_local());
    }

    #[test]
    fn test_parse_ipv6_host_uses_last_colon() {
        let target = DisplayTarget::parse("::1:0").unwrap();
        assert_eq!(target.host, "::1");
        assert_eq!(target.display, 0);
    }

    #[test]
    fn test_display_number_beyond_tcp_range_is_invalid() {
        assert_eq!(DisplayTarget::parse("host:12").unwrap().tcp_port(), Some(6012));
        assert_eq!(DisplayTarget::parse("host:59535").unwrap().tcp_port(), Some(65535));
        assert_eq!(DisplayTarget::parse("host:59536").unwrap().tcp_port(), None);

        let target = DisplayTarget::parse("tcp/localhost:60000").unwrap();
        assert!(matches!(
            target.open(),
            Err(ConnectError::InvalidDisplay(ref name)) if name == "tcp/localhost:60000"
        ));
    }

    #[test]
    fn test_invalid_names() {
        assert!(matches!(
            DisplayTarget::parse("nocolon"),
            Err(ConnectError::InvalidDisplay(_))
        ));
        assert!(DisplayTarget::parse(":x").is_err());
        assert!(DisplayTarget::parse(":0.y").is_err());
    }

    #[test]
    fn test_unreachable_display() {
        // Display numbers this high are never served in a test environment
        let target = DisplayTarget::parse("unix/:65000").unwrap();
        assert!(matches!(
            target.open(),
            Err(ConnectError::Unreachable { .. })
        ));
    }
}
