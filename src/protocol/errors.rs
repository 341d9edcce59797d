//! X11 protocol error codes and error packets

use super::requests::RequestOpcode;
use byteorder::{NativeEndian, ReadBytesExt};
use std::fmt;
use std::io::{self, Cursor};

/// X11 error codes as defined in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    Request = 1,
    Value = 2,
    Window = 3,
    Pixmap = 4,
    Atom = 5,
    Cursor = 6,
    Font = 7,
    Match = 8,
    Drawable = 9,
    Access = 10,
    Alloc = 11,
    Colormap = 12,
    GContext = 13,
    IDChoice = 14,
    Name = 15,
    Length = 16,
    Implementation = 17,
}

impl ErrorCode {
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Request),
            2 => Some(ErrorCode::Value),
            3 => Some(ErrorCode::Window),
            4 => Some(ErrorCode::Pixmap),
            5 => Some(ErrorCode::Atom),
            6 => Some(ErrorCode::Cursor),
            7 => Some(ErrorCode::Font),
            8 => Some(ErrorCode::Match),
            9 => Some(ErrorCode::Drawable),
            10 => Some(ErrorCode::Access),
            11 => Some(ErrorCode::Alloc),
            12 => Some(ErrorCode::Colormap),
            13 => Some(ErrorCode::GContext),
            14 => Some(ErrorCode::IDChoice),
            15 => Some(ErrorCode::Name),
            16 => Some(ErrorCode::Length),
            17 => Some(ErrorCode::Implementation),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Request => "Request: bad request code",
            ErrorCode::Value => "Value: integer parameter out of range",
            ErrorCode::Window => "Window: invalid Window parameter",
            ErrorCode::Pixmap => "Pixmap: invalid Pixmap parameter",
            ErrorCode::Atom => "Atom: invalid Atom parameter",
            ErrorCode::Cursor => "Cursor: invalid Cursor parameter",
            ErrorCode::Font => "Font: invalid Font parameter",
            ErrorCode::Match => "Match: parameter mismatch",
            ErrorCode::Drawable => "Drawable: invalid Drawable parameter",
            ErrorCode::Access => "Access: attempt to access private resource",
            ErrorCode::Alloc => "Alloc: insufficient resources",
            ErrorCode::Colormap => "Colormap: invalid Colormap parameter",
            ErrorCode::GContext => "GContext: invalid GC parameter",
            ErrorCode::IDChoice => "IDChoice: invalid resource ID for this connection",
            ErrorCode::Name => "Name: font or color name doesn't exist",
            ErrorCode::Length => "Length: request length incorrect",
            ErrorCode::Implementation => "Implementation: server implementation error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// X11 error packet as received from the server.
///
/// `code` is kept raw so extension errors survive decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct X11Error {
    pub code: u8,
    pub sequence: u16,
    pub bad_value: u32,
    pub minor_opcode: u16,
    pub major_opcode: u8,
}

impl X11Error {
    pub fn new(code: ErrorCode, sequence: u16, bad_value: u32, major_opcode: u8) -> Self {
        X11Error {
            code: code as u8,
            sequence,
            bad_value,
            minor_opcode: 0,
            major_opcode,
        }
    }

    /// Decode a 32-byte error packet (first byte is 0)
    pub fn parse(packet: &[u8]) -> io::Result<Self> {
        if packet.len() < 32 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short error packet",
            ));
        }
        let mut cursor = Cursor::new(&packet[1..]);
        let code = cursor.read_u8()?;
        let sequence = cursor.read_u16::<NativeEndian>()?;
        let bad_value = cursor.read_u32::<NativeEndian>()?;
        let minor_opcode = cursor.read_u16::<NativeEndian>()?;
        let major_opcode = cursor.read_u8()?;
        Ok(X11Error {
            code,
            sequence,
            bad_value,
            minor_opcode,
            major_opcode,
        })
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_u8(self.code)
    }

    /// Name of the request that failed, if it is a core request we know
    pub fn request_name(&self) -> Option<&'static str> {
        RequestOpcode::from_u8(self.major_opcode).map(|op| op.name())
    }
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_code() {
            Some(code) => write!(f, "X11 Error: {}", code)?,
            None => write!(f, "X11 Error: unknown error code {}", self.code)?,
        }
        match self.request_name() {
            Some(name) => write!(f, " in {}", name)?,
            None => write!(f, " in request {}", self.major_opcode)?,
        }
        write!(
            f,
            " (sequence: {}, value: 0x{:08x}, minor: {})",
            self.sequence, self.bad_value, self.minor_opcode
        )
    }
}

impl std::error::Error for X11Error {}
