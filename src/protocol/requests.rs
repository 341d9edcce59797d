//! X11 protocol requests
//!
//! This module defines the request opcodes the client uses and encodes
//! requests to the wire format. All multi-byte fields use the client's
//! native byte order, which is what the setup request announces.

use super::types::*;
use super::pad;
use byteorder::{ByteOrder as WireByteOrder, NativeEndian};

/// X11 request opcodes used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestOpcode {
    CreateWindow = 1,
    ChangeWindowAttributes = 2,
    DestroyWindow = 4,
    MapWindow = 8,
    ConfigureWindow = 12,
    ChangeProperty = 18,
    GetInputFocus = 43,
    CreateGC = 55,
    FreeGC = 60,
}

impl RequestOpcode {
    pub fn from_u8(opcode: u8) -> Option<Self> {
        match opcode {
            1 => Some(RequestOpcode::CreateWindow),
            2 => Some(RequestOpcode::ChangeWindowAttributes),
            4 => Some(RequestOpcode::DestroyWindow),
            8 => Some(RequestOpcode::MapWindow),
            12 => Some(RequestOpcode::ConfigureWindow),
            18 => Some(RequestOpcode::ChangeProperty),
            43 => Some(RequestOpcode::GetInputFocus),
            55 => Some(RequestOpcode::CreateGC),
            60 => Some(RequestOpcode::FreeGC),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestOpcode::CreateWindow => "CreateWindow",
            RequestOpcode::ChangeWindowAttributes => "ChangeWindowAttributes",
            RequestOpcode::DestroyWindow => "DestroyWindow",
            RequestOpcode::MapWindow => "MapWindow",
            RequestOpcode::ConfigureWindow => "ConfigureWindow",
            RequestOpcode::ChangeProperty => "ChangeProperty",
            RequestOpcode::GetInputFocus => "GetInputFocus",
            RequestOpcode::CreateGC => "CreateGC",
            RequestOpcode::FreeGC => "FreeGC",
        }
    }
}

/// Window attribute value-mask bits (CreateWindow / ChangeWindowAttributes)
pub mod window_attr {
    pub const BACK_PIXEL: u32 = 1 << 1;
    pub const BORDER_PIXEL: u32 = 1 << 3;
    pub const EVENT_MASK: u32 = 1 << 11;
}

/// GC value-mask bits
pub mod gc_value {
    pub const FOREGROUND: u32 = 1 << 2;
    pub const BACKGROUND: u32 = 1 << 3;
}

/// ConfigureWindow value-mask bits
pub mod config_value {
    pub const X: u16 = 1 << 0;
    pub const Y: u16 = 1 << 1;
    pub const WIDTH: u16 = 1 << 2;
    pub const HEIGHT: u16 = 1 << 3;
    pub const BORDER_WIDTH: u16 = 1 << 4;
    pub const STACK_MODE: u16 = 1 << 6;
}

/// Property change modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyMode {
    Replace = 0,
    Prepend = 1,
    Append = 2,
}

/// Incremental request writer. The length field is filled in by `finish`.
struct RequestWriter {
    buf: Vec<u8>,
}

impl RequestWriter {
    fn new(opcode: RequestOpcode, data: u8) -> Self {
        RequestWriter {
            buf: vec![opcode as u8, data, 0, 0],
        }
    }

    fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    fn u16(&mut self, value: u16) -> &mut Self {
        let mut tmp = [0u8; 2];
        NativeEndian::write_u16(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn i16(&mut self, value: i16) -> &mut Self {
        let mut tmp = [0u8; 2];
        NativeEndian::write_i16(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        let mut tmp = [0u8; 4];
        NativeEndian::write_u32(&mut tmp, value);
        self.buf.extend_from_slice(&tmp);
        self
    }

    fn unused(&mut self, n: usize) -> &mut Self {
        self.buf.resize(self.buf.len() + n, 0);
        self
    }

    fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self.unused(pad(data.len()))
    }

    /// Value list: entries sorted by mask bit, one u32 per set bit
    fn values(&mut self, values: &[(u32, u32)]) -> &mut Self {
        let mut sorted = values.to_vec();
        sorted.sort_by_key(|(bit, _)| *bit);
        for (_, value) in sorted {
            self.u32(value);
        }
        self
    }

    fn finish(&mut self) -> Vec<u8> {
        let padding = pad(self.buf.len());
        self.unused(padding);
        let length = (self.buf.len() / 4) as u16;
        NativeEndian::write_u16(&mut self.buf[2..4], length);
        std::mem::take(&mut self.buf)
    }
}

fn value_mask(values: &[(u32, u32)]) -> u32 {
    values.iter().fold(0, |mask, (bit, _)| mask | bit)
}

/// Create window request
#[derive(Debug, Clone)]
pub struct CreateWindowRequest {
    pub depth: u8,
    pub wid: Window,
    pub parent: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub class: WindowClass,
    pub visual: VisualID,
    pub background_pixel: Option<u32>,
    pub border_pixel: Option<u32>,
    pub event_mask: Option<EventMask>,
}

impl CreateWindowRequest {
    fn value_list(&self) -> Vec<(u32, u32)> {
        let mut values = Vec::new();
        if let Some(pixel) = self.background_pixel {
            values.push((window_attr::BACK_PIXEL, pixel));
        }
        if let Some(pixel) = self.border_pixel {
            values.push((window_attr::BORDER_PIXEL, pixel));
        }
        if let Some(mask) = self.event_mask {
            values.push((window_attr::EVENT_MASK, mask.bits()));
        }
        values
    }

    pub fn encode(&self) -> Vec<u8> {
        let values = self.value_list();
        RequestWriter::new(RequestOpcode::CreateWindow, self.depth)
            .u32(self.wid.id().get())
            .u32(self.parent.id().get())
            .i16(self.x)
            .i16(self.y)
            .u16(self.width)
            .u16(self.height)
            .u16(self.border_width)
            .u16(self.class as u16)
            .u32(self.visual.get())
            .u32(value_mask(&values))
            .values(&values)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChangeWindowAttributesRequest {
    pub window: Window,
    pub background_pixel: Option<u32>,
    pub event_mask: Option<EventMask>,
}

impl ChangeWindowAttributesRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut values = Vec::new();
        if let Some(pixel) = self.background_pixel {
            values.push((window_attr::BACK_PIXEL, pixel));
        }
        if let Some(mask) = self.event_mask {
            values.push((window_attr::EVENT_MASK, mask.bits()));
        }
        RequestWriter::new(RequestOpcode::ChangeWindowAttributes, 0)
            .u32(self.window.id().get())
            .u32(value_mask(&values))
            .values(&values)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigureWindowRequest {
    pub window: Window,
    pub x: Option<i16>,
    pub y: Option<i16>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub border_width: Option<u16>,
    pub stack_mode: Option<StackMode>,
}

impl ConfigureWindowRequest {
    /// Restack only, leaving geometry untouched
    pub fn restack(window: Window, stack_mode: StackMode) -> Self {
        ConfigureWindowRequest {
            window,
            x: None,
            y: None,
            width: None,
            height: None,
            border_width: None,
            stack_mode: Some(stack_mode),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut mask = 0u16;
        let mut values = Vec::new();
        // Values are signed on the wire for x/y; sign-extend into the u32 slot.
        let fields: [(u16, Option<u32>); 6] = [
            (config_value::X, self.x.map(|v| v as i32 as u32)),
            (config_value::Y, self.y.map(|v| v as i32 as u32)),
            (config_value::WIDTH, self.width.map(u32::from)),
            (config_value::HEIGHT, self.height.map(u32::from)),
            (config_value::BORDER_WIDTH, self.border_width.map(u32::from)),
            (config_value::STACK_MODE, self.stack_mode.map(|m| m as u32)),
        ];
        for (bit, value) in fields {
            if let Some(value) = value {
                mask |= bit;
                values.push((u32::from(bit), value));
            }
        }
        RequestWriter::new(RequestOpcode::ConfigureWindow, 0)
            .u32(self.window.id().get())
            .u16(mask)
            .unused(2)
            .values(&values)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ChangePropertyRequest {
    pub mode: PropertyMode,
    pub window: Window,
    pub property: Atom,
    pub type_: Atom,
    pub format: u8,
    pub data: Vec<u8>,
}

impl ChangePropertyRequest {
    pub fn encode(&self) -> Vec<u8> {
        let unit = usize::from(self.format / 8).max(1);
        RequestWriter::new(RequestOpcode::ChangeProperty, self.mode as u8)
            .u32(self.window.id().get())
            .u32(self.property.get())
            .u32(self.type_.get())
            .u8(self.format)
            .unused(3)
            .u32((self.data.len() / unit) as u32)
            .bytes(&self.data)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CreateGCRequest {
    pub cid: GContext,
    pub drawable: Window,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
}

impl CreateGCRequest {
    pub fn encode(&self) -> Vec<u8> {
        let mut values = Vec::new();
        if let Some(pixel) = self.foreground {
            values.push((gc_value::FOREGROUND, pixel));
        }
        if let Some(pixel) = self.background {
            values.push((gc_value::BACKGROUND, pixel));
        }
        RequestWriter::new(RequestOpcode::CreateGC, 0)
            .u32(self.cid.id().get())
            .u32(self.drawable.id().get())
            .u32(value_mask(&values))
            .values(&values)
            .finish()
    }
}

pub fn encode_destroy_window(window: Window) -> Vec<u8> {
    RequestWriter::new(RequestOpcode::DestroyWindow, 0)
        .u32(window.id().get())
        .finish()
}

pub fn encode_map_window(window: Window) -> Vec<u8> {
    RequestWriter::new(RequestOpcode::MapWindow, 0)
        .u32(window.id().get())
        .finish()
}

pub fn encode_free_gc(gc: GContext) -> Vec<u8> {
    RequestWriter::new(RequestOpcode::FreeGC, 0)
        .u32(gc.id().get())
        .finish()
}

/// GetInputFocus carries no arguments and always produces a reply, which
/// makes it the cheapest synchronisation round-trip.
pub fn encode_get_input_focus() -> Vec<u8> {
    RequestWriter::new(RequestOpcode::GetInputFocus, 0).finish()
}
