//! Core X11 protocol types
//!
//! These types represent the fundamental data types used in the X11 protocol.
//! They are kept minimal and close to the wire protocol for efficiency.

use bitflags::bitflags;
use std::fmt;

/// X11 resource ID - used for windows, pixmaps, graphics contexts, etc.
/// In X11, all objects are identified by 29-bit IDs.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct XID(pub u32);

impl XID {
    pub const NONE: XID = XID(0);

    pub fn new(id: u32) -> Self {
        XID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for XID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Window ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window(pub XID);

impl Window {
    pub const NONE: Window = Window(XID::NONE);

    pub fn new(id: u32) -> Self {
        Window(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Graphics Context ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GContext(pub XID);

impl GContext {
    pub fn new(id: u32) -> Self {
        GContext(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

impl fmt::Display for GContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Colormap ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colormap(pub XID);

impl Colormap {
    pub const NONE: Colormap = Colormap(XID::NONE);

    pub fn new(id: u32) -> Self {
        Colormap(XID::new(id))
    }

    pub fn id(&self) -> XID {
        self.0
    }
}

/// Atom - interned string identifier
///
/// Only the predefined atoms the client writes are listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Atom(pub u32);

impl Atom {
    pub const NONE: Atom = Atom(0);
    pub const STRING: Atom = Atom(31);
    pub const WM_NAME: Atom = Atom(39);
    pub const WM_NORMAL_HINTS: Atom = Atom(40);
    pub const WM_SIZE_HINTS: Atom = Atom(41);

    pub fn new(id: u32) -> Self {
        Atom(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Visual ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualID(pub u32);

impl VisualID {
    /// CopyFromParent when creating windows
    pub const COPY_FROM_PARENT: VisualID = VisualID(0);

    pub fn new(id: u32) -> Self {
        VisualID(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Timestamp (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const CURRENT_TIME: Timestamp = Timestamp(0);

    pub fn new(ms: u32) -> Self {
        Timestamp(ms)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

/// Keycode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keycode(pub u8);

impl Keycode {
    pub fn new(code: u8) -> Self {
        Keycode(code)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// Button (mouse button)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Button(pub u8);

impl Button {
    pub const BUTTON1: Button = Button(1);
    pub const BUTTON2: Button = Button(2);
    pub const BUTTON3: Button = Button(3);
    pub const BUTTON4: Button = Button(4);
    pub const BUTTON5: Button = Button(5);

    pub fn new(button: u8) -> Self {
        Button(button)
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

/// Rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rectangle {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Rectangle {
    pub fn new(x: i16, y: i16, width: u16, height: u16) -> Self {
        Rectangle {
            x,
            y,
            width,
            height,
        }
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Window class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent = 0,
    InputOutput = 1,
    InputOnly = 2,
}

/// Stack mode for ConfigureWindow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Above = 0,
    Below = 1,
    TopIf = 2,
    BottomIf = 3,
    Opposite = 4,
}

/// Byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LSBFirst = 0,
    MSBFirst = 1,
}

impl ByteOrder {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::LSBFirst
        } else {
            ByteOrder::MSBFirst
        }
    }

    /// Byte-order mark sent as the first byte of the setup request
    pub fn mark(&self) -> u8 {
        match self {
            ByteOrder::LSBFirst => b'l',
            ByteOrder::MSBFirst => b'B',
        }
    }

    pub fn from_u8(value: u8) -> Self {
        if value == 0 {
            ByteOrder::LSBFirst
        } else {
            ByteOrder::MSBFirst
        }
    }
}

bitflags! {
    /// Event masks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventMask: u32 {
        const KEY_PRESS = 1 << 0;
        const KEY_RELEASE = 1 << 1;
        const BUTTON_PRESS = 1 << 2;
        const BUTTON_RELEASE = 1 << 3;
        const ENTER_WINDOW = 1 << 4;
        const LEAVE_WINDOW = 1 << 5;
        const POINTER_MOTION = 1 << 6;
        const POINTER_MOTION_HINT = 1 << 7;
        const BUTTON1_MOTION = 1 << 8;
        const BUTTON2_MOTION = 1 << 9;
        const BUTTON3_MOTION = 1 << 10;
        const BUTTON4_MOTION = 1 << 11;
        const BUTTON5_MOTION = 1 << 12;
        const BUTTON_MOTION = 1 << 13;
        const KEYMAP_STATE = 1 << 14;
        const EXPOSURE = 1 << 15;
        const VISIBILITY_CHANGE = 1 << 16;
        const STRUCTURE_NOTIFY = 1 << 17;
        const RESIZE_REDIRECT = 1 << 18;
        const SUBSTRUCTURE_NOTIFY = 1 << 19;
        const SUBSTRUCTURE_REDIRECT = 1 << 20;
        const FOCUS_CHANGE = 1 << 21;
        const PROPERTY_CHANGE = 1 << 22;
        const COLORMAP_CHANGE = 1 << 23;
        const OWNER_GRAB_BUTTON = 1 << 24;
    }
}

impl EventMask {
    /// Parse a mask name as used on the command line (e.g. "expose", "key-press")
    pub fn from_cli_name(name: &str) -> Option<Self> {
        match name {
            "key-press" => Some(EventMask::KEY_PRESS),
            "key-release" => Some(EventMask::KEY_RELEASE),
            "button-press" => Some(EventMask::BUTTON_PRESS),
            "button-release" => Some(EventMask::BUTTON_RELEASE),
            "enter" => Some(EventMask::ENTER_WINDOW),
            "leave" => Some(EventMask::LEAVE_WINDOW),
            "motion" => Some(EventMask::POINTER_MOTION),
            "expose" => Some(EventMask::EXPOSURE),
            "visibility" => Some(EventMask::VISIBILITY_CHANGE),
            "structure" => Some(EventMask::STRUCTURE_NOTIFY),
            "focus" => Some(EventMask::FOCUS_CHANGE),
            "property" => Some(EventMask::PROPERTY_CHANGE),
            _ => None,
        }
    }
}

bitflags! {
    /// Keyboard/pointer modifier masks
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModMask: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
        const BUTTON1 = 1 << 8;
        const BUTTON2 = 1 << 9;
        const BUTTON3 = 1 << 10;
        const BUTTON4 = 1 << 11;
        const BUTTON5 = 1 << 12;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_mask_bits_match_protocol() {
        let mask = EventMask::BUTTON_PRESS | EventMask::KEY_PRESS | EventMask::EXPOSURE;
        assert_eq!(mask.bits(), 0x8005);
    }

    #[test]
    fn test_event_mask_names() {
        assert_eq!(EventMask::from_cli_name("expose"), Some(EventMask::EXPOSURE));
        assert_eq!(EventMask::from_cli_name("key-press"), Some(EventMask::KEY_PRESS));
        assert_eq!(EventMask::from_cli_name("nonsense"), None);
    }

    #[test]
    fn test_rectangle_display_uses_geometry_syntax() {
        assert_eq!(Rectangle::new(200, 300, 350, 250).to_string(), "350x250+200+300");
    }
}
