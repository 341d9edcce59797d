//! X11 protocol events
//!
//! Events are sent from the server to clients to notify them of state changes,
//! user input, and other interesting occurrences. Every event is a 32-byte
//! packet; GenericEvent may carry extra payload after it.

use super::types::*;
use byteorder::{NativeEndian, ReadBytesExt};
use std::io::{self, Cursor};

/// Event type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventType {
    KeyPress = 2,
    KeyRelease = 3,
    ButtonPress = 4,
    ButtonRelease = 5,
    MotionNotify = 6,
    EnterNotify = 7,
    LeaveNotify = 8,
    FocusIn = 9,
    FocusOut = 10,
    KeymapNotify = 11,
    Expose = 12,
    GraphicsExposure = 13,
    NoExposure = 14,
    VisibilityNotify = 15,
    CreateNotify = 16,
    DestroyNotify = 17,
    UnmapNotify = 18,
    MapNotify = 19,
    MapRequest = 20,
    ReparentNotify = 21,
    ConfigureNotify = 22,
    ConfigureRequest = 23,
    GravityNotify = 24,
    ResizeRequest = 25,
    CirculateNotify = 26,
    CirculateRequest = 27,
    PropertyNotify = 28,
    SelectionClear = 29,
    SelectionRequest = 30,
    SelectionNotify = 31,
    ColormapNotify = 32,
    ClientMessage = 33,
    MappingNotify = 34,
    GenericEvent = 35,
}

impl EventType {
    pub fn from_u8(code: u8) -> Option<Self> {
        use EventType::*;
        let kind = match code {
            2 => KeyPress,
            3 => KeyRelease,
            4 => ButtonPress,
            5 => ButtonRelease,
            6 => MotionNotify,
            7 => EnterNotify,
            8 => LeaveNotify,
            9 => FocusIn,
            10 => FocusOut,
            11 => KeymapNotify,
            12 => Expose,
            13 => GraphicsExposure,
            14 => NoExposure,
            15 => VisibilityNotify,
            16 => CreateNotify,
            17 => DestroyNotify,
            18 => UnmapNotify,
            19 => MapNotify,
            20 => MapRequest,
            21 => ReparentNotify,
            22 => ConfigureNotify,
            23 => ConfigureRequest,
            24 => GravityNotify,
            25 => ResizeRequest,
            26 => CirculateNotify,
            27 => CirculateRequest,
            28 => PropertyNotify,
            29 => SelectionClear,
            30 => SelectionRequest,
            31 => SelectionNotify,
            32 => ColormapNotify,
            33 => ClientMessage,
            34 => MappingNotify,
            35 => GenericEvent,
            _ => return None,
        };
        Some(kind)
    }

    /// The event-mask bit a window must select to receive this event.
    ///
    /// `None` means the event is delivered regardless of the mask.
    pub fn selecting_mask(&self) -> Option<EventMask> {
        use EventType::*;
        match self {
            KeyPress => Some(EventMask::KEY_PRESS),
            KeyRelease => Some(EventMask::KEY_RELEASE),
            ButtonPress => Some(EventMask::BUTTON_PRESS),
            ButtonRelease => Some(EventMask::BUTTON_RELEASE),
            MotionNotify => Some(EventMask::POINTER_MOTION),
            EnterNotify => Some(EventMask::ENTER_WINDOW),
            LeaveNotify => Some(EventMask::LEAVE_WINDOW),
            FocusIn | FocusOut => Some(EventMask::FOCUS_CHANGE),
            KeymapNotify => Some(EventMask::KEYMAP_STATE),
            Expose => Some(EventMask::EXPOSURE),
            VisibilityNotify => Some(EventMask::VISIBILITY_CHANGE),
            CreateNotify => Some(EventMask::SUBSTRUCTURE_NOTIFY),
            DestroyNotify | UnmapNotify | MapNotify | ReparentNotify | ConfigureNotify
            | GravityNotify | CirculateNotify => Some(EventMask::STRUCTURE_NOTIFY),
            MapRequest | ConfigureRequest | CirculateRequest => {
                Some(EventMask::SUBSTRUCTURE_REDIRECT)
            }
            ResizeRequest => Some(EventMask::RESIZE_REDIRECT),
            PropertyNotify => Some(EventMask::PROPERTY_CHANGE),
            ColormapNotify => Some(EventMask::COLORMAP_CHANGE),
            GraphicsExposure | NoExposure | SelectionClear | SelectionRequest
            | SelectionNotify | ClientMessage | MappingNotify | GenericEvent => None,
        }
    }
}

/// Decoded event.
///
/// The kinds the client reacts to are decoded into their own structs; the
/// remaining core kinds are kept as [`OtherEvent`], and codes outside the
/// core range become [`UnknownEvent`].
#[derive(Debug, Clone)]
pub enum Event {
    KeyPress(KeyPressEvent),
    KeyRelease(KeyReleaseEvent),
    ButtonPress(ButtonPressEvent),
    ButtonRelease(ButtonReleaseEvent),
    MotionNotify(MotionNotifyEvent),
    Expose(ExposeEvent),
    DestroyNotify(DestroyNotifyEvent),
    UnmapNotify(UnmapNotifyEvent),
    MapNotify(MapNotifyEvent),
    ConfigureNotify(ConfigureNotifyEvent),
    ClientMessage(ClientMessageEvent),
    MappingNotify(MappingNotifyEvent),
    Other(OtherEvent),
    Unknown(UnknownEvent),
}

impl Event {
    /// Decode an event packet.
    ///
    /// `packet` holds at least the fixed 32 bytes. The SendEvent bit is
    /// stripped from the code and kept in the event's `send_event` field.
    pub fn parse(packet: &[u8]) -> io::Result<Event> {
        if packet.len() < 32 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "short event packet",
            ));
        }
        let code = packet[0] & 0x7f;
        let send_event = packet[0] & 0x80 != 0;
        let mut c = Cursor::new(&packet[1..]);

        let kind = match EventType::from_u8(code) {
            Some(kind) => kind,
            None => {
                let sequence = read_sequence(packet);
                return Ok(Event::Unknown(UnknownEvent {
                    code: u16::from(code),
                    sequence,
                    send_event,
                }));
            }
        };

        let mut event = match kind {
            EventType::KeyPress => Event::KeyPress(KeyPressEvent::parse(&mut c)?),
            EventType::KeyRelease => Event::KeyRelease(KeyReleaseEvent::parse(&mut c)?),
            EventType::ButtonPress => Event::ButtonPress(ButtonPressEvent::parse(&mut c)?),
            EventType::ButtonRelease => Event::ButtonRelease(ButtonReleaseEvent::parse(&mut c)?),
            EventType::MotionNotify => Event::MotionNotify(MotionNotifyEvent::parse(&mut c)?),
            EventType::Expose => Event::Expose(ExposeEvent::parse(&mut c)?),
            EventType::DestroyNotify => Event::DestroyNotify(DestroyNotifyEvent::parse(&mut c)?),
            EventType::UnmapNotify => Event::UnmapNotify(UnmapNotifyEvent::parse(&mut c)?),
            EventType::MapNotify => Event::MapNotify(MapNotifyEvent::parse(&mut c)?),
            EventType::ConfigureNotify => {
                Event::ConfigureNotify(ConfigureNotifyEvent::parse(&mut c)?)
            }
            EventType::ClientMessage => Event::ClientMessage(ClientMessageEvent::parse(&mut c)?),
            EventType::MappingNotify => Event::MappingNotify(MappingNotifyEvent::parse(&mut c)?),
            other => {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&packet[..32]);
                Event::Other(OtherEvent {
                    kind: other,
                    sequence: read_sequence(packet),
                    send_event,
                    raw,
                })
            }
        };
        if send_event {
            event.mark_send_event();
        }
        Ok(event)
    }

    fn mark_send_event(&mut self) {
        match self {
            Event::KeyPress(e) => e.send_event = true,
            Event::KeyRelease(e) => e.send_event = true,
            Event::ButtonPress(e) => e.send_event = true,
            Event::ButtonRelease(e) => e.send_event = true,
            Event::MotionNotify(e) => e.send_event = true,
            Event::Expose(e) => e.send_event = true,
            Event::DestroyNotify(e) => e.send_event = true,
            Event::UnmapNotify(e) => e.send_event = true,
            Event::MapNotify(e) => e.send_event = true,
            Event::ConfigureNotify(e) => e.send_event = true,
            Event::ClientMessage(e) => e.send_event = true,
            Event::MappingNotify(e) => e.send_event = true,
            Event::Other(e) => e.send_event = true,
            Event::Unknown(e) => e.send_event = true,
        }
    }

    /// Whether another client sent this with SendEvent
    pub fn is_send_event(&self) -> bool {
        match self {
            Event::KeyPress(e) => e.send_event,
            Event::KeyRelease(e) => e.send_event,
            Event::ButtonPress(e) => e.send_event,
            Event::ButtonRelease(e) => e.send_event,
            Event::MotionNotify(e) => e.send_event,
            Event::Expose(e) => e.send_event,
            Event::DestroyNotify(e) => e.send_event,
            Event::UnmapNotify(e) => e.send_event,
            Event::MapNotify(e) => e.send_event,
            Event::ConfigureNotify(e) => e.send_event,
            Event::ClientMessage(e) => e.send_event,
            Event::MappingNotify(e) => e.send_event,
            Event::Other(e) => e.send_event,
            Event::Unknown(e) => e.send_event,
        }
    }

    /// Get the event type, `None` for unknown codes
    pub fn event_type(&self) -> Option<EventType> {
        let kind = match self {
            Event::KeyPress(_) => EventType::KeyPress,
            Event::KeyRelease(_) => EventType::KeyRelease,
            Event::ButtonPress(_) => EventType::ButtonPress,
            Event::ButtonRelease(_) => EventType::ButtonRelease,
            Event::MotionNotify(_) => EventType::MotionNotify,
            Event::Expose(_) => EventType::Expose,
            Event::DestroyNotify(_) => EventType::DestroyNotify,
            Event::UnmapNotify(_) => EventType::UnmapNotify,
            Event::MapNotify(_) => EventType::MapNotify,
            Event::ConfigureNotify(_) => EventType::ConfigureNotify,
            Event::ClientMessage(_) => EventType::ClientMessage,
            Event::MappingNotify(_) => EventType::MappingNotify,
            Event::Other(e) => e.kind,
            Event::Unknown(_) => return None,
        };
        Some(kind)
    }

    /// Raw event code (the tag)
    pub fn code(&self) -> u16 {
        match self {
            Event::Unknown(e) => e.code,
            other => other.event_type().map(|k| k as u16).unwrap_or_default(),
        }
    }

    pub fn sequence(&self) -> u16 {
        match self {
            Event::KeyPress(e) => e.sequence,
            Event::KeyRelease(e) => e.sequence,
            Event::ButtonPress(e) => e.sequence,
            Event::ButtonRelease(e) => e.sequence,
            Event::MotionNotify(e) => e.sequence,
            Event::Expose(e) => e.sequence,
            Event::DestroyNotify(e) => e.sequence,
            Event::UnmapNotify(e) => e.sequence,
            Event::MapNotify(e) => e.sequence,
            Event::ConfigureNotify(e) => e.sequence,
            Event::ClientMessage(e) => e.sequence,
            Event::MappingNotify(e) => e.sequence,
            Event::Other(e) => e.sequence,
            Event::Unknown(e) => e.sequence,
        }
    }

    /// The window the event was reported relative to, when the kind has one
    pub fn window(&self) -> Option<Window> {
        match self {
            Event::KeyPress(e) => Some(e.event),
            Event::KeyRelease(e) => Some(e.event),
            Event::ButtonPress(e) => Some(e.event),
            Event::ButtonRelease(e) => Some(e.event),
            Event::MotionNotify(e) => Some(e.event),
            Event::Expose(e) => Some(e.window),
            Event::DestroyNotify(e) => Some(e.event),
            Event::UnmapNotify(e) => Some(e.event),
            Event::MapNotify(e) => Some(e.event),
            Event::ConfigureNotify(e) => Some(e.event),
            Event::ClientMessage(e) => Some(e.window),
            Event::MappingNotify(_) | Event::Other(_) | Event::Unknown(_) => None,
        }
    }
}

fn read_sequence(packet: &[u8]) -> u16 {
    <NativeEndian as byteorder::ByteOrder>::read_u16(&packet[2..4])
}

fn read_window(c: &mut Cursor<&[u8]>) -> io::Result<Window> {
    Ok(Window::new(c.read_u32::<NativeEndian>()?))
}

// Key and button events share a common structure
macro_rules! define_key_button_event {
    ($name:ident, $code:expr, $detail:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            pub detail: $detail,
            pub sequence: u16,
            pub send_event: bool,
            pub time: Timestamp,
            pub root: Window,
            pub event: Window,
            pub child: Window,
            pub root_x: i16,
            pub root_y: i16,
            pub event_x: i16,
            pub event_y: i16,
            pub state: ModMask,
            pub same_screen: bool,
        }

        impl $name {
            fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
                Ok($name {
                    detail: $detail(c.read_u8()?),
                    sequence: c.read_u16::<NativeEndian>()?,
                    send_event: false,
                    time: Timestamp(c.read_u32::<NativeEndian>()?),
                    root: read_window(c)?,
                    event: read_window(c)?,
                    child: read_window(c)?,
                    root_x: c.read_i16::<NativeEndian>()?,
                    root_y: c.read_i16::<NativeEndian>()?,
                    event_x: c.read_i16::<NativeEndian>()?,
                    event_y: c.read_i16::<NativeEndian>()?,
                    state: ModMask::from_bits_retain(c.read_u16::<NativeEndian>()?),
                    same_screen: c.read_u8()? != 0,
                })
            }

            /// Encode event to wire format (32 bytes), as a server would send it
            pub fn encode(&self, buffer: &mut [u8]) {
                buffer[..32].fill(0);
                buffer[0] = $code | if self.send_event { 0x80 } else { 0 };
                buffer[1] = self.detail.0;
                buffer[2..4].copy_from_slice(&self.sequence.to_ne_bytes());
                buffer[4..8].copy_from_slice(&self.time.get().to_ne_bytes());
                buffer[8..12].copy_from_slice(&self.root.id().get().to_ne_bytes());
                buffer[12..16].copy_from_slice(&self.event.id().get().to_ne_bytes());
                buffer[16..20].copy_from_slice(&self.child.id().get().to_ne_bytes());
                buffer[20..22].copy_from_slice(&self.root_x.to_ne_bytes());
                buffer[22..24].copy_from_slice(&self.root_y.to_ne_bytes());
                buffer[24..26].copy_from_slice(&self.event_x.to_ne_bytes());
                buffer[26..28].copy_from_slice(&self.event_y.to_ne_bytes());
                buffer[28..30].copy_from_slice(&self.state.bits().to_ne_bytes());
                buffer[30] = if self.same_screen { 1 } else { 0 };
            }
        }
    };
}

define_key_button_event!(KeyPressEvent, 2, Keycode);
define_key_button_event!(KeyReleaseEvent, 3, Keycode);
define_key_button_event!(ButtonPressEvent, 4, Button);
define_key_button_event!(ButtonReleaseEvent, 5, Button);

/// Motion detail is Normal (0) or Hint (1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionDetail(pub u8);

define_key_button_event!(MotionNotifyEvent, 6, MotionDetail);

#[derive(Debug, Clone)]
pub struct ExposeEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub window: Window,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub count: u16, // Number of following expose events
}

impl ExposeEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        Ok(ExposeEvent {
            sequence: c.read_u16::<NativeEndian>()?,
            send_event: false,
            window: read_window(c)?,
            x: c.read_u16::<NativeEndian>()?,
            y: c.read_u16::<NativeEndian>()?,
            width: c.read_u16::<NativeEndian>()?,
            height: c.read_u16::<NativeEndian>()?,
            count: c.read_u16::<NativeEndian>()?,
        })
    }

    pub fn encode(&self, buffer: &mut [u8]) {
        buffer[..32].fill(0);
        buffer[0] = EventType::Expose as u8 | if self.send_event { 0x80 } else { 0 };
        buffer[2..4].copy_from_slice(&self.sequence.to_ne_bytes());
        buffer[4..8].copy_from_slice(&self.window.id().get().to_ne_bytes());
        buffer[8..10].copy_from_slice(&self.x.to_ne_bytes());
        buffer[10..12].copy_from_slice(&self.y.to_ne_bytes());
        buffer[12..14].copy_from_slice(&self.width.to_ne_bytes());
        buffer[14..16].copy_from_slice(&self.height.to_ne_bytes());
        buffer[16..18].copy_from_slice(&self.count.to_ne_bytes());
    }
}

#[derive(Debug, Clone)]
pub struct DestroyNotifyEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub event: Window,
    pub window: Window,
}

impl DestroyNotifyEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        Ok(DestroyNotifyEvent {
            sequence: c.read_u16::<NativeEndian>()?,
            send_event: false,
            event: read_window(c)?,
            window: read_window(c)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct UnmapNotifyEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub event: Window,
    pub window: Window,
    pub from_configure: bool,
}

impl UnmapNotifyEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        Ok(UnmapNotifyEvent {
            sequence: c.read_u16::<NativeEndian>()?,
            send_event: false,
            event: read_window(c)?,
            window: read_window(c)?,
            from_configure: c.read_u8()? != 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MapNotifyEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub event: Window,
    pub window: Window,
    pub override_redirect: bool,
}

impl MapNotifyEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        Ok(MapNotifyEvent {
            sequence: c.read_u16::<NativeEndian>()?,
            send_event: false,
            event: read_window(c)?,
            window: read_window(c)?,
            override_redirect: c.read_u8()? != 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigureNotifyEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub event: Window,
    pub window: Window,
    pub above_sibling: Window,
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub override_redirect: bool,
}

impl ConfigureNotifyEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        Ok(ConfigureNotifyEvent {
            sequence: c.read_u16::<NativeEndian>()?,
            send_event: false,
            event: read_window(c)?,
            window: read_window(c)?,
            above_sibling: read_window(c)?,
            x: c.read_i16::<NativeEndian>()?,
            y: c.read_i16::<NativeEndian>()?,
            width: c.read_u16::<NativeEndian>()?,
            height: c.read_u16::<NativeEndian>()?,
            border_width: c.read_u16::<NativeEndian>()?,
            override_redirect: c.read_u8()? != 0,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ClientMessageEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub format: u8, // 8, 16, or 32
    pub window: Window,
    pub type_: Atom,
    pub data: ClientMessageData,
}

#[derive(Debug, Clone)]
pub enum ClientMessageData {
    Data8([u8; 20]),
    Data16([u16; 10]),
    Data32([u32; 5]),
}

impl ClientMessageEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let format = c.read_u8()?;
        let sequence = c.read_u16::<NativeEndian>()?;
        let window = read_window(c)?;
        let type_ = Atom(c.read_u32::<NativeEndian>()?);
        let data = match format {
            16 => {
                let mut data = [0u16; 10];
                c.read_u16_into::<NativeEndian>(&mut data)?;
                ClientMessageData::Data16(data)
            }
            32 => {
                let mut data = [0u32; 5];
                c.read_u32_into::<NativeEndian>(&mut data)?;
                ClientMessageData::Data32(data)
            }
            _ => {
                let mut data = [0u8; 20];
                std::io::Read::read_exact(c, &mut data)?;
                ClientMessageData::Data8(data)
            }
        };
        Ok(ClientMessageEvent {
            sequence,
            send_event: false,
            format,
            window,
            type_,
            data,
        })
    }
}

/// Which mapping changed in a MappingNotify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapping {
    Modifier,
    Keyboard,
    Pointer,
    /// A request value this client does not know
    Other(u8),
}

impl Mapping {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Mapping::Modifier,
            1 => Mapping::Keyboard,
            2 => Mapping::Pointer,
            other => Mapping::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Mapping::Modifier => 0,
            Mapping::Keyboard => 1,
            Mapping::Pointer => 2,
            Mapping::Other(value) => *value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MappingNotifyEvent {
    pub sequence: u16,
    pub send_event: bool,
    pub request: Mapping,
    pub first_keycode: Keycode,
    pub count: u8,
}

impl MappingNotifyEvent {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        c.read_u8()?;
        let sequence = c.read_u16::<NativeEndian>()?;
        let request = Mapping::from_u8(c.read_u8()?);
        Ok(MappingNotifyEvent {
            sequence,
            send_event: false,
            request,
            first_keycode: Keycode(c.read_u8()?),
            count: c.read_u8()?,
        })
    }

    pub fn encode(&self, buffer: &mut [u8]) {
        buffer[..32].fill(0);
        buffer[0] = EventType::MappingNotify as u8 | if self.send_event { 0x80 } else { 0 };
        buffer[2..4].copy_from_slice(&self.sequence.to_ne_bytes());
        buffer[4] = self.request.code();
        buffer[5] = self.first_keycode.get();
        buffer[6] = self.count;
    }
}

/// A recognised core event the client does not decode further
#[derive(Debug, Clone)]
pub struct OtherEvent {
    pub kind: EventType,
    pub sequence: u16,
    pub send_event: bool,
    pub raw: [u8; 32],
}

/// An event whose code is outside the core protocol range
#[derive(Debug, Clone)]
pub struct UnknownEvent {
    pub code: u16,
    pub sequence: u16,
    pub send_event: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_press() -> KeyPressEvent {
        KeyPressEvent {
            detail: Keycode(38),
            sequence: 12,
            send_event: false,
            time: Timestamp(1000),
            root: Window::new(0x1e1),
            event: Window::new(0x0040_0001),
            child: Window::NONE,
            root_x: 310,
            root_y: 420,
            event_x: 10,
            event_y: 20,
            state: ModMask::SHIFT | ModMask::CONTROL,
            same_screen: true,
        }
    }

    #[test]
    fn test_parse_key_press() {
        let mut buf = [0u8; 32];
        key_press().encode(&mut buf);

        match Event::parse(&buf).unwrap() {
            Event::KeyPress(e) => {
                assert_eq!(e.detail, Keycode(38));
                assert_eq!(e.event, Window::new(0x0040_0001));
                assert_eq!((e.event_x, e.event_y), (10, 20));
                assert_eq!(e.state, ModMask::SHIFT | ModMask::CONTROL);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_send_event_bit_is_stripped() {
        let mut buf = [0u8; 32];
        ExposeEvent {
            sequence: 3,
            send_event: false,
            window: Window::new(9),
            x: 0,
            y: 0,
            width: 350,
            height: 250,
            count: 0,
        }
        .encode(&mut buf);
        let event = Event::parse(&buf).unwrap();
        assert!(!event.is_send_event());

        buf[0] |= 0x80;
        let event = Event::parse(&buf).unwrap();
        assert_eq!(event.event_type(), Some(EventType::Expose));
        assert_eq!(event.code(), 12);
        assert_eq!(event.window(), Some(Window::new(9)));
        assert!(event.is_send_event());
        assert!(matches!(event, Event::Expose(ref e) if e.send_event));

        buf[0] = 99 | 0x80;
        let event = Event::parse(&buf).unwrap();
        assert!(matches!(event, Event::Unknown(ref e) if e.code == 99 && e.send_event));
    }

    #[test]
    fn test_mapping_notify_has_no_window() {
        let mut buf = [0u8; 32];
        MappingNotifyEvent {
            sequence: 1,
            send_event: false,
            request: Mapping::Keyboard,
            first_keycode: Keycode(8),
            count: 248,
        }
        .encode(&mut buf);

        let event = Event::parse(&buf).unwrap();
        assert!(matches!(event, Event::MappingNotify(ref e) if e.request == Mapping::Keyboard));
        assert_eq!(event.window(), None);
        assert_eq!(EventType::MappingNotify.selecting_mask(), None);
    }

    #[test]
    fn test_unrecognised_mapping_request_still_decodes() {
        let mut buf = [0u8; 32];
        buf[0] = EventType::MappingNotify as u8;
        buf[4] = 3;
        buf[5] = 8;
        match Event::parse(&buf).unwrap() {
            Event::MappingNotify(e) => {
                assert_eq!(e.request, Mapping::Other(3));
                assert_eq!(e.first_keycode, Keycode(8));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_recognised_but_undecoded_kind() {
        let mut buf = [0u8; 32];
        buf[0] = EventType::FocusIn as u8;
        let event = Event::parse(&buf).unwrap();
        assert!(matches!(event, Event::Other(ref e) if e.kind == EventType::FocusIn));
        assert_eq!(event.code(), 9);
    }

    #[test]
    fn test_unknown_code() {
        let mut buf = [0u8; 32];
        buf[0] = 99;
        buf[2..4].copy_from_slice(&5u16.to_ne_bytes());
        let event = Event::parse(&buf).unwrap();
        assert!(matches!(event, Event::Unknown(UnknownEvent { code: 99, sequence: 5, .. })));
        assert_eq!(event.event_type(), None);
    }

    #[test]
    fn test_short_packet_is_rejected() {
        assert!(Event::parse(&[2u8; 16]).is_err());
    }
}
