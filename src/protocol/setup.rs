//! X11 connection setup protocol
//!
//! This module handles the initial connection handshake between client and
//! server: the client sends a [`SetupRequest`], the server answers with a
//! [`SetupResponse`].

use super::*;
use byteorder::{NativeEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

/// Connection setup request from client
#[derive(Debug, Clone)]
pub struct SetupRequest {
    pub byte_order: ByteOrder,
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub authorization_protocol_name: String,
    pub authorization_protocol_data: Vec<u8>,
}

impl SetupRequest {
    /// Setup request in native byte order, optionally carrying authorization
    pub fn new(auth_name: &str, auth_data: &[u8]) -> Self {
        SetupRequest {
            byte_order: ByteOrder::native(),
            protocol_major_version: PROTOCOL_MAJOR_VERSION,
            protocol_minor_version: PROTOCOL_MINOR_VERSION,
            authorization_protocol_name: auth_name.to_string(),
            authorization_protocol_data: auth_data.to_vec(),
        }
    }

    /// Encode to the wire. Multi-byte fields use native order, so the byte
    /// order mark must match the host.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let name = self.authorization_protocol_name.as_bytes();
        let data = &self.authorization_protocol_data;

        let mut buffer = Vec::with_capacity(12 + padded_len(name.len()) + padded_len(data.len()));
        buffer.push(self.byte_order.mark());
        buffer.push(0); // Padding
        buffer.write_u16::<NativeEndian>(self.protocol_major_version)?;
        buffer.write_u16::<NativeEndian>(self.protocol_minor_version)?;
        buffer.write_u16::<NativeEndian>(name.len() as u16)?;
        buffer.write_u16::<NativeEndian>(data.len() as u16)?;
        buffer.extend_from_slice(&[0u8; 2]); // Padding

        buffer.extend_from_slice(name);
        buffer.extend_from_slice(&vec![0u8; pad(name.len())]);
        buffer.extend_from_slice(data);
        buffer.extend_from_slice(&vec![0u8; pad(data.len())]);
        Ok(buffer)
    }
}

/// Setup response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStatus {
    Failed = 0,
    Success = 1,
    Authenticate = 2,
}

/// Format information
#[derive(Debug, Clone)]
pub struct Format {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
}

/// Visual type information
#[derive(Debug, Clone)]
pub struct VisualType {
    pub visual_id: VisualID,
    pub class: u8,
    pub bits_per_rgb_value: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

/// Depth information
#[derive(Debug, Clone)]
pub struct Depth {
    pub depth: u8,
    pub visuals: Vec<VisualType>,
}

/// Screen information
#[derive(Debug, Clone)]
pub struct Screen {
    pub root: Window,
    pub default_colormap: Colormap,
    pub white_pixel: u32,
    pub black_pixel: u32,
    pub current_input_masks: u32,
    pub width_in_pixels: u16,
    pub height_in_pixels: u16,
    pub width_in_millimeters: u16,
    pub height_in_millimeters: u16,
    pub min_installed_maps: u16,
    pub max_installed_maps: u16,
    pub root_visual: VisualID,
    pub backing_stores: u8,
    pub save_unders: bool,
    pub root_depth: u8,
    pub allowed_depths: Vec<Depth>,
}

/// Setup reply (success case)
#[derive(Debug, Clone)]
pub struct SetupSuccess {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub release_number: u32,
    pub resource_id_base: u32,
    pub resource_id_mask: u32,
    pub motion_buffer_size: u32,
    pub maximum_request_length: u16,
    pub image_byte_order: ByteOrder,
    pub bitmap_format_bit_order: ByteOrder,
    pub bitmap_format_scanline_unit: u8,
    pub bitmap_format_scanline_pad: u8,
    pub min_keycode: u8,
    pub max_keycode: u8,
    pub vendor: String,
    pub pixmap_formats: Vec<Format>,
    pub roots: Vec<Screen>,
}

/// Setup failed response
#[derive(Debug, Clone)]
pub struct SetupFailed {
    pub protocol_major_version: u16,
    pub protocol_minor_version: u16,
    pub reason: String,
}

/// Setup response
#[derive(Debug, Clone)]
pub enum SetupResponse {
    Success(SetupSuccess),
    Failed(SetupFailed),
    Authenticate(String),
}

fn malformed(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("malformed setup reply: {}", what))
}

fn reason_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

impl SetupResponse {
    /// Read the server's answer to a setup request
    pub fn read<R: Read>(stream: &mut R) -> io::Result<Self> {
        let mut header = [0u8; 8];
        stream.read_exact(&mut header)?;

        let mut c = Cursor::new(&header[..]);
        let status = c.read_u8()?;
        let detail = c.read_u8()?;
        let protocol_major_version = c.read_u16::<NativeEndian>()?;
        let protocol_minor_version = c.read_u16::<NativeEndian>()?;
        let additional_length = c.read_u16::<NativeEndian>()? as usize;

        let mut data = vec![0u8; additional_length * 4];
        stream.read_exact(&mut data)?;

        match status {
            s if s == SetupStatus::Failed as u8 => {
                let reason_len = usize::from(detail).min(data.len());
                Ok(SetupResponse::Failed(SetupFailed {
                    protocol_major_version,
                    protocol_minor_version,
                    reason: reason_string(&data[..reason_len]),
                }))
            }
            s if s == SetupStatus::Authenticate as u8 => {
                Ok(SetupResponse::Authenticate(reason_string(&data)))
            }
            s if s == SetupStatus::Success as u8 => Ok(SetupResponse::Success(
                SetupSuccess::parse(protocol_major_version, protocol_minor_version, &data)?,
            )),
            other => Err(malformed(&format!("unknown status {}", other))),
        }
    }
}

impl SetupSuccess {
    /// Parse the success payload (everything after the 8-byte header)
    pub fn parse(major: u16, minor: u16, data: &[u8]) -> io::Result<Self> {
        let mut c = Cursor::new(data);
        let release_number = c.read_u32::<NativeEndian>()?;
        let resource_id_base = c.read_u32::<NativeEndian>()?;
        let resource_id_mask = c.read_u32::<NativeEndian>()?;
        let motion_buffer_size = c.read_u32::<NativeEndian>()?;
        let vendor_len = c.read_u16::<NativeEndian>()? as usize;
        let maximum_request_length = c.read_u16::<NativeEndian>()?;
        let num_screens = c.read_u8()?;
        let num_formats = c.read_u8()?;
        let image_byte_order = ByteOrder::from_u8(c.read_u8()?);
        let bitmap_format_bit_order = ByteOrder::from_u8(c.read_u8()?);
        let bitmap_format_scanline_unit = c.read_u8()?;
        let bitmap_format_scanline_pad = c.read_u8()?;
        let min_keycode = c.read_u8()?;
        let max_keycode = c.read_u8()?;
        c.set_position(c.position() + 4);

        let mut vendor = vec![0u8; padded_len(vendor_len)];
        c.read_exact(&mut vendor)
            .map_err(|_| malformed("vendor string truncated"))?;
        let vendor = String::from_utf8_lossy(&vendor[..vendor_len]).to_string();

        let mut pixmap_formats = Vec::with_capacity(num_formats as usize);
        for _ in 0..num_formats {
            let depth = c.read_u8()?;
            let bits_per_pixel = c.read_u8()?;
            let scanline_pad = c.read_u8()?;
            c.set_position(c.position() + 5);
            pixmap_formats.push(Format {
                depth,
                bits_per_pixel,
                scanline_pad,
            });
        }

        let mut roots = Vec::with_capacity(num_screens as usize);
        for _ in 0..num_screens {
            roots.push(Screen::parse(&mut c)?);
        }

        Ok(SetupSuccess {
            protocol_major_version: major,
            protocol_minor_version: minor,
            release_number,
            resource_id_base,
            resource_id_mask,
            motion_buffer_size,
            maximum_request_length,
            image_byte_order,
            bitmap_format_bit_order,
            bitmap_format_scanline_unit,
            bitmap_format_scanline_pad,
            min_keycode,
            max_keycode,
            vendor,
            pixmap_formats,
            roots,
        })
    }

    /// Encode a complete success reply the way a server sends it.
    ///
    /// The client never sends this; fake servers in tests do.
    pub fn encode<W: Write>(&self, stream: &mut W) -> io::Result<()> {
        let mut body = Vec::new();
        body.write_u32::<NativeEndian>(self.release_number)?;
        body.write_u32::<NativeEndian>(self.resource_id_base)?;
        body.write_u32::<NativeEndian>(self.resource_id_mask)?;
        body.write_u32::<NativeEndian>(self.motion_buffer_size)?;
        body.write_u16::<NativeEndian>(self.vendor.len() as u16)?;
        body.write_u16::<NativeEndian>(self.maximum_request_length)?;
        body.push(self.roots.len() as u8);
        body.push(self.pixmap_formats.len() as u8);
        body.push(self.image_byte_order as u8);
        body.push(self.bitmap_format_bit_order as u8);
        body.push(self.bitmap_format_scanline_unit);
        body.push(self.bitmap_format_scanline_pad);
        body.push(self.min_keycode);
        body.push(self.max_keycode);
        body.extend_from_slice(&[0u8; 4]);
        body.extend_from_slice(self.vendor.as_bytes());
        body.extend_from_slice(&vec![0u8; pad(self.vendor.len())]);

        for format in &self.pixmap_formats {
            body.push(format.depth);
            body.push(format.bits_per_pixel);
            body.push(format.scanline_pad);
            body.extend_from_slice(&[0u8; 5]);
        }
        for screen in &self.roots {
            screen.encode(&mut body)?;
        }

        let mut header = Vec::with_capacity(8);
        header.push(SetupStatus::Success as u8);
        header.push(0);
        header.write_u16::<NativeEndian>(self.protocol_major_version)?;
        header.write_u16::<NativeEndian>(self.protocol_minor_version)?;
        header.write_u16::<NativeEndian>((body.len() / 4) as u16)?;

        stream.write_all(&header)?;
        stream.write_all(&body)
    }

    /// Screen at `index`, if the server has one
    pub fn screen(&self, index: usize) -> Option<&Screen> {
        self.roots.get(index)
    }
}

impl Screen {
    fn parse(c: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let root = Window::new(c.read_u32::<NativeEndian>()?);
        let default_colormap = Colormap::new(c.read_u32::<NativeEndian>()?);
        let white_pixel = c.read_u32::<NativeEndian>()?;
        let black_pixel = c.read_u32::<NativeEndian>()?;
        let current_input_masks = c.read_u32::<NativeEndian>()?;
        let width_in_pixels = c.read_u16::<NativeEndian>()?;
        let height_in_pixels = c.read_u16::<NativeEndian>()?;
        let width_in_millimeters = c.read_u16::<NativeEndian>()?;
        let height_in_millimeters = c.read_u16::<NativeEndian>()?;
        let min_installed_maps = c.read_u16::<NativeEndian>()?;
        let max_installed_maps = c.read_u16::<NativeEndian>()?;
        let root_visual = VisualID::new(c.read_u32::<NativeEndian>()?);
        let backing_stores = c.read_u8()?;
        let save_unders = c.read_u8()? != 0;
        let root_depth = c.read_u8()?;
        let num_depths = c.read_u8()?;

        let mut allowed_depths = Vec::with_capacity(num_depths as usize);
        for _ in 0..num_depths {
            let depth = c.read_u8()?;
            c.read_u8()?;
            let num_visuals = c.read_u16::<NativeEndian>()?;
            c.set_position(c.position() + 4);

            let mut visuals = Vec::with_capacity(num_visuals as usize);
            for _ in 0..num_visuals {
                let visual_id = VisualID::new(c.read_u32::<NativeEndian>()?);
                let class = c.read_u8()?;
                let bits_per_rgb_value = c.read_u8()?;
                let colormap_entries = c.read_u16::<NativeEndian>()?;
                let red_mask = c.read_u32::<NativeEndian>()?;
                let green_mask = c.read_u32::<NativeEndian>()?;
                let blue_mask = c.read_u32::<NativeEndian>()?;
                c.set_position(c.position() + 4);
                visuals.push(VisualType {
                    visual_id,
                    class,
                    bits_per_rgb_value,
                    colormap_entries,
                    red_mask,
                    green_mask,
                    blue_mask,
                });
            }
            allowed_depths.push(Depth { depth, visuals });
        }

        Ok(Screen {
            root,
            default_colormap,
            white_pixel,
            black_pixel,
            current_input_masks,
            width_in_pixels,
            height_in_pixels,
            width_in_millimeters,
            height_in_millimeters,
            min_installed_maps,
            max_installed_maps,
            root_visual,
            backing_stores,
            save_unders,
            root_depth,
            allowed_depths,
        })
    }

    fn encode(&self, buffer: &mut Vec<u8>) -> io::Result<()> {
        buffer.write_u32::<NativeEndian>(self.root.id().get())?;
        buffer.write_u32::<NativeEndian>(self.default_colormap.id().get())?;
        buffer.write_u32::<NativeEndian>(self.white_pixel)?;
        buffer.write_u32::<NativeEndian>(self.black_pixel)?;
        buffer.write_u32::<NativeEndian>(self.current_input_masks)?;
        buffer.write_u16::<NativeEndian>(self.width_in_pixels)?;
        buffer.write_u16::<NativeEndian>(self.height_in_pixels)?;
        buffer.write_u16::<NativeEndian>(self.width_in_millimeters)?;
        buffer.write_u16::<NativeEndian>(self.height_in_millimeters)?;
        buffer.write_u16::<NativeEndian>(self.min_installed_maps)?;
        buffer.write_u16::<NativeEndian>(self.max_installed_maps)?;
        buffer.write_u32::<NativeEndian>(self.root_visual.get())?;
        buffer.push(self.backing_stores);
        buffer.push(if self.save_unders { 1 } else { 0 });
        buffer.push(self.root_depth);
        buffer.push(self.allowed_depths.len() as u8);

        for depth in &self.allowed_depths {
            buffer.push(depth.depth);
            buffer.push(0); // Padding
            buffer.write_u16::<NativeEndian>(depth.visuals.len() as u16)?;
            buffer.extend_from_slice(&[0u8; 4]); // Padding
            for visual in &depth.visuals {
                buffer.write_u32::<NativeEndian>(visual.visual_id.get())?;
                buffer.push(visual.class);
                buffer.push(visual.bits_per_rgb_value);
                buffer.write_u16::<NativeEndian>(visual.colormap_entries)?;
                buffer.write_u32::<NativeEndian>(visual.red_mask)?;
                buffer.write_u32::<NativeEndian>(visual.green_mask)?;
                buffer.write_u32::<NativeEndian>(visual.blue_mask)?;
                buffer.extend_from_slice(&[0u8; 4]); // Padding
            }
        }
        Ok(())
    }
}

/// Hands out client resource IDs from the base/mask pair the server assigned.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    base: u32,
    mask: u32,
    next: u32,
}

impl IdAllocator {
    pub fn new(base: u32, mask: u32) -> Self {
        IdAllocator { base, mask, next: 1 }
    }

    /// Next unused XID, or `None` once the mask is exhausted
    pub fn generate(&mut self) -> Option<XID> {
        if self.mask == 0 {
            return None;
        }
        let shift = self.mask.trailing_zeros();
        let value = self.next.checked_shl(shift)?;
        if value & !self.mask != 0 || value >> shift != self.next {
            return None;
        }
        self.next += 1;
        Some(XID::new(self.base | value))
    }
}

/// A plausible single-screen setup, used by fake servers in tests.
pub fn sample_setup(major: u16, minor: u16) -> SetupSuccess {
    SetupSuccess {
        protocol_major_version: major,
        protocol_minor_version: minor,
        release_number: 12_101_004,
        resource_id_base: 0x0040_0000,
        resource_id_mask: 0x001f_ffff,
        motion_buffer_size: 256,
        maximum_request_length: 65535,
        image_byte_order: ByteOrder::native(),
        bitmap_format_bit_order: ByteOrder::native(),
        bitmap_format_scanline_unit: 32,
        bitmap_format_scanline_pad: 32,
        min_keycode: 8,
        max_keycode: 255,
        vendor: "X11Session Fake Server".to_string(),
        pixmap_formats: vec![Format {
            depth: 24,
            bits_per_pixel: 32,
            scanline_pad: 32,
        }],
        roots: vec![sample_screen()],
    }
}

/// The single screen of [`sample_setup`]
pub fn sample_screen() -> Screen {
    Screen {
        root: Window::new(0x1e1),
        default_colormap: Colormap::new(0x20),
        white_pixel: 0x00ff_ffff,
        black_pixel: 0x0000_0000,
        current_input_masks: 0,
        width_in_pixels: 1920,
        height_in_pixels: 1080,
        width_in_millimeters: 508,
        height_in_millimeters: 285,
        min_installed_maps: 1,
        max_installed_maps: 1,
        root_visual: VisualID::new(0x21),
        backing_stores: 0,
        save_unders: false,
        root_depth: 24,
        allowed_depths: vec![Depth {
            depth: 24,
            visuals: vec![VisualType {
                visual_id: VisualID::new(0x21),
                class: 4, // TrueColor
                bits_per_rgb_value: 8,
                colormap_entries: 256,
                red_mask: 0xff0000,
                green_mask: 0x00ff00,
                blue_mask: 0x0000ff,
            }],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_request_layout() {
        let req = SetupRequest::new("MIT-MAGIC-COOKIE-1", &[0xaa; 16]);
        let buf = req.encode().unwrap();

        assert_eq!(buf[0], ByteOrder::native().mark());
        assert_eq!(u16::from_ne_bytes([buf[2], buf[3]]), 11);
        assert_eq!(u16::from_ne_bytes([buf[6], buf[7]]), 18);
        assert_eq!(u16::from_ne_bytes([buf[8], buf[9]]), 16);
        // 12 header + 20 padded name + 16 data
        assert_eq!(buf.len(), 48);
        assert_eq!(&buf[12..30], b"MIT-MAGIC-COOKIE-1");
    }

    #[test]
    fn test_success_reply_round_trip() {
        let mut wire = Vec::new();
        sample_setup(11, 0).encode(&mut wire).unwrap();

        let reply = SetupResponse::read(&mut wire.as_slice()).unwrap();
        let setup = match reply {
            SetupResponse::Success(setup) => setup,
            other => panic!("unexpected reply {:?}", other),
        };
        assert_eq!(setup.protocol_major_version, 11);
        assert_eq!(setup.protocol_minor_version, 0);
        assert_eq!(setup.vendor, "X11Session Fake Server");
        assert_eq!(setup.roots.len(), 1);
        let screen = setup.screen(0).unwrap();
        assert_eq!(screen.root, Window::new(0x1e1));
        assert_eq!(screen.white_pixel, 0xffffff);
        assert_eq!(screen.allowed_depths[0].visuals[0].visual_id, VisualID::new(0x21));
    }

    #[test]
    fn test_failed_reply_reason() {
        let reason = b"No protocol specified\n";
        let mut wire = vec![0u8, reason.len() as u8];
        wire.extend_from_slice(&11u16.to_ne_bytes());
        wire.extend_from_slice(&0u16.to_ne_bytes());
        wire.extend_from_slice(&((padded_len(reason.len()) / 4) as u16).to_ne_bytes());
        wire.extend_from_slice(reason);
        wire.extend_from_slice(&vec![0u8; pad(reason.len())]);

        match SetupResponse::read(&mut wire.as_slice()).unwrap() {
            SetupResponse::Failed(failed) => assert_eq!(failed.reason, "No protocol specified\n"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_truncated_reply_is_an_error() {
        let mut wire = Vec::new();
        sample_setup(11, 0).encode(&mut wire).unwrap();
        wire.truncate(40);
        assert!(SetupResponse::read(&mut wire.as_slice()).is_err());
    }

    #[test]
    fn test_id_allocation_stays_inside_mask() {
        let mut ids = IdAllocator::new(0x0040_0000, 0x001f_ffff);
        assert_eq!(ids.generate(), Some(XID::new(0x0040_0001)));
        assert_eq!(ids.generate(), Some(XID::new(0x0040_0002)));

        let mut tiny = IdAllocator::new(0x0100_0000, 0b1100);
        assert_eq!(tiny.generate(), Some(XID::new(0x0100_0004)));
        assert_eq!(tiny.generate(), Some(XID::new(0x0100_0008)));
        assert_eq!(tiny.generate(), Some(XID::new(0x0100_000c)));
        assert_eq!(tiny.generate(), None);
    }
}
