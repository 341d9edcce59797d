//! Window-manager hints
//!
//! `WM_NORMAL_HINTS` is a `WM_SIZE_HINTS` property: eighteen 32-bit fields,
//! of which only the flags and the position/size slots are filled here.

use crate::protocol::Rectangle;
use bitflags::bitflags;

bitflags! {
    /// Which fields of a `WM_SIZE_HINTS` property are meaningful
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SizeHintFlags: u32 {
        const US_POSITION = 1 << 0;
        const US_SIZE = 1 << 1;
        const P_POSITION = 1 << 2;
        const P_SIZE = 1 << 3;
        const P_MIN_SIZE = 1 << 4;
        const P_MAX_SIZE = 1 << 5;
        const P_RESIZE_INC = 1 << 6;
        const P_ASPECT = 1 << 7;
        const P_BASE_SIZE = 1 << 8;
        const P_WIN_GRAVITY = 1 << 9;
    }
}

const SIZE_HINTS_FIELDS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeHints {
    pub flags: SizeHintFlags,
    pub geometry: Rectangle,
    pub min_size: Option<(u16, u16)>,
    pub max_size: Option<(u16, u16)>,
}

impl SizeHints {
    /// Program-specified position and size
    pub fn program(geometry: Rectangle) -> Self {
        SizeHints {
            flags: SizeHintFlags::P_POSITION | SizeHintFlags::P_SIZE,
            geometry,
            min_size: None,
            max_size: None,
        }
    }

    /// Property payload in native byte order (format 32)
    pub fn to_property(&self) -> Vec<u8> {
        let mut fields = [0u32; SIZE_HINTS_FIELDS];
        let mut flags = self.flags;

        fields[1] = self.geometry.x as i32 as u32;
        fields[2] = self.geometry.y as i32 as u32;
        fields[3] = u32::from(self.geometry.width);
        fields[4] = u32::from(self.geometry.height);
        if let Some((width, height)) = self.min_size {
            flags |= SizeHintFlags::P_MIN_SIZE;
            fields[5] = u32::from(width);
            fields[6] = u32::from(height);
        }
        if let Some((width, height)) = self.max_size {
            flags |= SizeHintFlags::P_MAX_SIZE;
            fields[7] = u32::from(width);
            fields[8] = u32::from(height);
        }
        fields[0] = flags.bits();

        fields.iter().flat_map(|field| field.to_ne_bytes()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(data: &[u8], index: usize) -> u32 {
        u32::from_ne_bytes([
            data[index * 4],
            data[index * 4 + 1],
            data[index * 4 + 2],
            data[index * 4 + 3],
        ])
    }

    #[test]
    fn test_program_hints_layout() {
        let data = SizeHints::program(Rectangle::new(200, 300, 350, 250)).to_property();
        assert_eq!(data.len(), 72);
        assert_eq!(field(&data, 0), 0b1100);
        assert_eq!(field(&data, 1), 200);
        assert_eq!(field(&data, 2), 300);
        assert_eq!(field(&data, 3), 350);
        assert_eq!(field(&data, 4), 250);
    }

    #[test]
    fn test_min_size_sets_flag() {
        let mut hints = SizeHints::program(Rectangle::new(-10, 0, 100, 100));
        hints.min_size = Some((50, 40));
        let data = hints.to_property();
        assert_eq!(field(&data, 0) & SizeHintFlags::P_MIN_SIZE.bits(), 1 << 4);
        assert_eq!(field(&data, 1) as i32, -10);
        assert_eq!((field(&data, 5), field(&data, 6)), (50, 40));
    }
}
