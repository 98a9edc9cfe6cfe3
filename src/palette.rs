//! Fixed 16-colour palette shared by the renderer and the GIF encoder.
//!
//! Quantization is exact-match only: every colour the compositor paints must come
//! from [`PALETTE`]. Anything else falls back to slot 0.

use std::collections::HashMap;

pub const PALETTE_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn from_hex(value: u32) -> Self {
        Self(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }

    pub const fn key(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }
}

pub const PALETTE: [Rgb; PALETTE_SIZE] = [
    Rgb::from_hex(0x0f172a), // background
    Rgb::from_hex(0x111827), // panel
    Rgb::from_hex(0x1f2937), // input bar
    Rgb::from_hex(0x334155), // border
    Rgb::from_hex(0x3b82f6), // accent
    Rgb::from_hex(0x0b1020), // shadow
    Rgb::from_hex(0xe2e8f0), // text
    Rgb::from_hex(0x94a3b8), // dim text
    Rgb::from_hex(0x38bdf8), // user bubble
    Rgb::from_hex(0x1e293b), // reply bubble
    Rgb::from_hex(0xf8fafc), // white
    Rgb::from_hex(0x0f766e), // send button
    Rgb::from_hex(0x22c55e),
    Rgb::from_hex(0xf59e0b),
    Rgb::from_hex(0xef4444),
    Rgb::from_hex(0x64748b),
];

/// Named palette slots used by the compositor. The discriminant is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Swatch {
    Background = 0,
    Panel = 1,
    Input = 2,
    Border = 3,
    Accent = 4,
    Shadow = 5,
    Text = 6,
    TextDim = 7,
    UserBubble = 8,
    ReplyBubble = 9,
    White = 10,
    Send = 11,
}

impl Swatch {
    pub fn rgb(self) -> Rgb {
        PALETTE[self as usize]
    }
}

pub fn index_to_color(index: u8) -> Rgb {
    PALETTE[usize::from(index) % PALETTE_SIZE]
}

/// Flat `r, g, b, r, g, b, ...` table in slot order, the layout GIF colour tables use.
pub fn palette_bytes() -> Vec<u8> {
    PALETTE
        .iter()
        .flat_map(|color| [color.0, color.1, color.2])
        .collect()
}

/// Reverse lookup from packed RGB key to palette slot.
#[derive(Debug, Clone)]
pub struct ColorIndex {
    slots: HashMap<u32, u8>,
}

impl ColorIndex {
    pub fn new() -> Self {
        let mut slots = HashMap::with_capacity(PALETTE_SIZE);
        for (index, color) in PALETTE.iter().enumerate() {
            slots.entry(color.key()).or_insert(index as u8);
        }
        Self { slots }
    }

    pub fn lookup(&self, color: Rgb) -> u8 {
        self.slots.get(&color.key()).copied().unwrap_or(0)
    }
}

pub fn color_to_index(color: Rgb) -> u8 {
    PALETTE
        .iter()
        .position(|candidate| *candidate == color)
        .map(|index| index as u8)
        .unwrap_or(0)
}
