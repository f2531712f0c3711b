use ratatui::style::Color;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Accepts `#RRGGBB` or `RRGGBB`.
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let hex = raw.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Fill variant at 70% opacity, as `#RRGGBBB3`.
    pub fn translucent_hex(self) -> String {
        format!("{self}B3")
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Rgb> for Color {
    fn from(rgb: Rgb) -> Self {
        Color::Rgb(rgb.0, rgb.1, rgb.2)
    }
}

pub const DEFAULT_PALETTE: [Rgb; 10] = [
    Rgb(0xFF, 0x63, 0x84), // red
    Rgb(0x36, 0xA2, 0xEB), // blue
    Rgb(0xFF, 0xCE, 0x56), // yellow
    Rgb(0x4B, 0xC0, 0xC0), // cyan
    Rgb(0x99, 0x66, 0xFF), // purple
    Rgb(0xFF, 0x9F, 0x40), // orange
    Rgb(0xE6, 0xE6, 0xE6), // grey
    Rgb(0xA2, 0xE8, 0xA2), // light green
    Rgb(0xFF, 0xA6, 0xA6), // light red
    Rgb(0xB3, 0xD1, 0xFF), // light blue
];

/// Label -> color, append-only for the life of the session.
///
/// Labels beyond the palette size wrap around and share colors with earlier ones.
#[derive(Debug, Clone)]
pub struct ColorAssigner {
    palette: Vec<Rgb>,
    assigned: HashMap<String, Rgb>,
}

impl Default for ColorAssigner {
    fn default() -> Self {
        Self::with_palette(DEFAULT_PALETTE.to_vec())
    }
}

impl ColorAssigner {
    pub fn with_palette(palette: Vec<Rgb>) -> Self {
        let palette = if palette.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            palette
        };
        Self {
            palette,
            assigned: HashMap::new(),
        }
    }

    pub fn color_for(&mut self, label: &str) -> Rgb {
        if let Some(color) = self.assigned.get(label) {
            return *color;
        }
        let color = self.palette[self.assigned.len() % self.palette.len()];
        self.assigned.insert(label.to_string(), color);
        color
    }
}
