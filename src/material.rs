use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Hex value of the gold used for the letter and the crown.
pub const GOLD_HEX: u32 = 0xffd700;

/// Color stored in linear space, ready to be uploaded to the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Self = Self::linear(1.0, 1.0, 1.0);

    pub const fn linear(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Converts 8-bit sRGB components (0-255) to linear space.
    pub fn from_srgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: srgb_to_linear(r as f32 / 255.0),
            g: srgb_to_linear(g as f32 / 255.0),
            b: srgb_to_linear(b as f32 / 255.0),
        }
    }

    /// Converts a `0xRRGGBB` sRGB value to linear space.
    pub fn from_hex(hex: u32) -> Self {
        Self::from_srgb8((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

/// Physically based surface description (metallic/roughness workflow).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardMaterial {
    pub color: Color,
    pub metalness: f32,
    pub roughness: f32,
}

impl StandardMaterial {
    pub fn new(color: Color, metalness: f32, roughness: f32) -> Self {
        Self {
            color,
            metalness: metalness.clamp(0.0, 1.0),
            roughness: roughness.clamp(0.0, 1.0),
        }
    }

    /// Gold used by the letter and the crown base.
    pub fn gold() -> Self {
        Self::new(Color::from_hex(GOLD_HEX), 0.7, 0.3)
    }

    /// Shinier gold used by the crown spikes.
    pub fn polished_gold() -> Self {
        Self::new(Color::from_hex(GOLD_HEX), 0.8, 0.2)
    }
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self::new(Color::WHITE, 0.0, 1.0)
    }
}
