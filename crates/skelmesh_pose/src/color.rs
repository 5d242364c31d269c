//! Color components.

use std::ops::{Mul, MulAssign};

use glam::Vec4;

/// Linear RGBA color used for skeleton, slot and attachment tints.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Color {
    /// Red channel. [0.0, 1.0]
    pub r: f32,
    /// Green channel. [0.0, 1.0]
    pub g: f32,
    /// Blue channel. [0.0, 1.0]
    pub b: f32,
    /// Alpha channel. [0.0, 1.0]
    pub a: f32,
}

/// Error returned by [`Color::hex`].
#[derive(thiserror::Error, Debug)]
pub enum HexColorError {
    /// The string was not made of hex digit pairs.
    #[error("invalid hex color: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The string decoded to something other than 3 or 4 channels.
    #[error("hex color must have 6 or 8 digits, found {0}")]
    Length(usize),
}

impl Color {
    /// <div style="background-color:rgb(0%, 0%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    /// <div style="background-color:rgba(0%, 0%, 0%, 0%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const NONE: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    /// <div style="background-color:rgb(100%, 100%, 100%); width: 10px; padding: 10px; border: 1px solid;"></div>
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    /// New opaque `Color`.
    ///
    /// See also [`Color::rgba`], [`Color::hex`].
    pub const fn rgb(r: f32, g: f32, b: f32) -> Color {
        Color { r, g, b, a: 1.0 }
    }

    /// New `Color` with an explicit alpha.
    ///
    /// See also [`Color::rgb`], [`Color::rgba_u8`], [`Color::hex`].
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// New `Color` from 8-bit channels.
    pub fn rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Color {
        Color::rgba(
            r as f32 / u8::MAX as f32,
            g as f32 / u8::MAX as f32,
            b as f32 / u8::MAX as f32,
            a as f32 / u8::MAX as f32,
        )
    }

    /// Parse a `RRGGBB` or `RRGGBBAA` string, with or without a leading `#`.
    ///
    /// ```
    /// # use skelmesh_pose::color::Color;
    /// let c = Color::hex("#ff000080").unwrap();
    /// assert_eq!(c.to_rgba8(), [255, 0, 0, 128]);
    /// ```
    pub fn hex(hex: &str) -> Result<Color, HexColorError> {
        let bytes = hex::decode(hex.trim_start_matches('#'))?;
        match bytes[..] {
            [r, g, b] => Ok(Color::rgba_u8(r, g, b, u8::MAX)),
            [r, g, b, a] => Ok(Color::rgba_u8(r, g, b, a)),
            _ => Err(HexColorError::Length(bytes.len() * 2)),
        }
    }

    /// Returns this color with a different alpha.
    pub const fn with_a(self, a: f32) -> Color {
        Color { a, ..self }
    }

    /// Returns this color with the RGB channels multiplied by alpha.
    pub fn premultiplied(self) -> Color {
        Color::rgba(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    /// Convert to 8-bit channels, clamping out of range values.
    pub fn to_rgba8(self) -> [u8; 4] {
        fn channel(v: f32) -> u8 {
            (v.clamp(0.0, 1.0) * u8::MAX as f32).round() as u8
        }
        [
            channel(self.r),
            channel(self.g),
            channel(self.b),
            channel(self.a),
        ]
    }

    /// Convert to an `[r, g, b, a]` array.
    pub fn as_rgba_f32(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.as_rgba_f32()
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Color::rgba(r, g, b, a)
    }
}

impl From<Color> for Vec4 {
    fn from(color: Color) -> Self {
        Vec4::new(color.r, color.g, color.b, color.a)
    }
}

impl From<Vec4> for Color {
    fn from(vec4: Vec4) -> Self {
        Color::rgba(vec4.x, vec4.y, vec4.z, vec4.w)
    }
}

/// Componentwise tint, alpha included.
impl Mul<Color> for Color {
    type Output = Color;

    fn mul(self, rhs: Color) -> Self::Output {
        Color::rgba(
            self.r * rhs.r,
            self.g * rhs.g,
            self.b * rhs.b,
            self.a * rhs.a,
        )
    }
}

impl MulAssign<Color> for Color {
    fn mul_assign(&mut self, rhs: Color) {
        *self = *self * rhs;
    }
}

/// Scales the RGB channels, leaving alpha untouched.
impl Mul<f32> for Color {
    type Output = Color;

    fn mul(self, rhs: f32) -> Self::Output {
        Color::rgba(self.r * rhs, self.g * rhs, self.b * rhs, self.a)
    }
}

impl MulAssign<f32> for Color {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}
