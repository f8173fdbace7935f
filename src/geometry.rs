//! Shared geometric and color primitives used by macros, selection and capture.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RectFields")]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from a drag that may run towards the origin.
    ///
    /// Negative extents flip the origin; a zero extent yields `None`.
    pub fn normalized(x: i32, y: i32, width: i64, height: i64) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let (x, width) = normalize_axis(i64::from(x), width)?;
        let (y, height) = normalize_axis(i64::from(y), height)?;
        Some(Self::new(x, y, width, height))
    }

    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= i64::from(self.x) && x < self.right() && y >= i64::from(self.y) && y < self.bottom()
    }

    /// Re-expresses a rectangle given in global coordinates relative to `origin`.
    pub fn relative_to(&self, origin: &Rect) -> Self {
        Self::new(
            self.x.saturating_sub(origin.x),
            self.y.saturating_sub(origin.y),
            self.width,
            self.height,
        )
    }
}

#[derive(Deserialize)]
struct RectFields {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("area must have a positive size, got {width}x{height}")]
pub struct EmptyRectError {
    pub width: u32,
    pub height: u32,
}

impl TryFrom<RectFields> for Rect {
    type Error = EmptyRectError;

    fn try_from(fields: RectFields) -> Result<Self, Self::Error> {
        let RectFields {
            x,
            y,
            width,
            height,
        } = fields;
        if width == 0 || height == 0 {
            return Err(EmptyRectError { width, height });
        }
        Ok(Self::new(x, y, width, height))
    }
}

fn normalize_axis(origin: i64, extent: i64) -> Option<(i32, u32)> {
    let (start, length) = if extent < 0 {
        (origin + extent, -extent)
    } else {
        (origin, extent)
    };
    Some((i32::try_from(start).ok()?, u32::try_from(length).ok()?))
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn rgb(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::new(0x4C, 0xAF, 0x50)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color '{0}', expected #RRGGBB")]
pub struct ColorParseError(String);

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let hex = value.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(ColorParseError(value.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| ColorParseError(value.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_hex()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_flips_negative_extents() {
        assert_eq!(
            Rect::normalized(300, 200, -100, -50),
            Some(Rect::new(200, 150, 100, 50))
        );
        assert_eq!(
            Rect::normalized(10, 20, 30, 40),
            Some(Rect::new(10, 20, 30, 40))
        );
    }

    #[test]
    fn normalized_rejects_zero_extent() {
        assert_eq!(Rect::normalized(10, 10, 0, 40), None);
        assert_eq!(Rect::normalized(10, 10, 40, 0), None);
    }

    #[test]
    fn contains_point_is_half_open() {
        let rect = Rect::new(1920, 0, 1280, 1024);
        assert!(rect.contains_point(1920, 0));
        assert!(rect.contains_point(3199, 1023));
        assert!(!rect.contains_point(3200, 10));
        assert!(!rect.contains_point(1919, 10));
    }

    #[test]
    fn relative_to_subtracts_origin() {
        let display = Rect::new(1920, 0, 1280, 1024);
        let global = Rect::new(2000, 100, 50, 60);
        assert_eq!(global.relative_to(&display), Rect::new(80, 100, 50, 60));
    }

    #[test]
    fn deserialize_rejects_empty_areas() {
        let area: Rect =
            serde_json::from_str(r#"{"x":-5,"y":3,"width":20,"height":10}"#).unwrap();
        assert_eq!(area, Rect::new(-5, 3, 20, 10));

        let err = serde_json::from_str::<Rect>(r#"{"x":0,"y":0,"width":0,"height":10}"#)
            .expect_err("zero width must not load");
        assert!(err.to_string().contains("positive size"));
    }

    #[test]
    fn color_parses_with_and_without_hash() {
        assert_eq!("#4CAF50".parse::<Color>(), Ok(Color::new(76, 175, 80)));
        assert_eq!("ff0000".parse::<Color>(), Ok(Color::new(255, 0, 0)));
        assert!("#12345".parse::<Color>().is_err());
        assert!("#GG0000".parse::<Color>().is_err());
    }

    #[test]
    fn color_serializes_as_hex_string() {
        let json = serde_json::to_string(&Color::new(0, 184, 148)).unwrap();
        assert_eq!(json, "\"#00B894\"");
        let parsed: Color = serde_json::from_str("\"#00b894\"").unwrap();
        assert_eq!(parsed, Color::new(0, 184, 148));
    }
}
