//! Maps a logical-pixel selection onto a captured bitmap.
//!
//! Captured bitmaps are usually larger than the logical desktop on HiDPI
//! outputs, so the stored area is scaled by `bitmap width / primary logical
//! width` and then clamped so the crop never leaves the bitmap.

use image::RgbaImage;

use crate::geometry::Rect;

/// A rectangle in bitmap pixel space. Signed so that pre-clamp values can be
/// represented faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

pub fn scale_factor(bitmap_width: u32, logical_width: u32) -> f64 {
    debug_assert!(logical_width > 0, "primary display has zero logical width");
    f64::from(bitmap_width) / f64::from(logical_width.max(1))
}

pub fn scale_area(area: Rect, scale: f64) -> PixelRect {
    debug_assert!(scale.is_finite() && scale > 0.0, "invalid scale {scale}");
    let scaled = |value: f64| (value * scale).round() as i64;
    PixelRect::new(
        scaled(f64::from(area.x)),
        scaled(f64::from(area.y)),
        scaled(f64::from(area.width)),
        scaled(f64::from(area.height)),
    )
}

/// Clamps `rect` so it lies inside a `bitmap_width` x `bitmap_height` bitmap.
pub fn clamp_to_bitmap(rect: PixelRect, bitmap_width: u32, bitmap_height: u32) -> PixelRect {
    let (bitmap_width, bitmap_height) = (i64::from(bitmap_width), i64::from(bitmap_height));
    if bitmap_width == 0 || bitmap_height == 0 {
        return PixelRect::new(0, 0, 0, 0);
    }
    let x = rect.x.clamp(0, bitmap_width - 1);
    let y = rect.y.clamp(0, bitmap_height - 1);
    PixelRect::new(
        x,
        y,
        rect.width.min(bitmap_width - x).max(0),
        rect.height.min(bitmap_height - y).max(0),
    )
}

/// Pixel rectangle a crop of `area` will read from a bitmap of the given size.
pub fn crop_rect(
    bitmap_width: u32,
    bitmap_height: u32,
    logical_width: u32,
    area: Rect,
) -> PixelRect {
    let scale = scale_factor(bitmap_width, logical_width);
    clamp_to_bitmap(scale_area(area, scale), bitmap_width, bitmap_height)
}

/// Crops `bitmap` to `area`, expressed in logical pixels of a display that is
/// `logical_width` wide. The result may be empty; callers decide what an empty
/// crop means.
pub fn crop(bitmap: &RgbaImage, logical_width: u32, area: Rect) -> RgbaImage {
    let rect = crop_rect(bitmap.width(), bitmap.height(), logical_width, area);
    tracing::debug!(?area, ?rect, logical_width, "cropping capture");
    image::imageops::crop_imm(
        bitmap,
        rect.x as u32,
        rect.y as u32,
        rect.width as u32,
        rect.height as u32,
    )
    .to_image()
}
