use std::io::Cursor;

use image::RgbaImage;
use thiserror::Error;

use crate::command::{run_command_bytes, CommandError};
use crate::display::Display;

pub mod region;

pub use region::{crop, crop_rect, PixelRect};

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capturable screen source available")]
    NoSource,
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("failed to decode captured image: {message}")]
    ImageDecodeFailed { message: String },
    #[error("screen capture timed out after {millis}ms")]
    TimedOut { millis: u64 },
}

pub type CaptureResult<T> = std::result::Result<T, CaptureError>;

/// Produces a full-resolution bitmap of a single output.
pub trait CaptureBackend: Send + Sync {
    fn capture_display(&self, display: &Display) -> CaptureResult<RgbaImage>;
}

const GRIM_COMMAND: &str = "grim";

/// Captures one output through `grim`, which writes a PNG to stdout.
#[derive(Debug, Default)]
pub struct GrimCaptureBackend;

impl CaptureBackend for GrimCaptureBackend {
    fn capture_display(&self, display: &Display) -> CaptureResult<RgbaImage> {
        let png = run_command_bytes(GRIM_COMMAND, &grim_args(&display.name))?;
        decode_capture(&png)
    }
}

fn grim_args(output: &str) -> [&str; 5] {
    ["-t", "png", "-o", output, "-"]
}

/// Encodes a bitmap as PNG, the format handed to the clipboard and to disk.
pub fn encode_png(bitmap: &RgbaImage) -> image::ImageResult<Vec<u8>> {
    let mut bytes = Vec::new();
    bitmap.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

pub(crate) fn decode_capture(bytes: &[u8]) -> CaptureResult<RgbaImage> {
    let image = image::load_from_memory(bytes).map_err(|err| CaptureError::ImageDecodeFailed {
        message: err.to_string(),
    })?;
    let bitmap = image.to_rgba8();
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(CaptureError::NoSource);
    }
    Ok(bitmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbaImage::new(width, height)).expect("png encoding should work")
    }

    #[test]
    fn decode_capture_reads_png_dimensions() {
        let bitmap = decode_capture(&png_bytes(64, 32)).expect("png should decode");
        assert_eq!(bitmap.dimensions(), (64, 32));
    }

    #[test]
    fn encode_png_writes_png_signature() {
        let bytes = png_bytes(2, 2);
        assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn decode_capture_rejects_garbage() {
        let err = decode_capture(b"not a png").expect_err("garbage should not decode");
        assert!(matches!(err, CaptureError::ImageDecodeFailed { .. }));
    }

    #[test]
    fn grim_is_limited_to_the_requested_output() {
        assert_eq!(grim_args("DP-1"), ["-t", "png", "-o", "DP-1", "-"]);
    }

    #[test]
    fn timeout_error_mentions_duration() {
        let err = CaptureError::TimedOut { millis: 2500 };
        assert!(err.to_string().contains("2500ms"));
    }
}
