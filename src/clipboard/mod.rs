use image::RgbaImage;
use thiserror::Error;

use crate::capture::encode_png;
use crate::command::{run_command_with_stdin, CommandError};

const WL_COPY_COMMAND: &str = "wl-copy";
const MIME_IMAGE_PNG: &str = "image/png";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("failed to encode clipboard image: {message}")]
    Encode { message: String },
    #[error("failed to run wl-copy command: {0}")]
    Command(#[from] CommandError),
}

pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

pub trait ClipboardBackend: Send + Sync {
    fn write_image(&self, image: &RgbaImage) -> ClipboardResult<()>;
}

#[derive(Debug, Default)]
pub struct WlCopyBackend;

impl ClipboardBackend for WlCopyBackend {
    fn write_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
        let png = encode_png(image).map_err(|err| ClipboardError::Encode {
            message: err.to_string(),
        })?;
        run_command_with_stdin(WL_COPY_COMMAND, &["--type", MIME_IMAGE_PNG], &png)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClipboard {
        sizes: Mutex<Vec<(u32, u32)>>,
    }

    impl ClipboardBackend for RecordingClipboard {
        fn write_image(&self, image: &RgbaImage) -> ClipboardResult<()> {
            self.sizes.lock().unwrap().push(image.dimensions());
            Ok(())
        }
    }

    #[test]
    fn backend_trait_object_receives_image() {
        let clipboard = RecordingClipboard::default();
        let backend: &dyn ClipboardBackend = &clipboard;
        backend
            .write_image(&RgbaImage::new(3, 2))
            .expect("recording clipboard never fails");
        assert_eq!(*clipboard.sizes.lock().unwrap(), vec![(3, 2)]);
    }

    #[test]
    fn command_error_mentions_wl_copy() {
        let err = ClipboardError::Command(CommandError::Failed {
            command: WL_COPY_COMMAND.to_string(),
            message: "exit status: 1".to_string(),
        });
        assert!(format!("{err}").contains("wl-copy"));
    }
}
