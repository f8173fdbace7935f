use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbaImage;
use thiserror::Error;

use crate::capture::encode_png;

pub const DEFAULT_FILE_PREFIX: &str = "ft-capture";
const DEFAULT_SAVE_SUBDIR: &str = "Desktop";
const CAPTURE_EXTENSION: &str = "png";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("missing HOME environment variable")]
    MissingHomeDirectory,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode capture: {message}")]
    Encode { message: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Minimal filesystem surface used when persisting captures.
pub trait FileBackend: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn create_dir(&self, path: &Path) -> io::Result<()>;
    fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct FsBackend;

impl FileBackend for FsBackend {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        fs::write(path, bytes)
    }
}

/// Writes cropped captures into a save directory.
#[derive(Clone)]
pub struct StorageService {
    files: Arc<dyn FileBackend>,
    save_dir: PathBuf,
    prefix: String,
}

impl StorageService {
    pub fn with_paths(files: Arc<dyn FileBackend>, save_dir: PathBuf, prefix: &str) -> Self {
        Self {
            files,
            save_dir,
            prefix: prefix.to_string(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn allocate_target_path(&self, macro_name: &str, timestamp_ms: u128) -> PathBuf {
        self.save_dir
            .join(capture_file_name(&self.prefix, macro_name, timestamp_ms))
    }

    pub fn save_capture(&self, macro_name: &str, image: &RgbaImage) -> StorageResult<PathBuf> {
        let png = encode_png(image).map_err(|err| StorageError::Encode {
            message: err.to_string(),
        })?;
        self.ensure_save_dir()?;

        let target = self.allocate_target_path(macro_name, unix_millis());
        self.files
            .write_binary(&target, &png)
            .map_err(|source| StorageError::Write {
                path: target.clone(),
                source,
            })?;
        tracing::info!(path = %target.display(), "saved capture");
        Ok(target)
    }

    fn ensure_save_dir(&self) -> StorageResult<()> {
        if self.files.exists(&self.save_dir) {
            return Ok(());
        }
        self.files
            .create_dir(&self.save_dir)
            .map_err(|source| StorageError::CreateDir {
                path: self.save_dir.clone(),
                source,
            })
    }
}

pub fn default_save_dir() -> StorageResult<PathBuf> {
    let home = std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .ok_or(StorageError::MissingHomeDirectory)?;
    Ok(PathBuf::from(home).join(DEFAULT_SAVE_SUBDIR))
}

/// Replaces everything outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

pub fn capture_file_name(prefix: &str, macro_name: &str, timestamp_ms: u128) -> String {
    format!(
        "{prefix}-{}-{timestamp_ms}.{CAPTURE_EXTENSION}",
        sanitize_name(macro_name)
    )
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFiles {
        existing: Mutex<Vec<PathBuf>>,
        created: Mutex<Vec<PathBuf>>,
        written: Mutex<Vec<(PathBuf, usize)>>,
        fail_writes: bool,
    }

    impl FileBackend for FakeFiles {
        fn exists(&self, path: &Path) -> bool {
            self.existing.lock().unwrap().iter().any(|item| item == path)
        }

        fn create_dir(&self, path: &Path) -> io::Result<()> {
            self.created.lock().unwrap().push(path.to_path_buf());
            self.existing.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }

        fn write_binary(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), bytes.len()));
            Ok(())
        }
    }

    #[test]
    fn sanitize_name_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("Chart #1 (top)"), "Chart__1__top_");
        assert_eq!(sanitize_name("Grafik-Ü"), "Grafik__");
    }

    #[test]
    fn capture_file_name_uses_prefix_name_and_timestamp() {
        assert_eq!(
            capture_file_name("ft-capture", "Stock chart", 1_700_000_000_123),
            "ft-capture-Stock_chart-1700000000123.png"
        );
    }

    #[test]
    fn allocate_target_path_joins_save_dir() {
        let service = StorageService::with_paths(
            Arc::new(FakeFiles::default()),
            PathBuf::from("/home/test/Desktop"),
            DEFAULT_FILE_PREFIX,
        );
        assert_eq!(
            service.allocate_target_path("a", 5),
            PathBuf::from("/home/test/Desktop/ft-capture-a-5.png")
        );
    }

    #[test]
    fn save_capture_creates_missing_directory_once() {
        let files = Arc::new(FakeFiles::default());
        let service = StorageService::with_paths(
            files.clone(),
            PathBuf::from("/captures"),
            DEFAULT_FILE_PREFIX,
        );

        let first = service
            .save_capture("Macro", &RgbaImage::new(2, 2))
            .expect("save should work");
        service
            .save_capture("Macro", &RgbaImage::new(2, 2))
            .expect("second save should work");

        assert_eq!(*files.created.lock().unwrap(), vec![PathBuf::from("/captures")]);
        assert_eq!(files.written.lock().unwrap().len(), 2);
        assert!(first.starts_with("/captures"));
        let file_name = first.file_name().and_then(|name| name.to_str()).unwrap();
        assert!(file_name.starts_with("ft-capture-Macro-"));
        assert!(file_name.ends_with(".png"));
    }

    #[test]
    fn save_capture_reports_write_failures() {
        let files = Arc::new(FakeFiles {
            fail_writes: true,
            ..FakeFiles::default()
        });
        let service =
            StorageService::with_paths(files, PathBuf::from("/captures"), DEFAULT_FILE_PREFIX);
        let err = service
            .save_capture("Macro", &RgbaImage::new(1, 1))
            .expect_err("write should fail");
        assert!(matches!(err, StorageError::Write { .. }));
    }

    #[test]
    fn fs_backend_writes_real_files() {
        let dir = std::env::temp_dir().join(format!("ft-capture-storage-{}", std::process::id()));
        let service = StorageService::with_paths(Arc::new(FsBackend), dir.clone(), "test");

        let path = service
            .save_capture("real file", &RgbaImage::new(4, 4))
            .expect("fs save should work");

        let bytes = std::fs::read(&path).expect("saved file should exist");
        assert_eq!(&bytes[..4], &[0x89, 0x50, 0x4E, 0x47]);
        let _ = std::fs::remove_dir_all(dir);
    }
}
