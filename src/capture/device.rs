//! Video device capture

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{CaptureError, MediaCapture};

/// `EBUSY` on Linux and macOS
const EBUSY: i32 = 16;

/// Holds a video device node open while the mirror is live
pub struct DeviceCapture {
    path: PathBuf,
    handle: Option<File>,
}

impl DeviceCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
        }
    }

    fn classify(error: io::Error, path: &Path) -> CaptureError {
        match error.kind() {
            io::ErrorKind::NotFound => CaptureError::NotFound(path.to_owned()),
            io::ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ if error.raw_os_error() == Some(EBUSY) => CaptureError::Busy,
            _ => CaptureError::Other(error.to_string()),
        }
    }
}

impl MediaCapture for DeviceCapture {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Ok(());
        }

        let metadata =
            std::fs::metadata(&self.path).map_err(|e| Self::classify(e, &self.path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if !metadata.file_type().is_char_device() {
                return Err(CaptureError::Overconstrained(format!(
                    "{} is not a video device",
                    self.path.display()
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| Self::classify(e, &self.path))?;

        info!(path = ?self.path, "camera acquired");
        self.handle = Some(file);
        Ok(())
    }

    fn release(&mut self) {
        if self.handle.take().is_some() {
            info!(path = ?self.path, "camera released");
        }
    }

    #[cfg(test)]
    fn is_live(&self) -> bool {
        self.handle.is_some()
    }
}

/// Headless mode: pretends a feed is live
#[derive(Debug, Default)]
pub struct NullCapture {
    live: bool,
}

impl MediaCapture for NullCapture {
    fn acquire(&mut self) -> Result<(), CaptureError> {
        debug!("headless capture acquired");
        self.live = true;
        Ok(())
    }

    fn release(&mut self) {
        self.live = false;
    }

    #[cfg(test)]
    fn is_live(&self) -> bool {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device() {
        let mut capture = DeviceCapture::new("/nonexistent/glitch-mirror/video0");
        assert!(matches!(capture.acquire(), Err(CaptureError::NotFound(_))));
        assert!(!capture.is_live());
    }

    #[cfg(unix)]
    #[test]
    fn test_regular_file_is_not_a_camera() {
        let path = std::env::temp_dir().join(format!("glitch-mirror-capture-{}", std::process::id()));
        std::fs::write(&path, b"not a camera").unwrap();

        let mut capture = DeviceCapture::new(&path);
        let result = capture.acquire();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(CaptureError::Overconstrained(_))));
    }

    #[test]
    fn test_busy_classification() {
        let error = io::Error::from_raw_os_error(EBUSY);
        assert!(matches!(
            DeviceCapture::classify(error, Path::new("/dev/video0")),
            CaptureError::Busy
        ));
    }

    #[test]
    fn test_null_capture_lifecycle() {
        let mut capture = NullCapture::default();
        capture.acquire().unwrap();
        assert!(capture.is_live());
        capture.release();
        assert!(!capture.is_live());
    }
}
