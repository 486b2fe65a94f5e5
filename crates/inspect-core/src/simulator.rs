// ── Simulator image directory ──
//
// A local simulator watches a directory and captures whatever image it
// finds there. Labels are handed over by clearing the directory and
// writing one BMP.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Extensions the simulator picks up.
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "png", "tif", "tiff", "jpg", "webp"];

/// File name every label image is written under (after any prefix).
pub const IMAGE_FILE_NAME: &str = "simulatorImage.bmp";

const PROBE_FILE_NAME: &str = "file";

/// Handle on a simulator's watched directory.
#[derive(Debug, Clone)]
pub struct SimulatorDirectory {
    path: PathBuf,
}

impl SimulatorDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail unless the directory exists and a file can be created and
    /// removed in it.
    pub fn probe_writable(&self) -> io::Result<()> {
        if !self.path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("simulator image directory {} does not exist", self.path.display()),
            ));
        }
        let probe = self.path.join(PROBE_FILE_NAME);
        std::fs::File::create(&probe)?;
        std::fs::remove_file(&probe)
    }

    /// Image files currently in the directory, sorted by name.
    pub fn images(&self) -> io::Result<Vec<PathBuf>> {
        let mut images = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)));
            if is_image && path.is_file() {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }

    /// Delete every image. Returns `false` if any could not be removed.
    pub fn delete_all_images(&self) -> bool {
        let images = match self.images() {
            Ok(images) => images,
            Err(e) => {
                warn!(error = %e, dir = %self.path.display(), "cannot list simulator images");
                return false;
            }
        };

        let mut ok = true;
        for image in images {
            if let Err(e) = std::fs::remove_file(&image) {
                debug!(error = %e, file = %image.display(), "simulator image not deleted");
                ok = false;
            }
        }
        ok
    }

    /// Underscore prefix longer than the leading underscores of any image
    /// left in the directory, so a new file sorts ahead of them.
    pub fn next_prefix(&self) -> io::Result<String> {
        let mut prefix = String::from("_");
        for image in self.images()? {
            let Some(name) = image.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            while name.starts_with(&prefix) {
                prefix.push('_');
            }
        }
        Ok(prefix)
    }

    /// Write `data` as `{prefix}simulatorImage.bmp`.
    pub fn save_image(&self, prefix: &str, data: &[u8]) -> io::Result<PathBuf> {
        let path = self.path.join(format!("{prefix}{IMAGE_FILE_NAME}"));
        std::fs::write(&path, data)?;
        debug!(file = %path.display(), bytes = data.len(), "wrote simulator image");
        Ok(path)
    }
}
