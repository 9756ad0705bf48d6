use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

/// Boundary to wherever avatar images live. Returns a URL the profile can
/// point at.
pub trait ImageStore {
    fn upload(&self, bytes: &[u8]) -> Result<String, ImageStoreError>;
}

/// Content-addressed files in a local directory, served as `file://` URLs.
#[derive(Debug, Clone)]
pub struct DirectoryImageStore {
    dir: PathBuf,
}

impl DirectoryImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageStore for DirectoryImageStore {
    fn upload(&self, bytes: &[u8]) -> Result<String, ImageStoreError> {
        if bytes.is_empty() {
            return Err(ImageStoreError::Rejected("image is empty".to_string()));
        }
        let extension = sniff_extension(bytes).ok_or_else(|| {
            ImageStoreError::Rejected("expected a PNG, JPEG, GIF or WebP image".to_string())
        })?;

        std::fs::create_dir_all(&self.dir)?;
        let dir = self.dir.canonicalize()?;
        let digest = format!("{:x}", Sha256::digest(bytes));
        let path = dir.join(format!("{digest}.{extension}"));
        if !path.exists() {
            std::fs::write(&path, bytes)?;
        }
        debug!(path = %path.display(), "stored avatar image");
        file_url(&path)
    }
}

fn file_url(path: &Path) -> Result<String, ImageStoreError> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| ImageStoreError::Rejected(format!("cannot address {}", path.display())))
}

fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("png")
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("jpg")
    } else if bytes.starts_with(b"GIF8") {
        Some("gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("webp")
    } else {
        None
    }
}

#[derive(Debug)]
pub enum ImageStoreError {
    Io(std::io::Error),
    Rejected(String),
}

impl fmt::Display for ImageStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageStoreError::Io(err) => write!(f, "image store I/O error: {}", err),
            ImageStoreError::Rejected(message) => write!(f, "image rejected: {}", message),
        }
    }
}

impl Error for ImageStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ImageStoreError::Io(err) => Some(err),
            ImageStoreError::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for ImageStoreError {
    fn from(value: std::io::Error) -> Self {
        ImageStoreError::Io(value)
    }
}
