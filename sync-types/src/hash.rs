//! Content fingerprints used to pair deletes with creates.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Opaque content fingerprint.
///
/// For files this is a hash of the byte content. For folders it is the
/// "content-names hash": a hash over the set of child names, independent of
/// the order in which they are listed. Displayed as standard base64.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already computed hash string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The hash of nothing, used before a component has been hashed.
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Check whether this hash has never been computed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hash a file's byte content.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(Sha256::digest(bytes)))
    }

    /// Hash a set of child names.
    ///
    /// Names are sorted first, so listing order does not matter.
    pub fn of_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<S> = names.into_iter().collect();
        names.sort_by(|a, b| a.as_ref().cmp(b.as_ref()));

        let mut hasher = Sha256::new();
        for name in &names {
            hasher.update(name.as_ref().as_bytes());
            // Separator so ["ab", "c"] and ["a", "bc"] differ
            hasher.update([0u8]);
        }
        Self(STANDARD.encode(hasher.finalize()))
    }

    /// Hash a file on disk.
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::of_bytes(&bytes))
    }

    /// Compute the content-names hash of a folder on disk.
    pub fn of_folder(path: &Path) -> io::Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(Self::of_names(names))
    }

    /// Hash whatever is at `path`: a file's content or a folder's names.
    pub fn of_path(path: &Path) -> io::Result<Self> {
        if path.is_dir() {
            Self::of_folder(path)
        } else {
            Self::of_file(path)
        }
    }

    /// The hash as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..8).unwrap_or(&self.0);
        write!(f, "ContentHash({short})")
    }
}

impl From<&str> for ContentHash {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Path, kind and content hash of a file or folder at some point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Location of the file or folder.
    pub path: PathBuf,
    /// Whether this is a folder.
    pub is_folder: bool,
    /// Content hash (empty if not yet computed).
    #[serde(default)]
    pub content_hash: ContentHash,
}

impl FileInfo {
    /// Create a new FileInfo without a hash.
    pub fn new(path: impl Into<PathBuf>, is_folder: bool) -> Self {
        Self {
            path: path.into(),
            is_folder,
            content_hash: ContentHash::empty(),
        }
    }

    /// Set the content hash.
    pub fn with_hash(mut self, content_hash: ContentHash) -> Self {
        self.content_hash = content_hash;
        self
    }

    /// Read kind and hash from disk.
    pub fn from_disk(path: &Path) -> io::Result<Self> {
        let is_folder = path.is_dir();
        Ok(Self {
            path: path.to_path_buf(),
            is_folder,
            content_hash: ContentHash::of_path(path)?,
        })
    }

    /// Whether this is a regular file.
    pub fn is_file(&self) -> bool {
        !self.is_folder
    }
}
