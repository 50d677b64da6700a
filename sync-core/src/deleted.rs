//! Pending local deletes, indexed by content hash.
//!
//! When a file is deleted and a file with the same content appears elsewhere
//! before the delete is dispatched, the pair is a move. Files are matched by
//! content hash, folders by their content-names hash. Components with an
//! empty (not yet computed) hash are never indexed.

use peersync_types::ContentHash;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Index of paths sitting in `LocalDelete`.
#[derive(Debug, Default)]
pub struct DeleteIndex {
    files: HashMap<ContentHash, BTreeSet<PathBuf>>,
    folders: HashMap<ContentHash, PathBuf>,
    by_path: HashMap<PathBuf, (bool, ContentHash)>,
}

impl DeleteIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending delete. Returns `false` if the hash is empty.
    pub fn insert(&mut self, path: &Path, is_folder: bool, hash: &ContentHash) -> bool {
        if hash.is_empty() {
            return false;
        }
        self.remove(path);

        if is_folder {
            if let Some(previous) = self.folders.insert(hash.clone(), path.to_path_buf()) {
                self.by_path.remove(&previous);
            }
        } else {
            self.files
                .entry(hash.clone())
                .or_default()
                .insert(path.to_path_buf());
        }
        self.by_path
            .insert(path.to_path_buf(), (is_folder, hash.clone()));
        true
    }

    /// Forget the pending delete for `path`, if any.
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some((is_folder, hash)) = self.by_path.remove(path) else {
            return false;
        };
        if is_folder {
            if self.folders.get(&hash).map(PathBuf::as_path) == Some(path) {
                self.folders.remove(&hash);
            }
        } else if let Some(paths) = self.files.get_mut(&hash) {
            paths.remove(path);
            if paths.is_empty() {
                self.files.remove(&hash);
            }
        }
        true
    }

    /// Take a deleted file with `hash`, other than `except`.
    ///
    /// The entry is consumed: a second call with the same hash will not
    /// return the same path.
    pub fn take_file(&mut self, hash: &ContentHash, except: &Path) -> Option<PathBuf> {
        let candidate = self
            .files
            .get(hash)?
            .iter()
            .find(|p| p.as_path() != except)
            .cloned()?;
        self.remove(&candidate);
        Some(candidate)
    }

    /// Take the deleted folder with names hash `hash`, other than `except`.
    pub fn take_folder(&mut self, hash: &ContentHash, except: &Path) -> Option<PathBuf> {
        let candidate = self.folders.get(hash).filter(|p| p.as_path() != except)?.clone();
        self.remove(&candidate);
        Some(candidate)
    }

    /// Check whether `path` has a pending delete.
    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Number of indexed deletes.
    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    /// Check if no deletes are pending.
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> ContentHash {
        ContentHash::of_bytes(s.as_bytes())
    }

    #[test]
    fn take_file_consumes_once() {
        let mut index = DeleteIndex::new();
        index.insert(Path::new("/old.txt"), false, &hash("data"));

        assert_eq!(
            index.take_file(&hash("data"), Path::new("/new.txt")),
            Some(PathBuf::from("/old.txt"))
        );
        assert_eq!(index.take_file(&hash("data"), Path::new("/other.txt")), None);
        assert!(index.is_empty());
    }

    #[test]
    fn take_file_skips_except() {
        let mut index = DeleteIndex::new();
        index.insert(Path::new("/a"), false, &hash("same"));

        assert_eq!(index.take_file(&hash("same"), Path::new("/a")), None);
        assert!(index.contains(Path::new("/a")));
    }

    #[test]
    fn several_files_share_a_hash() {
        let mut index = DeleteIndex::new();
        index.insert(Path::new("/a"), false, &hash("same"));
        index.insert(Path::new("/b"), false, &hash("same"));

        let first = index.take_file(&hash("same"), Path::new("/c")).unwrap();
        let second = index.take_file(&hash("same"), Path::new("/c")).unwrap();
        assert_ne!(first, second);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn folders_by_names_hash() {
        let mut index = DeleteIndex::new();
        let names = ContentHash::of_names(["x", "y"]);
        index.insert(Path::new("/dir"), true, &names);

        assert_eq!(index.take_file(&names, Path::new("/other")), None);
        assert_eq!(
            index.take_folder(&names, Path::new("/moved")),
            Some(PathBuf::from("/dir"))
        );
        assert!(!index.contains(Path::new("/dir")));
    }

    #[test]
    fn newer_folder_replaces_older() {
        let mut index = DeleteIndex::new();
        let names = ContentHash::of_names(["x"]);
        index.insert(Path::new("/one"), true, &names);
        index.insert(Path::new("/two"), true, &names);

        assert!(!index.contains(Path::new("/one")));
        assert_eq!(
            index.take_folder(&names, Path::new("/three")),
            Some(PathBuf::from("/two"))
        );
    }

    #[test]
    fn remove_supersedes() {
        let mut index = DeleteIndex::new();
        index.insert(Path::new("/a"), false, &hash("a"));
        assert!(index.remove(Path::new("/a")));
        assert!(!index.remove(Path::new("/a")));
        assert_eq!(index.take_file(&hash("a"), Path::new("/b")), None);
    }

    #[test]
    fn empty_hash_not_indexed() {
        let mut index = DeleteIndex::new();
        assert!(!index.insert(Path::new("/a"), false, &ContentHash::empty()));
        assert!(index.is_empty());
    }
}
