//! In-memory mirror of the synchronized folder.
//!
//! Every known path has exactly one [`FileComponent`], which owns the
//! path's [`Action`]. Components refer to their parent by path, so the tree
//! is a flat map and subtrees are walked through the children name sets.

use crate::action::Action;
use peersync_types::ContentHash;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Errors from tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// The path is not below the synchronized root.
    #[error("{0} is outside the synchronized root")]
    OutsideRoot(PathBuf),

    /// The root itself cannot be moved or removed.
    #[error("cannot move or remove the root")]
    Root,

    /// No component exists at the path.
    #[error("no such path: {0}")]
    NotFound(PathBuf),

    /// A component cannot be moved into its own subtree or onto an ancestor.
    #[error("cannot move {from} to {to}: paths are nested")]
    IntoItself {
        /// Source of the move.
        from: PathBuf,
        /// Destination of the move.
        to: PathBuf,
    },
}

/// A file or folder known to the engine.
#[derive(Debug)]
pub struct FileComponent {
    path: PathBuf,
    is_folder: bool,
    content_hash: ContentHash,
    parent: Option<PathBuf>,
    children: BTreeSet<String>,
    action: Action,
    uploaded: bool,
}

impl FileComponent {
    fn new(path: PathBuf, is_folder: bool, content_hash: ContentHash, now: Instant) -> Self {
        let parent = path.parent().map(Path::to_path_buf);
        Self {
            action: Action::new(path.clone(), now),
            path,
            is_folder,
            content_hash,
            parent,
            children: BTreeSet::new(),
            uploaded: false,
        }
    }

    /// Location of the component.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this is a folder.
    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    /// Content hash (names hash for folders).
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    /// Replace the content hash of a file.
    ///
    /// Folder hashes follow their children and are not set from outside
    /// once the folder has any.
    pub fn set_content_hash(&mut self, content_hash: ContentHash) {
        if self.is_folder && !self.children.is_empty() {
            return;
        }
        self.content_hash = content_hash;
    }

    /// Parent path (`None` for the root).
    pub fn parent(&self) -> Option<&Path> {
        self.parent.as_deref()
    }

    /// Names of direct children.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    /// The pending change for this path.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Mutable access to the pending change.
    pub fn action_mut(&mut self) -> &mut Action {
        &mut self.action
    }

    /// Whether an operation for this component has reached the transfer layer.
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    /// Record that an operation was handed to the transfer layer.
    pub fn mark_uploaded(&mut self) {
        self.uploaded = true;
    }
}

/// Path-keyed hierarchy of components under one root.
#[derive(Debug)]
pub struct FileTree {
    root: PathBuf,
    nodes: HashMap<PathBuf, FileComponent>,
}

impl FileTree {
    /// Create a tree holding only the root folder.
    pub fn new(root: impl Into<PathBuf>, now: Instant) -> Self {
        let root = root.into();
        let empty = ContentHash::of_names(Vec::<String>::new());
        let mut node = FileComponent::new(root.clone(), true, empty, now);
        node.parent = None;

        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), node);
        Self { root, nodes }
    }

    /// The synchronized root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Look up a component.
    pub fn get(&self, path: &Path) -> Option<&FileComponent> {
        self.nodes.get(path)
    }

    /// Look up a component for modification.
    pub fn get_mut(&mut self, path: &Path) -> Option<&mut FileComponent> {
        self.nodes.get_mut(path)
    }

    /// Check whether a component exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    /// Number of components, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if only the root is known.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All known paths.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.nodes.keys().map(PathBuf::as_path)
    }

    /// All known components, in no particular order.
    pub fn components(&self) -> impl Iterator<Item = &FileComponent> {
        self.nodes.values()
    }

    /// Get the component at `path`, creating it (and missing ancestor
    /// folders) if needed.
    pub fn insert(
        &mut self,
        path: &Path,
        is_folder: bool,
        content_hash: ContentHash,
        now: Instant,
    ) -> Result<&mut FileComponent, TreeError> {
        self.check_inside(path)?;
        if !self.nodes.contains_key(path) {
            self.create(path.to_path_buf(), is_folder, content_hash, now);
        }
        self.nodes
            .get_mut(path)
            .ok_or_else(|| TreeError::NotFound(path.to_path_buf()))
    }

    /// Remove the component at `path` and its whole subtree.
    pub fn remove(&mut self, path: &Path) -> Result<Vec<FileComponent>, TreeError> {
        if path == self.root {
            return Err(TreeError::Root);
        }
        if !self.nodes.contains_key(path) {
            return Err(TreeError::NotFound(path.to_path_buf()));
        }

        let removed: Vec<FileComponent> = self
            .subtree(path)
            .into_iter()
            .filter_map(|p| self.nodes.remove(&p))
            .collect();

        if let Some(parent) = path.parent() {
            self.unlink(parent, path);
        }
        Ok(removed)
    }

    /// Paths of the component at `path` and all its descendants.
    pub fn subtree(&self, path: &Path) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![path.to_path_buf()];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                for name in &node.children {
                    stack.push(current.join(name));
                }
                out.push(current);
            }
        }
        out
    }

    /// Re-key the subtree at `from` to `to`.
    ///
    /// Anything already at `to` is replaced. Missing ancestors of `to` are
    /// created. Returns the `(old, new)` path of every moved component.
    pub fn move_subtree(
        &mut self,
        from: &Path,
        to: &Path,
        now: Instant,
    ) -> Result<Vec<(PathBuf, PathBuf)>, TreeError> {
        if from == self.root || to == self.root {
            return Err(TreeError::Root);
        }
        self.check_inside(to)?;
        if !self.nodes.contains_key(from) {
            return Err(TreeError::NotFound(from.to_path_buf()));
        }
        if from == to {
            return Ok(Vec::new());
        }
        if to.starts_with(from) || from.starts_with(to) {
            return Err(TreeError::IntoItself {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }

        if self.nodes.contains_key(to) {
            self.remove(to)?;
        }
        if let Some(parent) = to.parent() {
            if !self.nodes.contains_key(parent) {
                self.create(parent.to_path_buf(), true, ContentHash::empty(), now);
            }
        }

        let mut moved = Vec::new();
        for old in self.subtree(from) {
            let Some(mut node) = self.nodes.remove(&old) else {
                continue;
            };
            let new = match old.strip_prefix(from) {
                Ok(rest) if rest.as_os_str().is_empty() => to.to_path_buf(),
                Ok(rest) => to.join(rest),
                Err(_) => continue,
            };
            node.parent = new.parent().map(Path::to_path_buf);
            node.path = new.clone();
            node.action.rename(new.clone());
            self.nodes.insert(new.clone(), node);
            moved.push((old, new));
        }

        if let Some(parent) = from.parent() {
            self.unlink(parent, from);
        }
        if let Some(parent) = to.parent() {
            self.link(parent, to);
        }
        Ok(moved)
    }

    fn check_inside(&self, path: &Path) -> Result<(), TreeError> {
        if path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(TreeError::OutsideRoot(path.to_path_buf()))
        }
    }

    /// Create `path` and any missing ancestors. `path` must be inside the root.
    fn create(&mut self, path: PathBuf, is_folder: bool, content_hash: ContentHash, now: Instant) {
        let mut missing = vec![(path, is_folder, content_hash)];
        loop {
            let parent = match missing.last().and_then(|(p, _, _)| p.parent()) {
                Some(p) if p.starts_with(&self.root) && !self.nodes.contains_key(p) => {
                    p.to_path_buf()
                }
                _ => break,
            };
            missing.push((parent, true, ContentHash::empty()));
        }

        while let Some((path, is_folder, content_hash)) = missing.pop() {
            let node = FileComponent::new(path.clone(), is_folder, content_hash, now);
            self.nodes.insert(path.clone(), node);
            if let Some(parent) = path.parent() {
                self.link(parent, &path);
            }
        }
    }

    fn link(&mut self, parent: &Path, child: &Path) {
        let Some(name) = child.file_name() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.insert(name.to_string_lossy().into_owned());
            node.content_hash = ContentHash::of_names(&node.children);
        }
    }

    fn unlink(&mut self, parent: &Path, child: &Path) {
        let Some(name) = child.file_name() else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.remove(name.to_string_lossy().as_ref());
            node.content_hash = ContentHash::of_names(&node.children);
        }
    }
}
