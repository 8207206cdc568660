use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::bridge::HostBridge;
use crate::error::Result;
use crate::fs::expansion::ExpansionState;
use crate::fs::operations::{sort_entries, DirEntry};
use crate::fs::paths::{display_name, is_within, normalize_path};

/// A node in the explorer tree.
///
/// `children` is `None` until the directory has been listed at least once;
/// `Some(vec![])` means "listed and empty". Files never have children.
/// Nodes are shared through `Arc` and never mutated in place: every update
/// builds new nodes along the path to the change and reuses the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub children: Option<Vec<Arc<FileNode>>>,
}

impl FileNode {
    /// Unloaded node for a listing entry.
    pub fn from_entry(entry: &DirEntry) -> Self {
        Self {
            name: entry.name.clone(),
            path: normalize_path(&entry.path),
            is_dir: entry.is_directory,
            children: None,
        }
    }

    /// Whether this directory's children have been fetched.
    pub fn is_loaded(&self) -> bool {
        self.children.is_some()
    }
}

/// A flattened representation of a tree node for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    /// The last refresh of this directory failed; contents may be out of date.
    pub is_stale: bool,
}

/// Handle for one in-flight directory read.
///
/// Sequence numbers are handed out monotonically; a completion is only
/// applied if nothing newer has landed for the same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTicket {
    pub path: PathBuf,
    pub seq: u64,
    pub generation: u64,
}

/// What happened to a completed refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshApplied {
    /// New children were installed.
    Applied,
    /// The directory is not in the loaded tree; nothing to update.
    NotLoaded,
    /// A newer refresh for the same path already landed.
    Superseded,
    /// The result belongs to a root that has since been closed or replaced.
    StaleRoot,
    /// The listing failed; prior contents stay visible and the path is marked stale.
    Failed(String),
}

/// In-memory mirror of the directory structure under one root.
pub struct DirectoryTree {
    root: Arc<FileNode>,
    /// Bumped by the owner whenever the root is replaced; tickets from an older
    /// generation are discarded.
    generation: u64,
    next_seq: u64,
    applied: HashMap<PathBuf, u64>,
    stale: HashSet<PathBuf>,
}

impl DirectoryTree {
    /// Create an unloaded tree for `root_path`.
    pub fn new(root_path: &Path, generation: u64) -> Self {
        let path = normalize_path(root_path);
        Self {
            root: Arc::new(FileNode {
                name: display_name(&path),
                path,
                is_dir: true,
                children: None,
            }),
            generation,
            next_seq: 0,
            applied: HashMap::new(),
            stale: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Arc<FileNode> {
        &self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.root.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Locate any loaded node by path.
    pub fn find(&self, path: &Path) -> Option<&Arc<FileNode>> {
        find_in(&self.root, &normalize_path(path))
    }

    /// Whether `path` is a directory whose children are loaded.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.find(path).is_some_and(|n| n.is_loaded())
    }

    pub fn is_stale(&self, path: &Path) -> bool {
        self.stale.contains(&normalize_path(path))
    }

    /// Replace the children of `dir_path`, rebuilding only the nodes on the
    /// path from the root to it. Returns `false` if `dir_path` is not a
    /// directory in the current tree.
    pub fn replace_subtree(&mut self, dir_path: &Path, new_children: Vec<Arc<FileNode>>) -> bool {
        match replace_in(&self.root, &normalize_path(dir_path), new_children) {
            Some(new_root) => {
                self.root = new_root;
                true
            }
            None => false,
        }
    }

    /// Fetch the immediate children of `dir_path` through the host bridge.
    pub async fn load_children(
        bridge: &dyn HostBridge,
        dir_path: &Path,
    ) -> Result<Vec<Arc<FileNode>>> {
        let mut entries = bridge.read_directory(dir_path).await?;
        sort_entries(&mut entries);
        Ok(entries
            .iter()
            .map(|e| Arc::new(FileNode::from_entry(e)))
            .collect())
    }

    /// Start a refresh of `dir_path`. The caller performs the read and hands
    /// the result to [`DirectoryTree::complete_refresh`].
    pub fn begin_refresh(&mut self, dir_path: &Path) -> RefreshTicket {
        self.next_seq += 1;
        RefreshTicket {
            path: normalize_path(dir_path),
            seq: self.next_seq,
            generation: self.generation,
        }
    }

    /// Apply the result of a read started with [`DirectoryTree::begin_refresh`].
    ///
    /// Children that survive the refresh keep their existing node (and any
    /// loaded grandchildren), so repeated refreshes with no disk change leave
    /// the tree identical.
    pub fn complete_refresh(
        &mut self,
        ticket: RefreshTicket,
        result: Result<Vec<DirEntry>>,
    ) -> RefreshApplied {
        if ticket.generation != self.generation || !is_within(&ticket.path, self.root_path()) {
            debug!(path = %ticket.path.display(), "dropping refresh for a closed root");
            return RefreshApplied::StaleRoot;
        }
        if self
            .applied
            .get(&ticket.path)
            .is_some_and(|&seen| seen >= ticket.seq)
        {
            debug!(
                path = %ticket.path.display(),
                seq = ticket.seq,
                "dropping out-of-order refresh"
            );
            return RefreshApplied::Superseded;
        }
        self.applied.insert(ticket.path.clone(), ticket.seq);

        let mut entries = match result {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %ticket.path.display(), error = %e, "directory refresh failed");
                if self.find(&ticket.path).is_some() {
                    self.stale.insert(ticket.path.clone());
                }
                return RefreshApplied::Failed(e.to_string());
            }
        };
        sort_entries(&mut entries);

        let Some(existing) = self.find(&ticket.path) else {
            return RefreshApplied::NotLoaded;
        };
        if !existing.is_dir {
            return RefreshApplied::NotLoaded;
        }
        let merged = merge_children(existing.children.as_deref(), &entries);
        let removed: Vec<PathBuf> = existing
            .children
            .iter()
            .flatten()
            .filter(|old| !merged.iter().any(|n| Arc::ptr_eq(n, old)))
            .map(|old| old.path.clone())
            .collect();

        self.replace_subtree(&ticket.path, merged);
        self.stale.remove(&ticket.path);
        for path in removed {
            self.forget_under(&path);
        }
        RefreshApplied::Applied
    }

    /// Convenience: load and apply in one step.
    pub async fn refresh(&mut self, bridge: &dyn HostBridge, dir_path: &Path) -> RefreshApplied {
        let ticket = self.begin_refresh(dir_path);
        let result = bridge
            .refresh_directory(&ticket.path)
            .await
            .into_result(&ticket.path);
        self.complete_refresh(ticket, result)
    }

    /// Every directory whose children are currently loaded, root first.
    pub fn loaded_directories(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        collect_loaded(&self.root, &mut out);
        out
    }

    /// Drop sequence and stale bookkeeping for `path` and its descendants.
    fn forget_under(&mut self, path: &Path) {
        self.applied.retain(|p, _| !p.starts_with(path));
        self.stale.retain(|p| !p.starts_with(path));
    }

    /// Flatten the tree into display rows, honouring expansion state.
    ///
    /// The root row is always present and always expanded.
    pub fn visible_rows(&self, expansion: &ExpansionState, show_hidden: bool) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        rows.push(VisibleRow {
            name: self.root.name.clone(),
            path: self.root.path.clone(),
            is_dir: true,
            depth: 0,
            is_expanded: true,
            is_last_sibling: true,
            is_stale: self.stale.contains(&self.root.path),
        });
        self.flatten_children(&self.root, 1, expansion, show_hidden, &mut rows);
        rows
    }

    fn flatten_children(
        &self,
        node: &FileNode,
        depth: usize,
        expansion: &ExpansionState,
        show_hidden: bool,
        rows: &mut Vec<VisibleRow>,
    ) {
        let Some(children) = &node.children else {
            return;
        };
        let visible: Vec<&Arc<FileNode>> = children
            .iter()
            .filter(|c| show_hidden || !c.name.starts_with('.'))
            .collect();
        for (i, child) in visible.iter().enumerate() {
            let is_expanded = child.is_dir && expansion.is_expanded(&child.path);
            rows.push(VisibleRow {
                name: child.name.clone(),
                path: child.path.clone(),
                is_dir: child.is_dir,
                depth,
                is_expanded,
                is_last_sibling: i == visible.len() - 1,
                is_stale: self.stale.contains(&child.path),
            });
            if is_expanded {
                self.flatten_children(child, depth + 1, expansion, show_hidden, rows);
            }
        }
    }
}

fn find_in<'a>(node: &'a Arc<FileNode>, target: &Path) -> Option<&'a Arc<FileNode>> {
    if node.path == target {
        return Some(node);
    }
    if !target.starts_with(&node.path) {
        return None;
    }
    node.children
        .as_ref()?
        .iter()
        .find(|c| target.starts_with(&c.path))
        .and_then(|c| find_in(c, target))
}

fn replace_in(
    node: &Arc<FileNode>,
    target: &Path,
    new_children: Vec<Arc<FileNode>>,
) -> Option<Arc<FileNode>> {
    if node.path == target {
        return node.is_dir.then(|| {
            Arc::new(FileNode {
                name: node.name.clone(),
                path: node.path.clone(),
                is_dir: true,
                children: Some(new_children),
            })
        });
    }
    if !target.starts_with(&node.path) {
        return None;
    }
    let children = node.children.as_ref()?;
    let idx = children
        .iter()
        .position(|c| c.is_dir && target.starts_with(&c.path))?;
    let replaced = replace_in(&children[idx], target, new_children)?;

    let mut next = children.clone();
    next[idx] = replaced;
    Some(Arc::new(FileNode {
        name: node.name.clone(),
        path: node.path.clone(),
        is_dir: node.is_dir,
        children: Some(next),
    }))
}

/// Build the new child list for a refreshed directory, reusing the existing
/// node for every entry that is still the same kind of thing at the same path.
fn merge_children(old: Option<&[Arc<FileNode>]>, entries: &[DirEntry]) -> Vec<Arc<FileNode>> {
    let previous: HashMap<&Path, &Arc<FileNode>> = old
        .unwrap_or_default()
        .iter()
        .map(|n| (n.path.as_path(), n))
        .collect();

    entries
        .iter()
        .map(|entry| {
            let path = normalize_path(&entry.path);
            match previous.get(path.as_path()) {
                Some(node) if node.is_dir == entry.is_directory && node.name == entry.name => {
                    Arc::clone(node)
                }
                _ => Arc::new(FileNode::from_entry(entry)),
            }
        })
        .collect()
}

fn collect_loaded(node: &FileNode, out: &mut Vec<PathBuf>) {
    if let Some(children) = &node.children {
        out.push(node.path.clone());
        for child in children.iter().filter(|c| c.is_dir) {
            collect_loaded(child, out);
        }
    }
}
