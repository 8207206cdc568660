use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use notify::{RecommendedWatcher, Watcher};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::fs::paths::normalize_path;

/// Default patterns to ignore when watching the filesystem.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
];

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default flood threshold (events per debounce window).
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Kind of a file-system change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
    /// Too many changes to report individually; everything under the path
    /// should be re-read.
    Rescan,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
            ChangeKind::AddDir => "addDir",
            ChangeKind::UnlinkDir => "unlinkDir",
            ChangeKind::Rescan => "rescan",
        }
    }
}

/// One logical change under the watched root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: PathBuf,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Tuning for a watch session.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub debounce: Duration,
    pub ignore_patterns: Vec<String>,
    pub flood_threshold: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            flood_threshold: DEFAULT_FLOOD_THRESHOLD,
        }
    }
}

/// Check if a path under `root` should be ignored based on ignore patterns.
///
/// A path is ignored if any of its components below `root` match any ignore
/// pattern exactly. Components of `root` itself never count.
pub fn should_ignore(path: &Path, root: &Path, patterns: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|p| name == p.as_str())
        }
        _ => false,
    })
}

/// Turns the debouncer's bare "something happened here" paths into typed
/// events by comparing the disk against the set of paths seen so far.
pub struct ChangeClassifier {
    root: PathBuf,
    ignore_patterns: Vec<String>,
    /// Every known path under the root, mapped to whether it is a directory.
    known: HashMap<PathBuf, bool>,
}

impl ChangeClassifier {
    /// Build a classifier and index everything currently under `root`.
    pub fn new(root: &Path, ignore_patterns: Vec<String>) -> Self {
        let mut classifier = Self {
            root: normalize_path(root),
            ignore_patterns,
            known: HashMap::new(),
        };
        classifier.reindex();
        classifier
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Throw away the index and walk the root again.
    pub fn reindex(&mut self) {
        self.known.clear();
        let root = self.root.clone();
        self.index_below(&root, &mut HashSet::new());
    }

    fn index_below(&mut self, dir: &Path, fresh: &mut HashSet<PathBuf>) {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let Ok(entries) = fs::read_dir(&current) else {
                continue;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if should_ignore(&path, &self.root, &self.ignore_patterns) {
                    continue;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir {
                    stack.push(path.clone());
                }
                fresh.insert(path.clone());
                self.known.insert(path, is_dir);
            }
        }
    }

    /// Classify one debounce window's worth of touched paths.
    ///
    /// Paths are processed shallowest first so a removed directory produces a
    /// single `UnlinkDir` and swallows its descendants. Touched directories that
    /// still exist produce no event; their listing is refreshed through the
    /// entries that changed inside them.
    pub fn classify(&mut self, paths: Vec<PathBuf>) -> Vec<ChangeEvent> {
        let mut paths: Vec<PathBuf> = paths
            .iter()
            .map(|p| normalize_path(p))
            .filter(|p| p != &self.root && p.starts_with(&self.root))
            .filter(|p| !should_ignore(p, &self.root, &self.ignore_patterns))
            .collect();
        paths.sort_by(|a, b| {
            a.components()
                .count()
                .cmp(&b.components().count())
                .then_with(|| a.cmp(b))
        });
        paths.dedup();

        let mut fresh = HashSet::new();
        let mut events = Vec::new();
        for path in paths {
            match fs::symlink_metadata(&path) {
                Ok(meta) => {
                    let is_dir = meta.is_dir();
                    match self.known.get(&path).copied() {
                        Some(was_dir) if was_dir == is_dir && !fresh.contains(&path) => {
                            if !is_dir {
                                events.push(ChangeEvent::new(ChangeKind::Change, path));
                            }
                        }
                        Some(was_dir) if was_dir != is_dir => {
                            self.forget(&path, was_dir);
                            events.push(ChangeEvent::new(unlink_kind(was_dir), path.clone()));
                            self.learn(&path, is_dir, &mut fresh);
                            events.push(ChangeEvent::new(add_kind(is_dir), path));
                        }
                        _ => {
                            self.learn(&path, is_dir, &mut fresh);
                            events.push(ChangeEvent::new(add_kind(is_dir), path));
                        }
                    }
                }
                Err(_) => {
                    if let Some(was_dir) = self.known.get(&path).copied() {
                        self.forget(&path, was_dir);
                        events.push(ChangeEvent::new(unlink_kind(was_dir), path));
                    }
                }
            }
        }
        events
    }

    fn learn(&mut self, path: &Path, is_dir: bool, fresh: &mut HashSet<PathBuf>) {
        self.known.insert(path.to_path_buf(), is_dir);
        fresh.insert(path.to_path_buf());
        if is_dir {
            self.index_below(path, fresh);
        }
    }

    fn forget(&mut self, path: &Path, was_dir: bool) {
        if was_dir {
            self.known.retain(|p, _| !p.starts_with(path));
        } else {
            self.known.remove(path);
        }
    }
}

fn add_kind(is_dir: bool) -> ChangeKind {
    if is_dir {
        ChangeKind::AddDir
    } else {
        ChangeKind::Add
    }
}

fn unlink_kind(was_dir: bool) -> ChangeKind {
    if was_dir {
        ChangeKind::UnlinkDir
    } else {
        ChangeKind::Unlink
    }
}

pub type SubscriberId = u64;

type SubscriberList = Vec<(SubscriberId, mpsc::UnboundedSender<ChangeEvent>)>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fan-out list of change listeners. Every subscriber gets every event;
/// subscribers whose receiver was dropped are pruned on the next send.
#[derive(Clone, Default)]
pub struct Subscribers {
    inner: Arc<Mutex<SubscriberList>>,
    next_id: Arc<AtomicU64>,
}

impl Subscribers {
    pub fn subscribe(&self) -> (SubscriberId, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        lock(&self.inner).push((id, tx));
        (id, rx)
    }

    /// Remove one listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut list = lock(&self.inner);
        let before = list.len();
        list.retain(|(sid, _)| *sid != id);
        list.len() != before
    }

    pub fn broadcast(&self, event: &ChangeEvent) {
        lock(&self.inner).retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Identifies one watch session. Stopping with a handle from an older
/// session is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchHandle {
    pub id: u64,
    pub root: PathBuf,
}

struct WatchSession {
    handle: WatchHandle,
    alive: Arc<AtomicBool>,
    _debouncer: Debouncer<RecommendedWatcher>,
}

/// Owns the single live watch session and the subscriber list it feeds.
pub struct WatchManager {
    options: WatchOptions,
    subscribers: Subscribers,
    session: Mutex<Option<WatchSession>>,
    next_id: AtomicU64,
}

impl WatchManager {
    pub fn new(options: WatchOptions) -> Self {
        Self {
            options,
            subscribers: Subscribers::default(),
            session: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn subscribers(&self) -> &Subscribers {
        &self.subscribers
    }

    /// Start watching `root` recursively, tearing down any previous session
    /// first. Blocks while the initial index is built.
    pub fn start(&self, root: &Path) -> Result<WatchHandle> {
        let root = normalize_path(root);
        self.stop_current();
        if !root.is_dir() {
            return Err(AppError::InvalidPath(format!(
                "Not a directory: {}",
                root.display()
            )));
        }

        let handle = WatchHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            root: root.clone(),
        };
        let alive = Arc::new(AtomicBool::new(true));
        let mut classifier = ChangeClassifier::new(&root, self.options.ignore_patterns.clone());
        let alive_cb = Arc::clone(&alive);
        let subscribers = self.subscribers.clone();
        let flood_threshold = self.options.flood_threshold;
        let ignore_patterns = self.options.ignore_patterns.clone();
        let session_root = root.clone();

        let mut debouncer = new_debouncer(
            self.options.debounce,
            move |result: std::result::Result<Vec<DebouncedEvent>, notify::Error>| {
                if !alive_cb.load(Ordering::Relaxed) {
                    return;
                }
                let events = match result {
                    Ok(events) => events,
                    Err(e) => {
                        warn!(error = %e, "watcher error");
                        return;
                    }
                };
                if !session_root.is_dir() {
                    info!(root = %session_root.display(), "watched root disappeared; stopping");
                    alive_cb.store(false, Ordering::Relaxed);
                    return;
                }

                let paths: Vec<PathBuf> = events
                    .into_iter()
                    .map(|e| normalize_path(&e.path))
                    .filter(|p| !should_ignore(p, &session_root, &ignore_patterns))
                    .collect();
                if paths.is_empty() {
                    return;
                }

                if paths.len() > flood_threshold {
                    debug!(count = paths.len(), "change flood; requesting rescan");
                    classifier.reindex();
                    subscribers.broadcast(&ChangeEvent::new(ChangeKind::Rescan, session_root.clone()));
                    return;
                }
                for event in classifier.classify(paths) {
                    debug!(kind = event.kind.as_str(), path = %event.path.display(), "fs change");
                    subscribers.broadcast(&event);
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(&root, notify::RecursiveMode::Recursive)?;

        info!(root = %root.display(), session = handle.id, "watch session started");
        *lock(&self.session) = Some(WatchSession {
            handle: handle.clone(),
            alive,
            _debouncer: debouncer,
        });
        Ok(handle)
    }

    /// Stop the session identified by `handle`. Returns `false` if that
    /// session is not the current one.
    pub fn stop(&self, handle: &WatchHandle) -> bool {
        let mut slot = lock(&self.session);
        if slot.as_ref().is_some_and(|s| s.handle == *handle) {
            if let Some(session) = slot.take() {
                session.alive.store(false, Ordering::Relaxed);
                info!(root = %handle.root.display(), session = handle.id, "watch session stopped");
            }
            true
        } else {
            false
        }
    }

    /// Stop whatever session is live, if any.
    pub fn stop_current(&self) {
        if let Some(session) = lock(&self.session).take() {
            session.alive.store(false, Ordering::Relaxed);
            info!(
                root = %session.handle.root.display(),
                session = session.handle.id,
                "watch session stopped"
            );
        }
    }

    /// Handle of the current session, live or not.
    pub fn current(&self) -> Option<WatchHandle> {
        lock(&self.session).as_ref().map(|s| s.handle.clone())
    }

    /// Whether a session exists, has not been stopped, and its root is still there.
    pub fn is_watching(&self) -> bool {
        lock(&self.session)
            .as_ref()
            .is_some_and(|s| s.alive.load(Ordering::Relaxed) && s.handle.root.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> Vec<String> {
        DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ignore_git_directory() {
        let patterns = vec![".git".to_string()];
        let root = Path::new("/home/user/project");
        assert!(should_ignore(
            Path::new("/home/user/project/.git/HEAD"),
            root,
            &patterns
        ));
        assert!(should_ignore(
            Path::new("/home/user/project/.git/objects/abc"),
            root,
            &patterns
        ));
    }

    #[test]
    fn do_not_ignore_normal_paths() {
        let patterns = vec![".git".to_string(), "node_modules".to_string()];
        assert!(!should_ignore(
            Path::new("/home/user/project/src/main.rs"),
            Path::new("/home/user/project"),
            &patterns
        ));
    }

    #[test]
    fn partial_name_does_not_match() {
        let patterns = vec!["target".to_string()];
        assert!(!should_ignore(
            Path::new("/project/target2/file.txt"),
            Path::new("/project"),
            &patterns
        ));
    }

    #[test]
    fn ignored_names_above_root_do_not_count() {
        let patterns = vec!["target".to_string()];
        let root = Path::new("/build/target/proj");
        assert!(!should_ignore(Path::new("/build/target/proj/src/a.rs"), root, &patterns));
        assert!(should_ignore(Path::new("/build/target/proj/target/debug"), root, &patterns));
    }

    #[test]
    fn classify_under_root_inside_ignored_name() {
        let tmp = TempDir::new().unwrap();
        let proj = tmp.path().join("target").join("proj");
        fs::create_dir_all(&proj).unwrap();
        fs::write(proj.join("a.txt"), "").unwrap();
        let mut classifier = ChangeClassifier::new(&proj, defaults());
        let root = classifier.root().to_path_buf();
        assert_eq!(classifier.known_len(), 1);

        fs::write(root.join("b.txt"), "").unwrap();
        let events = classifier.classify(vec![root.join("b.txt")]);
        assert_eq!(events, vec![ChangeEvent::new(ChangeKind::Add, root.join("b.txt"))]);
    }

    #[test]
    fn change_kind_wire_names() {
        assert_eq!(ChangeKind::AddDir.as_str(), "addDir");
        let json = serde_json::to_string(&ChangeEvent::new(ChangeKind::UnlinkDir, "/p/a")).unwrap();
        assert_eq!(json, r#"{"type":"unlinkDir","path":"/p/a"}"#);
    }

    #[test]
    fn classify_new_file_and_dir() {
        let tmp = TempDir::new().unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();

        fs::write(root.join("new.txt"), "x").unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        let events = classifier.classify(vec![root.join("sub"), root.join("new.txt")]);
        assert_eq!(
            events,
            vec![
                ChangeEvent::new(ChangeKind::Add, root.join("new.txt")),
                ChangeEvent::new(ChangeKind::AddDir, root.join("sub")),
            ]
        );
    }

    #[test]
    fn classify_modified_known_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "1").unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();

        fs::write(root.join("a.txt"), "2").unwrap();
        let events = classifier.classify(vec![root.join("a.txt"), root.join("a.txt")]);
        assert_eq!(events, vec![ChangeEvent::new(ChangeKind::Change, root.join("a.txt"))]);
    }

    #[test]
    fn classify_removed_dir_swallows_children() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("d/e")).unwrap();
        fs::write(tmp.path().join("d/e/f.txt"), "").unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();
        assert_eq!(classifier.known_len(), 3);

        fs::remove_dir_all(root.join("d")).unwrap();
        let events = classifier.classify(vec![
            root.join("d/e/f.txt"),
            root.join("d/e"),
            root.join("d"),
        ]);
        assert_eq!(events, vec![ChangeEvent::new(ChangeKind::UnlinkDir, root.join("d"))]);
        assert_eq!(classifier.known_len(), 0);
    }

    #[test]
    fn classify_unknown_missing_path_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();
        assert!(classifier.classify(vec![root.join("ghost.txt")]).is_empty());
    }

    #[test]
    fn classify_file_inside_new_dir_is_add() {
        let tmp = TempDir::new().unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();

        fs::create_dir(root.join("pkg")).unwrap();
        fs::write(root.join("pkg/lib.rs"), "").unwrap();
        let events = classifier.classify(vec![root.join("pkg/lib.rs"), root.join("pkg")]);
        assert_eq!(
            events,
            vec![
                ChangeEvent::new(ChangeKind::AddDir, root.join("pkg")),
                ChangeEvent::new(ChangeKind::Add, root.join("pkg/lib.rs")),
            ]
        );
    }

    #[test]
    fn classify_skips_ignored_and_foreign_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        let mut classifier = ChangeClassifier::new(tmp.path(), defaults());
        let root = classifier.root().to_path_buf();

        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        let events = classifier.classify(vec![
            root.join(".git/HEAD"),
            PathBuf::from("/somewhere/else.txt"),
            root.clone(),
        ]);
        assert!(events.is_empty());
    }

    #[test]
    fn subscribers_fan_out_and_prune() {
        let subs = Subscribers::default();
        let (_a, mut rx_a) = subs.subscribe();
        let (_b, rx_b) = subs.subscribe();
        drop(rx_b);

        subs.broadcast(&ChangeEvent::new(ChangeKind::Add, "/p/x"));
        assert_eq!(subs.len(), 1);
        assert_eq!(rx_a.try_recv().unwrap().path, PathBuf::from("/p/x"));
    }

    #[test]
    fn unsubscribe_removes_listener() {
        let subs = Subscribers::default();
        let (id, _rx) = subs.subscribe();
        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id));
        assert!(subs.is_empty());
    }

    #[test]
    fn restart_replaces_session() {
        let tmp = TempDir::new().unwrap();
        let manager = WatchManager::new(WatchOptions::default());
        let first = manager.start(tmp.path()).unwrap();
        let second = manager.start(tmp.path()).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(manager.current(), Some(second.clone()));
        assert!(manager.is_watching());

        assert!(!manager.stop(&first));
        assert!(manager.is_watching());
        assert!(manager.stop(&second));
        assert!(!manager.is_watching());
    }

    #[test]
    fn start_on_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let manager = WatchManager::new(WatchOptions::default());
        assert!(manager.start(&tmp.path().join("nope")).is_err());
        assert!(manager.current().is_none());
    }

    #[test]
    fn vanished_root_reports_inactive() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("proj");
        fs::create_dir(&root).unwrap();
        let manager = WatchManager::new(WatchOptions::default());
        manager.start(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();
        assert!(!manager.is_watching());
    }
}
