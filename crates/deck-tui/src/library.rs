//! Local music files: directory listing for the browser, recursive folder
//! import, and resolving command-line paths into queue entries.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("access denied: {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("cannot read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl LibraryError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            LibraryError::PermissionDenied(path.to_path_buf())
        } else {
            LibraryError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Parent,
    Directory,
    Track,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub name: String,
    pub path: PathBuf,
}

impl Entry {
    /// Directories are bracketed so they stand out in a flat list.
    pub fn label(&self) -> String {
        match self.kind {
            EntryKind::Parent => "[..]".to_string(),
            EntryKind::Directory => format!("[{}]", self.name),
            EntryKind::Track => self.name.clone(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind != EntryKind::Track
    }
}

/// Which files count as playable.
#[derive(Debug, Clone)]
pub struct Library {
    extensions: Vec<String>,
}

impl Library {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Parent entry (unless at a root), then sub-directories, then playable
    /// files; each group sorted case-insensitively.
    pub fn list_dir(&self, dir: &Path) -> Result<Vec<Entry>, LibraryError> {
        let mut dirs = Vec::new();
        let mut tracks = Vec::new();

        let read = std::fs::read_dir(dir).map_err(|e| LibraryError::from_io(dir, e))?;
        for item in read {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    debug!("library: skipping entry in {:?}: {}", dir, e);
                    continue;
                }
            };
            let path = item.path();
            let name = item.file_name().to_string_lossy().into_owned();
            // Follows symlinks, so a linked folder browses like a folder.
            if path.is_dir() {
                dirs.push(Entry {
                    kind: EntryKind::Directory,
                    name,
                    path,
                });
            } else if self.is_supported(&path) {
                tracks.push(Entry {
                    kind: EntryKind::Track,
                    name,
                    path,
                });
            }
        }

        dirs.sort_by_key(|e| e.name.to_lowercase());
        tracks.sort_by_key(|e| e.name.to_lowercase());

        let mut entries = Vec::with_capacity(dirs.len() + tracks.len() + 1);
        if let Some(parent) = dir.parent() {
            entries.push(Entry {
                kind: EntryKind::Parent,
                name: "..".to_string(),
                path: parent.to_path_buf(),
            });
        }
        entries.extend(dirs);
        entries.extend(tracks);
        Ok(entries)
    }

    /// Every playable file below `dir`, depth first, in listing order.
    /// Unreadable sub-directories are skipped; only `dir` itself can fail.
    /// A directory reached twice through symlinks is imported once.
    pub fn collect_tracks(&self, dir: &Path) -> Result<Vec<PathBuf>, LibraryError> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.collect_into(dir, &mut out, &mut visited, true)?;
        Ok(out)
    }

    fn collect_into(
        &self,
        dir: &Path,
        out: &mut Vec<PathBuf>,
        visited: &mut HashSet<PathBuf>,
        top: bool,
    ) -> Result<(), LibraryError> {
        let real = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        if !visited.insert(real) {
            debug!("library: already imported {:?}", dir);
            return Ok(());
        }
        let entries = match self.list_dir(dir) {
            Ok(entries) => entries,
            Err(e) if !top => {
                debug!("library: skipping {:?}: {}", dir, e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        for entry in entries {
            match entry.kind {
                EntryKind::Parent => {}
                EntryKind::Track => out.push(entry.path),
                EntryKind::Directory => self.collect_into(&entry.path, out, visited, false)?,
            }
        }
        Ok(())
    }

    /// Turn command-line arguments into absolute track paths.  Folders are
    /// imported recursively; unsupported or missing paths are logged and
    /// skipped.
    pub fn resolve_args(&self, args: &[PathBuf]) -> Vec<PathBuf> {
        let mut out = Vec::new();
        for arg in args {
            let path = std::fs::canonicalize(arg).unwrap_or_else(|_| arg.clone());
            if path.is_dir() {
                match self.collect_tracks(&path) {
                    Ok(tracks) => out.extend(tracks),
                    Err(e) => warn!("library: {}", e),
                }
            } else if path.is_file() && self.is_supported(&path) {
                out.push(path);
            } else {
                warn!("library: ignoring argument {:?}", arg);
            }
        }
        out
    }
}

/// Paged directory browser with a back stack.
pub struct Browser {
    library: Library,
    cwd: PathBuf,
    entries: Vec<Entry>,
    selected: usize,
    page_size: usize,
    history: Vec<PathBuf>,
}

impl Browser {
    /// Open at `start`.  An unreadable start directory yields an empty
    /// listing rather than an error.
    pub fn open(library: Library, start: PathBuf, page_size: usize) -> Self {
        let entries = library.list_dir(&start).unwrap_or_else(|e| {
            warn!("library: {}", e);
            Vec::new()
        });
        Self {
            library,
            cwd: start,
            entries,
            selected: 0,
            page_size: page_size.max(1),
            history: Vec::new(),
        }
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        self.entries.get(self.selected)
    }

    pub fn page(&self) -> usize {
        self.selected / self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.entries.len().div_ceil(self.page_size).max(1)
    }

    /// Index of the first visible entry and the visible slice.
    pub fn visible(&self) -> (usize, &[Entry]) {
        let start = self.page() * self.page_size;
        let end = (start + self.page_size).min(self.entries.len());
        (start, &self.entries[start.min(end)..end])
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected + 1 < self.entries.len() {
            self.selected += 1;
        }
    }

    pub fn page_up(&mut self) {
        self.selected = self.selected.saturating_sub(self.page_size);
    }

    pub fn page_down(&mut self) {
        let last = self.entries.len().saturating_sub(1);
        self.selected = (self.selected + self.page_size).min(last);
    }

    /// Descend into `dir`.  On failure nothing changes.
    pub fn enter(&mut self, dir: PathBuf) -> Result<(), LibraryError> {
        let entries = self.library.list_dir(&dir)?;
        let previous = std::mem::replace(&mut self.cwd, dir);
        self.history.push(previous);
        self.entries = entries;
        self.selected = 0;
        Ok(())
    }

    /// Return to the previous directory.  `Ok(false)` when the history is empty.
    pub fn back(&mut self) -> Result<bool, LibraryError> {
        let Some(dir) = self.history.last().cloned() else {
            return Ok(false);
        };
        self.entries = self.library.list_dir(&dir)?;
        self.history.pop();
        self.cwd = dir;
        self.selected = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn library() -> Library {
        Library::new(&["mp3".to_string(), ".FLAC".to_string(), "ogg".to_string()])
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Beta/deep")).unwrap();
        fs::create_dir_all(root.join("alpha")).unwrap();
        for f in ["b.mp3", "A.FLAC", "notes.txt", "alpha/x.ogg", "Beta/y.mp3", "Beta/deep/z.flac"] {
            fs::write(root.join(f), b"").unwrap();
        }
        dir
    }

    #[test]
    fn test_list_dir_orders_and_filters() {
        let dir = tree();
        let entries = library().list_dir(dir.path()).unwrap();
        let labels: Vec<String> = entries.iter().map(Entry::label).collect();
        assert_eq!(labels, vec!["[..]", "[alpha]", "[Beta]", "A.FLAC", "b.mp3"]);
        assert_eq!(entries[0].kind, EntryKind::Parent);
        assert_eq!(entries[0].path, dir.path().parent().unwrap());
    }

    #[test]
    fn test_collect_tracks_recurses() {
        let dir = tree();
        let tracks = library().collect_tracks(dir.path()).unwrap();
        let names: Vec<String> = tracks
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(
            names,
            vec!["alpha/x.ogg", "Beta/deep/z.flac", "Beta/y.mp3", "A.FLAC", "b.mp3"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_tracks_survives_symlink_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.mp3"), b"").unwrap();
        std::os::unix::fs::symlink(root, root.join("sub/loop")).unwrap();

        let tracks = library().collect_tracks(root).unwrap();
        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].ends_with("sub/a.mp3"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tree();
        let missing = dir.path().join("gone");
        assert!(matches!(
            library().list_dir(&missing),
            Err(LibraryError::Io { .. })
        ));
        assert!(library().collect_tracks(&missing).is_err());
    }

    #[test]
    fn test_permission_errors_map_to_denied() {
        let err = LibraryError::from_io(
            Path::new("/root/secret"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, LibraryError::PermissionDenied(_)));
        assert_eq!(err.to_string(), "access denied: /root/secret");
    }

    #[test]
    fn test_browser_enter_and_back() {
        let dir = tree();
        let mut browser = Browser::open(library(), dir.path().to_path_buf(), 20);
        browser.move_down();
        browser.move_down();
        let beta = browser.selected_entry().unwrap().clone();
        assert_eq!(beta.label(), "[Beta]");

        browser.enter(beta.path.clone()).unwrap();
        assert_eq!(browser.cwd(), beta.path.as_path());
        assert_eq!(browser.selected(), 0);
        let labels: Vec<String> = browser.entries().iter().map(Entry::label).collect();
        assert_eq!(labels, vec!["[..]", "[deep]", "y.mp3"]);

        assert!(browser.back().unwrap());
        assert_eq!(browser.cwd(), dir.path());
        assert!(!browser.back().unwrap());
    }

    #[test]
    fn test_failed_enter_leaves_browser_unchanged() {
        let dir = tree();
        let mut browser = Browser::open(library(), dir.path().to_path_buf(), 20);
        browser.move_down();
        assert!(browser.enter(dir.path().join("nope")).is_err());
        assert_eq!(browser.cwd(), dir.path());
        assert_eq!(browser.selected(), 1);
    }

    #[test]
    fn test_paging() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            fs::write(dir.path().join(format!("{:02}.mp3", i)), b"").unwrap();
        }
        let mut browser = Browser::open(library(), dir.path().to_path_buf(), 3);
        // parent + 7 tracks
        assert_eq!(browser.page_count(), 3);
        browser.page_down();
        assert_eq!(browser.page(), 1);
        let (start, visible) = browser.visible();
        assert_eq!(start, 3);
        assert_eq!(visible.len(), 3);

        browser.page_down();
        browser.page_down();
        assert_eq!(browser.selected(), 7);
        assert_eq!(browser.visible().1.len(), 2);
        browser.page_up();
        assert_eq!(browser.selected(), 4);
    }

    #[test]
    fn test_resolve_args_mixes_files_and_folders() {
        let dir = tree();
        let args = vec![
            dir.path().join("b.mp3"),
            dir.path().join("alpha"),
            dir.path().join("notes.txt"),
            dir.path().join("missing.mp3"),
        ];
        let tracks = library().resolve_args(&args);
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|p| p.is_absolute()));
        assert!(tracks[1].ends_with("alpha/x.ogg"));
    }
}
