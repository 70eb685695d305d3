//! Filesystem listing and the navigation state behind the file browser.
//!
//! Navigation is transactional: the current path only changes once the
//! target directory has been listed successfully, so the visible listing
//! always belongs to the path shown above it.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Metadata shown for the highlighted entry, fetched on demand.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub size: u64,
    pub permissions: String,
    pub modified: Option<DateTime<Local>>,
}

/// List a directory: sub-directories first, then files, each group by name.
pub fn list_dir(path: &Path) -> Result<Vec<DirEntry>> {
    let read = fs::read_dir(path).with_context(|| format!("cannot read {}", path.display()))?;
    let mut entries = Vec::new();
    for entry in read {
        let entry = entry.with_context(|| format!("cannot read {}", path.display()))?;
        // Follow symlinks so a link to a directory can be entered.
        let is_dir = fs::metadata(entry.path()).is_ok_and(|m| m.is_dir());
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

pub fn entry_meta(path: &Path) -> Result<EntryMeta> {
    let meta =
        fs::symlink_metadata(path).with_context(|| format!("cannot stat {}", path.display()))?;
    Ok(EntryMeta {
        size: meta.len(),
        permissions: permissions_string(&meta),
        modified: meta.modified().ok().map(DateTime::<Local>::from),
    })
}

#[cfg(unix)]
fn permissions_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    mode_string(meta.permissions().mode(), meta.is_dir())
}

#[cfg(not(unix))]
fn permissions_string(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "read-only".to_string()
    } else {
        "read-write".to_string()
    }
}

/// Render permission bits the way `ls -l` does, e.g. `drwxr-xr-x`.
#[cfg_attr(not(unix), allow(dead_code))]
fn mode_string(mode: u32, is_dir: bool) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

pub struct FileBrowser {
    path: PathBuf,
    entries: Vec<DirEntry>,
    index: usize,
}

impl FileBrowser {
    /// A browser positioned at `path` with an empty listing; call [`reload`](Self::reload).
    pub fn new(path: PathBuf) -> Self {
        FileBrowser {
            path,
            entries: Vec::new(),
            index: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn selected(&self) -> Option<&DirEntry> {
        self.entries.get(self.index)
    }

    pub fn selected_path(&self) -> Option<PathBuf> {
        self.selected().map(|e| self.path.join(&e.name))
    }

    /// Re-list the current path. On failure the previous listing is kept.
    pub fn reload(&mut self) -> Result<()> {
        self.entries = list_dir(&self.path)?;
        self.index = self.index.min(self.entries.len().saturating_sub(1));
        Ok(())
    }

    pub fn reset_cursor(&mut self) {
        self.index = 0;
    }

    pub fn move_up(&mut self) {
        self.index = self.index.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if !self.entries.is_empty() {
            self.index = (self.index + 1).min(self.entries.len() - 1);
        }
    }

    /// Descend into the highlighted directory. `Ok(false)` when it is not a directory.
    pub fn enter_selected(&mut self) -> Result<bool> {
        let Some(entry) = self.selected().filter(|e| e.is_dir) else {
            return Ok(false);
        };
        let target = self.path.join(&entry.name);
        self.navigate(target)?;
        Ok(true)
    }

    /// Go to the parent directory. `Ok(false)` when already at the filesystem root.
    pub fn go_up(&mut self) -> Result<bool> {
        let Some(parent) = self.path.parent().map(Path::to_path_buf) else {
            return Ok(false);
        };
        if parent.as_os_str().is_empty() || parent == self.path {
            return Ok(false);
        }
        self.navigate(parent)?;
        Ok(true)
    }

    fn navigate(&mut self, target: PathBuf) -> Result<()> {
        let entries = list_dir(&target)?;
        tracing::debug!(path = %target.display(), entries = entries.len(), "changed directory");
        self.path = target;
        self.entries = entries;
        self.index = 0;
        Ok(())
    }
}
