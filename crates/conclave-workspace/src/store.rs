//! Root-confined text file store.
//!
//! Every path is resolved lexically against the root. `..` segments that
//! climb above the root and absolute paths fail with
//! [`WorkspaceError::AccessDenied`]. Writes go through a temp file that is
//! renamed into place, so readers only ever see committed content.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::errors::{Result, WorkspaceError};

const TEMP_PREFIX: &str = ".conclave-";
const TEMP_SUFFIX: &str = ".partial";

/// A file path and its committed content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Workspace-relative path.
    pub path: String,
    /// File content.
    pub content: String,
}

/// A directory tree confined to one root.
#[derive(Debug)]
pub struct WorkspaceStore {
    root: PathBuf,
}

impl WorkspaceStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| WorkspaceError::io(&root.to_string_lossy(), e))?;
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalize `path` to its canonical workspace-relative form (`a/b.txt`).
    ///
    /// The root itself normalizes to the empty string.
    pub fn normalize(&self, path: &str) -> Result<String> {
        let denied = || WorkspaceError::AccessDenied {
            path: path.to_owned(),
        };
        let mut parts: Vec<String> = Vec::new();
        for component in Path::new(path.trim()).components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(denied());
                    }
                }
                Component::RootDir | Component::Prefix(_) => return Err(denied()),
            }
        }
        Ok(parts.join("/"))
    }

    fn resolve(&self, path: &str) -> Result<(String, PathBuf)> {
        let rel = self.normalize(path)?;
        let abs = if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&rel)
        };
        Ok((rel, abs))
    }

    fn resolve_file(&self, path: &str) -> Result<(String, PathBuf)> {
        let (rel, abs) = self.resolve(path)?;
        if rel.is_empty() {
            return Err(WorkspaceError::IsDirectory { path: ".".into() });
        }
        Ok((rel, abs))
    }

    /// Create a new file. Fails with `AlreadyExists` if the path is taken.
    ///
    /// Parent directories are created as needed. Returns the normalized path.
    pub fn create(&self, path: &str, content: &str) -> Result<String> {
        let (rel, abs) = self.resolve_file(path)?;
        if abs.is_dir() {
            return Err(WorkspaceError::IsDirectory { path: rel });
        }
        if abs.exists() {
            return Err(WorkspaceError::AlreadyExists { path: rel });
        }
        let staged = self.stage(&rel, &abs, content)?;
        let _ = staged.persist_noclobber(&abs).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                WorkspaceError::AlreadyExists { path: rel.clone() }
            } else {
                WorkspaceError::io(&rel, e.error)
            }
        })?;
        debug!(path = %rel, bytes = content.len(), "file created");
        Ok(rel)
    }

    /// Read a file's content.
    pub fn read(&self, path: &str) -> Result<String> {
        let (rel, abs) = self.resolve_file(path)?;
        Self::read_resolved(&rel, &abs)
    }

    fn read_resolved(rel: &str, abs: &Path) -> Result<String> {
        if abs.is_dir() {
            return Err(WorkspaceError::IsDirectory {
                path: rel.to_owned(),
            });
        }
        std::fs::read_to_string(abs).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => WorkspaceError::NotFound {
                path: rel.to_owned(),
            },
            _ => WorkspaceError::io(rel, e),
        })
    }

    /// Replace the first occurrence of `old` with `new`.
    ///
    /// Fails with `NoMatch` (leaving the file untouched) when `old` is empty
    /// or not a literal substring of the current content.
    pub fn replace(&self, path: &str, old: &str, new: &str) -> Result<String> {
        let (rel, abs) = self.resolve_file(path)?;
        let current = Self::read_resolved(&rel, &abs)?;
        if old.is_empty() || !current.contains(old) {
            return Err(WorkspaceError::NoMatch { path: rel });
        }
        let updated = current.replacen(old, new, 1);
        let staged = self.stage(&rel, &abs, &updated)?;
        let _ = staged
            .persist(&abs)
            .map_err(|e| WorkspaceError::io(&rel, e.error))?;
        debug!(path = %rel, "file modified");
        Ok(rel)
    }

    /// List files under `dir`, recursively, as sorted workspace-relative paths.
    ///
    /// Returns an empty list when `dir` does not exist or is not a directory.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let (_, abs) = self.resolve(dir)?;
        if !abs.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&abs).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable workspace entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || is_staging_file(entry.file_name()) {
                continue;
            }
            if let Some(rel) = self.relative(entry.path()) {
                files.push(rel);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete a file. Directories are refused with `IsDirectory`.
    pub fn delete(&self, path: &str) -> Result<String> {
        let (rel, abs) = self.resolve_file(path)?;
        if abs.is_dir() {
            return Err(WorkspaceError::IsDirectory { path: rel });
        }
        if !abs.exists() {
            return Err(WorkspaceError::NotFound { path: rel });
        }
        std::fs::remove_file(&abs).map_err(|e| WorkspaceError::io(&rel, e))?;
        debug!(path = %rel, "file deleted");
        Ok(rel)
    }

    /// Remove everything under the root and recreate it empty.
    pub fn wipe(&self) -> Result<()> {
        let root = self.root.to_string_lossy().into_owned();
        if self.root.exists() {
            std::fs::remove_dir_all(&self.root).map_err(|e| WorkspaceError::io(&root, e))?;
        }
        std::fs::create_dir_all(&self.root).map_err(|e| WorkspaceError::io(&root, e))?;
        debug!(root = %root, "workspace wiped");
        Ok(())
    }

    /// Every file with its committed content, in path order.
    pub fn snapshot(&self) -> Result<Vec<FileSnapshot>> {
        let mut files = Vec::new();
        for path in self.list("")? {
            match self.read(&path) {
                Ok(content) => files.push(FileSnapshot { path, content }),
                // deleted between list and read
                Err(WorkspaceError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(files)
    }

    fn stage(&self, rel: &str, abs: &Path, content: &str) -> Result<tempfile::NamedTempFile> {
        let parent = abs.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(rel, e))?;
        let mut staged = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| WorkspaceError::io(rel, e))?;
        staged
            .write_all(content.as_bytes())
            .map_err(|e| WorkspaceError::io(rel, e))?;
        Ok(staged)
    }

    fn relative(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

fn is_staging_file(name: &std::ffi::OsStr) -> bool {
    let name = name.to_string_lossy();
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}
