use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::StateStore;

/// Directory-backed store: one `<name>.json` file per blob.
///
/// Replacement writes a temporary sibling, flushes it, then renames it over
/// the target, so a crash mid-write leaves the previous version intact.
/// There is no locking: one writer per state directory per run.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the state directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .with_context(|| format!("create state dir failed: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }
}

impl StateStore for FileStore {
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read state file failed: {}", path.display())),
        }
    }

    fn replace_blob(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.blob_path(name), bytes)
    }
}

/// Write `content` to `path` via write-to-temp-then-rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create_dir_all {}", parent.display()))?;
    }

    // Same directory, so the rename never crosses filesystems.
    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("open temp file failed: {}", temp_path.display()))?;

    temp_file
        .write_all(content)
        .with_context(|| format!("write temp file failed: {}", temp_path.display()))?;
    temp_file
        .sync_all()
        .with_context(|| format!("sync temp file failed: {}", temp_path.display()))?;
    drop(temp_file);

    fs::rename(&temp_path, path)
        .with_context(|| format!("rename into place failed: {}", path.display()))?;

    Ok(())
}
