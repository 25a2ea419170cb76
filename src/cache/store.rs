//! Durable backends of the [`ResponseCache`](super::ResponseCache).

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the session cache inside the state directory.
pub const SESSION_CACHE_FILE: &str = "session-cache.json";

/// A key/value session store holding the serialized cache as a single string.
pub trait SessionStore {
    /// Returns the stored contents, or `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<String>, Report>;
    fn save(&mut self, contents: &str) -> Result<(), Report>;
    fn remove(&mut self) -> Result<(), Report>;
}

// ----------------------------------------------------------------------------
// Memory Store

/// In-process store, optionally with a size quota.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    contents: Option<String>,
    /// Maximum number of bytes accepted by [`save`](SessionStore::save).
    pub quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        MemoryStore { contents: None, quota: Some(quota) }
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, Report> {
        Ok(self.contents.clone())
    }

    fn save(&mut self, contents: &str) -> Result<(), Report> {
        if let Some(quota) = self.quota {
            if contents.len() > quota {
                return Err(eyre!("Session store quota exceeded: {} > {quota} bytes", contents.len()));
            }
        }
        self.contents = Some(contents.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), Report> {
        self.contents = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File Store

/// Store backed by a single JSON file, usually [`SESSION_CACHE_FILE`] in the state directory.
#[derive(Clone, Debug)]
pub struct FileStore {
    pub path: PathBuf,
}

impl FileStore {
    pub fn new(path: &Path) -> Self {
        FileStore { path: path.to_path_buf() }
    }

    /// The session cache file inside a state directory.
    pub fn in_dir(dir: &Path) -> Self {
        FileStore::new(&dir.join(SESSION_CACHE_FILE))
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<String>, Report> {
        if !self.path.exists() {
            return Ok(None);
        }
        let path = &self.path;
        let contents = std::fs::read_to_string(path).wrap_err_with(|| format!("Failed to read file: {path:?}."))?;
        Ok(Some(contents))
    }

    fn save(&mut self, contents: &str) -> Result<(), Report> {
        let path = &self.path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .wrap_err_with(|| format!("Failed to create directory: {parent:?}"))?;
            }
        }
        let mut file = File::create(path).wrap_err_with(|| format!("Failed to create file: {path:?}"))?;
        file.write_all(contents.as_bytes())
            .wrap_err_with(|| format!("Failed to write file: {path:?}"))?;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), Report> {
        let path = &self.path;
        if path.exists() {
            std::fs::remove_file(path).wrap_err_with(|| format!("Failed to remove file: {path:?}"))?;
        }
        Ok(())
    }
}
