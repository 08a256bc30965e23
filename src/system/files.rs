//! Managed file writes with ownership mode and change detection.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// Owner and group of every generated file (root:root).
const OWNER: (u32, u32) = (0, 0);

/// A file to converge to a known content, mode and owner.
#[derive(Debug, Clone)]
pub struct ManagedFile {
    pub path: PathBuf,
    pub content: String,
    pub mode: u32,
    /// Content is never logged.
    pub sensitive: bool,
}

impl ManagedFile {
    pub fn new(path: impl Into<PathBuf>, content: String, mode: u32) -> Self {
        Self {
            path: path.into(),
            content,
            mode,
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Path this file lands on when everything is staged under `root`.
    pub fn target(&self, root: Option<&Path>) -> PathBuf {
        match root {
            Some(root) => root.join(self.path.strip_prefix("/").unwrap_or(&self.path)),
            None => self.path.clone(),
        }
    }

    /// Owner to enforce. Staged files keep whoever ran the staging.
    fn owner(root: Option<&Path>) -> Option<(u32, u32)> {
        match root {
            Some(_) => None,
            None => Some(OWNER),
        }
    }

    /// Write the file if its content, mode or owner differs. Returns whether
    /// anything changed.
    pub fn converge(&self, root: Option<&Path>, dry_run: bool) -> Result<bool> {
        let target = self.target(root);
        let owner = Self::owner(root);

        let content_differs = match fs::read_to_string(&target) {
            Ok(existing) => existing != self.content,
            Err(_) => true,
        };
        let (mode_differs, owner_differs) = match fs::metadata(&target) {
            Ok(meta) => (
                meta.permissions().mode() & 0o7777 != self.mode,
                owner.is_some_and(|(uid, gid)| meta.uid() != uid || meta.gid() != gid),
            ),
            Err(_) => (true, owner.is_some()),
        };

        if !content_differs && !mode_differs && !owner_differs {
            debug!("{} is up to date", target.display());
            return Ok(false);
        }

        if dry_run {
            info!("Would write {} (mode {:o})", target.display(), self.mode);
            if !self.sensitive {
                debug!("{}", self.content);
            }
            return Ok(true);
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        if content_differs {
            write_restricted(&target, &self.content, self.mode)?;
        }
        fs::set_permissions(&target, fs::Permissions::from_mode(self.mode))?;
        if let Some((uid, gid)) = owner {
            std::os::unix::fs::chown(&target, Some(uid), Some(gid))?;
        }

        info!("Wrote {} (mode {:o})", target.display(), self.mode);
        Ok(true)
    }
}

/// Replace `target`'s content without it ever being more permissive than
/// `mode`: new files are created with it, existing ones are narrowed first.
fn write_restricted(target: &Path, content: &str, mode: u32) -> Result<()> {
    if target.exists() {
        fs::set_permissions(target, fs::Permissions::from_mode(mode))?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(target)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
