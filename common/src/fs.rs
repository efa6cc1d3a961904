use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub trait FsExt {
    /// Resolves a relative path against the current working directory. Absolute paths are returned unchanged.
    fn relative_to_cwd(&self) -> Result<PathBuf>;

    /// Creates the directory that will contain this file, if it is missing.
    fn create_parent_dir(&self) -> Result<()>;
}

impl<P> FsExt for P
where
    P: AsRef<Path>,
{
    fn relative_to_cwd(&self) -> Result<PathBuf> {
        let path = self.as_ref();

        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        let cwd_dir = std::env::current_dir().context("Failed to read the current directory")?;

        Ok(cwd_dir.join(path))
    }

    fn create_parent_dir(&self) -> Result<()> {
        match self.as_ref().parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {:?}", dir)),
            _ => Ok(()),
        }
    }
}
