use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_OUTPUT_FILENAME: &str = "output.xml";

/// `output.xml` on the user's desktop, falling back to the home directory
/// and then the current directory.
pub fn default_output_path() -> PathBuf {
  dirs::desktop_dir()
    .filter(|dir| dir.is_dir())
    .or_else(dirs::home_dir)
    .unwrap_or_else(|| PathBuf::from("."))
    .join(DEFAULT_OUTPUT_FILENAME)
}

/// Move an existing file out of the way by renaming it to `<name>.bak`,
/// or `<name>.bak.N` for the first free N. Returns the new name, if a file
/// was moved.
pub fn rename_existing(path: &Path) -> Result<Option<PathBuf>> {
  if !path.exists() {
    return Ok(None);
  }
  let backup = backup_name(path);
  debug!(from = %path.display(), to = %backup.display(), "renaming existing file");
  fs::rename(path, &backup).map_err(|e| Error::io(path, e))?;
  Ok(Some(backup))
}

/// True when `path` exists but cannot be opened for writing, which usually
/// means another program holds it (or it is not a regular file).
pub fn file_in_use(path: &Path) -> bool {
  path.exists() && OpenOptions::new().append(true).open(path).is_err()
}

fn backup_name(path: &Path) -> PathBuf {
  let mut name = path.as_os_str().to_os_string();
  name.push(".bak");
  let first = PathBuf::from(&name);
  if !first.exists() {
    return first;
  }
  let mut n = 2;
  loop {
    let mut numbered = name.clone();
    numbered.push(format!(".{}", n));
    let candidate = PathBuf::from(numbered);
    if !candidate.exists() {
      return candidate;
    }
    n += 1;
  }
}
