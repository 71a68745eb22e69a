//! Free functions layered over [`FileSystem`] for whole-tree operations.

use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::file_system::FileSystem;

fn basename(path: &Path) -> &str {
  path
    .file_name()
    .map(|name| name.to_str().unwrap_or_default())
    .unwrap_or_default()
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_file(fs: &dyn FileSystem, path: &Path, contents: &[u8]) -> io::Result<()> {
  if let Some(parent) = path.parent() {
    fs.create_dir_all(parent)?;
  }
  fs.write(path, contents)
}

/// Remove a directory tree, tolerating it not existing.
pub fn remove_tree(fs: &dyn FileSystem, path: &Path) -> io::Result<()> {
  match fs.remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(error) => Err(error),
  }
}

/// All files under `root`, as sorted root-relative paths.
pub fn walk_files(fs: &dyn FileSystem, root: &Path) -> io::Result<Vec<PathBuf>> {
  let mut files = Vec::new();
  walk_into(fs, root, root, &|_| false, &mut files)?;
  files.sort();
  Ok(files)
}

/// Recursively copy `from` into `to`, skipping entries whose basename the
/// ignore filter matches. Returns the relative paths of the files copied,
/// sorted.
pub fn copy_tree<F>(
  fs: &dyn FileSystem,
  from: &Path,
  to: &Path,
  ignore: F,
) -> io::Result<Vec<PathBuf>>
where
  F: Fn(&str) -> bool,
{
  let mut files = Vec::new();
  walk_into(fs, from, from, &ignore, &mut files)?;
  files.sort();
  fs.create_dir_all(to)?;
  for relative in &files {
    let target = to.join(relative);
    if let Some(parent) = target.parent() {
      fs.create_dir_all(parent)?;
    }
    fs.copy(&from.join(relative), &target)?;
  }
  Ok(files)
}

fn walk_into(
  fs: &dyn FileSystem,
  root: &Path,
  dir: &Path,
  ignore: &dyn Fn(&str) -> bool,
  files: &mut Vec<PathBuf>,
) -> io::Result<()> {
  for entry in fs.read_dir(dir)? {
    if ignore(basename(&entry)) {
      continue;
    }
    if fs.is_dir(&entry)? {
      walk_into(fs, root, &entry, ignore, files)?;
    } else if fs.is_file(&entry)? {
      let relative = entry
        .strip_prefix(root)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
      files.push(relative.to_path_buf());
    }
  }
  Ok(())
}
