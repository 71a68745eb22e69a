use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::file_system::FileSystem;

/// The real file system.
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    std::env::current_dir()
  }

  fn exists(&self, path: &Path) -> io::Result<bool> {
    path.try_exists()
  }

  fn is_file(&self, path: &Path) -> io::Result<bool> {
    Ok(path.is_file())
  }

  fn is_dir(&self, path: &Path) -> io::Result<bool> {
    Ok(path.is_dir())
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    fs::read(path)
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
  }

  fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(path)?
      .map(|entry| entry.map(|entry| entry.path()))
      .collect::<io::Result<Vec<PathBuf>>>()?;
    entries.sort();
    Ok(entries)
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    fs::write(path, contents)
  }

  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
    fs::copy(from, to)
  }

  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
  }

  fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
    fs::remove_dir_all(path)
  }

  fn remove_file(&self, path: &Path) -> io::Result<()> {
    fs::remove_file(path)
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
  }

  #[cfg(target_family = "unix")]
  fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(original, link)
  }

  #[cfg(target_family = "windows")]
  fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(original, link)
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    fs::read_link(path)
  }
}
