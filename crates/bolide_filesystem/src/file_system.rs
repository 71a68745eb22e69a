//! Abstraction of the file system
//!
//! Every bundler stage that touches disk goes through this trait so the
//! whole pipeline can be exercised against an in-memory implementation.

use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

pub type FileSystemRef = Arc<dyn FileSystem + Send + Sync>;

pub trait FileSystem {
  fn cwd(&self) -> io::Result<PathBuf>;

  fn exists(&self, path: &Path) -> io::Result<bool>;

  fn is_file(&self, path: &Path) -> io::Result<bool>;

  fn is_dir(&self, path: &Path) -> io::Result<bool>;

  // Rust std::fs below
  fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

  fn read_to_string(&self, path: &Path) -> io::Result<String>;

  /// Direct children of `path`, in a stable order.
  fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

  fn create_dir_all(&self, path: &Path) -> io::Result<()>;

  fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

  fn remove_file(&self, path: &Path) -> io::Result<()>;

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

  fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;

  fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
}
