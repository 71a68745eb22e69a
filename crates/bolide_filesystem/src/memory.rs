use std::collections::HashMap;
use std::io;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use parking_lot::RwLock;

use crate::file_system::FileSystem;

#[cfg(not(target_os = "windows"))]
fn root_dir() -> PathBuf {
  PathBuf::from("/")
}

#[cfg(target_os = "windows")]
fn root_dir() -> PathBuf {
  PathBuf::from("C:/")
}

/// In memory implementation of a file-system entry
#[derive(Debug, Clone)]
enum Entry {
  File { contents: Vec<u8> },
  Directory,
  Symlink { target: PathBuf },
}

/// In memory implementation of the `FileSystem` trait, for testing purposes.
///
/// Writing a file implicitly creates its parent directories. Symlinks are
/// recorded but not traversed; `read_link` returns the recorded target.
#[derive(Debug)]
pub struct InMemoryFileSystem {
  entries: RwLock<HashMap<PathBuf, Entry>>,
  current_working_directory: RwLock<PathBuf>,
}

impl Default for InMemoryFileSystem {
  fn default() -> Self {
    let mut entries = HashMap::new();
    entries.insert(root_dir(), Entry::Directory);
    Self {
      entries: RwLock::new(entries),
      current_working_directory: RwLock::new(root_dir()),
    }
  }
}

fn not_found(path: &Path) -> io::Error {
  io::Error::new(
    io::ErrorKind::NotFound,
    format!("no such file or directory: {}", path.display()),
  )
}

impl InMemoryFileSystem {
  /// Change the current working directory. Used for resolving relative paths.
  pub fn set_current_working_directory(&self, cwd: &Path) {
    let cwd = self.normalize(cwd);
    let mut state = self.current_working_directory.write();
    *state = cwd;
  }

  fn normalize(&self, path: &Path) -> PathBuf {
    let cwd = self.current_working_directory.read();
    let mut result = if path.is_absolute() {
      vec![]
    } else {
      cwd.components().collect()
    };

    for component in path.components() {
      match component {
        Component::Prefix(prefix) => {
          result = vec![Component::Prefix(prefix)];
        }
        Component::RootDir => {
          result.push(Component::RootDir);
        }
        Component::CurDir => {}
        Component::ParentDir => {
          result.pop();
        }
        Component::Normal(path) => {
          result.push(Component::Normal(path));
        }
      }
    }

    PathBuf::from_iter(result)
  }

  fn create_parents(&self, entries: &mut HashMap<PathBuf, Entry>, path: &Path) {
    let mut current = path.to_path_buf();
    while let Some(parent) = current.parent().map(Path::to_path_buf) {
      entries.entry(parent.clone()).or_insert(Entry::Directory);
      current = parent;
    }
  }
}

impl FileSystem for InMemoryFileSystem {
  fn cwd(&self) -> io::Result<PathBuf> {
    Ok(self.current_working_directory.read().clone())
  }

  fn exists(&self, path: &Path) -> io::Result<bool> {
    let path = self.normalize(path);
    Ok(self.entries.read().contains_key(&path))
  }

  fn is_file(&self, path: &Path) -> io::Result<bool> {
    let path = self.normalize(path);
    Ok(matches!(
      self.entries.read().get(&path),
      Some(Entry::File { .. })
    ))
  }

  fn is_dir(&self, path: &Path) -> io::Result<bool> {
    let path = self.normalize(path);
    Ok(matches!(self.entries.read().get(&path), Some(Entry::Directory)))
  }

  fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
    let path = self.normalize(path);
    match self.entries.read().get(&path) {
      Some(Entry::File { contents }) => Ok(contents.clone()),
      Some(_) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("not a file: {}", path.display()),
      )),
      None => Err(not_found(&path)),
    }
  }

  fn read_to_string(&self, path: &Path) -> io::Result<String> {
    let contents = self.read(path)?;
    String::from_utf8(contents).map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
  }

  fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
    let path = self.normalize(path);
    let entries = self.entries.read();
    if !matches!(entries.get(&path), Some(Entry::Directory)) {
      return Err(not_found(&path));
    }
    let mut children: Vec<PathBuf> = entries
      .keys()
      .filter(|candidate| candidate.parent() == Some(path.as_path()))
      .cloned()
      .collect();
    children.sort();
    Ok(children)
  }

  fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
    let path = self.normalize(path);
    let mut entries = self.entries.write();
    self.create_parents(&mut entries, &path);
    entries.insert(
      path,
      Entry::File {
        contents: contents.to_vec(),
      },
    );
    Ok(())
  }

  fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
    let contents = self.read(from)?;
    let length = contents.len() as u64;
    self.write(to, &contents)?;
    Ok(length)
  }

  fn create_dir_all(&self, path: &Path) -> io::Result<()> {
    let path = self.normalize(path);
    let mut entries = self.entries.write();
    self.create_parents(&mut entries, &path);
    entries.insert(path, Entry::Directory);
    Ok(())
  }

  fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
    let path = self.normalize(path);
    let mut entries = self.entries.write();
    if !entries.contains_key(&path) {
      return Err(not_found(&path));
    }
    entries.retain(|candidate, _| !candidate.starts_with(&path));
    Ok(())
  }

  fn remove_file(&self, path: &Path) -> io::Result<()> {
    let path = self.normalize(path);
    match self.entries.write().remove(&path) {
      Some(_) => Ok(()),
      None => Err(not_found(&path)),
    }
  }

  fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
    let from = self.normalize(from);
    let to = self.normalize(to);
    let mut entries = self.entries.write();
    if !entries.contains_key(&from) {
      return Err(not_found(&from));
    }
    self.create_parents(&mut entries, &to);
    let moved: Vec<(PathBuf, Entry)> = entries
      .iter()
      .filter(|(candidate, _)| candidate.starts_with(&from))
      .map(|(candidate, entry)| {
        let relative = candidate.strip_prefix(&from).expect("prefix checked above");
        (to.join(relative), entry.clone())
      })
      .collect();
    entries.retain(|candidate, _| !candidate.starts_with(&from));
    entries.extend(moved);
    Ok(())
  }

  fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
    let link = self.normalize(link);
    let mut entries = self.entries.write();
    self.create_parents(&mut entries, &link);
    entries.insert(
      link,
      Entry::Symlink {
        target: original.to_path_buf(),
      },
    );
    Ok(())
  }

  fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
    let path = self.normalize(path);
    match self.entries.read().get(&path) {
      Some(Entry::Symlink { target }) => Ok(target.clone()),
      Some(_) => Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("not a symlink: {}", path.display()),
      )),
      None => Err(not_found(&path)),
    }
  }
}
