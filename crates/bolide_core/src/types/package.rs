use std::collections::BTreeSet;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::plugin::NativeModuleInstaller;
use crate::plugin::SourceHandler;

use super::environment::Environment;
use super::role::PerRoleEnv;
use super::role::Role;

pub type PackageId = String;

/// An immutable description of one reusable package, or of the application
/// itself (the unnamed package rooted at the user's project directory).
///
/// How packages are discovered and loaded is the package loader's concern;
/// the bundler only reads this record. Computed exports never live here —
/// they belong to the bundle's exports registry.
#[derive(Debug)]
pub struct Package {
  /// Stable identity, unique within one bundle run.
  pub id: PackageId,

  /// `None` for the application, which therefore cannot be depended upon.
  pub name: Option<String>,

  /// Directory the package's `sources` entries are relative to.
  pub source_root: PathBuf,

  /// Forward-slash prefix under which the package's assets are served.
  pub serve_root: String,

  /// Names of packages this package uses, per (role, environment).
  pub uses: PerRoleEnv<Vec<String>>,

  /// Relative source paths to compile, per (role, environment), in
  /// declaration order.
  pub sources: PerRoleEnv<Vec<String>>,

  /// Symbols the package declares it exports, per (role, environment).
  /// The linker guarantees these survive; the computed set may be larger.
  pub declared_exports: PerRoleEnv<Vec<String>>,

  /// `uses` entries that are load-order insensitive. Followed for
  /// reachability, ignored by the topological sort.
  pub unordered: HashSet<String>,

  /// Extension handlers, per (role, environment), keyed by extension
  /// without the leading dot.
  pub handlers: PerRoleEnv<IndexMap<String, Arc<dyn SourceHandler>>>,

  /// Prebuilt native-module directory to install into the bundle, if any.
  pub node_modules_dir: Option<PathBuf>,

  /// Installer ensuring `node_modules_dir` is populated before bundling.
  pub installer: Option<Arc<dyn NativeModuleInstaller>>,
}

impl Package {
  pub fn is_app(&self) -> bool {
    self.name.is_none()
  }

  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("app")
  }

  pub fn source_handler(
    &self,
    role: Role,
    environment: Environment,
    extension: &str,
  ) -> Option<Arc<dyn SourceHandler>> {
    self.handlers[role][environment].get(extension).cloned()
  }

  /// The serve path for one of this package's relative source paths.
  pub fn serve_path(&self, relative_path: &str) -> String {
    let relative = relative_path.replace('\\', "/");
    format!(
      "{}/{}",
      self.serve_root.trim_end_matches('/'),
      relative.trim_start_matches('/')
    )
  }

  /// Every extension with a registered handler, across all roles and
  /// environments, sorted and deduplicated.
  pub fn registered_extensions(&self) -> Vec<String> {
    let mut extensions = BTreeSet::new();
    for (_, per_env) in self.handlers.iter() {
      for (_, handlers) in per_env.iter() {
        extensions.extend(handlers.keys().cloned());
      }
    }
    extensions.into_iter().collect()
  }
}
