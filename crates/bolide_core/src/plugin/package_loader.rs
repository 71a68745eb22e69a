use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::ignore::IgnorePatterns;
use crate::types::Package;

/// Version pins for the packages of one framework release.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ReleaseManifest {
  /// Package name to pinned version.
  pub packages: IndexMap<String, String>,
}

/// Everything a loader may need to resolve a package name.
#[derive(Clone, Copy, Debug)]
pub struct LoadContext<'a> {
  pub release_manifest: Option<&'a ReleaseManifest>,
  pub app_dir: &'a Path,
}

/// Resolves package names to loaded packages.
///
/// Implementations memoise; the bundler flushes the cache once at the start
/// of every run and relies on repeated `get` calls being cheap and stable
/// within one run.
pub trait PackageLoader: Debug + Send + Sync {
  /// Resolve a package by name. `None` means the name does not exist,
  /// which the bundler reports as a fatal resolution error.
  fn get(&self, name: &str, context: &LoadContext) -> Result<Option<Arc<Package>>, anyhow::Error>;

  /// Load the unnamed application package rooted at `app_dir`.
  fn app_package(
    &self,
    app_dir: &Path,
    ignore: &IgnorePatterns,
  ) -> Result<Arc<Package>, anyhow::Error>;

  /// Drop all memoised packages.
  fn flush(&self);
}

/// Prepares a package's prebuilt native-module directory before bundling.
pub trait NativeModuleInstaller: Debug + Send + Sync {
  fn ensure_installed(&self, package: &Package) -> Result<(), anyhow::Error>;
}
