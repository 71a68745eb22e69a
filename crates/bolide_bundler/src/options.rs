use std::path::PathBuf;
use std::sync::Arc;

use bolide_core::ignore::IgnorePatterns;
use bolide_core::plugin::CssMinifier;
use bolide_core::plugin::JsMinifier;
use bolide_core::plugin::Linker;
use bolide_core::plugin::PackageLoader;
use bolide_core::plugin::ReleaseManifest;
use bolide_core::types::FileSystemRef;

/// How prebuilt native modules reach the bundle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeModulesMode {
  /// Do not install the platform module root at all.
  Skip,
  /// Copy module trees into the bundle, making it relocatable.
  Copy,
  /// Symlink module trees into the bundle, for local runs.
  Symlink,
}

/// Options for one bundle run. Every field is required; optionality that
/// the runtime cannot check is not represented.
#[derive(Clone, Debug)]
pub struct BundleOptions {
  /// The framework release this bundle was built with, or `"none"` for a
  /// local-only build (omits the field from `app.json`).
  pub release: String,

  /// Version pins for the release, when bundling against one.
  pub release_manifest: Option<ReleaseManifest>,

  pub node_modules_mode: NodeModulesMode,

  /// Packages whose tests are bundled in addition to the application.
  pub test_packages: Vec<String>,

  /// Run the client JS/CSS minifiers. When disabled, client assets are
  /// served individually with cache-bust URLs instead.
  pub minify: bool,
}

/// Where the platform installation keeps the pieces every bundle embeds.
#[derive(Clone, Debug)]
pub struct RuntimePaths {
  /// The server runtime, copied into `server/` of every bundle.
  pub server_lib_dir: PathBuf,

  /// The platform's prebuilt native-module root.
  pub native_modules_dir: PathBuf,

  /// The platform's bundle-version marker file.
  pub version_marker: PathBuf,
}

/// The collaborators and platform paths a [`crate::Bundler`] works with.
#[derive(Clone)]
pub struct BundlerContext {
  pub fs: FileSystemRef,
  pub loader: Arc<dyn PackageLoader>,
  pub linker: Arc<dyn Linker>,
  pub js_minifier: Arc<dyn JsMinifier>,
  pub css_minifier: Arc<dyn CssMinifier>,
  pub runtime: RuntimePaths,
  pub ignore: IgnorePatterns,
}
