use std::fmt::Debug;

use indexmap::IndexMap;

/// One JavaScript file handed to or returned by the linker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkerFile {
  pub source: String,
  pub serve_path: String,
}

/// Input to one linker invocation: the JS resources of a single package
/// build in a single environment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkerInput {
  pub files: Vec<LinkerFile>,

  /// The application links into the global namespace; packages do not.
  pub use_global_namespace: bool,

  /// Where package files are combined to. `None` for the application,
  /// whose files keep their own serve paths.
  pub combined_serve_path: Option<String>,

  /// Serve path of the generated import stub.
  pub import_stub_serve_path: String,

  /// Symbol name to supplying-package name.
  pub imports: IndexMap<String, String>,

  pub name: Option<String>,

  /// Declared exports the linker must keep alive. The computed export set
  /// it returns may be larger.
  pub force_export: Vec<String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LinkerOutput {
  pub files: Vec<LinkerFile>,
  pub exports: Vec<String>,
}

/// Rewrites a package's JavaScript for namespacing and cross-package
/// imports. A pure, deterministic function of its input.
pub trait Linker: Debug + Send + Sync {
  fn link(&self, input: LinkerInput) -> Result<LinkerOutput, anyhow::Error>;
}
