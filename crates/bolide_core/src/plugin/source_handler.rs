use std::fmt::Debug;
use std::path::PathBuf;

use crate::types::Environment;
use crate::types::ResourceKind;

/// Where an emitted resource's bytes come from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EmitSource {
  Bytes(Vec<u8>),
  Text(String),
  /// Read from this file, resolved against the package source root when
  /// relative.
  File(PathBuf),
  /// Read from the file the serve path names, resolved against the package
  /// source root.
  ServePathFile,
}

/// One resource a handler asks the bundler to emit.
///
/// `serve_path` is mandatory except for head/body fragments, which must not
/// set one. Every environment in `targets` receives a copy of the resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EmitOptions {
  pub kind: ResourceKind,
  pub targets: Vec<Environment>,
  pub serve_path: Option<String>,
  pub source: EmitSource,
}

/// The bundler-provided sink handlers emit resources into.
pub trait Emit {
  fn emit(&mut self, options: EmitOptions) -> Result<(), anyhow::Error>;
}

/// One source file as presented to a handler.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SourceInput {
  /// Absolute path of the file being compiled.
  pub source_path: PathBuf,

  /// Serve path derived from the package's serve root.
  pub serve_path: String,

  /// The environment the file was declared for.
  pub environment: Environment,
}

/// Compile a single source file into zero or more emitted resources
///
/// Packages register handlers per extension; a handler may emit any number
/// of resources of any kind into any environment of its package.
pub trait SourceHandler: Debug + Send + Sync {
  fn compile(&self, emit: &mut dyn Emit, input: &SourceInput) -> Result<(), anyhow::Error>;
}
