use std::fmt::Display;
use std::fmt::Formatter;

use thiserror::Error;

use crate::types::Environment;

pub type BundleResult<T> = std::result::Result<T, BundleError>;

/// A fatal bundling error. One of these aborts the whole bundle; there is
/// no per-package isolation.
#[derive(Debug, Error)]
pub enum BundleError {
  /// A package name failed to resolve.
  #[error("unknown package: {0}")]
  Resolution(String),

  /// A back edge was discovered while computing the load order.
  #[error("circular dependency between packages {0} and {1}")]
  Cycle(String, String),

  /// An extension handler failed, or asked for something invalid.
  #[error("error while compiling {path}: {error:#}")]
  Handler { path: String, error: anyhow::Error },

  /// A resource that cannot be aggregated: unknown kind, or an HTML
  /// fragment targeting the server.
  #[error("{0}")]
  Resource(String),

  /// Two resources claimed the same serve path in the same environment.
  #[error("duplicate serve path {path} in the {environment} program")]
  Conflict {
    path: String,
    environment: Environment,
  },

  #[error(transparent)]
  Io(#[from] std::io::Error),

  /// A collaborator (loader, linker, minifier, installer) failed.
  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}

/// The ordered, human readable error list a failed bundle run returns.
/// Guaranteed non-empty when returned as an `Err`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BundleFailure(Vec<String>);

impl BundleFailure {
  pub fn from_messages(messages: Vec<String>) -> Self {
    Self(messages)
  }

  pub fn push(&mut self, message: String) {
    self.0.push(message);
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn messages(&self) -> &[String] {
    &self.0
  }

  pub fn into_messages(self) -> Vec<String> {
    self.0
  }
}

impl Display for BundleFailure {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0.join("\n"))
  }
}

impl From<BundleError> for BundleFailure {
  fn from(error: BundleError) -> Self {
    Self(vec![error.to_string()])
  }
}
