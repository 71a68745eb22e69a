use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

/// What an emitted fragment is, and therefore how the aggregator and writer
/// treat it.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Js,
  Css,
  Head,
  Body,
  Static,
}

impl ResourceKind {
  /// HTML fragments have no serve path; everything else requires one.
  pub fn is_html_fragment(&self) -> bool {
    matches!(self, ResourceKind::Head | ResourceKind::Body)
  }
}

impl Display for ResourceKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ResourceKind::Js => f.write_str("js"),
      ResourceKind::Css => f.write_str("css"),
      ResourceKind::Head => f.write_str("head"),
      ResourceKind::Body => f.write_str("body"),
      ResourceKind::Static => f.write_str("static"),
    }
  }
}

/// One emitted artifact fragment.
///
/// Resources are append-only within a package build for a given environment;
/// their order there is preserved end-to-end and defines in-bundle order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Resource {
  pub kind: ResourceKind,
  pub data: Vec<u8>,
  /// Absolute forward-slash path the asset wishes to be served at.
  /// `None` for head/body fragments.
  pub serve_path: Option<String>,
}

impl Resource {
  pub fn new(kind: ResourceKind, data: Vec<u8>, serve_path: Option<String>) -> Self {
    Self {
      kind,
      data,
      serve_path,
    }
  }
}
