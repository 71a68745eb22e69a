use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Which program a manifest entry belongs to.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestLocation {
  Client,
  Internal,
}

/// Asset type of a client manifest entry. Internal entries carry none.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
  Js,
  Css,
  Static,
}

/// One emitted artifact as recorded in `app.json`.
///
/// `hash` is always the 40-hex SHA-1 of the `size` bytes at `path`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ManifestEntry {
  pub path: String,

  #[serde(rename = "where")]
  pub location: ManifestLocation,

  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind: Option<ManifestKind>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub cacheable: Option<bool>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,

  pub hash: String,
}

/// The `app.json` document consumed by the launcher and the serving runtime.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct AppManifest {
  pub manifest: Vec<ManifestEntry>,

  /// Bundle-relative server files, in load order.
  pub load: Vec<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub release: Option<String>,
}

/// The `dependencies.json` document consumed by the development watcher.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DependenciesManifest {
  /// Source directory of the server runtime.
  pub core: String,

  /// Source files of the application, across all roles.
  pub app: Vec<String>,

  /// Source files per named package, across all roles.
  pub packages: IndexMap<String, Vec<String>>,

  /// Extensions with registered handlers on the application.
  pub extensions: Vec<String>,

  /// Verbatim pattern sources of the ignore list, for the watcher to
  /// recompile.
  pub exclude: Vec<String>,
}
