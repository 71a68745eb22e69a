use std::fmt::Debug;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct JsMinifyOptions {
  pub drop_debugger: bool,
}

/// Minifies the concatenated client JavaScript. Pure bytes to bytes.
pub trait JsMinifier: Debug + Send + Sync {
  fn minify(&self, source: &[u8], options: &JsMinifyOptions) -> Result<Vec<u8>, anyhow::Error>;
}

/// Minifies the concatenated client CSS. Pure bytes to bytes.
pub trait CssMinifier: Debug + Send + Sync {
  fn minify(&self, source: &[u8]) -> Result<Vec<u8>, anyhow::Error>;
}
