use indexmap::IndexMap;

use bolide_core::hash::sha1_hex;
use bolide_core::plugin::CssMinifier;
use bolide_core::plugin::JsMinifier;
use bolide_core::plugin::JsMinifyOptions;
use bolide_core::types::Environment;
use bolide_core::types::ManifestEntry;
use bolide_core::types::ManifestKind;
use bolide_core::types::ManifestLocation;
use bolide_core::BundleResult;

use crate::bundle::Bundle;

/// Concatenates and minifies the client JS and CSS into single
/// content-addressed cacheable files, replacing the individual entries.
#[tracing::instrument(level = "debug", skip_all)]
pub fn minify(
  bundle: &mut Bundle,
  js_minifier: &dyn JsMinifier,
  css_minifier: &dyn CssMinifier,
) -> BundleResult<()> {
  let js_names = std::mem::take(&mut bundle.js[Environment::Client]);
  if !js_names.is_empty() {
    let concatenated = concatenate(&bundle.files.client, &js_names, b"\n;\n");
    let minified = js_minifier.minify(
      &concatenated,
      &JsMinifyOptions {
        drop_debugger: false,
      },
    )?;
    for name in &js_names {
      bundle.files.client.shift_remove(name);
    }
    add_cacheable(bundle, minified, "js", ManifestKind::Js);
  }

  let css_names = std::mem::take(&mut bundle.css);
  if !css_names.is_empty() {
    let concatenated = concatenate(&bundle.files.client, &css_names, b"\n");
    let minified = css_minifier.minify(&concatenated)?;
    for name in &css_names {
      bundle.files.client.shift_remove(name);
    }
    add_cacheable(bundle, minified, "css", ManifestKind::Css);
  }
  Ok(())
}

fn concatenate(table: &IndexMap<String, Vec<u8>>, names: &[String], separator: &[u8]) -> Vec<u8> {
  let mut output = Vec::new();
  for (index, name) in names.iter().enumerate() {
    if index > 0 {
      output.extend_from_slice(separator);
    }
    if let Some(data) = table.get(name) {
      output.extend_from_slice(data);
    }
  }
  output
}

fn add_cacheable(bundle: &mut Bundle, contents: Vec<u8>, extension: &str, kind: ManifestKind) {
  let hash = sha1_hex(&contents);
  let serve_path = format!("/{hash}.{extension}");
  bundle.manifest.push(ManifestEntry {
    path: format!("static_cacheable/{hash}.{extension}"),
    location: ManifestLocation::Client,
    kind: Some(kind),
    cacheable: Some(true),
    url: Some(serve_path.clone()),
    size: Some(contents.len() as u64),
    hash,
  });
  bundle.files.client_cacheable.insert(serve_path, contents);
}
