use std::ffi::OsStr;
use std::path::Path;

use anyhow::ensure;

use bolide_core::plugin::Emit;
use bolide_core::plugin::EmitOptions;
use bolide_core::plugin::EmitSource;
use bolide_core::plugin::SourceInput;
use bolide_core::types::Environment;
use bolide_core::types::FileSystem;
use bolide_core::types::Package;
use bolide_core::types::Resource;
use bolide_core::types::ResourceKind;
use bolide_core::BundleError;
use bolide_core::BundleResult;

use crate::bundle::Bundle;
use crate::bundle::PackageBuild;

/// Routes every declared source file of every build through its extension
/// handler. Files with no handler for their extension become static
/// resources verbatim.
#[tracing::instrument(level = "debug", skip_all)]
pub fn compile(bundle: &mut Bundle, fs: &dyn FileSystem) -> BundleResult<()> {
  let keys = bundle.order.clone();
  for key in keys {
    let build = bundle.builds.get_mut(&key).expect("ordered builds exist");
    let package = build.package.clone();
    for environment in Environment::ALL {
      if !build.presence[environment] {
        continue;
      }
      for relative_path in package.sources[build.role][environment].clone() {
        compile_source(build, fs, &package, environment, &relative_path)?;
      }
    }
  }
  Ok(())
}

fn compile_source(
  build: &mut PackageBuild,
  fs: &dyn FileSystem,
  package: &Package,
  environment: Environment,
  relative_path: &str,
) -> BundleResult<()> {
  let serve_path = package.serve_path(relative_path);
  let source_path = package.source_root.join(relative_path);
  build.source_deps.insert(relative_path.to_string());

  match package.source_handler(build.role, environment, extension_of(relative_path)) {
    Some(handler) => {
      let input = SourceInput {
        source_path,
        serve_path,
        environment,
      };
      let mut sink = EmitSink {
        build,
        fs,
        source_root: &package.source_root,
        serve_root: &package.serve_root,
      };
      handler
        .compile(&mut sink, &input)
        .map_err(|error| BundleError::Handler {
          path: relative_path.to_string(),
          error,
        })?;
    }
    None => {
      let data = fs.read(&source_path)?;
      build.add_resource(
        environment,
        Resource::new(ResourceKind::Static, data, Some(serve_path)),
      );
    }
  }
  Ok(())
}

fn extension_of(path: &str) -> &str {
  Path::new(path)
    .extension()
    .and_then(OsStr::to_str)
    .unwrap_or("")
}

/// The sink handlers emit through. Validates each request exhaustively and
/// appends one resource per targeted environment.
struct EmitSink<'a> {
  build: &'a mut PackageBuild,
  fs: &'a dyn FileSystem,
  source_root: &'a Path,
  serve_root: &'a str,
}

impl EmitSink<'_> {
  fn resolve_data(&self, source: EmitSource, serve_path: Option<&str>) -> anyhow::Result<Vec<u8>> {
    match source {
      EmitSource::Bytes(bytes) => Ok(bytes),
      EmitSource::Text(text) => Ok(text.into_bytes()),
      EmitSource::File(path) => {
        let path = if path.is_absolute() {
          path
        } else {
          self.source_root.join(path)
        };
        Ok(self.fs.read(&path)?)
      }
      EmitSource::ServePathFile => {
        let serve_path =
          serve_path.ok_or_else(|| anyhow::anyhow!("cannot infer a source file without a serve path"))?;
        let relative = serve_path
          .strip_prefix(self.serve_root)
          .unwrap_or(serve_path)
          .trim_start_matches('/');
        Ok(self.fs.read(&self.source_root.join(relative))?)
      }
    }
  }
}

impl Emit for EmitSink<'_> {
  fn emit(&mut self, options: EmitOptions) -> anyhow::Result<()> {
    let EmitOptions {
      kind,
      targets,
      serve_path,
      source,
    } = options;

    ensure!(!targets.is_empty(), "a resource must target at least one environment");
    if kind.is_html_fragment() {
      ensure!(serve_path.is_none(), "a {kind} fragment must not set a serve path");
      ensure!(
        !targets.contains(&Environment::Server),
        "a {kind} fragment cannot target the server"
      );
    } else {
      ensure!(serve_path.is_some(), "a {kind} resource requires a serve path");
    }

    let data = self.resolve_data(source, serve_path.as_deref())?;
    for environment in targets {
      self
        .build
        .add_resource(environment, Resource::new(kind, data.clone(), serve_path.clone()));
    }
    Ok(())
  }
}
