use indexmap::IndexMap;

use bolide_core::plugin::Linker;
use bolide_core::plugin::LinkerFile;
use bolide_core::plugin::LinkerInput;
use bolide_core::types::Environment;
use bolide_core::types::Package;
use bolide_core::types::Resource;
use bolide_core::types::ResourceKind;
use bolide_core::types::Role;
use bolide_core::BundleResult;

use crate::bundle::Bundle;

/// Serve path of the stub that installs cross-package imports on the
/// client.
pub const IMPORT_STUB_SERVE_PATH: &str = "/packages/global-imports.js";

/// Runs every build's JavaScript through the linker, in load order.
///
/// Each build's imports are computed from the exports the linker reported
/// for its upstream packages earlier in the same traversal, so the
/// traversal order is what makes the downstream reads correct.
#[tracing::instrument(level = "debug", skip_all)]
pub fn link(bundle: &mut Bundle, linker: &dyn Linker) -> BundleResult<()> {
  let keys = bundle.order.clone();
  for key in keys {
    let (package, role, presence) = {
      let build = &bundle.builds[&key];
      (build.package.clone(), build.role, build.presence)
    };
    for environment in Environment::ALL {
      if !presence[environment] {
        continue;
      }
      let imports = compute_imports(bundle, &package, role, environment);

      let build = bundle.builds.get_mut(&key).expect("ordered builds exist");
      let resources = std::mem::take(&mut build.resources[environment]);
      let mut inputs = Vec::new();
      let mut retained = Vec::new();
      for resource in resources {
        if resource.kind == ResourceKind::Js {
          inputs.push(LinkerFile {
            source: String::from_utf8_lossy(&resource.data).into_owned(),
            serve_path: resource.serve_path.clone().unwrap_or_default(),
          });
        } else {
          retained.push(resource);
        }
      }
      build.resources[environment] = retained;

      let output = linker.link(LinkerInput {
        files: inputs,
        use_global_namespace: package.is_app(),
        combined_serve_path: combined_serve_path(&package, role),
        import_stub_serve_path: IMPORT_STUB_SERVE_PATH.to_string(),
        imports,
        name: package.name.clone(),
        force_export: package.declared_exports[role][environment].clone(),
      })?;

      bundle
        .exports
        .record(package.id.clone(), role, environment, output.exports);
      let build = bundle.builds.get_mut(&key).expect("ordered builds exist");
      for file in output.files {
        build.add_resource(
          environment,
          Resource::new(ResourceKind::Js, file.source.into_bytes(), Some(file.serve_path)),
        );
      }
    }
  }
  Ok(())
}

fn combined_serve_path(package: &Package, role: Role) -> Option<String> {
  let name = package.name.as_ref()?;
  Some(match role {
    Role::Use => format!("/packages/{name}.js"),
    Role::Test => format!("/package-tests/{name}.js"),
  })
}

/// Symbol to supplying-package name, from the computed production exports
/// of every named, ordered upstream. Later packages win collisions.
fn compute_imports(
  bundle: &Bundle,
  package: &Package,
  role: Role,
  environment: Environment,
) -> IndexMap<String, String> {
  let mut imports = IndexMap::new();
  for name in &package.uses[role][environment] {
    if package.unordered.contains(name) {
      continue;
    }
    let Some(upstream) = bundle.by_name.get(name) else {
      continue;
    };
    let Some(upstream_name) = upstream.name.clone() else {
      continue;
    };
    for symbol in bundle.exports.exports(&upstream.id, Role::Use, environment) {
      imports.insert(symbol.clone(), upstream_name.clone());
    }
  }
  imports
}
