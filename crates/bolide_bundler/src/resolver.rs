use std::sync::Arc;

use tracing::debug;

use bolide_core::plugin::LoadContext;
use bolide_core::plugin::PackageLoader;
use bolide_core::types::Environment;
use bolide_core::types::Package;
use bolide_core::types::PerRoleEnv;
use bolide_core::types::Role;
use bolide_core::BundleError;
use bolide_core::BundleResult;

use crate::bundle::Bundle;

/// The packages bundling starts from, per (role, environment): the
/// application under `Use`, requested test packages under `Test`.
pub type Roots = PerRoleEnv<Vec<Arc<Package>>>;

/// Computes the transitive closure of packages per role and environment,
/// creating the package builds as it goes.
///
/// Unordered edges are followed here like any other: they only affect
/// ordering, not reachability.
#[tracing::instrument(level = "debug", skip_all)]
pub fn resolve(bundle: &mut Bundle, loader: &dyn PackageLoader, roots: &Roots) -> BundleResult<()> {
  for (role, per_env) in roots.iter() {
    for (environment, packages) in per_env.iter() {
      for package in packages {
        visit(bundle, loader, package.clone(), role, environment)?;
      }
    }
  }
  debug!(builds = bundle.builds.len(), "resolved package closure");
  Ok(())
}

fn visit(
  bundle: &mut Bundle,
  loader: &dyn PackageLoader,
  package: Arc<Package>,
  role: Role,
  environment: Environment,
) -> BundleResult<()> {
  let build = bundle.get_or_create_build(package.clone(), role);
  if build.presence[environment] {
    return Ok(());
  }
  build.presence[environment] = true;

  // Dependencies of a test build are always production builds: tests may
  // import production code of other packages, never their tests.
  for name in package.uses[role][environment].clone() {
    let used = resolve_name(bundle, loader, &name)?;
    visit(bundle, loader, used, Role::Use, environment)?;
  }
  Ok(())
}

fn resolve_name(
  bundle: &mut Bundle,
  loader: &dyn PackageLoader,
  name: &str,
) -> BundleResult<Arc<Package>> {
  if let Some(package) = bundle.by_name.get(name) {
    return Ok(package.clone());
  }
  let context = LoadContext {
    release_manifest: bundle.release_manifest.as_ref(),
    app_dir: &bundle.app_dir,
  };
  let package = loader
    .get(name, &context)?
    .ok_or_else(|| BundleError::Resolution(name.to_string()))?;
  bundle.by_name.insert(name.to_string(), package.clone());
  Ok(package)
}
