use indexmap::IndexMap;

use bolide_core::types::Environment;
use bolide_core::types::Resource;
use bolide_core::types::ResourceKind;
use bolide_core::BundleError;
use bolide_core::BundleResult;

use crate::bundle::Bundle;

/// Merges every build's resources into the bundle-wide file tables and
/// ordered load lists, in load order.
#[tracing::instrument(level = "debug", skip_all)]
pub fn aggregate(bundle: &mut Bundle) -> BundleResult<()> {
  let Bundle {
    builds,
    order,
    files,
    js,
    css,
    statics,
    head,
    body,
    ..
  } = bundle;

  for key in order.iter() {
    let build = &builds[key];
    for environment in Environment::ALL {
      if !build.presence[environment] {
        continue;
      }
      for resource in &build.resources[environment] {
        match resource.kind {
          ResourceKind::Js => {
            let serve_path = required_serve_path(resource)?;
            insert_file(files.table_mut(environment), environment, serve_path, resource)?;
            js[environment].push(serve_path.to_string());
          }
          ResourceKind::Css => {
            if environment.is_server() {
              // Dropped for compatibility with existing bundles.
              tracing::debug!(
                package = build.package.display_name(),
                "dropping a server css resource"
              );
              continue;
            }
            let serve_path = required_serve_path(resource)?;
            insert_file(&mut files.client, environment, serve_path, resource)?;
            css.push(serve_path.to_string());
          }
          ResourceKind::Static => {
            let serve_path = required_serve_path(resource)?;
            insert_file(files.table_mut(environment), environment, serve_path, resource)?;
            statics[environment].push(serve_path.to_string());
          }
          ResourceKind::Head | ResourceKind::Body => {
            if environment.is_server() {
              return Err(BundleError::Resource(format!(
                "a {} fragment from package {} targets the server",
                resource.kind,
                build.package.display_name()
              )));
            }
            let fragments = match resource.kind {
              ResourceKind::Head => &mut *head,
              _ => &mut *body,
            };
            fragments.push(resource.data.clone());
          }
        }
      }
    }
  }
  Ok(())
}

fn required_serve_path(resource: &Resource) -> BundleResult<&str> {
  resource.serve_path.as_deref().ok_or_else(|| {
    BundleError::Resource(format!("a {} resource is missing its serve path", resource.kind))
  })
}

fn insert_file(
  table: &mut IndexMap<String, Vec<u8>>,
  environment: Environment,
  serve_path: &str,
  resource: &Resource,
) -> BundleResult<()> {
  if table.contains_key(serve_path) {
    return Err(BundleError::Conflict {
      path: serve_path.to_string(),
      environment,
    });
  }
  table.insert(serve_path.to_string(), resource.data.clone());
  Ok(())
}
