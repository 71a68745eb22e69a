use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;

use anyhow::anyhow;
use indexmap::IndexMap;
use tracing::warn;

use bolide_core::hash::cache_busted_url;
use bolide_core::hash::sha1_hex;
use bolide_core::types::AppManifest;
use bolide_core::types::DependenciesManifest;
use bolide_core::types::Environment;
use bolide_core::types::ManifestEntry;
use bolide_core::types::ManifestKind;
use bolide_core::types::ManifestLocation;
use bolide_core::BundleResult;
use bolide_filesystem::utils::copy_tree;
use bolide_filesystem::utils::remove_tree;
use bolide_filesystem::utils::write_file;

use crate::bundle::Bundle;
use crate::html::render_app_html;
use crate::options::BundleOptions;
use crate::options::BundlerContext;
use crate::options::NodeModulesMode;

const README: &str = "This directory is a fully-contained Bolide application bundle.

Run it with:

  node main.js

The listen port and public URL are taken from the PORT and ROOT_URL
environment variables.
";

/// Materialises the bundle tree into a `.build.<name>` sibling of the
/// output path, then atomically swaps it into place.
#[tracing::instrument(level = "debug", skip_all, fields(output = %output_path.display()))]
pub fn write_bundle(
  bundle: &mut Bundle,
  context: &BundlerContext,
  options: &BundleOptions,
  output_path: &Path,
) -> BundleResult<()> {
  let build_path = build_area_path(output_path)?;
  let writer = Writer {
    bundle,
    context,
    options,
    build_path,
    output_path: output_path.to_path_buf(),
    load: Vec::new(),
  };
  writer.run()
}

fn build_area_path(output_path: &Path) -> BundleResult<PathBuf> {
  let name = output_path
    .file_name()
    .and_then(OsStr::to_str)
    .ok_or_else(|| anyhow!("output path {} has no file name", output_path.display()))?;
  let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
  Ok(parent.join(format!(".build.{name}")))
}

struct Writer<'a> {
  bundle: &'a mut Bundle,
  context: &'a BundlerContext,
  options: &'a BundleOptions,
  build_path: PathBuf,
  output_path: PathBuf,

  /// Bundle-relative server files, in write order, for `app.json`.
  load: Vec<String>,
}

impl Writer<'_> {
  fn run(mut self) -> BundleResult<()> {
    self.prepare_build_area()?;
    self.install_server_runtime()?;
    self.install_platform_node_modules()?;
    self.copy_public_assets()?;
    self.cache_bust_client_assets();
    self.write_client_files()?;
    self.write_cacheable_files()?;
    self.write_server_files()?;
    self.install_package_node_modules()?;
    self.write_app_html()?;
    self.write_entry_script()?;
    self.write_manifests()?;
    self.swap_into_place()?;
    Ok(())
  }

  fn fs(&self) -> &dyn bolide_core::types::FileSystem {
    self.context.fs.as_ref()
  }

  fn prepare_build_area(&self) -> BundleResult<()> {
    remove_tree(self.fs(), &self.build_path)?;
    self.fs().create_dir_all(&self.build_path)?;
    Ok(())
  }

  fn install_server_runtime(&self) -> BundleResult<()> {
    let destination = self.build_path.join("server");
    copy_tree(
      self.fs(),
      &self.context.runtime.server_lib_dir,
      &destination,
      |name| self.context.ignore.is_ignored(name),
    )?;
    Ok(())
  }

  fn install_platform_node_modules(&self) -> BundleResult<()> {
    let server_dir = self.build_path.join("server");
    self.fs().create_dir_all(&server_dir)?;
    match self.options.node_modules_mode {
      NodeModulesMode::Symlink => {
        self.fs().symlink(
          &self.context.runtime.native_modules_dir,
          &server_dir.join("node_modules"),
        )?;
      }
      NodeModulesMode::Copy => {
        copy_tree(
          self.fs(),
          &self.context.runtime.native_modules_dir,
          &server_dir.join("node_modules"),
          |_| false,
        )?;
      }
      NodeModulesMode::Skip => {}
    }
    self.fs().copy(
      &self.context.runtime.version_marker,
      &server_dir.join(".bundle_version.txt"),
    )?;
    Ok(())
  }

  fn copy_public_assets(&mut self) -> BundleResult<()> {
    let public_dir = self.bundle.app_dir.join("public");
    if !self.fs().is_dir(&public_dir)? {
      return Ok(());
    }
    let copied = copy_tree(self.fs(), &public_dir, &self.build_path.join("static"), |name| {
      self.context.ignore.is_ignored(name)
    })?;
    for relative in copied {
      let relative = forward_slashes(&relative);
      let contents = self.fs().read(&public_dir.join(&relative))?;
      self.bundle.manifest.push(client_entry(
        format!("static/{relative}"),
        ManifestKind::Static,
        false,
        format!("/{relative}"),
        &contents,
      ));
    }
    Ok(())
  }

  /// When the minifier was skipped, individual client JS/CSS files become
  /// cacheable under a `?<hash>` URL instead.
  fn cache_bust_client_assets(&mut self) {
    let js_names = std::mem::take(&mut self.bundle.js[Environment::Client]);
    for name in js_names {
      self.cache_bust(name, ManifestKind::Js);
    }
    let css_names = std::mem::take(&mut self.bundle.css);
    for name in css_names {
      self.cache_bust(name, ManifestKind::Css);
    }
  }

  fn cache_bust(&mut self, serve_path: String, kind: ManifestKind) {
    let Some(contents) = self.bundle.files.client.shift_remove(&serve_path) else {
      return;
    };
    let url = cache_busted_url(&serve_path, &contents);
    self.bundle.manifest.push(client_entry(
      format!("static_cacheable{serve_path}"),
      kind,
      true,
      url,
      &contents,
    ));
    self
      .bundle
      .files
      .client_cacheable
      .insert(serve_path, contents);
  }

  fn write_client_files(&mut self) -> BundleResult<()> {
    let entries: Vec<(String, Vec<u8>)> = self.bundle.files.client.drain(..).collect();
    for (serve_path, contents) in entries {
      let relative = serve_path.trim_start_matches('/').to_string();
      write_file(
        self.fs(),
        &self.build_path.join("static").join(&relative),
        &contents,
      )?;
      self.bundle.manifest.push(client_entry(
        format!("static/{relative}"),
        ManifestKind::Static,
        false,
        serve_path,
        &contents,
      ));
    }
    Ok(())
  }

  fn write_cacheable_files(&self) -> BundleResult<()> {
    for (serve_path, contents) in &self.bundle.files.client_cacheable {
      let relative = serve_path.trim_start_matches('/');
      write_file(
        self.fs(),
        &self.build_path.join("static_cacheable").join(relative),
        contents,
      )?;
    }
    Ok(())
  }

  fn write_server_files(&mut self) -> BundleResult<()> {
    for (serve_path, contents) in &self.bundle.files.server {
      let relative = serve_path.trim_start_matches('/');
      write_file(
        self.fs(),
        &self.build_path.join("app").join(relative),
        contents,
      )?;
      self.load.push(format!("app/{relative}"));
    }
    Ok(())
  }

  fn install_package_node_modules(&self) -> BundleResult<()> {
    for (bundle_relative, source_dir) in &self.bundle.node_modules_dirs {
      let target = self.build_path.join(bundle_relative);
      let parent_exists = match target.parent() {
        Some(parent) => self.fs().is_dir(parent)?,
        None => false,
      };
      if !parent_exists {
        // The package contributed no server files, so there is nowhere to
        // install its modules.
        warn!(
          path = %target.display(),
          "skipping native modules for a package with no server directory"
        );
        continue;
      }
      match self.options.node_modules_mode {
        NodeModulesMode::Symlink => self.fs().symlink(source_dir, &target)?,
        NodeModulesMode::Copy | NodeModulesMode::Skip => {
          copy_tree(self.fs(), source_dir, &target, |_| false)?;
        }
      }
    }
    Ok(())
  }

  fn write_app_html(&mut self) -> BundleResult<()> {
    let scripts = self.manifest_urls(ManifestKind::Js);
    let stylesheets = self.manifest_urls(ManifestKind::Css);
    let head_extra = join_fragments(&self.bundle.head);
    let body_extra = join_fragments(&self.bundle.body);

    let contents = render_app_html(&scripts, &stylesheets, &head_extra, &body_extra);
    write_file(self.fs(), &self.build_path.join("app.html"), contents.as_bytes())?;
    self.bundle.manifest.push(ManifestEntry {
      path: "app.html".to_string(),
      location: ManifestLocation::Internal,
      kind: None,
      cacheable: None,
      url: None,
      size: None,
      hash: sha1_hex(contents.as_bytes()),
    });
    Ok(())
  }

  fn manifest_urls(&self, kind: ManifestKind) -> Vec<String> {
    self
      .bundle
      .manifest
      .iter()
      .filter(|entry| entry.location == ManifestLocation::Client && entry.kind == Some(kind))
      .filter_map(|entry| entry.url.clone())
      .collect()
  }

  fn write_entry_script(&self) -> BundleResult<()> {
    write_file(
      self.fs(),
      &self.build_path.join("main.js"),
      b"require(\"./server/server.js\");\n",
    )?;
    write_file(self.fs(), &self.build_path.join("README"), README.as_bytes())?;
    Ok(())
  }

  fn write_manifests(&self) -> BundleResult<()> {
    let app_manifest = AppManifest {
      manifest: self.bundle.manifest.clone(),
      load: self.load.clone(),
      release: self.bundle.release.clone(),
    };
    let json = serde_json::to_string_pretty(&app_manifest).map_err(anyhow::Error::from)?;
    write_file(self.fs(), &self.build_path.join("app.json"), json.as_bytes())?;

    let dependencies = self.dependencies_manifest();
    let json = serde_json::to_string_pretty(&dependencies).map_err(anyhow::Error::from)?;
    write_file(
      self.fs(),
      &self.build_path.join("dependencies.json"),
      json.as_bytes(),
    )?;
    Ok(())
  }

  fn dependencies_manifest(&self) -> DependenciesManifest {
    let mut app_deps: BTreeSet<String> = BTreeSet::new();
    let mut package_deps: IndexMap<String, BTreeSet<String>> = IndexMap::new();
    for build in self.bundle.builds.values() {
      match &build.package.name {
        Some(name) => {
          package_deps
            .entry(name.clone())
            .or_default()
            .extend(build.source_deps.iter().cloned());
        }
        None => app_deps.extend(build.source_deps.iter().cloned()),
      }
    }

    let extensions = self
      .bundle
      .app_build()
      .map(|build| build.package.registered_extensions())
      .unwrap_or_default();

    DependenciesManifest {
      core: self.context.runtime.server_lib_dir.display().to_string(),
      app: app_deps.into_iter().collect(),
      packages: package_deps
        .into_iter()
        .map(|(name, deps)| (name, deps.into_iter().collect()))
        .collect(),
      extensions,
      exclude: self.context.ignore.sources(),
    }
  }

  fn swap_into_place(&self) -> BundleResult<()> {
    remove_tree(self.fs(), &self.output_path)?;
    if let Some(parent) = self.output_path.parent() {
      self.fs().create_dir_all(parent)?;
    }
    self.fs().rename(&self.build_path, &self.output_path)?;
    Ok(())
  }
}

fn client_entry(
  path: String,
  kind: ManifestKind,
  cacheable: bool,
  url: String,
  contents: &[u8],
) -> ManifestEntry {
  ManifestEntry {
    path,
    location: ManifestLocation::Client,
    kind: Some(kind),
    cacheable: Some(cacheable),
    url: Some(url),
    size: Some(contents.len() as u64),
    hash: sha1_hex(contents),
  }
}

fn join_fragments(fragments: &[Vec<u8>]) -> String {
  fragments
    .iter()
    .map(|fragment| String::from_utf8_lossy(fragment).into_owned())
    .collect::<Vec<String>>()
    .join("\n")
}

fn forward_slashes(path: &Path) -> String {
  path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}
