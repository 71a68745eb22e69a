use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use bolide_core::plugin::ReleaseManifest;
use bolide_core::types::Environment;
use bolide_core::types::ManifestEntry;
use bolide_core::types::Package;
use bolide_core::types::PackageId;
use bolide_core::types::PerEnv;
use bolide_core::types::Resource;
use bolide_core::types::Role;

/// Identity of one package build within a bundle.
pub type BuildKey = (Role, PackageId);

/// The per-(package, role) workspace accumulating that package's
/// contributions to the bundle.
///
/// Created lazily on first dependency touch, mutated by the compiler and
/// linker stages, read-only from aggregation onwards.
#[derive(Debug)]
pub struct PackageBuild {
  pub package: Arc<Package>,
  pub role: Role,

  /// Whether this build takes part in each environment.
  pub presence: PerEnv<bool>,

  /// Emitted resources per environment, in emission order.
  pub resources: PerEnv<Vec<Resource>>,

  /// Source paths that influenced this build, for the development watcher.
  pub source_deps: BTreeSet<String>,
}

impl PackageBuild {
  pub fn new(package: Arc<Package>, role: Role) -> Self {
    Self {
      package,
      role,
      presence: PerEnv::default(),
      resources: PerEnv::default(),
      source_deps: BTreeSet::new(),
    }
  }

  pub fn add_resource(&mut self, environment: Environment, resource: Resource) {
    self.resources[environment].push(resource);
  }
}

/// Computed exports per (package, role, environment), written by the linker
/// driver and read by downstream import computation. Owning this here keeps
/// `Package` itself immutable.
#[derive(Debug, Default)]
pub struct ExportsRegistry {
  inner: HashMap<(PackageId, Role, Environment), Vec<String>>,
}

impl ExportsRegistry {
  pub fn record(
    &mut self,
    package_id: PackageId,
    role: Role,
    environment: Environment,
    symbols: Vec<String>,
  ) {
    self.inner.insert((package_id, role, environment), symbols);
  }

  pub fn exports(&self, package_id: &str, role: Role, environment: Environment) -> &[String] {
    self
      .inner
      .get(&(package_id.to_string(), role, environment))
      .map(Vec::as_slice)
      .unwrap_or_default()
  }
}

/// Bundle-wide file tables, keyed by serve path in aggregation order.
#[derive(Debug, Default)]
pub struct FileTables {
  pub client: IndexMap<String, Vec<u8>>,
  pub client_cacheable: IndexMap<String, Vec<u8>>,
  pub server: IndexMap<String, Vec<u8>>,
}

impl FileTables {
  pub fn table_mut(&mut self, environment: Environment) -> &mut IndexMap<String, Vec<u8>> {
    match environment {
      Environment::Client => &mut self.client,
      Environment::Server => &mut self.server,
    }
  }
}

/// The complete in-memory aggregate of resources and metadata prior to
/// writing.
#[derive(Debug)]
pub struct Bundle {
  pub app_dir: PathBuf,

  /// Release name recorded in `app.json`, absent for local-only builds.
  pub release: Option<String>,

  pub release_manifest: Option<ReleaseManifest>,

  /// Package builds in creation order.
  pub builds: IndexMap<BuildKey, PackageBuild>,

  /// Build keys in load order, valid after the load orderer ran.
  pub order: Vec<BuildKey>,

  /// Every named package resolved during this run.
  pub by_name: HashMap<String, Arc<Package>>,

  pub exports: ExportsRegistry,

  pub files: FileTables,

  /// Serve paths of JS files per environment, in load order.
  pub js: PerEnv<Vec<String>>,

  /// Serve paths of client CSS files, in load order.
  pub css: Vec<String>,

  /// Serve paths of static files per environment.
  pub statics: PerEnv<Vec<String>>,

  /// HTML fragments for the shell.
  pub head: Vec<Vec<u8>>,
  pub body: Vec<Vec<u8>>,

  /// Bundle-relative path to source directory of per-package native
  /// modules.
  pub node_modules_dirs: IndexMap<String, PathBuf>,

  pub manifest: Vec<ManifestEntry>,

  /// Non-fatal messages accumulated during the run, flushed into the
  /// caller-visible failure list.
  pub errors: Vec<String>,
}

impl Bundle {
  pub fn new(
    app_dir: PathBuf,
    release: Option<String>,
    release_manifest: Option<ReleaseManifest>,
  ) -> Self {
    Self {
      app_dir,
      release,
      release_manifest,
      builds: IndexMap::new(),
      order: Vec::new(),
      by_name: HashMap::new(),
      exports: ExportsRegistry::default(),
      files: FileTables::default(),
      js: PerEnv::default(),
      css: Vec::new(),
      statics: PerEnv::default(),
      head: Vec::new(),
      body: Vec::new(),
      node_modules_dirs: IndexMap::new(),
      manifest: Vec::new(),
      errors: Vec::new(),
    }
  }

  /// Fetch or lazily create the build for `(role, package)`. First touch of
  /// a package with native modules also registers their bundle location.
  pub fn get_or_create_build(&mut self, package: Arc<Package>, role: Role) -> &mut PackageBuild {
    let key = (role, package.id.clone());
    if !self.builds.contains_key(&key) {
      if let (Some(name), Some(dir)) = (&package.name, &package.node_modules_dir) {
        self
          .node_modules_dirs
          .entry(format!("app/packages/{name}/node_modules"))
          .or_insert_with(|| dir.clone());
      }
      self.builds.insert(key.clone(), PackageBuild::new(package, role));
    }
    self.builds.get_mut(&key).expect("inserted above")
  }

  pub fn app_build(&self) -> Option<&PackageBuild> {
    self.builds.values().find(|build| build.package.is_app())
  }
}
