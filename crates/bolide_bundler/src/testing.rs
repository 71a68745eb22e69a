//! In-memory collaborators for exercising the bundler without a package
//! warehouse, a real linker or real minifiers.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use bolide_core::ignore::IgnorePatterns;
use bolide_core::plugin::CssMinifier;
use bolide_core::plugin::Emit;
use bolide_core::plugin::EmitOptions;
use bolide_core::plugin::EmitSource;
use bolide_core::plugin::JsMinifier;
use bolide_core::plugin::JsMinifyOptions;
use bolide_core::plugin::Linker;
use bolide_core::plugin::LinkerFile;
use bolide_core::plugin::LinkerInput;
use bolide_core::plugin::LinkerOutput;
use bolide_core::plugin::LoadContext;
use bolide_core::plugin::NativeModuleInstaller;
use bolide_core::plugin::PackageLoader;
use bolide_core::plugin::SourceHandler;
use bolide_core::plugin::SourceInput;
use bolide_core::types::Environment;
use bolide_core::types::Package;
use bolide_core::types::ResourceKind;
use bolide_core::types::Role;

/// Builds [`Package`] values for tests and fixtures.
pub struct PackageBuilder {
  package: Package,
}

impl PackageBuilder {
  /// A named package rooted at `/packages/<name>` and served from there.
  pub fn new(name: &str) -> Self {
    Self {
      package: Package {
        id: name.to_string(),
        name: Some(name.to_string()),
        source_root: PathBuf::from(format!("/packages/{name}")),
        serve_root: format!("/packages/{name}"),
        uses: Default::default(),
        sources: Default::default(),
        declared_exports: Default::default(),
        unordered: Default::default(),
        handlers: Default::default(),
        node_modules_dir: None,
        installer: None,
      },
    }
  }

  /// The unnamed application package rooted at `app_dir`.
  pub fn app(app_dir: &Path) -> Self {
    Self {
      package: Package {
        id: "app".to_string(),
        name: None,
        source_root: app_dir.to_path_buf(),
        serve_root: "/".to_string(),
        uses: Default::default(),
        sources: Default::default(),
        declared_exports: Default::default(),
        unordered: Default::default(),
        handlers: Default::default(),
        node_modules_dir: None,
        installer: None,
      },
    }
  }

  pub fn uses(mut self, role: Role, environment: Environment, names: &[&str]) -> Self {
    self.package.uses[role][environment].extend(names.iter().map(|name| name.to_string()));
    self
  }

  pub fn source(mut self, role: Role, environment: Environment, relative_path: &str) -> Self {
    self.package.sources[role][environment].push(relative_path.to_string());
    self
  }

  pub fn exports(mut self, role: Role, environment: Environment, symbols: &[&str]) -> Self {
    self.package.declared_exports[role][environment]
      .extend(symbols.iter().map(|symbol| symbol.to_string()));
    self
  }

  pub fn unordered(mut self, name: &str) -> Self {
    self.package.unordered.insert(name.to_string());
    self
  }

  /// Register a handler for `extension` in every role and environment.
  pub fn handler(mut self, extension: &str, handler: Arc<dyn SourceHandler>) -> Self {
    for role in Role::ALL {
      for environment in Environment::ALL {
        self.package.handlers[role][environment].insert(extension.to_string(), handler.clone());
      }
    }
    self
  }

  pub fn node_modules(mut self, dir: &Path) -> Self {
    self.package.node_modules_dir = Some(dir.to_path_buf());
    self
  }

  pub fn installer(mut self, installer: Arc<dyn NativeModuleInstaller>) -> Self {
    self.package.installer = Some(installer);
    self
  }

  pub fn build(self) -> Arc<Package> {
    Arc::new(self.package)
  }
}

/// A loader serving packages from an in-memory registry, memoising lookups
/// the way a real warehouse-backed loader does.
#[derive(Debug)]
pub struct TestingPackageLoader {
  app: Arc<Package>,
  registry: Vec<Arc<Package>>,
  cache: Mutex<HashMap<String, Arc<Package>>>,
}

impl TestingPackageLoader {
  pub fn new(app: Arc<Package>, registry: Vec<Arc<Package>>) -> Self {
    Self {
      app,
      registry,
      cache: Mutex::new(HashMap::new()),
    }
  }
}

impl PackageLoader for TestingPackageLoader {
  fn get(&self, name: &str, _context: &LoadContext) -> Result<Option<Arc<Package>>, anyhow::Error> {
    if let Some(package) = self.cache.lock().get(name) {
      return Ok(Some(package.clone()));
    }
    let found = self
      .registry
      .iter()
      .find(|package| package.name.as_deref() == Some(name))
      .cloned();
    if let Some(package) = &found {
      self.cache.lock().insert(name.to_string(), package.clone());
    }
    Ok(found)
  }

  fn app_package(
    &self,
    _app_dir: &Path,
    _ignore: &IgnorePatterns,
  ) -> Result<Arc<Package>, anyhow::Error> {
    Ok(self.app.clone())
  }

  fn flush(&self) {
    self.cache.lock().clear();
  }
}

/// Combines package files onto the combined serve path and exports exactly
/// the declared set. Application files pass through untouched.
#[derive(Debug, Default)]
pub struct PassthroughLinker;

impl Linker for PassthroughLinker {
  fn link(&self, input: LinkerInput) -> Result<LinkerOutput, anyhow::Error> {
    let files = match input.combined_serve_path {
      Some(serve_path) if !input.files.is_empty() => {
        let source = input
          .files
          .iter()
          .map(|file| file.source.as_str())
          .collect::<Vec<&str>>()
          .join("\n");
        vec![LinkerFile { source, serve_path }]
      }
      Some(_) => Vec::new(),
      None => input.files,
    };
    Ok(LinkerOutput {
      files,
      exports: input.force_export,
    })
  }
}

/// Records every input it sees, then behaves like [`PassthroughLinker`].
#[derive(Debug, Default)]
pub struct RecordingLinker {
  pub inputs: Mutex<Vec<LinkerInput>>,
}

impl Linker for RecordingLinker {
  fn link(&self, input: LinkerInput) -> Result<LinkerOutput, anyhow::Error> {
    self.inputs.lock().push(input.clone());
    PassthroughLinker.link(input)
  }
}

#[derive(Debug, Default)]
pub struct NoopJsMinifier;

impl JsMinifier for NoopJsMinifier {
  fn minify(&self, source: &[u8], _options: &JsMinifyOptions) -> Result<Vec<u8>, anyhow::Error> {
    Ok(source.to_vec())
  }
}

#[derive(Debug, Default)]
pub struct NoopCssMinifier;

impl CssMinifier for NoopCssMinifier {
  fn minify(&self, source: &[u8]) -> Result<Vec<u8>, anyhow::Error> {
    Ok(source.to_vec())
  }
}

/// Emits the source file verbatim as a JS resource for the environment it
/// was declared in.
#[derive(Debug, Default)]
pub struct JsSourceHandler;

impl SourceHandler for JsSourceHandler {
  fn compile(&self, emit: &mut dyn Emit, input: &SourceInput) -> Result<(), anyhow::Error> {
    emit.emit(EmitOptions {
      kind: ResourceKind::Js,
      targets: vec![input.environment],
      serve_path: Some(input.serve_path.clone()),
      source: EmitSource::File(input.source_path.clone()),
    })
  }
}

/// Emits the source file verbatim as a CSS resource for the environment it
/// was declared in.
#[derive(Debug, Default)]
pub struct CssSourceHandler;

impl SourceHandler for CssSourceHandler {
  fn compile(&self, emit: &mut dyn Emit, input: &SourceInput) -> Result<(), anyhow::Error> {
    emit.emit(EmitOptions {
      kind: ResourceKind::Css,
      targets: vec![input.environment],
      serve_path: Some(input.serve_path.clone()),
      source: EmitSource::File(input.source_path.clone()),
    })
  }
}
