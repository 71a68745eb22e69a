use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use bolide_core::plugin::LoadContext;
use bolide_core::types::Environment;
use bolide_core::types::Role;
use bolide_core::BundleError;
use bolide_core::BundleFailure;
use bolide_core::BundleResult;

use crate::aggregator;
use crate::bundle::Bundle;
use crate::compiler;
use crate::linker;
use crate::load_order;
use crate::minify;
use crate::options::BundleOptions;
use crate::options::BundlerContext;
use crate::resolver;
use crate::resolver::Roots;
use crate::writer;

/// Marker release value for local-only builds.
const RELEASE_NONE: &str = "none";

/// Drives the whole pipeline: resolve, order, compile, link, aggregate,
/// optionally minify, write.
pub struct Bundler {
  context: BundlerContext,
}

impl Bundler {
  pub fn new(context: BundlerContext) -> Self {
    Self { context }
  }

  /// Bundle the application at `app_dir` into `output_path`.
  ///
  /// Returns the ordered list of error messages on failure. A partially
  /// written output may remain on disk; its `dependencies.json` still
  /// tells a watcher when a retry is worthwhile.
  #[tracing::instrument(skip_all, fields(app_dir = %app_dir.display()))]
  pub fn bundle(
    &self,
    app_dir: &Path,
    output_path: &Path,
    options: BundleOptions,
  ) -> Result<(), BundleFailure> {
    self.context.loader.flush();

    let release = (options.release != RELEASE_NONE).then(|| options.release.clone());
    let mut bundle = Bundle::new(
      app_dir.to_path_buf(),
      release,
      options.release_manifest.clone(),
    );

    let result = self.run(&mut bundle, output_path, &options);

    let mut failure = BundleFailure::from_messages(std::mem::take(&mut bundle.errors));
    if let Err(error) = result {
      failure.push(failure_message(error));
    }
    if failure.is_empty() {
      Ok(())
    } else {
      Err(failure)
    }
  }

  fn run(
    &self,
    bundle: &mut Bundle,
    output_path: &Path,
    options: &BundleOptions,
  ) -> BundleResult<()> {
    let app = self
      .context
      .loader
      .app_package(&bundle.app_dir, &self.context.ignore)?;

    let mut roots = Roots::default();
    for environment in Environment::ALL {
      roots[Role::Use][environment].push(app.clone());
    }
    for name in &options.test_packages {
      let context = LoadContext {
        release_manifest: bundle.release_manifest.as_ref(),
        app_dir: &bundle.app_dir,
      };
      let package = self
        .context
        .loader
        .get(name, &context)?
        .ok_or_else(|| BundleError::Resolution(name.clone()))?;
      for environment in Environment::ALL {
        roots[Role::Test][environment].push(package.clone());
      }
    }

    resolver::resolve(bundle, self.context.loader.as_ref(), &roots)?;
    self.install_native_modules(bundle)?;
    load_order::order(bundle)?;
    compiler::compile(bundle, self.context.fs.as_ref())?;
    linker::link(bundle, self.context.linker.as_ref())?;
    aggregator::aggregate(bundle)?;
    if options.minify {
      minify::minify(
        bundle,
        self.context.js_minifier.as_ref(),
        self.context.css_minifier.as_ref(),
      )?;
    }
    writer::write_bundle(bundle, &self.context, options, output_path)?;
    debug!(builds = bundle.builds.len(), "bundle written");
    Ok(())
  }

  /// Run each resolved package's native-module installer, once per
  /// package even when it takes part in both roles.
  fn install_native_modules(&self, bundle: &Bundle) -> BundleResult<()> {
    let mut installed: HashSet<&str> = HashSet::new();
    for build in bundle.builds.values() {
      let package = &build.package;
      if let Some(installer) = &package.installer {
        if installed.insert(package.id.as_str()) {
          installer.ensure_installed(package)?;
        }
      }
    }
    Ok(())
  }
}

fn failure_message(error: BundleError) -> String {
  match error {
    // Collaborator failures keep their full context chain.
    BundleError::Internal(error) => format!("{error:#}"),
    other => other.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use std::io;
  use std::path::PathBuf;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;
  use std::sync::Arc;

  use pretty_assertions::assert_eq;
  use serde_json::Value;

  use bolide_core::hash::sha1_hex;
  use bolide_core::ignore::IgnorePatterns;
  use bolide_core::plugin::Emit;
  use bolide_core::plugin::EmitOptions;
  use bolide_core::plugin::EmitSource;
  use bolide_core::plugin::Linker;
  use bolide_core::plugin::NativeModuleInstaller;
  use bolide_core::plugin::SourceHandler;
  use bolide_core::plugin::SourceInput;
  use bolide_core::types::FileSystem;
  use bolide_core::types::Package;
  use bolide_core::types::ResourceKind;
  use bolide_filesystem::InMemoryFileSystem;

  use crate::options::NodeModulesMode;
  use crate::options::RuntimePaths;
  use crate::testing::CssSourceHandler;
  use crate::testing::JsSourceHandler;
  use crate::testing::PackageBuilder;
  use crate::testing::PassthroughLinker;
  use crate::testing::RecordingLinker;
  use crate::testing::NoopCssMinifier;
  use crate::testing::NoopJsMinifier;
  use crate::testing::TestingPackageLoader;

  use super::*;

  fn fixture_fs() -> Arc<InMemoryFileSystem> {
    let fs = Arc::new(InMemoryFileSystem::default());
    fs.write(Path::new("/runtime/server/server.js"), b"// runtime\n")
      .unwrap();
    fs.write(Path::new("/runtime/version"), b"1.4.2\n").unwrap();
    fs.write(
      Path::new("/runtime/node_modules/connect/index.js"),
      b"module.exports = {};\n",
    )
    .unwrap();
    fs
  }

  fn testing_context(
    fs: Arc<InMemoryFileSystem>,
    loader: Arc<TestingPackageLoader>,
    linker: Arc<dyn Linker>,
  ) -> BundlerContext {
    BundlerContext {
      fs,
      loader,
      linker,
      js_minifier: Arc::new(NoopJsMinifier),
      css_minifier: Arc::new(NoopCssMinifier),
      runtime: RuntimePaths {
        server_lib_dir: PathBuf::from("/runtime/server"),
        native_modules_dir: PathBuf::from("/runtime/node_modules"),
        version_marker: PathBuf::from("/runtime/version"),
      },
      ignore: IgnorePatterns::standard(),
    }
  }

  fn local_options() -> BundleOptions {
    BundleOptions {
      release: "none".to_string(),
      release_manifest: None,
      node_modules_mode: NodeModulesMode::Skip,
      test_packages: Vec::new(),
      minify: false,
    }
  }

  fn app_json(fs: &InMemoryFileSystem, output: &str) -> Value {
    serde_json::from_slice(&fs.read(&PathBuf::from(output).join("app.json")).unwrap()).unwrap()
  }

  fn client_js_urls(manifest: &Value) -> Vec<String> {
    manifest["manifest"]
      .as_array()
      .unwrap()
      .iter()
      .filter(|entry| entry["type"] == "js" && entry["where"] == "client")
      .map(|entry| entry["url"].as_str().unwrap().to_string())
      .collect()
  }

  #[test]
  fn a_minimal_application_bundles_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();
    let fs = fixture_fs();
    fs.write(Path::new("/app/main.js"), b"console.log('hi');\n")
      .unwrap();
    let app = PackageBuilder::app(Path::new("/app"))
      .source(Role::Use, Environment::Server, "main.js")
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    assert_eq!(
      fs.read(Path::new("/out/main.js")).unwrap(),
      b"require(\"./server/server.js\");\n"
    );
    assert!(fs.is_file(Path::new("/out/server/server.js")).unwrap());
    assert_eq!(
      fs.read(Path::new("/out/server/.bundle_version.txt")).unwrap(),
      b"1.4.2\n"
    );
    assert_eq!(
      fs.read(Path::new("/out/app/main.js")).unwrap(),
      b"console.log('hi');\n"
    );
    assert!(fs.is_file(Path::new("/out/README")).unwrap());
    assert!(fs.is_file(Path::new("/out/dependencies.json")).unwrap());
    // Skip mode installs no platform modules.
    assert!(!fs.exists(Path::new("/out/server/node_modules")).unwrap());
    // The build area was swapped away.
    assert!(!fs.exists(Path::new("/.build.out")).unwrap());

    let manifest = app_json(&fs, "/out");
    assert_eq!(manifest["load"], serde_json::json!(["app/main.js"]));
    assert!(manifest.get("release").is_none());
    assert!(manifest["manifest"]
      .as_array()
      .unwrap()
      .iter()
      .any(|entry| entry["path"] == "app.html" && entry["where"] == "internal"));
  }

  #[test]
  fn packages_link_in_dependency_order_with_upstream_imports() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/a/a.js"), b"A = 1;").unwrap();
    fs.write(Path::new("/packages/b/b.js"), b"B = A + 1;").unwrap();
    fs.write(Path::new("/app/client.js"), b"ui();").unwrap();

    let js: Arc<dyn SourceHandler> = Arc::new(JsSourceHandler);
    let a = PackageBuilder::new("a")
      .source(Role::Use, Environment::Client, "a.js")
      .exports(Role::Use, Environment::Client, &["A"])
      .handler("js", js.clone())
      .build();
    let b = PackageBuilder::new("b")
      .uses(Role::Use, Environment::Client, &["a"])
      .source(Role::Use, Environment::Client, "b.js")
      .exports(Role::Use, Environment::Client, &["B"])
      .handler("js", js.clone())
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["a", "b"])
      .source(Role::Use, Environment::Client, "client.js")
      .handler("js", js)
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![a, b]));
    let linker = Arc::new(RecordingLinker::default());
    let bundler = Bundler::new(testing_context(fs.clone(), loader, linker.clone()));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    let inputs = linker.inputs.lock();
    let a_input = inputs
      .iter()
      .find(|input| input.name.as_deref() == Some("a"))
      .unwrap();
    assert!(a_input.imports.is_empty());
    assert_eq!(
      a_input.combined_serve_path.as_deref(),
      Some("/packages/a.js")
    );

    let b_input = inputs
      .iter()
      .find(|input| input.name.as_deref() == Some("b"))
      .unwrap();
    assert_eq!(b_input.imports.get("A").map(String::as_str), Some("a"));

    let app_input = inputs
      .iter()
      .find(|input| input.name.is_none() && !input.files.is_empty())
      .unwrap();
    assert!(app_input.use_global_namespace);
    assert_eq!(app_input.combined_serve_path, None);
    assert_eq!(app_input.imports.get("A").map(String::as_str), Some("a"));
    assert_eq!(app_input.imports.get("B").map(String::as_str), Some("b"));

    // Client script order follows the load order: a, b, then the app.
    let manifest = app_json(&fs, "/out");
    let urls = client_js_urls(&manifest);
    assert_eq!(urls.len(), 3);
    assert!(urls[0].starts_with("/packages/a.js?"));
    assert!(urls[1].starts_with("/packages/b.js?"));
    assert!(urls[2].starts_with("/client.js?"));
  }

  #[test]
  fn a_dependency_cycle_fails_the_bundle() {
    let fs = fixture_fs();
    let a = PackageBuilder::new("a")
      .uses(Role::Use, Environment::Client, &["b"])
      .build();
    let b = PackageBuilder::new("b")
      .uses(Role::Use, Environment::Client, &["a"])
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["a"])
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![a, b]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let failure = bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap_err();

    assert_eq!(failure.messages().len(), 1);
    let message = &failure.messages()[0];
    assert!(message.contains("circular dependency"), "{message}");
    assert!(message.contains("a") && message.contains("b"), "{message}");
    assert!(!fs.exists(Path::new("/out")).unwrap());
  }

  #[test]
  fn an_unordered_edge_makes_the_cycle_bundle() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/a/a.js"), b"A = 1;").unwrap();
    fs.write(Path::new("/packages/b/b.js"), b"B = 2;").unwrap();

    let js: Arc<dyn SourceHandler> = Arc::new(JsSourceHandler);
    let a = PackageBuilder::new("a")
      .uses(Role::Use, Environment::Client, &["b"])
      .unordered("b")
      .source(Role::Use, Environment::Client, "a.js")
      .handler("js", js.clone())
      .build();
    let b = PackageBuilder::new("b")
      .uses(Role::Use, Environment::Client, &["a"])
      .source(Role::Use, Environment::Client, "b.js")
      .handler("js", js)
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["a"])
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![a, b]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    let manifest = app_json(&fs, "/out");
    let urls = client_js_urls(&manifest);
    let of_a: Vec<&String> = urls.iter().filter(|u| u.starts_with("/packages/a.js?")).collect();
    let of_b: Vec<&String> = urls.iter().filter(|u| u.starts_with("/packages/b.js?")).collect();
    assert_eq!(of_a.len(), 1);
    assert_eq!(of_b.len(), 1);
  }

  #[test]
  fn test_builds_load_after_the_production_builds_they_import() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/a/a.js"), b"A = 1;").unwrap();
    fs.write(Path::new("/packages/a/a_tests.js"), b"check(A);").unwrap();
    fs.write(Path::new("/packages/b/b.js"), b"B = 2;").unwrap();

    let js: Arc<dyn SourceHandler> = Arc::new(JsSourceHandler);
    let b = PackageBuilder::new("b")
      .source(Role::Use, Environment::Client, "b.js")
      .exports(Role::Use, Environment::Client, &["ApiB"])
      .handler("js", js.clone())
      .build();
    let a = PackageBuilder::new("a")
      .uses(Role::Use, Environment::Client, &["b"])
      .uses(Role::Test, Environment::Client, &["a", "b"])
      .source(Role::Use, Environment::Client, "a.js")
      .source(Role::Test, Environment::Client, "a_tests.js")
      .exports(Role::Use, Environment::Client, &["ApiA"])
      .handler("js", js)
      .build();
    let app = PackageBuilder::app(Path::new("/app")).build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![a, b]));
    let linker = Arc::new(RecordingLinker::default());
    let bundler = Bundler::new(testing_context(fs.clone(), loader, linker.clone()));

    let mut options = local_options();
    options.test_packages = vec!["a".to_string()];
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    let inputs = linker.inputs.lock();
    let combined: Vec<Option<String>> = inputs
      .iter()
      .map(|input| input.combined_serve_path.clone())
      .collect();
    let position = |path: &str| {
      combined
        .iter()
        .position(|candidate| candidate.as_deref() == Some(path))
        .unwrap_or_else(|| panic!("no linker input for {path}"))
    };
    assert!(position("/packages/b.js") < position("/packages/a.js"));
    assert!(position("/packages/a.js") < position("/package-tests/a.js"));

    // The test build imports the production exports of both upstreams.
    let test_input = inputs
      .iter()
      .find(|input| input.combined_serve_path.as_deref() == Some("/package-tests/a.js"))
      .unwrap();
    assert_eq!(test_input.imports.get("ApiA").map(String::as_str), Some("a"));
    assert_eq!(test_input.imports.get("ApiB").map(String::as_str), Some("b"));
  }

  #[test]
  fn minification_collapses_client_js_into_one_hashed_file() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/one.js"), b"one();").unwrap();
    fs.write(Path::new("/app/two.js"), b"two();").unwrap();

    let app = PackageBuilder::app(Path::new("/app"))
      .source(Role::Use, Environment::Client, "one.js")
      .source(Role::Use, Environment::Client, "two.js")
      .handler("js", Arc::new(JsSourceHandler))
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.minify = true;
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    let expected = b"one();\n;\ntwo();".to_vec();
    let hash = sha1_hex(&expected);

    let manifest = app_json(&fs, "/out");
    let urls = client_js_urls(&manifest);
    assert_eq!(urls, vec![format!("/{hash}.js")]);
    assert_eq!(
      fs.read(&PathBuf::from(format!("/out/static_cacheable/{hash}.js")))
        .unwrap(),
      expected
    );

    let html = fs.read_to_string(Path::new("/out/app.html")).unwrap();
    assert!(html.contains(&format!("src=\"/{hash}.js\"")));
  }

  #[test]
  fn manifest_hashes_and_sizes_match_the_written_files() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/client.js"), b"ui();").unwrap();
    fs.write(Path::new("/app/style.css"), b"body {}").unwrap();
    fs.write(Path::new("/app/public/logo.png"), b"png").unwrap();

    let app = PackageBuilder::app(Path::new("/app"))
      .source(Role::Use, Environment::Client, "client.js")
      .source(Role::Use, Environment::Client, "style.css")
      .handler("js", Arc::new(JsSourceHandler))
      .handler("css", Arc::new(CssSourceHandler))
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    let manifest = app_json(&fs, "/out");
    let html = fs.read_to_string(Path::new("/out/app.html")).unwrap();
    let mut checked = 0;
    for entry in manifest["manifest"].as_array().unwrap() {
      if let Some(size) = entry["size"].as_u64() {
        let contents = fs
          .read(&PathBuf::from("/out").join(entry["path"].as_str().unwrap()))
          .unwrap();
        assert_eq!(contents.len() as u64, size);
        assert_eq!(sha1_hex(&contents), entry["hash"].as_str().unwrap());
        checked += 1;
      }
      match entry["type"].as_str() {
        Some("js") => assert!(html.contains(&format!("src=\"{}\"", entry["url"].as_str().unwrap()))),
        Some("css") => {
          assert!(html.contains(&format!("href=\"{}\"", entry["url"].as_str().unwrap())))
        }
        _ => {}
      }
    }
    assert!(checked >= 3, "expected hashed entries, saw {checked}");
  }

  #[test]
  fn rebundling_identical_inputs_is_byte_identical() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/client.js"), b"ui();").unwrap();
    let build_app = || {
      PackageBuilder::app(Path::new("/app"))
        .source(Role::Use, Environment::Client, "client.js")
        .handler("js", Arc::new(JsSourceHandler))
        .build()
    };

    for output in ["/out1", "/out2"] {
      let loader = Arc::new(TestingPackageLoader::new(build_app(), vec![]));
      let bundler = Bundler::new(testing_context(
        fs.clone(),
        loader,
        Arc::new(PassthroughLinker),
      ));
      bundler
        .bundle(Path::new("/app"), Path::new(output), local_options())
        .unwrap();
    }

    assert_eq!(
      fs.read(Path::new("/out1/app.json")).unwrap(),
      fs.read(Path::new("/out2/app.json")).unwrap()
    );
    assert_eq!(
      fs.read(Path::new("/out1/app.html")).unwrap(),
      fs.read(Path::new("/out2/app.html")).unwrap()
    );
  }

  #[test]
  fn a_release_is_recorded_in_the_manifest() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/main.js"), b"x();").unwrap();
    let app = PackageBuilder::app(Path::new("/app"))
      .source(Role::Use, Environment::Server, "main.js")
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.release = "0.9.1".to_string();
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    assert_eq!(app_json(&fs, "/out")["release"], "0.9.1");
  }

  #[test]
  fn public_assets_are_copied_and_recorded() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/public/logo.png"), b"png").unwrap();
    fs.write(Path::new("/app/public/notes.txt~"), b"junk").unwrap();
    let app = PackageBuilder::app(Path::new("/app")).build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    assert_eq!(fs.read(Path::new("/out/static/logo.png")).unwrap(), b"png");
    assert!(!fs.exists(Path::new("/out/static/notes.txt~")).unwrap());

    let manifest = app_json(&fs, "/out");
    let entry = manifest["manifest"]
      .as_array()
      .unwrap()
      .iter()
      .find(|entry| entry["path"] == "static/logo.png")
      .unwrap();
    assert_eq!(entry["url"], "/logo.png");
    assert_eq!(entry["cacheable"], false);
    assert_eq!(entry["type"], "static");
  }

  #[test]
  fn head_and_body_fragments_reach_the_shell() {
    #[derive(Debug)]
    struct FragmentHandler;
    impl SourceHandler for FragmentHandler {
      fn compile(&self, emit: &mut dyn Emit, _input: &SourceInput) -> Result<(), anyhow::Error> {
        emit.emit(EmitOptions {
          kind: ResourceKind::Head,
          targets: vec![Environment::Client],
          serve_path: None,
          source: EmitSource::Text("<meta name=\"generator\" content=\"bolide\">".into()),
        })
      }
    }

    let fs = fixture_fs();
    fs.write(Path::new("/app/head.html"), b"").unwrap();
    let app = PackageBuilder::app(Path::new("/app"))
      .source(Role::Use, Environment::Client, "head.html")
      .handler("html", Arc::new(FragmentHandler))
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();

    let html = fs.read_to_string(Path::new("/out/app.html")).unwrap();
    assert!(html.contains("<meta name=\"generator\" content=\"bolide\">"));
  }

  #[test]
  fn package_native_modules_are_symlinked_next_to_their_server_files() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/db/server.js"), b"db();").unwrap();
    fs.write(Path::new("/modules/db/dep/index.js"), b"x").unwrap();

    let db = PackageBuilder::new("db")
      .source(Role::Use, Environment::Server, "server.js")
      .node_modules(Path::new("/modules/db"))
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Server, &["db"])
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![db]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.node_modules_mode = NodeModulesMode::Symlink;
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    assert_eq!(
      fs.read_link(Path::new("/out/app/packages/db/node_modules"))
        .unwrap(),
      PathBuf::from("/modules/db")
    );
    // Symlink mode also links the platform module root.
    assert_eq!(
      fs.read_link(Path::new("/out/server/node_modules")).unwrap(),
      PathBuf::from("/runtime/node_modules")
    );
  }

  #[test]
  fn native_modules_without_a_server_directory_are_skipped() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/ui/widget.js"), b"w();").unwrap();
    fs.write(Path::new("/modules/ui/dep/index.js"), b"x").unwrap();

    let ui = PackageBuilder::new("ui")
      .source(Role::Use, Environment::Client, "widget.js")
      .handler("js", Arc::new(JsSourceHandler))
      .node_modules(Path::new("/modules/ui"))
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["ui"])
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![ui]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.node_modules_mode = NodeModulesMode::Copy;
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    assert!(!fs
      .exists(Path::new("/out/app/packages/ui/node_modules"))
      .unwrap());
    // Copy mode copies the platform module root.
    assert!(fs
      .is_file(Path::new("/out/server/node_modules/connect/index.js"))
      .unwrap());
  }

  #[test]
  fn installers_run_once_per_package() {
    #[derive(Debug, Default)]
    struct CountingInstaller {
      calls: AtomicUsize,
    }
    impl NativeModuleInstaller for CountingInstaller {
      fn ensure_installed(&self, _package: &Package) -> Result<(), anyhow::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
      }
    }

    let fs = fixture_fs();
    fs.write(Path::new("/packages/db/db.js"), b"db();").unwrap();
    fs.write(Path::new("/packages/db/db_tests.js"), b"t();").unwrap();

    let installer = Arc::new(CountingInstaller::default());
    let db = PackageBuilder::new("db")
      .uses(Role::Test, Environment::Client, &["db"])
      .source(Role::Use, Environment::Client, "db.js")
      .source(Role::Test, Environment::Client, "db_tests.js")
      .handler("js", Arc::new(JsSourceHandler))
      .installer(installer.clone())
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["db"])
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![db]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.test_packages = vec!["db".to_string()];
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    // The package takes part as both use and test, but installs once.
    assert_eq!(installer.calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn dependencies_manifest_unions_sources_across_roles() {
    let fs = fixture_fs();
    fs.write(Path::new("/packages/db/db.js"), b"db();").unwrap();
    fs.write(Path::new("/packages/db/db_tests.js"), b"t();").unwrap();
    fs.write(Path::new("/app/main.js"), b"m();").unwrap();

    let db = PackageBuilder::new("db")
      .uses(Role::Test, Environment::Client, &["db"])
      .source(Role::Use, Environment::Client, "db.js")
      .source(Role::Test, Environment::Client, "db_tests.js")
      .handler("js", Arc::new(JsSourceHandler))
      .build();
    let app = PackageBuilder::app(Path::new("/app"))
      .uses(Role::Use, Environment::Client, &["db"])
      .source(Role::Use, Environment::Server, "main.js")
      .handler("js", Arc::new(JsSourceHandler))
      .build();
    let loader = Arc::new(TestingPackageLoader::new(app, vec![db]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));

    let mut options = local_options();
    options.test_packages = vec!["db".to_string()];
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), options)
      .unwrap();

    let dependencies: Value =
      serde_json::from_slice(&fs.read(Path::new("/out/dependencies.json")).unwrap()).unwrap();
    assert_eq!(dependencies["core"], "/runtime/server");
    assert_eq!(dependencies["app"], serde_json::json!(["main.js"]));
    assert_eq!(
      dependencies["packages"]["db"],
      serde_json::json!(["db.js", "db_tests.js"])
    );
    assert_eq!(dependencies["extensions"], serde_json::json!(["js"]));
    assert!(dependencies["exclude"]
      .as_array()
      .unwrap()
      .iter()
      .any(|pattern| pattern == "~$"));
  }

  /// Delegates to an in-memory file system but fails writes of paths
  /// containing a marker, to exercise mid-write failure behaviour.
  #[derive(Debug)]
  struct FailingWrites {
    inner: Arc<InMemoryFileSystem>,
    marker: String,
  }

  impl FileSystem for FailingWrites {
    fn cwd(&self) -> io::Result<PathBuf> {
      self.inner.cwd()
    }
    fn exists(&self, path: &Path) -> io::Result<bool> {
      self.inner.exists(path)
    }
    fn is_file(&self, path: &Path) -> io::Result<bool> {
      self.inner.is_file(path)
    }
    fn is_dir(&self, path: &Path) -> io::Result<bool> {
      self.inner.is_dir(path)
    }
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
      self.inner.read(path)
    }
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
      self.inner.read_to_string(path)
    }
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
      self.inner.read_dir(path)
    }
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
      if path.to_string_lossy().contains(&self.marker) {
        return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
      }
      self.inner.write(path, contents)
    }
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
      self.inner.copy(from, to)
    }
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
      self.inner.create_dir_all(path)
    }
    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
      self.inner.remove_dir_all(path)
    }
    fn remove_file(&self, path: &Path) -> io::Result<()> {
      self.inner.remove_file(path)
    }
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
      self.inner.rename(from, to)
    }
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
      self.inner.symlink(original, link)
    }
    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
      self.inner.read_link(path)
    }
  }

  #[test]
  fn a_failed_write_leaves_the_previous_bundle_in_place() {
    let fs = fixture_fs();
    fs.write(Path::new("/app/main.js"), b"v1();").unwrap();
    let build_app = || {
      PackageBuilder::app(Path::new("/app"))
        .source(Role::Use, Environment::Server, "main.js")
        .build()
    };

    let loader = Arc::new(TestingPackageLoader::new(build_app(), vec![]));
    let bundler = Bundler::new(testing_context(
      fs.clone(),
      loader,
      Arc::new(PassthroughLinker),
    ));
    bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap();
    let previous = fs.read(Path::new("/out/app.json")).unwrap();

    let failing = Arc::new(FailingWrites {
      inner: fs.clone(),
      marker: "app.json".to_string(),
    });
    let loader = Arc::new(TestingPackageLoader::new(build_app(), vec![]));
    let mut context = testing_context(fs.clone(), loader, Arc::new(PassthroughLinker));
    context.fs = failing;
    let bundler = Bundler::new(context);

    let failure = bundler
      .bundle(Path::new("/app"), Path::new("/out"), local_options())
      .unwrap_err();
    assert!(failure.messages()[0].contains("disk full"), "{failure}");

    // The previous output is untouched; the build area is left behind.
    assert_eq!(fs.read(Path::new("/out/app.json")).unwrap(), previous);
    assert!(fs.is_dir(Path::new("/.build.out")).unwrap());
  }
}
