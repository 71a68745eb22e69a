use regex::Regex;

/// Basename patterns skipped during copies and scans: editor droppings,
/// platform metadata files, VCS and framework state directories.
const STANDARD_SOURCES: &[&str] = &[
  "~$",
  "^\\.#",
  "^#.*#$",
  "^\\.DS_Store$",
  "^ehthumbs\\.db$",
  "^Icon\r$",
  "^Thumbs\\.db$",
  "^\\.bolide$",
  "^\\.git$",
];

/// One ignore rule: the compiled pattern paired with its verbatim source.
///
/// The source string is serialised into `dependencies.json` so the
/// development watcher can recompile the exact same rule.
#[derive(Clone, Debug)]
pub struct IgnorePattern {
  regex: Regex,
  source: String,
}

#[derive(Clone, Debug)]
pub struct IgnorePatterns {
  patterns: Vec<IgnorePattern>,
}

impl IgnorePatterns {
  /// The bundler's standard ignore list.
  pub fn standard() -> Self {
    Self::from_sources(STANDARD_SOURCES).expect("standard ignore patterns are valid")
  }

  pub fn from_sources<S: AsRef<str>>(sources: &[S]) -> Result<Self, regex::Error> {
    let patterns = sources
      .iter()
      .map(|source| {
        Ok(IgnorePattern {
          regex: Regex::new(source.as_ref())?,
          source: source.as_ref().to_string(),
        })
      })
      .collect::<Result<Vec<IgnorePattern>, regex::Error>>()?;
    Ok(Self { patterns })
  }

  /// Whether a basename matches any pattern.
  pub fn is_ignored(&self, basename: &str) -> bool {
    self
      .patterns
      .iter()
      .any(|pattern| pattern.regex.is_match(basename))
  }

  /// The verbatim pattern sources, in order.
  pub fn sources(&self) -> Vec<String> {
    self
      .patterns
      .iter()
      .map(|pattern| pattern.source.clone())
      .collect()
  }
}

impl Default for IgnorePatterns {
  fn default() -> Self {
    Self::standard()
  }
}
