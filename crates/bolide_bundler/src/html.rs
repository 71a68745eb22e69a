//! The pre-rendered HTML shell served to clients.

use indexmap::IndexMap;

const APP_HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
{{stylesheets}}{{scripts}}{{head_extra}}</head>
<body>
{{body_extra}}</body>
</html>
"#;

/// Replace every `{{name}}` placeholder in `template` with its value.
pub fn expand_template(template: &str, values: &IndexMap<&str, String>) -> String {
  let mut output = template.to_string();
  for (key, value) in values {
    output = output.replace(&format!("{{{{{key}}}}}"), value);
  }
  output
}

fn attribute_escape(value: &str) -> String {
  value
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

/// Render `app.html` from the manifest's client asset URLs and the
/// accumulated head/body fragments.
pub fn render_app_html(
  scripts: &[String],
  stylesheets: &[String],
  head_extra: &str,
  body_extra: &str,
) -> String {
  let script_tags: String = scripts
    .iter()
    .map(|url| {
      format!(
        "<script type=\"text/javascript\" src=\"{}\"></script>\n",
        attribute_escape(url)
      )
    })
    .collect();
  let stylesheet_tags: String = stylesheets
    .iter()
    .map(|url| format!("<link rel=\"stylesheet\" href=\"{}\">\n", attribute_escape(url)))
    .collect();

  let mut values = IndexMap::new();
  values.insert("scripts", script_tags);
  values.insert("stylesheets", stylesheet_tags);
  values.insert("head_extra", block(head_extra));
  values.insert("body_extra", block(body_extra));
  expand_template(APP_HTML_TEMPLATE, &values)
}

fn block(fragment: &str) -> String {
  if fragment.is_empty() {
    String::new()
  } else {
    format!("{fragment}\n")
  }
}
