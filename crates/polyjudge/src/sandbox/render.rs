//! Render mode
//!
//! Code that touches the DOM cannot run in the worker. It is wrapped in an
//! HTML document for the caller to display instead.

use std::sync::LazyLock;

use regex::Regex;

/// Browser globals, jQuery calls and React DOM entry points, matched as
/// whole identifiers
static DOM_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\b(?:document|window)\s*\.|(?:^|[^\w$.])\$\s*\(|\bjQuery\s*\(|\bReactDOM\b|\bcreateRoot\s*\(|['"]react-dom(?:/[^'"]*)?['"]"#,
    )
    .expect("DOM marker regex is valid")
});

/// Check if source code written by the user needs a DOM to run
///
/// Only meant for the project's own files: library code fetched for a bundle
/// routinely probes for `window` without needing one.
pub fn needs_dom(code: &str) -> bool {
    DOM_MARKERS.is_match(code)
}

/// Build a standalone HTML document that runs `code` in the page
///
/// JSX is compiled in the page by Babel standalone, loaded from `cdn_base`.
pub fn document(code: &str, cdn_base: &str) -> String {
    let babel = format!(
        "{}/npm/@babel/standalone/babel.min.js",
        cdn_base.trim_end_matches('/')
    );
    // A literal `</script>` in the code would end the element early
    let code = code.replace("</script", "<\\/script");
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<script src="{babel}"></script>
</head>
<body>
<div id="root"></div>
<script type="text/babel" data-presets="react">
{code}
</script>
</body>
</html>
"#
    )
}
