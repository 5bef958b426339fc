use std::collections::HashMap;
use std::sync::Mutex;

use polyjudge::bundler::{BundleError, Bundler, ModuleFetcher};

use super::{fixture_project, project};

/// Serves canned CDN modules and records every request
#[derive(Default)]
struct CannedCdn {
    modules: HashMap<String, String>,
    requests: Mutex<Vec<String>>,
}

impl CannedCdn {
    fn with(modules: &[(&str, &str)]) -> Self {
        Self {
            modules: modules
                .iter()
                .map(|(url, source)| ((*url).to_owned(), (*source).to_owned()))
                .collect(),
            requests: Mutex::default(),
        }
    }
}

impl ModuleFetcher for CannedCdn {
    async fn fetch(&self, url: &str) -> Result<String, BundleError> {
        self.requests.lock().unwrap().push(url.to_owned());
        self.modules.get(url).cloned().ok_or_else(|| BundleError::Fetch {
            url: url.to_owned(),
            reason: "404 Not Found".to_owned(),
        })
    }
}

#[tokio::test]
async fn test_bundle_fixture_project() {
    let files = fixture_project("greeter");
    let bundler = Bundler::with_fetcher(CannedCdn::default(), "https://cdn.example.com");

    let code = bundler.bundle(&files, "main.js").await.expect("Failed to bundle");

    assert!(code.contains("// main.js"));
    assert!(code.contains("// lib/greet.js"));
    assert!(code.contains("// lib/punctuation.js"));
    assert!(code.contains("// config.json"));
    assert!(code.contains("__pjRequire(0)"));
    assert!(!code.contains("import {"));
}

#[tokio::test]
async fn test_bare_imports_go_to_cdn_once() {
    let files = project(&[
        ("main.js", "import a from 'left-pad';\nimport { b } from './b.js';\nconsole.log(a, b);"),
        ("b.js", "import pad from 'left-pad';\nexport const b = pad;"),
    ]);
    let cdn = CannedCdn::with(&[(
        "https://cdn.example.com/npm/left-pad/+esm",
        "export default function pad(s) { return s; }",
    )]);
    let bundler = Bundler::with_fetcher(cdn, "https://cdn.example.com");

    let code = bundler.bundle(&files, "main.js").await.expect("Failed to bundle");

    assert!(code.contains("// https://cdn.example.com/npm/left-pad/+esm"));
    assert_eq!(code.matches("function pad(s)").count(), 1);
}

#[tokio::test]
async fn test_cdn_failure_is_reported() {
    let files = project(&[("main.js", "import x from 'does-not-exist';")]);
    let bundler = Bundler::with_fetcher(CannedCdn::default(), "https://cdn.example.com");

    let err = bundler.bundle(&files, "main.js").await.unwrap_err();

    assert!(matches!(err, BundleError::Fetch { ref url, .. } if url.contains("does-not-exist")));
}

#[tokio::test]
async fn test_missing_entry() {
    let bundler = Bundler::with_fetcher(CannedCdn::default(), "https://cdn.example.com");
    let err = bundler
        .bundle(&project(&[("a.js", "")]), "main.js")
        .await
        .unwrap_err();
    assert!(matches!(err, BundleError::EntryNotFound(_)));
}

#[tokio::test]
#[ignore = "requires network access"]
async fn test_bundle_from_public_cdn() {
    let files = project(&[(
        "main.js",
        "import { chunk } from 'lodash-es';\nconsole.log(JSON.stringify(chunk([1, 2, 3], 2)));",
    )]);
    let bundler = Bundler::new(&polyjudge::Config::default().bundler);

    let code = bundler.bundle(&files, "main.js").await.expect("Failed to bundle");

    assert!(code.contains("cdn.jsdelivr.net/npm/lodash-es"));
}
