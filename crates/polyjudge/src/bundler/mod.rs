//! Dependency bundler for the scripting family
//!
//! Walks the import graph from an entry file, resolving relative imports
//! against the in-memory file map and bare imports against a CDN, and emits
//! one self-contained script. Every module becomes a function in a small
//! CommonJS-style registry; the entry module runs first.
//!
//! Remote modules are cached by URL for the duration of one bundling pass and
//! assumed not to change during it.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;
use tracing::{debug, instrument};

pub use crate::bundler::fetcher::{CdnFetcher, ModuleFetcher};
pub use crate::bundler::resolve::{EXTENSION_FALLBACKS, ModuleKey, normalize_path};
use crate::bundler::resolve::{FileIndex, resolve};
use crate::bundler::transform::SpecifierMap;
use crate::config::BundlerConfig;
use crate::types::VirtualFileMap;

mod fetcher;
mod resolve;
mod transform;

/// Errors that occur while bundling
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("entry file '{0}' not found")]
    EntryNotFound(String),

    #[error("cannot resolve '{specifier}' imported from '{importer}'")]
    Unresolved { specifier: String, importer: String },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

const RUNTIME: &str = r#"  const __pjCache = {};
  function __pjExport(target, getters) {
    for (const name in getters) {
      Object.defineProperty(target, name, { enumerable: true, configurable: true, get: getters[name] });
    }
  }
  function __pjExportStar(target, source) {
    for (const name in source) {
      if (name !== "default" && !Object.prototype.hasOwnProperty.call(target, name)) {
        Object.defineProperty(target, name, { enumerable: true, configurable: true, get: () => source[name] });
      }
    }
  }
  function __pjDefault(m) {
    return m != null && Object.prototype.hasOwnProperty.call(m, "default") ? m.default : m;
  }
  function __pjRequire(id) {
    if (__pjCache[id]) return __pjCache[id].exports;
    const module = { exports: {} };
    __pjCache[id] = module;
    __pjModules[id].call(module.exports, module, module.exports, __pjRequire);
    return module.exports;
  }
  __pjRequire(0);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModuleKind {
    Script,
    Json,
    Css,
}

impl ModuleKind {
    fn of(key: &ModuleKey) -> Self {
        let path = key.as_str();
        let path = path.split(['?', '#']).next().unwrap_or(path);
        if path.ends_with(".json") {
            ModuleKind::Json
        } else if path.ends_with(".css") {
            ModuleKind::Css
        } else {
            ModuleKind::Script
        }
    }
}

/// Bundles a virtual project into one script
#[derive(Debug, Clone)]
pub struct Bundler<F = CdnFetcher> {
    fetcher: F,
    cdn_base: String,
}

impl Bundler<CdnFetcher> {
    pub fn new(config: &BundlerConfig) -> Self {
        Self::with_fetcher(CdnFetcher::new(), config.cdn_base.clone())
    }
}

impl<F: ModuleFetcher> Bundler<F> {
    pub fn with_fetcher(fetcher: F, cdn_base: impl Into<String>) -> Self {
        Self {
            fetcher,
            cdn_base: cdn_base.into(),
        }
    }

    /// Bundle `entry` and everything it imports
    pub async fn bundle(&self, files: &VirtualFileMap, entry: &str) -> Result<String, BundleError> {
        self.bundle_with_suffix(files, entry, "").await
    }

    /// Bundle `entry`, appending `suffix` inside the entry module's scope so it
    /// can reference the entry's top-level declarations
    #[instrument(skip(self, files, suffix))]
    pub async fn bundle_with_suffix(
        &self,
        files: &VirtualFileMap,
        entry: &str,
        suffix: &str,
    ) -> Result<String, BundleError> {
        let index = FileIndex::new(files);
        let entry_path = index
            .find(entry)
            .ok_or_else(|| BundleError::EntryNotFound(entry.to_owned()))?;

        let mut keys = vec![ModuleKey::Local(entry_path.clone())];
        let mut ids: HashMap<ModuleKey, usize> = HashMap::from([(keys[0].clone(), 0)]);
        let mut queue = VecDeque::from([0usize]);
        let mut bodies: Vec<String> = Vec::new();

        while let Some(id) = queue.pop_front() {
            let key = keys[id].clone();
            let source = match &key {
                ModuleKey::Local(path) => index
                    .source(path)
                    .map(str::to_owned)
                    .ok_or_else(|| BundleError::EntryNotFound(path.clone()))?,
                ModuleKey::Remote(url) => self.fetcher.fetch(url).await?,
            };

            let body = match ModuleKind::of(&key) {
                ModuleKind::Json => transform::json_body(&source),
                ModuleKind::Css => transform::css_body(&source),
                ModuleKind::Script => {
                    let mut specifier_ids = SpecifierMap::new();
                    for specifier in transform::specifiers(&source) {
                        let resolved = resolve(&index, &self.cdn_base, &key, &specifier)
                            .ok_or_else(|| BundleError::Unresolved {
                                specifier: specifier.clone(),
                                importer: key.as_str().to_owned(),
                            })?;
                        let next = *ids.entry(resolved.clone()).or_insert_with(|| {
                            keys.push(resolved);
                            queue.push_back(keys.len() - 1);
                            keys.len() - 1
                        });
                        specifier_ids.insert(specifier, next);
                    }
                    transform::to_registry_body(&source, &specifier_ids)
                }
            };

            if bodies.len() <= id {
                bodies.resize(id + 1, String::new());
            }
            bodies[id] = body;
        }

        if !suffix.is_empty() {
            bodies[0].push('\n');
            bodies[0].push_str(suffix);
        }

        debug!(entry = %entry_path, modules = keys.len(), "bundle complete");
        Ok(assemble(&keys, &bodies))
    }
}

fn assemble(keys: &[ModuleKey], bodies: &[String]) -> String {
    let size: usize = bodies.iter().map(String::len).sum();
    let mut out = String::with_capacity(size + RUNTIME.len() + 64 * bodies.len());
    out.push_str("(function () {\n  const __pjModules = {\n");
    for (id, (key, body)) in keys.iter().zip(bodies).enumerate() {
        out.push_str(&format!(
            "    // {}\n    {id}: function (module, exports, require) {{\n{body}\n    }},\n",
            key.as_str()
        ));
    }
    out.push_str("  };\n");
    out.push_str(RUNTIME);
    out.push_str("})();\n");
    out
}
