//! Specifier resolution
//!
//! Local modules live in the in-memory file map; everything else is a URL on
//! the CDN.

use std::collections::BTreeMap;

use reqwest::Url;

/// Extensions tried, in order, when a local import omits one
pub const EXTENSION_FALLBACKS: &[&str] = &["js", "mjs", "ts", "tsx", "jsx"];

/// Identity of a module within one bundling pass
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleKey {
    /// Normalized path in the file map
    Local(String),
    /// Absolute URL
    Remote(String),
}

impl ModuleKey {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleKey::Local(path) => path,
            ModuleKey::Remote(url) => url,
        }
    }
}

/// Normalize a file map path: strip leading `/` and `./`, collapse `.` and `..`
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Directory portion of a normalized path (`""` at the root)
fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}

fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier == "." || specifier == ".."
}

fn is_url(specifier: &str) -> bool {
    specifier.starts_with("http://") || specifier.starts_with("https://")
}

/// Normalized view of a file map
pub struct FileIndex<'a> {
    files: BTreeMap<String, &'a str>,
}

impl<'a> FileIndex<'a> {
    pub fn new(files: &'a BTreeMap<String, String>) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, source)| (normalize_path(path), source.as_str()))
                .collect(),
        }
    }

    pub fn source(&self, path: &str) -> Option<&'a str> {
        self.files.get(path).copied()
    }

    /// Find a file: the literal path, then extension fallbacks, then
    /// `index` with each fallback
    pub fn find(&self, path: &str) -> Option<String> {
        let path = normalize_path(path);
        if self.files.contains_key(&path) {
            return Some(path);
        }
        let with_ext = EXTENSION_FALLBACKS
            .iter()
            .map(|ext| format!("{path}.{ext}"));
        let index = EXTENSION_FALLBACKS.iter().map(|ext| {
            if path.is_empty() {
                format!("index.{ext}")
            } else {
                format!("{path}/index.{ext}")
            }
        });
        with_ext
            .chain(index)
            .find(|candidate| self.files.contains_key(candidate))
    }
}

/// Resolve `specifier` as written in `importer`
///
/// Returns `None` when a local file cannot be found.
pub fn resolve(
    index: &FileIndex<'_>,
    cdn_base: &str,
    importer: &ModuleKey,
    specifier: &str,
) -> Option<ModuleKey> {
    let cdn = cdn_base.trim_end_matches('/');
    if is_url(specifier) {
        return Some(ModuleKey::Remote(specifier.to_owned()));
    }
    match importer {
        ModuleKey::Local(path) => {
            if is_relative(specifier) {
                let joined = format!("{}/{specifier}", parent_dir(path));
                index.find(&joined).map(ModuleKey::Local)
            } else if specifier.starts_with('/') {
                index.find(specifier).map(ModuleKey::Local)
            } else {
                Some(ModuleKey::Remote(bare_module_url(cdn, specifier)))
            }
        }
        ModuleKey::Remote(url) => {
            if specifier.starts_with('/') {
                Some(ModuleKey::Remote(format!("{cdn}{specifier}")))
            } else if is_relative(specifier) {
                Url::parse(url)
                    .and_then(|base| base.join(specifier))
                    .ok()
                    .map(|joined| ModuleKey::Remote(joined.to_string()))
            } else {
                Some(ModuleKey::Remote(bare_module_url(cdn, specifier)))
            }
        }
    }
}

/// CDN URL for a bare package import such as `lodash` or `react-dom/client`
pub fn bare_module_url(cdn: &str, specifier: &str) -> String {
    format!("{}/npm/{specifier}/+esm", cdn.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDN: &str = "https://cdn.example.net";

    fn files(paths: &[&str]) -> BTreeMap<String, String> {
        paths
            .iter()
            .map(|p| ((*p).to_owned(), String::new()))
            .collect()
    }

    fn local(path: &str) -> ModuleKey {
        ModuleKey::Local(path.to_owned())
    }

    #[test]
    fn normalize_strips_and_collapses() {
        assert_eq!(normalize_path("/src/./a.js"), "src/a.js");
        assert_eq!(normalize_path("./src/lib/../a.js"), "src/a.js");
        assert_eq!(normalize_path("../../a.js"), "a.js");
        assert_eq!(normalize_path("a//b.js"), "a/b.js");
    }

    #[test]
    fn literal_path_wins() {
        let map = files(&["src/util", "src/util.js"]);
        let index = FileIndex::new(&map);
        assert_eq!(index.find("src/util").as_deref(), Some("src/util"));
    }

    #[test]
    fn extension_fallback_order() {
        let map = files(&["lib/a.ts", "lib/a.mjs"]);
        let index = FileIndex::new(&map);
        assert_eq!(index.find("lib/a").as_deref(), Some("lib/a.mjs"));
    }

    #[test]
    fn directory_index_fallback() {
        let map = files(&["components/index.tsx"]);
        let index = FileIndex::new(&map);
        assert_eq!(index.find("components").as_deref(), Some("components/index.tsx"));
    }

    #[test]
    fn leading_slash_keys_are_normalized() {
        let map = files(&["/src/main.js", "./src/helper.js"]);
        let index = FileIndex::new(&map);
        let resolved = resolve(&index, CDN, &local("src/main.js"), "./helper");
        assert_eq!(resolved, Some(local("src/helper.js")));
    }

    #[test]
    fn relative_from_nested_importer() {
        let map = files(&["src/a/b.js", "src/c.js"]);
        let index = FileIndex::new(&map);
        assert_eq!(
            resolve(&index, CDN, &local("src/a/b.js"), "../c"),
            Some(local("src/c.js"))
        );
    }

    #[test]
    fn missing_relative_is_none() {
        let map = files(&["main.js"]);
        let index = FileIndex::new(&map);
        assert_eq!(resolve(&index, CDN, &local("main.js"), "./nope"), None);
    }

    #[test]
    fn bare_specifier_goes_to_cdn() {
        let map = files(&["main.js"]);
        let index = FileIndex::new(&map);
        assert_eq!(
            resolve(&index, "https://cdn.example.net/", &local("main.js"), "react-dom/client"),
            Some(ModuleKey::Remote(
                "https://cdn.example.net/npm/react-dom/client/+esm".to_owned()
            ))
        );
    }

    #[test]
    fn remote_importer_specifiers() {
        let map = files(&[]);
        let index = FileIndex::new(&map);
        let importer = ModuleKey::Remote(format!("{CDN}/npm/react@18.3.1/+esm"));
        assert_eq!(
            resolve(&index, CDN, &importer, "/npm/scheduler@0.23.2/+esm"),
            Some(ModuleKey::Remote(format!("{CDN}/npm/scheduler@0.23.2/+esm")))
        );
        assert_eq!(
            resolve(&index, CDN, &importer, "https://other.example/x.js"),
            Some(ModuleKey::Remote("https://other.example/x.js".to_owned()))
        );
        assert_eq!(
            resolve(&index, CDN, &importer, "./chunk.js"),
            Some(ModuleKey::Remote(format!("{CDN}/npm/react@18.3.1/chunk.js")))
        );
        assert_eq!(
            resolve(&index, CDN, &importer, "tslib"),
            Some(ModuleKey::Remote(format!("{CDN}/npm/tslib/+esm")))
        );
    }
}
