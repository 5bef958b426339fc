//! ES module syntax to registry form
//!
//! Rewrites `import`/`export` statements and `require("...")` calls so a
//! module body can run as `function (module, exports, require)`. Specifiers
//! are replaced by the numeric ids the bundler assigned. Exports are installed
//! as getters at the top of the module so bindings stay live.
//!
//! This is pattern based, not a parser: statements inside string literals or
//! comments are rewritten too, and `export const a = 1, b = 2` only exports
//! `a`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Resolved module id for each specifier in a module
pub type SpecifierMap = HashMap<String, usize>;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect("module syntax pattern should compile"));
    };
}

pattern!(FROM_SPECIFIER, r#"\bfrom\s*["']([^"'\n]+)["']"#);
pattern!(BARE_IMPORT, r#"\bimport\s*["']([^"'\n]+)["']\s*;?"#);
pattern!(REQUIRE_CALL, r#"\brequire\s*\(\s*["']([^"'\n]+)["']\s*\)"#);

pattern!(IMPORT_TYPE, r#"\bimport\s+type\s+[^;]*?\bfrom\s*["'][^"'\n]+["']\s*;?"#);
pattern!(IMPORT_FROM, r#"\bimport\s*([\w$*{}\s,]+?)\s*from\s*["']([^"'\n]+)["']\s*;?"#);
pattern!(EXPORT_STAR_AS, r#"\bexport\s*\*\s*as\s+([A-Za-z_$][\w$]*)\s*from\s*["']([^"'\n]+)["']\s*;?"#);
pattern!(EXPORT_STAR, r#"\bexport\s*\*\s*from\s*["']([^"'\n]+)["']\s*;?"#);
pattern!(EXPORT_LIST_FROM, r#"\bexport\s*\{([^}]*)\}\s*from\s*["']([^"'\n]+)["']\s*;?"#);
pattern!(EXPORT_LIST, r"\bexport\s*\{([^}]*)\}\s*;?");
pattern!(EXPORT_TYPE, r"\bexport\s+(type|interface|declare)\b");
pattern!(
    EXPORT_DEFAULT_NAMED,
    r"\bexport\s+default\s+((?:async\s+)?function\s*\*?\s*|class\s+)([A-Za-z_$][\w$]*)"
);
pattern!(EXPORT_DEFAULT, r"\bexport\s+default\s+");
pattern!(
    EXPORT_DECL,
    r"\bexport\s+((?:async\s+)?function\s*\*?\s*|class\s+|(?:const|let|var)\s+|enum\s+)([A-Za-z_$][\w$]*)"
);

/// Name bound for an anonymous default export
const DEFAULT_BINDING: &str = "__pj_default";

/// Every module specifier the source refers to, without duplicates
pub fn specifiers(source: &str) -> Vec<String> {
    let stripped = IMPORT_TYPE.replace_all(source, "");
    let mut seen = Vec::new();
    for re in [&*FROM_SPECIFIER, &*BARE_IMPORT, &*REQUIRE_CALL] {
        for caps in re.captures_iter(&stripped) {
            let spec = caps[1].to_owned();
            if !seen.contains(&spec) {
                seen.push(spec);
            }
        }
    }
    seen
}

/// One `local as exported` pair from an import or export list
fn parse_list(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter(|item| !item.starts_with("type "))
        .filter_map(|item| {
            let mut parts = item.split_whitespace();
            let local = parts.next()?.to_owned();
            match (parts.next(), parts.next()) {
                (Some("as"), Some(alias)) => Some((local, alias.to_owned())),
                _ => Some((local.clone(), local)),
            }
        })
        .collect()
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_owned()).to_string()
}

/// Module transformer for one body
struct Rewriter<'a> {
    ids: &'a SpecifierMap,
    /// exported name -> getter expression
    exports: Vec<(String, String)>,
    star_sources: Vec<usize>,
    temp: usize,
}

impl<'a> Rewriter<'a> {
    fn id(&self, spec: &str) -> String {
        match self.ids.get(spec) {
            Some(id) => id.to_string(),
            // The bundler resolves every specifier first; keep the text if not
            None => js_string(spec),
        }
    }

    fn temp(&mut self) -> String {
        self.temp += 1;
        format!("__pj_m{}", self.temp)
    }

    fn export(&mut self, exported: &str, expr: impl Into<String>) {
        self.exports.push((exported.to_owned(), expr.into()));
    }

    fn import_clause(&mut self, clause: &str, id: &str) -> String {
        let clause = clause.trim();
        let module = self.temp();
        let mut out = format!("const {module} = require({id});");

        let (head, named) = match clause.find('{') {
            Some(open) => {
                let close = clause.rfind('}').unwrap_or(clause.len());
                (&clause[..open], Some(&clause[open + 1..close]))
            }
            None => (clause, None),
        };
        for part in head.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(ns) = part.strip_prefix('*') {
                let ns = ns.trim().trim_start_matches("as").trim();
                out.push_str(&format!(" const {ns} = {module};"));
            } else {
                out.push_str(&format!(" const {part} = __pjDefault({module});"));
            }
        }
        if let Some(named) = named {
            let bindings: Vec<String> = parse_list(named)
                .into_iter()
                .map(|(imported, local)| {
                    if imported == local {
                        local
                    } else {
                        format!("{imported}: {local}")
                    }
                })
                .collect();
            if !bindings.is_empty() {
                out.push_str(&format!(" const {{ {} }} = {module};", bindings.join(", ")));
            }
        }
        out
    }

    fn rewrite(&mut self, source: &str) -> String {
        let code = IMPORT_TYPE.replace_all(source, "").into_owned();

        let code = EXPORT_STAR_AS
            .replace_all(&code, |c: &Captures| {
                let id = self.id(&c[2]);
                self.export(&c[1], format!("require({id})"));
                String::new()
            })
            .into_owned();

        let code = EXPORT_STAR
            .replace_all(&code, |c: &Captures| {
                let id = self.id(&c[1]);
                if let Ok(n) = id.parse() {
                    self.star_sources.push(n);
                }
                String::new()
            })
            .into_owned();

        let code = EXPORT_LIST_FROM
            .replace_all(&code, |c: &Captures| {
                let id = self.id(&c[2]);
                let module = self.temp();
                for (local, exported) in parse_list(&c[1]) {
                    self.export(&exported, format!("{module}.{local}"));
                }
                format!("const {module} = require({id});")
            })
            .into_owned();

        let code = EXPORT_LIST
            .replace_all(&code, |c: &Captures| {
                for (local, exported) in parse_list(&c[1]) {
                    self.export(&exported, local);
                }
                String::new()
            })
            .into_owned();

        let code = EXPORT_TYPE.replace_all(&code, "$1").into_owned();

        let code = EXPORT_DEFAULT_NAMED
            .replace_all(&code, |c: &Captures| {
                // `export default class extends Base` has no name
                if &c[2] == "extends" {
                    self.export("default", DEFAULT_BINDING);
                    return format!("const {DEFAULT_BINDING} = {}{}", &c[1], &c[2]);
                }
                self.export("default", &c[2]);
                format!("{}{}", &c[1], &c[2])
            })
            .into_owned();

        let code = EXPORT_DEFAULT
            .replace_all(&code, |_: &Captures| {
                self.export("default", DEFAULT_BINDING);
                format!("const {DEFAULT_BINDING} = ")
            })
            .into_owned();

        let code = EXPORT_DECL
            .replace_all(&code, |c: &Captures| {
                self.export(&c[2], &c[2]);
                format!("{}{}", &c[1], &c[2])
            })
            .into_owned();

        let code = IMPORT_FROM
            .replace_all(&code, |c: &Captures| {
                let id = self.id(&c[2]);
                self.import_clause(&c[1], &id)
            })
            .into_owned();

        let code = BARE_IMPORT
            .replace_all(&code, |c: &Captures| format!("require({});", self.id(&c[1])))
            .into_owned();

        REQUIRE_CALL
            .replace_all(&code, |c: &Captures| format!("require({})", self.id(&c[1])))
            .into_owned()
    }

    fn header(&self) -> String {
        let mut out = String::new();
        if !self.exports.is_empty() {
            let getters: Vec<String> = self
                .exports
                .iter()
                .map(|(name, expr)| format!("{}: () => {expr}", js_string(name)))
                .collect();
            out.push_str(&format!("__pjExport(exports, {{ {} }});\n", getters.join(", ")));
        }
        for id in &self.star_sources {
            out.push_str(&format!("__pjExportStar(exports, require({id}));\n"));
        }
        out
    }
}

/// Rewrite an ES module or CommonJS body into registry form
pub fn to_registry_body(source: &str, ids: &SpecifierMap) -> String {
    let mut rewriter = Rewriter {
        ids,
        exports: Vec::new(),
        star_sources: Vec::new(),
        temp: 0,
    };
    let body = rewriter.rewrite(source);
    format!("{}{}", rewriter.header(), body)
}

/// Body for a `.json` module
pub fn json_body(source: &str) -> String {
    format!("module.exports = {};", source.trim())
}

/// Body for a `.css` module: inject a style element when a DOM exists
pub fn css_body(source: &str) -> String {
    format!(
        "if (typeof document !== \"undefined\") {{\n  const style = document.createElement(\"style\");\n  style.textContent = {};\n  document.head.appendChild(style);\n}}\nmodule.exports = {{}};",
        js_string(source)
    )
}
