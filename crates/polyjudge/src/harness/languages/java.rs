use regex::Regex;
use serde_json::Value;

use crate::harness::{HarnessGenerator, first_class_name, prepare_cases, string_literal};
use crate::literal::{Shape, canonical_json, fits_i32, float_text, integer_text, quoted};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Java driver for single-file source launch
///
/// The launcher runs the first top-level class, so the driver class is
/// emitted before the user's classes with every `import` hoisted above it.
pub struct Java;

const DRIVER_CLASS: &str = "PjHarnessMain";

const HELPERS: &str = r#"
    static String pjQuote(String s) {
        StringBuilder sb = new StringBuilder("\"");
        for (int i = 0; i < s.length(); i++) {
            char c = s.charAt(i);
            switch (c) {
                case '"': sb.append("\\\""); break;
                case '\\': sb.append("\\\\"); break;
                case '\n': sb.append("\\n"); break;
                case '\r': sb.append("\\r"); break;
                case '\t': sb.append("\\t"); break;
                default:
                    if (c < 0x20) {
                        sb.append(String.format("\\u%04x", (int) c));
                    } else {
                        sb.append(c);
                    }
            }
        }
        return sb.append('"').toString();
    }

    static String pjNumber(double d) {
        if (!Double.isNaN(d) && !Double.isInfinite(d) && d == Math.rint(d) && Math.abs(d) < 9.007199254740992E15) {
            return Long.toString((long) d);
        }
        if (Double.isNaN(d) || Double.isInfinite(d)) {
            return "null";
        }
        return Double.toString(d);
    }

    static String pjJson(Object v) {
        if (v == null) return "null";
        if (v instanceof String) return pjQuote((String) v);
        if (v instanceof Character) return pjQuote(String.valueOf(v));
        if (v instanceof Boolean) return v.toString();
        if (v instanceof Double || v instanceof Float) return pjNumber(((Number) v).doubleValue());
        if (v instanceof Number) return v.toString();
        if (v.getClass().isArray()) {
            StringBuilder sb = new StringBuilder("[");
            int n = java.lang.reflect.Array.getLength(v);
            for (int i = 0; i < n; i++) {
                if (i > 0) sb.append(',');
                sb.append(pjJson(java.lang.reflect.Array.get(v, i)));
            }
            return sb.append(']').toString();
        }
        if (v instanceof java.util.Map) {
            java.util.TreeMap<String, Object> sorted = new java.util.TreeMap<>();
            for (java.util.Map.Entry<?, ?> e : ((java.util.Map<?, ?>) v).entrySet()) {
                sorted.put(String.valueOf(e.getKey()), e.getValue());
            }
            StringBuilder sb = new StringBuilder("{");
            boolean first = true;
            for (java.util.Map.Entry<String, Object> e : sorted.entrySet()) {
                if (!first) sb.append(',');
                first = false;
                sb.append(pjQuote(e.getKey())).append(':').append(pjJson(e.getValue()));
            }
            return sb.append('}').toString();
        }
        if (v instanceof Iterable) {
            StringBuilder sb = new StringBuilder("[");
            boolean first = true;
            for (Object item : (Iterable<?>) v) {
                if (!first) sb.append(',');
                first = false;
                sb.append(pjJson(item));
            }
            return sb.append(']').toString();
        }
        return pjQuote(v.toString());
    }

    static void pjRecord(java.util.List<String> results, String name, boolean passed, String actual, String expected) {
        results.add("{\"name\":" + name + ",\"passed\":" + passed + ",\"actual\":" + actual + ",\"expected\":" + expected + "}");
    }
"#;

impl Java {
    fn type_name(shape: &Shape, wide: bool) -> String {
        match shape {
            Shape::Int if wide => "long".to_owned(),
            Shape::Int => "int".to_owned(),
            Shape::Float => "double".to_owned(),
            Shape::Bool => "boolean".to_owned(),
            Shape::Str => "String".to_owned(),
            Shape::Null | Shape::Mixed => "Object".to_owned(),
            Shape::Array(inner) => format!("{}[]", Self::type_name(inner, wide)),
        }
    }

    fn needs_wide(value: &Value) -> bool {
        match value {
            Value::Number(n) => integer_text(n).is_some() && !fits_i32(n),
            Value::Array(items) => items.iter().any(Self::needs_wide),
            _ => false,
        }
    }

    /// `elide` drops `new T[]` inside a typed array initializer
    fn literal(&self, value: &Value, shape: &Shape, wide: bool, elide: bool) -> String {
        match value {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => format!("{}d", float_text(n)),
                (_, Some(text)) if wide || !fits_i32(n) => format!("{text}L"),
                (_, Some(text)) => text,
            },
            Value::String(s) => quoted(s),
            Value::Array(items) => {
                let own = Shape::hinted(value, shape);
                let (array_shape, element) = match own.element() {
                    Some(element) => (own.clone(), element.clone()),
                    None => (own.clone(), Shape::Int),
                };
                let typed = !matches!(element, Shape::Mixed | Shape::Null);
                let wide = wide || Self::needs_wide(value);
                let body: Vec<String> = items
                    .iter()
                    .map(|v| {
                        if typed {
                            self.literal(v, &element, wide, true)
                        } else {
                            self.literal(v, &Shape::of(v), false, false)
                        }
                    })
                    .collect();
                if elide && typed {
                    format!("{{{}}}", body.join(", "))
                } else {
                    format!("new {}{{{}}}", Self::type_name(&array_shape, wide), body.join(", "))
                }
            }
            Value::Object(_) => quoted(&canonical_json(value)),
        }
    }

    /// Split the source into hoisted imports and the rest, dropping `package`
    fn split_imports(source: &str) -> (Vec<&str>, String) {
        let mut imports = Vec::new();
        let mut rest = Vec::new();
        for line in source.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("import ") {
                imports.push(line.trim());
            } else if !trimmed.starts_with("package ") {
                rest.push(line);
            }
        }
        (imports, rest.join("\n"))
    }

    fn is_static(source: &str, function_name: &str) -> bool {
        Regex::new(&format!(
            r"\bstatic\b[^;{{}}=()]*\b{}\s*\(",
            regex::escape(function_name)
        ))
        .map(|re| re.is_match(source))
        .unwrap_or(false)
    }
}

impl HarnessGenerator for Java {
    fn id(&self) -> &'static str {
        "java"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value), false, false)
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*(?:[\w<>\[\],.?]+[ \t]+)+([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:throws\s+[\w.,\s]+)?\{"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let (imports, rest) = Self::split_imports(source);
        let class_name = first_class_name(&rest).unwrap_or_else(|| "Solution".to_owned());
        let callee = if Self::is_static(&rest, function_name) {
            format!("{class_name}.{function_name}")
        } else {
            format!("new {class_name}().{function_name}")
        };

        let mut out = String::with_capacity(source.len() + 4096);
        for import in imports {
            out.push_str(import);
            out.push('\n');
        }
        out.push_str(&format!("\nclass {DRIVER_CLASS} {{\n"));
        out.push_str(HELPERS);
        out.push_str("\n    public static void main(String[] args) {\n        java.util.List<String> results = new java.util.ArrayList<>();\n");
        for case in prepare_cases(self, cases) {
            out.push_str(&format!(
                r#"        {{
            String name = {name};
            String expected = {expected};
            try {{
                String actual = pjJson({callee}({args}));
                pjRecord(results, name, actual.equals(expected), actual, expected);
            }} catch (Throwable e) {{
                pjRecord(results, name, false, pjQuote(String.valueOf(e)), expected);
            }}
        }}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "        System.out.println();\n        System.out.println({start});\n        System.out.println(\"[\" + String.join(\",\", results) + \"]\");\n        System.out.println({end});\n        System.out.flush();\n    }}\n}}\n\n",
            start = quoted(RESULTS_START_MARKER),
            end = quoted(RESULTS_END_MARKER),
        ));
        out.push_str(&rest);
        out.push('\n');
        out
    }
}
