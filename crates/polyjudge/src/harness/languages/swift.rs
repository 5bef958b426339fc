use regex::Regex;
use serde_json::Value;

use crate::harness::{HarnessGenerator, declares_type, prepare_cases, string_literal};
use crate::literal::{Shape, canonical_json, escape_with, float_text, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Swift driver
///
/// Swift calls need argument labels, so the user's signature is parsed to
/// recover them. Traps cannot be caught; thrown errors are.
pub struct Swift;

const HELPERS: &str = r#"
func __pjQuote(_ s: String) -> String {
    var out = "\""
    for scalar in s.unicodeScalars {
        switch scalar {
        case "\"": out += "\\\""
        case "\\": out += "\\\\"
        case "\n": out += "\\n"
        case "\r": out += "\\r"
        case "\t": out += "\\t"
        default:
            if scalar.value < 0x20 {
                let hex = String(scalar.value, radix: 16)
                out += "\\u" + String(repeating: "0", count: 4 - hex.count) + hex
            } else {
                out.unicodeScalars.append(scalar)
            }
        }
    }
    return out + "\""
}

func __pjNumber(_ d: Double) -> String {
    if !d.isFinite { return "null" }
    if d == d.rounded() && abs(d) < 9007199254740992 { return String(Int64(d)) }
    return "\(d)"
}

func __pjJson(_ value: Any?) -> String {
    guard let value = value else { return "null" }
    let mirror = Mirror(reflecting: value)
    if mirror.displayStyle == .optional {
        if let child = mirror.children.first { return __pjJson(child.value) }
        return "null"
    }
    switch value {
    case let b as Bool: return b ? "true" : "false"
    case let i as Int: return String(i)
    case let i as Int64: return String(i)
    case let i as Int32: return String(i)
    case let i as UInt: return String(i)
    case let d as Double: return __pjNumber(d)
    case let f as Float: return __pjNumber(Double(f))
    case let s as String: return __pjQuote(s)
    case let c as Character: return __pjQuote(String(c))
    case let d as [String: Any]:
        return "{" + d.keys.sorted().map { __pjQuote($0) + ":" + __pjJson(d[$0]) }.joined(separator: ",") + "}"
    default:
        break
    }
    if mirror.displayStyle == .collection || mirror.displayStyle == .set || mirror.displayStyle == .tuple {
        return "[" + mirror.children.map { __pjJson($0.value) }.joined(separator: ",") + "]"
    }
    return __pjQuote(String(describing: value))
}

func __pjRecord(_ results: inout [String], _ name: String, _ passed: Bool, _ actual: String, _ expected: String) {
    results.append("{\"name\":" + name + ",\"passed\":" + (passed ? "true" : "false") + ",\"actual\":" + actual + ",\"expected\":" + expected + "}")
}
"#;

impl Swift {
    /// Argument labels of `function_name`; `None` means `_`
    fn argument_labels(source: &str, function_name: &str) -> Vec<Option<String>> {
        let pattern = format!(
            r"\bfunc\s+{}\s*(?:<[^>]*>)?\s*\(",
            regex::escape(function_name)
        );
        let Some(open) = Regex::new(&pattern)
            .ok()
            .and_then(|re| re.find(source))
            .map(|m| m.end())
        else {
            return Vec::new();
        };

        // Parameter list up to the matching close paren
        let mut depth = 1usize;
        let mut params = Vec::new();
        let mut current = String::new();
        let mut prev = ' ';
        for c in source[open..].chars() {
            let arrow = prev == '-' && c == '>';
            prev = c;
            match c {
                _ if arrow => current.push(c),
                '(' | '[' | '<' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' | '>' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    current.push(c);
                }
                ',' if depth == 1 => params.push(std::mem::take(&mut current)),
                c => current.push(c),
            }
        }
        if !current.trim().is_empty() {
            params.push(current);
        }

        params
            .iter()
            .filter_map(|param| param.split(':').next())
            .map(|names| {
                let words: Vec<&str> = names.split_whitespace().collect();
                match words.as_slice() {
                    ["_", ..] => None,
                    [label, ..] => Some((*label).to_owned()),
                    [] => None,
                }
            })
            .collect()
    }

    fn literal(&self, value: &Value, shape: &Shape) -> String {
        match value {
            Value::Null => "nil".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => float_text(n),
                (_, Some(text)) => text,
            },
            Value::String(s) => format!("\"{}\"", escape_with(s, '"')),
            Value::Array(items) => {
                let own = Shape::hinted(value, shape);
                match own.element() {
                    Some(Shape::Mixed) | Some(Shape::Null) => {
                        let body: Vec<String> =
                            items.iter().map(|v| self.literal(v, &Shape::of(v))).collect();
                        format!("[{}] as [Any]", body.join(", "))
                    }
                    Some(element) => {
                        let body: Vec<String> =
                            items.iter().map(|v| self.literal(v, element)).collect();
                        format!("[{}]", body.join(", "))
                    }
                    None => "[]".to_owned(),
                }
            }
            Value::Object(_) => format!("\"{}\"", escape_with(&canonical_json(value), '"')),
        }
    }
}

impl HarnessGenerator for Swift {
    fn id(&self) -> &'static str {
        "swift"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value))
    }

    fn function_pattern(&self) -> &'static str {
        r"\bfunc\s+([A-Za-z_]\w*)\s*[<(]"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let labels = Self::argument_labels(source, function_name);
        let callee = if declares_type(source, "Solution") {
            format!("Solution().{function_name}")
        } else {
            function_name.to_owned()
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str(source);
        out.push('\n');
        out.push_str(HELPERS);
        out.push_str("\nvar __pjResults: [String] = []\n");
        for case in prepare_cases(self, cases) {
            let args: Vec<String> = case
                .args
                .iter()
                .enumerate()
                .map(|(i, arg)| match labels.get(i) {
                    Some(Some(label)) => format!("{label}: {arg}"),
                    _ => arg.clone(),
                })
                .collect();
            out.push_str(&format!(
                r#"do {{
    let name = {name}
    let expected = {expected}
    do {{
        let actual = __pjJson(try {callee}({args}))
        __pjRecord(&__pjResults, name, actual == expected, actual, expected)
    }} catch {{
        __pjRecord(&__pjResults, name, false, __pjQuote("\(error)"), expected)
    }}
}}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = args.join(", "),
            ));
        }
        out.push_str(&format!(
            "print()\nprint({start})\nprint(\"[\" + __pjResults.joined(separator: \",\") + \"]\")\nprint({end})\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
