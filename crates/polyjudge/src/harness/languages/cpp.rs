use serde_json::Value;

use crate::harness::{
    HarnessGenerator, declares_type, prepare_cases, rename_entry_point, string_literal,
};
use crate::literal::{Shape, canonical_json, fits_i32, float_text, integer_text, quoted};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// C++17 driver
///
/// Arguments are bound to named locals first so functions taking non-const
/// references (`std::vector<int>& nums`) accept them.
pub struct Cpp;

const INCLUDES: &str = "#include <cmath>
#include <cstdio>
#include <exception>
#include <iomanip>
#include <iostream>
#include <map>
#include <sstream>
#include <string>
#include <type_traits>
#include <vector>
";

const HELPERS: &str = r#"
static std::string __pj_json(const std::string& s) {
    std::ostringstream out;
    out << '"';
    for (unsigned char c : s) {
        switch (c) {
            case '"': out << "\\\""; break;
            case '\\': out << "\\\\"; break;
            case '\n': out << "\\n"; break;
            case '\r': out << "\\r"; break;
            case '\t': out << "\\t"; break;
            default:
                if (c < 0x20) {
                    out << "\\u" << std::hex << std::setw(4) << std::setfill('0') << static_cast<int>(c) << std::dec;
                } else {
                    out << c;
                }
        }
    }
    out << '"';
    return out.str();
}

static std::string __pj_json(const char* s) { return __pj_json(std::string(s)); }
static std::string __pj_json(bool b) { return b ? "true" : "false"; }
static std::string __pj_json(char c) { return __pj_json(std::string(1, c)); }

static std::string __pj_json(double d) {
    if (std::isfinite(d) && d == std::floor(d) && std::fabs(d) < 9007199254740992.0) {
        return std::to_string(static_cast<long long>(d));
    }
    if (!std::isfinite(d)) return "null";
    std::ostringstream out;
    for (int precision = 1; precision <= 17; ++precision) {
        out.str("");
        out << std::setprecision(precision) << d;
        if (std::stod(out.str()) == d) break;
    }
    return out.str();
}

template <typename T>
typename std::enable_if<std::is_integral<T>::value, std::string>::type __pj_json(T v) {
    return std::to_string(v);
}

template <typename T>
std::string __pj_json(const std::vector<T>& v) {
    std::string out = "[";
    bool first = true;
    for (const auto& item : v) {
        if (!first) out += ",";
        first = false;
        out += __pj_json(item);
    }
    return out + "]";
}

template <typename V>
std::string __pj_json(const std::map<std::string, V>& m) {
    std::string out = "{";
    bool first = true;
    for (const auto& entry : m) {
        if (!first) out += ",";
        first = false;
        out += __pj_json(entry.first) + ":" + __pj_json(entry.second);
    }
    return out + "}";
}

static void __pj_record(std::vector<std::string>& results, const std::string& name, bool passed,
                        const std::string& actual, const std::string& expected) {
    results.push_back("{\"name\":" + name + ",\"passed\":" + (passed ? "true" : "false") +
                      ",\"actual\":" + actual + ",\"expected\":" + expected + "}");
}
"#;

impl Cpp {
    fn type_name(shape: &Shape, wide: bool) -> String {
        match shape {
            Shape::Int if wide => "long long".to_owned(),
            Shape::Int => "int".to_owned(),
            Shape::Float => "double".to_owned(),
            Shape::Bool => "bool".to_owned(),
            Shape::Str | Shape::Null | Shape::Mixed => "std::string".to_owned(),
            Shape::Array(inner) => format!("std::vector<{}>", Self::type_name(inner, wide)),
        }
    }

    fn needs_wide(value: &Value) -> bool {
        match value {
            Value::Number(n) => integer_text(n).is_some() && !fits_i32(n),
            Value::Array(items) => items.iter().any(Self::needs_wide),
            _ => false,
        }
    }

    /// Braced element list for a vector, or a scalar literal
    fn body(&self, value: &Value, shape: &Shape) -> String {
        match value {
            Value::Null => "nullptr".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => float_text(n),
                (_, Some(text)) if fits_i32(n) => text,
                (_, Some(text)) => format!("{text}LL"),
            },
            Value::String(s) => format!("std::string({})", quoted(s)),
            Value::Array(items) => match shape.element() {
                Some(Shape::Mixed) | Some(Shape::Null) | None => {
                    let items: Vec<String> = items
                        .iter()
                        .map(|v| format!("std::string({})", quoted(&canonical_json(v))))
                        .collect();
                    format!("{{{}}}", items.join(", "))
                }
                Some(element) => {
                    let items: Vec<String> = items.iter().map(|v| self.body(v, element)).collect();
                    format!("{{{}}}", items.join(", "))
                }
            },
            Value::Object(_) => format!("std::string({})", quoted(&canonical_json(value))),
        }
    }
}

impl HarnessGenerator for Cpp {
    fn id(&self) -> &'static str {
        "cpp"
    }

    fn encode_literal(&self, value: &Value) -> String {
        let shape = Shape::of(value);
        match value {
            Value::Array(_) => {
                let declared = match shape.element() {
                    Some(Shape::Mixed) | Some(Shape::Null) => {
                        Shape::Array(Box::new(Shape::Str))
                    }
                    _ => shape.clone(),
                };
                format!(
                    "{}{}",
                    Self::type_name(&declared, Self::needs_wide(value)),
                    self.body(value, &shape)
                )
            }
            _ => self.body(value, &shape),
        }
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*(?:[\w:<>,\*&]+[ \t]+)+[\*&]*([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:const\s*)?(?:noexcept\s*)?\{"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let body = rename_entry_point(source, r"(\bint\s+)main(\s*\()", "__pj_user_main");
        let callee = if declares_type(source, "Solution") {
            format!("Solution().{function_name}")
        } else {
            function_name.to_owned()
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str(INCLUDES);
        out.push('\n');
        out.push_str(&body);
        out.push('\n');
        out.push_str(HELPERS);
        out.push_str("\nint main() {\n    std::vector<std::string> __pj_results;\n");
        for case in prepare_cases(self, cases) {
            let mut bindings = String::new();
            let mut names = Vec::with_capacity(case.args.len());
            for (i, arg) in case.args.iter().enumerate() {
                bindings.push_str(&format!("        auto __pj_a{i} = {arg};\n"));
                names.push(format!("__pj_a{i}"));
            }
            out.push_str(&format!(
                r#"    {{
        const std::string __pj_name = {name};
        const std::string __pj_expected = {expected};
        try {{
{bindings}            std::string __pj_actual = __pj_json({callee}({args}));
            __pj_record(__pj_results, __pj_name, __pj_actual == __pj_expected, __pj_actual, __pj_expected);
        }} catch (const std::exception& e) {{
            __pj_record(__pj_results, __pj_name, false, __pj_json(std::string(e.what())), __pj_expected);
        }} catch (...) {{
            __pj_record(__pj_results, __pj_name, false, __pj_json(std::string("unknown exception")), __pj_expected);
        }}
    }}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = names.join(", "),
            ));
        }
        out.push_str(&format!(
            "    std::cout << std::endl << {start} << std::endl;\n    std::cout << \"[\";\n    for (size_t i = 0; i < __pj_results.size(); ++i) {{\n        if (i > 0) std::cout << \",\";\n        std::cout << __pj_results[i];\n    }}\n    std::cout << \"]\" << std::endl;\n    std::cout << {end} << std::endl;\n    return 0;\n}}\n",
            start = quoted(RESULTS_START_MARKER),
            end = quoted(RESULTS_END_MARKER),
        ));
        out
    }
}
