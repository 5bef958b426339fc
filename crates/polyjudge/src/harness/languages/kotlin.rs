use serde_json::Value;

use crate::harness::{
    HarnessGenerator, declares_type, prepare_cases, rename_entry_point, string_literal,
};
use crate::literal::{Shape, canonical_json, escape_with_extra, fits_i32, float_text, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Kotlin/JVM driver
pub struct Kotlin;

const HELPERS: &str = r#"
fun __pjQuote(s: String): String {
    val sb = StringBuilder("\"")
    for (c in s) {
        when {
            c == '"' -> sb.append("\\\"")
            c == '\\' -> sb.append("\\\\")
            c == '\n' -> sb.append("\\n")
            c == '\r' -> sb.append("\\r")
            c == '\t' -> sb.append("\\t")
            c.code < 0x20 -> sb.append(String.format("\\u%04x", c.code))
            else -> sb.append(c)
        }
    }
    return sb.append('"').toString()
}

fun __pjNumber(d: Double): String =
    if (!d.isNaN() && !d.isInfinite() && d == Math.rint(d) && Math.abs(d) < 9.007199254740992E15) d.toLong().toString()
    else if (d.isNaN() || d.isInfinite()) "null"
    else d.toString()

fun __pjJson(v: Any?): String = when (v) {
    null -> "null"
    is String -> __pjQuote(v)
    is Char -> __pjQuote(v.toString())
    is Boolean -> v.toString()
    is Double -> __pjNumber(v)
    is Float -> __pjNumber(v.toDouble())
    is Number -> v.toString()
    is IntArray -> v.joinToString(",", "[", "]")
    is LongArray -> v.joinToString(",", "[", "]")
    is DoubleArray -> v.joinToString(",", "[", "]") { __pjNumber(it) }
    is BooleanArray -> v.joinToString(",", "[", "]")
    is CharArray -> v.joinToString(",", "[", "]") { __pjQuote(it.toString()) }
    is Array<*> -> v.joinToString(",", "[", "]") { __pjJson(it) }
    is Map<*, *> -> v.entries.sortedBy { it.key.toString() }
        .joinToString(",", "{", "}") { __pjQuote(it.key.toString()) + ":" + __pjJson(it.value) }
    is Iterable<*> -> v.joinToString(",", "[", "]") { __pjJson(it) }
    is Pair<*, *> -> "[" + __pjJson(v.first) + "," + __pjJson(v.second) + "]"
    is Unit -> "null"
    else -> __pjQuote(v.toString())
}

fun __pjRecord(results: MutableList<String>, name: String, passed: Boolean, actual: String, expected: String) {
    results.add("{\"name\":" + name + ",\"passed\":" + passed + ",\"actual\":" + actual + ",\"expected\":" + expected + "}")
}
"#;

impl Kotlin {
    fn needs_wide(value: &Value) -> bool {
        match value {
            Value::Number(n) => integer_text(n).is_some() && !fits_i32(n),
            Value::Array(items) => items.iter().any(Self::needs_wide),
            _ => false,
        }
    }

    fn array_type(shape: &Shape, wide: bool) -> String {
        match shape {
            Shape::Int if wide => "LongArray".to_owned(),
            Shape::Int => "IntArray".to_owned(),
            Shape::Float => "DoubleArray".to_owned(),
            Shape::Bool => "BooleanArray".to_owned(),
            Shape::Str => "Array<String>".to_owned(),
            Shape::Array(inner) => format!("Array<{}>", Self::array_type(inner, wide)),
            Shape::Null | Shape::Mixed => "List<Any?>".to_owned(),
        }
    }

    fn literal(&self, value: &Value, shape: &Shape, wide: bool) -> String {
        match value {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => float_text(n),
                (_, Some(text)) if wide || !fits_i32(n) => format!("{text}L"),
                (_, Some(text)) => text,
            },
            Value::String(s) => format!("\"{}\"", escape_with_extra(s, '"', &['$'])),
            Value::Array(items) => {
                let own = Shape::hinted(value, shape);
                let element = own.element().cloned().unwrap_or(Shape::Int);
                let wide = wide || Self::needs_wide(value);
                let body = |shape: &Shape, wide: bool| -> String {
                    items
                        .iter()
                        .map(|v| self.literal(v, shape, wide))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                match &element {
                    Shape::Int if wide => format!("longArrayOf({})", body(&element, true)),
                    Shape::Int => format!("intArrayOf({})", body(&element, false)),
                    Shape::Float => format!("doubleArrayOf({})", body(&element, false)),
                    Shape::Bool => format!("booleanArrayOf({})", body(&element, false)),
                    Shape::Str => format!("arrayOf<String>({})", body(&element, false)),
                    Shape::Array(row) => format!(
                        "arrayOf<{}>({})",
                        Self::array_type(row, wide),
                        body(&element, wide)
                    ),
                    Shape::Null | Shape::Mixed => {
                        let items: Vec<String> = items
                            .iter()
                            .map(|v| self.literal(v, &Shape::of(v), false))
                            .collect();
                        format!("listOf<Any?>({})", items.join(", "))
                    }
                }
            }
            Value::Object(_) => format!(
                "\"{}\"",
                escape_with_extra(&canonical_json(value), '"', &['$'])
            ),
        }
    }
}

impl HarnessGenerator for Kotlin {
    fn id(&self) -> &'static str {
        "kotlin"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value), false)
    }

    fn function_pattern(&self) -> &'static str {
        r"\bfun\s+(?:<[^>]*>\s*)?(?:[\w.]+\.)?([A-Za-z_]\w*)\s*\("
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let body = rename_entry_point(source, r"(\bfun\s+)main(\s*\()", "__pjUserMain");
        let callee = if declares_type(source, "Solution") {
            format!("Solution().{function_name}")
        } else {
            function_name.to_owned()
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str(&body);
        out.push('\n');
        out.push_str(HELPERS);
        out.push_str("\nfun main() {\n    val results = mutableListOf<String>()\n");
        for case in prepare_cases(self, cases) {
            out.push_str(&format!(
                r#"    run {{
        val name = {name}
        val expected = {expected}
        try {{
            val actual = __pjJson({callee}({args}))
            __pjRecord(results, name, actual == expected, actual, expected)
        }} catch (e: Throwable) {{
            __pjRecord(results, name, false, __pjQuote(e.toString()), expected)
        }}
    }}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "    println()\n    println({start})\n    println(\"[\" + results.joinToString(\",\") + \"]\")\n    println({end})\n}}\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
