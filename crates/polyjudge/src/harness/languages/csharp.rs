use regex::Regex;
use serde_json::Value;

use crate::harness::{
    HarnessGenerator, first_class_name, prepare_cases, rename_entry_point, string_literal,
};
use crate::literal::{Shape, canonical_json, fits_i32, float_text, integer_text, quoted};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// C# driver (Mono)
///
/// Nested arrays are jagged (`int[][]`) because jagged initializers need an
/// explicit `new T[]` per row.
pub struct CSharp;

const HELPERS: &str = r#"
    static string PjQuote(string s) {
        var sb = new System.Text.StringBuilder("\"");
        foreach (char c in s) {
            switch (c) {
                case '"': sb.Append("\\\""); break;
                case '\\': sb.Append("\\\\"); break;
                case '\n': sb.Append("\\n"); break;
                case '\r': sb.Append("\\r"); break;
                case '\t': sb.Append("\\t"); break;
                default:
                    if (c < 0x20) sb.Append("\\u" + ((int) c).ToString("x4"));
                    else sb.Append(c);
                    break;
            }
        }
        return sb.Append('"').ToString();
    }

    static string PjNumber(double d) {
        if (double.IsNaN(d) || double.IsInfinity(d)) return "null";
        if (d == System.Math.Floor(d) && System.Math.Abs(d) < 9007199254740992d) {
            return ((long) d).ToString(System.Globalization.CultureInfo.InvariantCulture);
        }
        return d.ToString("R", System.Globalization.CultureInfo.InvariantCulture);
    }

    static string PjJson(object v) {
        if (v == null) return "null";
        if (v is string) return PjQuote((string) v);
        if (v is char) return PjQuote(v.ToString());
        if (v is bool) return (bool) v ? "true" : "false";
        if (v is double) return PjNumber((double) v);
        if (v is float) return PjNumber((float) v);
        if (v is decimal) return PjNumber((double) (decimal) v);
        if (v.GetType().IsPrimitive) {
            return System.Convert.ToString(v, System.Globalization.CultureInfo.InvariantCulture);
        }
        if (v is System.Collections.IDictionary) {
            var dict = (System.Collections.IDictionary) v;
            var keys = new System.Collections.Generic.List<string>();
            var values = new System.Collections.Generic.Dictionary<string, object>();
            foreach (System.Collections.DictionaryEntry e in dict) {
                string key = System.Convert.ToString(e.Key, System.Globalization.CultureInfo.InvariantCulture);
                keys.Add(key);
                values[key] = e.Value;
            }
            keys.Sort(System.StringComparer.Ordinal);
            var sb = new System.Text.StringBuilder("{");
            for (int i = 0; i < keys.Count; i++) {
                if (i > 0) sb.Append(',');
                sb.Append(PjQuote(keys[i])).Append(':').Append(PjJson(values[keys[i]]));
            }
            return sb.Append('}').ToString();
        }
        if (v is System.Collections.IEnumerable) {
            var sb = new System.Text.StringBuilder("[");
            bool first = true;
            foreach (object item in (System.Collections.IEnumerable) v) {
                if (!first) sb.Append(',');
                first = false;
                sb.Append(PjJson(item));
            }
            return sb.Append(']').ToString();
        }
        return PjQuote(v.ToString());
    }

    static void PjRecord(System.Collections.Generic.List<string> results, string name, bool passed, string actual, string expected) {
        results.Add("{\"name\":" + name + ",\"passed\":" + (passed ? "true" : "false") + ",\"actual\":" + actual + ",\"expected\":" + expected + "}");
    }
"#;

impl CSharp {
    fn type_name(shape: &Shape, wide: bool) -> String {
        match shape {
            Shape::Int if wide => "long".to_owned(),
            Shape::Int => "int".to_owned(),
            Shape::Float => "double".to_owned(),
            Shape::Bool => "bool".to_owned(),
            Shape::Str => "string".to_owned(),
            Shape::Null | Shape::Mixed => "object".to_owned(),
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

    fn literal(&self, value: &Value, shape: &Shape, wide: bool) -> String {
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
                let element = own.element().cloned().unwrap_or(Shape::Int);
                let wide = wide || Self::needs_wide(value);
                let body: Vec<String> = match element {
                    Shape::Mixed | Shape::Null => items
                        .iter()
                        .map(|v| self.literal(v, &Shape::of(v), false))
                        .collect(),
                    _ => items.iter().map(|v| self.literal(v, &element, wide)).collect(),
                };
                if body.is_empty() {
                    return format!("new {} {{ }}", Self::type_name(&own, wide));
                }
                format!("new {} {{ {} }}", Self::type_name(&own, wide), body.join(", "))
            }
            Value::Object(_) => quoted(&canonical_json(value)),
        }
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

impl HarnessGenerator for CSharp {
    fn id(&self) -> &'static str {
        "csharp"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value), false)
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*(?:[\w<>\[\],.?]+[ \t]+)+([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:\{|=>)"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let body = rename_entry_point(
            source,
            r"(\bstatic\s+(?:async\s+)?[\w<>]+\s+)Main(\s*\()",
            "PjUserMain",
        );
        let class_name = first_class_name(source).unwrap_or_else(|| "Solution".to_owned());
        let callee = if Self::is_static(source, function_name) {
            format!("{class_name}.{function_name}")
        } else {
            format!("new {class_name}().{function_name}")
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str(&body);
        out.push_str("\n\npublic static class PjHarnessMain {");
        out.push_str(HELPERS);
        out.push_str("\n    public static void Main(string[] args) {\n        var results = new System.Collections.Generic.List<string>();\n");
        for case in prepare_cases(self, cases) {
            out.push_str(&format!(
                r#"        {{
            string name = {name};
            string expected = {expected};
            try {{
                string actual = PjJson({callee}({args}));
                PjRecord(results, name, actual == expected, actual, expected);
            }} catch (System.Exception e) {{
                PjRecord(results, name, false, PjQuote(e.GetType().Name + ": " + e.Message), expected);
            }}
        }}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "        System.Console.WriteLine();\n        System.Console.WriteLine({start});\n        System.Console.WriteLine(\"[\" + string.Join(\",\", results) + \"]\");\n        System.Console.WriteLine({end});\n    }}\n}}\n",
            start = quoted(RESULTS_START_MARKER),
            end = quoted(RESULTS_END_MARKER),
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn jagged_matrix_literal() {
        assert_eq!(
            CSharp.encode_literal(&json!([[1, 2], [3, 4]])),
            "new int[][] { new int[] { 1, 2 }, new int[] { 3, 4 } }"
        );
    }

    #[test]
    fn ragged_number_matrix_shares_one_element_type() {
        assert_eq!(
            CSharp.encode_literal(&json!([[1, 2], [3.5]])),
            "new double[][] { new double[] { 1.0d, 2.0d }, new double[] { 3.5d } }"
        );
    }

    #[test]
    fn scalar_and_array_literals() {
        assert_eq!(CSharp.encode_literal(&json!(0.25)), "0.25d");
        assert_eq!(CSharp.encode_literal(&json!([2, 0.5])), "new double[] { 2.0d, 0.5d }");
        assert_eq!(
            CSharp.encode_literal(&json!(["say \"quoted\""])),
            r#"new string[] { "say \"quoted\"" }"#
        );
        assert_eq!(CSharp.encode_literal(&json!([1, "a"])), r#"new object[] { 1, "a" }"#);
        assert_eq!(CSharp.encode_literal(&json!([])), "new int[] { }");
    }

    #[test]
    fn renames_user_main() {
        let source = "class Program {\n    static void Main(string[] args) {\n    }\n    static int Twice(int x) => 2 * x;\n}\n";
        let cases = vec![TestCase::new("one", vec![json!(1)], json!(2))];
        let code = CSharp.generate(source, "Twice", &cases);
        assert!(code.contains("static void PjUserMain(string[] args)"));
        assert!(code.contains("PjJson(Program.Twice(1))"));
        assert_eq!(code.matches(" Main(").count(), 1);
    }

    #[test]
    fn instance_method_on_solution() {
        let source = "public class Solution {\n    public int[] TwoSum(int[] nums, int target) {\n        return nums;\n    }\n}\n";
        let cases = vec![TestCase::new("one", vec![json!([1]), json!(0)], json!([1]))];
        let code = CSharp.generate(source, "TwoSum", &cases);
        assert!(code.contains("PjJson(new Solution().TwoSum(new int[] { 1 }, 0))"));
    }
}
