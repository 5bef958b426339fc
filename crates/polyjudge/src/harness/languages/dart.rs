use serde_json::Value;

use crate::harness::{
    HarnessGenerator, declares_type, prepare_cases, rename_entry_point, string_literal,
};
use crate::literal::{Shape, escape_with_extra, float_text, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Dart driver with a hand-built JSON writer, so no import has to be hoisted
/// above the user's declarations
pub struct Dart;

const HELPERS: &str = r#"
String _pjQuote(String s) {
  final out = StringBuffer('"');
  for (final unit in s.runes) {
    if (unit == 0x22) {
      out.write('\\"');
    } else if (unit == 0x5c) {
      out.write('\\\\');
    } else if (unit == 0x0a) {
      out.write('\\n');
    } else if (unit == 0x0d) {
      out.write('\\r');
    } else if (unit == 0x09) {
      out.write('\\t');
    } else if (unit < 0x20) {
      out.write('\\u' + unit.toRadixString(16).padLeft(4, '0'));
    } else {
      out.writeCharCode(unit);
    }
  }
  out.write('"');
  return out.toString();
}

String _pjNumber(double d) {
  if (d.isNaN || d.isInfinite) return 'null';
  if (d == d.roundToDouble() && d.abs() < 9007199254740992) return d.toInt().toString();
  return d.toString();
}

String _pjJson(Object? v) {
  if (v == null) return 'null';
  if (v is bool) return v ? 'true' : 'false';
  if (v is int) return v.toString();
  if (v is double) return _pjNumber(v);
  if (v is String) return _pjQuote(v);
  if (v is Map) {
    final keys = v.keys.map((k) => k.toString()).toList()..sort();
    final byKey = <String, Object?>{};
    v.forEach((k, value) => byKey[k.toString()] = value);
    return '{' + keys.map((k) => _pjQuote(k) + ':' + _pjJson(byKey[k])).join(',') + '}';
  }
  if (v is Iterable) return '[' + v.map(_pjJson).join(',') + ']';
  return _pjQuote(v.toString());
}

void _pjRecord(List<String> results, String name, bool passed, String actual, String expected) {
  results.add('{"name":' + name + ',"passed":' + (passed ? 'true' : 'false') + ',"actual":' + actual + ',"expected":' + expected + '}');
}
"#;

impl Dart {
    fn element_type(shape: &Shape) -> String {
        match shape {
            Shape::Int => "int".to_owned(),
            Shape::Float => "double".to_owned(),
            Shape::Bool => "bool".to_owned(),
            Shape::Str => "String".to_owned(),
            Shape::Null | Shape::Mixed => "dynamic".to_owned(),
            Shape::Array(inner) => format!("List<{}>", Self::element_type(inner)),
        }
    }

    fn literal(&self, value: &Value, shape: &Shape) -> String {
        match value {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => float_text(n),
                (_, Some(text)) => text,
            },
            // `$` starts interpolation
            Value::String(s) => format!("\"{}\"", escape_with_extra(s, '"', &['$'])),
            Value::Array(items) => {
                let own = Shape::hinted(value, shape);
                let element = own.element().cloned().unwrap_or(Shape::Int);
                let body: Vec<String> = match element {
                    Shape::Mixed | Shape::Null => {
                        items.iter().map(|v| self.literal(v, &Shape::of(v))).collect()
                    }
                    _ => items.iter().map(|v| self.literal(v, &element)).collect(),
                };
                format!("<{}>[{}]", Self::element_type(&element), body.join(", "))
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}: {}",
                            self.literal(&Value::String(k.clone()), &Shape::Str),
                            self.literal(v, &Shape::of(v))
                        )
                    })
                    .collect();
                format!("<String, dynamic>{{{}}}", entries.join(", "))
            }
        }
    }
}

impl HarnessGenerator for Dart {
    fn id(&self) -> &'static str {
        "dart"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value))
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*(?:[\w<>\[\],?]+[ \t]+)*([A-Za-z_]\w*)\s*\([^;{}]*\)\s*(?:async\s*)?(?:\{|=>)"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let body = rename_entry_point(
            source,
            r"(?m)(^[ \t]*(?:void\s+|Future<void>\s+)?)main(\s*\()",
            "_pjUserMain",
        );
        let callee = if declares_type(source, "Solution") {
            format!("Solution().{function_name}")
        } else {
            function_name.to_owned()
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str(&body);
        out.push('\n');
        out.push_str(HELPERS);
        out.push_str("\nvoid main() {\n  final results = <String>[];\n");
        for case in prepare_cases(self, cases) {
            out.push_str(&format!(
                r#"  {{
    final name = {name};
    final expected = {expected};
    try {{
      final actual = _pjJson({callee}({args}));
      _pjRecord(results, name, actual == expected, actual, expected);
    }} catch (e) {{
      _pjRecord(results, name, false, _pjQuote(e.toString()), expected);
    }}
  }}
"#,
                name = string_literal(self, &case.name_json),
                expected = string_literal(self, &case.expected_json),
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "  print('');\n  print({start});\n  print('[' + results.join(',') + ']');\n  print({end});\n}}\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
