use serde_json::Value;

use crate::harness::{HarnessGenerator, prepare_cases, string_literal};
use crate::literal::{escape_with_extra, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Ruby driver using `JSON.generate`
pub struct Ruby;

const PRELUDE: &str = r#"
require 'json'

def __pj_canon(v)
  case v
  when Float then v.finite? && v == v.floor ? v.to_i : v
  when Array then v.map { |x| __pj_canon(x) }
  when Hash then v.map { |k, x| [k.to_s, __pj_canon(x)] }.sort_by(&:first).to_h
  when Symbol then v.to_s
  else v
  end
end

def __pj_to_json(v)
  JSON.generate(__pj_canon(v))
end

def __pj_target(name)
  return method(name) if respond_to?(name, true)
  return Solution.new.method(name) if defined?(Solution)
  raise NoMethodError, "function '#{name}' is not defined"
end

__pj_results = []
"#;

impl HarnessGenerator for Ruby {
    fn id(&self) -> &'static str {
        "ruby"
    }

    fn encode_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "nil".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => integer_text(n).unwrap_or_else(|| n.to_string()),
            // `#` starts interpolation in double quoted strings
            Value::String(s) => format!("\"{}\"", escape_with_extra(s, '"', &['#'])),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| self.encode_literal(v)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{} => {}",
                            self.encode_literal(&Value::String(k.clone())),
                            self.encode_literal(v)
                        )
                    })
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*def\s+(?:self\.)?([A-Za-z_]\w*[?!]?)"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let mut out = String::with_capacity(source.len() + 2048);
        out.push_str(source);
        out.push('\n');
        out.push_str(PRELUDE);
        let target = string_literal(self, function_name);
        for case in prepare_cases(self, cases) {
            let expected = string_literal(self, &case.expected_json);
            out.push_str(&format!(
                r##"
begin
  __pj_actual = __pj_to_json(__pj_target({target}).call(*[{args}]))
  __pj_passed = __pj_actual == {expected}
rescue Exception => __pj_err
  __pj_actual = __pj_to_json("#{{__pj_err.class}}: #{{__pj_err.message}}")
  __pj_passed = false
end
__pj_results << "{{\"name\":" + {case_name} + ",\"passed\":" + __pj_passed.to_s + ",\"actual\":" + __pj_actual + ",\"expected\":" + {expected} + "}}"
"##,
                args = case.args.join(", "),
                case_name = string_literal(self, &case.name_json),
            ));
        }
        out.push_str(&format!(
            "\nputs\nputs {start}\nputs \"[\" + __pj_results.join(\",\") + \"]\"\nputs {end}\n$stdout.flush\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
