use serde_json::Value;

use crate::harness::{HarnessGenerator, prepare_cases, string_literal};
use crate::literal::{escape_with_extra, float_text, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// PHP 8 driver using `json_encode`
pub struct Php;

const PRELUDE: &str = r#"
function __pj_canon($v) {
    if (is_float($v) && is_finite($v) && floor($v) == $v && abs($v) < 9007199254740992) {
        return (int) $v;
    }
    if (is_array($v)) {
        $out = [];
        foreach ($v as $k => $x) {
            $out[$k] = __pj_canon($x);
        }
        if (!array_is_list($out)) {
            ksort($out, SORT_STRING);
        }
        return $out;
    }
    if (is_object($v)) {
        return __pj_canon(get_object_vars($v));
    }
    return $v;
}

function __pj_to_json($v) {
    $json = json_encode(__pj_canon($v), JSON_UNESCAPED_SLASHES | JSON_UNESCAPED_UNICODE);
    return $json === false ? 'null' : $json;
}

function __pj_target($name) {
    if (function_exists($name)) {
        return $name;
    }
    if (class_exists('Solution')) {
        return [new Solution(), $name];
    }
    throw new Error("function '" . $name . "' is not defined");
}

$__pj_results = [];
"#;

impl HarnessGenerator for Php {
    fn id(&self) -> &'static str {
        "php"
    }

    fn encode_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => integer_text(n).unwrap_or_else(|| float_text(n)),
            Value::String(s) => format!("\"{}\"", escape_with_extra(s, '"', &['$'])),
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
                format!("[{}]", entries.join(", "))
            }
        }
    }

    fn function_pattern(&self) -> &'static str {
        r"function\s+&?\s*([A-Za-z_]\w*)\s*\("
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let mut out = String::with_capacity(source.len() + 2048);
        let trimmed = source.trim_start();
        if !trimmed.starts_with("<?php") {
            out.push_str("<?php\n");
        }
        out.push_str(source);
        if source.trim_end().ends_with("?>") {
            out.push_str("\n<?php\n");
        } else {
            out.push('\n');
        }
        out.push_str(PRELUDE);

        let target = string_literal(self, function_name);
        for case in prepare_cases(self, cases) {
            let expected = string_literal(self, &case.expected_json);
            out.push_str(&format!(
                r#"
try {{
    $__pj_actual = __pj_to_json(call_user_func_array(__pj_target({target}), [{args}]));
    $__pj_passed = $__pj_actual === {expected};
}} catch (\Throwable $__pj_err) {{
    $__pj_actual = __pj_to_json(get_class($__pj_err) . ': ' . $__pj_err->getMessage());
    $__pj_passed = false;
}}
$__pj_results[] = '{{"name":' . {case_name} . ',"passed":' . ($__pj_passed ? 'true' : 'false') . ',"actual":' . $__pj_actual . ',"expected":' . {expected} . '}}';
"#,
                args = case.args.join(", "),
                case_name = string_literal(self, &case.name_json),
            ));
        }
        out.push_str(&format!(
            "\necho \"\\n\" . {start} . \"\\n\";\necho '[' . implode(',', $__pj_results) . ']' . \"\\n\";\necho {end} . \"\\n\";\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
