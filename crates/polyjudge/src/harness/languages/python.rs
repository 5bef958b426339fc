use serde_json::Value;

use crate::harness::{HarnessGenerator, PreparedCase, prepare_cases, string_literal};
use crate::literal::{escape_with, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Python 3 driver using the standard `json` module
pub struct Python;

const PRELUDE: &str = r#"
import json as __pj_json
import sys as __pj_sys


def __pj_canon(v):
    if isinstance(v, bool) or v is None or isinstance(v, str):
        return v
    if isinstance(v, float) and v.is_integer():
        return int(v)
    if isinstance(v, (list, tuple, set)):
        return [__pj_canon(x) for x in v]
    if isinstance(v, dict):
        return {str(k): __pj_canon(x) for k, x in v.items()}
    return v


def __pj_to_json(v):
    return __pj_json.dumps(
        __pj_canon(v), separators=(",", ":"), sort_keys=True, ensure_ascii=False, default=str
    )


def __pj_target(name):
    fn = globals().get(name)
    if callable(fn):
        return fn
    if "Solution" in globals():
        return getattr(globals()["Solution"](), name)
    raise NameError("function '%s' is not defined" % name)


__pj_results = []
"#;

impl Python {
    fn case_block(&self, function_name: &str, case: &PreparedCase) -> String {
        format!(
            r#"
try:
    __pj_actual = __pj_to_json(__pj_target({name})(*[{args}]))
    __pj_passed = __pj_actual == {expected}
except Exception as __pj_err:
    __pj_actual = __pj_to_json("%s: %s" % (type(__pj_err).__name__, __pj_err))
    __pj_passed = False
__pj_results.append('{{"name":' + {case_name} + ',"passed":' + ("true" if __pj_passed else "false") + ',"actual":' + __pj_actual + ',"expected":' + {expected} + '}}')
"#,
            name = string_literal(self, function_name),
            args = case.args.join(", "),
            expected = string_literal(self, &case.expected_json),
            case_name = string_literal(self, &case.name_json),
        )
    }
}

impl HarnessGenerator for Python {
    fn id(&self) -> &'static str {
        "python"
    }

    fn encode_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "None".to_owned(),
            Value::Bool(true) => "True".to_owned(),
            Value::Bool(false) => "False".to_owned(),
            Value::Number(n) => integer_text(n).unwrap_or_else(|| n.to_string()),
            Value::String(s) => format!("\"{}\"", escape_with(s, '"')),
            Value::Array(items) => {
                let items: Vec<String> = items.iter().map(|v| self.encode_literal(v)).collect();
                format!("[{}]", items.join(", "))
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| {
                        format!("\"{}\": {}", escape_with(k, '"'), self.encode_literal(v))
                    })
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
        }
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let mut out = String::with_capacity(source.len() + 2048);
        out.push_str(source);
        out.push('\n');
        out.push_str(PRELUDE);
        for case in prepare_cases(self, cases) {
            out.push_str(&self.case_block(function_name, &case));
        }
        out.push_str(&format!(
            "\nprint()\nprint({start})\nprint(\"[\" + \",\".join(__pj_results) + \"]\")\nprint({end})\n__pj_sys.stdout.flush()\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
