//! In-sandbox harness for JavaScript and TypeScript
//!
//! Unlike the generated native drivers this code is appended inside the entry
//! module of the bundle, so it can see the user's top-level functions and
//! exports directly. Asynchronous results are awaited; the bootstrap waits on
//! `globalThis.__polyjudgePending` before reporting completion.

use serde_json::{Value, json};

use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Function declarations, including `const f = (...) =>` forms
pub const FUNCTION_PATTERN: &str = r"function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(|(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?(?:function\b|\([^)]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)";

/// Build the harness suffix for an already resolved function name
pub fn local_harness(function_name: &str, cases: &[TestCase]) -> String {
    let cases_json = Value::Array(
        cases
            .iter()
            .map(|c| json!({ "name": c.name, "input": c.input, "expected": c.expected }))
            .collect(),
    )
    .to_string();
    // Embedded as a JSON string literal and parsed at runtime
    let cases_literal = Value::String(cases_json).to_string();
    let name_literal = Value::String(function_name.to_owned()).to_string();
    let start = Value::String(RESULTS_START_MARKER.to_owned()).to_string();
    let end = Value::String(RESULTS_END_MARKER.to_owned()).to_string();

    format!(
        r#"
;globalThis.__polyjudgePending = (async () => {{
  const __pjCases = JSON.parse({cases_literal});
  const __pjCanon = (v) => {{
    if (Array.isArray(v)) return '[' + v.map((x) => (x === undefined ? 'null' : __pjCanon(x))).join(',') + ']';
    if (v !== null && typeof v === 'object') {{
      return '{{' + Object.keys(v).sort().map((k) => JSON.stringify(k) + ':' + __pjCanon(v[k])).join(',') + '}}';
    }}
    const s = JSON.stringify(v);
    return s === undefined ? 'null' : s;
  }};
  const __pjName = {name_literal};
  const __pjExports = typeof module !== 'undefined' && module.exports ? module.exports : {{}};
  let __pjFn;
  try {{
    __pjFn = typeof {function_name} === 'function' ? {function_name} : undefined;
  }} catch (_) {{
    __pjFn = undefined;
  }}
  if (typeof __pjFn !== 'function') __pjFn = __pjExports[__pjName];
  if (typeof __pjFn !== 'function' && typeof __pjExports.default === 'function') __pjFn = __pjExports.default;
  const __pjResults = [];
  for (const c of __pjCases) {{
    try {{
      if (typeof __pjFn !== 'function') throw new Error('function ' + __pjName + ' is not defined');
      let actual = __pjFn(...c.input);
      if (actual && typeof actual.then === 'function') actual = await actual;
      const passed = __pjCanon(actual) === __pjCanon(c.expected);
      __pjResults.push({{ name: c.name, passed, actual: actual === undefined ? null : actual, expected: c.expected }});
    }} catch (e) {{
      const message = e && e.message ? e.name + ': ' + e.message : String(e);
      __pjResults.push({{ name: c.name, passed: false, actual: message, expected: c.expected }});
    }}
  }}
  console.log('\n' + {start} + '\n' + JSON.stringify(__pjResults) + '\n' + {end});
}})();
"#
    )
}
