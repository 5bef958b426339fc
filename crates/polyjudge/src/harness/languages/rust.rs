use regex::Regex;
use serde_json::Value;

use crate::harness::{HarnessGenerator, prepare_cases, rename_entry_point, string_literal};
use crate::literal::{Shape, canonical_json, float_text, integer_text, quoted};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Rust driver
///
/// Panics are caught per case with `catch_unwind`. Results are serialized by
/// a small `PjJson` trait covering primitives, strings, options, tuples and
/// nested `Vec`s.
pub struct Rust;

const HELPERS: &str = r#"
trait PjJson {
    fn pj_json(&self) -> String;
}

fn pj_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn pj_float(f: f64) -> String {
    if !f.is_finite() {
        return "null".to_string();
    }
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        return format!("{}", f as i64);
    }
    // Plain decimals only for exponents -5 through 15, as serde_json writes them
    let sci = format!("{:e}", f);
    let power: i32 = sci.rsplit('e').next().and_then(|p| p.parse().ok()).unwrap_or(0);
    if !(-5..16).contains(&power) {
        return sci;
    }
    let plain = format!("{}", f);
    if plain.contains('.') { plain } else { format!("{}.0", plain) }
}

macro_rules! pj_json_int {
    ($($t:ty),*) => {
        $(impl PjJson for $t {
            fn pj_json(&self) -> String {
                self.to_string()
            }
        })*
    };
}

pj_json_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl PjJson for f64 {
    fn pj_json(&self) -> String {
        pj_float(*self)
    }
}

impl PjJson for f32 {
    fn pj_json(&self) -> String {
        pj_float(f64::from(*self))
    }
}

impl PjJson for bool {
    fn pj_json(&self) -> String {
        self.to_string()
    }
}

impl PjJson for char {
    fn pj_json(&self) -> String {
        pj_quote(&self.to_string())
    }
}

impl PjJson for String {
    fn pj_json(&self) -> String {
        pj_quote(self)
    }
}

impl PjJson for str {
    fn pj_json(&self) -> String {
        pj_quote(self)
    }
}

impl PjJson for () {
    fn pj_json(&self) -> String {
        "null".to_string()
    }
}

impl<T: PjJson + ?Sized> PjJson for &T {
    fn pj_json(&self) -> String {
        (**self).pj_json()
    }
}

impl<T: PjJson + ?Sized> PjJson for Box<T> {
    fn pj_json(&self) -> String {
        (**self).pj_json()
    }
}

impl<T: PjJson> PjJson for Option<T> {
    fn pj_json(&self) -> String {
        match self {
            Some(v) => v.pj_json(),
            None => "null".to_string(),
        }
    }
}

impl<T: PjJson> PjJson for [T] {
    fn pj_json(&self) -> String {
        let items: Vec<String> = self.iter().map(|v| v.pj_json()).collect();
        format!("[{}]", items.join(","))
    }
}

impl<T: PjJson> PjJson for Vec<T> {
    fn pj_json(&self) -> String {
        self.as_slice().pj_json()
    }
}

impl<T: PjJson, const N: usize> PjJson for [T; N] {
    fn pj_json(&self) -> String {
        self.as_slice().pj_json()
    }
}

impl<A: PjJson, B: PjJson> PjJson for (A, B) {
    fn pj_json(&self) -> String {
        format!("[{},{}]", self.0.pj_json(), self.1.pj_json())
    }
}

impl<A: PjJson, B: PjJson, C: PjJson> PjJson for (A, B, C) {
    fn pj_json(&self) -> String {
        format!("[{},{},{}]", self.0.pj_json(), self.1.pj_json(), self.2.pj_json())
    }
}

fn pj_panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn pj_record(results: &mut Vec<String>, name: &str, passed: bool, actual: &str, expected: &str) {
    results.push(format!(
        "{{\"name\":{},\"passed\":{},\"actual\":{},\"expected\":{}}}",
        name, passed, actual, expected
    ));
}
"#;

impl Rust {
    fn literal(&self, value: &Value, shape: &Shape) -> String {
        match value {
            Value::Null => "None".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match (shape, integer_text(n)) {
                (Shape::Float, _) | (_, None) => format!("{}_f64", float_text(n)),
                (_, Some(text)) => text,
            },
            Value::String(s) => format!("String::from({})", quoted(s)),
            Value::Array(items) => {
                let shape = Shape::hinted(value, shape);
                match shape.element() {
                    Some(Shape::Mixed) | Some(Shape::Null) => {
                        // Heterogeneous: pass each element as its JSON text
                        let body: Vec<String> = items
                            .iter()
                            .map(|v| format!("String::from({})", quoted(&canonical_json(v))))
                            .collect();
                        format!("vec![{}]", body.join(", "))
                    }
                    Some(element) => {
                        let body: Vec<String> =
                            items.iter().map(|v| self.literal(v, element)).collect();
                        format!("vec![{}]", body.join(", "))
                    }
                    None => "vec![]".to_owned(),
                }
            }
            Value::Object(_) => format!("String::from({})", quoted(&canonical_json(value))),
        }
    }
}

impl HarnessGenerator for Rust {
    fn id(&self) -> &'static str {
        "rust"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, &Shape::of(value))
    }

    fn function_pattern(&self) -> &'static str {
        r"\bfn\s+([A-Za-z_]\w*)\s*[<(]"
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let body = rename_entry_point(source, r"(\bfn\s+)main(\s*\()", "__pj_user_main");
        let on_solution = Regex::new(r"\bimpl\s+Solution\b")
            .map(|re| re.is_match(source))
            .unwrap_or(false);
        let callee = if on_solution {
            format!("Solution::{function_name}")
        } else {
            function_name.to_owned()
        };

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str("#![allow(dead_code, unused_imports, unused_variables, non_snake_case)]\n\n");
        out.push_str(&body);
        out.push('\n');
        out.push_str(HELPERS);
        out.push_str("\nfn main() {\n    std::panic::set_hook(Box::new(|_| {}));\n    let mut pj_results: Vec<String> = Vec::new();\n");
        for case in prepare_cases(self, cases) {
            let name = string_literal(self, &case.name_json);
            let expected = string_literal(self, &case.expected_json);
            out.push_str(&format!(
                r#"    {{
        let expected: String = {expected};
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {callee}({args}))) {{
            Ok(value) => {{
                let actual = PjJson::pj_json(&value);
                pj_record(&mut pj_results, &{name}, actual == expected, &actual, &expected);
            }}
            Err(payload) => {{
                let actual = pj_quote(&pj_panic_message(payload));
                pj_record(&mut pj_results, &{name}, false, &actual, &expected);
            }}
        }}
    }}
"#,
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "    println!();\n    println!(\"{{}}\", {start});\n    println!(\"[{{}}]\", pj_results.join(\",\"));\n    println!(\"{{}}\", {end});\n}}\n",
            start = quoted(RESULTS_START_MARKER),
            end = quoted(RESULTS_END_MARKER),
        ));
        out
    }
}
