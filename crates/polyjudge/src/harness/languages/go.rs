use serde_json::Value;

use crate::harness::{HarnessGenerator, prepare_cases, rename_entry_point, string_literal};
use crate::literal::{Shape, float_text, integer_text, quoted};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// Go driver
///
/// Targets Go 1.16, so generic containers are `interface{}`. Slice literals
/// carry their element type; results are normalized by a JSON round trip
/// through `interface{}` and written with sorted keys.
pub struct Go;

/// Packages the driver itself imports
const DRIVER_IMPORTS: &[&str] = &["encoding/json", "fmt", "reflect", "sort", "strconv", "strings"];

const HELPERS: &str = r#"
func __pjQuote(s string) string {
	var b strings.Builder
	enc := json.NewEncoder(&b)
	enc.SetEscapeHTML(false)
	if err := enc.Encode(s); err != nil {
		return "\"\""
	}
	return strings.TrimRight(b.String(), "\n")
}

func __pjFloat(x float64) string {
	if x > -9007199254740992 && x < 9007199254740992 && x == float64(int64(x)) {
		return strconv.FormatInt(int64(x), 10)
	}
	// Plain decimals only for exponents -5 through 15, as the host writes them
	sci := strconv.FormatFloat(x, 'e', -1, 64)
	at := strings.IndexByte(sci, 'e')
	power, _ := strconv.Atoi(sci[at+1:])
	if power < -5 || power > 15 {
		return sci[:at+1] + strconv.Itoa(power)
	}
	plain := strconv.FormatFloat(x, 'f', -1, 64)
	if !strings.Contains(plain, ".") {
		plain += ".0"
	}
	return plain
}

func __pjWrite(b *strings.Builder, v interface{}) {
	switch x := v.(type) {
	case nil:
		b.WriteString("null")
	case bool:
		b.WriteString(strconv.FormatBool(x))
	case float64:
		b.WriteString(__pjFloat(x))
	case string:
		b.WriteString(__pjQuote(x))
	case []interface{}:
		b.WriteByte('[')
		for i, item := range x {
			if i > 0 {
				b.WriteByte(',')
			}
			__pjWrite(b, item)
		}
		b.WriteByte(']')
	case map[string]interface{}:
		keys := make([]string, 0, len(x))
		for k := range x {
			keys = append(keys, k)
		}
		sort.Strings(keys)
		b.WriteByte('{')
		for i, k := range keys {
			if i > 0 {
				b.WriteByte(',')
			}
			b.WriteString(__pjQuote(k))
			b.WriteByte(':')
			__pjWrite(b, x[k])
		}
		b.WriteByte('}')
	default:
		b.WriteString(__pjQuote(fmt.Sprint(x)))
	}
}

func __pjJSON(v interface{}) string {
	if rv := reflect.ValueOf(v); rv.IsValid() && rv.Kind() == reflect.Slice && rv.IsNil() {
		return "[]"
	}
	raw, err := json.Marshal(v)
	if err != nil {
		return __pjQuote(fmt.Sprint(v))
	}
	var decoded interface{}
	if err := json.Unmarshal(raw, &decoded); err != nil {
		return string(raw)
	}
	var b strings.Builder
	__pjWrite(&b, decoded)
	return b.String()
}

func __pjRecord(results *[]string, name string, passed bool, actual string, expected string) {
	*results = append(*results, "{\"name\":"+name+",\"passed\":"+strconv.FormatBool(passed)+",\"actual\":"+actual+",\"expected\":"+expected+"}")
}
"#;

/// User source split into import lines and everything else
struct GoSource {
    imports: Vec<String>,
    body: String,
}

/// Import path of an import spec such as `f "fmt"` or `"fmt"`
fn import_path(spec: &str) -> Option<&str> {
    let start = spec.find('"')?;
    let end = start + 1 + spec[start + 1..].find('"')?;
    Some(&spec[start + 1..end])
}

/// Strip `package` and `import` declarations, keeping the import specs
fn split_source(source: &str) -> GoSource {
    let mut imports = Vec::new();
    let mut body = Vec::new();
    let mut in_block = false;

    for line in source.lines() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
            } else if import_path(trimmed).is_some() {
                imports.push(trimmed.to_owned());
            }
            continue;
        }
        if trimmed.starts_with("package ") {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("import") {
            let rest = rest.trim();
            if rest.starts_with('(') {
                in_block = !rest.contains(')');
                let inner = rest.trim_start_matches('(').trim_end_matches(')').trim();
                if import_path(inner).is_some() {
                    imports.push(inner.to_owned());
                }
                continue;
            }
            if import_path(rest).is_some() {
                imports.push(rest.to_owned());
                continue;
            }
        }
        body.push(line);
    }

    GoSource {
        imports,
        body: body.join("\n"),
    }
}

impl Go {
    fn type_name(shape: &Shape) -> String {
        match shape {
            Shape::Int => "int".to_owned(),
            Shape::Float => "float64".to_owned(),
            Shape::Str => "string".to_owned(),
            Shape::Bool => "bool".to_owned(),
            Shape::Null | Shape::Mixed => "interface{}".to_owned(),
            Shape::Array(inner) => format!("[]{}", Self::type_name(inner)),
        }
    }

    /// Render a value; `elide` drops the type of a composite literal nested
    /// inside a typed slice literal
    fn literal(&self, value: &Value, elide: bool) -> String {
        match value {
            Value::Null => "nil".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => integer_text(n).unwrap_or_else(|| float_text(n)),
            Value::String(s) => quoted(s),
            Value::Array(items) => {
                let shape = Shape::of(value);
                let child_elide = matches!(shape.element(), Some(Shape::Array(_)));
                let body: Vec<String> = items
                    .iter()
                    .map(|v| self.literal(v, child_elide))
                    .collect();
                if elide {
                    format!("{{{}}}", body.join(", "))
                } else {
                    format!("{}{{{}}}", Self::type_name(&shape), body.join(", "))
                }
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quoted(k), self.literal(v, false)))
                    .collect();
                format!("map[string]interface{{}}{{{}}}", entries.join(", "))
            }
        }
    }
}

impl HarnessGenerator for Go {
    fn id(&self) -> &'static str {
        "go"
    }

    fn encode_literal(&self, value: &Value) -> String {
        self.literal(value, false)
    }

    fn function_pattern(&self) -> &'static str {
        r"(?m)^[ \t]*func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*\("
    }

    fn generate(&self, source: &str, function_name: &str, cases: &[TestCase]) -> String {
        let split = split_source(source);
        let body = rename_entry_point(&split.body, r"(\bfunc\s+)main(\s*\()", "__pjUserMain");

        let mut out = String::with_capacity(source.len() + 4096);
        out.push_str("package main\n\nimport (\n");
        for path in DRIVER_IMPORTS {
            out.push_str(&format!("\t\"{path}\"\n"));
        }
        for spec in &split.imports {
            let duplicate = import_path(spec).is_some_and(|p| DRIVER_IMPORTS.contains(&p))
                && !spec.trim_start().starts_with(|c: char| c.is_alphanumeric() || c == '_');
            if !duplicate {
                out.push_str(&format!("\t{spec}\n"));
            }
        }
        out.push_str(")\n\n");
        out.push_str(&body);
        out.push('\n');
        out.push_str(HELPERS);

        out.push_str("\nfunc main() {\n\t__pjResults := []string{}\n");
        for case in prepare_cases(self, cases) {
            let name = string_literal(self, &case.name_json);
            let expected = string_literal(self, &case.expected_json);
            out.push_str(&format!(
                r#"	func() {{
		defer func() {{
			if r := recover(); r != nil {{
				__pjRecord(&__pjResults, {name}, false, __pjQuote(fmt.Sprint(r)), {expected})
			}}
		}}()
		__pjActual := __pjJSON({function_name}({args}))
		__pjRecord(&__pjResults, {name}, __pjActual == {expected}, __pjActual, {expected})
	}}()
"#,
                args = case.args.join(", "),
            ));
        }
        out.push_str(&format!(
            "\tfmt.Println()\n\tfmt.Println({start})\n\tfmt.Println(\"[\" + strings.Join(__pjResults, \",\") + \"]\")\n\tfmt.Println({end})\n}}\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn typed_matrix_literal() {
        assert_eq!(
            Go.encode_literal(&json!([[1, 2], [3, 4]])),
            "[][]int{{1, 2}, {3, 4}}"
        );
    }

    #[test]
    fn ragged_number_matrix_shares_one_element_type() {
        assert_eq!(
            Go.encode_literal(&json!([[1, 2], [3.5]])),
            "[][]float64{{1, 2}, {3.5}}"
        );
    }

    #[test]
    fn scalar_and_slice_literals() {
        assert_eq!(Go.encode_literal(&json!([1.5, 2])), "[]float64{1.5, 2}");
        assert_eq!(Go.encode_literal(&json!(["a", "say \"quoted\""])), r#"[]string{"a", "say \"quoted\""}"#);
        assert_eq!(Go.encode_literal(&json!([])), "[]int{}");
        assert_eq!(Go.encode_literal(&json!(null)), "nil");
    }

    #[test]
    fn mixed_slice_keeps_inner_types() {
        assert_eq!(
            Go.encode_literal(&json!([1, "a", [2]])),
            r#"[]interface{}{1, "a", []int{2}}"#
        );
    }

    #[test]
    fn split_source_collects_imports() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\ts \"sort\"\n\t\"math\"\n)\n\nimport \"os\"\n\nfunc f() {}\n";
        let split = split_source(source);
        assert_eq!(split.imports, vec!["\"fmt\"", "s \"sort\"", "\"math\"", "\"os\""]);
        assert_eq!(split.body.trim(), "func f() {}");
    }

    #[test]
    fn merges_imports_without_duplicates() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\t\"math\"\n)\n\nfunc sq(x int) int { return x * x }\n";
        let code = Go.generate(source, "sq", &[]);
        assert_eq!(code.matches("\"fmt\"").count(), 1);
        assert!(code.contains("\t\"math\"\n"));
        assert_eq!(code.matches("package main").count(), 1);
    }

    #[test]
    fn renames_user_main() {
        let source = "package main\n\nfunc main() {\n}\n\nfunc f(x int) int { return x }\n";
        let code = Go.generate(source, "f", &[]);
        assert!(code.contains("func __pjUserMain() {"));
        assert_eq!(code.matches("func main()").count(), 1);
    }

    #[test]
    fn float_output_switches_to_exponent_like_canonical_json() {
        let code = Go.generate("package main\n\nfunc f(x float64) float64 { return x }\n", "f", &[]);
        assert!(code.contains("b.WriteString(__pjFloat(x))"));
        assert!(code.contains("if power < -5 || power > 15 {"));
        assert!(!code.contains("FormatFloat(x, 'f', -1, 64))"));
    }

    #[test]
    fn identity_driver() {
        let cases = vec![TestCase::new("one", vec![json!(1)], json!(1))];
        let code = Go.generate("package main\n\nfunc identity(x int) int { return x }\n", "identity", &cases);
        assert!(code.contains("__pjJSON(identity(1))"));
        assert!(code.contains("recover()"));
    }
}
