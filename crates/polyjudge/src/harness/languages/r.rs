use serde_json::Value;

use crate::harness::{HarnessGenerator, prepare_cases, string_literal};
use crate::literal::{Shape, escape_with, integer_text};
use crate::results::{RESULTS_END_MARKER, RESULTS_START_MARKER};
use crate::types::TestCase;

/// R driver with a hand-built JSON writer
///
/// Homogeneous scalar arrays become atomic vectors (`c(...)`), anything nested
/// or mixed becomes a `list(...)`.
pub struct R;

const PRELUDE: &str = r#"
.pj_str <- function(s) enc2utf8(encodeString(s, quote = "\""))

.pj_scalar <- function(x) {
  if (is.na(x)) return("null")
  if (is.logical(x)) return(if (x) "true" else "false")
  if (is.numeric(x)) {
    if (is.finite(x) && x == round(x) && abs(x) < 1e15) return(format(x, scientific = FALSE))
    return(as.character(x))
  }
  .pj_str(as.character(x))
}

.pj_json <- function(v) {
  if (is.null(v)) return("null")
  if (is.list(v)) {
    keys <- names(v)
    if (!is.null(keys) && all(keys != "")) {
      keys <- sort(keys)
      parts <- vapply(keys, function(k) paste0(.pj_str(k), ":", .pj_json(v[[k]])), character(1))
      return(paste0("{", paste(parts, collapse = ","), "}"))
    }
    parts <- vapply(v, .pj_json, character(1))
    return(paste0("[", paste(parts, collapse = ","), "]"))
  }
  if (is.matrix(v)) {
    rows <- lapply(seq_len(nrow(v)), function(i) as.list(v[i, ]))
    return(.pj_json(rows))
  }
  if (is.factor(v)) v <- as.character(v)
  if (length(v) != 1) {
    parts <- vapply(seq_along(v), function(i) .pj_scalar(v[[i]]), character(1))
    return(paste0("[", paste(parts, collapse = ","), "]"))
  }
  .pj_scalar(v)
}

.pj_results <- character(0)
"#;

impl R {
    fn empty_vector(shape: &Shape) -> &'static str {
        match shape {
            Shape::Float => "numeric(0)",
            Shape::Str => "character(0)",
            Shape::Bool => "logical(0)",
            Shape::Int => "integer(0)",
            _ => "list()",
        }
    }
}

impl HarnessGenerator for R {
    fn id(&self) -> &'static str {
        "r"
    }

    fn encode_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_owned(),
            Value::Bool(true) => "TRUE".to_owned(),
            Value::Bool(false) => "FALSE".to_owned(),
            Value::Number(n) => integer_text(n).unwrap_or_else(|| n.to_string()),
            Value::String(s) => format!("\"{}\"", escape_with(s, '"')),
            Value::Array(items) => {
                let shape = Shape::of_elements(items);
                if items.is_empty() {
                    return Self::empty_vector(&shape).to_owned();
                }
                let parts: Vec<String> = items.iter().map(|v| self.encode_literal(v)).collect();
                match shape {
                    Shape::Int | Shape::Float | Shape::Str | Shape::Bool => {
                        format!("c({})", parts.join(", "))
                    }
                    _ => format!("list({})", parts.join(", ")),
                }
            }
            Value::Object(map) => {
                let entries: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("`{}` = {}", k.replace('`', ""), self.encode_literal(v)))
                    .collect();
                format!("list({})", entries.join(", "))
            }
        }
    }

    fn function_pattern(&self) -> &'static str {
        r"([A-Za-z.][\w.]*)\s*(?:<-|=)\s*function\s*\("
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
                r#"
.pj_outcome <- tryCatch({{
  .pj_actual <- .pj_json(do.call({target}, list({args})))
  list(actual = .pj_actual, passed = identical(.pj_actual, {expected}))
}}, error = function(e) {{
  list(actual = .pj_str(paste0("Error: ", conditionMessage(e))), passed = FALSE)
}})
.pj_results <- c(.pj_results, paste0("{{\"name\":", {case_name}, ",\"passed\":", if (.pj_outcome$passed) "true" else "false", ",\"actual\":", .pj_outcome$actual, ",\"expected\":", {expected}, "}}"))
"#,
                args = case.args.join(", "),
                case_name = string_literal(self, &case.name_json),
            ));
        }
        out.push_str(&format!(
            "\ncat(\"\\n\", {start}, \"\\n\", sep = \"\")\ncat(\"[\", paste(.pj_results, collapse = \",\"), \"]\\n\", sep = \"\")\ncat({end}, \"\\n\", sep = \"\")\n",
            start = string_literal(self, RESULTS_START_MARKER),
            end = string_literal(self, RESULTS_END_MARKER),
        ));
        out
    }
}
