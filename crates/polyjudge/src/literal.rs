//! Shared utilities for rendering JSON values as source literals
//!
//! Each harness generator owns the syntax of its own literals; this module
//! provides the pieces they have in common: shape analysis of arrays,
//! string escaping, and the canonical JSON form that generated drivers
//! compare against.

use serde_json::{Map, Number, Value};

/// Structural type of a JSON value, as far as literal rendering cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Null,
    Bool,
    Int,
    Float,
    Str,
    /// Array whose elements all share one shape (empty arrays are `Int`)
    Array(Box<Shape>),
    /// Anything heterogeneous, including objects
    Mixed,
}

impl Shape {
    /// Determine the shape of a value by scanning every element
    pub fn of(value: &Value) -> Shape {
        match value {
            Value::Null => Shape::Null,
            Value::Bool(_) => Shape::Bool,
            Value::Number(n) => {
                if is_integral(n) {
                    Shape::Int
                } else {
                    Shape::Float
                }
            }
            Value::String(_) => Shape::Str,
            Value::Array(items) => Shape::Array(Box::new(Self::of_elements(items))),
            Value::Object(_) => Shape::Mixed,
        }
    }

    /// Common shape of a list of siblings
    ///
    /// Integers and floats unify to `Float`; empty arrays unify with any
    /// array shape.
    pub fn of_elements(items: &[Value]) -> Shape {
        let mut shapes = items.iter().map(Self::of);
        let Some(first) = shapes.next() else {
            return Shape::Int;
        };
        shapes.fold(first, Self::unify)
    }

    fn unify(a: Shape, b: Shape) -> Shape {
        match (a, b) {
            (a, b) if a == b => a,
            (Shape::Int, Shape::Float) | (Shape::Float, Shape::Int) => Shape::Float,
            (Shape::Array(a), Shape::Array(b)) => match Self::unify(*a, *b) {
                Shape::Mixed => Shape::Mixed,
                inner => Shape::Array(Box::new(inner)),
            },
            _ => Shape::Mixed,
        }
    }

    /// Shape to render `value` with inside a container whose element shape
    /// is `hint`
    ///
    /// An array hint always wins: rows of a typed matrix must share the
    /// parent's element type even when a row alone would narrow to `Int`.
    pub fn hinted(value: &Value, hint: &Shape) -> Shape {
        match (value, hint) {
            (Value::Array(_), Shape::Array(_)) => hint.clone(),
            _ => Self::of(value),
        }
    }

    /// Element shape if this is an array
    pub fn element(&self) -> Option<&Shape> {
        match self {
            Shape::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Number of nested array levels (`[[1]]` is 2)
    pub fn depth(&self) -> usize {
        match self {
            Shape::Array(inner) => 1 + inner.depth(),
            _ => 0,
        }
    }

    /// Innermost non-array shape
    pub fn leaf(&self) -> &Shape {
        match self {
            Shape::Array(inner) => inner.leaf(),
            other => other,
        }
    }

    /// Whether every leaf is a scalar of one fixed type
    pub fn is_homogeneous(&self) -> bool {
        !matches!(self.leaf(), Shape::Mixed | Shape::Null)
    }
}

/// Whether a JSON number has no fractional part
pub fn is_integral(n: &Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64()
        .is_some_and(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15)
}

/// Render a number as an integer literal if integral
pub fn integer_text(n: &Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return Some(i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    match n.as_f64() {
        Some(f) if is_integral(n) => Some(format!("{}", f as i64)),
        _ => None,
    }
}

/// Render a number as a float literal that always contains a decimal point
/// or exponent
pub fn float_text(n: &Number) -> String {
    let f = n.as_f64().unwrap_or(0.0);
    let text = format!("{f:?}");
    if text.contains(['.', 'e', 'E']) || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

/// Whether an integer fits a 32-bit signed int
pub fn fits_i32(n: &Number) -> bool {
    n.as_i64()
        .is_some_and(|i| i >= i64::from(i32::MIN) && i <= i64::from(i32::MAX))
}

/// Escape a string for a C-family double or single quoted literal
///
/// Backslash, the quote character, newline, carriage return and tab are
/// escaped. Everything else is copied through.
pub fn escape_with(s: &str, quote: char) -> String {
    escape_with_extra(s, quote, &[])
}

/// Like [`escape_with`], also backslash-escaping each char in `extra`
pub fn escape_with_extra(s: &str, quote: char, extra: &[char]) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if extra.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Quote a string with double quotes using [`escape_with`]
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_with(s, '"'))
}

/// Canonical compact JSON used for result comparison
///
/// Object keys are sorted, there is no whitespace, and integral numbers are
/// printed as integers so that `2` and `2.0` compare equal.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) => match integer_text(n) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&n.to_string()),
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Normalize a value so structurally equal results compare equal with `==`
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if !n.is_i64() && !n.is_u64() && is_integral(n) => {
                Value::Number(Number::from(f as i64))
            }
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect::<Map<String, Value>>(),
        ),
        other => other.clone(),
    }
}
