//! Canonical record encoding.
//!
//! The byte form hashed into every evidence anchor. Two implementations given
//! semantically equal records MUST produce identical bytes:
//!
//! 1. Object keys sorted by code point, recursively
//! 2. No insignificant whitespace, `,` and `:` separators
//! 3. Integers in decimal; integral floats below 2^53 as integers; other
//!    finite floats in shortest round-trip decimal form
//! 4. Strings escaped with the RFC 8785 rule: `\"`, `\\`, the five short
//!    control escapes, other control characters as lowercase `\u00xx`

use crate::error::EncodingError;
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt::Write as _;

/// Deepest nesting the canonicalizer accepts.
pub const MAX_DEPTH: usize = 128;

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Canonical bytes of a JSON value.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, EncodingError> {
    let mut out = String::new();
    emit_value(value, 0, &mut out)?;
    Ok(out.into_bytes())
}

/// Canonical bytes of any serializable record.
pub fn canonicalize_serialize<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>, EncodingError> {
    canonicalize(&to_record(record)?)
}

/// Parse JSON text and return its canonical bytes.
///
/// `NaN` and `Infinity` are not JSON and fail here as parse errors.
pub fn canonicalize_str(input: &str) -> Result<Vec<u8>, EncodingError> {
    let value: Value =
        serde_json::from_str(input).map_err(|err| EncodingError::Parse(err.to_string()))?;
    canonicalize(&value)
}

/// Convert a serializable record into a JSON value.
pub fn to_record<T: Serialize + ?Sized>(record: &T) -> Result<Value, EncodingError> {
    serde_json::to_value(record).map_err(|err| EncodingError::Unrepresentable(err.to_string()))
}

/// JSON number for a float, rejecting NaN and infinities.
///
/// `serde_json` silently maps non-finite floats to `null`; typed payloads
/// route their floats through here instead.
pub fn finite_number(path: &str, value: f64) -> Result<Value, EncodingError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EncodingError::NonFinite {
            path: path.to_string(),
        })
}

fn emit_value(value: &Value, depth: usize, out: &mut String) -> Result<(), EncodingError> {
    if depth > MAX_DEPTH {
        return Err(EncodingError::MaxDepthExceeded {
            max_depth: MAX_DEPTH,
        });
    }
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => emit_number(n, out)?,
        Value::String(s) => emit_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                emit_value(item, depth + 1, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                emit_string(key, out);
                out.push(':');
                emit_value(item, depth + 1, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

fn emit_number(n: &Number, out: &mut String) -> Result<(), EncodingError> {
    if let Some(i) = n.as_i64() {
        let _ = write!(out, "{i}");
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        let _ = write!(out, "{u}");
        return Ok(());
    }
    let Some(f) = n.as_f64() else {
        return Err(EncodingError::Unrepresentable(format!("number {n}")));
    };
    if !f.is_finite() {
        return Err(EncodingError::NonFinite {
            path: n.to_string(),
        });
    }
    if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER {
        let _ = write!(out, "{}", f as i64);
    } else {
        emit_float(f, out);
    }
    Ok(())
}

/// ECMAScript `Number::toString` layout over the shortest round-trip digits:
/// plain decimal for exponents in [-7, 21), `d.ddde±N` outside it.
fn emit_float(f: f64, out: &mut String) {
    if f < 0.0 {
        out.push('-');
    }
    let sci = format!("{:e}", f.abs());
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        out.push_str(&sci);
        return;
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let Ok(exponent) = exponent.parse::<i32>() else {
        out.push_str(&sci);
        return;
    };
    let k = digits.len() as i32;
    let n = exponent + 1;

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat_n('0', (n - k) as usize));
    } else if 0 < n && n <= 21 {
        let (int, frac) = digits.split_at(n as usize);
        let _ = write!(out, "{int}.{frac}");
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat_n('0', (-n) as usize));
        out.push_str(&digits);
    } else {
        let (lead, rest) = digits.split_at(1);
        out.push_str(lead);
        if !rest.is_empty() {
            let _ = write!(out, ".{rest}");
        }
        let sign = if n - 1 < 0 { '-' } else { '+' };
        let _ = write!(out, "e{sign}{}", (n - 1).abs());
    }
}

fn emit_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn text(value: &Value) -> String {
        String::from_utf8(canonicalize(value).unwrap()).unwrap()
    }

    #[test]
    fn sorts_keys_and_strips_whitespace() {
        let bytes = canonicalize_str(
            r#"{ "b": {"d": true, "c": null},
                 "a": [1, 2.5, "x\n"] }"#,
        )
        .unwrap();
        insta::assert_snapshot!(String::from_utf8(bytes).unwrap(), @r#"{"a":[1,2.5,"x\n"],"b":{"c":null,"d":true}}"#);
    }

    #[test]
    fn integral_floats_render_as_integers() {
        assert_eq!(text(&json!({"wcet_ms": 5.0, "gap": -0.0})), r#"{"gap":0,"wcet_ms":5}"#);
        assert_eq!(text(&json!([0.1, 1.5e-3])), "[0.1,0.0015]");
    }

    #[test]
    fn large_and_tiny_floats_use_exponent_form() {
        assert_eq!(text(&json!(1e300)), "1e+300");
        assert_eq!(text(&json!(1e21)), "1e+21");
        assert_eq!(text(&json!(1e20)), "100000000000000000000");
        assert_eq!(text(&json!(-1.25e22)), "-1.25e+22");
        assert_eq!(text(&json!(1e-7)), "1e-7");
        assert_eq!(text(&json!(1.5e-6)), "0.0000015");
        assert_eq!(text(&json!(-2.5e-9)), "-2.5e-9");
        assert_eq!(text(&json!(123.5)), "123.5");
    }

    #[test]
    fn control_characters_use_lowercase_unicode_escapes() {
        assert_eq!(text(&json!("a\u{1f}b\u{7f}")), "\"a\\u001fb\u{7f}\"");
        assert_eq!(text(&json!("tab\tquote\"slash/")), r#""tab\tquote\"slash/""#);
    }

    #[test]
    fn key_order_is_code_point_order() {
        assert_eq!(
            text(&json!({"é": 1, "z": 2, "Z": 3, "a": 4})),
            r#"{"Z":3,"a":4,"z":2,"é":1}"#
        );
    }

    #[test]
    fn non_finite_inputs_are_encoding_errors() {
        assert!(matches!(
            canonicalize_str(r#"{"x": NaN}"#),
            Err(EncodingError::Parse(_))
        ));
        assert_eq!(
            finite_number("limits.max", f64::INFINITY),
            Err(EncodingError::NonFinite {
                path: "limits.max".to_string()
            })
        );
    }

    #[test]
    fn non_string_keys_are_encoding_errors() {
        let mut record: HashMap<(u8, u8), u8> = HashMap::new();
        record.insert((1, 2), 3);
        assert!(matches!(
            canonicalize_serialize(&record),
            Err(EncodingError::Unrepresentable(_))
        ));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut value = json!(0);
        for _ in 0..=MAX_DEPTH + 1 {
            value = json!([value]);
        }
        assert_eq!(
            canonicalize(&value),
            Err(EncodingError::MaxDepthExceeded {
                max_depth: MAX_DEPTH
            })
        );
    }

    proptest! {
        #[test]
        fn key_permutations_yield_identical_bytes(
            entries in proptest::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 1..8),
            seed in any::<u64>(),
        ) {
            let mut keys: Vec<_> = entries.keys().cloned().collect();
            let forward: Vec<String> = keys
                .iter()
                .map(|k| format!("\"{k}\": {}", entries[k]))
                .collect();
            let rotation = (seed as usize) % keys.len();
            keys.rotate_left(rotation);
            keys.reverse();
            let permuted: Vec<String> = keys
                .iter()
                .map(|k| format!("\"{k}\":{}", entries[k]))
                .collect();

            let a = canonicalize_str(&format!("{{ {} }}", forward.join(", "))).unwrap();
            let b = canonicalize_str(&format!("{{{}}}", permuted.join(","))).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn rendered_floats_parse_back_exactly(f in proptest::num::f64::NORMAL) {
            let rendered = text(&json!(f));
            let parsed: f64 = rendered.parse().unwrap();
            prop_assert_eq!(parsed, f);
        }
    }
}
