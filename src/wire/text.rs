//! Inline textual socket values.
//!
//! Floats use Rust's shortest round-trip formatting, so an inline value
//! decodes to the exact float that was encoded. Vectors and arrays are
//! space-separated. Node references are handled by the encoder/decoder
//! because they need the name map.

use crate::graph::{SocketDef, SocketType, SocketValue};
use crate::util::{Error, Result, Transform, Vec2, Vec3, Vec4};

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")
}

/// Format a value inline. `None` for reference and closure values.
pub fn to_text(value: &SocketValue, def: &SocketDef) -> Option<String> {
    let text = match value {
        SocketValue::Bool(v) => (if *v { "true" } else { "false" }).to_string(),
        SocketValue::Int(v) => v.to_string(),
        SocketValue::Int64(v) => v.to_string(),
        SocketValue::UInt(v) => v.to_string(),
        SocketValue::Float(v) => v.to_string(),
        SocketValue::Float2(v) => join(v.to_array()),
        SocketValue::Float3(v) => join(v.to_array()),
        SocketValue::Float4(v) => join(v.to_array()),
        SocketValue::Transform(t) => join(t.to_rows()),
        SocketValue::Enum(id) => match def.enum_def.as_ref().and_then(|e| e.name_of(*id)) {
            Some(name) => name.to_string(),
            None => id.to_string(),
        },
        SocketValue::String(s) => s.clone(),
        SocketValue::BoolArray(v) => join(v.iter().map(|b| u8::from(*b))),
        SocketValue::IntArray(v) => join(v),
        SocketValue::FloatArray(v) => join(v),
        SocketValue::Float2Array(v) => join(v.iter().flat_map(|e| e.to_array())),
        SocketValue::Float3Array(v) => join(v.iter().flat_map(|e| e.to_array())),
        SocketValue::TransformArray(v) => join(v.iter().flat_map(|t| t.to_rows())),
        SocketValue::StringArray(v) => v.join(" "),
        SocketValue::Node(_) | SocketValue::NodeArray(_) | SocketValue::Closure => return None,
    };
    Some(text)
}

/// `true` (any case) or a non-zero integer.
pub fn parse_bool(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("true") || s.parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

fn parse_tokens<T: std::str::FromStr>(s: &str, what: &str) -> Result<Vec<T>> {
    s.split_whitespace()
        .map(|tok| {
            tok.parse::<T>()
                .map_err(|_| Error::invalid(format!("bad {what} token '{tok}'")))
        })
        .collect()
}

fn parse_floats_exact(s: &str, n: usize) -> Result<Vec<f32>> {
    let v: Vec<f32> = parse_tokens(s, "float")?;
    if v.len() != n {
        return Err(Error::invalid(format!("expected {n} floats, got {}", v.len())));
    }
    Ok(v)
}

fn parse_chunked(s: &str, size: usize) -> Result<Vec<f32>> {
    let v: Vec<f32> = parse_tokens(s, "float")?;
    if v.len() % size != 0 {
        return Err(Error::invalid(format!(
            "{} floats is not a multiple of the vector size {size}",
            v.len()
        )));
    }
    Ok(v)
}

fn transform_of(c: &[f32]) -> Transform {
    let mut rows = [0.0; 12];
    rows.copy_from_slice(c);
    Transform::from_rows(&rows)
}

/// Resolve an enum value: by name first, then by numeric id.
pub fn parse_enum(s: &str, def: &SocketDef) -> Result<i32> {
    let s = s.trim();
    if let Some(e) = def.enum_def.as_ref() {
        if let Some(id) = e.id_of(s) {
            return Ok(id);
        }
        if let Ok(id) = s.parse::<i32>() {
            if e.contains_id(id) {
                return Ok(id);
            }
        }
        return Err(Error::invalid(format!("unknown value '{s}' for enum '{}'", def.name)));
    }
    s.parse::<i32>()
        .map_err(|_| Error::invalid(format!("unknown value '{s}' for enum '{}'", def.name)))
}

/// Parse an inline value of the socket's declared type.
pub fn from_text(s: &str, def: &SocketDef) -> Result<SocketValue> {
    let bad = |what: &str| Error::invalid(format!("bad {what} '{s}' for socket '{}'", def.name));
    let value = match def.ty {
        SocketType::Boolean => SocketValue::Bool(parse_bool(s)),
        SocketType::Int => SocketValue::Int(s.trim().parse().map_err(|_| bad("int"))?),
        SocketType::Int64 => SocketValue::Int64(s.trim().parse().map_err(|_| bad("int64"))?),
        SocketType::UInt => SocketValue::UInt(s.trim().parse().map_err(|_| bad("uint"))?),
        SocketType::Float => SocketValue::Float(s.trim().parse().map_err(|_| bad("float"))?),
        SocketType::Float2 => SocketValue::Float2(Vec2::from_slice(&parse_floats_exact(s, 2)?)),
        SocketType::Float3 => {
            // Padded 4-component vectors are accepted; the fourth is dropped.
            let v: Vec<f32> = parse_tokens(s, "float")?;
            if v.len() != 3 && v.len() != 4 {
                return Err(bad("float3"));
            }
            SocketValue::Float3(Vec3::new(v[0], v[1], v[2]))
        }
        SocketType::Float4 => SocketValue::Float4(Vec4::from_slice(&parse_floats_exact(s, 4)?)),
        SocketType::Transform => SocketValue::Transform(transform_of(&parse_floats_exact(s, 12)?)),
        SocketType::Enum => SocketValue::Enum(parse_enum(s, def)?),
        SocketType::String => SocketValue::String(s.to_string()),
        SocketType::BooleanArray => {
            SocketValue::BoolArray(s.split_whitespace().map(parse_bool).collect())
        }
        SocketType::IntArray => SocketValue::IntArray(parse_tokens(s, "int")?),
        SocketType::FloatArray => SocketValue::FloatArray(parse_tokens(s, "float")?),
        SocketType::Float2Array => SocketValue::Float2Array(
            parse_chunked(s, 2)?.chunks_exact(2).map(Vec2::from_slice).collect(),
        ),
        SocketType::Float3Array => SocketValue::Float3Array(
            parse_chunked(s, 3)?.chunks_exact(3).map(Vec3::from_slice).collect(),
        ),
        SocketType::TransformArray => SocketValue::TransformArray(
            parse_chunked(s, 12)?.chunks_exact(12).map(transform_of).collect(),
        ),
        SocketType::StringArray => {
            SocketValue::StringArray(s.split_whitespace().map(str::to_string).collect())
        }
        SocketType::Node | SocketType::NodeArray | SocketType::Closure => {
            return Err(Error::invalid(format!(
                "socket '{}' of type {} has no inline form",
                def.name, def.ty
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EnumDef;

    fn def(ty: SocketType) -> SocketDef {
        SocketDef::new("s", "S", ty, SocketValue::zero(ty))
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("-3"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("yes"));
    }

    #[test]
    fn test_float_exact_roundtrip() {
        let d = def(SocketType::Float);
        let v = SocketValue::Float(0.1 + 0.2);
        let text = to_text(&v, &d).unwrap();
        assert_eq!(from_text(&text, &d).unwrap(), v);
    }

    #[test]
    fn test_float3_accepts_padded() {
        let d = def(SocketType::Float3);
        assert_eq!(
            from_text("1 2 3 0", &d).unwrap(),
            SocketValue::Float3(Vec3::new(1.0, 2.0, 3.0))
        );
        assert!(from_text("1 2", &d).is_err());
    }

    #[test]
    fn test_array_not_multiple_of_vector_size() {
        let d = def(SocketType::Float3Array);
        assert!(from_text("1 2 3 4", &d).is_err());
        let ok = from_text("1 2 3 4 5 6", &d).unwrap();
        assert_eq!(ok.as_float3_array().map(|a| a.len()), Some(2));
    }

    #[test]
    fn test_enum_name_then_id() {
        let d = SocketDef::new("t", "T", SocketType::Enum, SocketValue::Enum(0))
            .with_enum(EnumDef::new([("a", 0), ("b", 5), ("7", 9)]));
        assert_eq!(parse_enum("b", &d).unwrap(), 5);
        assert_eq!(parse_enum("5", &d).unwrap(), 5);
        // A name that looks numeric still matches by name first.
        assert_eq!(parse_enum("7", &d).unwrap(), 9);
        assert!(parse_enum("c", &d).is_err());
        assert!(parse_enum("3", &d).is_err());

        assert_eq!(to_text(&SocketValue::Enum(5), &d).unwrap(), "b");
    }

    #[test]
    fn test_node_has_no_inline_form() {
        assert!(to_text(&SocketValue::Node(None), &def(SocketType::Node)).is_none());
        assert!(from_text("x", &def(SocketType::NodeArray)).is_err());
    }
}
