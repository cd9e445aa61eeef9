//! Multi-document YAML parsing
//!
//! Manifest streams are parsed with yaml-rust2 and converted into
//! `serde_json::Value` documents so every object can be decoded with serde.
//! JSON is valid YAML, so streams of JSON documents separated by `---` parse too.
//! The reverse direction emits one YAML document per value.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlEmitter, YamlLoader};

use crate::{Error, Result};

/// Parse a multi-document stream into one JSON value per document.
///
/// Empty documents (a stray `---`, or a document holding only comments) are
/// skipped, so the result only contains real objects.
pub fn parse_documents(input: &str) -> Result<Vec<Value>> {
    let docs = YamlLoader::load_from_str(input)
        .map_err(|e| Error::serialization(format!("parsing YAML stream: {e}")))?;

    let mut values = Vec::with_capacity(docs.len());
    for (index, doc) in docs.into_iter().enumerate() {
        let value = to_json(doc)
            .map_err(|e| Error::serialization(format!("document {index}: {e}")))?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

/// Parse a single YAML document. Returns `Value::Null` for empty input.
pub fn parse_document(input: &str) -> Result<Value> {
    Ok(parse_documents(input)?
        .into_iter()
        .next()
        .unwrap_or(Value::Null))
}

/// Emit a JSON value as a YAML document, starting with `---`
pub fn to_yaml_document(value: &Value) -> Result<String> {
    let yaml = from_json(value);
    let mut out = String::new();
    YamlEmitter::new(&mut out)
        .dump(&yaml)
        .map_err(|e| Error::serialization(format!("emitting YAML: {e}")))?;
    Ok(out)
}

fn from_json(value: &Value) -> Yaml {
    match value {
        Value::Null => Yaml::Null,
        Value::Bool(b) => Yaml::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Yaml::Integer(i),
            None => Yaml::Real(n.to_string()),
        },
        Value::String(s) => Yaml::String(s.clone()),
        Value::Array(items) => Yaml::Array(items.iter().map(from_json).collect()),
        Value::Object(map) => Yaml::Hash(
            map.iter()
                .map(|(k, v)| (Yaml::String(k.clone()), from_json(v)))
                .collect(),
        ),
    }
}

fn to_json(yaml: Yaml) -> std::result::Result<Value, String> {
    let value = match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::Number(i.into()),
        Yaml::Real(raw) => {
            let f: f64 = raw
                .parse()
                .map_err(|e| format!("invalid float {raw}: {e}"))?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<std::result::Result<Vec<_>, _>>()?,
        ),
        Yaml::Hash(hash) => {
            let mut map = Map::with_capacity(hash.len());
            for (key, value) in hash {
                map.insert(key_to_string(key)?, to_json(value)?);
            }
            Value::Object(map)
        }
        Yaml::Alias(_) => return Err("YAML aliases not supported".to_string()),
        Yaml::BadValue => return Err("bad YAML value".to_string()),
    };
    Ok(value)
}

fn key_to_string(key: Yaml) -> std::result::Result<String, String> {
    match key {
        Yaml::String(s) | Yaml::Real(s) => Ok(s),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Boolean(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(format!("unsupported mapping key {other:?}")),
    }
}
