//! Schema-less decoding of the values returned by script execution.
//!
//! Scripts return a tree of tagged values. [`ChainValue`] keeps the tree shape
//! and the canonical textual form of each leaf, while [`decode`] turns it into
//! plain host data ([`GenericValue`]) without knowing the script's return type.

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed value: {0}")]
    Malformed(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid decimal `{0}`")]
    InvalidDecimal(String),
}

/// A value produced by a script, as a tree of tagged nodes.
///
/// Scalars hold the canonical string form of the on-chain value: string
/// payloads are quoted, numbers, booleans and addresses are bare.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainValue {
    Absent,
    Scalar(String),
    List(Vec<ChainValue>),
    /// Key/value pairs in the order they were produced. Keys need not be unique.
    Map(Vec<(ChainValue, ChainValue)>),
}

/// Host representation of a decoded [`ChainValue`].
///
/// `Absent` is kept apart from an empty `Text`: a script returning `nil` and a
/// script returning `""` are different answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GenericValue {
    Absent,
    Text(String),
    List(Vec<GenericValue>),
    Map(BTreeMap<String, GenericValue>),
}

impl GenericValue {
    /// Textual view of the value. `Absent` reads as the empty string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Absent => Some(""),
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[GenericValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, GenericValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Text(text) if text == "true" => Some(true),
            Self::Text(text) if text == "false" => Some(false),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "nothing",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }
}

/// Decodes a value tree into host data. Never fails: quoted leaves are
/// unquoted when they are well formed and kept verbatim otherwise.
pub fn decode(value: &ChainValue) -> GenericValue {
    match value {
        ChainValue::Absent => GenericValue::Absent,
        ChainValue::Scalar(raw) => GenericValue::Text(unquote_or_raw(raw)),
        ChainValue::List(items) => GenericValue::List(items.iter().map(decode).collect()),
        ChainValue::Map(pairs) => GenericValue::Map(
            pairs
                .iter()
                .map(|(key, value)| (decode_key(key), decode(value)))
                .collect(),
        ),
    }
}

/// Inverse of [`decode`]: `decode(&encode(v)) == v` for every `v`.
pub fn encode(value: &GenericValue) -> ChainValue {
    match value {
        GenericValue::Absent => ChainValue::Absent,
        GenericValue::Text(text) => ChainValue::Scalar(quote(text)),
        GenericValue::List(items) => ChainValue::List(items.iter().map(encode).collect()),
        GenericValue::Map(map) => ChainValue::Map(
            map.iter()
                .map(|(key, value)| (ChainValue::Scalar(quote(key)), encode(value)))
                .collect(),
        ),
    }
}

fn decode_key(key: &ChainValue) -> String {
    match key {
        ChainValue::Scalar(raw) => unquote_or_raw(raw),
        other => other.to_string(),
    }
}

fn unquote_or_raw(raw: &str) -> String {
    unquote(raw).unwrap_or_else(|| raw.to_string())
}

/// Strips the quotes of a string literal and resolves its escapes.
/// Returns `None` when `raw` is not a well formed literal.
pub fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => return None,
            '\\' => out.push(match chars.next()? {
                '0' => '\0',
                'n' => '\n',
                'r' => '\r',
                't' => '\t',
                '"' => '"',
                '\'' => '\'',
                '\\' => '\\',
                'u' => {
                    if chars.next()? != '{' {
                        return None;
                    }
                    let mut code = String::new();
                    loop {
                        match chars.next()? {
                            '}' => break,
                            digit if digit.is_ascii_hexdigit() && code.len() < 8 => {
                                code.push(digit)
                            }
                            _ => return None,
                        }
                    }
                    char::from_u32(u32::from_str_radix(&code, 16).ok()?)?
                }
                _ => return None,
            }),
            c => out.push(c),
        }
    }
    Some(out)
}

/// Quotes `text` as a string literal, escaping what [`unquote`] resolves.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for ChainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("nil"),
            Self::Scalar(raw) => f.write_str(raw),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn malformed(message: impl Into<String>) -> DecodeError {
    DecodeError::Malformed(message.into())
}

impl ChainValue {
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        Self::from_json_value(&serde_json::from_str(text)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        Self::from_json_value(&serde_json::from_slice(bytes)?)
    }

    /// Builds a value tree from the json encoding used by access nodes,
    /// where every node is an object `{"type": ..., "value": ...}`.
    pub fn from_json_value(json: &Json) -> Result<Self, DecodeError> {
        let node = json
            .as_object()
            .ok_or_else(|| malformed(format!("expected a typed node, found {}", json)))?;
        let ty = node
            .get("type")
            .and_then(Json::as_str)
            .ok_or_else(|| malformed("node without a type"))?;
        let value = node.get("value").unwrap_or(&Json::Null);

        match ty {
            "Void" => Ok(Self::Absent),
            "Optional" => match value {
                Json::Null => Ok(Self::Absent),
                inner => Self::from_json_value(inner),
            },
            "Array" => value
                .as_array()
                .ok_or_else(|| malformed("array without elements"))?
                .iter()
                .map(Self::from_json_value)
                .collect::<Result<_, _>>()
                .map(Self::List),
            "Dictionary" => value
                .as_array()
                .ok_or_else(|| malformed("dictionary without entries"))?
                .iter()
                .map(|entry| {
                    let key = entry
                        .get("key")
                        .ok_or_else(|| malformed("dictionary entry without key"))?;
                    let value = entry
                        .get("value")
                        .ok_or_else(|| malformed("dictionary entry without value"))?;
                    Ok((Self::from_json_value(key)?, Self::from_json_value(value)?))
                })
                .collect::<Result<_, DecodeError>>()
                .map(Self::Map),
            "Struct" | "Resource" | "Event" | "Contract" | "Enum" => value
                .get("fields")
                .and_then(Json::as_array)
                .ok_or_else(|| malformed(format!("{} without fields", ty)))?
                .iter()
                .map(|field| {
                    let name = field
                        .get("name")
                        .and_then(Json::as_str)
                        .ok_or_else(|| malformed("field without name"))?;
                    let value = field
                        .get("value")
                        .ok_or_else(|| malformed("field without value"))?;
                    Ok((Self::Scalar(quote(name)), Self::from_json_value(value)?))
                })
                .collect::<Result<_, DecodeError>>()
                .map(Self::Map),
            "String" | "Character" => value
                .as_str()
                .map(|s| Self::Scalar(quote(s)))
                .ok_or_else(|| malformed(format!("{} without text", ty))),
            "Path" => {
                let domain = value.get("domain").and_then(Json::as_str);
                let identifier = value.get("identifier").and_then(Json::as_str);
                match (domain, identifier) {
                    (Some(domain), Some(identifier)) => {
                        Ok(Self::Scalar(format!("/{}/{}", domain, identifier)))
                    }
                    _ => Err(malformed("path without domain or identifier")),
                }
            }
            "Capability" => {
                let path = value.get("path").ok_or_else(|| malformed("capability without path"))?;
                Self::from_json_value(path)
            }
            "Type" => {
                let static_type = value.get("staticType").unwrap_or(&Json::Null);
                let id = match static_type {
                    Json::String(id) => id.clone(),
                    Json::Object(o) => o
                        .get("typeID")
                        .and_then(Json::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    _ => String::new(),
                };
                Ok(Self::Scalar(format!("Type<{}>()", id)))
            }
            _ => Ok(Self::from_untyped(value)),
        }
    }

    /// Value of a node whose kind has no dedicated handling. Objects become
    /// maps of their members and members that are typed nodes are parsed.
    fn from_untyped(value: &Json) -> Self {
        let nested = |value: &Json| {
            Self::from_json_value(value).unwrap_or_else(|_| Self::from_untyped(value))
        };
        match value {
            Json::Null => Self::Absent,
            Json::String(s) => Self::Scalar(s.clone()),
            Json::Bool(b) => Self::Scalar(b.to_string()),
            Json::Number(n) => Self::Scalar(n.to_string()),
            Json::Array(items) => Self::List(items.iter().map(nested).collect()),
            Json::Object(members) => Self::Map(
                members
                    .iter()
                    .map(|(name, value)| (Self::Scalar(quote(name)), nested(value)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for ChainValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = Json::deserialize(deserializer)?;
        Self::from_json_value(&json).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn generic_value() -> impl Strategy<Value = GenericValue> {
        let leaf = prop_oneof![
            Just(GenericValue::Absent),
            any::<String>().prop_map(GenericValue::Text),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(GenericValue::List),
                prop::collection::btree_map(any::<String>(), inner, 0..8)
                    .prop_map(GenericValue::Map),
            ]
        })
    }

    fn chain_value() -> impl Strategy<Value = ChainValue> {
        let leaf = prop_oneof![
            Just(ChainValue::Absent),
            any::<String>().prop_map(ChainValue::Scalar),
            "\"[^\"]*".prop_map(ChainValue::Scalar),
        ];
        leaf.prop_recursive(4, 64, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(ChainValue::List),
                prop::collection::vec((inner.clone(), inner), 0..8).prop_map(ChainValue::Map),
            ]
        })
    }

    #[proptest]
    fn decode_inverts_encode(#[strategy(generic_value())] value: GenericValue) {
        prop_assert_eq!(decode(&encode(&value)), value);
    }

    #[proptest]
    fn decode_is_total(#[strategy(chain_value())] value: ChainValue) {
        // decoding any tree terminates with a value of the same outer shape
        let decoded = decode(&value);
        let same_shape = matches!(
            (&value, &decoded),
            (ChainValue::Absent, GenericValue::Absent)
                | (ChainValue::Scalar(_), GenericValue::Text(_))
                | (ChainValue::List(_), GenericValue::List(_))
                | (ChainValue::Map(_), GenericValue::Map(_))
        );
        prop_assert!(same_shape);
    }

    #[proptest]
    fn quote_roundtrip(text: String) {
        prop_assert_eq!(unquote(&quote(&text)), Some(text));
    }

    #[test]
    fn unquote_fallbacks() {
        assert_eq!(unquote(r#""abc""#), Some("abc".to_string()));
        assert_eq!(unquote(r#""a\"b\u{1F600}""#), Some("a\"b\u{1F600}".to_string()));
        assert_eq!(unquote(r#""unterminated"#), None);
        assert_eq!(unquote(r#""trailing\""#), None);
        assert_eq!(unquote(r#""bad \q escape""#), None);
        assert_eq!(unquote("\""), None);
        assert_eq!(unquote("12.50000000"), None);

        assert_eq!(
            decode(&ChainValue::Scalar(r#""unterminated"#.to_string())),
            GenericValue::Text(r#""unterminated"#.to_string())
        );
        assert_eq!(
            decode(&ChainValue::Scalar("12.50000000".to_string())),
            GenericValue::Text("12.50000000".to_string())
        );
    }

    #[test]
    fn absent_is_not_empty_text() {
        let absent = decode(&ChainValue::Absent);
        let empty = decode(&ChainValue::Scalar("\"\"".to_string()));
        assert_ne!(absent, empty);
        assert_eq!(absent.as_text(), empty.as_text());
        assert!(absent.is_absent());
    }

    #[test]
    fn parse_access_node_values() {
        let value = ChainValue::from_json(
            r#"{
                "type": "Optional",
                "value": {
                    "type": "Dictionary",
                    "value": [
                        {"key": {"type": "String", "value": "name"},
                         "value": {"type": "String", "value": "Flovatar"}},
                        {"key": {"type": "UInt64", "value": "42"},
                         "value": {"type": "Array", "value": [
                            {"type": "UFix64", "value": "12.50000000"},
                            {"type": "Bool", "value": true},
                            {"type": "Optional", "value": null}
                         ]}},
                        {"key": {"type": "String", "value": "owner"},
                         "value": {"type": "Struct", "value": {
                            "id": "A.01.Example.Owner",
                            "fields": [{"name": "address",
                                        "value": {"type": "Address", "value": "0x01"}}]
                         }}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let decoded = decode(&value);
        let map = decoded.as_map().unwrap();
        assert_eq!(map["name"], GenericValue::Text("Flovatar".to_string()));
        assert_eq!(
            map["42"],
            GenericValue::List(vec![
                GenericValue::Text("12.50000000".to_string()),
                GenericValue::Text("true".to_string()),
                GenericValue::Absent,
            ])
        );
        assert_eq!(
            map["owner"].as_map().unwrap()["address"],
            GenericValue::Text("0x01".to_string())
        );
        assert_eq!(map["42"].as_list().unwrap()[1].as_bool(), Some(true));
    }

    #[test]
    fn later_duplicate_keys_win() {
        let value = ChainValue::Map(vec![
            (ChainValue::Scalar(quote("k")), ChainValue::Scalar("1".into())),
            (ChainValue::Scalar("k".into()), ChainValue::Scalar("2".into())),
        ]);
        assert_eq!(
            decode(&value).as_map().unwrap()["k"],
            GenericValue::Text("2".to_string())
        );
    }

    #[test]
    fn non_scalar_keys_use_their_encoded_form() {
        let value = ChainValue::Map(vec![(
            ChainValue::List(vec![ChainValue::Scalar("1".into())]),
            ChainValue::Absent,
        )]);
        assert!(decode(&value).as_map().unwrap().contains_key("[1]"));
    }

    #[test]
    fn reject_malformed_nodes() {
        assert!(ChainValue::from_json(r#"{"value": "1"}"#).is_err());
        assert!(ChainValue::from_json(r#"{"type": "Array", "value": 3}"#).is_err());
        assert!(ChainValue::from_json(r#"[1, 2]"#).is_err());
        assert!(ChainValue::from_json(r#"{"type": "Dictionary", "value": [{"key": {"type": "Int", "value": "1"}}]}"#).is_err());
    }

    #[test]
    fn unknown_kinds_keep_their_members() {
        let function = ChainValue::from_json(
            r#"{"type": "Function", "value": {"functionType": {
                "kind": "Function",
                "typeID": "fun(Int):Int",
                "parameters": [{"label": "x", "id": "x", "type": {"kind": "Int"}}],
                "return": {"kind": "Int"}
            }}}"#,
        )
        .unwrap();
        let decoded = decode(&function);
        let function_type = decoded.as_map().unwrap()["functionType"].as_map().unwrap();
        assert_eq!(function_type["kind"], GenericValue::Text("Function".to_string()));
        assert_eq!(function_type["parameters"].as_list().unwrap().len(), 1);

        let range = ChainValue::from_json(
            r#"{"type": "InclusiveRange", "value": {
                "start": {"type": "Int", "value": "1"},
                "end": {"type": "Int", "value": "10"},
                "step": {"type": "Int", "value": "2"}
            }}"#,
        )
        .unwrap();
        let decoded = decode(&range);
        let range = decoded.as_map().unwrap();
        assert_eq!(range["start"], GenericValue::Text("1".to_string()));
        assert_eq!(range["end"], GenericValue::Text("10".to_string()));
        assert_eq!(range["step"], GenericValue::Text("2".to_string()));
    }

    #[test]
    fn deserialize_paths_and_void() {
        let value: ChainValue = serde_json::from_str(
            r#"{"type": "Path", "value": {"domain": "public", "identifier": "flowTokenBalance"}}"#,
        )
        .unwrap();
        assert_eq!(value, ChainValue::Scalar("/public/flowTokenBalance".to_string()));
        let void: ChainValue = serde_json::from_str(r#"{"type": "Void"}"#).unwrap();
        assert_eq!(void, ChainValue::Absent);
    }
}
