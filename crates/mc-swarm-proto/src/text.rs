//! Chat text components.
//!
//! Servers send components as JSON during login and as network NBT from
//! configuration onwards. Bots only ever log them, so this keeps the subset
//! needed to render a readable plain string.

use bytes::Buf;
use mc_swarm_nbt::NbtTag;

use crate::codec::{read_nbt, read_string, ProtoDecode};
use crate::error::ProtoError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextComponent {
    pub text: String,
    pub translate: Option<String>,
    pub with: Vec<TextComponent>,
    pub extra: Vec<TextComponent>,
}

impl TextComponent {
    pub fn literal(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn from_nbt(tag: &NbtTag) -> Self {
        match tag {
            NbtTag::String(s) => Self::literal(s.clone()),
            NbtTag::Compound(c) => {
                let children = |key: &str| -> Vec<TextComponent> {
                    c.get(key)
                        .and_then(NbtTag::as_list)
                        .map(|list| list.iter().map(Self::from_nbt).collect())
                        .unwrap_or_default()
                };
                Self {
                    text: c
                        .get("text")
                        .or_else(|| c.get(""))
                        .and_then(NbtTag::as_string)
                        .unwrap_or_default()
                        .to_string(),
                    translate: c.get("translate").and_then(NbtTag::as_string).map(str::to_string),
                    with: children("with"),
                    extra: children("extra"),
                }
            }
            NbtTag::List(list) => {
                let mut parts = list.iter().map(Self::from_nbt);
                let mut first = parts.next().unwrap_or_default();
                first.extra.extend(parts);
                first
            }
            other => Self::literal(other.to_string()),
        }
    }

    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(s) => Self::literal(s.clone()),
            Value::Object(map) => {
                let children = |key: &str| -> Vec<TextComponent> {
                    map.get(key)
                        .and_then(Value::as_array)
                        .map(|arr| arr.iter().map(Self::from_json).collect())
                        .unwrap_or_default()
                };
                Self {
                    text: map
                        .get("text")
                        .map(|t| match t {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_default(),
                    translate: map.get("translate").and_then(Value::as_str).map(str::to_string),
                    with: children("with"),
                    extra: children("extra"),
                }
            }
            Value::Array(arr) => {
                let mut parts = arr.iter().map(Self::from_json);
                let mut first = parts.next().unwrap_or_default();
                first.extra.extend(parts);
                first
            }
            other => Self::literal(other.to_string()),
        }
    }

    /// Parse a JSON component, falling back to the raw string when it is not JSON.
    pub fn parse_json(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_json(&value),
            Err(_) => Self::literal(raw),
        }
    }

    /// Flatten to plain text. Translation keys are shown with their arguments
    /// since bots ship no language files.
    pub fn to_plain(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        out.push_str(&self.text);
        if let Some(key) = &self.translate {
            out.push_str(key);
            if !self.with.is_empty() {
                let args: Vec<String> = self.with.iter().map(Self::to_plain).collect();
                out.push('(');
                out.push_str(&args.join(", "));
                out.push(')');
            }
        }
        for child in &self.extra {
            child.write_plain(out);
        }
    }
}

impl std::fmt::Display for TextComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_plain())
    }
}

/// NBT-encoded component, as used by configuration and play packets.
impl ProtoDecode for TextComponent {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(read_nbt(buf)?
            .map(|tag| Self::from_nbt(&tag))
            .unwrap_or_default())
    }
}

/// Read a JSON-encoded component string (login phase).
pub fn read_json_component(buf: &mut impl Buf) -> Result<TextComponent, ProtoError> {
    Ok(TextComponent::parse_json(&read_string(buf, 262144)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use mc_swarm_nbt::NbtCompound;

    #[test]
    fn json_with_extra() {
        let c = TextComponent::parse_json(
            r#"{"text":"You are ","extra":[{"text":"banned","color":"red"},"!"]}"#,
        );
        assert_eq!(c.to_plain(), "You are banned!");
    }

    #[test]
    fn json_plain_string() {
        assert_eq!(TextComponent::parse_json(r#""Server closed""#).to_plain(), "Server closed");
        assert_eq!(TextComponent::parse_json("not json").to_plain(), "not json");
    }

    #[test]
    fn json_translate_with_args() {
        let c = TextComponent::parse_json(
            r#"{"translate":"multiplayer.disconnect.duplicate_login","with":["Bot_1"]}"#,
        );
        assert_eq!(c.to_plain(), "multiplayer.disconnect.duplicate_login(Bot_1)");
    }

    #[test]
    fn nbt_compound() {
        let mut c = NbtCompound::new();
        c.insert("text".into(), NbtTag::String("Kicked: ".into()));
        let mut child = NbtCompound::new();
        child.insert("text".into(), NbtTag::String("idle".into()));
        c.insert("extra".into(), NbtTag::List(vec![NbtTag::Compound(child)]));
        assert_eq!(TextComponent::from_nbt(&NbtTag::Compound(c)).to_plain(), "Kicked: idle");
    }

    #[test]
    fn decode_network_string_root() {
        let mut buf = BytesMut::new();
        mc_swarm_nbt::write_nbt_network(&mut buf, Some(&NbtTag::String("bye".into()))).unwrap();
        let c = TextComponent::proto_decode(&mut buf.freeze()).unwrap();
        assert_eq!(c.to_plain(), "bye");
    }
}
