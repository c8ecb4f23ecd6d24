//! Incoming update payload
//!
//! An update is kept as the raw JSON object Telegram posted, so handlers can
//! subscribe to any field by name, with a typed view over `message` for
//! command and text matching.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lookup order used to resolve the chat an update belongs to.
const CHAT_ID_POINTERS: [&str; 3] = [
    "/message/chat/id",
    "/callback_query/message/chat/id",
    "/pre_checkout_query/from/id",
];

/// One decoded webhook update
#[derive(Debug, Clone)]
pub struct Update {
    raw: Value,
    message: Option<Message>,
}

impl Default for Update {
    fn default() -> Self {
        Self {
            raw: Value::Object(Map::new()),
            message: None,
        }
    }
}

impl Update {
    /// Decode a webhook body.
    ///
    /// Anything that is not a JSON object decodes to an empty update.
    pub fn from_slice(body: &[u8]) -> Self {
        serde_json::from_slice::<Value>(body).map_or_else(|_| Self::default(), Self::from_value)
    }

    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        let message = value
            .get("message")
            .filter(|m| !m.is_null())
            .and_then(|m| Message::deserialize(m).ok());
        Self {
            raw: value,
            message,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.raw.as_object().is_none_or(Map::is_empty)
    }

    /// Raw value of a top-level field; JSON `null` counts as absent.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name).filter(|v| !v.is_null())
    }

    pub fn update_id(&self) -> Option<i64> {
        self.raw.get("update_id").and_then(Value::as_i64)
    }

    /// Name of the payload field carried by this update (`message`, `callback_query`, ...)
    pub fn kind(&self) -> Option<&str> {
        self.raw
            .as_object()?
            .iter()
            .find(|(key, value)| key.as_str() != "update_id" && !value.is_null())
            .map(|(key, _)| key.as_str())
    }

    pub const fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub const fn raw(&self) -> &Value {
        &self.raw
    }

    /// Chat this update should be answered in, if any.
    pub fn chat_id(&self) -> Option<i64> {
        CHAT_ID_POINTERS
            .iter()
            .find_map(|pointer| self.raw.pointer(pointer).and_then(Value::as_i64))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub chat: Option<Chat>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
}

impl Message {
    /// Text covered by an entity. `None` when the range falls outside the text
    /// or splits a UTF-16 surrogate pair.
    pub fn entity_text(&self, entity: &MessageEntity) -> Option<&str> {
        let text = self.text.as_deref()?;
        let end = entity.offset.checked_add(entity.length)?;
        let start = utf16_to_byte_index(text, entity.offset)?;
        let end = utf16_to_byte_index(text, end)?;
        text.get(start..end)
    }

    /// Texts of all `bot_command` entities, in entity order.
    pub fn bot_commands(&self) -> impl Iterator<Item = &str> {
        self.entities
            .iter()
            .filter(|entity| entity.is_bot_command())
            .filter_map(|entity| self.entity_text(entity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units
    pub offset: usize,
    /// Length in UTF-16 code units
    pub length: usize,
}

impl MessageEntity {
    pub fn is_bot_command(&self) -> bool {
        self.kind == "bot_command"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Chat {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Map a UTF-16 code unit position onto a byte index of `text`.
fn utf16_to_byte_index(text: &str, target: usize) -> Option<usize> {
    let mut units = 0;
    for (index, ch) in text.char_indices() {
        if units == target {
            return Some(index);
        }
        if units > target {
            return None;
        }
        units += ch.len_utf16();
    }
    (units == target).then_some(text.len())
}
