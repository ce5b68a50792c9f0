//! Inbound update payload model.
//!
//! Only the fields the context lifecycle needs are modelled; unknown fields
//! in the raw payload are ignored on deserialization.

use serde::{Deserialize, Serialize};

/// One inbound event from the messaging service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Service-assigned update id.
    pub update_id: i64,
    /// A new incoming message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// A new version of a known message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    /// A button press on an inline keyboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Parses an update from its raw JSON form.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Returns the message this update carries, whichever variant holds it.
    #[must_use]
    pub fn message(&self) -> Option<&Message> {
        self.message
            .as_ref()
            .or(self.edited_message.as_ref())
            .or_else(|| self.callback_query.as_ref().and_then(|q| q.message.as_ref()))
    }

    /// Returns the conversation this update belongs to.
    #[must_use]
    pub fn chat(&self) -> Option<&Chat> {
        self.message().map(|m| &m.chat)
    }

    /// Returns the conversation id, if the update has one.
    #[must_use]
    pub fn chat_id(&self) -> Option<i64> {
        self.chat().map(|c| c.id)
    }

    /// Returns the sender of the update.
    #[must_use]
    pub fn sender(&self) -> Option<&User> {
        self.callback_query
            .as_ref()
            .map(|q| &q.from)
            .or_else(|| self.message().and_then(|m| m.from.as_ref()))
    }

    /// Returns the message text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        self.message().and_then(|m| m.text.as_deref())
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique inside the chat.
    pub message_id: i64,
    /// Unix time the message was sent.
    #[serde(default)]
    pub date: i64,
    /// Conversation the message belongs to.
    pub chat: Chat,
    /// Sender, empty for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Text of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// A conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Conversation id.
    pub id: i64,
    /// "private", "group", "supergroup" or "channel".
    #[serde(rename = "type", default = "default_chat_kind")]
    pub kind: String,
    /// Title for groups and channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Username for private chats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn default_chat_kind() -> String {
    "private".to_string()
}

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account id.
    pub id: i64,
    /// True for bot accounts.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// An inline keyboard callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Callback id.
    pub id: String,
    /// Who pressed the button.
    pub from: User,
    /// Message the keyboard was attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Payload attached to the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_text_message() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 1,
                "date": 1700000000,
                "chat": {"id": 42, "type": "private"},
                "from": {"id": 7, "is_bot": false, "first_name": "Ann"},
                "text": "/hi"
            }
        }"#;

        let update = Update::from_json(raw).unwrap();
        assert_eq!(update.update_id, 10);
        assert_eq!(update.chat_id(), Some(42));
        assert_eq!(update.text(), Some("/hi"));
        assert_eq!(update.sender().map(|u| u.id), Some(7));
    }

    #[test]
    fn test_callback_query_resolves_chat() {
        let raw = r#"{
            "update_id": 11,
            "callback_query": {
                "id": "cb",
                "from": {"id": 9, "first_name": "Bo"},
                "message": {"message_id": 3, "chat": {"id": -100, "type": "group"}},
                "data": "yes"
            }
        }"#;

        let update = Update::from_json(raw).unwrap();
        assert_eq!(update.chat_id(), Some(-100));
        assert_eq!(update.sender().map(|u| u.id), Some(9));
        assert_eq!(update.text(), None);
    }

    #[test]
    fn test_update_without_chat() {
        let update = Update::from_json(r#"{"update_id": 12, "poll": {}}"#).unwrap();
        assert!(update.chat().is_none());
        assert!(update.chat_id().is_none());
    }
}
