use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Stable message identity, unique within a room's lifetime.
///
/// The wire carries either integers (legacy client-generated ids) or strings;
/// both are normalized to their decimal/string form so equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a collision-resistant identifier for a locally created message.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for MessageId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Unsigned(value) => Self(value.to_string()),
            WireId::Signed(value) => Self(value.to_string()),
            WireId::Text(value) => Self(value),
        })
    }
}

/// Wire-level message kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Gif,
    File,
}

/// Server-side timestamp representation, normalized during segmentation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Document-store timestamp object (`{"_seconds": .., "_nanoseconds": ..}`).
    Structured {
        #[serde(rename = "_seconds", alias = "seconds")]
        seconds: i64,
        #[serde(rename = "_nanoseconds", alias = "nanoseconds", default)]
        nanoseconds: u32,
    },
    /// Milliseconds since Unix epoch.
    EpochMillis(i64),
    /// RFC 3339 string, for example `2024-01-01T10:00:00Z`.
    Text(String),
}

/// A user who reacted to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reactor {
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

impl Reactor {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
        }
    }
}

/// All users who reacted to one message with one reaction kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionGroup {
    /// Reaction kind, usually an emoji or its unified code.
    #[serde(alias = "id")]
    pub kind: String,
    /// Reactors in first-reacted order, unique by `uid`.
    pub reactors: Vec<Reactor>,
}

/// Raw message record as delivered by the transport.
///
/// Field aliases accept the camelCase names used by the socket server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawMessage {
    #[serde(alias = "chatId")]
    pub id: MessageId,
    #[serde(alias = "roomId", default)]
    pub room_id: String,
    #[serde(alias = "userUid")]
    pub sender_uid: String,
    #[serde(alias = "userName", default)]
    pub sender_name: String,
    #[serde(alias = "userPhoto", default)]
    pub sender_photo_url: String,
    #[serde(alias = "type")]
    pub kind: MessageKind,
    /// Literal text for `text`, a URL for every other kind.
    #[serde(alias = "chatInfo")]
    pub payload: String,
    #[serde(alias = "fileName", default)]
    pub file_name: Option<String>,
    /// History page (server document) this record was loaded from.
    #[serde(alias = "chatDocId", default)]
    pub page_id: Option<String>,
    pub time: RawTimestamp,
    #[serde(alias = "isMsgEdited", default)]
    pub edited: bool,
    #[serde(default)]
    pub reactions: Vec<ReactionGroup>,
}

/// Message body, one variant per kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageContent {
    Text { text: String },
    Image { url: String },
    Gif { url: String },
    File { url: String, file_name: String },
}

impl MessageContent {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Image { .. } => MessageKind::Image,
            Self::Gif { .. } => MessageKind::Gif,
            Self::File { .. } => MessageKind::File,
        }
    }

    /// Text body or media URL.
    pub fn payload(&self) -> &str {
        match self {
            Self::Text { text } => text,
            Self::Image { url } | Self::Gif { url } | Self::File { url, .. } => url,
        }
    }

    pub(crate) fn replace_payload(&mut self, payload: String) {
        match self {
            Self::Text { text } => *text = payload,
            Self::Image { url } | Self::Gif { url } | Self::File { url, .. } => *url = payload,
        }
    }
}

/// A normalized message in a room timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEntry {
    pub id: MessageId,
    pub room_id: String,
    pub content: MessageContent,
    pub sender_uid: String,
    pub sender_name: String,
    pub sender_photo_url: String,
    pub timestamp: DateTime<Utc>,
    pub page_id: Option<String>,
    pub edited: bool,
    /// Same sender as the nearest earlier message, date separators ignored.
    pub consecutive: bool,
    pub reactions: Vec<ReactionGroup>,
    pub saved_by_current_user: bool,
}

/// One unit of a room's rendered sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEntry {
    Message(MessageEntry),
    DateSeparator { label: String },
}

impl TimelineEntry {
    pub fn separator(label: impl Into<String>) -> Self {
        Self::DateSeparator {
            label: label.into(),
        }
    }

    pub fn as_message(&self) -> Option<&MessageEntry> {
        match self {
            Self::Message(message) => Some(message),
            Self::DateSeparator { .. } => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut MessageEntry> {
        match self {
            Self::Message(message) => Some(message),
            Self::DateSeparator { .. } => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, Self::DateSeparator { .. })
    }
}

/// Room member as delivered with the join payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMember {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo_url: String,
}

/// Display metadata kept alongside a room's timeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub is_group: bool,
    #[serde(alias = "membersData", default)]
    pub members: Vec<RoomMember>,
}

/// Room-join payload used to seed a timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSeed {
    #[serde(alias = "roomId")]
    pub room_id: String,
    #[serde(flatten)]
    pub metadata: RoomMetadata,
    #[serde(default)]
    pub messages: Vec<RawMessage>,
    /// Messages the current user saved earlier, by identity.
    #[serde(default)]
    pub saved_message_ids: Vec<MessageId>,
}

impl RoomSeed {
    pub fn new(room_id: impl Into<String>, messages: Vec<RawMessage>) -> Self {
        Self {
            room_id: room_id.into(),
            metadata: RoomMetadata::default(),
            messages,
            saved_message_ids: Vec::new(),
        }
    }
}

/// Inbound event delivered by the transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// Room joined; seed its timeline.
    SeedRoom(RoomSeed),
    /// One live message for an already seeded room.
    LiveMessage(RawMessage),
    /// Older page fetched on backward scroll.
    HistoryPage {
        room_id: String,
        messages: Vec<RawMessage>,
    },
    /// Reaction toggled by a user.
    Reaction {
        room_id: String,
        message_id: MessageId,
        reaction_kind: String,
        user: Reactor,
    },
    /// Message deleted.
    Delete {
        room_id: String,
        message_id: MessageId,
    },
    /// Message text edited.
    Edit {
        room_id: String,
        message_id: MessageId,
        new_text: String,
    },
    /// Save flag toggled by the current user.
    Save {
        room_id: String,
        message_id: MessageId,
    },
    /// Room left the active working set.
    DropRoom { room_id: String },
    /// Room selected (or deselected) for display.
    SetActiveRoom { room_id: Option<String> },
}

impl TimelineEvent {
    /// Room targeted by this event, when it targets exactly one.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::SeedRoom(seed) => Some(&seed.room_id),
            Self::LiveMessage(message) => Some(&message.room_id),
            Self::HistoryPage { room_id, .. }
            | Self::Reaction { room_id, .. }
            | Self::Delete { room_id, .. }
            | Self::Edit { room_id, .. }
            | Self::Save { room_id, .. }
            | Self::DropRoom { room_id } => Some(room_id),
            Self::SetActiveRoom { room_id } => room_id.as_deref(),
        }
    }
}

/// Why an operation left state untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NoOpReason {
    /// Seed targeted a room that already exists.
    AlreadySeeded,
    /// Room identity was blank.
    InvalidRoomId,
    /// Mutation targeted a room that was never seeded.
    UnknownRoom,
    /// Mutation targeted a message id absent from the room.
    UnknownMessage,
    /// Message id already present in the room.
    DuplicateMessage,
    /// History page carried no new messages.
    EmptyPage,
}

/// Result of applying one timeline operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TimelineChange {
    Applied,
    NoOp(NoOpReason),
}

impl TimelineChange {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Request sent to the transport to fetch the page before the oldest loaded one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OlderPageRequest {
    pub room_id: String,
    /// Page id of the oldest loaded message, `None` when unknown.
    pub before_page_id: Option<String>,
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// No user has logged in yet.
    Cold,
    /// A user is logged in and rooms may be seeded.
    Active,
    /// The user logged out and every room was discarded.
    LoggedOut,
}

/// The logged-in user on whose behalf reactions and saves are rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

/// Command channel input accepted by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionCommand {
    Login(CurrentUser),
    Logout,
    Event(TimelineEvent),
    /// Ask for the page preceding the oldest loaded one.
    RequestOlderPage { room_id: String, now_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_accepts_integer_and_string_on_the_wire() {
        let from_int: MessageId = serde_json::from_str("1704103200123").expect("int id");
        let from_str: MessageId = serde_json::from_str("\"1704103200123\"").expect("str id");
        assert_eq!(from_int, from_str);
        assert_eq!(serde_json::to_string(&from_int).expect("ser"), "\"1704103200123\"");
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(MessageId::generate(), MessageId::generate());
    }

    #[test]
    fn raw_message_accepts_socket_field_names() {
        let raw: RawMessage = serde_json::from_value(serde_json::json!({
            "chatId": 42,
            "roomId": "r1",
            "chatDocId": "doc-7",
            "type": "file",
            "chatInfo": "https://cdn.example.org/report.pdf",
            "fileName": "report.pdf",
            "userUid": "u1",
            "userName": "Ann",
            "userPhoto": "https://cdn.example.org/ann.png",
            "time": { "_seconds": 1_704_103_200, "_nanoseconds": 0 }
        }))
        .expect("raw message should decode");

        assert_eq!(raw.id, MessageId::from(42));
        assert_eq!(raw.kind, MessageKind::File);
        assert_eq!(raw.page_id.as_deref(), Some("doc-7"));
        assert_eq!(
            raw.time,
            RawTimestamp::Structured {
                seconds: 1_704_103_200,
                nanoseconds: 0
            }
        );
    }

    #[test]
    fn decodes_internally_tagged_events() {
        let event: TimelineEvent = serde_json::from_value(serde_json::json!({
            "event": "reaction",
            "room_id": "r1",
            "message_id": 2,
            "reaction_kind": "1f44d",
            "user": { "uid": "u1", "name": "Ann" }
        }))
        .expect("reaction event should decode");

        assert_eq!(event.room_id(), Some("r1"));
        match event {
            TimelineEvent::Reaction {
                message_id, user, ..
            } => {
                assert_eq!(message_id.as_str(), "2");
                assert_eq!(user.uid, "u1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn replace_payload_targets_kind_specific_field() {
        let mut content = MessageContent::File {
            url: "https://a".into(),
            file_name: "a.txt".into(),
        };
        content.replace_payload("https://b".into());
        assert_eq!(content.payload(), "https://b");
        assert_eq!(content.kind(), MessageKind::File);
    }
}
