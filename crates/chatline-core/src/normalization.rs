use chrono::{DateTime, Utc};

use crate::{
    error::TimelineError,
    types::{MessageContent, MessageEntry, MessageId, MessageKind, RawMessage, RawTimestamp},
};

/// Convert a raw server timestamp to an absolute instant.
pub fn normalize_timestamp(
    message_id: &MessageId,
    raw: &RawTimestamp,
) -> Result<DateTime<Utc>, TimelineError> {
    match raw {
        RawTimestamp::Structured {
            seconds,
            nanoseconds,
        } => DateTime::from_timestamp(*seconds, *nanoseconds).ok_or_else(|| {
            TimelineError::invalid_timestamp(
                message_id,
                format!("{seconds}s/{nanoseconds}ns is out of range"),
            )
        }),
        RawTimestamp::EpochMillis(millis) => DateTime::from_timestamp_millis(*millis)
            .ok_or_else(|| {
                TimelineError::invalid_timestamp(message_id, format!("{millis}ms is out of range"))
            }),
        RawTimestamp::Text(text) => DateTime::parse_from_rfc3339(text.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| TimelineError::invalid_timestamp(message_id, format!("'{text}': {err}"))),
    }
}

/// Convert a raw record into a message entry for `room_id`.
///
/// Grouping flags are left unset; the segmentation pass owns them.
pub fn normalize_message(raw: RawMessage, room_id: &str) -> Result<MessageEntry, TimelineError> {
    let timestamp = normalize_timestamp(&raw.id, &raw.time)?;
    let content = content_from_wire(raw.kind, raw.payload, raw.file_name);

    Ok(MessageEntry {
        id: raw.id,
        room_id: room_id.to_owned(),
        content,
        sender_uid: raw.sender_uid,
        sender_name: raw.sender_name,
        sender_photo_url: raw.sender_photo_url,
        timestamp,
        page_id: raw.page_id,
        edited: raw.edited,
        consecutive: false,
        reactions: raw.reactions,
        saved_by_current_user: false,
    })
}

/// Normalize a whole batch, rejecting it on the first malformed record.
pub fn normalize_batch(
    raw: Vec<RawMessage>,
    room_id: &str,
) -> Result<Vec<MessageEntry>, TimelineError> {
    raw.into_iter()
        .map(|message| normalize_message(message, room_id))
        .collect()
}

fn content_from_wire(kind: MessageKind, payload: String, file_name: Option<String>) -> MessageContent {
    match kind {
        MessageKind::Text => MessageContent::Text { text: payload },
        MessageKind::Image => MessageContent::Image { url: payload },
        MessageKind::Gif => MessageContent::Gif { url: payload },
        MessageKind::File => {
            let file_name = file_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| file_name_from_url(&payload));
            MessageContent::File {
                url: payload,
                file_name,
            }
        }
    }
}

fn file_name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("file")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::error::TimelineErrorCategory;

    fn raw(kind: MessageKind, payload: &str, time: RawTimestamp) -> RawMessage {
        RawMessage {
            id: MessageId::from(1),
            room_id: "ignored".into(),
            sender_uid: "u1".into(),
            sender_name: "Ann".into(),
            sender_photo_url: String::new(),
            kind,
            payload: payload.into(),
            file_name: None,
            page_id: Some("doc-1".into()),
            time,
            edited: false,
            reactions: Vec::new(),
        }
    }

    #[test]
    fn normalizes_every_timestamp_shape_to_the_same_instant() {
        let expected = Utc
            .with_ymd_and_hms(2024, 1, 1, 10, 0, 0)
            .single()
            .expect("valid instant");
        let id = MessageId::from(1);

        let shapes = [
            RawTimestamp::Structured {
                seconds: expected.timestamp(),
                nanoseconds: 0,
            },
            RawTimestamp::EpochMillis(expected.timestamp_millis()),
            RawTimestamp::Text("2024-01-01T10:00:00Z".into()),
            RawTimestamp::Text("2024-01-01T12:00:00+02:00".into()),
        ];
        for shape in shapes {
            assert_eq!(
                normalize_timestamp(&id, &shape).expect("timestamp should parse"),
                expected
            );
        }
    }

    #[test]
    fn rejects_unparsable_timestamp() {
        let err = normalize_message(
            raw(MessageKind::Text, "hi", RawTimestamp::Text("yesterday-ish".into())),
            "r1",
        )
        .expect_err("bad timestamp must fail");
        assert_eq!(err.category, TimelineErrorCategory::InvalidInput);
        assert_eq!(err.code, "invalid_timestamp");
    }

    #[test]
    fn batch_fails_fast_on_first_bad_record() {
        let batch = vec![
            raw(MessageKind::Text, "ok", RawTimestamp::EpochMillis(0)),
            raw(MessageKind::Text, "bad", RawTimestamp::Text(String::new())),
        ];
        assert!(normalize_batch(batch, "r1").is_err());
    }

    #[test]
    fn assigns_room_and_builds_tagged_content() {
        let entry = normalize_message(
            raw(MessageKind::Gif, "https://media.example.org/cat.gif", RawTimestamp::EpochMillis(0)),
            "r1",
        )
        .expect("should normalize");
        assert_eq!(entry.room_id, "r1");
        assert_eq!(
            entry.content,
            MessageContent::Gif {
                url: "https://media.example.org/cat.gif".into()
            }
        );
        assert!(!entry.consecutive);
    }

    #[test]
    fn file_without_name_falls_back_to_url_tail() {
        let entry = normalize_message(
            raw(
                MessageKind::File,
                "https://cdn.example.org/files/report.pdf?token=abc",
                RawTimestamp::EpochMillis(0),
            ),
            "r1",
        )
        .expect("should normalize");
        assert_eq!(
            entry.content,
            MessageContent::File {
                url: "https://cdn.example.org/files/report.pdf?token=abc".into(),
                file_name: "report.pdf".into(),
            }
        );
    }
}
