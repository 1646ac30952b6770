//! Replays a JSON-lines stream of timeline events and prints the resulting
//! per-room views.

mod config;
mod logging;

use std::{fmt::Write as _, sync::Arc};

use chatline_core::{
    MessageContent, MessageEntry, Session, SessionCommand, SystemClock, TimelineChannelError,
    TimelineEntry, TimelineError, TimelineEvent, UpdateStream, ViewUpdate, spawn_runtime_with,
};
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
    task::JoinError,
};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, ReplayConfig};

#[derive(Debug, Error)]
enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Channel(#[from] TimelineChannelError),
    #[error("background task failed: {0}")]
    Join(#[from] JoinError),
}

/// Side effects observed on the update stream while replaying.
///
/// Room contents are rendered from the final session, not from here, so
/// lagging only affects these counters.
#[derive(Debug, Default)]
struct ReplaySummary {
    rejected: usize,
    older_page_requests: usize,
    missed_updates: u64,
}

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = run().await {
        error!(error = %err, "replay failed");
        eprintln!("chatline-replay: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), ReplayError> {
    let config = ReplayConfig::from_env()?;
    info!(
        input = ?config.input_path,
        day_boundary = %config.engine.day_boundary,
        "starting replay"
    );

    let (handle, runtime_task) = spawn_runtime_with(
        config.engine,
        Arc::new(SystemClock),
        config.event_buffer,
        config.event_buffer,
    );
    let collector = tokio::spawn(collect_updates(handle.subscribe()));

    handle.send(SessionCommand::Login(config.user.clone())).await?;

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &config.input_path {
        Some(path) => Box::new(BufReader::new(File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut ignored = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let Some(event) = decode_line(line_no, &line)? else {
            ignored += usize::from(!line.trim().is_empty());
            continue;
        };
        handle.send(SessionCommand::Event(event)).await?;
    }
    info!(lines = line_no, ignored, "input exhausted");

    drop(handle);
    let session = runtime_task.await?;
    let summary = collector.await?;

    print!("{}", render_session(&session, &summary));
    Ok(())
}

/// Decode one input line. Blank and comment lines yield `None`; undecodable
/// lines are logged and skipped.
fn decode_line(line_no: usize, line: &str) -> Result<Option<TimelineEvent>, ReplayError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    match serde_json::from_str::<TimelineEvent>(trimmed) {
        Ok(event) => Ok(Some(event)),
        Err(err) => {
            let err = TimelineError::serialization(err);
            warn!(line = line_no, code = %err.code, message = %err.message, "skipping event");
            Ok(None)
        }
    }
}

async fn collect_updates(mut updates: UpdateStream) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    loop {
        match updates.recv().await {
            Ok(update) => apply_update(&mut summary, update),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "update collector lagged; rejection counts may be low");
                summary.missed_updates += missed;
            }
            Err(RecvError::Closed) => break,
        }
    }
    summary
}

fn apply_update(summary: &mut ReplaySummary, update: ViewUpdate) {
    match update {
        ViewUpdate::SessionChanged { state } => debug!(?state, "session changed"),
        ViewUpdate::RoomTimeline { room_id, entries } => {
            debug!(%room_id, entries = entries.len(), "room updated");
        }
        ViewUpdate::RoomDropped { room_id } => debug!(%room_id, "room dropped"),
        ViewUpdate::ActiveRoomChanged { room_id } => debug!(?room_id, "active room changed"),
        ViewUpdate::OlderPageRequested(request) => {
            info!(
                room_id = %request.room_id,
                before = ?request.before_page_id,
                "older page requested"
            );
            summary.older_page_requests += 1;
        }
        ViewUpdate::Rejected { code, message, .. } => {
            warn!(%code, %message, "event rejected");
            summary.rejected += 1;
        }
    }
}

fn render_session(session: &Session, summary: &ReplaySummary) -> String {
    let mut out = String::new();
    match session.engine() {
        Ok(engine) => {
            let mut room_ids: Vec<&str> = engine.room_ids().collect();
            room_ids.sort_unstable();

            for room_id in room_ids {
                let Some(room) = engine.room(room_id) else {
                    continue;
                };
                let name = &room.metadata().name;
                let _ = write!(out, "== {room_id}");
                if !name.is_empty() {
                    let _ = write!(out, " ({name})");
                }
                if engine.active_room_id() == Some(room_id) {
                    out.push_str(" [active]");
                }
                out.push_str(" ==\n");

                for entry in room.entries() {
                    match entry {
                        TimelineEntry::DateSeparator { label } => {
                            let _ = writeln!(out, "--- {label} ---");
                        }
                        TimelineEntry::Message(message) => {
                            let _ = writeln!(out, "{}", render_message(message));
                        }
                    }
                }
            }
        }
        Err(_) => {
            let _ = writeln!(out, "(session {:?}; no rooms retained)", session.state());
        }
    }

    if summary.rejected > 0 {
        let _ = writeln!(out, "({} event(s) rejected)", summary.rejected);
    }
    if summary.missed_updates > 0 {
        let _ = writeln!(
            out,
            "({} update(s) missed; counts above are a lower bound)",
            summary.missed_updates
        );
    }
    out
}

fn render_message(message: &MessageEntry) -> String {
    let sender = if message.consecutive {
        String::new()
    } else {
        message.sender_name.clone()
    };
    let mut line = format!(
        "[{}] {:<12} {}",
        message.timestamp.format("%H:%M"),
        sender,
        render_content(&message.content)
    );
    if message.edited {
        line.push_str(" (edited)");
    }
    for group in &message.reactions {
        let _ = write!(line, " [{} x{}]", group.kind, group.reactors.len());
    }
    if message.saved_by_current_user {
        line.push_str(" *saved*");
    }
    line
}

fn render_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text { text } => text.clone(),
        MessageContent::Image { url } => format!("<image {url}>"),
        MessageContent::Gif { url } => format!("<gif {url}>"),
        MessageContent::File { url, file_name } => format!("<file {file_name} {url}>"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{
        CurrentUser, DayBoundary, EngineConfig, FixedClock, MessageId, ReactionGroup, Reactor,
    };
    use chrono::{TimeZone, Utc};

    fn message(id: u64, consecutive: bool) -> MessageEntry {
        MessageEntry {
            id: MessageId::from(id),
            room_id: "r1".into(),
            content: MessageContent::Text { text: "hi".into() },
            sender_uid: "A".into(),
            sender_name: "Ann".into(),
            sender_photo_url: String::new(),
            timestamp: Utc
                .with_ymd_and_hms(2024, 1, 2, 9, 5, 0)
                .single()
                .expect("valid instant"),
            page_id: None,
            edited: false,
            consecutive,
            reactions: Vec::new(),
            saved_by_current_user: false,
        }
    }

    fn logged_in_session() -> Session {
        let now = Utc
            .with_ymd_and_hms(2024, 1, 2, 12, 0, 0)
            .single()
            .expect("valid instant");
        let config = EngineConfig {
            day_boundary: DayBoundary::utc(),
            ..EngineConfig::default()
        };
        let mut session = Session::with_clock(config, Arc::new(FixedClock(now)));
        session
            .login(CurrentUser {
                uid: "u1".into(),
                name: "Ann".into(),
            })
            .expect("login must work");
        session
    }

    fn replay(session: &mut Session, lines: &[&str]) {
        for (idx, line) in lines.iter().enumerate() {
            let event = decode_line(idx + 1, line)
                .expect("decode")
                .expect("event line");
            session.apply(event).expect("event should apply");
        }
    }

    #[test]
    fn decodes_events_and_skips_noise() {
        let line = r#"{"event":"drop_room","room_id":"r1"}"#;
        assert!(matches!(
            decode_line(1, line).expect("decode"),
            Some(TimelineEvent::DropRoom { .. })
        ));
        assert!(decode_line(2, "   ").expect("blank").is_none());
        assert!(decode_line(3, "# comment").expect("comment").is_none());
        assert!(decode_line(4, "{not json").expect("bad json").is_none());
    }

    #[test]
    fn renders_markers_and_hides_consecutive_sender() {
        let mut first = message(1, false);
        first.edited = true;
        first.saved_by_current_user = true;
        first.reactions = vec![ReactionGroup {
            kind: "+1".into(),
            reactors: vec![Reactor::new("B", "Bo")],
        }];
        let second = message(2, true);

        let first_line = render_message(&first);
        assert!(first_line.starts_with("[09:05] Ann"));
        assert!(first_line.ends_with("hi (edited) [+1 x1] *saved*"));

        let second_line = render_message(&second);
        assert!(!second_line.contains("Ann"));
    }

    #[test]
    fn renders_final_room_state_regardless_of_missed_updates() {
        let mut session = logged_in_session();
        replay(
            &mut session,
            &[
                r#"{"event":"seed_room","room_id":"r2","messages":[]}"#,
                r#"{"event":"seed_room","room_id":"r1","name":"Team","messages":[
                    {"chatId":1,"userUid":"A","userName":"Ann","type":"text",
                     "chatInfo":"hi","time":"2024-01-02T09:05:00Z"}]}"#,
                r#"{"event":"set_active_room","room_id":"r1"}"#,
                r#"{"event":"drop_room","room_id":"r2"}"#,
            ],
        );

        let summary = ReplaySummary {
            rejected: 1,
            older_page_requests: 0,
            missed_updates: 3,
        };
        let rendered = render_session(&session, &summary);

        assert!(rendered.starts_with("== r1 (Team) [active] ==\n--- Today ---\n[09:05] Ann"));
        assert!(!rendered.contains("r2"));
        assert!(rendered.contains("(1 event(s) rejected)"));
        assert!(rendered.ends_with("(3 update(s) missed; counts above are a lower bound)\n"));
    }

    #[test]
    fn logged_out_session_renders_no_rooms() {
        let mut session = logged_in_session();
        replay(
            &mut session,
            &[r#"{"event":"seed_room","room_id":"r1","messages":[]}"#],
        );
        session.logout().expect("logout must work");

        let rendered = render_session(&session, &ReplaySummary::default());
        assert_eq!(rendered, "(session LoggedOut; no rooms retained)\n");
    }

    #[test]
    fn collector_counts_rejections_and_page_requests() {
        let mut summary = ReplaySummary::default();
        apply_update(
            &mut summary,
            ViewUpdate::Rejected {
                code: "unknown_room".into(),
                message: "no room".into(),
                recoverable: false,
            },
        );
        apply_update(
            &mut summary,
            ViewUpdate::OlderPageRequested(chatline_core::OlderPageRequest {
                room_id: "r1".into(),
                before_page_id: None,
            }),
        );
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.older_page_requests, 1);
    }
}
