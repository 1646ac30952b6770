//! Chat room timeline engine.
//!
//! This crate turns raw chat messages into per-room, render-ready timelines:
//! day separators, sender grouping, reactions, edits, deletions and saved
//! messages, plus the session and runtime plumbing that feeds it.

/// Calendar-day bucketing, separator labels and injectable clocks.
pub mod calendar;
/// Async command/update channel primitives.
pub mod channel;
/// Engine tuning knobs.
pub mod config;
/// Multi-room timeline store and event dispatch.
pub mod engine;
/// Stable timeline error types.
pub mod error;
/// Raw message to timeline entry conversion.
pub mod normalization;
/// Older-page request debouncing.
pub mod pagination;
/// Tokio event loop that serializes commands per session.
pub mod runtime;
/// Login-scoped engine ownership.
pub mod session;
/// Per-room entry list maintenance.
pub mod timeline;
/// Wire and view types (events, messages, entries).
pub mod types;

pub use calendar::{Clock, DayBoundary, DayContext, FixedClock, SystemClock, separator_label};
pub use channel::{TimelineChannelError, TimelineChannels, UpdateSink, UpdateStream, ViewUpdate};
pub use config::{DEFAULT_PAGINATION_COOLDOWN_MS, EngineConfig};
pub use engine::TimelineEngine;
pub use error::{TimelineError, TimelineErrorCategory};
pub use normalization::{normalize_batch, normalize_message, normalize_timestamp};
pub use pagination::PaginationTracker;
pub use runtime::{RuntimeHandle, spawn_runtime, spawn_runtime_with};
pub use session::Session;
pub use timeline::{RoomTimeline, TimelineView, segment_messages};
pub use types::{
    CurrentUser, MessageContent, MessageEntry, MessageId, MessageKind, NoOpReason,
    OlderPageRequest, RawMessage, RawTimestamp, ReactionGroup, Reactor, RoomMember, RoomMetadata,
    RoomSeed, SessionCommand, SessionState, TimelineChange, TimelineEntry, TimelineEvent,
};
