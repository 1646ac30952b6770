//! Per-room timeline engine.
//!
//! Owns every room's entry sequence and saved-messages side-list. All changes
//! go through the operations below; callers only ever see [`TimelineView`]
//! snapshots.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, trace, warn};

use crate::{
    calendar::{Clock, DayContext, SystemClock},
    config::EngineConfig,
    error::TimelineError,
    normalization::{normalize_batch, normalize_message},
    pagination::PaginationTracker,
    timeline::{RoomTimeline, TimelineView},
    types::{
        MessageId, NoOpReason, OlderPageRequest, RawMessage, Reactor, RoomSeed, TimelineChange,
        TimelineEvent,
    },
};

#[derive(Debug, Clone)]
pub struct TimelineEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    rooms: HashMap<String, RoomTimeline>,
    active_room_id: Option<String>,
    pagination: PaginationTracker,
}

impl TimelineEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Engine whose separator labels are computed against `clock`.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            rooms: HashMap::new(),
            active_room_id: None,
            pagination: PaginationTracker::default(),
        }
    }

    pub fn room(&self, room_id: &str) -> Option<&RoomTimeline> {
        self.rooms.get(room_id)
    }

    /// Snapshot of a room's entries for rendering.
    pub fn view(&self, room_id: &str) -> Option<TimelineView> {
        self.rooms.get(room_id).map(RoomTimeline::view)
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &str> {
        self.rooms.keys().map(String::as_str)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn active_room_id(&self) -> Option<&str> {
        self.active_room_id.as_deref()
    }

    pub fn active_room(&self) -> Option<&RoomTimeline> {
        self.active_room_id
            .as_deref()
            .and_then(|room_id| self.rooms.get(room_id))
    }

    /// Seed a room from its initial chronological batch.
    pub fn seed_room(
        &mut self,
        room_id: &str,
        raw_messages: Vec<RawMessage>,
    ) -> Result<TimelineChange, TimelineError> {
        self.seed_room_with(RoomSeed::new(room_id, raw_messages))
    }

    /// Seed a room from a full join payload. Idempotent per room.
    pub fn seed_room_with(&mut self, seed: RoomSeed) -> Result<TimelineChange, TimelineError> {
        if seed.room_id.trim().is_empty() {
            debug!("ignoring seed with blank room id");
            return Ok(TimelineChange::NoOp(NoOpReason::InvalidRoomId));
        }
        if self.rooms.contains_key(&seed.room_id) {
            trace!(room_id = %seed.room_id, "room already seeded");
            return Ok(TimelineChange::NoOp(NoOpReason::AlreadySeeded));
        }

        let ctx = self.day_context();
        let messages = normalize_batch(seed.messages, &seed.room_id)?;
        let room = RoomTimeline::seeded(
            seed.room_id.clone(),
            seed.metadata,
            messages,
            seed.saved_message_ids,
            &ctx,
        );
        debug!(
            room_id = %seed.room_id,
            entry_count = room.entries().len(),
            "room seeded"
        );
        self.rooms.insert(seed.room_id, room);
        Ok(TimelineChange::Applied)
    }

    /// Append one live message to an already seeded room.
    pub fn append_live(&mut self, raw: RawMessage) -> Result<TimelineChange, TimelineError> {
        let ctx = self.day_context();
        let room_id = raw.room_id.clone();
        let Some(room) = self.rooms.get_mut(&room_id) else {
            warn!(%room_id, message_id = %raw.id, "live message for unseeded room");
            return Err(TimelineError::unknown_room(&room_id, "append_live"));
        };

        let message = normalize_message(raw, &room_id)?;
        if room
            .messages()
            .last()
            .is_some_and(|last| message.timestamp < last.timestamp)
        {
            warn!(
                %room_id,
                message_id = %message.id,
                "live message older than room tail; re-segmenting"
            );
        }

        let message_id = message.id.clone();
        let change = room.append(message, &ctx);
        trace!(%room_id, %message_id, ?change, "live message applied");
        Ok(change)
    }

    /// Splice an older page in front of a room's entries.
    pub fn prepend_history_page(
        &mut self,
        room_id: &str,
        older_raw_messages: Vec<RawMessage>,
    ) -> Result<TimelineChange, TimelineError> {
        self.pagination.mark_complete(room_id);
        let ctx = self.day_context();
        let Some(room) = self.rooms.get_mut(room_id) else {
            debug!(%room_id, "history page for unknown room");
            return Ok(TimelineChange::NoOp(NoOpReason::UnknownRoom));
        };

        let messages = normalize_batch(older_raw_messages, room_id)?;
        let page_len = messages.len();
        let change = room.prepend_page(messages, &ctx);
        debug!(%room_id, page_len, ?change, "history page merged");
        Ok(change)
    }

    /// Toggle `acting_user`'s reaction of `reaction_kind` on a message.
    pub fn apply_reaction_toggle(
        &mut self,
        room_id: &str,
        message_id: &MessageId,
        reaction_kind: &str,
        acting_user: &Reactor,
    ) -> TimelineChange {
        self.mutate(room_id, message_id, "reaction", |room| {
            room.toggle_reaction(message_id, reaction_kind, acting_user)
        })
    }

    pub fn apply_delete(&mut self, room_id: &str, message_id: &MessageId) -> TimelineChange {
        self.mutate(room_id, message_id, "delete", |room| room.remove(message_id))
    }

    /// Replace a message's payload. Kind is not enforced here.
    pub fn apply_edit(
        &mut self,
        room_id: &str,
        message_id: &MessageId,
        new_text: &str,
    ) -> TimelineChange {
        self.mutate(room_id, message_id, "edit", |room| {
            room.edit(message_id, new_text)
        })
    }

    pub fn apply_save_toggle(&mut self, room_id: &str, message_id: &MessageId) -> TimelineChange {
        self.mutate(room_id, message_id, "save", |room| room.toggle_saved(message_id))
    }

    /// Discard a room that left the working set.
    pub fn drop_room(&mut self, room_id: &str) -> TimelineChange {
        if self.rooms.remove(room_id).is_none() {
            return TimelineChange::NoOp(NoOpReason::UnknownRoom);
        }
        self.pagination.forget(room_id);
        if self.active_room_id.as_deref() == Some(room_id) {
            self.active_room_id = None;
        }
        debug!(%room_id, "room dropped");
        TimelineChange::Applied
    }

    /// Discard every room.
    pub fn clear(&mut self) {
        debug!(room_count = self.rooms.len(), "clearing all rooms");
        self.rooms.clear();
        self.active_room_id = None;
        self.pagination.clear();
    }

    /// Select a seeded room for display, or deselect with `None`.
    pub fn set_active_room(&mut self, room_id: Option<String>) -> TimelineChange {
        if let Some(room_id) = &room_id
            && !self.rooms.contains_key(room_id)
        {
            return TimelineChange::NoOp(NoOpReason::UnknownRoom);
        }
        self.active_room_id = room_id;
        TimelineChange::Applied
    }

    /// Build the request for the page preceding the oldest loaded one.
    ///
    /// Returns `None` for unknown or empty rooms, while a request is in
    /// flight, and during the cooldown window.
    pub fn older_page_request(&mut self, room_id: &str, now_ms: u64) -> Option<OlderPageRequest> {
        let room = self.rooms.get(room_id)?;
        room.messages().next()?;
        if !self
            .pagination
            .should_request(room_id, now_ms, self.config.pagination_cooldown_ms)
        {
            trace!(%room_id, "older page request suppressed");
            return None;
        }

        let before_page_id = room.oldest_page_id().map(str::to_owned);
        self.pagination.mark_requested(room_id, now_ms);
        debug!(%room_id, ?before_page_id, "requesting older page");
        Some(OlderPageRequest {
            room_id: room_id.to_owned(),
            before_page_id,
        })
    }

    /// Route one inbound transport event to the matching operation.
    pub fn apply(&mut self, event: TimelineEvent) -> Result<TimelineChange, TimelineError> {
        match event {
            TimelineEvent::SeedRoom(seed) => self.seed_room_with(seed),
            TimelineEvent::LiveMessage(message) => self.append_live(message),
            TimelineEvent::HistoryPage { room_id, messages } => {
                self.prepend_history_page(&room_id, messages)
            }
            TimelineEvent::Reaction {
                room_id,
                message_id,
                reaction_kind,
                user,
            } => Ok(self.apply_reaction_toggle(&room_id, &message_id, &reaction_kind, &user)),
            TimelineEvent::Delete {
                room_id,
                message_id,
            } => Ok(self.apply_delete(&room_id, &message_id)),
            TimelineEvent::Edit {
                room_id,
                message_id,
                new_text,
            } => Ok(self.apply_edit(&room_id, &message_id, &new_text)),
            TimelineEvent::Save {
                room_id,
                message_id,
            } => Ok(self.apply_save_toggle(&room_id, &message_id)),
            TimelineEvent::DropRoom { room_id } => Ok(self.drop_room(&room_id)),
            TimelineEvent::SetActiveRoom { room_id } => Ok(self.set_active_room(room_id)),
        }
    }

    fn mutate<F>(
        &mut self,
        room_id: &str,
        message_id: &MessageId,
        action: &'static str,
        apply: F,
    ) -> TimelineChange
    where
        F: FnOnce(&mut RoomTimeline) -> TimelineChange,
    {
        let Some(room) = self.rooms.get_mut(room_id) else {
            debug!(%room_id, %message_id, action, "mutation for unknown room ignored");
            return TimelineChange::NoOp(NoOpReason::UnknownRoom);
        };

        let change = apply(room);
        if change.is_applied() {
            trace!(%room_id, %message_id, action, "mutation applied");
        } else {
            debug!(%room_id, %message_id, action, ?change, "mutation ignored");
        }
        change
    }

    fn day_context(&self) -> DayContext {
        DayContext::new(self.config.day_boundary, self.clock.now())
    }
}
