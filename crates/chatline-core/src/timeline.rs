use std::{collections::HashSet, sync::Arc};

use chrono::NaiveDate;

use crate::{
    calendar::DayContext,
    types::{
        MessageEntry, MessageId, NoOpReason, ReactionGroup, Reactor, RoomMetadata, TimelineChange,
        TimelineEntry,
    },
};

/// Read-only snapshot of a room's entries handed to renderers.
///
/// Later mutations copy on write, so a held view never changes underneath.
pub type TimelineView = Arc<Vec<TimelineEntry>>;

/// Date-segmentation and consecutiveness pass over chronological messages.
///
/// Emits a separator before the first message and before every message whose
/// calendar day differs from the previous one. Sender grouping ignores the
/// separators.
pub fn segment_messages(messages: Vec<MessageEntry>, ctx: &DayContext) -> Vec<TimelineEntry> {
    let mut entries = Vec::with_capacity(messages.len() + 1);
    let mut last_day: Option<NaiveDate> = None;
    let mut last_sender: Option<String> = None;

    for mut message in messages {
        let day = ctx.day_of(message.timestamp);
        if last_day != Some(day) {
            entries.push(TimelineEntry::separator(ctx.label_for(message.timestamp)));
            last_day = Some(day);
        }

        message.consecutive = last_sender.as_deref() == Some(message.sender_uid.as_str());
        last_sender = Some(message.sender_uid.clone());
        entries.push(TimelineEntry::Message(message));
    }

    entries
}

/// One room's ordered entries plus its saved-messages side-list.
#[derive(Debug, Clone)]
pub struct RoomTimeline {
    room_id: String,
    metadata: RoomMetadata,
    entries: TimelineView,
    saved: Vec<MessageId>,
}

impl RoomTimeline {
    /// Build a room from its initial batch.
    pub fn seeded(
        room_id: impl Into<String>,
        metadata: RoomMetadata,
        messages: Vec<MessageEntry>,
        saved_ids: Vec<MessageId>,
        ctx: &DayContext,
    ) -> Self {
        let mut saved: Vec<MessageId> = Vec::with_capacity(saved_ids.len());
        for id in saved_ids {
            if !saved.contains(&id) {
                saved.push(id);
            }
        }

        let mut messages = prepare_batch(messages, &HashSet::new());
        for message in &mut messages {
            message.saved_by_current_user = saved.contains(&message.id);
        }

        Self {
            room_id: room_id.into(),
            metadata,
            entries: Arc::new(segment_messages(messages, ctx)),
            saved,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn metadata(&self) -> &RoomMetadata {
        &self.metadata
    }

    /// Current entries in display order.
    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Cheap shared snapshot of the current entries.
    pub fn view(&self) -> TimelineView {
        Arc::clone(&self.entries)
    }

    pub fn messages(&self) -> impl Iterator<Item = &MessageEntry> {
        self.entries.iter().filter_map(TimelineEntry::as_message)
    }

    pub fn message(&self, id: &MessageId) -> Option<&MessageEntry> {
        self.messages().find(|message| message.id == *id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.position(id).is_some()
    }

    /// Saved message ids in save order, including ones not loaded yet.
    pub fn saved_message_ids(&self) -> &[MessageId] {
        &self.saved
    }

    /// Loaded saved messages in save order.
    pub fn saved_messages(&self) -> Vec<&MessageEntry> {
        self.saved.iter().filter_map(|id| self.message(id)).collect()
    }

    /// Page id of the oldest loaded message, used as the older-page cursor.
    pub fn oldest_page_id(&self) -> Option<&str> {
        self.messages().next().and_then(|message| message.page_id.as_deref())
    }

    /// Append one live message.
    pub fn append(&mut self, mut message: MessageEntry, ctx: &DayContext) -> TimelineChange {
        if self.contains(&message.id) {
            return TimelineChange::NoOp(NoOpReason::DuplicateMessage);
        }
        message.saved_by_current_user = self.saved.contains(&message.id);

        let Some(last) = self.messages().last() else {
            message.consecutive = false;
            self.entries_mut().push(TimelineEntry::Message(message));
            return TimelineChange::Applied;
        };

        if message.timestamp < last.timestamp {
            let mut messages: Vec<MessageEntry> = self.messages().cloned().collect();
            let at = messages.partition_point(|existing| existing.timestamp <= message.timestamp);
            messages.insert(at, message);
            self.rebuild(messages, ctx);
            return TimelineChange::Applied;
        }

        let same_day = ctx.same_day(last.timestamp, message.timestamp);
        message.consecutive = last.sender_uid == message.sender_uid;
        let label = (!same_day).then(|| ctx.label_for(message.timestamp));

        let entries = self.entries_mut();
        if let Some(label) = label
            && !entries.last().is_some_and(TimelineEntry::is_separator)
        {
            entries.push(TimelineEntry::separator(label));
        }
        entries.push(TimelineEntry::Message(message));
        TimelineChange::Applied
    }

    /// Splice an older page in front of the current entries.
    pub fn prepend_page(&mut self, messages: Vec<MessageEntry>, ctx: &DayContext) -> TimelineChange {
        let known: HashSet<MessageId> = self.messages().map(|message| message.id.clone()).collect();
        let mut page = prepare_batch(messages, &known);
        for message in &mut page {
            message.saved_by_current_user = self.saved.contains(&message.id);
        }
        let Some(page_last) = page.last() else {
            return TimelineChange::NoOp(NoOpReason::EmptyPage);
        };

        let Some(current_first) = self.messages().next() else {
            self.entries = Arc::new(segment_messages(page, ctx));
            return TimelineChange::Applied;
        };

        if page_last.timestamp > current_first.timestamp {
            // Page overlaps the loaded window; fall back to a full merge.
            let mut merged = page;
            merged.extend(self.messages().cloned());
            merged.sort_by_key(|message| message.timestamp);
            self.rebuild(merged, ctx);
            return TimelineChange::Applied;
        }

        let same_day = ctx.same_day(page_last.timestamp, current_first.timestamp);
        let seam_label = ctx.label_for(current_first.timestamp);

        let mut current = Arc::unwrap_or_clone(std::mem::take(&mut self.entries));
        let leading_separator = current.first().is_some_and(TimelineEntry::is_separator);
        if same_day && leading_separator {
            current.remove(0);
        } else if !same_day && !leading_separator {
            current.insert(0, TimelineEntry::separator(seam_label));
        }

        let mut merged = segment_messages(page, ctx);
        let seam = merged.len();
        merged.extend(current);
        regroup(&mut merged, seam);
        self.entries = Arc::new(merged);
        TimelineChange::Applied
    }

    /// Toggle `user`'s `kind` reaction on a message.
    pub fn toggle_reaction(&mut self, id: &MessageId, kind: &str, user: &Reactor) -> TimelineChange {
        let Some(message) = self.message_mut(id) else {
            return TimelineChange::NoOp(NoOpReason::UnknownMessage);
        };
        toggle_reactor(&mut message.reactions, kind, user);
        TimelineChange::Applied
    }

    /// Remove a message and any separator it leaves dangling.
    pub fn remove(&mut self, id: &MessageId) -> TimelineChange {
        let Some(idx) = self.position(id) else {
            return TimelineChange::NoOp(NoOpReason::UnknownMessage);
        };

        let entries = self.entries_mut();
        entries.remove(idx);
        let dangling = idx > 0
            && entries[idx - 1].is_separator()
            && entries.get(idx).is_none_or(TimelineEntry::is_separator);
        if dangling {
            entries.remove(idx - 1);
            regroup(entries, idx - 1);
        } else {
            regroup(entries, idx);
        }

        self.saved.retain(|saved| saved != id);
        TimelineChange::Applied
    }

    /// Replace a message's payload and mark it edited.
    pub fn edit(&mut self, id: &MessageId, new_text: impl Into<String>) -> TimelineChange {
        let Some(message) = self.message_mut(id) else {
            return TimelineChange::NoOp(NoOpReason::UnknownMessage);
        };
        message.content.replace_payload(new_text.into());
        message.edited = true;
        TimelineChange::Applied
    }

    /// Flip the current user's saved flag and keep the side-list in step.
    pub fn toggle_saved(&mut self, id: &MessageId) -> TimelineChange {
        let Some(message) = self.message_mut(id) else {
            return TimelineChange::NoOp(NoOpReason::UnknownMessage);
        };
        message.saved_by_current_user = !message.saved_by_current_user;
        let saved = message.saved_by_current_user;

        if saved {
            if !self.saved.contains(id) {
                self.saved.push(id.clone());
            }
        } else {
            self.saved.retain(|existing| existing != id);
        }
        TimelineChange::Applied
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.as_message().is_some_and(|message| message.id == *id))
    }

    fn message_mut(&mut self, id: &MessageId) -> Option<&mut MessageEntry> {
        let idx = self.position(id)?;
        self.entries_mut()[idx].as_message_mut()
    }

    fn entries_mut(&mut self) -> &mut Vec<TimelineEntry> {
        Arc::make_mut(&mut self.entries)
    }

    fn rebuild(&mut self, messages: Vec<MessageEntry>, ctx: &DayContext) {
        self.entries = Arc::new(segment_messages(messages, ctx));
    }
}

/// Recompute `consecutive` for the first message at or after `idx`, comparing
/// against the nearest earlier message across any separators.
fn regroup(entries: &mut [TimelineEntry], idx: usize) {
    let Some(offset) = entries
        .get(idx..)
        .and_then(|tail| tail.iter().position(|entry| entry.as_message().is_some()))
    else {
        return;
    };
    let target = idx + offset;

    let previous_sender = entries[..target]
        .iter()
        .rev()
        .find_map(TimelineEntry::as_message)
        .map(|message| message.sender_uid.clone());

    if let Some(message) = entries[target].as_message_mut() {
        message.consecutive = previous_sender.as_deref() == Some(message.sender_uid.as_str());
    }
}

fn toggle_reactor(groups: &mut Vec<ReactionGroup>, kind: &str, user: &Reactor) {
    let Some(group_idx) = groups.iter().position(|group| group.kind == kind) else {
        groups.push(ReactionGroup {
            kind: kind.to_owned(),
            reactors: vec![user.clone()],
        });
        return;
    };

    let group = &mut groups[group_idx];
    match group.reactors.iter().position(|reactor| reactor.uid == user.uid) {
        Some(reactor_idx) => {
            group.reactors.remove(reactor_idx);
            if group.reactors.is_empty() {
                groups.remove(group_idx);
            }
        }
        None => group.reactors.push(user.clone()),
    }
}

/// Stable-sort by timestamp and drop ids already known or repeated in the batch.
fn prepare_batch(messages: Vec<MessageEntry>, known: &HashSet<MessageId>) -> Vec<MessageEntry> {
    let mut seen = HashSet::new();
    let mut batch: Vec<MessageEntry> = messages
        .into_iter()
        .filter(|message| !known.contains(&message.id) && seen.insert(message.id.clone()))
        .collect();
    batch.sort_by_key(|message| message.timestamp);
    batch
}

/// Check every ordering/separator/grouping/identity rule of a room sequence.
#[cfg(test)]
pub(crate) fn check_invariants(entries: &[TimelineEntry], ctx: &DayContext) -> Result<(), String> {
    let mut ids = HashSet::new();
    let mut previous: Option<&MessageEntry> = None;

    if entries.last().is_some_and(TimelineEntry::is_separator) {
        return Err("sequence ends with a separator".into());
    }

    for (idx, entry) in entries.iter().enumerate() {
        let before = idx.checked_sub(1).map(|prev| &entries[prev]);
        let Some(message) = entry.as_message() else {
            if before.is_some_and(TimelineEntry::is_separator) {
                return Err(format!("adjacent separators at {idx}"));
            }
            continue;
        };

        if !ids.insert(message.id.clone()) {
            return Err(format!("duplicate id {}", message.id));
        }

        if let Some(prev) = previous {
            if message.timestamp < prev.timestamp {
                return Err(format!("message {} is out of order", message.id));
            }
            let same_day = ctx.same_day(prev.timestamp, message.timestamp);
            let directly_after_message = before.is_some_and(|entry| entry.as_message().is_some());
            if same_day != directly_after_message {
                return Err(format!("separator misplaced before message {}", message.id));
            }
        }

        let expected_consecutive =
            previous.is_some_and(|prev| prev.sender_uid == message.sender_uid);
        if message.consecutive != expected_consecutive {
            return Err(format!("wrong consecutive flag on {}", message.id));
        }

        previous = Some(message);
    }

    Ok(())
}
