use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::{
    timeline::TimelineView,
    types::{OlderPageRequest, SessionCommand, SessionState},
};

/// Receiver for view updates; every subscriber gets its own copy.
pub type UpdateStream = broadcast::Receiver<ViewUpdate>;

#[derive(Debug, Error)]
pub enum TimelineChannelError {
    #[error("timeline runtime is no longer accepting commands")]
    CommandChannelClosed,
}

/// Output emitted by the runtime after each command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// Session lifecycle transition.
    SessionChanged { state: SessionState },
    /// Fresh snapshot of one room's entries.
    RoomTimeline {
        room_id: String,
        entries: TimelineView,
    },
    /// Room left the working set.
    RoomDropped { room_id: String },
    /// Active room selection changed.
    ActiveRoomChanged { room_id: Option<String> },
    /// The transport should fetch the page before the oldest loaded one.
    OlderPageRequested(OlderPageRequest),
    /// A command was rejected.
    Rejected {
        code: String,
        message: String,
        recoverable: bool,
    },
}

/// Caller half: submits commands and hands out update subscriptions.
///
/// The runtime never holds this half, so once every clone is dropped the
/// command receiver drains and closes.
#[derive(Clone, Debug)]
pub struct TimelineChannels {
    command_tx: mpsc::Sender<SessionCommand>,
    update_tx: broadcast::Sender<ViewUpdate>,
}

/// Runtime half of the update fan-out.
#[derive(Clone, Debug)]
pub struct UpdateSink {
    update_tx: broadcast::Sender<ViewUpdate>,
}

impl TimelineChannels {
    /// Build both halves plus the command receiver the runtime drains.
    pub fn new(
        command_buffer: usize,
        update_buffer: usize,
    ) -> (Self, UpdateSink, mpsc::Receiver<SessionCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (update_tx, _) = broadcast::channel(update_buffer.max(1));
        let sink = UpdateSink {
            update_tx: update_tx.clone(),
        };

        (
            Self {
                command_tx,
                update_tx,
            },
            sink,
            command_rx,
        )
    }

    pub fn subscribe(&self) -> UpdateStream {
        self.update_tx.subscribe()
    }

    pub async fn send_command(&self, command: SessionCommand) -> Result<(), TimelineChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| TimelineChannelError::CommandChannelClosed)
    }
}

impl UpdateSink {
    /// Publish to current subscribers and return how many were reached.
    ///
    /// With nobody subscribed the update is dropped and `0` is returned.
    pub fn emit(&self, update: ViewUpdate) -> usize {
        self.update_tx.send(update).unwrap_or(0)
    }
}
