//! Single-consumer event loop around a [`Session`].
//!
//! Commands are drained one at a time, so events for the same room are always
//! applied in delivery order. When the command channel closes the task hands
//! its final [`Session`] back through the join handle.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::{
    calendar::{Clock, SystemClock},
    channel::{TimelineChannelError, TimelineChannels, UpdateSink, UpdateStream, ViewUpdate},
    config::EngineConfig,
    error::TimelineError,
    session::Session,
    types::{SessionCommand, TimelineEvent},
};

const DEFAULT_COMMAND_BUFFER: usize = 128;
const DEFAULT_UPDATE_BUFFER: usize = 512;

/// Caller-side handle of a running timeline runtime.
///
/// Dropping every handle closes the command channel and stops the runtime.
#[derive(Clone, Debug)]
pub struct RuntimeHandle {
    channels: TimelineChannels,
}

impl RuntimeHandle {
    pub fn subscribe(&self) -> UpdateStream {
        self.channels.subscribe()
    }

    pub async fn send(&self, command: SessionCommand) -> Result<(), TimelineChannelError> {
        self.channels.send_command(command).await
    }
}

/// Spawn a runtime with default buffer sizes and the system clock.
pub fn spawn_runtime(config: EngineConfig) -> (RuntimeHandle, JoinHandle<Session>) {
    spawn_runtime_with(
        config,
        Arc::new(SystemClock),
        DEFAULT_COMMAND_BUFFER,
        DEFAULT_UPDATE_BUFFER,
    )
}

pub fn spawn_runtime_with(
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    command_buffer: usize,
    update_buffer: usize,
) -> (RuntimeHandle, JoinHandle<Session>) {
    let (channels, updates, command_rx) = TimelineChannels::new(command_buffer, update_buffer);
    let runtime = TimelineRuntime {
        updates,
        command_rx,
        session: Session::with_clock(config, clock),
    };
    let task = tokio::spawn(runtime.run());

    (RuntimeHandle { channels }, task)
}

enum EventScope {
    Timeline(Option<String>),
    Drop(String),
    Selection(Option<String>),
}

struct TimelineRuntime {
    updates: UpdateSink,
    command_rx: mpsc::Receiver<SessionCommand>,
    session: Session,
}

impl TimelineRuntime {
    async fn run(mut self) -> Session {
        while let Some(command) = self.command_rx.recv().await {
            if let Err(err) = self.handle_command(command) {
                warn!(code = %err.code, message = %err.message, "command rejected");
                self.emit(ViewUpdate::Rejected {
                    recoverable: err.is_recoverable(),
                    code: err.code,
                    message: err.message,
                });
            }
        }
        debug!("command channel closed; timeline runtime stopping");
        self.session
    }

    fn handle_command(&mut self, command: SessionCommand) -> Result<(), TimelineError> {
        match command {
            SessionCommand::Login(user) => {
                self.session.login(user)?;
                self.emit_session_state();
            }
            SessionCommand::Logout => {
                self.session.logout()?;
                self.emit_session_state();
            }
            SessionCommand::Event(event) => self.handle_event(event)?,
            SessionCommand::RequestOlderPage { room_id, now_ms } => {
                let request = self
                    .session
                    .engine_mut()?
                    .older_page_request(&room_id, now_ms);
                if let Some(request) = request {
                    self.emit(ViewUpdate::OlderPageRequested(request));
                }
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: TimelineEvent) -> Result<(), TimelineError> {
        let scope = match &event {
            TimelineEvent::DropRoom { room_id } => EventScope::Drop(room_id.clone()),
            TimelineEvent::SetActiveRoom { room_id } => EventScope::Selection(room_id.clone()),
            other => EventScope::Timeline(other.room_id().map(str::to_owned)),
        };

        let change = self.session.apply(event)?;
        if !change.is_applied() {
            return Ok(());
        }

        match scope {
            EventScope::Timeline(Some(room_id)) => {
                if let Some(entries) = self.session.engine()?.view(&room_id) {
                    self.emit(ViewUpdate::RoomTimeline { room_id, entries });
                }
            }
            EventScope::Timeline(None) => {}
            EventScope::Drop(room_id) => self.emit(ViewUpdate::RoomDropped { room_id }),
            EventScope::Selection(room_id) => {
                self.emit(ViewUpdate::ActiveRoomChanged { room_id })
            }
        }
        Ok(())
    }

    fn emit_session_state(&self) {
        self.emit(ViewUpdate::SessionChanged {
            state: self.session.state(),
        });
    }

    fn emit(&self, update: ViewUpdate) {
        let reached = self.updates.emit(update);
        if reached == 0 {
            debug!("view update had no subscribers");
        }
    }
}
