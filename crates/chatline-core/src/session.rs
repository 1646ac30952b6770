use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    calendar::{Clock, SystemClock},
    config::EngineConfig,
    engine::TimelineEngine,
    error::TimelineError,
    types::{CurrentUser, SessionState, TimelineChange, TimelineEvent},
};

/// Login-scoped owner of the timeline engine.
///
/// The engine only exists while a user is logged in; logout discards every
/// room so nothing leaks into the next session.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    user: Option<CurrentUser>,
    engine: Option<TimelineEngine>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: SessionState::Cold,
            config,
            clock,
            user: None,
            engine: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&CurrentUser> {
        self.user.as_ref()
    }

    pub fn login(&mut self, user: CurrentUser) -> Result<(), TimelineError> {
        if !matches!(self.state, SessionState::Cold | SessionState::LoggedOut) {
            return Err(TimelineError::invalid_state(self.state, "login"));
        }

        info!(uid = %user.uid, "session started");
        self.engine = Some(TimelineEngine::with_clock(
            self.config,
            Arc::clone(&self.clock),
        ));
        self.user = Some(user);
        self.state = SessionState::Active;
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), TimelineError> {
        if self.state != SessionState::Active {
            return Err(TimelineError::invalid_state(self.state, "logout"));
        }

        if let Some(mut engine) = self.engine.take() {
            engine.clear();
        }
        if let Some(user) = self.user.take() {
            info!(uid = %user.uid, "session ended");
        }
        self.state = SessionState::LoggedOut;
        Ok(())
    }

    pub fn engine(&self) -> Result<&TimelineEngine, TimelineError> {
        self.engine
            .as_ref()
            .ok_or_else(|| TimelineError::invalid_state(self.state, "read timeline"))
    }

    pub fn engine_mut(&mut self) -> Result<&mut TimelineEngine, TimelineError> {
        let state = self.state;
        self.engine
            .as_mut()
            .ok_or_else(|| TimelineError::invalid_state(state, "timeline operation"))
    }

    /// Apply one inbound event to the logged-in engine.
    pub fn apply(&mut self, event: TimelineEvent) -> Result<TimelineChange, TimelineError> {
        let engine = self.engine_mut()?;
        let change = engine.apply(event)?;
        debug!(?change, "session applied event");
        Ok(change)
    }
}
