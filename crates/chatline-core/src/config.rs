use crate::calendar::DayBoundary;

/// Default cooldown between two older-page requests for the same room.
pub const DEFAULT_PAGINATION_COOLDOWN_MS: u64 = 750;

/// Runtime tuning for the timeline engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Zone used for calendar-day comparisons and separator labels.
    pub day_boundary: DayBoundary,
    /// Minimum gap between older-page requests for one room.
    pub pagination_cooldown_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_boundary: DayBoundary::Local,
            pagination_cooldown_ms: DEFAULT_PAGINATION_COOLDOWN_MS,
        }
    }
}
