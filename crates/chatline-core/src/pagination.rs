use std::collections::{HashMap, HashSet};

/// Suppresses repeated older-page requests while one is in flight or cooling down.
#[derive(Debug, Default, Clone)]
pub struct PaginationTracker {
    in_flight: HashSet<String>,
    last_requested_ms: HashMap<String, u64>,
}

impl PaginationTracker {
    pub fn should_request(&self, room_id: &str, now_ms: u64, cooldown_ms: u64) -> bool {
        if self.in_flight.contains(room_id) {
            return false;
        }

        match self.last_requested_ms.get(room_id) {
            Some(last) => now_ms.saturating_sub(*last) >= cooldown_ms,
            None => true,
        }
    }

    pub fn mark_requested(&mut self, room_id: &str, now_ms: u64) {
        self.in_flight.insert(room_id.to_owned());
        self.last_requested_ms.insert(room_id.to_owned(), now_ms);
    }

    pub fn mark_complete(&mut self, room_id: &str) {
        self.in_flight.remove(room_id);
    }

    /// Forget everything about a room that left the working set.
    pub fn forget(&mut self, room_id: &str) {
        self.in_flight.remove(room_id);
        self.last_requested_ms.remove(room_id);
    }

    pub fn clear(&mut self) {
        self.in_flight.clear();
        self.last_requested_ms.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_always_allowed() {
        let tracker = PaginationTracker::default();
        assert!(tracker.should_request("r1", 0, 750));
    }

    #[test]
    fn respects_in_flight_and_cooldown() {
        let mut tracker = PaginationTracker::default();
        tracker.mark_requested("r1", 1_000);
        assert!(!tracker.should_request("r1", 5_000, 500));

        tracker.mark_complete("r1");
        assert!(!tracker.should_request("r1", 1_300, 500));
        assert!(tracker.should_request("r1", 1_500, 500));
        assert!(tracker.should_request("r2", 1_300, 500));
    }

    #[test]
    fn forgetting_a_room_resets_its_cooldown() {
        let mut tracker = PaginationTracker::default();
        tracker.mark_requested("r1", 1_000);
        tracker.forget("r1");
        assert!(tracker.should_request("r1", 1_001, 500));
    }
}
