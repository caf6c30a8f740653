//! Delivery cadence shared by the location sources

use tokio::time::Instant;

use super::LocationRequest;
use crate::geo::{Fix, LocationBatch};

/// Reported error at or below which a fix counts as accurate
const ACCURATE_FIX_M: f64 = 20.0;

/// Applies a [`LocationRequest`] to a raw stream of fixes
///
/// Filters by priority, holds the first delivery for an accurate fix when
/// asked to, and never delivers faster than `min_update_interval`.
#[derive(Debug)]
pub struct UpdateGate {
    request: LocationRequest,
    pending: Vec<Fix>,
    last_emit: Option<Instant>,
    accurate_seen: bool,
}

impl UpdateGate {
    #[must_use]
    pub const fn new(request: LocationRequest) -> Self {
        Self {
            request,
            pending: Vec::new(),
            last_emit: None,
            accurate_seen: false,
        }
    }

    /// Offer a new fix; returns a batch when one is due
    pub fn offer(&mut self, fix: Fix, now: Instant) -> Option<LocationBatch> {
        if !self.request.priority.accepts(fix.accuracy_m) {
            tracing::trace!(accuracy = ?fix.accuracy_m, "fix below requested accuracy");
            return None;
        }

        if fix.accuracy_m.is_some_and(|err| err <= ACCURATE_FIX_M) {
            self.accurate_seen = true;
        }

        if !self.request.allows_batching() {
            self.pending.clear();
        }
        self.pending.push(fix);

        self.flush_due(now)
    }

    /// Deliver held fixes if the minimum update interval has passed
    pub fn flush_due(&mut self, now: Instant) -> Option<LocationBatch> {
        if self.pending.is_empty() {
            return None;
        }

        if self.request.wait_for_accurate && !self.accurate_seen {
            return None;
        }

        let due = self
            .last_emit
            .is_none_or(|last| now.duration_since(last) >= self.request.min_update_interval);
        if !due {
            return None;
        }

        self.last_emit = Some(now);
        LocationBatch::new(std::mem::take(&mut self.pending))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geo::Location;
    use crate::location::Priority;

    fn fix(lat: f64, accuracy_m: Option<f64>) -> Fix {
        Fix {
            accuracy_m,
            ..Fix::now(Location::new(lat, 29.0))
        }
    }

    #[test]
    fn test_first_fix_delivered_immediately() {
        let mut gate = UpdateGate::new(LocationRequest::default());
        let batch = gate.offer(fix(40.0, None), Instant::now()).unwrap();
        assert_eq!(batch.latest().location.latitude, 40.0);
    }

    #[test]
    fn test_min_interval_holds_newest() {
        let mut gate = UpdateGate::new(LocationRequest::default());
        let start = Instant::now();

        assert!(gate.offer(fix(40.0, None), start).is_some());
        assert!(gate.offer(fix(40.1, None), start + Duration::from_secs(1)).is_none());
        assert!(gate.offer(fix(40.2, None), start + Duration::from_secs(2)).is_none());

        let batch = gate.flush_due(start + Duration::from_secs(3)).unwrap();
        // No batching with the default delay: only the newest fix survives
        assert_eq!(batch.fixes().len(), 1);
        assert_eq!(batch.latest().location.latitude, 40.2);
    }

    #[test]
    fn test_batching_keeps_all_fixes() {
        let request = LocationRequest {
            max_update_delay: Duration::from_secs(5),
            ..LocationRequest::default()
        };
        let mut gate = UpdateGate::new(request);
        let start = Instant::now();

        gate.offer(fix(40.0, None), start);
        gate.offer(fix(40.1, None), start + Duration::from_secs(1));
        let batch = gate
            .offer(fix(40.2, None), start + Duration::from_secs(3))
            .unwrap();
        assert_eq!(batch.fixes().len(), 2);
    }

    #[test]
    fn test_priority_filters_inaccurate() {
        let mut gate = UpdateGate::new(LocationRequest {
            priority: Priority::HighAccuracy,
            ..LocationRequest::default()
        });
        assert!(gate.offer(fix(40.0, Some(500.0)), Instant::now()).is_none());
    }

    #[test]
    fn test_wait_for_accurate() {
        let mut gate = UpdateGate::new(LocationRequest {
            wait_for_accurate: true,
            ..LocationRequest::default()
        });
        let now = Instant::now();

        assert!(gate.offer(fix(40.0, Some(45.0)), now).is_none());
        let batch = gate.offer(fix(40.1, Some(5.0)), now).unwrap();
        assert_eq!(batch.latest().location.latitude, 40.1);
    }
}
