//! Location sources
//!
//! A [`LocationSource`] streams [`LocationBatch`]es through a
//! [`Subscription`]. Dropping the subscription (or cancelling the token it
//! was created with) stops the producer.

mod channel;
mod gate;
mod gpsd;
mod replay;

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub use channel::{ChannelSource, FixSender};
pub use gate::UpdateGate;
pub use gpsd::{GpsdSource, parse_tpv};
pub use replay::{ReplaySource, parse_replay};

use crate::cancel::CancelToken;
use crate::geo::LocationBatch;
use crate::{Error, Result};

/// Buffered batches between a source and its subscriber
pub(crate) const SUBSCRIPTION_CAPACITY: usize = 16;

/// Shortest timer period a source runs, whatever the request says
pub(crate) const MIN_TICK: Duration = Duration::from_millis(10);

/// Accuracy preference for a location request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Best available fix
    #[default]
    HighAccuracy,
    /// City-block level
    Balanced,
    /// Coarse fixes are fine
    LowPower,
}

impl Priority {
    /// Largest reported horizontal error accepted at this priority
    #[must_use]
    pub const fn max_error_m(self) -> f64 {
        match self {
            Self::HighAccuracy => 50.0,
            Self::Balanced => 100.0,
            Self::LowPower => 3000.0,
        }
    }

    /// Whether a fix with the given reported error is acceptable
    ///
    /// Fixes without an error estimate are always accepted.
    #[must_use]
    pub fn accepts(self, accuracy_m: Option<f64>) -> bool {
        accuracy_m.is_none_or(|err| err <= self.max_error_m())
    }
}

impl std::str::FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "high_accuracy" | "high" => Ok(Self::HighAccuracy),
            "balanced" => Ok(Self::Balanced),
            "low_power" | "low" => Ok(Self::LowPower),
            other => Err(Error::Config(format!("unknown location priority: {other}"))),
        }
    }
}

/// Cadence and accuracy of requested updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    /// Accuracy preference
    pub priority: Priority,

    /// Desired interval between fixes
    pub interval: Duration,

    /// Fastest rate at which batches are delivered
    pub min_update_interval: Duration,

    /// Longest a fix may be held back for batching
    pub max_update_delay: Duration,

    /// Hold the first delivery until an accurate fix is available
    pub wait_for_accurate: bool,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_millis(100),
            min_update_interval: Duration::from_millis(3000),
            max_update_delay: Duration::from_millis(100),
            wait_for_accurate: false,
        }
    }
}

impl LocationRequest {
    /// Whether several fixes may be delivered in one batch
    ///
    /// Batching only happens when the allowed delay spans at least two
    /// intervals; otherwise each delivery carries just the newest fix.
    #[must_use]
    pub fn allows_batching(&self) -> bool {
        self.interval
            .checked_mul(2)
            .is_some_and(|two| self.max_update_delay >= two)
    }
}

/// A stream of events from a running service
///
/// Dropping the subscription cancels the producer.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
    cancel: CancelToken,
}

impl<T> Subscription<T> {
    /// Wrap a receiver and the token that stops its producer
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<T>, cancel: CancelToken) -> Self {
        Self { rx, cancel }
    }

    /// Next event, or `None` once the producer has stopped
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Stop the producer and discard pending events
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// Whether this subscription has been cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A provider of location fixes
#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Start delivering fixes according to `request`
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be started
    async fn subscribe(
        &self,
        request: LocationRequest,
        cancel: &CancelToken,
    ) -> Result<Subscription<LocationBatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_request() {
        let request = LocationRequest::default();
        assert_eq!(request.priority, Priority::HighAccuracy);
        assert_eq!(request.min_update_interval, Duration::from_secs(3));
        assert!(!request.wait_for_accurate);
        assert!(!request.allows_batching());
    }

    #[test]
    fn test_batching_needs_two_intervals() {
        let request = LocationRequest {
            interval: Duration::from_secs(1),
            max_update_delay: Duration::from_secs(2),
            ..LocationRequest::default()
        };
        assert!(request.allows_batching());
        assert!(!LocationRequest::default().allows_batching());

        let huge = LocationRequest {
            interval: Duration::MAX,
            max_update_delay: Duration::MAX,
            ..LocationRequest::default()
        };
        assert!(!huge.allows_batching());
    }

    #[test]
    fn test_priority_accepts() {
        assert!(Priority::HighAccuracy.accepts(None));
        assert!(Priority::HighAccuracy.accepts(Some(12.0)));
        assert!(!Priority::HighAccuracy.accepts(Some(80.0)));
        assert!(Priority::LowPower.accepts(Some(80.0)));
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("balanced".parse::<Priority>().unwrap(), Priority::Balanced);
        assert!("fastest".parse::<Priority>().is_err());
    }

    #[tokio::test]
    async fn test_drop_cancels_producer() {
        let (_tx, rx) = mpsc::channel::<u8>(1);
        let token = CancelToken::new();
        let subscription = Subscription::new(rx, token.clone());

        subscription.unsubscribe();
        assert!(token.is_cancelled());
    }
}
