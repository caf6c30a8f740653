//! Replays recorded coordinates at the requested cadence

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{LocationRequest, LocationSource, MIN_TICK, SUBSCRIPTION_CAPACITY, Subscription};
use crate::cancel::CancelToken;
use crate::geo::{Fix, Location, LocationBatch};
use crate::{Error, Result};

/// Parse a replay file: one `lat,lng` per line, `#` starts a comment
///
/// # Errors
///
/// Returns error naming the first line that is not a valid coordinate
pub fn parse_replay(content: &str) -> Result<Vec<Location>> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let line = line.split('#').next().unwrap_or_default().trim();
            (!line.is_empty()).then_some((idx + 1, line))
        })
        .map(|(number, line)| {
            line.parse::<Location>()
                .map_err(|e| Error::Location(format!("replay line {number}: {e}")))
        })
        .collect()
}

/// Location source that walks through a recorded track
///
/// One fix is delivered per `min_update_interval`; the subscription ends
/// after the last point.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    points: Vec<Location>,
}

impl ReplaySource {
    /// Create a source from in-memory points
    #[must_use]
    pub const fn new(points: Vec<Location>) -> Self {
        Self { points }
    }

    /// Load a track from a file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or contains invalid lines
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let points = parse_replay(&content)?;

        if points.is_empty() {
            return Err(Error::Location(format!(
                "replay file has no points: {}",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), points = points.len(), "loaded replay track");
        Ok(Self::new(points))
    }
}

#[async_trait]
impl LocationSource for ReplaySource {
    fn name(&self) -> &'static str {
        "replay"
    }

    async fn subscribe(
        &self,
        request: LocationRequest,
        cancel: &CancelToken,
    ) -> Result<Subscription<LocationBatch>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let token = cancel.child();
        let task_token = token.clone();
        let points = self.points.clone();

        tokio::spawn(async move {
            let period = request.min_update_interval.max(request.interval).max(MIN_TICK);
            let mut tick = tokio::time::interval(period);

            for location in points {
                tokio::select! {
                    () = task_token.cancelled() => return,
                    _ = tick.tick() => {}
                }

                if tx.send(LocationBatch::single(Fix::now(location))).await.is_err() {
                    return;
                }
            }

            tracing::info!("replay track finished");
        });

        Ok(Subscription::new(rx, token))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_replay() {
        let points = parse_replay("# walk to the pier\n40.82,29.92\n\n40.83, 29.93 # corner\n").unwrap();
        assert_eq!(points, vec![Location::new(40.82, 29.92), Location::new(40.83, 29.93)]);
    }

    #[test]
    fn test_parse_replay_reports_line() {
        let err = parse_replay("40.82,29.92\nnope\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_emits_each_point() {
        let source = ReplaySource::new(vec![Location::new(1.0, 1.0), Location::new(2.0, 2.0)]);
        let request = LocationRequest {
            min_update_interval: Duration::from_secs(3),
            ..LocationRequest::default()
        };

        let mut sub = source.subscribe(request, &CancelToken::new()).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().latest().location, Location::new(1.0, 1.0));
        assert_eq!(sub.recv().await.unwrap().latest().location, Location::new(2.0, 2.0));
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_intervals_still_replay() {
        let source = ReplaySource::new(vec![Location::new(1.0, 1.0), Location::new(2.0, 2.0)]);
        let request = LocationRequest {
            interval: Duration::ZERO,
            min_update_interval: Duration::ZERO,
            ..LocationRequest::default()
        };

        let mut sub = source.subscribe(request, &CancelToken::new()).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().latest().location, Location::new(1.0, 1.0));
        assert_eq!(sub.recv().await.unwrap().latest().location, Location::new(2.0, 2.0));
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.txt");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(ReplaySource::from_file(&path).is_err());
    }
}
