//! In-process location source fed through a channel

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{LocationRequest, LocationSource, SUBSCRIPTION_CAPACITY, Subscription};
use crate::cancel::CancelToken;
use crate::geo::{Fix, Location, LocationBatch};
use crate::{Error, Result};

/// Handle for pushing fixes into a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct FixSender {
    tx: mpsc::Sender<LocationBatch>,
}

impl FixSender {
    /// Push a single fix observed now
    ///
    /// # Errors
    ///
    /// Returns error if the subscriber is gone
    pub async fn send(&self, location: Location) -> Result<()> {
        self.send_batch(LocationBatch::single(Fix::now(location)))
            .await
    }

    /// Push a prepared batch
    ///
    /// # Errors
    ///
    /// Returns error if the subscriber is gone
    pub async fn send_batch(&self, batch: LocationBatch) -> Result<()> {
        self.tx
            .send(batch)
            .await
            .map_err(|_| Error::Location("location subscriber closed".to_string()))
    }
}

/// Location source driven by the embedding application
///
/// Fixes are forwarded as-is; the request cadence is the sender's concern.
/// Only one subscription may be taken.
#[derive(Debug)]
pub struct ChannelSource {
    rx: Mutex<Option<mpsc::Receiver<LocationBatch>>>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    #[must_use]
    pub fn new() -> (Self, FixSender) {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            FixSender { tx },
        )
    }
}

#[async_trait]
impl LocationSource for ChannelSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn subscribe(
        &self,
        _request: LocationRequest,
        cancel: &CancelToken,
    ) -> Result<Subscription<LocationBatch>> {
        let rx = self
            .rx
            .lock()
            .map_err(|_| Error::Location("channel source lock poisoned".to_string()))?
            .take()
            .ok_or_else(|| Error::Location("channel source already subscribed".to_string()))?;

        Ok(Subscription::new(rx, cancel.child()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_subscription() {
        let (source, sender) = ChannelSource::new();
        let token = CancelToken::new();

        let mut sub = source
            .subscribe(LocationRequest::default(), &token)
            .await
            .unwrap();
        assert!(
            source
                .subscribe(LocationRequest::default(), &token)
                .await
                .is_err()
        );

        sender.send(Location::new(3.0, 4.0)).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().latest().location, Location::new(3.0, 4.0));
    }
}
