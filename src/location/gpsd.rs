//! gpsd client
//!
//! Speaks the gpsd JSON protocol: after `?WATCH` the daemon pushes one JSON
//! object per line; `TPV` objects carry the position.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{
    LocationRequest, LocationSource, MIN_TICK, SUBSCRIPTION_CAPACITY, Subscription, UpdateGate,
};
use crate::cancel::CancelToken;
use crate::geo::{Fix, Location, LocationBatch};
use crate::{Error, Result};

/// Enables JSON streaming on a gpsd connection
const WATCH_COMMAND: &[u8] = b"?WATCH={\"enable\":true,\"json\":true};\n";

/// Time-position-velocity report
#[derive(Debug, Deserialize)]
struct Tpv {
    class: String,
    #[serde(default)]
    mode: u8,
    lat: Option<f64>,
    lon: Option<f64>,
    eph: Option<f64>,
    epx: Option<f64>,
    epy: Option<f64>,
    time: Option<DateTime<Utc>>,
}

/// Parse one gpsd line into a fix
///
/// Returns `None` for other report classes, lines without a 2D fix, and
/// anything that is not valid JSON.
#[must_use]
pub fn parse_tpv(line: &str) -> Option<Fix> {
    let tpv: Tpv = serde_json::from_str(line).ok()?;
    if tpv.class != "TPV" || tpv.mode < 2 {
        return None;
    }

    let location = Location::new(tpv.lat?, tpv.lon?);
    if !location.is_valid() {
        return None;
    }

    let accuracy_m = tpv.eph.or_else(|| match (tpv.epx, tpv.epy) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, y) => x.or(y),
    });

    Some(Fix {
        location,
        accuracy_m,
        timestamp: tpv.time.unwrap_or_else(Utc::now),
    })
}

/// Location source backed by a running gpsd
#[derive(Debug, Clone)]
pub struct GpsdSource {
    addr: String,
}

impl GpsdSource {
    /// Create a source for the gpsd at `addr` (e.g. "127.0.0.1:2947")
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl LocationSource for GpsdSource {
    fn name(&self) -> &'static str {
        "gpsd"
    }

    async fn subscribe(
        &self,
        request: LocationRequest,
        cancel: &CancelToken,
    ) -> Result<Subscription<LocationBatch>> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::Location(format!("failed to connect to gpsd at {}: {e}", self.addr)))?;

        let (read, mut write) = stream.into_split();
        write.write_all(WATCH_COMMAND).await?;

        tracing::info!(addr = %self.addr, "watching gpsd");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let token = cancel.child();
        let task_token = token.clone();

        tokio::spawn(async move {
            // Keep the write half open for the life of the watch
            let _write = write;
            pump(BufReader::new(read), request, tx, task_token).await;
        });

        Ok(Subscription::new(rx, token))
    }
}

/// Read gpsd reports until the stream ends, the subscriber goes away, or
/// the token is cancelled
pub(crate) async fn pump<R>(
    reader: R,
    request: LocationRequest,
    tx: mpsc::Sender<LocationBatch>,
    cancel: CancelToken,
) where
    R: AsyncBufRead + Unpin,
{
    let mut gate = UpdateGate::new(request);
    let mut lines = reader.lines();
    let mut tick = tokio::time::interval(request.interval.max(MIN_TICK));

    loop {
        let batch = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("gpsd watch cancelled");
                break;
            }
            _ = tick.tick() => gate.flush_due(Instant::now()),
            line = lines.next_line() => match line {
                Ok(Some(line)) => parse_tpv(&line).and_then(|fix| gate.offer(fix, Instant::now())),
                Ok(None) => {
                    tracing::warn!("gpsd closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "gpsd read failed");
                    break;
                }
            },
        };

        if let Some(batch) = batch {
            tracing::trace!(fixes = batch.fixes().len(), "delivering location batch");
            if tx.send(batch).await.is_err() {
                break;
            }
        }
    }
}
