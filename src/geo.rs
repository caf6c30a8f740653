//! Coordinates and location fixes

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// Create a location from latitude and longitude
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both coordinates are inside their valid ranges
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Location {
    type Err = crate::Error;

    /// Parse `"lat,lng"` (whitespace around either part is ignored)
    fn from_str(s: &str) -> crate::Result<Self> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| crate::Error::Location(format!("expected \"lat,lng\", got {s:?}")))?;

        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| crate::Error::Location(format!("invalid coordinate {part:?}: {e}")))
        };

        let location = Self::new(parse(lat)?, parse(lng)?);
        if !location.is_valid() {
            return Err(crate::Error::Location(format!(
                "coordinates out of range: {location}"
            )));
        }

        Ok(location)
    }
}

/// One reported observation from a location source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fix {
    pub location: Location,
    /// Estimated horizontal error in meters, when the source reports one
    pub accuracy_m: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// A fix observed now with unknown accuracy
    #[must_use]
    pub fn now(location: Location) -> Self {
        Self {
            location,
            accuracy_m: None,
            timestamp: Utc::now(),
        }
    }
}

/// A delivery of one or more fixes from a location source
///
/// Sources may batch observations; consumers only act on the most recent.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationBatch {
    fixes: Vec<Fix>,
}

impl LocationBatch {
    /// Build a batch, returning `None` when there are no fixes
    #[must_use]
    pub fn new(fixes: Vec<Fix>) -> Option<Self> {
        if fixes.is_empty() {
            None
        } else {
            Some(Self { fixes })
        }
    }

    /// Batch holding a single fix
    #[must_use]
    pub fn single(fix: Fix) -> Self {
        Self { fixes: vec![fix] }
    }

    /// The most recent fix in the batch
    #[must_use]
    pub fn latest(&self) -> &Fix {
        // Invariant: constructors never produce an empty batch
        &self.fixes[self.fixes.len() - 1]
    }

    /// All fixes, oldest first
    #[must_use]
    pub fn fixes(&self) -> &[Fix] {
        &self.fixes
    }
}
