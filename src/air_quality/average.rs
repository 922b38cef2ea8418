use std::{fmt, num::NonZeroUsize};

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::air_quality::{MachineId, Reading};

pub const DEFAULT_WINDOW_SIZE: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// A finite PM2.5 concentration in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Concentration(f64);

impl Concentration {
    pub fn new(ug_per_m3: f64) -> Result<Self, AverageError> {
        if !ug_per_m3.is_finite() {
            return Err(AverageError::NonFinite(ug_per_m3));
        }

        Ok(Self(ug_per_m3))
    }

    pub fn ug_per_m3(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Concentration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    Concentration(Concentration),
    NoData,
}

impl Average {
    pub fn concentration(&self) -> Option<Concentration> {
        match self {
            Average::Concentration(c) => Some(*c),
            Average::NoData => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum AverageError {
    #[error("average is not a finite number: {0}")]
    NonFinite(f64),
}

/// Mean of the `window_size` most recent usable readings of `machine_id`.
///
/// Readings of other machines are ignored. Malformed readings (missing or
/// non-finite value) are skipped before the window is taken, so the window
/// always holds usable values. Equal timestamps keep their input order.
pub fn trailing_average(
    machine_id: &MachineId,
    readings: &[Reading],
    window_size: NonZeroUsize,
) -> Result<Average, AverageError> {
    let mut usable: Vec<(DateTime<Utc>, f64)> = readings
        .iter()
        .filter(|r| &r.machine_id == machine_id)
        .filter_map(|r| match r.value() {
            Ok(value) => Some((r.time_received, value)),
            Err(err) => {
                warn!(%machine_id, "skipping malformed reading: {err}");
                None
            }
        })
        .collect();

    usable.sort_by_key(|&(time_received, _)| time_received);

    let k = window_size.get().min(usable.len());
    if k == 0 {
        return Ok(Average::NoData);
    }

    let window = &usable[usable.len() - k..];
    let total: f64 = window.iter().map(|&(_, v)| v).sum();
    let mean = if total.is_finite() {
        total / k as f64
    } else {
        // Finite values whose sum overflows still have a finite mean.
        window.iter().map(|&(_, v)| v / k as f64).sum()
    };

    Concentration::new(mean).map(Average::Concentration)
}

/// Validates a mean computed by the upstream query engine.
pub fn server_average(value: Option<f64>) -> Result<Average, AverageError> {
    match value {
        None => Ok(Average::NoData),
        Some(v) => Concentration::new(v).map(Average::Concentration),
    }
}
