use std::fmt;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MachineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MachineId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One PM2.5 observation as received from the query layer.
///
/// `pm_2_5` is optional because upstream rows may omit the value. Such a
/// reading is malformed and never contributes to an average.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub machine_id: MachineId,

    pub time_received: DateTime<Utc>,

    pub pm_2_5: Option<f64>,
}

impl Reading {
    pub fn new(
        machine_id: impl Into<MachineId>,
        time_received: DateTime<Utc>,
        pm_2_5: Option<f64>,
    ) -> Self {
        Self {
            machine_id: machine_id.into(),
            time_received,
            pm_2_5,
        }
    }

    /// Returns the concentration in µg/m³, or why this reading can't be used.
    pub fn value(&self) -> Result<f64, ReadingError> {
        match self.pm_2_5 {
            None => Err(ReadingError::MissingValue {
                machine_id: self.machine_id.clone(),
                time_received: self.time_received,
            }),
            Some(value) if !value.is_finite() => Err(ReadingError::NonFiniteValue {
                machine_id: self.machine_id.clone(),
                time_received: self.time_received,
                value,
            }),
            Some(value) => Ok(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    #[error("reading from {machine_id} at {time_received} has no pm_2.5 value")]
    MissingValue {
        machine_id: MachineId,
        time_received: DateTime<Utc>,
    },

    #[error("reading from {machine_id} at {time_received} has a non-finite pm_2.5 value: {value}")]
    NonFiniteValue {
        machine_id: MachineId,
        time_received: DateTime<Utc>,
        value: f64,
    },
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone as _;

    use super::*;

    #[test]
    fn value_of_missing_reading_is_an_error() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();
        let reading = Reading::new("m1", at, None);

        assert_matches!(
            reading.value(),
            Err(ReadingError::MissingValue { machine_id, .. }) if machine_id.as_str() == "m1"
        );
    }

    #[test]
    fn value_of_nan_reading_is_an_error() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        assert_matches!(
            Reading::new("m1", at, Some(f64::NAN)).value(),
            Err(ReadingError::NonFiniteValue { .. })
        );
        assert_matches!(
            Reading::new("m1", at, Some(f64::INFINITY)).value(),
            Err(ReadingError::NonFiniteValue { .. })
        );
    }

    #[test]
    fn value_of_valid_reading() {
        let at = Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap();

        assert_eq!(Reading::new("m1", at, Some(8.5)).value(), Ok(8.5));
    }
}
