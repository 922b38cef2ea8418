use std::io::Read;

use air_quality_dashboard::{air_quality::Reading, db::ScopedReading};
use anyhow::{Context as _, Result, anyhow, bail};
use chrono::{DateTime, LocalResult, NaiveDateTime, Utc};
use chrono_tz::Tz;
use csv::{Reader, StringRecord};

const MACHINE_ID_COLUMNS: [&str; 2] = ["robot_id", "machine_id"];
const TIME_RECEIVED_COLUMN: &str = "time_received";
const PM_2_5_COLUMNS: [&str; 2] = ["pm_2.5", "pm_2_5"];
const TAGS_COLUMN: &str = "tags";
const LOCATION_ID_COLUMN: &str = "location_id";

const NAIVE_TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Values used for rows that don't carry their own.
#[derive(Debug, Clone)]
pub struct ImportDefaults {
    pub machine_id: Option<String>,
    pub organization_id: String,
    pub location_id: Option<String>,
    pub tag: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    machine_id: Option<usize>,
    time_received: usize,
    pm_2_5: usize,
    tags: Option<usize>,
    location_id: Option<usize>,
}

impl Columns {
    fn detect(header: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| header.iter().position(|h| names.contains(&h.trim()));

        Ok(Self {
            machine_id: find(&MACHINE_ID_COLUMNS),
            time_received: find(&[TIME_RECEIVED_COLUMN])
                .ok_or_else(|| anyhow!("CSV header has no {TIME_RECEIVED_COLUMN} column"))?,
            pm_2_5: find(&PM_2_5_COLUMNS)
                .ok_or_else(|| anyhow!("CSV header has no {} column", PM_2_5_COLUMNS[0]))?,
            tags: find(&[TAGS_COLUMN]),
            location_id: find(&[LOCATION_ID_COLUMN]),
        })
    }
}

#[derive(Debug)]
pub struct CsvReadingIter<R> {
    reader: Reader<R>,
    columns: Columns,
    defaults: ImportDefaults,
}

impl<R: Read> CsvReadingIter<R> {
    pub fn new(input: R, defaults: ImportDefaults) -> Result<Self> {
        let mut reader = Reader::from_reader(input);
        let header = reader.headers().context("failed to read CSV header")?;

        let columns = Columns::detect(header).context("failed to detect CSV columns")?;
        if columns.machine_id.is_none() && defaults.machine_id.is_none() {
            bail!(
                "CSV header has no {} column and no default machine id was given",
                MACHINE_ID_COLUMNS.join(" or ")
            );
        }

        Ok(Self {
            reader,
            columns,
            defaults,
        })
    }

    fn parse_row(&self, row: &StringRecord) -> Result<ScopedReading> {
        let cell = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let machine_id = cell(self.columns.machine_id)
            .or(self.defaults.machine_id.as_deref())
            .ok_or_else(|| anyhow!("missing machine id"))?;

        let raw_time = cell(Some(self.columns.time_received))
            .ok_or_else(|| anyhow!("missing {TIME_RECEIVED_COLUMN}"))?;
        let time_received = parse_timestamp(raw_time, self.defaults.timezone)?;

        let pm_2_5 = parse_pm_2_5(row.get(self.columns.pm_2_5).unwrap_or_default())?;

        let tags = match cell(self.columns.tags) {
            Some(raw) => raw
                .split(';')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect(),
            None => vec![self.defaults.tag.clone()],
        };

        let location_id = cell(self.columns.location_id)
            .map(str::to_owned)
            .or_else(|| self.defaults.location_id.clone());

        Ok(ScopedReading {
            reading: Reading::new(machine_id, time_received, pm_2_5),
            organization_id: self.defaults.organization_id.clone(),
            location_id,
            tags,
        })
    }
}

impl<R: Read> Iterator for CsvReadingIter<R> {
    type Item = Result<ScopedReading>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.reader.records().next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e.into())),
        };

        let line = row.position().map_or(0, |p| p.line());

        Some(
            self.parse_row(&row)
                .with_context(|| format!("invalid reading on line {line}")),
        )
    }
}

/// Parses an RFC 3339 timestamp, or a naive one interpreted in `timezone`.
fn parse_timestamp(raw: &str, timezone: Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in NAIVE_TIMESTAMP_FORMATS {
        let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) else {
            continue;
        };

        let dt = match naive.and_local_timezone(timezone) {
            LocalResult::Single(dt) => dt,
            LocalResult::Ambiguous(dt, _) => dt,
            LocalResult::None => bail!("invalid timestamp in {timezone}: {raw}"),
        };
        return Ok(dt.with_timezone(&Utc));
    }

    bail!("failed to parse timestamp: {raw}")
}

fn parse_pm_2_5(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: f64 = raw
        .parse()
        .with_context(|| format!("failed to parse pm_2.5: {raw}"))?;
    if !value.is_finite() {
        bail!("pm_2.5 is not a finite number: {raw}");
    }

    Ok(Some(value))
}
