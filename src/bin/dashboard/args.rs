use std::{num::NonZeroUsize, path::PathBuf};

use air_quality_dashboard::{
    air_quality::DEFAULT_WINDOW_SIZE,
    source::{AggregationStrategy, QueryScope},
};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Average the most recent readings locally.
    TrailingWindow,
    /// Use the mean computed by the database.
    ServerAverage,
}

#[derive(Debug, Parser)]
pub struct Args {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "ORGANIZATION_ID")]
    pub organization_id: String,

    #[arg(long, env = "LOCATION_ID")]
    pub location_id: Option<String>,

    #[arg(long, default_value = "air-quality")]
    pub tag: String,

    /// Discover machines through this fragment instead of their readings.
    #[arg(long)]
    pub fragment_id: Option<String>,

    #[arg(long, value_enum, default_value_t = Strategy::TrailingWindow)]
    pub strategy: Strategy,

    #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: NonZeroUsize,

    /// Ignore readings received more than this many minutes ago.
    #[arg(long)]
    pub lookback_minutes: Option<u32>,

    #[arg(long, env = "TZ", default_value = "UTC")]
    pub timezone: Tz,

    /// Write the HTML here instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Emit only the readings block, not a complete page.
    #[arg(long)]
    pub fragment_only: bool,
}

impl Args {
    pub fn strategy(&self) -> AggregationStrategy {
        match self.strategy {
            Strategy::TrailingWindow => AggregationStrategy::TrailingWindow {
                window_size: self.window_size,
            },
            Strategy::ServerAverage => AggregationStrategy::ServerAverage,
        }
    }

    pub fn scope(&self, now: DateTime<Utc>) -> QueryScope {
        QueryScope {
            tag: self.tag.clone(),
            location_id: self.location_id.clone(),
            received_since: self
                .lookback_minutes
                .map(|m| now - TimeDelta::minutes(i64::from(m))),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        let base = [
            "dashboard",
            "--database-url",
            "postgres://localhost/air",
            "--organization-id",
            "org",
            "--timezone",
            "UTC",
        ];
        Args::try_parse_from(base.iter().chain(args)).unwrap()
    }

    #[test]
    fn defaults_to_trailing_window_of_five() {
        let args = parse(&[]);

        assert_eq!(args.tag, "air-quality");
        assert_eq!(args.strategy(), AggregationStrategy::default());
    }

    #[test]
    fn server_average_and_lookback() {
        let args = parse(&["--strategy", "server-average", "--lookback-minutes", "60"]);
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();

        assert_eq!(args.strategy(), AggregationStrategy::ServerAverage);
        assert_eq!(
            args.scope(now).received_since,
            Some(Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap())
        );
    }

    #[test]
    fn window_size_must_be_positive() {
        let base = [
            "dashboard",
            "--database-url",
            "postgres://localhost/air",
            "--organization-id",
            "org",
            "--window-size",
            "0",
        ];

        assert!(Args::try_parse_from(base).is_err());
    }
}
