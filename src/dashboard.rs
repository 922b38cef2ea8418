use tracing::{debug, info, warn};

use crate::{
    air_quality::{
        AggregateResult, Average, AverageError, Machine, server_average, trailing_average,
    },
    source::{AggregationStrategy, QueryError, QueryScope, ReadingSource},
};

#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    InvalidAverage(#[from] AverageError),
}

pub async fn aggregate_machine<S: ReadingSource>(
    source: &S,
    machine: &Machine,
    scope: &QueryScope,
    strategy: AggregationStrategy,
) -> Result<Average, MachineError> {
    let average = match strategy {
        AggregationStrategy::TrailingWindow { window_size } => {
            let readings = source.readings(machine, scope).await?;
            trailing_average(&machine.id, &readings, window_size)?
        }
        AggregationStrategy::ServerAverage => {
            let value = source.server_average(machine, scope).await?;
            server_average(value)?
        }
    };

    Ok(average)
}

/// Runs one dashboard pass, one machine at a time.
///
/// A failure for one machine is logged and shown as unavailable; the other
/// machines are still processed.
pub async fn build_dashboard<S: ReadingSource>(
    source: &S,
    machines: impl IntoIterator<Item = Machine>,
    scope: &QueryScope,
    strategy: AggregationStrategy,
) -> Vec<AggregateResult> {
    let mut results = Vec::new();

    for machine in machines {
        let result = match aggregate_machine(source, &machine, scope, strategy).await {
            Ok(average) => AggregateResult::new(machine, average),
            Err(err) => {
                warn!(machine_id = %machine.id, "failed to aggregate machine: {err:#}");
                AggregateResult::unavailable(machine)
            }
        };

        debug!(
            machine_id = %result.machine.id,
            category = %result.category,
            average = ?result.average.concentration().map(|c| c.ug_per_m3()),
            "aggregated machine"
        );
        results.push(result);
    }

    info!(machines = results.len(), "dashboard pass complete");

    results
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, HashSet},
        num::NonZeroUsize,
    };

    use assert_matches::assert_matches;
    use chrono::{TimeZone as _, Utc};

    use super::*;
    use crate::air_quality::{Category, MachineId, Reading};

    #[derive(Default)]
    struct InMemorySource {
        readings: Vec<Reading>,
        averages: HashMap<MachineId, Option<f64>>,
        failing: HashSet<MachineId>,
    }

    impl InMemorySource {
        fn fail_for(&self, machine: &Machine) -> Result<(), QueryError> {
            if self.failing.contains(&machine.id) {
                return Err(QueryError::InvalidRow {
                    machine_id: machine.id.to_string(),
                    reason: "connection reset".to_owned(),
                });
            }
            Ok(())
        }
    }

    impl ReadingSource for InMemorySource {
        async fn readings(
            &self,
            machine: &Machine,
            _scope: &QueryScope,
        ) -> Result<Vec<Reading>, QueryError> {
            self.fail_for(machine)?;
            // Unfiltered on purpose: the aggregator must drop other machines.
            Ok(self.readings.clone())
        }

        async fn server_average(
            &self,
            machine: &Machine,
            _scope: &QueryScope,
        ) -> Result<Option<f64>, QueryError> {
            self.fail_for(machine)?;
            Ok(self.averages.get(&machine.id).copied().flatten())
        }
    }

    fn scope() -> QueryScope {
        QueryScope {
            tag: "air-quality".to_owned(),
            location_id: None,
            received_since: None,
        }
    }

    fn machine(id: &str) -> Machine {
        Machine::new(id, format!("{id} sensor"), "org")
    }

    fn reading(machine: &str, minute: u32, value: Option<f64>) -> Reading {
        Reading::new(
            machine,
            Utc.with_ymd_and_hms(2026, 10, 18, 9, minute, 0).unwrap(),
            value,
        )
    }

    #[tokio::test]
    async fn trailing_window_pass() {
        let source = InMemorySource {
            readings: vec![
                reading("a", 1, Some(10.0)),
                reading("a", 2, Some(14.0)),
                reading("b", 1, Some(300.0)),
                reading("a", 3, Some(13.0)),
                reading("c", 1, None),
            ],
            ..Default::default()
        };

        let results = build_dashboard(
            &source,
            vec![machine("a"), machine("b"), machine("c"), machine("d")],
            &scope(),
            AggregationStrategy::default(),
        )
        .await;

        let categories: Vec<Category> = results.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Moderate,
                Category::Hazardous,
                Category::Unavailable,
                Category::Unavailable,
            ]
        );
        assert_eq!(results[0].machine.id.as_str(), "a");
        assert_eq!(
            results[0].average.concentration().unwrap().to_string(),
            "12.33"
        );
        assert_eq!(results[2].average, Average::NoData);
    }

    #[tokio::test]
    async fn failing_machine_does_not_abort_the_pass() {
        let source = InMemorySource {
            readings: vec![reading("a", 1, Some(5.0)), reading("c", 1, Some(40.0))],
            failing: HashSet::from([MachineId::from("b")]),
            ..Default::default()
        };

        let results = build_dashboard(
            &source,
            vec![machine("a"), machine("b"), machine("c")],
            &scope(),
            AggregationStrategy::TrailingWindow {
                window_size: NonZeroUsize::new(3).unwrap(),
            },
        )
        .await;

        let categories: Vec<Category> = results.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Good,
                Category::Unavailable,
                Category::UnhealthySensitive
            ]
        );
    }

    #[tokio::test]
    async fn server_average_pass() {
        let source = InMemorySource {
            averages: HashMap::from([
                (MachineId::from("a"), Some(250.5)),
                (MachineId::from("b"), None),
                (MachineId::from("c"), Some(f64::NAN)),
                (MachineId::from("d"), Some(55.49)),
            ]),
            ..Default::default()
        };

        let results = build_dashboard(
            &source,
            vec![machine("a"), machine("b"), machine("c"), machine("d")],
            &scope(),
            AggregationStrategy::ServerAverage,
        )
        .await;

        let categories: Vec<Category> = results.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                Category::Hazardous,
                Category::Unavailable,
                Category::Unavailable,
                Category::UnhealthySensitive,
            ]
        );
    }

    #[tokio::test]
    async fn invalid_average_is_reported_per_machine() {
        let source = InMemorySource {
            averages: HashMap::from([(MachineId::from("a"), Some(f64::INFINITY))]),
            ..Default::default()
        };

        let err = aggregate_machine(
            &source,
            &machine("a"),
            &scope(),
            AggregationStrategy::ServerAverage,
        )
        .await
        .unwrap_err();

        assert_matches!(err, MachineError::InvalidAverage(AverageError::NonFinite(_)));
    }
}
