use std::collections::HashMap;

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio_stream::StreamExt as _;
use tracing::debug;

use crate::{
    air_quality::{Machine, Reading},
    source::{QueryError, QueryScope, ReadingSource},
};

pub async fn new_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .context("failed to connect to PostgreSQL")
}

#[derive(Debug, sqlx::FromRow)]
struct MachineRow {
    id: String,
    name: String,
}

/// Machines that reported tagged readings in `organization_id`, ordered by id.
pub async fn list_reporting_machines(
    pool: &PgPool,
    organization_id: &str,
    scope: &QueryScope,
) -> Result<Vec<Machine>> {
    let rows: Vec<MachineRow> = sqlx::query_as(
        r#"
        SELECT r.machine_id AS id, COALESCE(m.name, r.machine_id) AS name
        FROM (
            SELECT DISTINCT machine_id
            FROM readings
            WHERE organization_id = $1
              AND $2 = ANY(tags)
              AND ($3::TEXT IS NULL OR location_id = $3)
        ) r
        LEFT JOIN machines m ON m.id = r.machine_id
        ORDER BY r.machine_id
        "#,
    )
    .bind(organization_id)
    .bind(&scope.tag)
    .bind(scope.location_id.as_deref())
    .fetch_all(pool)
    .await
    .context("failed to list reporting machines")?;

    Ok(rows
        .into_iter()
        .map(|r| Machine::new(r.id, r.name, organization_id))
        .collect())
}

#[derive(Debug, sqlx::FromRow)]
struct FragmentMachineRow {
    id: String,
    name: String,
    location_id: Option<String>,
}

/// Machines deployed from `fragment_id`, each with its owning organization
/// resolved through its location.
pub async fn list_fragment_machines(
    pool: &PgPool,
    fragment_id: &str,
    default_organization_id: &str,
) -> Result<Vec<Machine>> {
    let organizations = get_location_organizations(pool)
        .await
        .context("failed to get location organizations")?;

    let rows: Vec<FragmentMachineRow> = sqlx::query_as(
        r#"
        SELECT id, name, location_id
        FROM machines
        WHERE fragment_id = $1
        ORDER BY name, id
        "#,
    )
    .bind(fragment_id)
    .fetch_all(pool)
    .await
    .context("failed to list fragment machines")?;

    Ok(rows
        .into_iter()
        .map(|r| {
            let organization_id = resolve_organization(
                r.location_id.as_deref(),
                &organizations,
                default_organization_id,
            );
            Machine::new(r.id, r.name, organization_id)
        })
        .collect())
}

pub async fn get_location_organizations(pool: &PgPool) -> Result<HashMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, organization_id FROM locations")
        .fetch_all(pool)
        .await
        .context("failed to execute locations query")?;

    Ok(rows.into_iter().collect())
}

fn resolve_organization(
    location_id: Option<&str>,
    organizations: &HashMap<String, String>,
    default_organization_id: &str,
) -> String {
    location_id
        .and_then(|l| organizations.get(l))
        .map_or(default_organization_id, String::as_str)
        .to_owned()
}

// Non-finite values are left out like the trailing window skips them;
// PostgreSQL's AVG would otherwise return NaN or infinity.
const SERVER_AVERAGE_QUERY: &str = r#"
    SELECT AVG(pm_2_5)
    FROM readings
    WHERE machine_id = $1
      AND organization_id = $2
      AND $3 = ANY(tags)
      AND ($4::TEXT IS NULL OR location_id = $4)
      AND ($5::TIMESTAMPTZ IS NULL OR time_received >= $5)
      AND pm_2_5 NOT IN ('NaN'::FLOAT8, 'Infinity'::FLOAT8, '-Infinity'::FLOAT8)
    "#;

#[derive(Debug, sqlx::FromRow)]
struct ReadingRow {
    machine_id: String,
    time_received: DateTime<Utc>,
    pm_2_5: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PgReadingSource {
    pool: PgPool,
}

impl PgReadingSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReadingSource for PgReadingSource {
    async fn readings(
        &self,
        machine: &Machine,
        scope: &QueryScope,
    ) -> Result<Vec<Reading>, QueryError> {
        let mut rows = sqlx::query_as::<_, ReadingRow>(
            r#"
            SELECT machine_id, time_received, pm_2_5
            FROM readings
            WHERE machine_id = $1
              AND organization_id = $2
              AND $3 = ANY(tags)
              AND ($4::TEXT IS NULL OR location_id = $4)
              AND ($5::TIMESTAMPTZ IS NULL OR time_received >= $5)
            "#,
        )
        .bind(machine.id.as_str())
        .bind(&machine.organization_id)
        .bind(&scope.tag)
        .bind(scope.location_id.as_deref())
        .bind(scope.received_since)
        .fetch(&self.pool);

        let mut readings = Vec::new();
        while let Some(row) = rows.next().await {
            let row = row?;
            if row.machine_id != machine.id.as_str() {
                return Err(QueryError::InvalidRow {
                    machine_id: machine.id.to_string(),
                    reason: format!("row belongs to {}", row.machine_id),
                });
            }

            readings.push(Reading::new(row.machine_id, row.time_received, row.pm_2_5));
        }

        debug!(machine_id = %machine.id, count = readings.len(), "fetched readings");

        Ok(readings)
    }

    async fn server_average(
        &self,
        machine: &Machine,
        scope: &QueryScope,
    ) -> Result<Option<f64>, QueryError> {
        let avg_pm_2_5: Option<f64> = sqlx::query_scalar(SERVER_AVERAGE_QUERY)
        .bind(machine.id.as_str())
        .bind(&machine.organization_id)
        .bind(&scope.tag)
        .bind(scope.location_id.as_deref())
        .bind(scope.received_since)
        .fetch_one(&self.pool)
        .await?;

        Ok(avg_pm_2_5)
    }
}

/// A reading together with the tenant metadata it is stored under.
#[derive(Debug, Clone)]
pub struct ScopedReading {
    pub reading: Reading,

    pub organization_id: String,

    pub location_id: Option<String>,

    pub tags: Vec<String>,
}

pub async fn bulk_insert_readings(pool: &PgPool, readings: &[ScopedReading]) -> Result<()> {
    if readings.is_empty() {
        return Ok(());
    }

    let machine_ids: Vec<&str> = readings
        .iter()
        .map(|r| r.reading.machine_id.as_str())
        .collect();
    let organization_ids: Vec<&str> = readings
        .iter()
        .map(|r| r.organization_id.as_str())
        .collect();
    let location_ids: Vec<Option<&str>> =
        readings.iter().map(|r| r.location_id.as_deref()).collect();
    let tags: Vec<String> = readings.iter().map(|r| r.tags.join(";")).collect();
    let times_received: Vec<DateTime<Utc>> =
        readings.iter().map(|r| r.reading.time_received).collect();
    let pm_2_5s: Vec<Option<f64>> = readings.iter().map(|r| r.reading.pm_2_5).collect();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query(
        r#"
        INSERT INTO readings (machine_id, organization_id, location_id, tags, time_received, pm_2_5)
        SELECT u.machine_id, u.organization_id, u.location_id, string_to_array(u.tags, ';'), u.time_received, u.pm_2_5
        FROM UNNEST($1::TEXT[], $2::TEXT[], $3::TEXT[], $4::TEXT[], $5::TIMESTAMPTZ[], $6::FLOAT8[])
            AS u(machine_id, organization_id, location_id, tags, time_received, pm_2_5)
        ON CONFLICT (machine_id, time_received) DO NOTHING
        "#,
    )
    .bind(&machine_ids)
    .bind(&organization_ids)
    .bind(&location_ids)
    .bind(&tags)
    .bind(&times_received)
    .bind(&pm_2_5s)
    .execute(&mut *tx)
    .await
    .context("failed to execute bulk insert query")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn organization_resolves_through_location() {
        let organizations = HashMap::from([
            ("loc-1".to_owned(), "org-a".to_owned()),
            ("loc-2".to_owned(), "org-b".to_owned()),
        ]);

        assert_eq!(
            resolve_organization(Some("loc-2"), &organizations, "org-default"),
            "org-b"
        );
        assert_eq!(
            resolve_organization(Some("loc-9"), &organizations, "org-default"),
            "org-default"
        );
        assert_eq!(
            resolve_organization(None, &organizations, "org-default"),
            "org-default"
        );
    }

    #[test]
    fn server_average_leaves_out_non_finite_values() {
        for value in ["'NaN'::FLOAT8", "'Infinity'::FLOAT8", "'-Infinity'::FLOAT8"] {
            assert!(SERVER_AVERAGE_QUERY.contains(value), "{value} is not excluded");
        }
        assert!(SERVER_AVERAGE_QUERY.contains("pm_2_5 NOT IN ("));
    }
}
