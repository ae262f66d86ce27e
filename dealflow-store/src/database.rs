use async_trait::async_trait;
use dealflow_core::{StatsError, StatsStore};
use dealflow_shared::{CycleRecord, StatsSummary};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Pool, Postgres, Row};
use std::time::Duration;
use tracing::info;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS cycle_records (
    cycle_id UUID PRIMARY KEY,
    cycle_number BIGINT NOT NULL,
    started_at TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ NOT NULL,
    offers_fetched BIGINT NOT NULL,
    offers_selected BIGINT NOT NULL,
    aborted BOOLEAN NOT NULL,
    record JSONB NOT NULL
)
"#;

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS cycle_records_number_idx ON cycle_records (cycle_number DESC)";

const SUMMARY: &str = r#"
WITH source_errors AS (
    SELECT e->>'kind' AS kind
    FROM cycle_records, jsonb_array_elements(record->'errors') AS e
)
SELECT
    COUNT(*) AS cycles,
    COUNT(*) FILTER (WHERE NOT aborted) AS completed,
    COUNT(*) FILTER (WHERE aborted) AS aborted,
    COALESCE(SUM(offers_fetched), 0)::BIGINT AS offers_fetched,
    COALESCE(SUM(offers_selected), 0)::BIGINT AS offers_selected,
    COALESCE(SUM((record->>'offers_published')::BIGINT), 0)::BIGINT AS offers_published,
    COALESCE(SUM((record->>'publish_failures')::BIGINT), 0)::BIGINT AS publish_failures,
    (SELECT COUNT(*) FROM source_errors WHERE kind = 'TRANSIENT') AS transient_source_errors,
    (SELECT COUNT(*) FROM source_errors WHERE kind = 'FATAL') AS fatal_source_errors,
    MAX(started_at) AS last_cycle_at
FROM cycle_records
"#;

/// Cycle history in Postgres. Headline counters are columns for dashboards,
/// the full record is kept as JSONB.
#[derive(Clone)]
pub struct PgStatsStore {
    pub pool: Pool<Postgres>,
}

impl PgStatsStore {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        info!("Ensuring cycle_records schema...");
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> StatsError {
    StatsError::Unavailable(format!("postgres: {}", e))
}

/// Postgres has no unsigned types; counts beyond i64 saturate.
fn to_db_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn from_db_count(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

fn count(row: &PgRow, column: &str) -> Result<usize, StatsError> {
    let n: i64 = row.try_get(column).map_err(unavailable)?;
    Ok(from_db_count(n))
}

#[async_trait]
impl StatsStore for PgStatsStore {
    async fn append(&self, record: &CycleRecord) -> Result<(), StatsError> {
        let json = serde_json::to_value(record).map_err(|e| StatsError::Corrupt(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO cycle_records
                (cycle_id, cycle_number, started_at, finished_at, offers_fetched, offers_selected, aborted, record)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (cycle_id) DO NOTHING
            "#,
        )
        .bind(record.cycle_id)
        .bind(record.cycle_number as i64)
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(to_db_count(record.offers_fetched))
        .bind(to_db_count(record.offers_selected))
        .bind(record.is_aborted())
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CycleRecord>, StatsError> {
        let rows = sqlx::query(
            "SELECT record FROM cycle_records ORDER BY cycle_number DESC, started_at DESC LIMIT $1",
        )
        .bind(to_db_count(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter()
            .map(|row| {
                let value: serde_json::Value = row.try_get("record").map_err(unavailable)?;
                serde_json::from_value(value).map_err(|e| StatsError::Corrupt(e.to_string()))
            })
            .collect()
    }

    async fn latest_cycle_number(&self) -> Result<Option<u64>, StatsError> {
        let row = sqlx::query("SELECT MAX(cycle_number) AS latest FROM cycle_records")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;
        let latest: Option<i64> = row.try_get("latest").map_err(unavailable)?;
        Ok(latest.map(|n| n.max(0) as u64))
    }

    /// Aggregated in SQL; no records are shipped to the process.
    async fn summary(&self) -> Result<StatsSummary, StatsError> {
        let row = sqlx::query(SUMMARY).fetch_one(&self.pool).await.map_err(unavailable)?;
        let offers_fetched = count(&row, "offers_fetched")?;
        let offers_selected = count(&row, "offers_selected")?;
        Ok(StatsSummary {
            cycles: count(&row, "cycles")?,
            completed: count(&row, "completed")?,
            aborted: count(&row, "aborted")?,
            offers_fetched,
            offers_selected,
            offers_published: count(&row, "offers_published")?,
            publish_failures: count(&row, "publish_failures")?,
            transient_source_errors: count(&row, "transient_source_errors")?,
            fatal_source_errors: count(&row, "fatal_source_errors")?,
            selection_rate: StatsSummary::ratio(offers_selected, offers_fetched),
            last_cycle_at: row.try_get("last_cycle_at").map_err(unavailable)?,
        })
    }
}
