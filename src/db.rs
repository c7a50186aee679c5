use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::reading::{NewReading, Reading, ReadingId};
use crate::store::{ReadingStore, StorageError, parse_timestamp};

// Serializes concurrent first-run schema creation across processes.
const SCHEMA_LOCK_KEY: i64 = 0x4e57_5244_0001;

pub async fn new_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(8))
        .connect(database_url)
        .await
        .context("failed to connect to database")
}

#[derive(sqlx::FromRow)]
struct ReadingRow {
    id: i64,
    datetime: NaiveDateTime,
    site_name: String,
    latitude: f64,
    longitude: f64,
    mpsqa: f64,
    temperature: f64,
    pressure: f64,
    humidity: f64,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            id: ReadingId(row.id),
            timestamp: row.datetime,
            site_name: row.site_name,
            latitude: row.latitude,
            longitude: row.longitude,
            mpsqa: row.mpsqa,
            temperature: row.temperature,
            pressure: row.pressure,
            humidity: row.humidity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgReadingStore {
    pool: PgPool,
}

impl PgReadingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts all readings in one transaction. Either every row lands or none does.
    pub async fn insert_batch(&self, readings: &[NewReading]) -> Result<u64, StorageError> {
        if readings.is_empty() {
            return Ok(0);
        }

        let timestamps = readings
            .iter()
            .map(parse_timestamp)
            .collect::<Result<Vec<NaiveDateTime>, _>>()?;
        let site_names: Vec<&str> = readings.iter().map(|r| r.site_name.as_str()).collect();
        let latitudes: Vec<f64> = readings.iter().map(|r| r.latitude).collect();
        let longitudes: Vec<f64> = readings.iter().map(|r| r.longitude).collect();
        let mpsqas: Vec<f64> = readings.iter().map(|r| r.mpsqa).collect();
        let temperatures: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
        let pressures: Vec<f64> = readings.iter().map(|r| r.pressure).collect();
        let humidities: Vec<f64> = readings.iter().map(|r| r.humidity).collect();

        let mut tx = self.pool.begin().await?;

        // WITH ORDINALITY keeps id assignment in file order.
        let result = sqlx::query(
            r#"
            INSERT INTO nightwatcher_readings
                (datetime, site_name, latitude, longitude, mpsqa, temperature, pressure, humidity)
            SELECT d, s, lat, lon, m, t, p, h
            FROM UNNEST(
                $1::TIMESTAMP[], $2::TEXT[], $3::FLOAT8[], $4::FLOAT8[],
                $5::FLOAT8[], $6::FLOAT8[], $7::FLOAT8[], $8::FLOAT8[]
            ) WITH ORDINALITY AS batch(d, s, lat, lon, m, t, p, h, ord)
            ORDER BY ord
            "#,
        )
        .bind(&timestamps)
        .bind(&site_names)
        .bind(&latitudes)
        .bind(&longitudes)
        .bind(&mpsqas)
        .bind(&temperatures)
        .bind(&pressures)
        .bind(&humidities)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS nightwatcher_readings (
                id BIGSERIAL PRIMARY KEY,
                datetime TIMESTAMP NOT NULL,
                site_name VARCHAR(255) NOT NULL,
                latitude DOUBLE PRECISION NOT NULL,
                longitude DOUBLE PRECISION NOT NULL,
                mpsqa DOUBLE PRECISION NOT NULL,
                temperature DOUBLE PRECISION NOT NULL,
                pressure DOUBLE PRECISION NOT NULL,
                humidity DOUBLE PRECISION NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS nightwatcher_readings_latest_idx
            ON nightwatcher_readings (datetime DESC, id DESC)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS nightwatcher_readings_site_latest_idx
            ON nightwatcher_readings (site_name, datetime DESC, id DESC)
            "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!("reading schema ready");
        Ok(())
    }

    async fn insert(&self, reading: &NewReading) -> Result<Reading, StorageError> {
        let timestamp = parse_timestamp(reading)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO nightwatcher_readings
                (datetime, site_name, latitude, longitude, mpsqa, temperature, pressure, humidity)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(timestamp)
        .bind(&reading.site_name)
        .bind(reading.latitude)
        .bind(reading.longitude)
        .bind(reading.mpsqa)
        .bind(reading.temperature)
        .bind(reading.pressure)
        .bind(reading.humidity)
        .fetch_one(&self.pool)
        .await?;

        Ok(Reading::from_new(ReadingId(id), timestamp, reading))
    }

    async fn latest(&self, site: Option<&str>) -> Result<Option<Reading>, StorageError> {
        let row: Option<ReadingRow> = sqlx::query_as(
            r#"
            SELECT id, datetime, site_name, latitude, longitude, mpsqa, temperature, pressure, humidity
            FROM nightwatcher_readings
            WHERE ($1::TEXT IS NULL OR site_name = $1)
            ORDER BY datetime DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(site)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Reading::from))
    }
}
