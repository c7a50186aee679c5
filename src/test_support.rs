use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use crate::auth::{Identity, TokenDirectory, token_hash};
use crate::reading::{NewReading, Reading, ReadingId};
use crate::store::{ReadingStore, StorageError, parse_timestamp};

pub fn scenario_payload() -> Map<String, Value> {
    let Value::Object(payload) = json!({
        "datetime": "2024-05-01 21:00:00",
        "site_name": "Obs1",
        "latitude": 40.1,
        "longitude": -74.2,
        "mpsqa": 21.5,
        "temperature": 15.2,
        "pressure": 1012.4,
        "humidity": 55.0,
    }) else {
        unreachable!("literal is an object");
    };
    payload
}

pub fn scenario_body() -> Vec<u8> {
    serde_json::to_vec(&scenario_payload()).expect("serialize payload")
}

pub fn new_reading(datetime: &str, site_name: &str) -> NewReading {
    NewReading {
        datetime: datetime.to_string(),
        site_name: site_name.to_string(),
        latitude: 40.1,
        longitude: -74.2,
        mpsqa: 21.5,
        temperature: 15.2,
        pressure: 1012.4,
        humidity: 55.0,
    }
}

/// In-process stand-in for Postgres. Shares the date-time rule through
/// `parse_timestamp` and orders by `(timestamp, id)`.
#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    rows: Mutex<Vec<Reading>>,
    next_id: AtomicI64,
    unavailable: bool,
}

impl MemoryReadingStore {
    pub fn failing() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<ReadingId> {
        self.rows.lock().unwrap().iter().map(|r| r.id).collect()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn ensure_schema(&self) -> Result<(), StorageError> {
        if self.unavailable {
            return Err(StorageError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    async fn insert(&self, reading: &NewReading) -> Result<Reading, StorageError> {
        if self.unavailable {
            return Err(StorageError::from(sqlx::Error::PoolTimedOut));
        }

        let timestamp = parse_timestamp(reading)?;

        // Ids start at 1 like BIGSERIAL.
        let id = ReadingId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let stored = Reading::from_new(id, timestamp, reading);
        self.rows.lock().unwrap().push(stored.clone());
        Ok(stored)
    }

    async fn latest(&self, site: Option<&str>) -> Result<Option<Reading>, StorageError> {
        if self.unavailable {
            return Err(StorageError::from(sqlx::Error::PoolTimedOut));
        }

        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| site.is_none_or(|s| r.site_name == s))
            .max_by_key(|r| r.recency_key())
            .cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenDirectory {
    tokens: HashMap<String, Identity>,
    unavailable: bool,
}

impl MemoryTokenDirectory {
    pub fn with_token(mut self, token: &str, name: &str, capabilities: &[&str]) -> Self {
        self.tokens.insert(
            token_hash(token),
            Identity {
                name: name.to_string(),
                capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            },
        );
        self
    }

    pub fn failing(mut self) -> Self {
        self.unavailable = true;
        self
    }
}

#[async_trait]
impl TokenDirectory for MemoryTokenDirectory {
    async fn resolve(&self, token_hash: &str) -> Result<Option<Identity>, sqlx::Error> {
        if self.unavailable {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(self.tokens.get(token_hash).cloned())
    }
}
