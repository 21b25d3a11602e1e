//! Latest values from the recorder's per-project Redis hash.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use rulewatch_core::config::RedisConfig;
use rulewatch_core::{LiveValueStore, StoreError};
use tracing::info;

/// Reads `lynus:projects:<project_id>:measurements`, one field per variable.
///
/// A missing or empty field means the variable was never recorded.
#[derive(Clone)]
pub struct RedisValueStore {
    conn: MultiplexedConnection,
}

impl RedisValueStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self { conn }
    }

    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let url = config
            .url()
            .ok_or_else(|| StoreError::Other("REDIS_ADDR is not set".into()))?;
        let client = redis::Client::open(url.as_str())
            .map_err(|e| StoreError::Other(format!("invalid Redis address: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Query(format!("cannot connect to Redis: {e}")))?;
        info!("connected to Redis value store");
        Ok(Self::new(conn))
    }
}

pub(crate) fn hash_key(project_id: &str) -> String {
    format!("lynus:projects:{project_id}:measurements")
}

/// Pair HMGET replies with the requested names.
pub(crate) fn decode_fields(
    variables: &[String],
    fields: Vec<Option<String>>,
) -> Result<HashMap<String, Option<f64>>, StoreError> {
    if fields.len() != variables.len() {
        return Err(StoreError::Decode(format!(
            "asked for {} fields, Redis answered {}",
            variables.len(),
            fields.len()
        )));
    }
    variables
        .iter()
        .zip(fields)
        .map(|(name, raw)| {
            let value = match raw.as_deref() {
                None | Some("") => None,
                Some(text) => Some(text.trim().parse::<f64>().map_err(|_| {
                    StoreError::Decode(format!("value of '{name}' is not a number: {text:?}"))
                })?),
            };
            Ok((name.clone(), value))
        })
        .collect()
}

#[async_trait]
impl LiveValueStore for RedisValueStore {
    async fn get_latest_many(
        &self,
        project_id: &str,
        variables: &[String],
    ) -> Result<HashMap<String, Option<f64>>, StoreError> {
        if variables.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn.clone();
        let fields: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(hash_key(project_id))
            .arg(variables)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Query(format!("HMGET for project {project_id}: {e}")))?;
        decode_fields(variables, fields)
    }
}
