//! Process-local live value cache.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use rulewatch_core::{LiveValueStore, Measurement, StoreError};

/// Last value per (project, variable), fed from the measurement stream.
///
/// Used when no Redis is configured: the worker then records every batch
/// before evaluating it, so it only knows values this process has seen.
#[derive(Debug, Default)]
pub struct MemoryValueStore {
    latest: DashMap<(String, String), f64>,
}

impl MemoryValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a batch, skipping heartbeats. Returns how many values were stored.
    pub fn record(&self, project_id: &str, measurements: &[Measurement]) -> usize {
        let mut stored = 0;
        for m in measurements.iter().filter(|m| !m.is_heartbeat()) {
            self.set(project_id, &m.name, m.value);
            stored += 1;
        }
        stored
    }

    pub fn set(&self, project_id: &str, variable: &str, value: f64) {
        self.latest
            .insert((project_id.to_string(), variable.to_string()), value);
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

#[async_trait]
impl LiveValueStore for MemoryValueStore {
    async fn get_latest_many(
        &self,
        project_id: &str,
        variables: &[String],
    ) -> Result<HashMap<String, Option<f64>>, StoreError> {
        Ok(variables
            .iter()
            .map(|v| {
                let value = self
                    .latest
                    .get(&(project_id.to_string(), v.clone()))
                    .map(|e| *e.value());
                (v.clone(), value)
            })
            .collect())
    }
}
