//! Interfaces of the collaborators the rule engine talks to.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{NotifyError, StoreError};
use crate::model::{Action, RuleDefinition};

/// Authoritative source of rule definitions.
#[async_trait::async_trait]
pub trait RuleStore: Send + Sync {
    /// Every rule currently flagged active, across all projects.
    async fn list_active_rules(&self) -> Result<Vec<RuleDefinition>, StoreError>;
}

/// Last known value per project and variable.
///
/// `Ok(None)` means no value was ever recorded, which callers must keep
/// distinct from a lookup failure.
#[async_trait::async_trait]
pub trait LiveValueStore: Send + Sync {
    /// Fetch several variables at once. Every requested name is present in
    /// the returned map.
    async fn get_latest_many(
        &self,
        project_id: &str,
        variables: &[String],
    ) -> Result<HashMap<String, Option<f64>>, StoreError>;

    async fn get_latest(&self, project_id: &str, variable: &str) -> Result<Option<f64>, StoreError> {
        let mut values = self
            .get_latest_many(project_id, &[variable.to_string()])
            .await?;
        Ok(values.remove(variable).flatten())
    }
}

/// Delivery endpoint for fired actions. Submissions are attempted once.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn submit(&self, action: &Action) -> Result<(), NotifyError>;
}

#[async_trait::async_trait]
impl<T: RuleStore + ?Sized> RuleStore for Arc<T> {
    async fn list_active_rules(&self) -> Result<Vec<RuleDefinition>, StoreError> {
        (**self).list_active_rules().await
    }
}

#[async_trait::async_trait]
impl<T: LiveValueStore + ?Sized> LiveValueStore for Arc<T> {
    async fn get_latest_many(
        &self,
        project_id: &str,
        variables: &[String],
    ) -> Result<HashMap<String, Option<f64>>, StoreError> {
        (**self).get_latest_many(project_id, variables).await
    }
}

#[async_trait::async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn submit(&self, action: &Action) -> Result<(), NotifyError> {
        (**self).submit(action).await
    }
}
