//! HTTP sink posting actions to the notification API.

use std::collections::HashMap;
use std::time::Duration;

use rulewatch_core::config::NotificationConfig;
use rulewatch_core::{Action, NotificationSink, NotifyError};

/// Posts each action as a JSON body to a fixed endpoint.
///
/// Environment variable references (`${VAR_NAME}`) in the URL and header
/// values are resolved at construction time. Submissions are attempted
/// once; any non-2xx answer is an error.
#[derive(Debug, Clone)]
pub struct HttpNotificationSink {
    url: String,
    headers: HashMap<String, String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpNotificationSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let url = resolve_env_vars(url)?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(NotifyError::Config(format!(
                "notification address must be an http(s) URL: {url}"
            )));
        }
        Ok(Self {
            url,
            headers: HashMap::new(),
            timeout,
            client: reqwest::Client::new(),
        })
    }

    /// Build from `NOTIFICATION_ADDR`; a missing address is a config error.
    pub fn from_config(config: &NotificationConfig, timeout: Duration) -> Result<Self, NotifyError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| NotifyError::Config("NOTIFICATION_ADDR is not set".into()))?;
        Self::new(url, timeout)
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, NotifyError> {
        self.headers.insert(key.to_string(), resolve_env_vars(value)?);
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn submit(&self, action: &Action) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(action)
            .map_err(|e| NotifyError::Config(format!("failed to serialize action: {e}")))?;

        let mut request = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (key, value) in &self.headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                NotifyError::Timeout(self.timeout)
            } else {
                NotifyError::Http(e.to_string())
            }
        })?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(url = %self.url, %status, body = %body, "notification API returned non-2xx status");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(url = %self.url, action = %action.kind, %status, "action delivered");
        Ok(())
    }
}

/// Resolve `${VAR_NAME}` patterns using `std::env::var`.
fn resolve_env_vars(input: &str) -> Result<String, NotifyError> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if !closed {
                return Err(NotifyError::Config(format!(
                    "unclosed env var reference in: {input}"
                )));
            }
            let value = std::env::var(&var_name)
                .map_err(|_| NotifyError::Config(format!("env var not found: {var_name}")))?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}
