use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BusError;
use crate::endpoint::Endpoint;

/// Messaging configuration, parsed from `bus.toml` with environment overrides.
///
/// ```toml
/// [broker]
/// frontend = "tcp://10.0.0.5:7000"
/// backend = "tcp://10.0.0.5:7001"
///
/// [worker]
/// health_interval_secs = 15
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub worker: WorkerSection,
}

/// Broker endpoints. Publishers connect to the frontend, subscribers to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_broker_frontend")]
    pub frontend: String,

    #[serde(default = "default_broker_backend")]
    pub backend: String,
}

fn default_broker_frontend() -> String {
    "ipc:///tmp/rulewatch/broker-frontend.sock".into()
}

fn default_broker_backend() -> String {
    "ipc:///tmp/rulewatch/broker-backend.sock".into()
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            frontend: default_broker_frontend(),
            backend: default_broker_backend(),
        }
    }
}

/// Lifecycle timings shared by every worker process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSection {
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,

    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_health_interval() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            health_interval_secs: default_health_interval(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl BusConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, BusError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Single-host defaults over IPC sockets, still subject to env overrides.
    pub fn local() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Where health pings are published.
    pub fn frontend(&self) -> Result<Endpoint, BusError> {
        self.broker.frontend.parse()
    }

    /// Where telemetry is received from.
    pub fn backend(&self) -> Result<Endpoint, BusError> {
        self.broker.backend.parse()
    }

    /// `BUS_BROKER_FRONTEND` and `BUS_BROKER_BACKEND` override the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BUS_BROKER_FRONTEND") {
            self.broker.frontend = v;
        }
        if let Ok(v) = std::env::var("BUS_BROKER_BACKEND") {
            self.broker.backend = v;
        }
    }

    pub fn validate(&self) -> Result<(), BusError> {
        self.frontend()?;
        self.backend()?;
        if self.worker.health_interval_secs == 0 {
            return Err(BusError::Config(
                "worker.health_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_uses_local_defaults() {
        let config = BusConfig::from_toml("").unwrap();
        assert_eq!(config.worker.health_interval_secs, 30);
        assert_eq!(config.worker.shutdown_timeout_secs, 5);
    }

    #[test]
    fn tcp_broker_endpoints_resolve() {
        let config = BusConfig::from_toml(
            r#"
            [broker]
            frontend = "tcp://10.0.0.5:7000"
            backend = "tcp://10.0.0.5:7001"
            "#,
        )
        .unwrap();
        let frontend = config.frontend().unwrap();
        let backend = config.backend().unwrap();
        // Env overrides may be present on the host; only check shape when not.
        if std::env::var("BUS_BROKER_FRONTEND").is_err() {
            assert_eq!(frontend.to_string(), "tcp://10.0.0.5:7000");
        }
        if std::env::var("BUS_BROKER_BACKEND").is_err() {
            assert_eq!(backend.to_string(), "tcp://10.0.0.5:7001");
        }
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = BusConfig {
            broker: BrokerConfig {
                frontend: "udp://nowhere".into(),
                backend: default_broker_backend(),
            },
            worker: WorkerSection::default(),
        };
        assert!(matches!(config.validate(), Err(BusError::Config(_))));
    }

    #[test]
    fn zero_health_interval_is_rejected() {
        let err = BusConfig::from_toml("[worker]\nhealth_interval_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("health_interval_secs"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = BusConfig::from_toml("[broker\nfrontend = 1").unwrap_err();
        assert!(matches!(err, BusError::ConfigParse(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[worker]\nshutdown_timeout_secs = 9").unwrap();
        let config = BusConfig::from_file(file.path()).unwrap();
        assert_eq!(config.worker.shutdown_timeout_secs, 9);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = BusConfig::from_file("/nonexistent/rulewatch/bus.toml").unwrap_err();
        assert!(matches!(err, BusError::ConfigIo(_)));
    }
}
