use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub engine: EngineConfig,
    pub postgres: PostgresConfig,
    pub redis: RedisConfig,
    pub notification: NotificationConfig,
    pub metrics: MetricsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RULEWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RULEWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            engine: EngineConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            redis: RedisConfig::from_env_profiled(p),
            notification: NotificationConfig::from_env_profiled(p),
            metrics: MetricsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  engine:       reconcile={:?}, sweep={:?}, lookup_timeout={:?}, notify_timeout={:?}",
            self.engine.reconcile_interval(),
            self.engine.sweep_interval(),
            self.engine.lookup_timeout(),
            self.engine.notify_timeout(),
        );
        tracing::info!("  postgres:     host={}, db={}", self.postgres.host, self.postgres.database);
        tracing::info!(
            "  redis:        {}",
            if self.redis.is_configured() { "configured" } else { "(none, local value cache)" }
        );
        tracing::info!(
            "  notification: url={}",
            self.notification.url.as_deref().unwrap_or("(none)")
        );
        tracing::info!("  metrics:      port={}", self.metrics.port);
    }
}

// ── Engine ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub reconcile_interval_secs: u64,
    pub sweep_interval_ms: u64,
    pub lookup_timeout_ms: u64,
    pub notify_timeout_ms: u64,
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            reconcile_interval_secs: profiled_env_u64(p, "RECONCILE_INTERVAL_SECS", 10),
            sweep_interval_ms: profiled_env_u64(p, "SWEEP_INTERVAL_MS", 1_000),
            lookup_timeout_ms: profiled_env_u64(p, "VALUE_LOOKUP_TIMEOUT_MS", 2_000),
            notify_timeout_ms: profiled_env_u64(p, "NOTIFY_TIMEOUT_MS", 5_000),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(10))
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 10,
            sweep_interval_ms: 1_000,
            lookup_timeout_ms: 2_000,
            notify_timeout_ms: 5_000,
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_u16(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "rulewatch"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_u32(p, "PG_MAX_CONNECTIONS", 4),
        }
    }

    pub fn connection_string(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Redis (live values) ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// `REDIS_ADDR`, either `host:port` or a `redis://` URL.
    pub addr: Option<String>,
}

impl RedisConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            addr: profiled_env_opt(p, "REDIS_ADDR"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.addr.is_some()
    }

    /// Connection URL with the scheme filled in for bare `host:port`.
    pub fn url(&self) -> Option<String> {
        self.addr.as_deref().map(|addr| {
            if addr.contains("://") {
                addr.to_string()
            } else {
                format!("redis://{addr}")
            }
        })
    }
}

// ── Notification API ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Endpoint that accepts fired actions as JSON.
    pub url: Option<String>,
}

impl NotificationConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "NOTIFICATION_ADDR"),
        }
    }
}

// ── Metrics endpoint ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub host: String,
    pub port: u16,
}

impl MetricsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "METRICS_HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "METRICS_PORT", 8000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Keys are unique to each test so parallel tests never observe each other.

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        env::set_var("RWTEST_A_PG_HOST", "db.internal");
        let cfg = PostgresConfig::from_env_profiled("RWTEST_A");
        assert_eq!(cfg.host, "db.internal");
        env::remove_var("RWTEST_A_PG_HOST");
    }

    #[test]
    fn engine_defaults_match_service_clocks() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.reconcile_interval(), Duration::from_secs(10));
        assert_eq!(cfg.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn engine_intervals_never_zero() {
        let cfg = EngineConfig {
            reconcile_interval_secs: 0,
            sweep_interval_ms: 0,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.reconcile_interval(), Duration::from_secs(1));
        assert_eq!(cfg.sweep_interval(), Duration::from_millis(10));
    }

    #[test]
    fn invalid_numbers_fall_back_to_default() {
        env::set_var("RWTEST_B_SWEEP_INTERVAL_MS", "soon");
        assert_eq!(profiled_env_u64("RWTEST_B", "SWEEP_INTERVAL_MS", 1_000), 1_000);
        env::remove_var("RWTEST_B_SWEEP_INTERVAL_MS");
    }

    #[test]
    fn redis_addr_gets_a_scheme() {
        let bare = RedisConfig { addr: Some("cache:6379".into()) };
        assert_eq!(bare.url().as_deref(), Some("redis://cache:6379"));
        let full = RedisConfig { addr: Some("rediss://cache:6380/2".into()) };
        assert_eq!(full.url().as_deref(), Some("rediss://cache:6380/2"));
        assert_eq!(RedisConfig { addr: None }.url(), None);
    }

    #[test]
    fn connection_string_includes_ssl_mode() {
        let cfg = PostgresConfig {
            host: "h".into(),
            port: 5433,
            database: "rules".into(),
            username: Some("svc".into()),
            password: Some("pw".into()),
            ssl_mode: "require".into(),
            max_connections: 2,
        };
        assert_eq!(cfg.connection_string(), "postgres://svc:pw@h:5433/rules?sslmode=require");
        assert!(cfg.is_configured());
    }
}
