//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use common::Money;
use event_bus::RetryPolicy;
use saga::SagaConfig;
use saga::payment::ApprovalRule;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server and saga configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `BUS_PARTITIONS`: partitions per topic (default: `8`)
/// - `BUS_MAX_ATTEMPTS`: deliveries before dead-lettering (default: `5`)
/// - `BUS_INITIAL_BACKOFF_MS` / `BUS_MAX_BACKOFF_MS`: redelivery backoff (default: `50` / `2000`)
/// - `TAX_RATE_BPS`: invoice tax in basis points (default: `1000`)
/// - `INVOICE_TERM_DAYS`: days until an invoice is due (default: `30`)
/// - `GATEWAY_TIMEOUT_MS`: payment gateway call limit (default: `2000`)
/// - `CHANNEL_TIMEOUT_MS`: notification delivery limit (default: `1000`)
/// - `PAYMENT_DECLINE_ABOVE_CENTS`: decline charges above this amount (default: unset)
/// - `SEED_CATALOG`: register demo products at startup (default: `true`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub bus_partitions: usize,
    pub bus_max_attempts: u32,
    pub bus_initial_backoff_ms: u64,
    pub bus_max_backoff_ms: u64,
    pub tax_rate_bps: u32,
    pub invoice_term_days: i64,
    pub gateway_timeout_ms: u64,
    pub channel_timeout_ms: u64,
    pub payment_decline_above_cents: Option<i64>,
    pub seed_catalog: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_or("PORT", defaults.port),
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: env_or("LOG_FORMAT", defaults.log_format),
            bus_partitions: env_or("BUS_PARTITIONS", defaults.bus_partitions),
            bus_max_attempts: env_or("BUS_MAX_ATTEMPTS", defaults.bus_max_attempts),
            bus_initial_backoff_ms: env_or(
                "BUS_INITIAL_BACKOFF_MS",
                defaults.bus_initial_backoff_ms,
            ),
            bus_max_backoff_ms: env_or("BUS_MAX_BACKOFF_MS", defaults.bus_max_backoff_ms),
            tax_rate_bps: env_or("TAX_RATE_BPS", defaults.tax_rate_bps),
            invoice_term_days: env_or("INVOICE_TERM_DAYS", defaults.invoice_term_days),
            gateway_timeout_ms: env_or("GATEWAY_TIMEOUT_MS", defaults.gateway_timeout_ms),
            channel_timeout_ms: env_or("CHANNEL_TIMEOUT_MS", defaults.channel_timeout_ms),
            payment_decline_above_cents: std::env::var("PAYMENT_DECLINE_ABOVE_CENTS")
                .ok()
                .and_then(|v| v.parse().ok()),
            seed_catalog: env_or("SEED_CATALOG", defaults.seed_catalog),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Settings for the saga runtime.
    pub fn saga_config(&self) -> SagaConfig {
        let approval_rule = match self.payment_decline_above_cents {
            Some(cents) => ApprovalRule::DeclineAbove(Money::from_cents(cents)),
            None => ApprovalRule::AlwaysApprove,
        };
        SagaConfig {
            partitions: self.bus_partitions.max(1),
            retry: RetryPolicy {
                max_attempts: self.bus_max_attempts.max(1),
                initial_backoff: Duration::from_millis(self.bus_initial_backoff_ms),
                max_backoff: Duration::from_millis(self.bus_max_backoff_ms),
                multiplier: 2,
            },
            tax_rate_bps: self.tax_rate_bps,
            invoice_term_days: self.invoice_term_days,
            gateway_timeout: Duration::from_millis(self.gateway_timeout_ms),
            channel_timeout: Duration::from_millis(self.channel_timeout_ms),
            approval_rule,
            ..SagaConfig::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            bus_partitions: 8,
            bus_max_attempts: 5,
            bus_initial_backoff_ms: 50,
            bus_max_backoff_ms: 2000,
            tax_rate_bps: 1000,
            invoice_term_days: 30,
            gateway_timeout_ms: 2000,
            channel_timeout_ms: 1000,
            payment_decline_above_cents: None,
            seed_catalog: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.seed_catalog);
        assert!(config.payment_decline_above_cents.is_none());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_saga_config_defaults_match_runtime_defaults() {
        let saga = Config::default().saga_config();
        assert_eq!(saga.partitions, 8);
        assert_eq!(saga.retry, RetryPolicy::default());
        assert_eq!(saga.tax_rate_bps, 1000);
        assert_eq!(saga.invoice_term_days, 30);
        assert_eq!(saga.gateway_timeout, Duration::from_secs(2));
        assert_eq!(saga.channel_timeout, Duration::from_secs(1));
        assert_eq!(saga.approval_rule, ApprovalRule::AlwaysApprove);
    }

    #[test]
    fn test_decline_threshold_becomes_approval_rule() {
        let config = Config {
            payment_decline_above_cents: Some(50_000),
            bus_max_attempts: 0,
            ..Config::default()
        };
        let saga = config.saga_config();
        assert_eq!(
            saga.approval_rule,
            ApprovalRule::DeclineAbove(Money::from_cents(50_000))
        );
        assert_eq!(saga.retry.max_attempts, 1);
    }
}
