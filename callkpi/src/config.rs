//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The file path
//! defaults to `config.yaml` and can be set with `-f` or the `CALLKPI_CONFIG` environment
//! variable.
//!
//! ## Loading Priority
//!
//! Sources are merged in order, later ones overriding earlier ones:
//!
//! 1. **YAML config file** - base configuration (default: `config.yaml`)
//! 2. **Environment variables** - variables prefixed with `CALLKPI_`
//! 3. **DATABASE_URL** - special case, overrides `database.url` if set
//!
//! Nested values use double underscores: `CALLKPI_DATABASE__POOL__MAX_CONNECTIONS=2` sets
//! `database.pool.max_connections`.
//!
//! ## Example
//!
//! ```yaml
//! database:
//!   url: sqlite://voicemail.db
//! output_dir: rapports
//! fetch_timeout: 30s
//! email:
//!   type: smtp
//!   host: smtp.gmail.com
//!   port: 587
//!   username: reports@example.com
//!   password: app-password
//!   use_tls: true
//!   from_email: reports@example.com
//!   from_name: Votre Service Voicemail
//! tenants:
//!   - id: Garage Test
//!     to_email: client@example.com
//! periods:
//!   - type: rolling
//!     name: Dernière semaine
//!     slug: Semaine
//!     days: 7
//!   - type: fixed
//!     name: Janvier 2026
//!     slug: Janvier
//!     start: 2026-01-01 00:00:00
//!     end: 2026-01-31 23:59:59
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDateTime;
use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CALLKPI_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Run the connectivity self-check (record store and mail transport) instead of generating reports
    #[arg(long)]
    pub test: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Write reports without emailing them
    #[arg(long)]
    pub no_send: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Overrides `database.url`; usually set through `DATABASE_URL`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Record store connection settings
    pub database: DatabaseConfig,
    /// Mail transport and sender identity
    pub email: EmailConfig,
    /// Tenants to report on. When empty, every tenant found in the calls table is reported on,
    /// without delivery.
    pub tenants: Vec<TenantConfig>,
    /// Reporting periods, each producing one report per tenant
    pub periods: Vec<PeriodConfig>,
    /// Directory report files are written to
    pub output_dir: PathBuf,
    /// Also write a single Markdown report with every tenant and period
    pub consolidated_report: bool,
    /// Email reports to tenants with a configured recipient
    pub send_reports: bool,
    /// Maximum number of aggregations in flight
    pub concurrency: usize,
    /// Upper bound on a single tenant/period fetch
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Enable OpenTelemetry OTLP export for tracing
    pub enable_otel_export: bool,
}

/// SQLite record store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g. `sqlite://voicemail.db`)
    pub url: String,
    /// Open the database read-only; the voicemail assistant owns the data
    pub read_only: bool,
    /// Create the database file if it does not exist
    pub create_if_missing: bool,
    /// Apply the bundled schema migrations on startup
    pub run_migrations: bool,
    pub pool: PoolSettings,
}

/// Connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSettings {
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections to maintain
    pub min_connections: u32,
    /// Maximum time to wait for a connection (seconds)
    pub acquire_timeout_secs: u64,
    /// Time before idle connections are closed (seconds, 0 = never)
    pub idle_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 4,
            min_connections: 0,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://voicemail.db".to_string(),
            read_only: true,
            create_if_missing: false,
            run_migrations: false,
            pool: PoolSettings::default(),
        }
    }
}

/// Email configuration for report delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
// Note: Cannot use deny_unknown_fields here due to #[serde(flatten)] on transport
pub struct EmailConfig {
    /// Email transport method
    #[serde(flatten)]
    pub transport: EmailTransportConfig,
    /// Sender email address, unless the tenant overrides it
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
    /// Who to set the reply to field from
    pub reply_to: Option<String>,
    /// Subject line prefix; the tenant and period are appended
    pub subject_prefix: String,
}

/// Email transport configuration - either SMTP or file-based for testing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    /// Send emails via SMTP server
    Smtp {
        /// SMTP server hostname
        host: String,
        /// SMTP server port
        port: u16,
        /// SMTP authentication username
        username: String,
        /// SMTP authentication password
        password: String,
        /// Use STARTTLS
        use_tls: bool,
    },
    /// Write emails to files (for development/testing)
    File {
        /// Directory path where email files will be written
        path: String,
    },
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            transport: EmailTransportConfig::default(),
            from_email: "noreply@example.com".to_string(),
            from_name: "Votre Service Voicemail".to_string(),
            reply_to: None,
            subject_prefix: "📊 Rapport KPI".to_string(),
        }
    }
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        Self::File {
            path: "./emails".to_string(),
        }
    }
}

/// A tenant (garage) to report on.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TenantConfig {
    /// Tenant identifier as stored in the records (`garage_id`)
    pub id: String,
    /// Name shown in reports; defaults to the identifier
    #[serde(default)]
    pub display_name: Option<String>,
    /// Report recipient; tenants without one get files but no email
    #[serde(default)]
    pub to_email: Option<String>,
    /// Sender address for this tenant's reports, overriding `email.from_email`
    #[serde(default)]
    pub from_email: Option<String>,
}

impl TenantConfig {
    /// A tenant discovered in the store, with no delivery settings
    pub fn discovered(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            to_email: None,
            from_email: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

/// A reporting period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum PeriodConfig {
    /// The last `days` days, from midnight to the end of today
    Rolling {
        /// Label shown in reports; the dates are appended
        name: String,
        /// File name suffix
        slug: String,
        days: u32,
    },
    /// Fixed inclusive window
    Fixed {
        name: String,
        slug: String,
        #[serde(with = "timestamp")]
        start: NaiveDateTime,
        #[serde(with = "timestamp")]
        end: NaiveDateTime,
    },
}

impl PeriodConfig {
    pub fn slug(&self) -> &str {
        match self {
            PeriodConfig::Rolling { slug, .. } | PeriodConfig::Fixed { slug, .. } => slug,
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` timestamps, also accepting the ISO `T` separator.
mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S"))
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{s}': {e}")))
    }
}

fn default_periods() -> Vec<PeriodConfig> {
    let january = |d: u32, h: u32, m: u32, s: u32| {
        chrono::NaiveDate::from_ymd_opt(2026, 1, d)
            .and_then(|date| date.and_hms_opt(h, m, s))
            .unwrap_or_default()
    };

    vec![
        PeriodConfig::Rolling {
            name: "Dernière semaine".to_string(),
            slug: "Semaine".to_string(),
            days: 7,
        },
        PeriodConfig::Fixed {
            name: "Janvier 2026".to_string(),
            slug: "Janvier".to_string(),
            start: january(1, 0, 0, 0),
            end: january(31, 23, 59, 59),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database: DatabaseConfig::default(),
            email: EmailConfig::default(),
            tenants: Vec::new(),
            periods: default_periods(),
            output_dir: PathBuf::from("rapports"),
            consolidated_report: true,
            send_reports: true,
            concurrency: 4,
            fetch_timeout: Duration::from_secs(30),
            enable_otel_export: false,
        }
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config { message: message.into() }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        if args.no_send {
            config.send_reports = false;
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.concurrency == 0 {
            return Err(config_error("concurrency must be at least 1"));
        }

        if self.fetch_timeout.is_zero() {
            return Err(config_error("fetch_timeout must be greater than zero"));
        }

        if self.database.read_only && (self.database.run_migrations || self.database.create_if_missing) {
            return Err(config_error(
                "database.read_only cannot be combined with run_migrations or create_if_missing",
            ));
        }

        if self.database.pool.max_connections == 0 {
            return Err(config_error("database.pool.max_connections must be at least 1"));
        }

        if self.periods.is_empty() {
            return Err(config_error("at least one reporting period is required"));
        }

        let mut slugs = HashSet::new();
        for period in &self.periods {
            let slug = period.slug();
            if slug.is_empty() || slug.contains(['/', '\\']) {
                return Err(config_error(format!(
                    "period slug '{slug}' must be non-empty and contain no path separators"
                )));
            }
            if !slugs.insert(slug) {
                return Err(config_error(format!("duplicate period slug '{slug}'")));
            }
            match period {
                PeriodConfig::Rolling { days: 0, name, .. } => {
                    return Err(config_error(format!("rolling period '{name}' must cover at least one day")));
                }
                PeriodConfig::Fixed { start, end, name, .. } if start > end => {
                    return Err(config_error(format!("fixed period '{name}' starts after it ends ({start} > {end})")));
                }
                _ => {}
            }
        }

        let mut tenant_ids = HashSet::new();
        for tenant in &self.tenants {
            if !tenant_ids.insert(tenant.id.as_str()) {
                return Err(config_error(format!("duplicate tenant '{}'", tenant.id)));
            }
            for address in [&tenant.to_email, &tenant.from_email].into_iter().flatten() {
                lettre::Address::from_str(address)
                    .map_err(|e| config_error(format!("tenant '{}': invalid email address '{address}': {e}", tenant.id)))?;
            }
        }

        if self.send_reports {
            lettre::Address::from_str(&self.email.from_email)
                .map_err(|e| config_error(format!("email.from_email '{}' is invalid: {e}", self.email.from_email)))?;
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // CALLKPI_CONFIG names the file itself
            .merge(Env::prefixed("CALLKPI_").ignore(&["config"]).split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            test: false,
            validate: false,
            no_send: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.database.url, "sqlite://voicemail.db");
            assert!(config.database.read_only);
            assert_eq!(config.concurrency, 4);
            assert_eq!(config.fetch_timeout, Duration::from_secs(30));
            assert_eq!(config.periods.len(), 2);
            assert_eq!(config.periods[0].slug(), "Semaine");
            assert!(matches!(config.email.transport, EmailTransportConfig::File { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_full_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
database:
  url: sqlite:///var/lib/voicemail/voicemail.db
  pool:
    max_connections: 2
output_dir: /tmp/rapports
fetch_timeout: 5s
concurrency: 8
email:
  type: smtp
  host: smtp.gmail.com
  port: 587
  username: reports@example.com
  password: secret
  use_tls: true
  from_email: reports@example.com
  from_name: PitCall
tenants:
  - id: Garage Test
    to_email: client@example.com
  - id: Garage Martin
    display_name: Garage Martin & Fils
    to_email: martin@example.com
    from_email: louis@example.com
periods:
  - type: rolling
    name: Dernière semaine
    slug: Semaine
    days: 7
  - type: fixed
    name: Semaine du 25 novembre (matin)
    slug: periode1
    start: 2025-11-25 10:00:00
    end: 2025-11-25T15:00:00
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.database.url, "sqlite:///var/lib/voicemail/voicemail.db");
            assert_eq!(config.database.pool.max_connections, 2);
            assert_eq!(config.fetch_timeout, Duration::from_secs(5));
            assert_eq!(config.concurrency, 8);
            assert!(matches!(
                &config.email.transport,
                EmailTransportConfig::Smtp { host, port: 587, use_tls: true, .. } if host == "smtp.gmail.com"
            ));
            assert_eq!(config.email.from_name, "PitCall");

            assert_eq!(config.tenants.len(), 2);
            assert_eq!(config.tenants[0].display_name(), "Garage Test");
            assert_eq!(config.tenants[1].display_name(), "Garage Martin & Fils");
            assert_eq!(config.tenants[1].from_email.as_deref(), Some("louis@example.com"));

            match &config.periods[1] {
                PeriodConfig::Fixed { start, end, .. } => {
                    assert_eq!(start.to_string(), "2025-11-25 10:00:00");
                    assert_eq!(end.to_string(), "2025-11-25 15:00:00");
                }
                other => panic!("expected fixed period, got {other:?}"),
            }
            Ok(())
        });
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "concurrency: 2\n")?;
            jail.set_env("CALLKPI_CONCURRENCY", "6");
            jail.set_env("CALLKPI_DATABASE__POOL__MAX_CONNECTIONS", "2");
            jail.set_env("DATABASE_URL", "sqlite://other.db");
            jail.set_env("CALLKPI_CONFIG", "test.yaml");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.concurrency, 6);
            assert_eq!(config.database.pool.max_connections, 2);
            assert_eq!(config.database.url, "sqlite://other.db");
            assert!(config.database_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_no_send_skips_sender_validation() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                "email:\n  type: file\n  path: ./emails\n  from_email: not-an-address\n",
            )?;
            assert!(Config::load(&args("test.yaml")).is_err());

            let config = Config::load(&Args {
                no_send: true,
                ..args("test.yaml")
            })?;
            assert!(!config.send_reports);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "concurency: 2\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let config = Config {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_timeout() {
        let config = Config {
            fetch_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_read_only_with_migrations() {
        let mut config = Config::default();
        config.database.run_migrations = true;
        assert!(config.validate().is_err());

        config.database.read_only = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_periods() {
        let mut config = Config::default();
        config.periods = vec![];
        assert!(config.validate().is_err());

        config.periods = vec![PeriodConfig::Rolling {
            name: "Jour".to_string(),
            slug: "Jour".to_string(),
            days: 0,
        }];
        assert!(config.validate().is_err());

        config.periods = vec![
            PeriodConfig::Rolling {
                name: "Semaine".to_string(),
                slug: "Semaine".to_string(),
                days: 7,
            },
            PeriodConfig::Rolling {
                name: "Semaine bis".to_string(),
                slug: "Semaine".to_string(),
                days: 14,
            },
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate period slug"));

        config.periods = vec![PeriodConfig::Rolling {
            name: "Semaine".to_string(),
            slug: "../Semaine".to_string(),
            days: 7,
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_reversed_fixed_period() {
        let mut config = Config::default();
        config.periods = vec![PeriodConfig::Fixed {
            name: "Janvier".to_string(),
            slug: "Janvier".to_string(),
            start: NaiveDateTime::parse_from_str("2026-01-31 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            end: NaiveDateTime::parse_from_str("2026-01-01 00:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        }];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_tenant_addresses() {
        let mut config = Config::default();
        config.tenants = vec![TenantConfig {
            to_email: Some("not-an-address".to_string()),
            ..TenantConfig::discovered("Garage Test")
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Garage Test"));

        config.tenants = vec![
            TenantConfig::discovered("Garage Test"),
            TenantConfig::discovered("Garage Test"),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
