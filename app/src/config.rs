use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::*;
use r2d2::Pool;
use serde::{Deserialize, Serialize};
use url::Url;

use infra::persistence::CatalogConnectionManager;

const ENV_PREFIX: &str = "BARBACK_";
const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 30_000;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub postgres: PostgresConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    /// Upper bound on any one statement; `0` turns it off.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
}

/// Settings that may come from the environment, e.g. `BARBACK_POSTGRES_URL`.
#[derive(Deserialize, Debug, Default)]
struct EnvOverrides {
    postgres_url: Option<String>,
    pool_size: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_MS
}

fn default_statement_timeout_ms() -> u64 {
    DEFAULT_STATEMENT_TIMEOUT_MS
}

impl Config {
    pub fn from_toml(src: &str) -> Result<Self> {
        let config: Config = toml::from_str(src).context("parse config")?;
        Ok(config)
    }

    /// Applies `BARBACK_*` environment variables on top of the file.
    pub fn with_env_overrides(self) -> Result<Self> {
        let overrides = envy::prefixed(ENV_PREFIX)
            .from_env::<EnvOverrides>()
            .context("read environment")?;
        Ok(self.apply(overrides))
    }

    fn apply(mut self, overrides: EnvOverrides) -> Self {
        if let Some(url) = overrides.postgres_url {
            debug!("postgres url overridden from environment");
            self.postgres.url = url;
        }
        if let Some(size) = overrides.pool_size {
            self.postgres.pool_size = size;
        }
        self
    }
}

impl PostgresConfig {
    pub(crate) fn build(&self) -> Result<Pool<CatalogConnectionManager>> {
        self.check()?;
        let url = Url::parse(&self.url).context("postgres url")?;
        debug!("Build pool for {} (size {})", redacted(&url), self.pool_size);

        let manager = CatalogConnectionManager::new(&self.url, self.statement_timeout())
            .context("connection manager")?;

        let builder = r2d2::Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(Duration::from_millis(self.connection_timeout_ms));

        debug!("Pool builder: {:?}", builder);
        let pool = builder.build(manager).context("build pool")?;

        Ok(pool)
    }

    /// The pool builder panics on a zero size or checkout timeout.
    fn check(&self) -> Result<()> {
        if self.pool_size == 0 {
            bail!("postgres.pool_size must be at least 1");
        }
        if self.connection_timeout_ms == 0 {
            bail!("postgres.connection_timeout_ms must be at least 1");
        }
        Ok(())
    }

    fn statement_timeout(&self) -> Option<Duration> {
        Some(self.statement_timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

fn redacted(url: &Url) -> String {
    let mut url = url.clone();
    if url.password().is_some() {
        // Only fails for urls that cannot carry credentials at all.
        let _ = url.set_password(Some("***"));
    }
    url.to_string()
}

#[derive(Deserialize, Debug, Default)]
pub struct EnvLogger {
    #[serde(default)]
    level: Option<LogLevel>,
    #[serde(default)]
    modules: HashMap<String, LogLevel>,
    #[serde(default)]
    timestamp_nanos: bool,
}

impl LogLevel {
    fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level {
            b.filter_level(level.to_filter());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(module, level.to_filter());
        }

        b.default_format_timestamp_nanos(self.timestamp_nanos);

        b
    }
}
