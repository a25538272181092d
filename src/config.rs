use crate::models::SeasonPeriod;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Journal database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub retention_days: i64,
}

/// Repricing engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sales analysis window in days
    pub analytics_days: u32,
    /// Maximum number of priced items pulled per run
    pub products_limit: usize,
    /// Items per write-side submission
    pub batch_size: usize,
    pub submit_timeout_secs: u64,
    /// Reported days-without-sales for items with no sale in the window
    pub no_sales_ceiling_days: i64,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub dry_run: bool,
    pub interval_hours: u32,
    pub interval_minutes: u32,
    /// "HH:MM"; takes precedence over the interval when set
    pub daily_at: Option<String>,
    pub max_history: usize,
}

/// Thresholds for every pricing strategy plus their priority order
#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub enabled: Vec<String>,

    pub stock_low_threshold: i64,
    pub stock_low_markup: Decimal,
    pub stock_high_threshold: i64,
    pub stock_high_discount: i32,

    pub turnover_understock_days: f64,
    pub turnover_markup: Decimal,
    pub turnover_overstock_days: f64,
    pub turnover_discount_delta: i32,
    pub turnover_max_discount: i32,

    pub conv_no_sales_days: i64,
    pub conv_discount_delta: i32,
    pub conv_max_discount: i32,
    pub conv_fast_threshold: f64,
    pub conv_fast_markup: Decimal,

    pub margin_target: Decimal,
    pub margin_commission: Decimal,
    pub margin_tolerance: Decimal,
    pub margin_cost_prices_path: Option<String>,

    pub season_periods: Vec<SeasonPeriod>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub scheduler: SchedulerConfig,
    pub strategies: StrategyConfig,
    pub log_level: String,
    pub snapshot_path: String,
    pub outbox_path: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: Decimal) -> Result<Decimal, String> {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map_err(|e| format!("Invalid {}: {} ({})", key, raw, e)),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("JOURNAL_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://price_history.db".to_string());

        let max_connections = env_or("JOURNAL_MAX_CONNECTIONS", 1u32);
        let acquire_timeout_secs = env_or("JOURNAL_ACQUIRE_TIMEOUT_SECS", 30u64);
        let retention_days = env_or("JOURNAL_RETENTION_DAYS", 90i64);

        if !url.starts_with("sqlite:") {
            return Err(format!("JOURNAL_DATABASE_URL must be a sqlite URL, got {}", url));
        }

        if max_connections == 0 {
            return Err("JOURNAL_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        if acquire_timeout_secs == 0 {
            return Err("JOURNAL_ACQUIRE_TIMEOUT_SECS must be greater than 0".to_string());
        }

        if retention_days <= 0 {
            return Err("JOURNAL_RETENTION_DAYS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            retention_days,
        })
    }

    /// In-memory journal, one connection
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    /// Get acquire timeout as Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://price_history.db".to_string(),
            max_connections: 1,
            acquire_timeout_secs: 30,
            retention_days: 90,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, String> {
        let config = Self {
            analytics_days: env_or("ENGINE_ANALYTICS_DAYS", 30u32),
            products_limit: env_or("ENGINE_PRODUCTS_LIMIT", 1000usize),
            batch_size: env_or("ENGINE_BATCH_SIZE", 1000usize),
            submit_timeout_secs: env_or("ENGINE_SUBMIT_TIMEOUT_SECS", 30u64),
            no_sales_ceiling_days: env_or("ENGINE_NO_SALES_CEILING_DAYS", 30i64),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.analytics_days == 0 {
            return Err("ENGINE_ANALYTICS_DAYS must be greater than 0".to_string());
        }
        if self.batch_size == 0 {
            return Err("ENGINE_BATCH_SIZE must be greater than 0".to_string());
        }
        if self.submit_timeout_secs == 0 {
            return Err("ENGINE_SUBMIT_TIMEOUT_SECS must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Get write-side submission timeout as Duration
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analytics_days: 30,
            products_limit: 1000,
            batch_size: 1000,
            submit_timeout_secs: 30,
            no_sales_ceiling_days: 30,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Result<Self, String> {
        let daily_at = env::var("SCHEDULER_DAILY_AT")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let config = Self {
            dry_run: env_or("SCHEDULER_DRY_RUN", true),
            interval_hours: env_or("SCHEDULER_INTERVAL_HOURS", 4u32),
            interval_minutes: env_or("SCHEDULER_INTERVAL_MINUTES", 0u32),
            daily_at,
            max_history: env_or("SCHEDULER_MAX_HISTORY", 50usize),
        };

        if config.daily_at.is_none() && config.interval_hours == 0 && config.interval_minutes == 0 {
            return Err("Scheduler interval must be greater than zero".to_string());
        }
        if config.max_history == 0 {
            return Err("SCHEDULER_MAX_HISTORY must be greater than 0".to_string());
        }

        Ok(config)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            interval_hours: 4,
            interval_minutes: 0,
            daily_at: None,
            max_history: 50,
        }
    }
}

/// Parse `name|MM-DD|MM-DD|discount_add|price_mult` entries separated by `;`
pub fn parse_season_periods(raw: &str) -> Result<Vec<SeasonPeriod>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split('|').map(str::trim).collect();
            if parts.len() != 5 {
                return Err(format!("Invalid season period '{}': expected 5 fields", entry));
            }
            let discount_add = parts[3]
                .parse::<i32>()
                .map_err(|e| format!("Invalid discount in '{}': {}", entry, e))?;
            let price_mult = Decimal::from_str(parts[4])
                .map_err(|e| format!("Invalid multiplier in '{}': {}", entry, e))?;
            SeasonPeriod::parse(parts[0], parts[1], parts[2], discount_add, price_mult)
        })
        .collect()
}

impl StrategyConfig {
    pub fn from_env() -> Result<Self, String> {
        let defaults = Self::default();

        let enabled = match env::var("STRATEGIES") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.enabled.clone(),
        };

        let season_periods = match env::var("SEASON_PERIODS") {
            Ok(raw) => parse_season_periods(&raw)?,
            Err(_) => defaults.season_periods.clone(),
        };

        let config = Self {
            enabled,
            stock_low_threshold: env_or("STOCK_LOW_THRESHOLD", defaults.stock_low_threshold),
            stock_low_markup: env_decimal("STOCK_LOW_MARKUP", defaults.stock_low_markup)?,
            stock_high_threshold: env_or("STOCK_HIGH_THRESHOLD", defaults.stock_high_threshold),
            stock_high_discount: env_or("STOCK_HIGH_DISCOUNT", defaults.stock_high_discount),
            turnover_understock_days: env_or("TURNOVER_UNDERSTOCK_DAYS", defaults.turnover_understock_days),
            turnover_markup: env_decimal("TURNOVER_MARKUP", defaults.turnover_markup)?,
            turnover_overstock_days: env_or("TURNOVER_OVERSTOCK_DAYS", defaults.turnover_overstock_days),
            turnover_discount_delta: env_or("TURNOVER_DISCOUNT_DELTA", defaults.turnover_discount_delta),
            turnover_max_discount: env_or("TURNOVER_MAX_DISCOUNT", defaults.turnover_max_discount),
            conv_no_sales_days: env_or("CONV_NO_SALES_DAYS", defaults.conv_no_sales_days),
            conv_discount_delta: env_or("CONV_DISCOUNT_DELTA", defaults.conv_discount_delta),
            conv_max_discount: env_or("CONV_MAX_DISCOUNT", defaults.conv_max_discount),
            conv_fast_threshold: env_or("CONV_FAST_THRESHOLD", defaults.conv_fast_threshold),
            conv_fast_markup: env_decimal("CONV_FAST_MARKUP", defaults.conv_fast_markup)?,
            margin_target: env_decimal("MARGIN_TARGET", defaults.margin_target)?,
            margin_commission: env_decimal("MARGIN_COMMISSION", defaults.margin_commission)?,
            margin_tolerance: env_decimal("MARGIN_TOLERANCE", defaults.margin_tolerance)?,
            margin_cost_prices_path: env::var("MARGIN_COST_PRICES_PATH").ok(),
            season_periods,
        };

        if config.enabled.is_empty() {
            return Err("STRATEGIES must name at least one strategy".to_string());
        }

        Ok(config)
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                "stock".to_string(),
                "conversion".to_string(),
                "season".to_string(),
            ],
            stock_low_threshold: 10,
            stock_low_markup: Decimal::new(10, 2),
            stock_high_threshold: 150,
            stock_high_discount: 5,
            turnover_understock_days: 7.0,
            turnover_markup: Decimal::new(10, 2),
            turnover_overstock_days: 60.0,
            turnover_discount_delta: 7,
            turnover_max_discount: 60,
            conv_no_sales_days: 7,
            conv_discount_delta: 5,
            conv_max_discount: 50,
            conv_fast_threshold: 5.0,
            conv_fast_markup: Decimal::new(5, 2),
            margin_target: Decimal::new(20, 2),
            margin_commission: Decimal::new(15, 2),
            margin_tolerance: Decimal::new(5, 2),
            margin_cost_prices_path: None,
            season_periods: parse_season_periods(
                "Black Friday|11-20|12-05|10|1.0;New Year sale|12-20|01-05|15|1.0",
            )
            .unwrap_or_default(),
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let engine = EngineConfig::from_env()?;
        let scheduler = SchedulerConfig::from_env()?;
        let strategies = StrategyConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string());

        // Validate log level
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let snapshot_path = env::var("SNAPSHOT_PATH")
            .unwrap_or_else(|_| "catalog_snapshot.json".to_string());
        let outbox_path = env::var("OUTBOX_PATH")
            .unwrap_or_else(|_| "price_outbox.jsonl".to_string());

        Ok(Self {
            database,
            engine,
            scheduler,
            strategies,
            log_level: log_level.to_lowercase(),
            snapshot_path,
            outbox_path,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            engine: EngineConfig::default(),
            scheduler: SchedulerConfig::default(),
            strategies: StrategyConfig::default(),
            log_level: "info".to_string(),
            snapshot_path: "catalog_snapshot.json".to_string(),
            outbox_path: "price_outbox.jsonl".to_string(),
        }
    }
}
