use chrono::TimeDelta;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

use crate::datasource::{FeedKind, FileFeedSource, LoadOptions};
use crate::domain::{Amount, Basket, CurrencyCode};
use crate::orchestration::PipelineOptions;
use crate::session::{SessionStore, DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS};

/// Finest unification resolution the service accepts.
pub const MIN_RESOLUTION_SECS: i64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub daily_path: Option<String>,
    pub minute_path: Option<String>,
    pub tick_path: Option<String>,
    pub weights_path: Option<String>,
    pub data_tz: Tz,
    pub resolution_secs: i64,
    pub starting_cash: Amount,
    pub session_ttl_secs: u64,
    pub max_sessions: usize,
    pub preferred_price_column: String,
    pub basket_currencies: Option<Vec<CurrencyCode>>,
    pub demo_mode: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let path = |key: &str| {
            env_map
                .get(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let daily_path = path("DAILY_PATH");
        let minute_path = path("MINUTE_PATH");
        let tick_path = path("TICK_PATH");
        let weights_path = path("WEIGHTS_PATH");

        let data_tz = env_map
            .get("DATA_TZ")
            .map(|s| s.trim())
            .unwrap_or("UTC")
            .parse::<Tz>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "DATA_TZ".to_string(),
                    "must be an IANA time zone name".to_string(),
                )
            })?;

        let resolution_secs = env_map
            .get("RESOLUTION_SECS")
            .map(|s| s.as_str())
            .unwrap_or("60")
            .parse::<i64>()
            .ok()
            .filter(|&secs| secs >= MIN_RESOLUTION_SECS)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "RESOLUTION_SECS".to_string(),
                    format!("must be an integer >= {}", MIN_RESOLUTION_SECS),
                )
            })?;

        let starting_cash = env_map
            .get("STARTING_CASH")
            .map(|s| s.as_str())
            .unwrap_or("100000")
            .parse::<Amount>()
            .ok()
            .filter(|cash| !cash.inner().is_sign_negative())
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "STARTING_CASH".to_string(),
                    "must be a non-negative decimal".to_string(),
                )
            })?;

        let session_ttl_secs = match env_map.get("SESSION_TTL_SECS") {
            Some(raw) => raw.trim().parse::<u64>().ok().filter(|&secs| secs > 0),
            None => Some(DEFAULT_IDLE_TTL.as_secs()),
        }
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                "SESSION_TTL_SECS".to_string(),
                "must be a positive integer".to_string(),
            )
        })?;

        let max_sessions = match env_map.get("MAX_SESSIONS") {
            Some(raw) => raw.trim().parse::<usize>().ok().filter(|&n| n > 0),
            None => Some(DEFAULT_MAX_SESSIONS),
        }
        .ok_or_else(|| {
            ConfigError::InvalidValue(
                "MAX_SESSIONS".to_string(),
                "must be a positive integer".to_string(),
            )
        })?;

        let preferred_price_column = env_map
            .get("PREFERRED_PRICE_COLUMN")
            .cloned()
            .unwrap_or_else(|| "USD=".to_string());

        let basket_currencies = parse_basket_currencies_from_map(&env_map)?;

        let demo_mode = match env_map
            .get("DEMO_MODE")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
            .unwrap_or("false")
        {
            "1" | "true" | "yes" => true,
            "0" | "false" | "no" | "" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "DEMO_MODE".to_string(),
                    format!("must be true or false, got {}", other),
                ))
            }
        };

        if !demo_mode && daily_path.is_none() && minute_path.is_none() && tick_path.is_none() {
            return Err(ConfigError::MissingEnv(
                "DAILY_PATH, MINUTE_PATH or TICK_PATH".to_string(),
            ));
        }

        Ok(Config {
            port,
            daily_path,
            minute_path,
            tick_path,
            weights_path,
            data_tz,
            resolution_secs,
            starting_cash,
            session_ttl_secs,
            max_sessions,
            preferred_price_column,
            basket_currencies,
            demo_mode,
        })
    }

    pub fn resolution(&self) -> TimeDelta {
        TimeDelta::seconds(self.resolution_secs)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            load: LoadOptions {
                zone: self.data_tz,
                preferred_column: self.preferred_price_column.clone(),
                ..LoadOptions::default()
            },
            resolution: self.resolution(),
            basket: self
                .basket_currencies
                .as_ref()
                .map(|codes| Basket::new(codes.iter().copied())),
        }
    }

    pub fn session_store(&self) -> SessionStore {
        SessionStore::new(self.starting_cash)
            .with_idle_ttl(Duration::from_secs(self.session_ttl_secs))
            .with_max_sessions(self.max_sessions)
    }

    /// File-backed source for every configured feed path.
    pub fn file_source(&self) -> FileFeedSource {
        FileFeedSource::new()
            .with_optional_path(FeedKind::Daily, self.daily_path.as_deref())
            .with_optional_path(FeedKind::Minute, self.minute_path.as_deref())
            .with_optional_path(FeedKind::Tick, self.tick_path.as_deref())
            .with_optional_path(FeedKind::Weights, self.weights_path.as_deref())
    }
}

fn parse_basket_currencies_from_map(
    env_map: &HashMap<String, String>,
) -> Result<Option<Vec<CurrencyCode>>, ConfigError> {
    let Some(list) = env_map.get("BASKET_CURRENCIES") else {
        return Ok(None);
    };
    let codes = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            CurrencyCode::parse(s).map_err(|e| {
                ConfigError::InvalidValue("BASKET_CURRENCIES".to_string(), e.to_string())
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((!codes.is_empty()).then_some(codes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DAILY_PATH".to_string(), "/data/daily.csv".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_tz, Tz::UTC);
        assert_eq!(config.resolution(), TimeDelta::minutes(1));
        assert_eq!(config.starting_cash, "100000".parse::<Amount>().unwrap());
        assert_eq!(config.preferred_price_column, "USD=");
        assert!(config.basket_currencies.is_none());
        assert!(!config.demo_mode);
        assert!(config.weights_path.is_none());
        assert_eq!(config.session_ttl_secs, 86_400);
        assert_eq!(config.max_sessions, 10_000);
    }

    #[test]
    fn test_session_limits() {
        let mut env_map = setup_required_env();
        env_map.insert("SESSION_TTL_SECS".to_string(), "600".to_string());
        env_map.insert("MAX_SESSIONS".to_string(), "5".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.max_sessions, 5);

        let mut env_map = setup_required_env();
        env_map.insert("MAX_SESSIONS".to_string(), "0".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "MAX_SESSIONS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_missing_feed_paths() {
        let result = Config::from_env_map(HashMap::new());
        match result {
            Err(ConfigError::MissingEnv(s)) => assert!(s.contains("DAILY_PATH")),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_demo_mode_needs_no_paths() {
        let mut env_map = HashMap::new();
        env_map.insert("DEMO_MODE".to_string(), "true".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.demo_mode);
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_resolution_below_one_minute_is_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("RESOLUTION_SECS".to_string(), "30".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RESOLUTION_SECS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_time_zone() {
        let mut env_map = setup_required_env();
        env_map.insert("DATA_TZ".to_string(), "Mars/Olympus".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DATA_TZ"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_basket_currencies_parsed() {
        let mut env_map = setup_required_env();
        env_map.insert("BASKET_CURRENCIES".to_string(), "usd, EUR= ,jpy".to_string());
        env_map.insert("DATA_TZ".to_string(), "America/New_York".to_string());
        let config = Config::from_env_map(env_map).unwrap();

        let codes: Vec<&str> = config
            .basket_currencies
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.as_str())
            .collect();
        assert_eq!(codes, vec!["USD", "EUR", "JPY"]);

        let options = config.pipeline_options();
        assert_eq!(options.load.zone, chrono_tz::America::New_York);
        assert_eq!(options.basket.unwrap().currencies().len(), 3);
    }

    #[test]
    fn test_invalid_basket_currency() {
        let mut env_map = setup_required_env();
        env_map.insert("BASKET_CURRENCIES".to_string(), "USD,EURO".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BASKET_CURRENCIES"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_demo_mode() {
        let mut env_map = setup_required_env();
        env_map.insert("DEMO_MODE".to_string(), "maybe".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "DEMO_MODE"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_file_source_uses_configured_paths() {
        let mut env_map = setup_required_env();
        env_map.insert("WEIGHTS_PATH".to_string(), "/data/weights.csv".to_string());
        let source = Config::from_env_map(env_map).unwrap().file_source();
        assert!(source.path(FeedKind::Daily).is_some());
        assert!(source.path(FeedKind::Weights).is_some());
        assert!(source.path(FeedKind::Tick).is_none());
    }
}
