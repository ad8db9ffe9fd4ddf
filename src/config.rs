use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for the MediMind gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used for verification, independent of the caller's choice.
    pub verify_model: String,
    pub tts_model: String,
    /// Sample rate of PCM audio returned by the TTS model.
    pub tts_sample_rate: u32,
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// ALWAYS returns a valid config - never fails.
    pub fn load() -> Self {
        if dotenvy::dotenv().is_ok() {
            tracing::info!("Loaded environment from .env");
        }

        let config_path =
            env::var("MEDIMIND_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = env::var("MEDIMIND_BIND") {
            self.server.bind = bind;
        }

        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Ok(pool_size) = env::var("MEDIMIND_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.redis.pool.max_size = size;
            }
        }

        if let Ok(api_key) = env::var("GEMINI_API_KEY") {
            self.gemini.api_key = api_key;
        }
        if let Ok(base_url) = env::var("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Ok(verify_model) = env::var("GEMINI_VERIFY_MODEL") {
            self.gemini.verify_model = verify_model;
        }
        if let Ok(tts_model) = env::var("GEMINI_TTS_MODEL") {
            self.gemini.tts_model = tts_model;
        }
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }
        if self.gemini.api_key.is_empty() {
            return Err("GEMINI_API_KEY environment variable must be set".into());
        }
        if self.gemini.tts_sample_rate == 0 {
            return Err("TTS sample rate cannot be 0".into());
        }
        Ok(())
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD").unwrap_or_else(|_| {
            tracing::debug!("REDIS_PASSWORD not set, assuming no password");
            "".to_string()
        });

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "medimind".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:8787".to_string(),
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                pool: PoolConfig {
                    max_size: 16,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
            },
            gemini: GeminiConfig {
                api_key: env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("GEMINI_API_KEY not set; gateway calls will be rejected");
                    String::new()
                }),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                verify_model: "gemini-3-pro-preview".to_string(),
                tts_model: "gemini-2.5-flash-preview-tts".to_string(),
                tts_sample_rate: 24000,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_are_fixed() {
        let cfg = Config::default();
        assert_eq!(cfg.gemini.verify_model, "gemini-3-pro-preview");
        assert_eq!(cfg.gemini.tts_model, "gemini-2.5-flash-preview-tts");
        assert_eq!(cfg.gemini.tts_sample_rate, 24000);
    }

    #[test]
    fn test_redis_url_without_password() {
        let mut cfg = Config::default();
        cfg.redis.host = "example.com".to_string();
        cfg.redis.port = 6380;
        cfg.redis.database = 2;
        // REDIS_PASSWORD is not expected in the test environment
        assert_eq!(cfg.get_redis_url(), "redis://example.com:6380/2");
    }

    #[test]
    fn test_validate_flags_empty_api_key() {
        let mut cfg = Config::default();
        cfg.gemini.api_key = String::new();
        assert!(cfg.validate().is_err());
        cfg.gemini.api_key = "k".to_string();
        assert!(cfg.validate().is_ok());
    }
}
