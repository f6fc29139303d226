use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub auth: AuthConfig,
    pub stream: StreamConfig,
    pub redis: Option<RedisConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Heartbeat cadence for open event streams, in seconds
    pub heartbeat_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Config("JWT_SECRET is required".to_string()))?;

        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| AppError::Config(format!("invalid APP_PORT: {}", e)))?,
            },
            auth: AuthConfig { jwt_secret },
            stream: StreamConfig {
                heartbeat_secs: std::env::var("STREAM_HEARTBEAT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .map_err(|e| {
                        AppError::Config(format!("invalid STREAM_HEARTBEAT_SECS: {}", e))
                    })?,
            },
            redis: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.is_empty())
                .map(|url| RedisConfig { url }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_requires_jwt_secret() {
        std::env::remove_var("JWT_SECRET");
        assert!(Config::from_env().is_err());

        std::env::set_var("JWT_SECRET", "test-secret");
        let config = Config::from_env().unwrap();
        assert_eq!(config.app.port, 8080);
        assert_eq!(config.stream.heartbeat_secs, 30);
        assert!(config.redis.is_none());
        std::env::remove_var("JWT_SECRET");
    }
}
