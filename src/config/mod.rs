use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub refresh: RefreshConfig,
    pub signing: SigningConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Client-side URL refresh behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    pub buffer_ms: u64,
    pub auto_refresh: bool,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub tick_ms: u64,
}

/// Signed blob URL issuing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(skip_serializing, default)]
    pub secret: String,
    pub base_url: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub request_timeout_secs: u64,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Refresh overrides
        if let Ok(v) = env::var("REFRESH_BUFFER_MS") {
            self.refresh.buffer_ms = v.parse().unwrap_or(self.refresh.buffer_ms);
        }
        if let Ok(v) = env::var("REFRESH_AUTO") {
            self.refresh.auto_refresh = v.parse().unwrap_or(self.refresh.auto_refresh);
        }
        if let Ok(v) = env::var("REFRESH_MAX_RETRIES") {
            self.refresh.max_retries = v.parse().unwrap_or(self.refresh.max_retries);
        }
        if let Ok(v) = env::var("REFRESH_RETRY_BASE_MS") {
            self.refresh.retry_base_ms = v.parse().unwrap_or(self.refresh.retry_base_ms);
        }
        if let Ok(v) = env::var("REFRESH_TICK_MS") {
            self.refresh.tick_ms = v.parse().unwrap_or(self.refresh.tick_ms);
        }

        // Signing overrides
        if let Ok(v) = env::var("SIGNING_SECRET") {
            self.signing.secret = v;
        }
        if let Ok(v) = env::var("SIGNING_BASE_URL") {
            self.signing.base_url = v;
        }
        if let Ok(v) = env::var("SIGNING_TTL_SECS") {
            self.signing.ttl_secs = v.parse().unwrap_or(self.signing.ttl_secs);
        }

        // API overrides
        if let Some(port) = env::var("API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.api.port = port;
        }
        if let Ok(v) = env::var("API_REQUEST_TIMEOUT_SECS") {
            self.api.request_timeout_secs = v.parse().unwrap_or(self.api.request_timeout_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            refresh: RefreshConfig {
                buffer_ms: 5 * 60 * 1000,
                auto_refresh: true,
                max_retries: 3,
                retry_base_ms: 1000,
                tick_ms: 1000,
            },
            signing: SigningConfig {
                secret: "development-signing-secret".to_string(),
                base_url: "http://localhost:3000/blobs".to_string(),
                ttl_secs: 15 * 60,
            },
            api: ApiConfig {
                port: 3000,
                request_timeout_secs: 30,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:3001".to_string()],
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            refresh: RefreshConfig {
                buffer_ms: 5 * 60 * 1000,
                auto_refresh: true,
                max_retries: 3,
                retry_base_ms: 1000,
                tick_ms: 1000,
            },
            signing: SigningConfig {
                secret: String::new(),
                base_url: "https://staging.wfzo.org/blobs".to_string(),
                ttl_secs: 30 * 60,
            },
            api: ApiConfig {
                port: 3000,
                request_timeout_secs: 10,
                enable_request_logging: true,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://staging.wfzo.org".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            refresh: RefreshConfig {
                buffer_ms: 5 * 60 * 1000,
                auto_refresh: true,
                max_retries: 3,
                retry_base_ms: 1000,
                tick_ms: 1000,
            },
            signing: SigningConfig {
                secret: String::new(),
                base_url: "https://www.wfzo.org/blobs".to_string(),
                ttl_secs: 60 * 60,
            },
            api: ApiConfig {
                port: 3000,
                request_timeout_secs: 5,
                enable_request_logging: false,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://www.wfzo.org".to_string()],
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
