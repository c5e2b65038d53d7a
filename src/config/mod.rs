use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Signing secret used when no JWT_SECRET is configured in development.
const DEV_JWT_SECRET: &str = "bento-development-secret-do-not-use-in-production";

pub const MAX_SESSION_TTL_HOURS: u64 = 24 * 365;
pub const MAX_INVITATION_EXPIRY_DAYS: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub mail: MailConfig,
    pub invitations: InvitationConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL, used to build links in outgoing mail
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub session_ttl_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub from_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationConfig {
    pub expiry_days: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("BENTO_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("BENTO_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if let Ok(v) = env::var("API_BASE_URL") {
            self.server.base_url = v.trim_end_matches('/').to_string();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v.parse().unwrap_or(self.security.session_ttl_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Mail and invitations
        if let Ok(v) = env::var("BENTO_FROM_EMAIL") {
            self.mail.from_email = v;
        }
        if let Ok(v) = env::var("INVITATION_EXPIRY_DAYS") {
            self.invitations.expiry_days = v.parse().unwrap_or(self.invitations.expiry_days);
        }

        self
    }

    /// Reject configurations that cannot run safely in the selected environment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        if self.environment != Environment::Development {
            if self.security.jwt_secret == DEV_JWT_SECRET {
                return Err(ConfigError::Missing("JWT_SECRET"));
            }
            if self.database.url.is_none() {
                return Err(ConfigError::Missing("DATABASE_URL"));
            }
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.security.session_ttl_hours) {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_HOURS",
                reason: format!("must be between 1 and {}", MAX_SESSION_TTL_HOURS),
            });
        }
        if !(1..=MAX_INVITATION_EXPIRY_DAYS).contains(&self.invitations.expiry_days) {
            return Err(ConfigError::Invalid {
                key: "INVITATION_EXPIRY_DAYS",
                reason: format!("must be between 1 and {}", MAX_INVITATION_EXPIRY_DAYS),
            });
        }
        if !self.mail.from_email.contains('@') {
            return Err(ConfigError::Invalid {
                key: "BENTO_FROM_EMAIL",
                reason: format!("'{}' is not an email address", self.mail.from_email),
            });
        }
        Ok(())
    }

    /// Copy of the config that is safe to print or log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.security.jwt_secret = "<redacted>".to_string();
        if let Some(url) = copy.database.url.as_deref() {
            copy.database.url = Some(redact_database_url(url));
        }
        copy
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                base_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            security: SecurityConfig {
                jwt_secret: DEV_JWT_SECRET.to_string(),
                session_ttl_hours: 24 * 7, // 1 week
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            mail: MailConfig {
                from_email: "hello@localhost.test".to_string(),
            },
            invitations: InvitationConfig { expiry_days: 7 },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                base_url: "https://staging.bento.example.com".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                run_migrations: true,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.bento.example.com".to_string()],
            },
            mail: MailConfig {
                from_email: "hello@staging.bento.example.com".to_string(),
            },
            invitations: InvitationConfig { expiry_days: 7 },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                base_url: "https://app.bento.example.com".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                session_ttl_hours: 12,
                enable_cors: true,
                cors_origins: vec!["https://app.bento.example.com".to_string()],
            },
            mail: MailConfig {
                from_email: "hello@bento.example.com".to_string(),
            },
            invitations: InvitationConfig { expiry_days: 3 },
        }
    }
}

fn redact_database_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut url) => {
            if url.password().is_some() && url.set_password(Some("****")).is_err() {
                return "<unparseable>".to_string();
            }
            url.to_string()
        }
        Err(_) => "<unparseable>".to_string(),
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}
