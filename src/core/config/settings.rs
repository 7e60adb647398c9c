use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_cors_origins, parse_environment, parse_u16,
    parse_u32, parse_u64,
};
use super::secret::load_or_create_secret_key;
use super::types::{
    AdminSettings, ApiSettings, AttemptSettings, ConfigError, CorsSettings, DatabaseSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("CBT_HOST", "0.0.0.0");
        let port = env_or_default("CBT_PORT", "8000");

        let environment =
            parse_environment(env_optional("CBT_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("CBT_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "FARMS CBT API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key = match env_optional("SECRET_KEY") {
            Some(value) => value,
            None => load_or_create_secret_key(),
        };

        let access_token_expire_minutes = parse_u64(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            env_or_default("ACCESS_TOKEN_EXPIRE_MINUTES", "10080"),
        )?;
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_cors_origins(env_optional("BACKEND_CORS_ORIGINS"))?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "cbtsuperuser");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "farms_cbt_db");
        let database_url = env_optional("DATABASE_URL");

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let max_concurrent_attempts = parse_u64(
            "MAX_CONCURRENT_ATTEMPTS",
            env_or_default("MAX_CONCURRENT_ATTEMPTS", "150"),
        )?;
        let heartbeat_interval_seconds = parse_u64(
            "HEARTBEAT_INTERVAL_SECONDS",
            env_or_default("HEARTBEAT_INTERVAL_SECONDS", "1"),
        )?;
        let finalize_max_retries =
            parse_u32("FINALIZE_MAX_RETRIES", env_or_default("FINALIZE_MAX_RETRIES", "3"))?;
        let stale_stub_grace_seconds = parse_u64(
            "STALE_STUB_GRACE_SECONDS",
            env_or_default("STALE_STUB_GRACE_SECONDS", "300"),
        )?;

        let first_superuser_email =
            env_or_default("FIRST_SUPERUSER_EMAIL", "admin@cssfarms.local");
        let first_superuser_password = env_or_default("FIRST_SUPERUSER_PASSWORD", "");

        let log_level = env_or_default("CBT_LOG_LEVEL", "info");
        let json = env_optional("CBT_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, access_token_expire_minutes, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            attempt: AttemptSettings {
                max_concurrent_attempts,
                heartbeat_interval_seconds,
                finalize_max_retries,
                stale_stub_grace_seconds,
            },
            admin: AdminSettings { first_superuser_email, first_superuser_password },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn attempt(&self) -> &AttemptSettings {
        &self.attempt
    }

    pub(crate) fn admin(&self) -> &AdminSettings {
        &self.admin
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.attempt.heartbeat_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "HEARTBEAT_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        if self.attempt.finalize_max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "FINALIZE_MAX_RETRIES",
                value: "0".to_string(),
            });
        }

        if !(self.runtime.strict_config || self.runtime.environment.is_production()) {
            return Ok(());
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if self.admin.first_superuser_password.is_empty() {
            return Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn load_applies_defaults() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("CBT_PORT");
        std::env::remove_var("HEARTBEAT_INTERVAL_SECONDS");

        let settings = Settings::load().expect("settings");

        assert_eq!(settings.server_port(), 8000);
        assert_eq!(settings.attempt().heartbeat_interval_seconds, 1);
        assert_eq!(settings.api().api_v1_str, "/api/v1");
    }

    #[tokio::test]
    async fn strict_config_requires_superuser_password() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("CBT_STRICT_CONFIG", "1");
        std::env::remove_var("FIRST_SUPERUSER_PASSWORD");

        let result = Settings::load();
        assert!(matches!(result, Err(ConfigError::MissingSecret("FIRST_SUPERUSER_PASSWORD"))));

        std::env::remove_var("CBT_STRICT_CONFIG");
    }
}
