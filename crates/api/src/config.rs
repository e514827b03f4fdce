//! Environment-driven configuration (spec §6). Loaded once at startup into
//! a plain struct, no `OnceLock` memoisation here, unlike `jwt::get_jwt_config`,
//! because `Config` is built exactly once in `main` and then handed around
//! inside `AppState` rather than reached for lazily from arbitrary call sites.

use std::env;

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env_var(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub struct Config {
    pub server_port: u16,
    pub environment: String,

    pub database_url: String,

    pub engine_dsn_template: String,
    pub engine_default_catalog: String,
    pub engine_default_schema: String,

    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,

    pub google_oauth_client_id: Option<String>,
    pub google_oauth_client_secret: Option<String>,
    pub google_oauth_redirect_url: Option<String>,

    pub smtp: Option<mitsume_core::mailer::SmtpConfig>,

    pub cache_enabled: bool,
    pub redis_url: String,
    pub cache_key_prefix: String,
    pub cache_ttl_high_secs: u64,
    pub cache_ttl_normal_secs: u64,
    pub cache_ttl_low_secs: u64,

    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_password_min_length: usize,

    pub rate_limit_enabled: bool,
    pub rate_limit_rpm: u32,
    pub rate_limit_burst: u32,

    pub trusted_proxy_cidrs: Vec<String>,
}

impl Config {
    /// # Panics
    /// Panics with a diagnostic if `DATABASE_URL` or `JWT_SECRET` are unset
    /// outside development mode, mirroring `mitsume_auth::jwt`'s fail-fast
    /// startup check.
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "production".to_string());
        let is_dev = environment == "development" || environment == "dev";

        let database_url = env_var("DATABASE_URL").unwrap_or_else(|| {
            if is_dev {
                "postgres://localhost/mitsume".to_string()
            } else {
                panic!("DATABASE_URL is required outside development mode");
            }
        });

        let jwt_secret = env_var("JWT_SECRET").unwrap_or_else(|| {
            if is_dev {
                tracing::warn!("JWT_SECRET not set, using insecure development secret");
                "INSECURE_DEV_SECRET_DO_NOT_USE_IN_PRODUCTION_12345".to_string()
            } else {
                panic!("JWT_SECRET is required outside development mode");
            }
        });

        let smtp_host = env_var("SMTP_HOST");
        let smtp = smtp_host.map(|host| mitsume_core::mailer::SmtpConfig {
            host,
            port: env_parse("SMTP_PORT", 587u16),
            username: env_var("SMTP_USER").unwrap_or_default(),
            password: env_var("SMTP_PASSWORD").unwrap_or_default(),
            from: env_var("SMTP_FROM").unwrap_or_else(|| "mitsume@localhost".to_string()),
            use_tls: env_parse("SMTP_USE_TLS", true),
        });

        Self {
            server_port: env_parse("SERVER_PORT", 8080),
            environment,

            database_url,

            engine_dsn_template: env_var("ENGINE_DSN_TEMPLATE")
                .unwrap_or_else(|| "postgres://{catalog}-host/{schema}".to_string()),
            engine_default_catalog: env_var("ENGINE_DEFAULT_CATALOG").unwrap_or_else(|| "default".to_string()),
            engine_default_schema: env_var("ENGINE_DEFAULT_SCHEMA").unwrap_or_else(|| "public".to_string()),

            jwt_secret,
            jwt_expiry_hours: env_parse("JWT_EXPIRY_HOURS", 168u64),

            google_oauth_client_id: env_var("GOOGLE_OAUTH_CLIENT_ID"),
            google_oauth_client_secret: env_var("GOOGLE_OAUTH_CLIENT_SECRET"),
            google_oauth_redirect_url: env_var("GOOGLE_OAUTH_REDIRECT_URL"),

            smtp,

            cache_enabled: env_parse("CACHE_ENABLED", true),
            redis_url: env_var("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379".to_string()),
            cache_key_prefix: env_var("CACHE_KEY_PREFIX").unwrap_or_else(|| "mitsume:".to_string()),
            cache_ttl_high_secs: env_parse("CACHE_TTL_HIGH_SECS", 3600u64),
            cache_ttl_normal_secs: env_parse("CACHE_TTL_NORMAL_SECS", 600u64),
            cache_ttl_low_secs: env_parse("CACHE_TTL_LOW_SECS", 60u64),

            admin_username: env_var("ADMIN_USERNAME"),
            admin_password: env_var("ADMIN_PASSWORD"),
            admin_password_min_length: env_parse("ADMIN_PASSWORD_MIN_LENGTH", 12usize),

            rate_limit_enabled: env_parse("RATE_LIMIT_ENABLED", true),
            rate_limit_rpm: env_parse("RATE_LIMIT_RPM", 600u32),
            rate_limit_burst: env_parse("RATE_LIMIT_BURST", 100u32),

            trusted_proxy_cidrs: env_var("TRUSTED_PROXY_CIDRS")
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn cache_config(&self) -> mitsume_core::cache::CacheConfig {
        mitsume_core::cache::CacheConfig {
            key_prefix: self.cache_key_prefix.clone(),
            ttl_low_secs: self.cache_ttl_low_secs,
            ttl_normal_secs: self.cache_ttl_normal_secs,
            ttl_high_secs: self.cache_ttl_high_secs,
        }
    }
}
