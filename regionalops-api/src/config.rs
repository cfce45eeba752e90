/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `HOST`: Host to bind to (default: 0.0.0.0)
/// - `PORT`: Port to bind to (default: 3001)
/// - `CORS_ORIGIN`: Comma-separated allowed origins, `*` for any (default: *)
/// - `FRONTEND_URL`: Redirect target of password-reset e-mails (optional)
/// - `PRODUCTION`: `true` enables HSTS (default: false)
/// - `RATE_LIMIT_PER_MINUTE`: Requests per client per minute (default: 300)
/// - `LOGIN_RATE_LIMIT_PER_MINUTE`: Login attempts per client per minute (default: 10)
/// - `MAX_UPLOAD_BYTES`: Largest accepted upload (default: 10 MiB)
/// - `REGIONAL_ALIASES`: `alias:canonical,...` used by the dashboard
/// - `SUPABASE_*`: see [`SupabaseConfig::from_env`]
/// - `RUST_LOG`: Log level (default: regionalops_api=debug,tower_http=debug)
///
/// # Example
///
/// ```no_run
/// use regionalops_api::config::Config;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}:{}", config.api.host, config.api.port);
/// # Ok(())
/// # }
/// ```

use regionalops_shared::dashboard::RegionalAliases;
use regionalops_shared::supabase::SupabaseConfig;
use std::env;
use std::str::FromStr;

/// Default largest upload: 10 MiB
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Supabase project configuration
    pub supabase: SupabaseConfig,

    pub rate_limit: RateLimitConfig,

    pub upload: UploadConfig,

    pub dashboard: DashboardConfig,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` means any)
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS header)
    pub production: bool,

    /// SPA base URL, used as password-reset redirect
    pub frontend_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            cors_origins: vec!["*".to_string()],
            production: false,
            frontend_url: None,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per client per minute, all routes
    pub per_minute: u32,

    /// Attempts per client per minute on `POST /auth/login`
    pub login_per_minute: u32,

    /// Key clients on `X-Forwarded-For`/`X-Real-IP` set by a reverse proxy
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 300,
            login_per_minute: 10,
            trust_proxy: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    pub regional_aliases: RegionalAliases,
}

fn parse_env<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", name, e)),
        _ => Ok(default),
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Configuration with default server settings around `supabase`
    pub fn new(supabase: SupabaseConfig) -> Self {
        Self {
            api: ApiConfig::default(),
            supabase,
            rate_limit: RateLimitConfig::default(),
            upload: UploadConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }

    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let supabase = SupabaseConfig::from_env()?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_env::<u16>("PORT", 3001)?;

        let cors_origins: Vec<String> = env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let production = env::var("PRODUCTION").map(|v| parse_bool(&v)).unwrap_or(false);

        let frontend_url = env::var("FRONTEND_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let per_minute = parse_env::<u32>("RATE_LIMIT_PER_MINUTE", 300)?;
        let login_per_minute = parse_env::<u32>("LOGIN_RATE_LIMIT_PER_MINUTE", 10)?;
        if per_minute == 0 || login_per_minute == 0 {
            anyhow::bail!("Rate limits must be greater than zero");
        }
        let trust_proxy = env::var("TRUST_PROXY").map(|v| parse_bool(&v)).unwrap_or(false);

        let max_bytes = parse_env::<usize>("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let regional_aliases = env::var("REGIONAL_ALIASES")
            .unwrap_or_default()
            .parse::<RegionalAliases>()
            .map_err(|e| anyhow::anyhow!("Invalid REGIONAL_ALIASES: {}", e))?;

        if supabase.service_role_key.is_none() {
            tracing::warn!("SUPABASE_SERVICE_ROLE_KEY not set; user administration is unavailable");
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins: if cors_origins.is_empty() {
                    vec!["*".to_string()]
                } else {
                    cors_origins
                },
                production,
                frontend_url,
            },
            supabase,
            rate_limit: RateLimitConfig {
                per_minute,
                login_per_minute,
                trust_proxy,
            },
            upload: UploadConfig { max_bytes },
            dashboard: DashboardConfig { regional_aliases },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin is allowed
    pub fn cors_permissive(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supabase() -> SupabaseConfig {
        SupabaseConfig {
            url: "http://localhost:54321".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
            jwt_secret: None,
            storage_bucket: "documents".to_string(),
            timeout_secs: 15,
        }
    }

    #[test]
    fn test_bind_address() {
        let mut config = Config::new(supabase());
        config.api.host = "127.0.0.1".to_string();
        config.api.port = 8080;

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_defaults() {
        let config = Config::new(supabase());
        assert_eq!(config.api.port, 3001);
        assert!(config.cors_permissive());
        assert_eq!(config.rate_limit.per_minute, 300);
        assert_eq!(config.rate_limit.login_per_minute, 10);
        assert!(!config.rate_limit.trust_proxy);
        assert_eq!(config.upload.max_bytes, 10 * 1024 * 1024);
        assert!(config.dashboard.regional_aliases.is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool(" 1 "));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
