use std::env;

use crate::error::ConfigError;

/// AppConfig
///
/// Holds the application's entire configuration state. Built once at startup and
/// immutable afterwards; pulled into handlers and the gate via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and cookie security.
    pub env: Env,
    // Address the HTTP listener binds to.
    pub bind_addr: String,
    // Public origin of the site, used to build links in outgoing emails.
    pub site_url: String,
    // Directory holding the compiled web application bundle.
    pub static_dir: String,
    // Where signed-in users land (and are bounced to from /, /login, ...).
    pub app_home: String,
    // When true, missing backend settings disable the gate instead of aborting startup.
    pub fail_open: bool,
    // Hosted backend connection settings. `None` means the gate passes everything through.
    pub backend: Option<BackendConfig>,
}

/// BackendConfig
///
/// Connection settings for the hosted auth service and its Postgres database.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendConfig {
    // Base URL of the project, e.g. https://abc.supabase.co
    pub supabase_url: String,
    // Public anon key sent as the `apikey` header on every auth call.
    pub anon_key: String,
    // Postgres connection string for the `profiles` table.
    pub db_url: String,
    // Optional HS256 secret. When set, access tokens are verified locally.
    pub jwt_secret: Option<String>,
}

/// Env
///
/// Defines the runtime context.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for test setup. No backend, gate fails open.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:3000".to_string(),
            site_url: "http://localhost:3000".to_string(),
            static_dir: "./dist".to_string(),
            app_home: "/dashboard".to_string(),
            fail_open: true,
            backend: None,
        }
    }
}

impl BackendConfig {
    /// from_env
    ///
    /// Reads the backend settings. All of `SUPABASE_URL`, `SUPABASE_ANON_KEY` and
    /// `DATABASE_URL` are required; the JWT secret is optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let supabase_url = required("SUPABASE_URL")?;
        if !(supabase_url.starts_with("http://") || supabase_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                name: "SUPABASE_URL",
                reason: "expected an http(s) URL".to_string(),
            });
        }

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            anon_key: required("SUPABASE_ANON_KEY")?,
            db_url: required("DATABASE_URL")?,
            jwt_secret: optional("SUPABASE_JWT_SECRET"),
        })
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables.
    ///
    /// Backend settings are the only ones that can be missing at runtime. With
    /// `GATE_FAIL_OPEN` unset or true the gate is disabled (`backend = None`);
    /// with `GATE_FAIL_OPEN=false` the error is returned so startup aborts.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let fail_open = match optional("GATE_FAIL_OPEN").as_deref() {
            None => true,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "GATE_FAIL_OPEN",
                    reason: format!("expected true/false, got {other:?}"),
                });
            }
        };

        let app_home = optional("APP_HOME_PATH").unwrap_or_else(|| "/dashboard".to_string());
        if !app_home.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "APP_HOME_PATH",
                reason: "must be an absolute path".to_string(),
            });
        }

        // The caller logs the disabled gate once the subscriber is installed.
        let backend = match BackendConfig::from_env() {
            Ok(backend) => Some(backend),
            Err(_) if fail_open => None,
            Err(err) => return Err(err),
        };

        Ok(Self {
            env,
            bind_addr: optional("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            site_url: optional("SITE_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            static_dir: optional("STATIC_DIR").unwrap_or_else(|| "./dist".to_string()),
            app_home,
            fail_open,
            backend,
        })
    }

    /// Session cookies only carry `Secure` when served over HTTPS in production.
    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
