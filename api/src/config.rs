use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("{name} must be true or false, got {value:?}")]
    InvalidBool { name: &'static str, value: String },
}

/// The single account allowed to log in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Postgres url; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub auth: Credentials,
    pub resend_api_key: Option<String>,
    pub resend_api_url: String,
    /// Sender used when a send request has no `from`.
    pub default_from: String,
    /// Origin for attachment download urls. Falls back to the request `Host`.
    pub public_url: Option<String>,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let port = match var("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidPort { name: "PORT", value })?,
            None => 3000,
        };

        let secure_cookies = match var("COOKIE_SECURE") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidBool {
                        name: "COOKIE_SECURE",
                        value,
                    });
                }
            },
            None => false,
        };

        Ok(Self {
            port,
            database_url: var("DATABASE_URL"),
            auth: Credentials {
                username: var("AUTH_USER").ok_or(ConfigError::Missing("AUTH_USER"))?,
                password: var("AUTH_PASSWORD").ok_or(ConfigError::Missing("AUTH_PASSWORD"))?,
                email: var("AUTH_EMAIL").unwrap_or_else(|| "admin@example.com".to_string()),
            },
            resend_api_key: var("RESEND_API_KEY"),
            resend_api_url: var("RESEND_API_URL")
                .unwrap_or_else(|| "https://api.resend.com".to_string()),
            default_from: var("DEFAULT_FROM")
                .unwrap_or_else(|| "onboarding@resend.dev".to_string()),
            public_url: var("PUBLIC_URL"),
            secure_cookies,
        })
    }
}
