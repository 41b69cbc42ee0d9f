use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a valid port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },
}

/// Settings for the inbound SMTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Name announced in the greeting.
    pub hostname: String,
}

impl SmtpConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("SMTP_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidPort {
                name: "SMTP_PORT",
                value,
            })?,
            None => 2525,
        };

        Ok(Self {
            host: lookup("SMTP_HOST").unwrap_or_else(|| "localhost".to_string()),
            port,
            hostname: lookup("SMTP_HOSTNAME").unwrap_or_else(|| "localhost".to_string()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SmtpConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr(), "localhost:2525");
        assert_eq!(config.hostname, "localhost");
    }

    #[test]
    fn test_invalid_port() {
        let result = SmtpConfig::from_lookup(lookup(&[("SMTP_PORT", "smtp")]));
        assert!(matches!(result, Err(ConfigError::InvalidPort { .. })));
    }
}
