use std::{env, str::FromStr, time::Duration};

use quickdraw_server::{ServerConfig, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

const PORT_VAR: &str = "QUICKDRAW_SERVER_PORT";
const DATABASE_URL_VAR: &str = "QUICKDRAW_DATABASE_URL";
const MAX_CONNECTIONS_VAR: &str = "QUICKDRAW_DATABASE_MAX_CONNECTIONS";
const REQUEST_TIMEOUT_VAR: &str = "QUICKDRAW_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Error)]
#[error("{name} must be {expected}, got \"{value}\"")]
pub struct ConfigError {
    pub name: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Everything quickdraw reads from the environment on boot
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// No url means rooms are only kept in memory
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = parse(&lookup, PORT_VAR, "a port number")?.unwrap_or(DEFAULT_PORT);

        let request_timeout = parse(&lookup, REQUEST_TIMEOUT_VAR, "a number of seconds")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let max_connections = parse(&lookup, MAX_CONNECTIONS_VAR, "a positive number")?
            .filter(|n: &u32| *n > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let database_url = lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty());

        Ok(Self {
            server: ServerConfig {
                port,
                request_timeout,
            },
            database_url,
            max_connections,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError {
            name,
            expected,
            value,
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_reads_variables() {
        let config = config(&[
            (PORT_VAR, "9000"),
            (REQUEST_TIMEOUT_VAR, "5"),
            (MAX_CONNECTIONS_VAR, "12"),
            (DATABASE_URL_VAR, "postgres://localhost/quickdraw"),
        ])
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_connections, 12);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/quickdraw")
        );
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let error = config(&[(PORT_VAR, "lots")]).unwrap_err();

        assert_eq!(error.name, PORT_VAR);
        assert_eq!(error.value, "lots");
    }
}
