//! Connection configuration.
//!
//! Provides the parameters a driver needs to open the single logical
//! connection the engine holds, loadable from `DB_*` environment variables.

use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable suffixes recognized by [`ConnectionConfig::from_vars`].
const HOST: &str = "DB_HOST";
const PORT: &str = "DB_PORT";
const DATABASE: &str = "DB_DATABASE";
const USER: &str = "DB_USER";
const PASSWORD: &str = "DB_PASSWD";
const CHARSET: &str = "DB_CHARSET";

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Hostname or IP address
    pub host: String,
    /// Port number (default: 3306)
    pub port: u16,
    /// Database (schema) name
    pub database: Option<String>,
    /// Username for authentication
    pub user: String,
    /// Password for authentication
    pub password: Option<String>,
    /// Character set name (default: utf8mb4)
    pub charset: String,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            database: None,
            user: String::new(),
            password: None,
            charset: "utf8mb4".to_string(),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from `(name, value)` pairs such as `std::env::vars()`.
    ///
    /// Unset variables keep their defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self::from_vars_with_prefix(vars, "")
    }

    /// Like [`ConnectionConfig::from_vars`], but reads `<PREFIX>_DB_HOST` etc.
    pub fn from_vars_with_prefix<I, K, V>(vars: I, prefix: &str) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}_", prefix.to_uppercase())
        };

        let mut config = Self::default();
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(prefix.as_str()) else {
                continue;
            };
            let value = value.into();
            match name {
                HOST => config.host = value,
                PORT => {
                    config.port = value.trim().parse().map_err(|_| {
                        Error::Config(format!("{prefix}{PORT} is not a valid port: `{value}`"))
                    })?;
                }
                DATABASE => config.database = Some(value),
                USER => config.user = value,
                PASSWORD => config.password = Some(value),
                CHARSET => config.charset = value,
                _ => {}
            }
        }

        tracing::debug!(
            host = %config.host,
            port = config.port,
            database = ?config.database,
            "Loaded connection configuration"
        );
        Ok(config)
    }

    /// Set the hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the username.
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the character set.
    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Get the socket address string for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// PDO-style data source name, e.g. `mysql:host=db;port=3306;dbname=app;charset=utf8mb4`.
    pub fn dsn(&self) -> String {
        let mut dsn = format!("mysql:host={};port={}", self.host, self.port);
        if let Some(db) = &self.database {
            dsn.push_str(";dbname=");
            dsn.push_str(db);
        }
        dsn.push_str(";charset=");
        dsn.push_str(&self.charset);
        dsn
    }
}
