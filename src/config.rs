use std::{
    env,
    fmt::{self, Display},
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// Unset runs the server on the in-memory store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_attempts: u32,
    /// Email and password of an account created at startup if missing
    pub superuser: Option<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Invalid { key: String, info: String },
    Incomplete(&'static str),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, info } => write!(f, "Invalid {key} value: {info}"),
            ConfigError::Incomplete(info) => write!(f, "{info}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let superuser = match (lookup("SUPERUSER_EMAIL"), lookup("SUPERUSER_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Incomplete(
                    "SUPERUSER_EMAIL and SUPERUSER_PASSWORD must be set together",
                ))
            }
        };

        Ok(Self {
            host: try_load(&lookup, "RUST_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "RUST_PORT", "8000")?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            db_max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "5")?,
            db_connect_attempts: try_load(&lookup, "DB_CONNECT_ATTEMPTS", "30")?,
            superuser,
        })
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            log::warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key: key.to_string(),
                info: e.to_string(),
            }
        })
}
