use std::env;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_PATH: &str = "kinship.db";
const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_change_me";
const DEFAULT_JWT_EXPIRE_HOURS: i64 = 2;
const DEFAULT_BCRYPT_COST: u32 = 10;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 15;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a number, got {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("BCRYPT_COST must be between 4 and 31, got {0}")]
    BcryptCost(u32),
}

/// Runtime settings read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub bcrypt_cost: u32,
    pub query_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            DEFAULT_JWT_SECRET.to_string()
        });

        let bcrypt_cost = parse(&lookup, "BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::BcryptCost(bcrypt_cost));
        }

        Ok(Self {
            port: parse(&lookup, "PORT", DEFAULT_PORT)?,
            database_path: lookup("DATABASE_PATH")
                .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            jwt_secret,
            jwt_expire_hours: parse(&lookup, "JWT_EXPIRE_HOURS", DEFAULT_JWT_EXPIRE_HOURS)?,
            bcrypt_cost,
            query_timeout: Duration::from_secs(parse(
                &lookup,
                "QUERY_TIMEOUT_SECS",
                DEFAULT_QUERY_TIMEOUT_SECS,
            )?),
        })
    }
}

fn parse<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
