use anyhow::{Context, Result};
use std::{env, fmt::Display, str::FromStr};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cors_origin: String,
    pub database_path: String,
    pub static_dir: String,
    pub environment: String,
}

impl Config {
    /// Read every setting from the environment, falling back to defaults.
    /// Call `dotenvy::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: try_load("PORT", "5000")?,
            cors_origin: try_load("CORS_ORIGIN", "http://localhost:5173")?,
            database_path: try_load("DATABASE_PATH", "affiliate.db")?,
            static_dir: try_load("STATIC_DIR", "dist")?,
            environment: try_load("APP_ENV", "development")?,
        })
    }

    /// In-memory database, no static files on disk.
    pub fn default_test() -> Self {
        Self {
            port: 0,
            cors_origin: "http://localhost:5173".into(),
            database_path: ":memory:".into(),
            static_dir: "dist".into(),
            environment: "test".into(),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value '{raw}'"))
}
