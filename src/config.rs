// src/config.rs

use std::{env, path::PathBuf};

use dotenvy::dotenv;

/// Which persistence backend the services are wired to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Named JSON collections under `data_dir`.
    Json,
    /// SQLite database at `database_url`.
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    pub database_url: String,
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub founder_email: Option<String>,
    pub founder_password: Option<String>,
    pub proxy_dir: PathBuf,
    pub proxy_allowlist: Vec<String>,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "json".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "sqlite" | "sql" => StorageBackend::Sqlite,
            _ => StorageBackend::Json,
        };

        let data_dir = env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string());

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://community.db?mode=rwc".to_string());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let proxy_allowlist = env::var("PROXY_ALLOWLIST")
            .map(|v| parse_list(&v))
            .unwrap_or_default();

        Self {
            storage,
            data_dir: PathBuf::from(data_dir),
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            founder_email: env::var("FOUNDER_EMAIL").ok(),
            founder_password: env::var("FOUNDER_PASSWORD").ok(),
            proxy_dir: PathBuf::from(env::var("PROXY_DIR").unwrap_or_else(|_| "proxy".to_string())),
            proxy_allowlist,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::parse_list;

    #[test]
    fn allowlist_ignores_blanks() {
        assert_eq!(
            parse_list(" feed.json, ,news.xml,"),
            vec!["feed.json".to_string(), "news.xml".to_string()]
        );
    }
}
