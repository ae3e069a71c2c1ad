use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("0.0.0.0:{}", self.server.port)
    }
}

/// Loads configuration from environment variables. `PORT` falls back to
/// 9000; `DATABASE_URL` is required.
pub fn load() -> Result<Config> {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9000);
    let url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    Ok(Config {
        server: ServerConfig { port },
        database: DatabaseConfig { url },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_formatting() {
        let config = Config {
            server: ServerConfig { port: 9000 },
            database: DatabaseConfig {
                url: "postgres://localhost/shopmart".to_owned(),
            },
        };
        assert_eq!(config.addr(), "0.0.0.0:9000");
    }
}
